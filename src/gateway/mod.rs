//! Hosted backend gateways
//!
//! Persistence (notes, recordings) and identity (accounts, sessions) are
//! delegated to a hosted backend exposing auth, table and object-storage REST
//! endpoints. The traits here are the seams the rest of the crate depends on;
//! [`BackendClient`] is the HTTP implementation.
//!
//! Calls are blocking (ureq). Async callers run them on the blocking pool.

pub mod client;
pub mod identity;
pub mod records;
pub mod session;

pub use client::BackendClient;
pub use session::{AuthSession, SessionStore};

use crate::error::GatewayError;
use crate::recording::FinalizedArtifact;
use serde::{Deserialize, Serialize};

pub const MIN_PASSWORD_LEN: usize = 6;

/// A practice note
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
    #[serde(default)]
    pub user_id: String,
}

/// Fields supplied when creating a note
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewNote {
    pub title: String,
    pub content: String,
    pub date: String,
}

/// A stored recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recording {
    pub id: i64,
    pub title: String,
    pub audio_url: String,
    /// Length as M:SS
    #[serde(default)]
    pub duration: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
    #[serde(default)]
    pub user_id: String,
}

/// A finished take to upload and record
#[derive(Debug, Clone)]
pub struct NewRecording {
    pub title: String,
    /// WAV audio
    pub audio: FinalizedArtifact,
    /// Length as M:SS
    pub duration: String,
    pub date: String,
}

impl NewRecording {
    pub fn validate(&self) -> Result<(), GatewayError> {
        if self.title.trim().is_empty() {
            return Err(GatewayError::Validation(
                "Please give the recording a title".to_string(),
            ));
        }
        if self.audio.is_empty() {
            return Err(GatewayError::Validation(
                "The recording contains no audio".to_string(),
            ));
        }
        Ok(())
    }
}

/// The signed-in user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

impl AuthUser {
    /// First name for greetings, "Artist" when unknown
    pub fn greeting_name(&self) -> &str {
        self.first_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or("Artist")
    }
}

/// Account creation request
#[derive(Debug, Clone, Default)]
pub struct SignUp {
    pub email: String,
    pub password: String,
    pub password_confirmation: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl SignUp {
    /// Local checks made before anything is sent
    pub fn validate(&self) -> Result<(), GatewayError> {
        validate_email(&self.email)?;
        if self.password != self.password_confirmation {
            return Err(GatewayError::Validation(
                "Passwords do not match".to_string(),
            ));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(GatewayError::Validation(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }
        Ok(())
    }
}

/// Password sign-in request
#[derive(Debug, Clone, Default)]
pub struct SignIn {
    pub email: String,
    pub password: String,
}

impl SignIn {
    pub fn validate(&self) -> Result<(), GatewayError> {
        validate_email(&self.email)?;
        if self.password.is_empty() {
            return Err(GatewayError::Validation("Password is required".to_string()));
        }
        Ok(())
    }
}

fn validate_email(email: &str) -> Result<(), GatewayError> {
    let email = email.trim();
    match email.split_once('@') {
        Some((user, domain)) if !user.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(GatewayError::Validation(format!(
            "'{}' is not a valid email address",
            email
        ))),
    }
}

/// Row storage for the signed-in user
pub trait PersistenceGateway: Send + Sync {
    /// Notes, newest first
    fn list_notes(&self) -> Result<Vec<Note>, GatewayError>;

    fn create_note(&self, note: &NewNote) -> Result<Note, GatewayError>;

    fn delete_note(&self, id: i64) -> Result<(), GatewayError>;

    /// Recordings, newest first
    fn list_recordings(&self) -> Result<Vec<Recording>, GatewayError>;

    /// Upload the audio, then insert the row pointing at it
    fn create_recording(&self, recording: &NewRecording) -> Result<Recording, GatewayError>;

    /// Download the WAV audio of a recording
    fn recording_audio(&self, id: i64) -> Result<Vec<u8>, GatewayError>;

    /// Remove the stored audio, then the row
    fn delete_recording(&self, id: i64) -> Result<(), GatewayError>;
}

/// Account management
pub trait IdentityGateway: Send + Sync {
    fn sign_up(&self, request: &SignUp) -> Result<AuthUser, GatewayError>;

    fn sign_in(&self, request: &SignIn) -> Result<AuthUser, GatewayError>;

    fn sign_out(&self) -> Result<(), GatewayError>;

    /// The signed-in user, or None without a session
    fn current_user(&self) -> Result<Option<AuthUser>, GatewayError>;
}
