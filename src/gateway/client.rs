//! HTTP client for the hosted backend
//!
//! Every request carries the project's anonymous key. Requests made on behalf
//! of a user carry the user's access token as bearer; the others use the
//! anonymous key there too.

use super::session::{AuthSession, SessionStore};
use super::AuthUser;
use crate::config::BackendConfig;
use crate::error::GatewayError;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Accept header asking the table endpoint for one object instead of an array
pub(crate) const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";

/// Client for the auth, table and storage endpoints
pub struct BackendClient {
    agent: ureq::Agent,
    base_url: String,
    anon_key: String,
    bucket: String,
    store: SessionStore,
    session: Mutex<Option<AuthSession>>,
}

impl BackendClient {
    /// Create a client and pick up a previously stored session
    pub fn new(config: &BackendConfig, store: SessionStore) -> Result<Self, GatewayError> {
        let base_url = config.url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(GatewayError::Config(
                "backend url is not set (config [backend] url or VOCALIST_BACKEND_URL)".into(),
            ));
        }
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(GatewayError::Config(format!(
                "backend url must start with http:// or https://, got: {}",
                base_url
            )));
        }
        if config.anon_key.trim().is_empty() {
            return Err(GatewayError::Config(
                "anon key is not set (config [backend] anon_key or VOCALIST_ANON_KEY)".into(),
            ));
        }

        if base_url.starts_with("http://")
            && !base_url.contains("localhost")
            && !base_url.contains("127.0.0.1")
            && !base_url.contains("[::1]")
        {
            tracing::warn!("Backend url uses HTTP without TLS. Credentials will be sent unencrypted!");
        }

        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build();

        let session = store.load();
        if let Some(ref s) = session {
            tracing::debug!("Loaded stored session for {}", s.user.email);
        }

        Ok(Self {
            agent,
            base_url,
            anon_key: config.anon_key.trim().to_string(),
            bucket: config.recordings_bucket.clone(),
            store,
            session: Mutex::new(session),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Build a request. `bearer` is the user's access token, if any.
    pub(crate) fn request(&self, method: &str, path: &str, bearer: Option<&str>) -> ureq::Request {
        let token = bearer.unwrap_or(&self.anon_key);
        self.agent
            .request(method, &self.endpoint(path))
            .set("apikey", &self.anon_key)
            .set("Authorization", &format!("Bearer {}", token))
    }

    /// GET an absolute URL on this backend and read the body, up to `limit` bytes
    pub(crate) fn download(&self, url: &str, limit: u64) -> Result<Vec<u8>, GatewayError> {
        use std::io::Read;

        if !url.starts_with(&format!("{}/", self.base_url)) {
            return Err(GatewayError::Decode(format!(
                "'{}' is not served by {}",
                url, self.base_url
            )));
        }
        let response = self
            .agent
            .get(url)
            .set("apikey", &self.anon_key)
            .call()
            .map_err(send_error)?;

        let mut body = Vec::new();
        response
            .into_reader()
            .take(limit)
            .read_to_end(&mut body)
            .map_err(|e| GatewayError::Network(e.to_string()))?;
        Ok(body)
    }

    fn lock_session(&self) -> MutexGuard<'_, Option<AuthSession>> {
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The stored session as is, without checking expiry
    pub(crate) fn stored_session(&self) -> Option<AuthSession> {
        self.lock_session().clone()
    }

    /// A usable session, refreshed if its token expired
    pub(crate) fn active_session(&self) -> Result<AuthSession, GatewayError> {
        let session = self.stored_session().ok_or(GatewayError::NotAuthenticated)?;
        if !session.is_expired(chrono::Utc::now().timestamp()) {
            return Ok(session);
        }

        tracing::debug!("Access token expired, refreshing");
        match self.refresh(&session) {
            Ok(refreshed) => {
                self.set_session(refreshed.clone())?;
                Ok(refreshed)
            }
            Err(GatewayError::Network(e)) => Err(GatewayError::Network(e)),
            Err(e) => {
                tracing::info!("Session could not be refreshed ({}), signing out locally", e);
                self.clear_session()?;
                Err(GatewayError::NotAuthenticated)
            }
        }
    }

    pub(crate) fn set_session(&self, session: AuthSession) -> Result<(), GatewayError> {
        self.store.save(&session)?;
        *self.lock_session() = Some(session);
        Ok(())
    }

    pub(crate) fn clear_session(&self) -> Result<(), GatewayError> {
        *self.lock_session() = None;
        self.store.clear()
    }

    fn refresh(&self, session: &AuthSession) -> Result<AuthSession, GatewayError> {
        let response = self
            .request("POST", "/auth/v1/token", None)
            .query("grant_type", "refresh_token")
            .send_json(serde_json::json!({ "refresh_token": session.refresh_token }))
            .map_err(send_error)?;
        let tokens: TokenResponse = read_json(response)?;

        let mut refreshed = tokens.into_session(chrono::Utc::now().timestamp());
        refreshed.user.first_name = session.user.first_name.clone();
        refreshed.user.last_name = session.user.last_name.clone();
        Ok(refreshed)
    }
}

/// Token grant response of the auth endpoint
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: RemoteUser,
}

impl TokenResponse {
    pub fn into_session(self, now: i64) -> AuthSession {
        let expires_at = self
            .expires_at
            .unwrap_or_else(|| now + self.expires_in.unwrap_or(3600));
        AuthSession {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: self.user.into_auth_user(),
        }
    }
}

/// User object of the auth endpoint
#[derive(Debug, Deserialize)]
pub(crate) struct RemoteUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: serde_json::Value,
}

impl RemoteUser {
    /// Names come from the metadata given at sign-up until a profile is read
    pub fn into_auth_user(self) -> AuthUser {
        let meta = |key: &str| {
            self.user_metadata
                .get(key)
                .and_then(|v| v.as_str())
                .map(str::to_string)
        };
        AuthUser {
            first_name: meta("firstName"),
            last_name: meta("lastName"),
            email: self.email.clone().unwrap_or_default(),
            id: self.id,
        }
    }
}

/// Convert a ureq failure into a gateway error
pub(crate) fn send_error(error: ureq::Error) -> GatewayError {
    match error {
        ureq::Error::Status(code, response) => {
            let body = response.into_string().unwrap_or_default();
            classify_error(code, &body)
        }
        ureq::Error::Transport(t) => GatewayError::Network(format!("Request failed: {}", t)),
    }
}

/// Classify an error response by status and message text
pub(crate) fn classify_error(status: u16, body: &str) -> GatewayError {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    let field = |key: &str| {
        parsed
            .as_ref()
            .and_then(|v| v.get(key))
            .and_then(|v| v.as_str())
            .map(str::to_string)
    };

    let message = ["msg", "message", "error_description", "error"]
        .iter()
        .find_map(|key| field(*key))
        .unwrap_or_else(|| body.trim().to_string());
    let code = field("error_code").unwrap_or_default();
    let lower = message.to_lowercase();

    if code == "invalid_credentials" || lower.contains("invalid login credentials") {
        GatewayError::InvalidCredentials
    } else if code == "email_not_confirmed" || lower.contains("email not confirmed") {
        GatewayError::EmailNotConfirmed
    } else if code == "user_already_exists" || lower.contains("already registered") {
        GatewayError::AlreadyRegistered
    } else if status == 401 && (lower.contains("jwt") || lower.contains("token")) {
        GatewayError::NotAuthenticated
    } else {
        GatewayError::Remote { status, message }
    }
}

/// Decode a JSON response body
pub(crate) fn read_json<T: DeserializeOwned>(response: ureq::Response) -> Result<T, GatewayError> {
    response
        .into_json()
        .map_err(|e| GatewayError::Decode(format!("Failed to parse response: {}", e)))
}
