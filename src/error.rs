//! Error types for vocalist
//!
//! Uses thiserror for ergonomic error definitions with clear messages
//! that tell the singer what to do next.

use thiserror::Error;

/// Top-level error type for the vocalist application
#[derive(Error, Debug)]
pub enum VocalistError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Recording error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Backend error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Audio format error: {0}")]
    AudioFormat(String),

    #[error("Audio output error: {0}")]
    Playback(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that end a recording session
///
/// Every variant is terminal for the session that produced it. None of them
/// is retried; the user starts a new session instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("Microphone access was denied. Allow microphone access for this terminal and try again.")]
    PermissionDenied,

    #[error("No usable microphone: {0}\n  List devices with: vocalist devices")]
    DeviceUnavailable(String),

    #[error("Audio encoder stopped unexpectedly: {0}")]
    EncoderFault(String),

    #[error("Recording was cancelled before the microphone became available")]
    Cancelled,
}

impl CaptureError {
    /// Whether this error should be shown to the user as a failure.
    /// A cancelled acquisition is a user action, not a failure.
    pub fn is_user_visible(&self) -> bool {
        !matches!(self, CaptureError::Cancelled)
    }
}

/// Errors raised by the hosted backend (persistence and identity)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Not signed in.\n  Run: vocalist auth signin --email <EMAIL>")]
    NotAuthenticated,

    #[error("Wrong email or password")]
    InvalidCredentials,

    #[error("Please confirm your email address before signing in")]
    EmailNotConfirmed,

    #[error("An account already exists for this email")]
    AlreadyRegistered,

    #[error("{0}")]
    Validation(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Backend returned {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("Unexpected response from backend: {0}")]
    Decode(String),

    #[error("Backend configuration error: {0}")]
    Config(String),
}

/// Result type alias using VocalistError
pub type Result<T> = std::result::Result<T, VocalistError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancelled_is_not_user_visible() {
        assert!(!CaptureError::Cancelled.is_user_visible());
        assert!(CaptureError::PermissionDenied.is_user_visible());
        assert!(CaptureError::EncoderFault("eof".into()).is_user_visible());
    }

    #[test]
    fn test_capture_error_wraps_into_top_level() {
        let err: VocalistError = CaptureError::DeviceUnavailable("none".into()).into();
        assert!(err.to_string().starts_with("Recording error"));
        assert!(err.to_string().contains("vocalist devices"));
    }
}
