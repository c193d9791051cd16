//! State machine for a recording session
//!
//! Idle → Acquiring → Recording → Stopping → Completed
//!
//! Acquiring and Recording may also end in Failed. Completed and Failed are
//! terminal: a session that reached them is never reused.

use crate::error::CaptureError;

/// Lifecycle state of one recording session
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Created, nothing requested yet
    #[default]
    Idle,

    /// Waiting for the input provider to grant a stream
    Acquiring,

    /// Stream granted, encoder running, chunks accumulating
    Recording,

    /// Stop requested, waiting for the encoder to flush
    Stopping,

    /// Artifact produced and handed to the observer
    Completed,

    /// Session ended with an error
    Failed(CaptureError),
}

impl SessionState {
    /// Check if in idle state
    pub fn is_idle(&self) -> bool {
        matches!(self, SessionState::Idle)
    }

    /// Check if waiting for the microphone
    pub fn is_acquiring(&self) -> bool {
        matches!(self, SessionState::Acquiring)
    }

    /// Check if in recording state
    pub fn is_recording(&self) -> bool {
        matches!(self, SessionState::Recording)
    }

    /// Completed or Failed: no transition leaves these
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Completed | SessionState::Failed(_))
    }

    /// States in which the session owns an input stream
    pub fn holds_stream(&self) -> bool {
        matches!(self, SessionState::Recording | SessionState::Stopping)
    }

    /// The failure that ended the session, if any
    pub fn error(&self) -> Option<&CaptureError> {
        match self {
            SessionState::Failed(error) => Some(error),
            _ => None,
        }
    }

    /// Short lowercase name, used in logs and status output
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Acquiring => "acquiring",
            SessionState::Recording => "recording",
            SessionState::Stopping => "stopping",
            SessionState::Completed => "completed",
            SessionState::Failed(_) => "failed",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => write!(f, "Idle"),
            SessionState::Acquiring => write!(f, "Waiting for microphone"),
            SessionState::Recording => write!(f, "Recording"),
            SessionState::Stopping => write!(f, "Finishing recording"),
            SessionState::Completed => write!(f, "Completed"),
            SessionState::Failed(error) => write!(f, "Failed: {}", error),
        }
    }
}
