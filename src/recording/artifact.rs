//! Finalized audio produced by a completed session

use super::timer::format_time;
use std::time::Duration;

/// The immutable result of one completed session
#[derive(Debug, Clone, PartialEq)]
pub struct FinalizedArtifact {
    payload: Vec<u8>,
    mime_type: String,
    duration: Duration,
}

impl FinalizedArtifact {
    pub fn new(payload: Vec<u8>, mime_type: impl Into<String>, duration: Duration) -> Self {
        Self {
            payload,
            mime_type: mime_type.into(),
            duration,
        }
    }

    /// The encoded audio, all chunks in arrival order
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Wall-clock length of the take in seconds
    pub fn duration_seconds(&self) -> f64 {
        self.duration.as_secs_f64()
    }

    /// Duration as stored by the backend (M:SS, whole seconds)
    pub fn formatted_duration(&self) -> String {
        format_time(self.duration.as_secs())
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}
