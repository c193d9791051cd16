//! Session data and transitions
//!
//! `RecordingSession` is the single source of truth for one take. Every
//! transition checks the current state first and reports whether it applied,
//! so late or duplicated events (a chunk after stop, a second stop) are
//! harmless no-ops.

use super::artifact::FinalizedArtifact;
use crate::error::CaptureError;
use crate::state::SessionState;
use tokio::time::Instant;

/// Point-in-time view of a session, published by the recorder
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub chunk_count: usize,
    pub elapsed_seconds: u64,
    pub started_at: Option<Instant>,
}

/// One capture attempt, from start to stop or failure
#[derive(Debug, Default)]
pub struct RecordingSession {
    state: SessionState,
    started_at: Option<Instant>,
    stop_requested_at: Option<Instant>,
    chunks: Vec<Vec<u8>>,
    elapsed_seconds: u64,
}

impl RecordingSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn started_at(&self) -> Option<Instant> {
        self.started_at
    }

    pub fn chunks(&self) -> &[Vec<u8>] {
        &self.chunks
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed_seconds
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state.clone(),
            chunk_count: self.chunks.len(),
            elapsed_seconds: self.elapsed_seconds,
            started_at: self.started_at,
        }
    }

    /// Idle → Acquiring
    pub fn begin_acquire(&mut self) -> bool {
        if !self.state.is_idle() {
            return false;
        }
        self.state = SessionState::Acquiring;
        true
    }

    /// Acquiring → Recording, stamping the start time
    pub fn granted(&mut self, now: Instant) -> bool {
        if !self.state.is_acquiring() || self.started_at.is_some() {
            return false;
        }
        self.chunks.clear();
        self.elapsed_seconds = 0;
        self.started_at = Some(now);
        self.state = SessionState::Recording;
        true
    }

    /// Append a chunk while recording. Empty chunks are dropped.
    pub fn push_chunk(&mut self, chunk: Vec<u8>) -> bool {
        if !self.state.is_recording() || chunk.is_empty() {
            return false;
        }
        self.chunks.push(chunk);
        true
    }

    /// Record the timer value while recording
    pub fn tick(&mut self, elapsed_seconds: u64) -> bool {
        if !self.state.is_recording() {
            return false;
        }
        self.elapsed_seconds = elapsed_seconds;
        true
    }

    /// Recording → Stopping, stamping the stop time
    pub fn begin_stop(&mut self, now: Instant) -> bool {
        if !self.state.is_recording() {
            return false;
        }
        self.stop_requested_at = Some(now);
        self.state = SessionState::Stopping;
        true
    }

    /// Stopping → Completed: append the flushed tail and build the artifact
    pub fn complete(&mut self, tail: Vec<u8>, mime_type: &str) -> Option<FinalizedArtifact> {
        if self.state != SessionState::Stopping {
            return None;
        }
        let (Some(started_at), Some(stopped_at)) = (self.started_at, self.stop_requested_at) else {
            return None;
        };

        if !tail.is_empty() {
            self.chunks.push(tail);
        }
        self.state = SessionState::Completed;

        let payload = self.chunks.concat();
        let duration = stopped_at.saturating_duration_since(started_at);
        Some(FinalizedArtifact::new(payload, mime_type, duration))
    }

    /// Any non-terminal state → Failed. Accumulated audio is discarded.
    pub fn fail(&mut self, error: CaptureError) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.chunks.clear();
        self.state = SessionState::Failed(error);
        true
    }
}
