//! Recording session lifecycle
//!
//! A session acquires a microphone stream from a [`MediaInputProvider`],
//! feeds it to an [`Encoder`] that hands back chunks at a fixed cadence, and
//! on stop assembles the chunks into one [`FinalizedArtifact`].
//!
//! The [`Recorder`] owns exactly one session. Once that session completed or
//! failed, a new recorder is needed for the next take.

pub mod artifact;
pub mod controller;
pub mod session;
pub mod timer;

pub use artifact::FinalizedArtifact;
pub use controller::{Recorder, RecorderOptions};
pub use session::{RecordingSession, SessionSnapshot};
pub use timer::{format_time, parse_time, DurationTimer};

use crate::error::CaptureError;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;

static NEXT_STREAM_ID: AtomicU64 = AtomicU64::new(1);

/// Format of the samples delivered by an input stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

/// Events delivered by an input stream
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    /// A block of f32 samples, interleaved if `channels > 1`
    Samples(Vec<f32>),
    /// The device reported an error; the stream is unusable
    DeviceError(String),
}

/// Handle to an acquired microphone stream
///
/// Owned by the recorder from acquisition until it is handed back to
/// [`MediaInputProvider::release`].
#[derive(Debug)]
pub struct InputStream {
    id: u64,
    device: String,
    format: StreamFormat,
    events: Option<mpsc::Receiver<InputEvent>>,
}

impl InputStream {
    pub fn new(
        device: impl Into<String>,
        format: StreamFormat,
        events: mpsc::Receiver<InputEvent>,
    ) -> Self {
        Self {
            id: NEXT_STREAM_ID.fetch_add(1, Ordering::Relaxed),
            device: device.into(),
            format,
            events: Some(events),
        }
    }

    /// Unique id, used by providers to find the resources behind a handle
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn format(&self) -> StreamFormat {
        self.format
    }

    /// Take the sample receiver. Only the first caller gets it.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<InputEvent>> {
        self.events.take()
    }
}

/// Source of microphone streams
#[async_trait::async_trait]
pub trait MediaInputProvider: Send + Sync {
    /// Request an input stream. May wait on the user (permission prompt).
    async fn acquire(&self) -> Result<InputStream, CaptureError>;

    /// Give the stream back and free the capture device
    fn release(&self, stream: InputStream);
}

/// Events emitted by a running encoder
#[derive(Debug, Clone, PartialEq)]
pub enum EncoderEvent {
    /// One encoded chunk, possibly empty
    Chunk(Vec<u8>),
    /// The encoder or its input failed mid-session
    Fault(CaptureError),
}

/// Turns an input stream into encoded chunks
#[async_trait::async_trait]
pub trait Encoder: Send {
    /// MIME type of the produced audio
    fn mime_type(&self) -> &str;

    /// Start encoding. Chunks arrive on the returned receiver.
    fn start(
        &mut self,
        stream: &mut InputStream,
    ) -> Result<mpsc::Receiver<EncoderEvent>, CaptureError>;

    /// Flush and stop. Returns the last chunk.
    async fn stop(&mut self) -> Result<Vec<u8>, CaptureError>;

    /// Stop without flushing (session failed or torn down)
    fn abort(&mut self) {}
}

/// Receives the outcome of a session
pub trait SessionObserver: Send {
    /// Called exactly once for a completed session, never for a failed one
    fn on_recording_complete(&mut self, artifact: FinalizedArtifact);

    /// Called at most once per second while recording, formatted as M:SS
    fn on_duration_update(&mut self, _formatted: &str) {}

    /// Called once when the session fails
    fn on_failure(&mut self, _error: &CaptureError) {}
}

/// Session outcome as a message, for observers backed by a channel
#[derive(Debug, Clone, PartialEq)]
pub enum RecorderEvent {
    DurationUpdate(String),
    Completed(FinalizedArtifact),
    Failed(CaptureError),
}

impl SessionObserver for mpsc::UnboundedSender<RecorderEvent> {
    fn on_recording_complete(&mut self, artifact: FinalizedArtifact) {
        let _ = self.send(RecorderEvent::Completed(artifact));
    }

    fn on_duration_update(&mut self, formatted: &str) {
        let _ = self.send(RecorderEvent::DurationUpdate(formatted.to_string()));
    }

    fn on_failure(&mut self, error: &CaptureError) {
        let _ = self.send(RecorderEvent::Failed(error.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_ids_are_unique() {
        let format = StreamFormat {
            sample_rate: 16000,
            channels: 1,
        };
        let (_tx1, rx1) = mpsc::channel(1);
        let (_tx2, rx2) = mpsc::channel(1);
        let a = InputStream::new("mic", format, rx1);
        let b = InputStream::new("mic", format, rx2);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_events_taken_once() {
        let (_tx, rx) = mpsc::channel(1);
        let mut stream = InputStream::new(
            "mic",
            StreamFormat {
                sample_rate: 48000,
                channels: 2,
            },
            rx,
        );
        assert!(stream.take_events().is_some());
        assert!(stream.take_events().is_none());
        assert_eq!(stream.format().channels, 2);
    }

    #[test]
    fn test_channel_observer_forwards_events() {
        let (mut tx, mut rx) = mpsc::unbounded_channel();
        tx.on_duration_update("0:01");
        tx.on_failure(&CaptureError::PermissionDenied);

        assert_eq!(
            rx.try_recv().unwrap(),
            RecorderEvent::DurationUpdate("0:01".into())
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            RecorderEvent::Failed(CaptureError::PermissionDenied)
        );
    }
}
