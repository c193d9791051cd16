//! Scriptable microphone and encoder for driving sessions in tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use vocalist::error::CaptureError;
use vocalist::recording::{
    Encoder, EncoderEvent, InputStream, MediaInputProvider, StreamFormat,
};

/// Microphone that grants or denies after an optional delay
pub struct MockProvider {
    outcome: Result<(), CaptureError>,
    delay: Option<Duration>,
    pub acquired: AtomicUsize,
    pub released: AtomicUsize,
}

impl MockProvider {
    pub fn granting() -> Arc<Self> {
        Arc::new(Self::new(Ok(()), None))
    }

    pub fn denying(error: CaptureError) -> Arc<Self> {
        Arc::new(Self::new(Err(error), None))
    }

    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self::new(Ok(()), Some(delay)))
    }

    /// Denies, but only after `delay`
    pub fn slow_denial(delay: Duration, error: CaptureError) -> Arc<Self> {
        Arc::new(Self::new(Err(error), Some(delay)))
    }

    fn new(outcome: Result<(), CaptureError>, delay: Option<Duration>) -> Self {
        Self {
            outcome,
            delay,
            acquired: AtomicUsize::new(0),
            released: AtomicUsize::new(0),
        }
    }

    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl MediaInputProvider for MockProvider {
    async fn acquire(&self) -> Result<InputStream, CaptureError> {
        self.acquired.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.outcome.clone()?;

        let (_tx, rx) = mpsc::channel(1);
        Ok(InputStream::new(
            "mock microphone",
            StreamFormat {
                sample_rate: 16000,
                channels: 1,
            },
            rx,
        ))
    }

    fn release(&self, _stream: InputStream) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// Test-side handle to a `MockEncoder`
#[derive(Default)]
pub struct EncoderControl {
    events: Mutex<Option<mpsc::Sender<EncoderEvent>>>,
    tail: Mutex<Option<Result<Vec<u8>, CaptureError>>>,
    hang_on_stop: AtomicBool,
    pub started: AtomicUsize,
    pub stopped: AtomicUsize,
    pub aborted: AtomicUsize,
}

impl EncoderControl {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Result of the next flush (default: empty tail)
    pub fn set_tail(&self, tail: Result<Vec<u8>, CaptureError>) {
        *self.tail.lock().unwrap() = Some(tail);
    }

    /// Make the next flush never finish
    pub fn hang_on_stop(&self) {
        self.hang_on_stop.store(true, Ordering::SeqCst);
    }

    pub fn stopped(&self) -> usize {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Emit an event as if the encoder produced it
    pub async fn emit(&self, event: EncoderEvent) {
        let sender = self.events.lock().unwrap().clone();
        if let Some(sender) = sender {
            let _ = sender.send(event).await;
        }
    }

    pub async fn chunk(&self, bytes: &[u8]) {
        self.emit(EncoderEvent::Chunk(bytes.to_vec())).await;
    }

    /// Drop the encoder's output channel
    pub fn close(&self) {
        self.events.lock().unwrap().take();
    }

    pub fn aborted(&self) -> usize {
        self.aborted.load(Ordering::SeqCst)
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }
}

pub struct MockEncoder {
    control: Arc<EncoderControl>,
}

impl MockEncoder {
    pub fn boxed(control: &Arc<EncoderControl>) -> Box<dyn Encoder> {
        Box::new(Self {
            control: Arc::clone(control),
        })
    }
}

#[async_trait::async_trait]
impl Encoder for MockEncoder {
    fn mime_type(&self) -> &str {
        "audio/L16;rate=16000;channels=1"
    }

    fn start(
        &mut self,
        _stream: &mut InputStream,
    ) -> Result<mpsc::Receiver<EncoderEvent>, CaptureError> {
        self.control.started.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel(16);
        *self.control.events.lock().unwrap() = Some(tx);
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<Vec<u8>, CaptureError> {
        self.control.stopped.fetch_add(1, Ordering::SeqCst);
        if self.control.hang_on_stop.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        self.control.events.lock().unwrap().take();
        self.control
            .tail
            .lock()
            .unwrap()
            .take()
            .unwrap_or(Ok(Vec::new()))
    }

    fn abort(&mut self) {
        self.control.aborted.fetch_add(1, Ordering::SeqCst);
        self.control.events.lock().unwrap().take();
    }
}
