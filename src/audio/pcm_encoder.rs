//! 16-bit PCM encoder
//!
//! Collects mono f32 samples from an input stream and emits little-endian
//! signed 16-bit PCM at a fixed cadence. Each chunk holds exactly the samples
//! that arrived since the previous one, so the chunks concatenate into one
//! continuous `audio/L16` payload.

use crate::error::CaptureError;
use crate::recording::{Encoder, EncoderEvent, InputEvent, InputStream};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

const FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

/// Convert f32 samples in [-1, 1] to little-endian i16 bytes
pub fn encode_pcm16(samples: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &s in samples {
        let value = (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Encoder producing `audio/L16` chunks
pub struct PcmEncoder {
    chunk_interval: Duration,
    mime_type: String,
    stop_tx: Option<oneshot::Sender<oneshot::Sender<Vec<u8>>>>,
    task: Option<JoinHandle<()>>,
}

impl PcmEncoder {
    pub fn new(sample_rate: u32, chunk_interval: Duration) -> Self {
        Self {
            chunk_interval,
            mime_type: format!("audio/L16;rate={};channels=1", sample_rate),
            stop_tx: None,
            task: None,
        }
    }
}

#[async_trait::async_trait]
impl Encoder for PcmEncoder {
    fn mime_type(&self) -> &str {
        &self.mime_type
    }

    fn start(
        &mut self,
        stream: &mut InputStream,
    ) -> Result<mpsc::Receiver<EncoderEvent>, CaptureError> {
        if self.task.is_some() {
            return Err(CaptureError::EncoderFault("encoder already started".to_string()));
        }
        let format = stream.format();
        if format.channels != 1 {
            return Err(CaptureError::EncoderFault(format!(
                "expected mono input, got {} channels",
                format.channels
            )));
        }
        let mut input = stream
            .take_events()
            .ok_or_else(|| CaptureError::EncoderFault("input stream already in use".to_string()))?;

        self.mime_type = format!("audio/L16;rate={};channels=1", format.sample_rate);

        let (events_tx, events_rx) = mpsc::channel(32);
        let (stop_tx, mut stop_rx) = oneshot::channel::<oneshot::Sender<Vec<u8>>>();
        let chunk_interval = self.chunk_interval;

        let task = tokio::spawn(async move {
            let mut pending: Vec<f32> = Vec::new();
            let mut ticker = interval_at(Instant::now() + chunk_interval, chunk_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;

                    reply = &mut stop_rx => {
                        // Take whatever the device already delivered
                        while let Ok(InputEvent::Samples(samples)) = input.try_recv() {
                            pending.extend_from_slice(&samples);
                        }
                        if let Ok(reply) = reply {
                            let _ = reply.send(encode_pcm16(&pending));
                        }
                        break;
                    }

                    event = input.recv() => match event {
                        Some(InputEvent::Samples(samples)) => pending.extend_from_slice(&samples),
                        Some(InputEvent::DeviceError(message)) => {
                            let _ = events_tx
                                .send(EncoderEvent::Fault(CaptureError::DeviceUnavailable(message)))
                                .await;
                            break;
                        }
                        None => {
                            let _ = events_tx
                                .send(EncoderEvent::Fault(CaptureError::EncoderFault(
                                    "input stream ended".to_string(),
                                )))
                                .await;
                            break;
                        }
                    },

                    _ = ticker.tick() => {
                        let chunk = encode_pcm16(&pending);
                        pending.clear();
                        if events_tx.send(EncoderEvent::Chunk(chunk)).await.is_err() {
                            break;
                        }
                    }
                }
            }
            tracing::debug!("PCM encoder stopped");
        });

        self.stop_tx = Some(stop_tx);
        self.task = Some(task);
        Ok(events_rx)
    }

    async fn stop(&mut self) -> Result<Vec<u8>, CaptureError> {
        let stop_tx = self
            .stop_tx
            .take()
            .ok_or_else(|| CaptureError::EncoderFault("encoder not running".to_string()))?;
        let task = self.task.take();

        let (reply_tx, reply_rx) = oneshot::channel();
        if stop_tx.send(reply_tx).is_err() {
            return Err(CaptureError::EncoderFault("encoder task exited".to_string()));
        }

        let result = match tokio::time::timeout(FLUSH_TIMEOUT, reply_rx).await {
            Ok(Ok(tail)) => Ok(tail),
            Ok(Err(_)) => Err(CaptureError::EncoderFault("encoder dropped its output".to_string())),
            Err(_) => Err(CaptureError::EncoderFault(format!(
                "flush timed out after {}s",
                FLUSH_TIMEOUT.as_secs()
            ))),
        };

        if let Some(task) = task {
            if result.is_err() {
                task.abort();
            }
        }
        result
    }

    fn abort(&mut self) {
        self.stop_tx = None;
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for PcmEncoder {
    fn drop(&mut self) {
        self.abort();
    }
}
