//! cpal-based microphone input
//!
//! Uses the cpal crate for cross-platform audio input.
//! Works with PipeWire, PulseAudio, and ALSA backends.
//!
//! Note: cpal::Stream is not Send, so every acquired stream lives on its own
//! capture thread. The thread reports readiness once the stream is playing and
//! then parks until the stream is released.

use crate::config::AudioConfig;
use crate::error::CaptureError;
use crate::recording::{InputEvent, InputStream, MediaInputProvider, StreamFormat};
use std::collections::HashMap;
use std::sync::Mutex;
use std::thread;
use tokio::sync::{mpsc, oneshot};

/// Parameters for building an audio input stream
struct StreamBuildParams {
    tx: mpsc::Sender<InputEvent>,
    source_rate: u32,
    target_rate: u32,
    source_channels: usize,
}

/// A running capture thread and the means to stop it
struct CaptureThread {
    stop_tx: std::sync::mpsc::Sender<()>,
    handle: thread::JoinHandle<()>,
}

/// Media input provider backed by cpal
///
/// Samples are mixed down to mono and resampled to the configured rate
/// before they reach the encoder.
pub struct CpalInput {
    config: AudioConfig,
    threads: Mutex<HashMap<u64, CaptureThread>>,
}

impl CpalInput {
    pub fn new(config: &AudioConfig) -> Self {
        Self {
            config: config.clone(),
            threads: Mutex::new(HashMap::new()),
        }
    }

    fn open_device(&self) -> Result<cpal::Device, CaptureError> {
        use cpal::traits::HostTrait;

        let host = cpal::default_host();
        if self.config.device == "default" {
            host.default_input_device().ok_or_else(|| {
                CaptureError::DeviceUnavailable("no default input device".to_string())
            })
        } else {
            find_audio_device(&host, &self.config.device)
        }
    }
}

/// Find an audio input device by name with flexible matching.
///
/// Matching strategy (in order):
/// 1. Exact match (case-sensitive)
/// 2. Exact match (case-insensitive)
/// 3. Substring match: device name contains the search term (case-insensitive)
fn find_audio_device(host: &cpal::Host, device_name: &str) -> Result<cpal::Device, CaptureError> {
    use cpal::traits::{DeviceTrait, HostTrait};

    let devices: Vec<(String, cpal::Device)> = host
        .input_devices()
        .map_err(|e| classify_stream_error(&e.to_string()))?
        .filter_map(|d| d.name().ok().map(|name| (name, d)))
        .collect();

    let names: Vec<&str> = devices.iter().map(|(name, _)| name.as_str()).collect();
    let Some(index) = match_device_name(&names, device_name) else {
        return Err(CaptureError::DeviceUnavailable(device_not_found_message(
            device_name,
            &names,
        )));
    };

    let (name, device) = devices
        .into_iter()
        .nth(index)
        .ok_or_else(|| CaptureError::DeviceUnavailable(device_name.to_string()))?;
    tracing::debug!("Matched audio device '{}' for '{}'", name, device_name);
    Ok(device)
}

/// Index of the device that best matches `wanted`
fn match_device_name(names: &[&str], wanted: &str) -> Option<usize> {
    let wanted_lower = wanted.to_lowercase();

    names
        .iter()
        .position(|name| *name == wanted)
        .or_else(|| {
            names
                .iter()
                .position(|name| name.to_lowercase() == wanted_lower)
        })
        .or_else(|| {
            names
                .iter()
                .position(|name| name.to_lowercase().contains(&wanted_lower))
        })
}

fn device_not_found_message(requested: &str, available: &[&str]) -> String {
    if available.is_empty() {
        return format!("'{}' not found. No audio input devices found.", requested);
    }
    format!(
        "'{}' not found. Available devices:\n{}",
        requested,
        available
            .iter()
            .map(|n| format!("  - {}", n))
            .collect::<Vec<_>>()
            .join("\n")
    )
}

/// Map a backend error message onto the capture error the user should see
fn classify_stream_error(message: &str) -> CaptureError {
    let lower = message.to_lowercase();
    if lower.contains("permission") || lower.contains("denied") || lower.contains("not authorized")
    {
        CaptureError::PermissionDenied
    } else {
        CaptureError::DeviceUnavailable(message.to_string())
    }
}

#[async_trait::async_trait]
impl MediaInputProvider for CpalInput {
    async fn acquire(&self) -> Result<InputStream, CaptureError> {
        use cpal::traits::{DeviceTrait, StreamTrait};

        let device = self.open_device()?;
        let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());

        let supported_config = device
            .default_input_config()
            .map_err(|e| classify_stream_error(&e.to_string()))?;

        let source_sample_rate = supported_config.sample_rate().0;
        let source_channels = supported_config.channels() as usize;
        let target_sample_rate = self.config.sample_rate;
        let sample_format = supported_config.sample_format();

        tracing::debug!(
            "Device config: {} Hz, {} channel(s), format: {:?}",
            source_sample_rate,
            source_channels,
            sample_format
        );

        let (event_tx, event_rx) = mpsc::channel(64);
        let (ready_tx, ready_rx) = oneshot::channel::<Result<(), CaptureError>>();
        let (stop_tx, stop_rx) = std::sync::mpsc::channel::<()>();

        let handle = thread::spawn(move || {
            let stream_config = cpal::StreamConfig {
                channels: supported_config.channels(),
                sample_rate: supported_config.sample_rate(),
                buffer_size: cpal::BufferSize::Default,
            };

            let error_tx = event_tx.clone();
            let err_fn = move |err: cpal::StreamError| {
                tracing::error!("Audio stream error: {}", err);
                let _ = error_tx.try_send(InputEvent::DeviceError(err.to_string()));
            };

            let params = StreamBuildParams {
                tx: event_tx,
                source_rate: source_sample_rate,
                target_rate: target_sample_rate,
                source_channels,
            };

            let stream_result = match sample_format {
                cpal::SampleFormat::F32 => build_stream::<f32>(&device, &stream_config, params, err_fn),
                cpal::SampleFormat::I16 => build_stream::<i16>(&device, &stream_config, params, err_fn),
                cpal::SampleFormat::U16 => build_stream::<u16>(&device, &stream_config, params, err_fn),
                format => Err(CaptureError::DeviceUnavailable(format!(
                    "unsupported sample format: {:?}",
                    format
                ))),
            };

            let stream = match stream_result {
                Ok(s) => s,
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };

            if let Err(e) = stream.play() {
                let _ = ready_tx.send(Err(classify_stream_error(&e.to_string())));
                return;
            }

            // Acquisition was cancelled while the stream was being built
            if ready_tx.send(Ok(())).is_err() {
                tracing::debug!("Acquisition abandoned, closing stream");
                return;
            }

            tracing::debug!("Audio capture thread started");
            let _ = stop_rx.recv();
            drop(stream);
            tracing::debug!("Audio capture thread stopped");
        });

        match ready_rx.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = handle.join();
                return Err(e);
            }
            Err(_) => {
                return Err(CaptureError::DeviceUnavailable(
                    "capture thread exited before the stream started".to_string(),
                ))
            }
        }

        let format = StreamFormat {
            sample_rate: target_sample_rate,
            channels: 1,
        };
        let stream = InputStream::new(device_name.clone(), format, event_rx);
        tracing::info!("Using audio device: {}", device_name);

        self.threads
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(stream.id(), CaptureThread { stop_tx, handle });

        Ok(stream)
    }

    fn release(&self, stream: InputStream) {
        let thread = self
            .threads
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&stream.id());

        match thread {
            Some(CaptureThread { stop_tx, handle }) => {
                let _ = stop_tx.send(());
                if handle.join().is_err() {
                    tracing::warn!("Audio capture thread panicked");
                }
                tracing::debug!("Released audio device: {}", stream.device());
            }
            None => tracing::debug!("Stream {} already released", stream.id()),
        }
    }
}

impl Drop for CpalInput {
    fn drop(&mut self) {
        let threads = self.threads.get_mut().unwrap_or_else(|e| e.into_inner());
        for (_, thread) in threads.drain() {
            let _ = thread.stop_tx.send(());
            let _ = thread.handle.join();
        }
    }
}

/// Build an input stream for a specific sample type
fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    params: StreamBuildParams,
    err_fn: impl FnMut(cpal::StreamError) + Send + 'static,
) -> Result<cpal::Stream, CaptureError>
where
    T: cpal::Sample + cpal::SizedSample + Send + 'static,
    f32: cpal::FromSample<T>,
{
    use cpal::traits::DeviceTrait;

    let StreamBuildParams {
        tx,
        source_rate,
        target_rate,
        source_channels,
    } = params;

    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                let mono_f32: Vec<f32> = data
                    .chunks(source_channels)
                    .map(|frame| {
                        let sum: f32 = frame
                            .iter()
                            .map(|&s| <f32 as cpal::FromSample<T>>::from_sample_(s))
                            .sum();
                        sum / source_channels as f32
                    })
                    .collect();

                let resampled = if source_rate != target_rate {
                    resample(&mono_f32, source_rate, target_rate)
                } else {
                    mono_f32
                };

                // Receiver gone means the session is over
                let _ = tx.try_send(InputEvent::Samples(resampled));
            },
            err_fn,
            None,
        )
        .map_err(|e| classify_stream_error(&e.to_string()))
}

/// Linear interpolation resampling
fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = to_rate as f64 / from_rate as f64;
    let new_len = (samples.len() as f64 * ratio).ceil() as usize;
    let mut output = Vec::with_capacity(new_len);

    for i in 0..new_len {
        let src_idx = i as f64 / ratio;
        let idx = src_idx.floor() as usize;
        let frac = (src_idx - idx as f64) as f32;

        let sample = if idx + 1 < samples.len() {
            samples[idx] * (1.0 - frac) + samples[idx + 1] * frac
        } else {
            samples.get(idx).copied().unwrap_or(0.0)
        };

        output.push(sample);
    }

    output
}
