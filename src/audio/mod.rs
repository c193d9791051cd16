//! Audio capture, encoding and playback
//!
//! Provides microphone input using cpal, which works with PipeWire,
//! PulseAudio, and ALSA backends, a PCM encoder that chunks the samples, WAV
//! wrapping for storage, and rodio playback.

pub mod cpal_capture;
pub mod pcm_encoder;
pub mod playback;
pub mod wav;

pub use cpal_capture::CpalInput;
pub use pcm_encoder::PcmEncoder;
pub use playback::{PlaybackCursor, Player};

use crate::config::AudioConfig;
use crate::error::CaptureError;
use crate::recording::{Encoder, MediaInputProvider};
use std::sync::Arc;

/// Input devices known to the audio host
#[derive(Debug, Clone)]
pub struct DeviceList {
    pub host: String,
    pub default: Option<String>,
    pub devices: Vec<String>,
}

/// Enumerate input devices on the default host
pub fn list_input_devices() -> Result<DeviceList, CaptureError> {
    use cpal::traits::{DeviceTrait, HostTrait};

    let host = cpal::default_host();
    let default = host.default_input_device().and_then(|d| d.name().ok());
    let devices = host
        .input_devices()
        .map_err(|e| CaptureError::DeviceUnavailable(e.to_string()))?
        .filter_map(|d| d.name().ok())
        .collect();

    Ok(DeviceList {
        host: host.id().name().to_string(),
        default,
        devices,
    })
}

/// Factory for the microphone provider
pub fn create_provider(config: &AudioConfig) -> Arc<dyn MediaInputProvider> {
    Arc::new(CpalInput::new(config))
}

/// Factory for the session encoder
pub fn create_encoder(config: &AudioConfig) -> Box<dyn Encoder> {
    Box::new(PcmEncoder::new(config.sample_rate, config.chunk_interval()))
}
