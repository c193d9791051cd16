//! WAV container handling
//!
//! Sessions produce raw `audio/L16` payloads. The backend stores and serves
//! WAV, and the player decodes WAV, so artifacts are wrapped with hound
//! before they leave the recorder.

use crate::error::VocalistError;
use crate::recording::FinalizedArtifact;
use std::io::Cursor;
use std::time::Duration;

pub const WAV_MIME: &str = "audio/wav";

/// Parameters of an `audio/L16` MIME type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

/// Parse `audio/L16;rate=16000;channels=1`. Channels default to 1.
pub fn parse_l16_mime(mime: &str) -> Option<PcmFormat> {
    let mut parts = mime.split(';').map(str::trim);
    if !parts.next()?.eq_ignore_ascii_case("audio/L16") {
        return None;
    }

    let mut sample_rate = None;
    let mut channels = 1;
    for param in parts {
        let (key, value) = param.split_once('=')?;
        match key.trim() {
            "rate" => sample_rate = value.trim().parse().ok(),
            "channels" => channels = value.trim().parse().ok()?,
            _ => {}
        }
    }

    Some(PcmFormat {
        sample_rate: sample_rate?,
        channels,
    })
}

/// Wrap an L16 artifact in a WAV container. WAV artifacts pass through.
pub fn l16_to_wav(artifact: &FinalizedArtifact) -> Result<FinalizedArtifact, VocalistError> {
    if artifact.mime_type() == WAV_MIME {
        return Ok(artifact.clone());
    }

    let format = parse_l16_mime(artifact.mime_type()).ok_or_else(|| {
        VocalistError::AudioFormat(format!("cannot convert {} to WAV", artifact.mime_type()))
    })?;
    if artifact.len() % 2 != 0 {
        return Err(VocalistError::AudioFormat(
            "PCM payload has an odd number of bytes".to_string(),
        ));
    }

    let spec = hound::WavSpec {
        channels: format.channels,
        sample_rate: format.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(artifact.len() + 44));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| VocalistError::AudioFormat(e.to_string()))?;
        for pair in artifact.payload().chunks_exact(2) {
            writer
                .write_sample(i16::from_le_bytes([pair[0], pair[1]]))
                .map_err(|e| VocalistError::AudioFormat(e.to_string()))?;
        }
        writer
            .finalize()
            .map_err(|e| VocalistError::AudioFormat(e.to_string()))?;
    }

    Ok(FinalizedArtifact::new(
        cursor.into_inner(),
        WAV_MIME,
        artifact.duration(),
    ))
}

/// Playing time of a WAV file
pub fn wav_duration(bytes: &[u8]) -> Result<Duration, VocalistError> {
    let reader = hound::WavReader::new(Cursor::new(bytes))
        .map_err(|e| VocalistError::AudioFormat(e.to_string()))?;
    let spec = reader.spec();
    if spec.sample_rate == 0 {
        return Err(VocalistError::AudioFormat("sample rate is zero".to_string()));
    }
    // duration() counts frames, not samples
    let frames = reader.duration() as f64;
    Ok(Duration::from_secs_f64(frames / spec.sample_rate as f64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::pcm_encoder::encode_pcm16;

    #[test]
    fn test_parse_l16_mime() {
        assert_eq!(
            parse_l16_mime("audio/L16;rate=16000;channels=1"),
            Some(PcmFormat {
                sample_rate: 16000,
                channels: 1
            })
        );
        assert_eq!(
            parse_l16_mime("audio/L16; rate=44100; channels=2"),
            Some(PcmFormat {
                sample_rate: 44100,
                channels: 2
            })
        );
        assert_eq!(parse_l16_mime("audio/L16;rate=8000").unwrap().channels, 1);
        assert_eq!(parse_l16_mime("audio/L16"), None);
        assert_eq!(parse_l16_mime("audio/webm;codecs=opus"), None);
    }

    #[test]
    fn test_l16_to_wav_preserves_samples() {
        let payload = encode_pcm16(&vec![0.5; 16000]);
        let artifact = FinalizedArtifact::new(
            payload,
            "audio/L16;rate=16000;channels=1",
            Duration::from_millis(1020),
        );

        let wav = l16_to_wav(&artifact).unwrap();
        assert_eq!(wav.mime_type(), WAV_MIME);
        assert_eq!(wav.duration(), artifact.duration());
        assert_eq!(&wav.payload()[..4], b"RIFF");
        assert_eq!(wav_duration(wav.payload()).unwrap(), Duration::from_secs(1));

        let mut reader = hound::WavReader::new(Cursor::new(wav.payload())).unwrap();
        let first: i16 = reader.samples::<i16>().next().unwrap().unwrap();
        assert_eq!(first, (0.5 * i16::MAX as f32) as i16);
    }

    #[test]
    fn test_wav_passes_through() {
        let artifact = FinalizedArtifact::new(vec![1, 2, 3], WAV_MIME, Duration::ZERO);
        assert_eq!(l16_to_wav(&artifact).unwrap(), artifact);
    }

    #[test]
    fn test_rejects_unknown_format() {
        let artifact = FinalizedArtifact::new(vec![0; 4], "audio/ogg", Duration::ZERO);
        assert!(matches!(
            l16_to_wav(&artifact),
            Err(VocalistError::AudioFormat(_))
        ));
        assert!(wav_duration(b"not a wav").is_err());
    }
}
