//! Configuration loading and types for vocalist
//!
//! Configuration is loaded in layers:
//! 1. Built-in defaults
//! 2. Config file (~/.config/vocalist/config.toml)
//! 3. Environment variables (VOCALIST_*)
//! 4. CLI arguments (highest priority)

use crate::error::VocalistError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file content
pub const DEFAULT_CONFIG: &str = r#"# Vocalist Configuration
#
# Location: ~/.config/vocalist/config.toml
# All settings can be overridden via CLI flags

# Where the signed-in session is kept between invocations.
# Use "auto" for the default location ($XDG_DATA_HOME/vocalist/session.json),
# a custom path, or "disabled" to require signing in for every command.
session_file = "auto"

[backend]
# Project URL of the hosted backend (auth, tables and storage)
# Can also be set with VOCALIST_BACKEND_URL
url = ""

# Public anonymous key of the project
# Can also be set with VOCALIST_ANON_KEY
anon_key = ""

# Request timeout in seconds
timeout_secs = 30

# Storage bucket holding the audio files
recordings_bucket = "recordings"

[audio]
# Audio input device ("default" uses system default)
# List devices with: vocalist devices
device = "default"

# Sample rate in Hz for the recorded audio
sample_rate = 16000

# How often the encoder hands over a chunk of audio, in milliseconds
chunk_interval_ms = 1000

# Maximum recording duration in seconds (safety limit)
max_duration_secs = 600

[notification]
# Show notification when recording starts
on_recording_start = false

# Show notification when recording stops
on_recording_stop = false

# Show notification when a recording fails (microphone denied, device lost)
on_error = true

# Show notification when a recording has been saved
on_saved = true
"#;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub audio: AudioConfig,

    #[serde(default)]
    pub notification: NotificationConfig,

    /// Optional path to the persisted auth session
    /// "auto" resolves to the data directory, "disabled" turns persistence off
    #[serde(default)]
    pub session_file: Option<String>,
}

/// Hosted backend configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Project URL, e.g. "https://abcd.supabase.co"
    #[serde(default)]
    pub url: String,

    /// Public anonymous API key
    #[serde(default)]
    pub anon_key: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Storage bucket for audio files
    #[serde(default = "default_bucket")]
    pub recordings_bucket: String,
}

/// Audio capture configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AudioConfig {
    /// Input device name, or "default"
    #[serde(default = "default_device")]
    pub device: String,

    /// Sample rate in Hz for the encoded audio
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Encoder chunk cadence in milliseconds
    #[serde(default = "default_chunk_interval_ms")]
    pub chunk_interval_ms: u64,

    /// Maximum recording duration in seconds (safety limit)
    #[serde(default = "default_max_duration_secs")]
    pub max_duration_secs: u32,
}

/// Desktop notification toggles
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotificationConfig {
    #[serde(default)]
    pub on_recording_start: bool,

    #[serde(default)]
    pub on_recording_stop: bool,

    #[serde(default = "default_true")]
    pub on_error: bool,

    #[serde(default = "default_true")]
    pub on_saved: bool,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_bucket() -> String {
    "recordings".to_string()
}

fn default_device() -> String {
    "default".to_string()
}

fn default_sample_rate() -> u32 {
    16000
}

fn default_chunk_interval_ms() -> u64 {
    1000
}

fn default_max_duration_secs() -> u32 {
    600
}

const MIN_SAMPLE_RATE: u32 = 8000;
const MAX_SAMPLE_RATE: u32 = 192_000;

fn default_true() -> bool {
    true
}

impl AudioConfig {
    /// Chunk cadence of the encoder
    pub fn chunk_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.chunk_interval_ms.max(1))
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            anon_key: String::new(),
            timeout_secs: default_timeout_secs(),
            recordings_bucket: default_bucket(),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: default_device(),
            sample_rate: default_sample_rate(),
            chunk_interval_ms: default_chunk_interval_ms(),
            max_duration_secs: default_max_duration_secs(),
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            on_recording_start: false,
            on_recording_stop: false,
            on_error: true,
            on_saved: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            audio: AudioConfig::default(),
            notification: NotificationConfig::default(),
            session_file: Some("auto".to_string()),
        }
    }
}

impl Config {
    /// Get the default config file path
    pub fn default_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Resolve the session file path from configuration
    /// Returns None if persistence is disabled
    pub fn resolve_session_file(&self) -> Option<PathBuf> {
        self.session_file.as_ref().and_then(|path| {
            match path.to_lowercase().as_str() {
                "disabled" | "none" | "off" | "false" => None,
                "auto" => Some(Self::data_dir().join("session.json")),
                _ => Some(PathBuf::from(path)),
            }
        })
    }

    /// Get the config directory path
    pub fn config_dir() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "vocalist")
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the data directory path (session file, exported audio)
    pub fn data_dir() -> PathBuf {
        directories::ProjectDirs::from("", "", "vocalist")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Reject values that would produce unusable audio
    pub fn validate(&self) -> Result<(), VocalistError> {
        if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&self.audio.sample_rate) {
            return Err(VocalistError::Config(format!(
                "audio.sample_rate must be between {} and {} Hz, got {}",
                MIN_SAMPLE_RATE, MAX_SAMPLE_RATE, self.audio.sample_rate
            )));
        }
        Ok(())
    }

    /// Recording safety limit, None when set to 0
    pub fn max_duration(&self) -> Option<std::time::Duration> {
        match self.audio.max_duration_secs {
            0 => None,
            secs => Some(std::time::Duration::from_secs(secs as u64)),
        }
    }
}

/// Load configuration from file, with defaults for missing values
pub fn load_config(path: Option<&Path>) -> Result<Config, VocalistError> {
    let mut config = Config::default();

    let config_path = path.map(PathBuf::from).or_else(Config::default_path);

    if let Some(ref path) = config_path {
        if path.exists() {
            tracing::debug!("Loading config from {:?}", path);
            let contents = std::fs::read_to_string(path)
                .map_err(|e| VocalistError::Config(format!("Failed to read config: {}", e)))?;

            config = toml::from_str(&contents)
                .map_err(|e| VocalistError::Config(format!("Invalid config: {}", e)))?;
        } else {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
        }
    }

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    config.validate()?;

    Ok(config)
}

/// Override values from environment variables
fn apply_env_overrides(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(url) = lookup("VOCALIST_BACKEND_URL") {
        config.backend.url = url;
    }
    if let Some(key) = lookup("VOCALIST_ANON_KEY") {
        config.backend.anon_key = key;
    }
    if let Some(device) = lookup("VOCALIST_AUDIO_DEVICE") {
        config.audio.device = device;
    }
}

/// Write the commented default configuration if no file exists yet
pub fn write_default_config(path: &Path) -> Result<bool, VocalistError> {
    if path.exists() {
        return Ok(false);
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| VocalistError::Config(format!("Failed to create config dir: {}", e)))?;
    }

    std::fs::write(path, DEFAULT_CONFIG)
        .map_err(|e| VocalistError::Config(format!("Failed to write config: {}", e)))?;

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.audio.device, "default");
        assert_eq!(config.audio.sample_rate, 16000);
        assert_eq!(config.audio.chunk_interval_ms, 1000);
        assert_eq!(config.backend.recordings_bucket, "recordings");
        assert!(config.notification.on_error);
        assert!(!config.notification.on_recording_start);
    }

    #[test]
    fn test_default_config_template_parses() {
        let config: Config = toml::from_str(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.audio.max_duration_secs, 600);
        assert_eq!(config.backend.timeout_secs, 30);
        assert_eq!(config.session_file.as_deref(), Some("auto"));
    }

    #[test]
    fn test_parse_partial_config() {
        let toml_str = r#"
            [backend]
            url = "https://example.supabase.co"
            anon_key = "public-key"

            [audio]
            device = "USB Audio"
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.backend.url, "https://example.supabase.co");
        assert_eq!(config.backend.recordings_bucket, "recordings");
        assert_eq!(config.audio.device, "USB Audio");
        assert_eq!(config.audio.sample_rate, 16000);
        assert!(config.notification.on_saved);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("VOCALIST_BACKEND_URL", "https://env.example"),
            ("VOCALIST_ANON_KEY", "env-key"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        apply_env_overrides(&mut config, |key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.backend.url, "https://env.example");
        assert_eq!(config.backend.anon_key, "env-key");
        assert_eq!(config.audio.device, "default");
    }

    #[test]
    fn test_resolve_session_file() {
        let mut config = Config::default();
        assert!(config
            .resolve_session_file()
            .is_some_and(|p| p.ends_with("session.json")));

        config.session_file = Some("disabled".to_string());
        assert!(config.resolve_session_file().is_none());

        config.session_file = Some("/tmp/vocalist-session.json".to_string());
        assert_eq!(
            config.resolve_session_file(),
            Some(PathBuf::from("/tmp/vocalist-session.json"))
        );
    }

    #[test]
    fn test_max_duration_zero_disables_limit() {
        let mut config = Config::default();
        assert_eq!(
            config.max_duration(),
            Some(std::time::Duration::from_secs(600))
        );
        config.audio.max_duration_secs = 0;
        assert!(config.max_duration().is_none());
    }

    #[test]
    fn test_write_default_config_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        assert!(write_default_config(&path).unwrap());
        assert!(!write_default_config(&path).unwrap());
        assert!(std::fs::read_to_string(&path)
            .unwrap()
            .contains("[backend]"));
    }

    #[test]
    fn test_zero_sample_rate_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[audio]\nsample_rate = 0\n").unwrap();

        let err = load_config(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("sample_rate"));

        std::fs::write(&path, "[audio]\nsample_rate = 48000\n").unwrap();
        assert_eq!(load_config(Some(&path)).unwrap().audio.sample_rate, 48000);
    }

    #[test]
    fn test_chunk_interval_never_zero() {
        let mut audio = AudioConfig::default();
        assert_eq!(audio.chunk_interval(), std::time::Duration::from_secs(1));
        audio.chunk_interval_ms = 0;
        assert_eq!(audio.chunk_interval(), std::time::Duration::from_millis(1));
    }
}
