//! Platform-specific desktop notifications
//!
//! Provides a unified interface for sending desktop notifications on
//! different platforms:
//! - Linux: Uses notify-send (libnotify)
//! - macOS: Uses osascript (AppleScript)

use crate::config::NotificationConfig;
use crate::error::CaptureError;
use std::process::Stdio;
use tokio::process::Command;

/// Events the user can be notified about
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    RecordingStarted,
    RecordingStopped { duration: String },
    RecordingFailed(CaptureError),
    Saved { title: String },
    SaveFailed(String),
}

impl Notice {
    /// Whether the configuration asks for this notice
    pub fn enabled(&self, config: &NotificationConfig) -> bool {
        match self {
            Notice::RecordingStarted => config.on_recording_start,
            Notice::RecordingStopped { .. } => config.on_recording_stop,
            // A cancelled acquisition is the user's own doing
            Notice::RecordingFailed(error) => config.on_error && error.is_user_visible(),
            Notice::SaveFailed(_) => config.on_error,
            Notice::Saved { .. } => config.on_saved,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Notice::RecordingStarted => "Recording",
            Notice::RecordingStopped { .. } => "Recording stopped",
            Notice::RecordingFailed(_) => "Recording failed",
            Notice::Saved { .. } => "Recording saved",
            Notice::SaveFailed(_) => "Save failed",
        }
    }

    pub fn body(&self) -> String {
        match self {
            Notice::RecordingStarted => "Sing! Press Enter to stop.".to_string(),
            Notice::RecordingStopped { duration } => format!("Take length {}", duration),
            Notice::RecordingFailed(error) => error.to_string(),
            Notice::Saved { title } => format!("'{}' is in your recordings", title),
            Notice::SaveFailed(message) => message.clone(),
        }
    }
}

/// Send `notice` if the configuration enables it
pub async fn notify(config: &NotificationConfig, notice: Notice) {
    if notice.enabled(config) {
        send(notice.title(), &notice.body()).await;
    } else {
        tracing::trace!("Notification suppressed: {:?}", notice);
    }
}

/// Send a desktop notification with the given title and body.
///
/// Notification failures are logged but don't propagate errors
/// (notifications are best-effort).
pub async fn send(title: &str, body: &str) {
    #[cfg(target_os = "linux")]
    send_linux(title, body).await;

    #[cfg(target_os = "macos")]
    send_macos(title, body).await;

    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    {
        tracing::debug!("Notifications not supported on this platform");
        let _ = (title, body);
    }
}

#[cfg(target_os = "linux")]
async fn send_linux(title: &str, body: &str) {
    let result = Command::new("notify-send")
        .args(["--app-name=Vocalist", "--expire-time=3000", title, body])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;

    if let Err(e) = result {
        tracing::debug!("Failed to send notification: {}", e);
    }
}

#[cfg(target_os = "macos")]
async fn send_macos(title: &str, body: &str) {
    let script = format!(
        r#"display notification "{}" with title "{}""#,
        escape_applescript(body),
        escape_applescript(title)
    );

    let result = Command::new("osascript")
        .args(["-e", &script])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;

    if let Err(e) = result {
        tracing::debug!("Failed to send notification: {}", e);
    }
}

#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
fn escape_applescript(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}
