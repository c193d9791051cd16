//! Playback of finished takes
//!
//! `PlaybackCursor` is the pure position model (play/pause, seek, progress
//! display). `Player` drives a cursor while rodio plays a WAV file.

use super::wav::wav_duration;
use crate::error::VocalistError;
use crate::recording::format_time;
use rodio::{Decoder, OutputStream, Sink};
use std::io::Cursor;
use std::sync::mpsc::{self as std_mpsc, RecvTimeoutError};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;

const PROGRESS_INTERVAL: Duration = Duration::from_millis(250);

/// Position within one artifact
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackCursor {
    position: Duration,
    total: Duration,
    playing: bool,
}

impl PlaybackCursor {
    pub fn new(total: Duration) -> Self {
        Self {
            position: Duration::ZERO,
            total,
            playing: false,
        }
    }

    pub fn position(&self) -> Duration {
        self.position
    }

    pub fn total(&self) -> Duration {
        self.total
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn at_end(&self) -> bool {
        self.position >= self.total
    }

    /// Play/pause. Playing from the end starts over.
    pub fn toggle(&mut self) {
        if !self.playing && self.at_end() {
            self.position = Duration::ZERO;
        }
        self.playing = !self.playing;
    }

    /// Jump to `to`, clamped to the artifact
    pub fn seek(&mut self, to: Duration) {
        self.position = to.min(self.total);
    }

    /// Move forward by `dt` while playing; stops at the end
    pub fn advance(&mut self, dt: Duration) {
        if !self.playing {
            return;
        }
        self.position = (self.position + dt).min(self.total);
        if self.at_end() {
            self.playing = false;
        }
    }

    /// Mark playback as finished
    pub fn finish(&mut self) {
        self.position = self.total;
        self.playing = false;
    }

    /// "M:SS / M:SS"
    pub fn display(&self) -> String {
        format!(
            "{} / {}",
            format_time(self.position.as_secs()),
            format_time(self.total.as_secs())
        )
    }
}

enum PlayerCommand {
    Toggle,
    Stop,
}

/// Plays one WAV file on the default output device
pub struct Player {
    commands: std_mpsc::Sender<PlayerCommand>,
    progress: watch::Receiver<PlaybackCursor>,
    task: JoinHandle<Result<(), VocalistError>>,
}

impl Player {
    /// Start playing `wav` immediately
    pub fn spawn(wav: Vec<u8>) -> Result<Self, VocalistError> {
        let total = wav_duration(&wav)?;
        let (commands_tx, commands_rx) = std_mpsc::channel();
        let (progress_tx, progress_rx) = watch::channel(PlaybackCursor::new(total));

        // rodio's OutputStream is not Send, so it stays on this blocking thread
        let task = tokio::task::spawn_blocking(move || {
            let (_stream, handle) = OutputStream::try_default()
                .map_err(|e| VocalistError::Playback(format!("Failed to open audio output: {}", e)))?;
            let sink = Sink::try_new(&handle)
                .map_err(|e| VocalistError::Playback(format!("Failed to create audio sink: {}", e)))?;
            let source = Decoder::new(Cursor::new(wav))
                .map_err(|e| VocalistError::AudioFormat(format!("Failed to decode audio: {}", e)))?;
            sink.append(source);

            let mut cursor = PlaybackCursor::new(total);
            cursor.toggle();
            progress_tx.send_replace(cursor.clone());
            let mut last = Instant::now();

            loop {
                match commands_rx.recv_timeout(PROGRESS_INTERVAL) {
                    Ok(PlayerCommand::Toggle) => {
                        cursor.advance(last.elapsed());
                        last = Instant::now();
                        cursor.toggle();
                        if cursor.is_playing() {
                            sink.play();
                        } else {
                            sink.pause();
                        }
                    }
                    Ok(PlayerCommand::Stop) | Err(RecvTimeoutError::Disconnected) => {
                        sink.stop();
                        break;
                    }
                    Err(RecvTimeoutError::Timeout) => {}
                }

                cursor.advance(last.elapsed());
                last = Instant::now();

                if sink.empty() {
                    cursor.finish();
                    progress_tx.send_replace(cursor);
                    break;
                }
                progress_tx.send_replace(cursor.clone());
            }

            tracing::debug!("Playback finished");
            Ok(())
        });

        Ok(Self {
            commands: commands_tx,
            progress: progress_rx,
            task,
        })
    }

    pub fn toggle(&self) {
        let _ = self.commands.send(PlayerCommand::Toggle);
    }

    pub fn stop(&self) {
        let _ = self.commands.send(PlayerCommand::Stop);
    }

    /// Follow the cursor as playback progresses
    pub fn subscribe(&self) -> watch::Receiver<PlaybackCursor> {
        self.progress.clone()
    }

    /// Wait until playback ends or is stopped
    pub async fn wait(self) -> Result<(), VocalistError> {
        let Player { commands, task, .. } = self;
        let result = task
            .await
            .map_err(|e| VocalistError::Playback(format!("Playback task failed: {}", e)))?;
        drop(commands);
        result
    }
}
