//! Command handlers
//!
//! Glue between the CLI, the recorder and the backend. Blocking gateway calls
//! run on tokio's blocking pool.

use crate::audio::{self, wav, PlaybackCursor, Player};
use crate::config::Config;
use crate::dashboard;
use crate::error::{CaptureError, GatewayError, Result, VocalistError};
use crate::gateway::{
    AuthUser, BackendClient, IdentityGateway, NewNote, NewRecording, PersistenceGateway,
    Recording, SessionStore, SignIn, SignUp,
};
use crate::notification::{notify, Notice};
use crate::prompt;
use crate::recording::{
    Encoder, FinalizedArtifact, MediaInputProvider, Recorder, RecorderEvent, RecorderOptions,
};
use crate::training::{Programme, CATALOG};
use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};

/// Run a blocking gateway call off the async threads
pub async fn run_blocking<T, F>(call: F) -> Result<T>
where
    F: FnOnce() -> std::result::Result<T, GatewayError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(call)
        .await
        .map_err(|e| VocalistError::Io(std::io::Error::other(e)))?
        .map_err(VocalistError::from)
}

/// Record one take.
///
/// Waits for the microphone, calls `on_started` once it was granted, reports
/// the running duration through `on_progress`, and stops when `stop` resolves
/// or the maximum duration is reached. If `stop` resolves while the microphone
/// is still being acquired, the take is cancelled.
pub async fn capture_take<S>(
    provider: Arc<dyn MediaInputProvider>,
    encoder: Box<dyn Encoder>,
    options: RecorderOptions,
    stop: S,
    on_started: impl FnOnce(),
    mut on_progress: impl FnMut(&str),
) -> Result<FinalizedArtifact>
where
    S: Future<Output = ()>,
{
    let (events_tx, mut events) = mpsc::unbounded_channel();
    let recorder = Recorder::spawn(provider, encoder, Box::new(events_tx), options);
    tokio::pin!(stop);

    tokio::select! {
        started = recorder.start() => {
            started?;
            on_started();
        }
        _ = &mut stop => {
            recorder.stop().await;
            recorder.shutdown().await;
            return Err(CaptureError::Cancelled.into());
        }
    }

    let mut stop_requested = false;
    loop {
        tokio::select! {
            _ = &mut stop, if !stop_requested => {
                stop_requested = true;
                recorder.stop().await;
            }
            event = events.recv() => match event {
                Some(RecorderEvent::DurationUpdate(formatted)) => on_progress(&formatted),
                Some(RecorderEvent::Completed(artifact)) => {
                    recorder.shutdown().await;
                    return Ok(artifact);
                }
                Some(RecorderEvent::Failed(error)) => {
                    recorder.shutdown().await;
                    return Err(error.into());
                }
                None => {
                    return Err(CaptureError::EncoderFault(
                        "recorder stopped without a result".to_string(),
                    )
                    .into());
                }
            }
        }
    }
}

/// Convert a take to WAV and store it as a recording
pub async fn save_take(
    gateway: Arc<dyn PersistenceGateway>,
    title: &str,
    artifact: &FinalizedArtifact,
    date: chrono::NaiveDate,
) -> Result<Recording> {
    let recording = NewRecording {
        title: title.trim().to_string(),
        audio: wav::l16_to_wav(artifact)?,
        duration: artifact.formatted_duration(),
        date: date.format("%Y-%m-%d").to_string(),
    };
    recording.validate()?;

    run_blocking(move || gateway.create_recording(&recording)).await
}

/// Download a stored recording, checking that it is playable WAV
pub async fn fetch_take(gateway: Arc<dyn PersistenceGateway>, id: i64) -> Result<Vec<u8>> {
    let audio = run_blocking(move || gateway.recording_audio(id)).await?;
    let duration = wav::wav_duration(&audio)?;
    tracing::debug!("Recording {} is {:.1}s", id, duration.as_secs_f64());
    Ok(audio)
}

/// Title used when none was given
pub fn default_title(now: chrono::DateTime<chrono::Local>) -> String {
    format!("Practice {}", now.format("%Y-%m-%d %H:%M"))
}

/// Resolves once a line was typed on stdin. The reader thread ends after
/// that one line, so later prompts get the terminal to themselves.
fn one_line() -> oneshot::Receiver<()> {
    let (tx, rx) = oneshot::channel();
    std::thread::spawn(move || {
        let mut line = String::new();
        if matches!(std::io::stdin().read_line(&mut line), Ok(n) if n > 0) {
            let _ = tx.send(());
        }
    });
    rx
}

/// Lines typed on stdin, read on a detached thread so exit never waits on it
fn stdin_lines() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut line = String::new();
        while stdin.read_line(&mut line).map(|n| n > 0).unwrap_or(false) {
            if tx.send(line.trim_end().to_string()).is_err() {
                break;
            }
            line.clear();
        }
    });
    rx
}

/// Arguments of `vocalist record`
#[derive(Debug, Clone, Default)]
pub struct RecordRequest {
    pub title: Option<String>,
    pub save: bool,
    pub output: Option<PathBuf>,
    /// Offer to listen back and discard before keeping the take
    pub review: bool,
}

/// What to do with a finished take
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewChoice {
    Keep,
    Listen,
    Discard,
}

impl ReviewChoice {
    pub const ALL: [ReviewChoice; 3] = [
        ReviewChoice::Keep,
        ReviewChoice::Listen,
        ReviewChoice::Discard,
    ];

    fn label(self, saving: bool) -> &'static str {
        match self {
            ReviewChoice::Keep if saving => "Save",
            ReviewChoice::Keep => "Keep",
            ReviewChoice::Listen => "Listen",
            ReviewChoice::Discard => "Discard",
        }
    }
}

/// The application: configuration plus lazily built backend client
pub struct App {
    config: Config,
}

impl App {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn backend(&self) -> Result<Arc<BackendClient>> {
        let store = SessionStore::new(self.config.resolve_session_file());
        let client = BackendClient::new(&self.config.backend, store)?;
        Ok(Arc::new(client))
    }

    pub async fn record(&self, request: RecordRequest) -> Result<()> {
        // Fail before recording rather than after
        let backend = if request.save {
            let backend = self.backend()?;
            let check = Arc::clone(&backend);
            if run_blocking(move || check.current_user()).await?.is_none() {
                return Err(GatewayError::NotAuthenticated.into());
            }
            Some(backend)
        } else {
            None
        };

        let provider = audio::create_provider(&self.config.audio);
        let encoder = audio::create_encoder(&self.config.audio);
        let options = RecorderOptions {
            max_duration: self.config.max_duration(),
        };

        println!("Waiting for microphone...");
        let notifications = self.config.notification.clone();
        let started_notice = notifications.clone();

        let mut enter = one_line();
        let mut line_read = false;
        let stop = async {
            tokio::select! {
                read = &mut enter => {
                    line_read = true;
                    if read.is_err() {
                        // stdin closed: only Ctrl-C stops
                        let _ = tokio::signal::ctrl_c().await;
                    }
                }
                _ = tokio::signal::ctrl_c() => {}
            }
        };

        let result = capture_take(
            provider,
            encoder,
            options,
            stop,
            move || {
                println!("Recording. Press Enter or Ctrl-C to stop.");
                tokio::spawn(async move {
                    notify(&started_notice, Notice::RecordingStarted).await;
                });
            },
            |elapsed| {
                print!("\r● REC {}  ", elapsed);
                let _ = std::io::stdout().flush();
            },
        )
        .await;
        println!();

        let artifact = match result {
            Ok(artifact) => artifact,
            Err(VocalistError::Capture(CaptureError::Cancelled)) => {
                println!("Recording cancelled.");
                return Ok(());
            }
            Err(VocalistError::Capture(error)) => {
                notify(&notifications, Notice::RecordingFailed(error.clone())).await;
                return Err(error.into());
            }
            Err(e) => return Err(e),
        };

        let duration = artifact.formatted_duration();
        println!("Recorded {} ({} bytes)", duration, artifact.len());
        notify(&notifications, Notice::RecordingStopped { duration }).await;

        if request.review && prompt::is_interactive() {
            if !line_read {
                println!("Press Enter to review the take.");
                let _ = enter.await;
            }
            if !review_take(&artifact, backend.is_some()).await? {
                println!("Take discarded.");
                return Ok(());
            }
        }

        if let Some(ref path) = request.output {
            write_wav(path, &artifact)?;
            println!("Wrote {}", path.display());
        }

        let Some(backend) = backend else {
            return Ok(());
        };
        let title = request
            .title
            .unwrap_or_else(|| default_title(chrono::Local::now()));
        let today = chrono::Local::now().date_naive();

        match save_take(backend, &title, &artifact, today).await {
            Ok(recording) => {
                println!("Saved '{}' (id {})", recording.title, recording.id);
                notify(&notifications, Notice::Saved { title: recording.title }).await;
                Ok(())
            }
            Err(e) => {
                notify(&notifications, Notice::SaveFailed(e.to_string())).await;
                Err(e)
            }
        }
    }

    pub async fn play(&self, path: &Path) -> Result<()> {
        let bytes = std::fs::read(path)?;
        play_wav(bytes, &path.display().to_string(), true).await
    }

    pub async fn list_notes(&self) -> Result<()> {
        let backend = self.backend()?;
        let notes = run_blocking(move || backend.list_notes()).await?;
        if notes.is_empty() {
            println!("No notes yet. Add one with: vocalist notes add --title <TITLE>");
        }
        for note in notes {
            println!("[{}] {}  {}", note.id, note.date, note.title);
            if !note.content.is_empty() {
                println!("      {}", note.content);
            }
        }
        Ok(())
    }

    pub async fn add_note(&self, title: String, content: String, date: Option<String>) -> Result<()> {
        let backend = self.backend()?;
        let note = NewNote {
            title,
            content,
            date: date.unwrap_or_else(|| chrono::Local::now().format("%Y-%m-%d").to_string()),
        };
        let created = run_blocking(move || backend.create_note(&note)).await?;
        println!("Created note {}", created.id);
        Ok(())
    }

    pub async fn delete_note(&self, id: i64, yes: bool) -> Result<()> {
        if !prompt::confirm_delete(&format!("note {}", id), yes)? {
            println!("Kept note {}", id);
            return Ok(());
        }
        let backend = self.backend()?;
        run_blocking(move || backend.delete_note(id)).await?;
        println!("Deleted note {}", id);
        Ok(())
    }

    pub async fn list_recordings(&self) -> Result<()> {
        let backend = self.backend()?;
        let recordings = run_blocking(move || backend.list_recordings()).await?;
        if recordings.is_empty() {
            println!("No recordings yet. Record one with: vocalist record");
        }
        for r in recordings {
            println!("[{}] {}  {:>6}  {}", r.id, r.date, r.duration, r.title);
            println!("      {}", r.audio_url);
        }
        Ok(())
    }

    pub async fn play_recording(&self, id: i64) -> Result<()> {
        let backend = self.backend()?;
        println!("Fetching recording {}...", id);
        let audio = fetch_take(backend, id).await?;
        play_wav(audio, &format!("recording {}", id), true).await
    }

    pub async fn delete_recording(&self, id: i64, yes: bool) -> Result<()> {
        if !prompt::confirm_delete(&format!("recording {} and its audio", id), yes)? {
            println!("Kept recording {}", id);
            return Ok(());
        }
        let backend = self.backend()?;
        run_blocking(move || backend.delete_recording(id)).await?;
        println!("Deleted recording {}", id);
        Ok(())
    }

    pub async fn sign_up(&self, request: SignUp) -> Result<()> {
        request.validate()?;
        let backend = self.backend()?;
        let user = run_blocking(move || backend.sign_up(&request)).await?;
        println!("Account created for {}.", user.email);
        println!("If email confirmation is enabled, confirm your address before signing in.");
        Ok(())
    }

    pub async fn sign_in(&self, request: SignIn) -> Result<()> {
        let backend = self.backend()?;
        let user = run_blocking(move || backend.sign_in(&request)).await?;
        println!("Welcome back, {}!", user.greeting_name());
        Ok(())
    }

    pub async fn sign_out(&self) -> Result<()> {
        let backend = self.backend()?;
        run_blocking(move || backend.sign_out()).await?;
        println!("Signed out.");
        Ok(())
    }

    pub async fn whoami(&self) -> Result<()> {
        let backend = self.backend()?;
        match run_blocking(move || backend.current_user()).await? {
            Some(user) => print_user(&user),
            None => println!("Not signed in."),
        }
        Ok(())
    }

    pub async fn dashboard(&self) -> Result<()> {
        let backend = self.backend()?;
        let summary = run_blocking(move || dashboard::load(backend.as_ref())).await?;
        print!("{}", summary);
        Ok(())
    }

    pub fn exercises(&self, skip: usize) {
        let programme = Programme::starting_at(skip);
        println!("Current exercise:\n  {}\n", programme.current());
        println!("Programme ({} min):", Programme::total_minutes());
        for (i, exercise) in CATALOG.iter().enumerate() {
            let marker = if i == programme.index() { ">" } else { " " };
            println!("{} {}. {}", marker, i + 1, exercise.title);
        }
    }

    pub fn devices(&self) -> Result<()> {
        let list = audio::list_input_devices()?;
        println!("Audio host: {}", list.host);
        println!(
            "Default input: {}",
            list.default.as_deref().unwrap_or("(none)")
        );
        if list.devices.is_empty() {
            println!("No input devices found. Recording is not available on this system.");
        }
        for name in &list.devices {
            println!("  - {}", name);
        }
        println!("Configured device: {}", self.config.audio.device);
        Ok(())
    }

    pub fn show_config(&self) -> Result<()> {
        let text = toml::to_string_pretty(&self.config)
            .map_err(|e| VocalistError::Config(e.to_string()))?;
        if let Some(path) = Config::default_path() {
            println!("# {}", path.display());
        }
        print!("{}", text);
        Ok(())
    }
}

/// Play WAV bytes with a live cursor until the end or Ctrl-C.
/// With `pause_on_enter`, Enter toggles pause.
async fn play_wav(bytes: Vec<u8>, label: &str, pause_on_enter: bool) -> Result<()> {
    let player = Player::spawn(bytes)?;
    let mut progress = player.subscribe();
    let mut lines = pause_on_enter.then(stdin_lines);
    if pause_on_enter {
        println!("Playing {} (Enter = pause/resume, Ctrl-C = stop)", label);
    } else {
        println!("Playing {} (Ctrl-C = stop)", label);
    }

    loop {
        tokio::select! {
            changed = progress.changed() => {
                if changed.is_err() {
                    break;
                }
                render_cursor(&progress);
            }
            Some(_) = next_line(&mut lines) => player.toggle(),
            _ = tokio::signal::ctrl_c() => {
                player.stop();
                break;
            }
        }
    }
    println!();
    player.wait().await
}

async fn next_line(lines: &mut Option<mpsc::UnboundedReceiver<String>>) -> Option<String> {
    match lines {
        Some(lines) => lines.recv().await,
        None => std::future::pending().await,
    }
}

/// Listen back to a take until the user keeps or discards it
async fn review_take(artifact: &FinalizedArtifact, saving: bool) -> Result<bool> {
    let labels: Vec<&str> = ReviewChoice::ALL.iter().map(|c| c.label(saving)).collect();
    loop {
        let picked = prompt::select("What should happen to this take?", &labels, 0)?;
        match ReviewChoice::ALL[picked] {
            ReviewChoice::Keep => return Ok(true),
            ReviewChoice::Listen => {
                let wav = wav::l16_to_wav(artifact)?;
                play_wav(wav.into_payload(), "the take", false).await?;
            }
            ReviewChoice::Discard => {
                if prompt::confirm("Discard this take?", false)? {
                    return Ok(false);
                }
            }
        }
    }
}

fn write_wav(path: &Path, artifact: &FinalizedArtifact) -> Result<()> {
    let wav = wav::l16_to_wav(artifact)?;
    std::fs::write(path, wav.payload())?;
    Ok(())
}

fn render_cursor(progress: &watch::Receiver<PlaybackCursor>) {
    let cursor = progress.borrow();
    let state = if cursor.is_playing() { "▶" } else { "❚❚" };
    print!("\r{} {}  ", state, cursor.display());
    let _ = std::io::stdout().flush();
}

fn print_user(user: &AuthUser) {
    let name = [user.first_name.as_deref(), user.last_name.as_deref()]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");
    if name.is_empty() {
        println!("{}", user.email);
    } else {
        println!("{} <{}>", name, user.email);
    }
    println!("id: {}", user.id);
}
