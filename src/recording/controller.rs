//! Recorder: the session driver task and its handle
//!
//! `Recorder::spawn` moves a `SessionDriver` into a tokio task. The driver
//! owns the session, the input stream, the encoder and the duration timer,
//! and multiplexes every event source in one `select!` loop:
//!
//! - commands from the `Recorder` handle (start, stop)
//! - completion of a pending microphone acquisition
//! - chunks and faults from the encoder
//! - one-second timer ticks
//! - the maximum-duration deadline
//! - the encoder flush after a stop
//!
//! The flush is polled like any other event, so commands keep being served
//! while the encoder finishes. Dropping the `Recorder` closes the command
//! channel; the driver then exits and its `Drop` aborts the encoder and hands
//! a still-held stream back to the provider, in Recording and Stopping alike.

use super::artifact::FinalizedArtifact;
use super::session::{RecordingSession, SessionSnapshot};
use super::timer::{format_time, next_tick, DurationTimer};
use super::{Encoder, EncoderEvent, InputStream, MediaInputProvider, SessionObserver};
use crate::error::CaptureError;
use crate::state::SessionState;
use std::future::{pending, Future};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, timeout, Instant};

type Acquisition = Pin<Box<dyn Future<Output = Result<InputStream, CaptureError>> + Send>>;
type Flush = Pin<Box<dyn Future<Output = Result<Vec<u8>, CaptureError>> + Send>>;
type StartReply = oneshot::Sender<Result<(), CaptureError>>;
type SharedEncoder = Arc<Mutex<Box<dyn Encoder>>>;

/// Longest the driver waits for an encoder to flush on stop
const FLUSH_LIMIT: Duration = Duration::from_secs(5);

/// Tunables for one recorder
#[derive(Debug, Clone, Default)]
pub struct RecorderOptions {
    /// Stop automatically after this long in Recording
    pub max_duration: Option<Duration>,
}

enum Command {
    Start(StartReply),
    Stop(oneshot::Sender<()>),
}

/// Handle to a running session driver
pub struct Recorder {
    commands: mpsc::Sender<Command>,
    snapshot: watch::Receiver<SessionSnapshot>,
    task: JoinHandle<()>,
}

impl Recorder {
    /// Spawn the driver for one session. Must be called inside a tokio runtime.
    pub fn spawn(
        provider: Arc<dyn MediaInputProvider>,
        encoder: Box<dyn Encoder>,
        observer: Box<dyn SessionObserver>,
        options: RecorderOptions,
    ) -> Self {
        let (commands_tx, commands_rx) = mpsc::channel(8);
        let (snapshot_tx, snapshot_rx) = watch::channel(SessionSnapshot::default());

        let driver = SessionDriver {
            session: RecordingSession::new(),
            provider,
            mime_type: encoder.mime_type().to_string(),
            encoder: Arc::new(Mutex::new(encoder)),
            observer,
            options,
            acquiring: None,
            pending_starts: Vec::new(),
            stream: None,
            events: None,
            timer: None,
            deadline: None,
            flushing: None,
            pending_stops: Vec::new(),
            snapshot: snapshot_tx,
        };
        let task = tokio::spawn(driver.run(commands_rx));

        Self {
            commands: commands_tx,
            snapshot: snapshot_rx,
            task,
        }
    }

    /// Request the microphone and begin recording.
    ///
    /// Resolves once the session is Recording or has failed. A second call
    /// while the microphone is being acquired waits for the same outcome;
    /// later calls return at once with the session's result so far.
    pub async fn start(&self) -> Result<(), CaptureError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.commands.send(Command::Start(reply_tx)).await.is_err() {
            return Err(CaptureError::Cancelled);
        }
        reply_rx.await.unwrap_or(Err(CaptureError::Cancelled))
    }

    /// Stop recording and wait until the artifact (or the failure) has been
    /// delivered to the observer. Does nothing unless Acquiring, Recording or
    /// Stopping.
    pub async fn stop(&self) {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.commands.send(Command::Stop(reply_tx)).await.is_ok() {
            let _ = reply_rx.await;
        }
    }

    pub fn state(&self) -> SessionState {
        self.snapshot.borrow().state.clone()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Watch the session as it changes
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot.clone()
    }

    /// Tear the session down and wait for the driver to exit
    pub async fn shutdown(self) {
        let Recorder { commands, task, .. } = self;
        drop(commands);
        if let Err(e) = task.await {
            tracing::warn!("Session driver ended abnormally: {}", e);
        }
    }
}

struct SessionDriver {
    session: RecordingSession,
    provider: Arc<dyn MediaInputProvider>,
    // Shared with an in-flight flush, locked by nothing else
    encoder: SharedEncoder,
    mime_type: String,
    observer: Box<dyn SessionObserver>,
    options: RecorderOptions,
    acquiring: Option<Acquisition>,
    pending_starts: Vec<StartReply>,
    stream: Option<InputStream>,
    events: Option<mpsc::Receiver<EncoderEvent>>,
    timer: Option<DurationTimer>,
    deadline: Option<Instant>,
    flushing: Option<Flush>,
    pending_stops: Vec<oneshot::Sender<()>>,
    snapshot: watch::Sender<SessionSnapshot>,
}

impl SessionDriver {
    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        loop {
            let recording = self.session.state().is_recording();

            tokio::select! {
                biased;

                command = commands.recv() => match command {
                    Some(Command::Start(reply)) => self.handle_start(reply),
                    Some(Command::Stop(reply)) => self.handle_stop(reply),
                    None => {
                        tracing::debug!("Recorder dropped, tearing down session");
                        break;
                    }
                },

                result = acquisition(&mut self.acquiring) => {
                    self.acquiring = None;
                    self.on_acquired(result);
                }

                event = next_event(&mut self.events), if recording => self.on_encoder_event(event),

                elapsed = next_tick(&mut self.timer) => {
                    if self.session.tick(elapsed) {
                        self.observer.on_duration_update(&format_time(elapsed));
                        self.publish();
                    }
                }

                _ = deadline(self.deadline) => {
                    tracing::info!("Maximum recording duration reached, stopping");
                    self.begin_flush();
                }

                flushed = flush(&mut self.flushing) => {
                    self.flushing = None;
                    self.finish_stop(flushed);
                }
            }
        }
    }

    fn publish(&self) {
        self.snapshot.send_replace(self.session.snapshot());
    }

    /// Run `f` on the encoder. None while a flush holds it.
    fn with_encoder<R>(&self, f: impl FnOnce(&mut dyn Encoder) -> R) -> Option<R> {
        match self.encoder.try_lock() {
            Ok(mut encoder) => Some(f(encoder.as_mut())),
            Err(_) => None,
        }
    }

    fn handle_start(&mut self, reply: StartReply) {
        if self.session.state().is_acquiring() {
            tracing::debug!("Start while acquiring, waiting for the same outcome");
            self.pending_starts.push(reply);
            return;
        }
        if !self.session.begin_acquire() {
            tracing::debug!(
                "Start ignored: session is {}",
                self.session.state().name()
            );
            let outcome = match self.session.state().error() {
                Some(error) => Err(error.clone()),
                None => Ok(()),
            };
            let _ = reply.send(outcome);
            return;
        }

        tracing::debug!("Requesting microphone");
        let provider = Arc::clone(&self.provider);
        self.acquiring = Some(Box::pin(async move { provider.acquire().await }));
        self.pending_starts.push(reply);
        self.publish();
    }

    fn answer_starts(&mut self, outcome: Result<(), CaptureError>) {
        for reply in self.pending_starts.drain(..) {
            let _ = reply.send(outcome.clone());
        }
    }

    fn on_acquired(&mut self, result: Result<InputStream, CaptureError>) {
        let outcome = match result {
            Ok(stream) => self.begin_recording(stream),
            Err(error) => {
                tracing::warn!("Microphone not available: {}", error);
                self.session.fail(error.clone());
                self.observer.on_failure(&error);
                Err(error)
            }
        };
        self.publish();
        self.answer_starts(outcome);
    }

    fn begin_recording(&mut self, mut stream: InputStream) -> Result<(), CaptureError> {
        let started = self
            .with_encoder(|encoder| encoder.start(&mut stream))
            .unwrap_or_else(|| Err(CaptureError::EncoderFault("encoder busy".to_string())));
        let events = match started {
            Ok(events) => events,
            Err(error) => {
                tracing::error!("Failed to start encoder: {}", error);
                self.provider.release(stream);
                self.session.fail(error.clone());
                self.observer.on_failure(&error);
                return Err(error);
            }
        };

        let now = Instant::now();
        self.session.granted(now);
        tracing::info!(
            "Recording from {} ({} Hz, {} ch)",
            stream.device(),
            stream.format().sample_rate,
            stream.format().channels
        );

        self.stream = Some(stream);
        self.events = Some(events);
        self.timer = Some(DurationTimer::start(now));
        self.deadline = self.options.max_duration.map(|max| now + max);
        self.observer.on_duration_update(&format_time(0));
        Ok(())
    }

    fn on_encoder_event(&mut self, event: Option<EncoderEvent>) {
        match event {
            Some(EncoderEvent::Chunk(bytes)) => {
                if self.session.push_chunk(bytes) {
                    self.publish();
                }
            }
            Some(EncoderEvent::Fault(error)) => self.fail_recording(error),
            None => self.fail_recording(CaptureError::EncoderFault(
                "encoder closed its output".to_string(),
            )),
        }
    }

    fn handle_stop(&mut self, reply: oneshot::Sender<()>) {
        match self.session.state() {
            SessionState::Acquiring => {
                self.cancel_acquisition();
                let _ = reply.send(());
            }
            SessionState::Recording => {
                self.pending_stops.push(reply);
                self.begin_flush();
            }
            SessionState::Stopping => self.pending_stops.push(reply),
            other => {
                tracing::debug!("Stop ignored: session is {}", other.name());
                let _ = reply.send(());
            }
        }
    }

    /// Recording → Stopping and hand the encoder to a flush future
    fn begin_flush(&mut self) {
        if !self.session.state().is_recording() {
            return;
        }

        // Chunks already queued were produced while Recording
        let mut fault = None;
        if let Some(events) = self.events.as_mut() {
            while let Ok(event) = events.try_recv() {
                match event {
                    EncoderEvent::Chunk(bytes) => {
                        self.session.push_chunk(bytes);
                    }
                    EncoderEvent::Fault(error) => {
                        fault = Some(error);
                        break;
                    }
                }
            }
        }
        if let Some(error) = fault {
            self.fail_recording(error);
            self.answer_stops();
            return;
        }

        self.session.begin_stop(Instant::now());
        self.timer = None;
        self.deadline = None;
        self.publish();
        tracing::debug!("Flushing encoder");

        let encoder = Arc::clone(&self.encoder);
        self.flushing = Some(Box::pin(async move {
            let mut encoder = encoder.lock().await;
            match timeout(FLUSH_LIMIT, encoder.stop()).await {
                Ok(result) => result,
                Err(_) => Err(CaptureError::EncoderFault(format!(
                    "encoder did not flush within {}s",
                    FLUSH_LIMIT.as_secs()
                ))),
            }
        }));
    }

    /// Stopping → Completed or Failed once the flush resolved
    fn finish_stop(&mut self, flushed: Result<Vec<u8>, CaptureError>) {
        // Chunks the encoder emitted before it saw the flush request
        let mut tail = Vec::new();
        if let Some(mut events) = self.events.take() {
            while let Ok(EncoderEvent::Chunk(bytes)) = events.try_recv() {
                tail.extend_from_slice(&bytes);
            }
        }

        if flushed.is_err() {
            self.with_encoder(|encoder| encoder.abort());
        }
        if let Some(stream) = self.stream.take() {
            self.provider.release(stream);
        }

        match flushed {
            Ok(last) => {
                tail.extend_from_slice(&last);
                if let Some(artifact) = self.session.complete(tail, &self.mime_type) {
                    self.publish();
                    self.deliver(artifact);
                }
            }
            Err(error) => {
                tracing::error!("Encoder flush failed: {}", error);
                self.session.fail(error.clone());
                self.publish();
                self.observer.on_failure(&error);
            }
        }
        self.answer_stops();
    }

    fn answer_stops(&mut self) {
        for reply in self.pending_stops.drain(..) {
            let _ = reply.send(());
        }
    }

    fn deliver(&mut self, artifact: FinalizedArtifact) {
        tracing::info!(
            "Recording complete: {} bytes, {:.1}s",
            artifact.len(),
            artifact.duration_seconds()
        );
        self.observer.on_recording_complete(artifact);
    }

    fn cancel_acquisition(&mut self) {
        tracing::debug!("Stop during acquisition, cancelling");
        self.acquiring = None;
        let error = CaptureError::Cancelled;
        self.session.fail(error.clone());
        self.publish();
        self.answer_starts(Err(error.clone()));
        self.observer.on_failure(&error);
    }

    fn fail_recording(&mut self, error: CaptureError) {
        tracing::error!("Recording failed: {}", error);
        self.with_encoder(|encoder| encoder.abort());
        self.timer = None;
        self.deadline = None;
        self.events = None;
        if let Some(stream) = self.stream.take() {
            self.provider.release(stream);
        }
        if self.session.fail(error.clone()) {
            self.publish();
            self.observer.on_failure(&error);
        }
    }
}

impl Drop for SessionDriver {
    fn drop(&mut self) {
        // Dropping the flush gives the encoder back
        self.flushing = None;
        if let Some(stream) = self.stream.take() {
            if self.session.state().holds_stream() {
                tracing::debug!(
                    "Releasing microphone on teardown while {}",
                    self.session.state().name()
                );
            }
            self.with_encoder(|encoder| encoder.abort());
            self.provider.release(stream);
        }
    }
}

async fn acquisition(pending_acquire: &mut Option<Acquisition>) -> Result<InputStream, CaptureError> {
    match pending_acquire {
        Some(future) => future.as_mut().await,
        None => pending().await,
    }
}

async fn next_event(events: &mut Option<mpsc::Receiver<EncoderEvent>>) -> Option<EncoderEvent> {
    match events {
        Some(events) => events.recv().await,
        None => pending().await,
    }
}

async fn flush(flushing: &mut Option<Flush>) -> Result<Vec<u8>, CaptureError> {
    match flushing {
        Some(future) => future.as_mut().await,
        None => pending().await,
    }
}

async fn deadline(at: Option<Instant>) {
    match at {
        Some(at) => sleep_until(at).await,
        None => pending().await,
    }
}
