//! Vocalist: vocal practice companion
//!
//! This library provides the core functionality for:
//! - Capturing microphone audio via cpal (supports PipeWire, PulseAudio, ALSA)
//! - Driving one recording session from request to finished take
//! - Wrapping takes as WAV and playing them back via rodio
//! - Storing notes and recordings in a hosted backend (auth, tables, storage)
//! - Summarising training progress and the exercise programme
//!
//! # Architecture
//!
//! ```text
//!          ┌──────────────┐   start/stop   ┌──────────────────────────────┐
//!          │     CLI      │ ─────────────▶ │          Recorder            │
//!          │    (app)     │ ◀───────────── │  (session driver task)       │
//!          └──────────────┘  events        └──────────────────────────────┘
//!                 │                           │            │           │
//!                 │                   acquire │    chunks  │     ticks │
//!                 │                   release ▼            ▼           ▼
//!                 │                   ┌────────────┐ ┌──────────┐ ┌─────────┐
//!                 │                   │  CpalInput │ │PcmEncoder│ │  Timer  │
//!                 │                   │   (cpal)   │ │  (L16)   │ │ (1 Hz)  │
//!                 │                   └────────────┘ └──────────┘ └─────────┘
//!                 │ finished take
//!                 ▼
//!          ┌──────────────┐   WAV    ┌──────────────────────────────────────┐
//!          │   wav/hound  │ ───────▶ │ BackendClient (ureq)                 │
//!          └──────────────┘          │ /auth/v1  /rest/v1  /storage/v1      │
//!                                    └──────────────────────────────────────┘
//! ```

pub mod app;
pub mod audio;
pub mod cli;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod gateway;
pub mod notification;
pub mod prompt;
pub mod recording;
pub mod state;
pub mod training;

pub use cli::{AuthAction, Cli, Commands, NotesAction, RecordingsAction};
pub use config::Config;
pub use error::{CaptureError, GatewayError, Result, VocalistError};
pub use recording::{FinalizedArtifact, Recorder, RecorderOptions};
pub use state::SessionState;
