// Command-line interface definitions for vocalist
//
// This module is separate so it can be used by both the binary (main.rs)
// and build.rs for generating man pages.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "vocalist")]
#[command(author, version, about = "Record, review and track your singing practice")]
#[command(long_about = "
Vocalist is a vocal-training companion for the terminal.
Record practice takes from your microphone, keep notes on your progress,
and follow a short exercise programme. Notes and recordings are stored in
your account on the hosted backend.

SETUP:
  1. Set the backend url and anon key in ~/.config/vocalist/config.toml
     (or VOCALIST_BACKEND_URL / VOCALIST_ANON_KEY)
  2. Run: vocalist auth signup --email <EMAIL>
  3. Run: vocalist devices (to check your microphone)

USAGE:
  vocalist record --title \"Morning scales\"
  Press Enter (or Ctrl-C) to stop, listen back, then save or discard the take.
")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<std::path::PathBuf>,

    /// Increase verbosity (-v = debug, -vv = trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Override audio input device
    #[arg(long, value_name = "DEVICE")]
    pub device: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Record a practice take from the microphone
    Record {
        /// Title stored with the recording
        #[arg(short, long)]
        title: Option<String>,

        /// Do not upload the take
        #[arg(long)]
        no_save: bool,

        /// Also write the take to a local WAV file
        #[arg(short, long, value_name = "FILE")]
        output: Option<std::path::PathBuf>,

        /// Stop automatically after this many seconds (0 = no limit)
        #[arg(long, value_name = "SECS")]
        max_duration: Option<u32>,

        /// Keep the take without asking to listen back first
        #[arg(long)]
        no_review: bool,
    },

    /// Play a WAV file
    Play {
        /// Path to the WAV file
        file: std::path::PathBuf,
    },

    /// Manage practice notes
    Notes {
        #[command(subcommand)]
        action: NotesAction,
    },

    /// Manage stored recordings
    Recordings {
        #[command(subcommand)]
        action: RecordingsAction,
    },

    /// Account management
    Auth {
        #[command(subcommand)]
        action: AuthAction,
    },

    /// Show your training overview
    Dashboard,

    /// Show the exercise programme
    Exercises {
        /// Skip ahead this many exercises
        #[arg(long, value_name = "N", default_value_t = 0)]
        next: usize,
    },

    /// List audio input devices
    Devices,

    /// Show current configuration
    Config,
}

#[derive(Subcommand)]
pub enum NotesAction {
    /// List your notes, newest first
    List,

    /// Add a note
    Add {
        #[arg(short, long)]
        title: String,

        #[arg(short, long, default_value = "")]
        content: String,

        /// Date of the session (YYYY-MM-DD, default today)
        #[arg(long)]
        date: Option<String>,
    },

    /// Delete a note
    Delete {
        /// Note id
        id: i64,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
pub enum RecordingsAction {
    /// List your recordings, newest first
    List,

    /// Play a stored recording
    Play {
        /// Recording id
        id: i64,
    },

    /// Delete a recording and its audio file
    Delete {
        /// Recording id
        id: i64,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
pub enum AuthAction {
    /// Create an account
    Signup {
        #[arg(long)]
        email: String,

        #[arg(long)]
        first_name: Option<String>,

        #[arg(long)]
        last_name: Option<String>,
    },

    /// Sign in with email and password
    Signin {
        #[arg(long)]
        email: String,
    },

    /// Sign out and forget the stored session
    Signout,

    /// Show the signed-in user
    Whoami,
}
