//! Vocalist - vocal practice companion
//!
//! Run `vocalist record` to record a take, `vocalist dashboard` for an
//! overview of your training, `vocalist --help` for everything else.

use clap::Parser;
use tracing_subscriber::EnvFilter;
use vocalist::app::{App, RecordRequest};
use vocalist::cli::{AuthAction, Cli, Commands, NotesAction, RecordingsAction};
use vocalist::config;
use vocalist::prompt;
use vocalist::gateway::{SignIn, SignUp};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("vocalist={},warn", log_level))),
        )
        .with_target(false)
        .init();

    // Load configuration
    let mut config = config::load_config(cli.config.as_deref())?;
    if cli.config.is_none() {
        if let Some(path) = config::Config::default_path() {
            match config::write_default_config(&path) {
                Ok(true) => tracing::info!("Wrote default configuration to {:?}", path),
                Ok(false) => {}
                Err(e) => tracing::debug!("Could not write default configuration: {}", e),
            }
        }
    }

    // Apply CLI overrides
    if let Some(device) = cli.device {
        config.audio.device = device;
    }

    match cli.command {
        Commands::Record {
            title,
            no_save,
            output,
            max_duration,
            no_review,
        } => {
            if let Some(secs) = max_duration {
                config.audio.max_duration_secs = secs;
            }
            let app = App::new(config);
            app.record(RecordRequest {
                title,
                save: !no_save,
                output,
                review: !no_review,
            })
            .await?;
        }

        Commands::Play { file } => App::new(config).play(&file).await?,

        Commands::Notes { action } => {
            let app = App::new(config);
            match action {
                NotesAction::List => app.list_notes().await?,
                NotesAction::Add {
                    title,
                    content,
                    date,
                } => app.add_note(title, content, date).await?,
                NotesAction::Delete { id, yes } => app.delete_note(id, yes).await?,
            }
        }

        Commands::Recordings { action } => {
            let app = App::new(config);
            match action {
                RecordingsAction::List => app.list_recordings().await?,
                RecordingsAction::Play { id } => app.play_recording(id).await?,
                RecordingsAction::Delete { id, yes } => {
                    app.delete_recording(id, yes).await?
                }
            }
        }

        Commands::Auth { action } => {
            let app = App::new(config);
            match action {
                AuthAction::Signup {
                    email,
                    first_name,
                    last_name,
                } => {
                    // The prompt already asked twice
                    let password = prompt::account_password(true)?;
                    let password_confirmation = password.clone();
                    app.sign_up(SignUp {
                        email,
                        password,
                        password_confirmation,
                        first_name,
                        last_name,
                    })
                    .await?;
                }
                AuthAction::Signin { email } => {
                    let password = prompt::account_password(false)?;
                    app.sign_in(SignIn { email, password }).await?;
                }
                AuthAction::Signout => app.sign_out().await?,
                AuthAction::Whoami => app.whoami().await?,
            }
        }

        Commands::Dashboard => App::new(config).dashboard().await?,

        Commands::Exercises { next } => App::new(config).exercises(next),

        Commands::Devices => App::new(config).devices()?,

        Commands::Config => App::new(config).show_config()?,
    }

    Ok(())
}

