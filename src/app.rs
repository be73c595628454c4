//! Application orchestration and command routing.
//!
//! Handles command-line argument parsing and delegates to appropriate command handlers.

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;
use std::process;

use crate::commands;
use crate::error::Interrupted;
use crate::logging;

/// Transcribes voice messages through a remote speech-to-text model
#[derive(Parser)]
#[command(name = "voxscribe")]
#[command(version)]
#[command(about = "Transcribes voice messages through a remote speech-to-text model")]
#[command(
    long_about = "Transcribes voice messages through a remote speech-to-text model.\n\nAudio is validated by content, normalized with ffmpeg and submitted to the\nReplicate predictions API. The transcript is printed to stdout.\n\nEXAMPLES:\n    # Transcribe a voice note and pipe the text\n    $ voxscribe transcribe note.ogg | wc -w\n    \n    # Write the transcript to a file\n    $ voxscribe transcribe memo.mp3 -o memo.txt\n    \n    # Edit configuration file\n    $ voxscribe config"
)]
#[command(
    after_help = "CONFIGURATION:\n    Config file:        ~/.config/voxscribe/voxscribe.toml\n    Logs:               ~/.local/state/voxscribe/voxscribe.log.*\n    API token:          REPLICATE_API_TOKEN or [backend] api_token"
)]
struct Cli {
    /// Use this config file instead of the default
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Transcribe an audio file
    ///
    /// The file is handled exactly like an inbound voice message: progress
    /// reactions go to stderr and the transcript goes to stdout.
    ///
    /// Examples:
    ///   voxscribe transcribe voice-note.ogg
    ///   voxscribe transcribe meeting.wav -o transcript.txt
    #[command(visible_alias = "t")]
    Transcribe {
        /// Path to the audio file to transcribe
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Write transcription to file instead of stdout
        #[arg(short, long, value_name = "OUTPUT")]
        output: Option<PathBuf>,
    },

    /// Open configuration file in your preferred editor
    ///
    /// Writes the default configuration first if the file does not exist.
    /// Uses $EDITOR environment variable or falls back to nano/vi.
    #[command(visible_alias = "c")]
    Config,

    /// Show recent log entries from the application
    ///
    /// Display the last 50 lines of the most recent log file.
    Logs,

    /// Generate shell completion script
    ///
    /// Examples:
    ///   voxscribe completions bash > voxscribe.bash
    ///   voxscribe completions zsh > _voxscribe
    Completions {
        /// The shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Resolves on Ctrl-C, or on SIGTERM where available.
///
/// If a listener cannot be installed it is logged and never fires.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl-C"),
        () = terminate => tracing::info!("Received SIGTERM"),
    }
}

/// Runs the main application based on command-line arguments.
///
/// # Exit Codes
/// - 0: Success
/// - 1: General error
/// - 2: Usage error (invalid arguments)
/// - 130: Interrupted (see `exit_code`)
///
/// # Errors
/// - If logging initialization fails
/// - If command execution fails
pub async fn run() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    // Commands that don't need logging
    match &cli.command {
        Commands::Completions { shell } => {
            generate(*shell, &mut Cli::command(), "voxscribe", &mut io::stdout());
            return Ok(());
        }
        Commands::Logs => {
            return match commands::handle_logs() {
                Ok(()) => Ok(()),
                Err(e) => {
                    eprintln!("Error: {e}");
                    process::exit(1);
                }
            };
        }
        _ => {}
    }

    logging::init_logging()?;

    match cli.command {
        Commands::Transcribe { file, output } => {
            commands::handle_transcribe(file, output, cli.config.as_deref(), shutdown_signal())
                .await?;
        }
        Commands::Config => {
            commands::handle_config(cli.config.as_deref())?;
        }
        Commands::Completions { .. } | Commands::Logs => {
            unreachable!("These commands are handled earlier")
        }
    }

    Ok(())
}

/// Process exit status for the result of `run`.
pub fn exit_code(result: &Result<(), anyhow::Error>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(e) if e.is::<Interrupted>() => 130,
        Err(_) => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code(&Ok(())), 0);
        assert_eq!(exit_code(&Err(Interrupted.into())), 130);
        assert_eq!(exit_code(&Err(anyhow::anyhow!("boom"))), 1);
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_transcribe_with_global_config() {
        let cli = Cli::try_parse_from([
            "voxscribe",
            "transcribe",
            "note.ogg",
            "-o",
            "out.txt",
            "--config",
            "/tmp/vox.toml",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("/tmp/vox.toml")));
        match cli.command {
            Commands::Transcribe { file, output } => {
                assert_eq!(file, PathBuf::from("note.ogg"));
                assert_eq!(output, Some(PathBuf::from("out.txt")));
            }
            _ => panic!("expected transcribe"),
        }
    }
}
