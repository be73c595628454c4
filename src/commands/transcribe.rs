//! Transcribe a local audio file as if it had arrived as a voice message.
//!
//! Runs the full relay: reactions are printed to stderr and the transcript
//! (or the short failure message) is the reply, written to stdout or a file.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::{MessagesConfig, VoxConfig};
use crate::error::Interrupted;
use crate::media::ArtifactRegistry;
use crate::messaging::{relay_voice_message, LocalFileMessage, MessagingClient, RelayOutcome};
use crate::pipeline::TranscriptionPipeline;

/// Handles transcription of a local audio file.
///
/// # Arguments
/// * `file` - Path to the audio file to transcribe
/// * `output` - Optional file to write the transcript to instead of stdout
/// * `config_path` - Explicit config file, or `None` for the default location
/// * `shutdown` - Resolves when the process is asked to stop
///
/// # Errors
/// - If the file does not exist
/// - If configuration is invalid or the pipeline cannot be built
/// - If the transcription fails
/// - `Interrupted` if `shutdown` resolves first
pub async fn handle_transcribe(
    file: PathBuf,
    output: Option<PathBuf>,
    config_path: Option<&Path>,
    shutdown: impl Future<Output = ()>,
) -> Result<(), anyhow::Error> {
    tracing::info!("=== voxscribe Transcribe Command ===");

    if !file.is_file() {
        return Err(anyhow::anyhow!("Audio file not found: {}", file.display()));
    }
    tracing::info!("Transcribing file: {}", file.display());

    let config = VoxConfig::load(config_path).map_err(|err| {
        tracing::error!("Failed to load configuration: {err}");
        anyhow::anyhow!("Configuration error: {err}")
    })?;

    let pipeline = TranscriptionPipeline::from_config(&config, ArtifactRegistry::new())?;

    let max_age = Duration::from_secs(config.performance.stale_artifact_age_secs);
    match pipeline.store().sweep_stale(max_age) {
        Ok(0) => {}
        Ok(removed) => tracing::info!("Removed {removed} stale artifact(s) from earlier runs"),
        Err(e) => tracing::warn!(
            "Failed to sweep temp directory {}: {e}",
            pipeline.store().dir().display()
        ),
    }

    let message = LocalFileMessage::new(file, output);
    match relay_until_shutdown(&message, &pipeline, &config.messages, shutdown).await? {
        RelayOutcome::Transcribed(text) => {
            tracing::debug!("Transcription completed: {} chars", text.len());
            Ok(())
        }
        RelayOutcome::Failed(reply) => Err(anyhow::anyhow!(
            "Transcription failed: {reply} (run 'voxscribe logs' for details)"
        )),
        RelayOutcome::Ignored => Err(anyhow::anyhow!("No audio to transcribe")),
    }
}

/// Relays `message` unless `shutdown` resolves first.
///
/// On shutdown the pipeline stops admitting runs and the in-flight relay is
/// dropped, which removes its artifacts and kills a running encoder. Anything
/// still registered afterwards is purged.
pub async fn relay_until_shutdown(
    message: &dyn MessagingClient,
    pipeline: &TranscriptionPipeline,
    messages: &MessagesConfig,
    shutdown: impl Future<Output = ()>,
) -> Result<RelayOutcome, Interrupted> {
    let mut relay = Box::pin(relay_voice_message(message, pipeline, messages));

    tokio::select! {
        outcome = &mut relay => return Ok(outcome),
        () = shutdown => {}
    }

    tracing::info!("Shutdown requested, abandoning transcription");
    pipeline.shutdown();
    drop(relay);

    let leftover = pipeline.store().registry().purge();
    if leftover > 0 {
        tracing::warn!("Removed {leftover} artifact(s) left behind by the interrupted run");
    }
    Err(Interrupted)
}
