//! Validate → encode → transcribe, one run per inbound payload.
//!
//! Each run owns its artifacts through `TemporaryArtifact` guards, so the temp
//! directory is left as it was found on every exit path. Runs share only
//! read-only settings and a semaphore bounding how many are in flight.

use anyhow::Context;
use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::config::{TranscriptionOptions, VoxConfig};
use crate::error::PipelineError;
use crate::media::{
    ArtifactRegistry, ArtifactRole, ArtifactStore, AudioEncoder, EncodingSpec, FfmpegEncoder,
    MediaPayload, MediaValidator, RunId,
};
use crate::transcription::{
    ReplicateBackend, TokioSleeper, TranscriptionClient, TranscriptionResult,
};

pub struct TranscriptionPipeline {
    validator: MediaValidator,
    encoder: Arc<dyn AudioEncoder>,
    client: TranscriptionClient,
    store: ArtifactStore,
    spec: EncodingSpec,
    options: TranscriptionOptions,
    permits: Arc<Semaphore>,
}

impl TranscriptionPipeline {
    pub fn new(
        validator: MediaValidator,
        encoder: Arc<dyn AudioEncoder>,
        client: TranscriptionClient,
        store: ArtifactStore,
        spec: EncodingSpec,
        options: TranscriptionOptions,
        max_concurrent: usize,
    ) -> Self {
        Self {
            validator,
            encoder,
            client,
            store,
            spec,
            options,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Wires the production collaborators: ffmpeg and the Replicate API.
    ///
    /// # Errors
    /// - If no API token is configured
    /// - If ffmpeg cannot be found
    /// - If the HTTP client cannot be built
    pub fn from_config(config: &VoxConfig, registry: ArtifactRegistry) -> anyhow::Result<Self> {
        let api_token = config.backend.resolve_api_token().context(
            "No Replicate API token configured. Set REPLICATE_API_TOKEN or backend.api_token in the config file.",
        )?;
        let encoder = FfmpegEncoder::locate()?;
        let backend = ReplicateBackend::new(&config.backend, api_token)?;

        let client = TranscriptionClient::new(
            Arc::new(backend),
            Arc::new(TokioSleeper),
            config.backend.model_version.clone(),
            &config.polling,
            config.messages.empty_transcription.clone(),
        );
        let store = ArtifactStore::new(
            config.audio.resolved_temp_dir(),
            config.audio.temp_prefix.clone(),
            registry,
        );

        Ok(Self::new(
            MediaValidator::new(&config.security),
            Arc::new(encoder),
            client,
            store,
            config.audio.encoding_spec(),
            config.transcription.clone(),
            config.performance.concurrent_transcriptions,
        ))
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Stops admitting new runs. Runs waiting for a slot fail with `ShuttingDown`.
    pub fn shutdown(&self) {
        self.permits.close();
    }

    /// Transcribes one payload.
    ///
    /// Validation happens before a concurrency slot is taken, so rejected
    /// payloads never wait behind running jobs.
    ///
    /// # Errors
    /// Returns the first stage failure wrapped in `PipelineError`. No stage is retried.
    pub async fn run(&self, payload: MediaPayload) -> Result<TranscriptionResult, PipelineError> {
        let audio = self.validator.validate(payload)?;
        tracing::info!(
            "Accepted {} bytes of {}",
            audio.size(),
            audio.mime().unwrap_or("unchecked media")
        );

        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| PipelineError::ShuttingDown)?;

        self.store.ensure_dir().await?;
        let run = RunId::new();
        tracing::debug!("Starting run {run}");

        let original = self
            .store
            .persist(&run, ArtifactRole::Original, audio.extension(), audio.bytes())
            .await?;
        drop(audio);

        let encoded = self
            .store
            .reserve(&run, ArtifactRole::Encoded, &self.spec.format);
        if let Err(e) = self
            .encoder
            .encode(original.path(), encoded.path(), &self.spec)
            .await
        {
            tracing::error!("Encoding failed for run {run}: {e}");
            return Err(e.into());
        }
        drop(original);

        let bytes = encoded.read().await?;
        tracing::debug!("Run {run}: encoded to {} bytes", bytes.len());

        let result = self
            .client
            .transcribe(&bytes, self.spec.mime_type(), &self.options)
            .await?;
        tracing::info!("Run {run} finished");
        Ok(result)
    }
}
