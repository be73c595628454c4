//! Submit/poll protocol against the prediction backend.
//!
//! A job is created with one POST, then polled at a fixed interval until the
//! backend reports `succeeded` or `failed`, or until `max_attempts` status
//! checks have been made. The interval is constant: no backoff, no jitter.
//! Transport errors are surfaced immediately and never retried here.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::sync::Arc;
use std::time::Duration;

use super::backend::{PredictionBackend, PredictionRequest};
use super::job::{JobStatus, TranscriptionJob};
use super::sleeper::Sleeper;
use crate::config::{PollingConfig, TranscriptionOptions};
use crate::error::TranscriptionError;

/// Text produced by a successful job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptionResult {
    pub text: String,
    /// True when the backend succeeded without text and `text` is the placeholder
    pub is_empty: bool,
    /// Status checks made before the job finished
    pub attempts: u32,
}

/// Drives one job from submission to a terminal state.
pub struct TranscriptionClient {
    backend: Arc<dyn PredictionBackend>,
    sleeper: Arc<dyn Sleeper>,
    model_version: String,
    max_attempts: u32,
    interval: Duration,
    empty_placeholder: String,
}

impl TranscriptionClient {
    pub fn new(
        backend: Arc<dyn PredictionBackend>,
        sleeper: Arc<dyn Sleeper>,
        model_version: impl Into<String>,
        polling: &PollingConfig,
        empty_placeholder: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            sleeper,
            model_version: model_version.into(),
            max_attempts: polling.max_attempts,
            interval: polling.interval(),
            empty_placeholder: empty_placeholder.into(),
        }
    }

    /// Transcribes `audio` (already encoded as `mime`).
    ///
    /// # Errors
    /// - `Submission` if the job cannot be created
    /// - `Poll` if a status request fails
    /// - `Failed` if the backend reports the job as failed
    /// - `TimedOut` if `max_attempts` checks pass without a terminal status
    pub async fn transcribe(
        &self,
        audio: &[u8],
        mime: &str,
        options: &TranscriptionOptions,
    ) -> Result<TranscriptionResult, TranscriptionError> {
        let data_uri = format!("data:{mime};base64,{}", BASE64.encode(audio));
        let request = PredictionRequest::new(&self.model_version, data_uri, options.clone());

        tracing::info!("Submitting {} bytes of {mime} for transcription", audio.len());
        let mut prediction = self
            .backend
            .create_prediction(&request)
            .await
            .map_err(TranscriptionError::Submission)?;

        let mut job = TranscriptionJob::submitted(prediction.id.clone());
        let mut backend_status = prediction.backend_status();
        tracing::debug!("Prediction {} created with status {}", job.id, prediction.status);

        while !backend_status.is_terminal() && job.can_poll(self.max_attempts) {
            self.sleeper.sleep(self.interval).await;
            job.record_poll();

            prediction = self
                .backend
                .get_prediction(&job.id)
                .await
                .map_err(|source| TranscriptionError::Poll {
                    id: job.id.clone(),
                    source,
                })?;
            backend_status = prediction.backend_status();

            tracing::debug!(
                "Status: {} (attempt {}/{}), id={}",
                prediction.status,
                job.attempts_made,
                self.max_attempts,
                job.id
            );
        }

        match job.settle(&backend_status) {
            JobStatus::Succeeded => {
                let result = match prediction.transcription() {
                    Some(text) => TranscriptionResult {
                        text: text.to_string(),
                        is_empty: false,
                        attempts: job.attempts_made,
                    },
                    None => {
                        tracing::warn!("Prediction {} succeeded with an empty transcription", job.id);
                        TranscriptionResult {
                            text: self.empty_placeholder.clone(),
                            is_empty: true,
                            attempts: job.attempts_made,
                        }
                    }
                };
                tracing::info!(
                    "Transcription {} completed after {} status check(s) in {}ms: {} chars",
                    job.id,
                    job.attempts_made,
                    job.elapsed().num_milliseconds(),
                    result.text.len()
                );
                Ok(result)
            }
            JobStatus::Failed => {
                let reason = prediction
                    .error_message()
                    .unwrap_or_else(|| "no reason given".to_string());
                tracing::error!("Transcription {} failed on the backend: {reason}", job.id);
                Err(TranscriptionError::Failed { id: job.id, reason })
            }
            _ => {
                tracing::error!(
                    "Transcription {} still '{}' after {} status checks",
                    job.id,
                    prediction.status,
                    job.attempts_made
                );
                Err(TranscriptionError::TimedOut {
                    id: job.id,
                    attempts: job.attempts_made,
                })
            }
        }
    }
}
