//! Wire types and the backend seam for the prediction API.
//!
//! `POST /predictions` creates a job and `GET /predictions/{id}` reports on it.
//! Both return the same `Prediction` shape.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::job::BackendStatus;
use crate::config::TranscriptionOptions;
use crate::error::BackendError;

/// Body of `POST /predictions`.
#[derive(Debug, Clone, Serialize)]
pub struct PredictionRequest {
    pub version: String,
    pub input: PredictionInput,
}

/// Model input: the audio data URI plus the pass-through options.
#[derive(Debug, Clone, Serialize)]
pub struct PredictionInput {
    pub audio: String,
    #[serde(flatten)]
    pub options: TranscriptionOptions,
}

impl PredictionRequest {
    pub fn new(version: impl Into<String>, audio_data_uri: String, options: TranscriptionOptions) -> Self {
        Self {
            version: version.into(),
            input: PredictionInput {
                audio: audio_data_uri,
                options,
            },
        }
    }
}

/// A prediction as reported by the backend.
#[derive(Debug, Clone, Deserialize)]
pub struct Prediction {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub output: Option<Value>,
    #[serde(default)]
    pub error: Option<Value>,
}

impl Prediction {
    pub fn backend_status(&self) -> BackendStatus {
        BackendStatus::parse(&self.status)
    }

    /// `output.transcription`, if present and not blank.
    pub fn transcription(&self) -> Option<&str> {
        self.output
            .as_ref()
            .and_then(|output| output.get("transcription"))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }

    /// Backend-provided failure detail, if any.
    pub fn error_message(&self) -> Option<String> {
        match self.error.as_ref()? {
            Value::Null => None,
            Value::String(message) => Some(message.clone()),
            other => Some(other.to_string()),
        }
    }
}

/// Transport to the prediction API.
#[async_trait]
pub trait PredictionBackend: Send + Sync {
    /// Creates a prediction and returns its initial state.
    async fn create_prediction(&self, request: &PredictionRequest) -> Result<Prediction, BackendError>;

    /// Fetches the current state of a prediction.
    async fn get_prediction(&self, id: &str) -> Result<Prediction, BackendError>;
}
