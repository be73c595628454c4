//! Error taxonomy for the transcription pipeline.
//!
//! Each stage has its own error type. `PipelineError` wraps all of them so a
//! caller receives exactly one failure per run, and `user_message` maps that
//! failure onto one of the short, configurable replies.

use std::path::PathBuf;

use crate::config::MessagesConfig;

/// Rejection reasons produced by the media validator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Content sniffing could not identify any media type.
    #[error("no media type could be detected from the payload")]
    NoMediaDetected,

    /// The detected type is not on the allow-list.
    #[error("media type '{mime}' is not an allowed audio type")]
    UnsupportedMediaType { mime: String },

    /// The payload exceeds the configured ceiling.
    #[error("payload of {size} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { size: u64, limit: u64 },
}

/// Failure of the external audio encoder.
#[derive(Debug, thiserror::Error)]
pub enum EncodingError {
    /// The encoder binary could not be found or started.
    #[error("failed to launch encoder: {0}")]
    Launch(String),

    /// The encoder ran but exited unsuccessfully.
    #[error("encoder exited with status {status}: {stderr}")]
    Exit { status: i32, stderr: String },
}

/// Transport-level failure talking to the prediction backend.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The backend answered with a non-success HTTP status.
    #[error("backend returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The request never produced a response.
    #[error("network error: {0}")]
    Network(String),

    /// The response body was not the expected shape.
    #[error("unexpected response: {0}")]
    Decode(String),
}

/// Outcome of a submit/poll cycle that did not yield text.
#[derive(Debug, thiserror::Error)]
pub enum TranscriptionError {
    /// The prediction could not be created.
    #[error("submission failed: {0}")]
    Submission(#[source] BackendError),

    /// A status request failed after the job was created.
    #[error("status request for job {id} failed: {source}")]
    Poll {
        id: String,
        #[source]
        source: BackendError,
    },

    /// The backend reported the job as failed.
    #[error("transcription job {id} failed: {reason}")]
    Failed { id: String, reason: String },

    /// The poll ceiling was reached without a terminal backend status.
    #[error("transcription job {id} did not finish after {attempts} status checks")]
    TimedOut { id: String, attempts: u32 },
}

/// Failure creating or reading a temporary artifact.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("failed to prepare temp directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write artifact {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read artifact {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The single failure value returned by a pipeline run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("validation: {0}")]
    Validation(#[from] ValidationError),

    #[error("artifact: {0}")]
    Artifact(#[from] ArtifactError),

    #[error("encoding: {0}")]
    Encoding(#[from] EncodingError),

    #[error("transcription: {0}")]
    Transcription(#[from] TranscriptionError),

    /// The concurrency limiter was shut down while waiting for a slot.
    #[error("pipeline is shutting down")]
    ShuttingDown,
}

impl PipelineError {
    /// Short, user-facing text for this failure. Internal detail stays in the log.
    pub fn user_message<'a>(&self, messages: &'a MessagesConfig) -> &'a str {
        match self {
            Self::Validation(ValidationError::PayloadTooLarge { .. }) => &messages.too_large,
            Self::Validation(_) => &messages.invalid_file,
            Self::Encoding(_) | Self::Transcription(_) => &messages.audio_error,
            Self::Artifact(_) | Self::ShuttingDown => &messages.error,
        }
    }
}

/// The process was asked to stop before the work finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("interrupted by shutdown signal")]
pub struct Interrupted;

/// Invalid or unreadable configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    #[inline]
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_mapping() {
        let messages = MessagesConfig::default();

        let too_large = PipelineError::from(ValidationError::PayloadTooLarge {
            size: 10,
            limit: 5,
        });
        assert_eq!(too_large.user_message(&messages), messages.too_large);

        let unsupported = PipelineError::from(ValidationError::UnsupportedMediaType {
            mime: "image/png".to_string(),
        });
        assert_eq!(unsupported.user_message(&messages), messages.invalid_file);

        let timed_out = PipelineError::from(TranscriptionError::TimedOut {
            id: "abc".to_string(),
            attempts: 30,
        });
        assert_eq!(timed_out.user_message(&messages), messages.audio_error);
    }

    #[test]
    fn test_failed_and_timed_out_share_outcome() {
        let failed = TranscriptionError::Failed {
            id: "a".to_string(),
            reason: "boom".to_string(),
        };
        let timed_out = TranscriptionError::TimedOut {
            id: "a".to_string(),
            attempts: 3,
        };
        let messages = MessagesConfig::default();

        assert_eq!(
            PipelineError::from(failed).user_message(&messages),
            PipelineError::from(timed_out).user_message(&messages)
        );
    }
}
