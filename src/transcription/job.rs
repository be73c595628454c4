//! Lifecycle of one remote transcription job.

use chrono::{DateTime, Local};

/// Where a job is in its submit/poll lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    /// Accepted by the backend, not yet polled
    Submitted,
    /// Waiting on status checks
    Polling,
    Succeeded,
    Failed,
    /// Poll ceiling reached without a terminal backend status
    TimedOut,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::TimedOut)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Submitted => "submitted",
            Self::Polling => "polling",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::TimedOut => "timed out",
        };
        f.write_str(label)
    }
}

/// Status reported by the backend for a prediction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendStatus {
    Succeeded,
    Failed,
    /// Any other value ("starting", "processing", ...)
    InProgress(String),
}

impl BackendStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "succeeded" => Self::Succeeded,
            "failed" => Self::Failed,
            other => Self::InProgress(other.to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::InProgress(_))
    }
}

/// A submitted job. Lives only for the duration of one client call.
#[derive(Debug, Clone)]
pub struct TranscriptionJob {
    pub id: String,
    pub status: JobStatus,
    pub attempts_made: u32,
    pub created_at: DateTime<Local>,
}

impl TranscriptionJob {
    pub fn submitted(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: JobStatus::Submitted,
            attempts_made: 0,
            created_at: Local::now(),
        }
    }

    /// Whether another status check is allowed under `max_attempts`.
    pub fn can_poll(&self, max_attempts: u32) -> bool {
        !self.status.is_terminal() && self.attempts_made < max_attempts
    }

    /// Counts one status check and moves the job into `Polling`.
    pub fn record_poll(&mut self) {
        self.status = JobStatus::Polling;
        self.attempts_made += 1;
    }

    /// Applies the final backend status once polling has stopped.
    ///
    /// A non-terminal backend status at this point means the ceiling was hit.
    pub fn settle(&mut self, backend: &BackendStatus) -> JobStatus {
        self.status = match backend {
            BackendStatus::Succeeded => JobStatus::Succeeded,
            BackendStatus::Failed => JobStatus::Failed,
            BackendStatus::InProgress(_) => JobStatus::TimedOut,
        };
        self.status
    }

    pub fn elapsed(&self) -> chrono::Duration {
        Local::now() - self.created_at
    }
}
