//! Speech-to-text through a remote prediction API.
//!
//! `client` owns the submit/poll protocol. `backend` defines the wire types and
//! the transport seam, with `replicate` as the HTTP implementation.

pub mod backend;
pub mod client;
pub mod job;
pub mod replicate;
pub mod sleeper;

pub use backend::{Prediction, PredictionBackend, PredictionRequest};
pub use client::{TranscriptionClient, TranscriptionResult};
pub use job::{BackendStatus, JobStatus, TranscriptionJob};
pub use replicate::ReplicateBackend;
pub use sleeper::{Sleeper, TokioSleeper};
