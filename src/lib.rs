//! voxscribe: voice message transcription.
//!
//! Inbound audio is validated by content, normalized with ffmpeg, submitted to
//! a remote speech-to-text model and polled until a transcript is ready.

pub mod app;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod media;
pub mod messaging;
pub mod pipeline;
pub mod transcription;

pub use error::PipelineError;
pub use pipeline::TranscriptionPipeline;
