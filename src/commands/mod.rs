//! Application command handlers for voxscribe.
//!
//! # Commands
//! - `transcribe`: Relay a local audio file through the transcription pipeline
//! - `config`: Open configuration file in user's preferred editor
//! - `logs`: Display recent log entries

pub mod config;
pub mod logs;
pub mod transcribe;

pub use config::handle_config;
pub use logs::handle_logs;
pub use transcribe::handle_transcribe;
