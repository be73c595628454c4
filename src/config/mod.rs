//! Configuration management for voxscribe.
//!
//! This module handles loading and saving application configuration from TOML files.
//! Every field carries a default, so a missing file yields a working configuration
//! as long as an API token is supplied through the environment.

pub mod file;

pub use file::{
    get_config_path, AudioConfig, BackendConfig, MessagesConfig, PerformanceConfig,
    PollingConfig, SecurityConfig, TranscriptionOptions, ValidationMode, VoxConfig,
    API_TOKEN_ENV,
};
