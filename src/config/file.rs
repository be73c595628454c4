//! Configuration file management for voxscribe.
//!
//! This module handles loading and saving application configuration from TOML files.
//! Configuration is stored in the user's config directory.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use crate::error::ConfigError;
use crate::media::EncodingSpec;

// Numeric bitrate with an optional k/M suffix, as ffmpeg's -b:a accepts
static BITRATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+(\.\d+)?[kKmM]?$").expect("valid bitrate regex"));

/// Environment variable that overrides `backend.api_token`.
pub const API_TOKEN_ENV: &str = "REPLICATE_API_TOKEN";

/// How strictly the validator inspects payload content.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMode {
    /// Sniff the content and require an allow-listed MIME type
    #[default]
    Strict,
    /// Debug only: skip content sniffing, keep the size ceiling
    SkipTypeCheck,
}

impl std::fmt::Display for ValidationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Strict => write!(f, "strict"),
            Self::SkipTypeCheck => write!(f, "skip_type_check"),
        }
    }
}

/// Payload admission rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Largest accepted payload in bytes
    pub max_file_size: u64,
    /// Exact-match MIME allow-list. Codec-qualified entries are distinct from bare ones.
    pub allowed_audio_types: Vec<String>,
    /// "strict" or "skip_type_check"
    pub validation_mode: ValidationMode,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_file_size: 50 * 1024 * 1024,
            allowed_audio_types: [
                "audio/mp3",
                "audio/mpeg",
                "audio/wav",
                "audio/x-wav",
                "audio/m4a",
                "audio/x-m4a",
                "audio/ogg",
                "audio/ogg; codecs=opus",
                "audio/aac",
                "audio/webm",
                "audio/opus",
                "audio/amr",
                "audio/3gpp",
                "audio/mp4",
            ]
            .iter()
            .map(|mime| mime.to_string())
            .collect(),
            validation_mode: ValidationMode::Strict,
        }
    }
}

/// Encoder parameters and temp file placement.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Playback speed multiplier (pitch preserved)
    pub speed: f64,
    /// Volume multiplier
    pub volume: f64,
    /// Target bitrate, e.g. "32k"
    pub bitrate: String,
    /// Output channel count (1 = mono)
    pub channels: u32,
    /// Output container/codec, also used as the file extension
    pub format: String,
    /// Prefix for the temp directory and every artifact name
    pub temp_prefix: String,
    /// Explicit temp directory. Defaults to `<system temp>/<temp_prefix>`.
    pub temp_dir: Option<PathBuf>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            speed: 1.0,
            volume: 1.0,
            bitrate: "32k".to_string(),
            channels: 1,
            format: "mp3".to_string(),
            temp_prefix: "audio-transcribe".to_string(),
            temp_dir: None,
        }
    }
}

impl AudioConfig {
    /// The encoder settings shared by every run.
    pub fn encoding_spec(&self) -> EncodingSpec {
        EncodingSpec {
            channels: self.channels,
            bitrate: self.bitrate.clone(),
            speed: self.speed,
            volume: self.volume,
            format: self.format.clone(),
        }
    }

    /// Directory holding the artifacts of in-flight runs.
    pub fn resolved_temp_dir(&self) -> PathBuf {
        self.temp_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join(&self.temp_prefix))
    }
}

/// Prediction API endpoint and credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: String,
    /// Model version hash sent with every prediction
    pub model_version: String,
    /// API token. `REPLICATE_API_TOKEN` takes precedence when set.
    pub api_token: Option<String>,
    /// Per-request HTTP timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.replicate.com/v1".to_string(),
            model_version: "3c08daf437fe359eb158a5123c395673f0a113dd8b4bd01ddce5936850e2a981"
                .to_string(),
            api_token: None,
            request_timeout_secs: 30,
        }
    }
}

impl BackendConfig {
    /// Returns the token from the environment, falling back to the config file.
    pub fn resolve_api_token(&self) -> Option<String> {
        std::env::var(API_TOKEN_ENV)
            .ok()
            .filter(|token| !token.trim().is_empty())
            .or_else(|| self.api_token.clone().filter(|token| !token.trim().is_empty()))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Whisper options forwarded verbatim in the prediction input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionOptions {
    pub language: String,
    pub translate: bool,
    pub temperature: f64,
    pub transcription: String,
    pub suppress_tokens: String,
    pub logprob_threshold: f64,
    pub no_speech_threshold: f64,
    pub condition_on_previous_text: bool,
    pub compression_ratio_threshold: f64,
    pub temperature_increment_on_fallback: f64,
}

impl Default for TranscriptionOptions {
    fn default() -> Self {
        Self {
            language: "auto".to_string(),
            translate: false,
            temperature: 0.0,
            transcription: "plain text".to_string(),
            suppress_tokens: "-1".to_string(),
            logprob_threshold: -1.0,
            no_speech_threshold: 0.6,
            condition_on_previous_text: true,
            compression_ratio_threshold: 2.4,
            temperature_increment_on_fallback: 0.2,
        }
    }
}

/// Status polling cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Status checks before giving up
    pub max_attempts: u32,
    /// Fixed delay before each status check, in milliseconds
    pub interval_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            max_attempts: 30,
            interval_ms: 2000,
        }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Maximum pipeline runs in flight at once
    pub concurrent_transcriptions: usize,
    /// Leftover artifacts older than this are swept at startup
    pub stale_artifact_age_secs: u64,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            concurrent_transcriptions: 3,
            stale_artifact_age_secs: 300,
        }
    }
}

/// Replies sent back to the sender.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagesConfig {
    pub error: String,
    pub audio_error: String,
    pub invalid_file: String,
    pub too_large: String,
    /// Returned as the transcript when the backend succeeds with no text
    pub empty_transcription: String,
}

impl Default for MessagesConfig {
    fn default() -> Self {
        Self {
            error: "❌ An unexpected error occurred. Please try again later.".to_string(),
            audio_error: "❌ An error occurred while transcribing your audio.".to_string(),
            invalid_file: "⚠️ The file you sent is not a valid audio file.".to_string(),
            too_large: "⚠️ File too large. Maximum size: 50MB".to_string(),
            empty_transcription: "⚠️ Empty transcription.".to_string(),
        }
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VoxConfig {
    pub security: SecurityConfig,
    pub audio: AudioConfig,
    pub backend: BackendConfig,
    pub transcription: TranscriptionOptions,
    pub polling: PollingConfig,
    pub performance: PerformanceConfig,
    pub messages: MessagesConfig,
}

impl VoxConfig {
    /// Loads configuration from `path`, or from the user's config directory.
    ///
    /// An explicit path must exist. The default path may be absent, in which
    /// case built-in defaults are used.
    ///
    /// # Errors
    /// - If the config file cannot be read
    /// - If the TOML is malformed
    /// - If a value is out of range
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (config_path, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (get_config_path().map_err(ConfigError::invalid)?, false),
        };

        if !required && !config_path.exists() {
            tracing::info!(
                "No config file at {}, using defaults",
                config_path.display()
            );
            let config = Self::default();
            config.validate()?;
            return Ok(config);
        }

        let content = fs::read_to_string(&config_path).map_err(|source| ConfigError::Read {
            path: config_path.clone(),
            source,
        })?;
        let config: VoxConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: config_path.clone(),
            source,
        })?;
        config.validate()?;

        tracing::debug!("Configuration loaded from {}", config_path.display());
        Ok(config)
    }

    /// Saves configuration to `path`, creating parent directories.
    ///
    /// # Errors
    /// - If the directory cannot be created
    /// - If the file cannot be written
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        tracing::info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Checks value ranges that serde cannot express.
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let audio = &self.audio;
        if audio.channels < 1 {
            return Err(ConfigError::invalid("audio.channels must be at least 1"));
        }
        if !(audio.speed.is_finite() && audio.speed > 0.0) {
            return Err(ConfigError::invalid("audio.speed must be greater than 0"));
        }
        if !(audio.volume.is_finite() && audio.volume >= 0.0) {
            return Err(ConfigError::invalid("audio.volume must not be negative"));
        }
        if !BITRATE_RE.is_match(&audio.bitrate) {
            return Err(ConfigError::invalid(format!(
                "audio.bitrate '{}' is not a bitrate such as \"32k\"",
                audio.bitrate
            )));
        }
        if audio.format.trim().is_empty() {
            return Err(ConfigError::invalid("audio.format must not be empty"));
        }
        if audio.temp_prefix.trim().is_empty() {
            return Err(ConfigError::invalid("audio.temp_prefix must not be empty"));
        }
        if self.polling.max_attempts < 1 {
            return Err(ConfigError::invalid("polling.max_attempts must be at least 1"));
        }
        if self.performance.concurrent_transcriptions < 1 {
            return Err(ConfigError::invalid(
                "performance.concurrent_transcriptions must be at least 1",
            ));
        }
        if self.security.allowed_audio_types.is_empty()
            && self.security.validation_mode == ValidationMode::Strict
        {
            return Err(ConfigError::invalid(
                "security.allowed_audio_types is empty; no audio would be accepted",
            ));
        }
        Ok(())
    }
}

/// Retrieves the path to the default config file.
///
/// # Errors
/// - If the home directory cannot be determined
pub fn get_config_path() -> Result<PathBuf, String> {
    let home = dirs::home_dir().ok_or_else(|| "Could not find home directory".to_string())?;
    Ok(home.join(".config").join("voxscribe").join("voxscribe.toml"))
}
