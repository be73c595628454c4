//! Audio normalization through an external encoder.
//!
//! The pipeline only depends on the `AudioEncoder` trait. `FfmpegEncoder` is the
//! production implementation: volume and pitch-preserving tempo filters,
//! downmix, and re-encode at a low bitrate.

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use super::ffmpeg::find_ffmpeg;
use crate::error::EncodingError;

/// Longest stderr tail kept in an `EncodingError`.
const STDERR_SNIPPET_CHARS: usize = 500;

/// Encoder settings shared read-only by every run.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodingSpec {
    /// Output channel count
    pub channels: u32,
    /// Target bitrate, e.g. "32k"
    pub bitrate: String,
    /// Playback speed multiplier
    pub speed: f64,
    /// Volume multiplier
    pub volume: f64,
    /// Output container/codec; doubles as the output file extension
    pub format: String,
}

impl EncodingSpec {
    /// The `-filter:a` graph: volume first, then one or more `atempo` stages.
    pub fn filter_graph(&self) -> String {
        let mut filters = vec![format!("volume={}", self.volume)];
        filters.extend(
            tempo_stages(self.speed)
                .into_iter()
                .map(|stage| format!("atempo={stage}")),
        );
        filters.join(",")
    }

    /// MIME type of the encoder output, used for the upload data URI.
    pub fn mime_type(&self) -> &'static str {
        match self.format.to_ascii_lowercase().as_str() {
            "mp3" => "audio/mpeg",
            "ogg" | "opus" | "oga" => "audio/ogg",
            "wav" => "audio/wav",
            "m4a" | "mp4" | "aac" => "audio/mp4",
            "flac" => "audio/flac",
            "webm" => "audio/webm",
            _ => "application/octet-stream",
        }
    }
}

/// Splits a speed factor into `atempo` stages inside the filter's 0.5..=2.0 range.
fn tempo_stages(speed: f64) -> Vec<f64> {
    let mut stages = Vec::new();
    let mut remaining = speed;
    while remaining > 2.0 {
        stages.push(2.0);
        remaining /= 2.0;
    }
    while remaining < 0.5 {
        stages.push(0.5);
        remaining /= 0.5;
    }
    stages.push(remaining);
    stages
}

/// Re-encodes an audio file according to an `EncodingSpec`.
#[async_trait]
pub trait AudioEncoder: Send + Sync {
    /// Encodes `input` into `output`, overwriting `output` if it exists.
    ///
    /// Failures are not retryable.
    async fn encode(
        &self,
        input: &Path,
        output: &Path,
        spec: &EncodingSpec,
    ) -> Result<(), EncodingError>;
}

/// `AudioEncoder` backed by the ffmpeg command-line tool.
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    binary: PathBuf,
}

impl FfmpegEncoder {
    /// Uses the ffmpeg found on this system.
    ///
    /// # Errors
    /// Returns `EncodingError::Launch` if ffmpeg cannot be found.
    pub fn locate() -> Result<Self, EncodingError> {
        Ok(Self {
            binary: find_ffmpeg()?,
        })
    }

    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn build_args(input: &Path, output: &Path, spec: &EncodingSpec) -> Vec<OsString> {
        vec![
            "-loglevel".into(),
            "error".into(),
            "-i".into(),
            input.as_os_str().to_os_string(),
            "-filter:a".into(),
            spec.filter_graph().into(),
            "-ac".into(),
            spec.channels.to_string().into(),
            "-b:a".into(),
            spec.bitrate.clone().into(),
            "-y".into(),
            output.as_os_str().to_os_string(),
        ]
    }
}

#[async_trait]
impl AudioEncoder for FfmpegEncoder {
    async fn encode(
        &self,
        input: &Path,
        output: &Path,
        spec: &EncodingSpec,
    ) -> Result<(), EncodingError> {
        let args = Self::build_args(input, output, spec);
        tracing::debug!(
            "Running {} {}",
            self.binary.display(),
            args.iter()
                .map(|arg| arg.to_string_lossy())
                .collect::<Vec<_>>()
                .join(" ")
        );

        let result = tokio::process::Command::new(&self.binary)
            .args(&args)
            .stdin(std::process::Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| EncodingError::Launch(format!("{}: {e}", self.binary.display())))?;

        if result.status.success() {
            tracing::debug!("Audio encoded to {} format", spec.format);
            return Ok(());
        }

        let stderr = tail_chars(&String::from_utf8_lossy(&result.stderr), STDERR_SNIPPET_CHARS);
        tracing::error!("ffmpeg encoding failed: {stderr}");
        Err(EncodingError::Exit {
            status: result.status.code().unwrap_or(-1),
            stderr,
        })
    }
}

/// The last `max` characters of `text`, trimmed.
fn tail_chars(text: &str, max: usize) -> String {
    let trimmed = text.trim();
    let count = trimmed.chars().count();
    trimmed.chars().skip(count.saturating_sub(max)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(speed: f64, volume: f64) -> EncodingSpec {
        EncodingSpec {
            channels: 1,
            bitrate: "32k".to_string(),
            speed,
            volume,
            format: "mp3".to_string(),
        }
    }

    #[test]
    fn test_filter_graph_defaults() {
        assert_eq!(spec(1.0, 1.0).filter_graph(), "volume=1,atempo=1");
        assert_eq!(spec(1.5, 0.8).filter_graph(), "volume=0.8,atempo=1.5");
    }

    #[test]
    fn test_tempo_outside_filter_range_is_chained() {
        assert_eq!(tempo_stages(4.0), vec![2.0, 2.0]);
        assert_eq!(tempo_stages(0.25), vec![0.5, 0.5]);
        assert_eq!(spec(3.0, 1.0).filter_graph(), "volume=1,atempo=2,atempo=1.5");

        let product: f64 = tempo_stages(5.0).iter().product();
        assert!((product - 5.0).abs() < 1e-9);
        assert!(tempo_stages(0.1).iter().all(|s| (0.5..=2.0).contains(s)));
    }

    #[test]
    fn test_build_args_downmix_and_bitrate() {
        let args = FfmpegEncoder::build_args(
            Path::new("in.ogg"),
            Path::new("out.mp3"),
            &EncodingSpec {
                channels: 2,
                bitrate: "48k".to_string(),
                ..spec(1.0, 1.0)
            },
        );
        let args: Vec<String> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();

        assert_eq!(
            args,
            vec![
                "-loglevel", "error", "-i", "in.ogg", "-filter:a", "volume=1,atempo=1", "-ac",
                "2", "-b:a", "48k", "-y", "out.mp3"
            ]
        );
    }

    #[test]
    fn test_output_mime_type() {
        assert_eq!(spec(1.0, 1.0).mime_type(), "audio/mpeg");
        let ogg = EncodingSpec {
            format: "ogg".to_string(),
            ..spec(1.0, 1.0)
        };
        assert_eq!(ogg.mime_type(), "audio/ogg");
    }

    #[test]
    fn test_tail_chars_keeps_end() {
        assert_eq!(tail_chars("  abcdef \n", 3), "def");
        assert_eq!(tail_chars("ção", 10), "ção");
    }

    #[tokio::test]
    async fn test_missing_binary_is_launch_error() {
        let encoder = FfmpegEncoder::with_binary("/nonexistent/voxscribe-ffmpeg");
        let result = encoder
            .encode(Path::new("in.ogg"), Path::new("out.mp3"), &spec(1.0, 1.0))
            .await;
        assert!(matches!(result, Err(EncodingError::Launch(_))));
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_nonzero_exit_is_exit_error() {
        let dir = tempfile::tempdir().unwrap();
        let encoder = FfmpegEncoder::with_binary("/bin/false");
        let err = encoder
            .encode(
                &dir.path().join("in.ogg"),
                &dir.path().join("out.mp3"),
                &spec(1.0, 1.0),
            )
            .await
            .unwrap_err();

        match err {
            EncodingError::Exit { status, stderr } => {
                assert_eq!(status, 1);
                assert!(stderr.is_empty());
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
