//! Payload admission: size ceiling and content sniffing.
//!
//! The declared MIME type of an inbound payload is only a hint. The validator
//! derives the real type from the leading bytes and compares it against an
//! exact-match allow-list, so a renamed image or a spoofed header is rejected
//! before anything touches the disk.

use std::collections::HashSet;

use crate::config::{SecurityConfig, ValidationMode};
use crate::error::ValidationError;

/// MIME type reported for Ogg streams whose first packet is an Opus header.
pub const OGG_OPUS_MIME: &str = "audio/ogg; codecs=opus";

/// Raw media as handed over by the messaging transport.
#[derive(Debug, Clone)]
pub struct MediaPayload {
    bytes: Vec<u8>,
    declared_mime: Option<String>,
}

impl MediaPayload {
    pub fn new(bytes: Vec<u8>, declared_mime: Option<String>) -> Self {
        Self {
            bytes,
            declared_mime,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn declared_mime(&self) -> Option<&str> {
        self.declared_mime.as_deref()
    }

    /// Logical size in bytes.
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Bytes that passed validation.
#[derive(Debug, Clone)]
pub struct ValidatedAudio {
    bytes: Vec<u8>,
    mime: Option<String>,
    extension: String,
}

impl ValidatedAudio {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Sniffed MIME type. `None` only when type checking was skipped.
    pub fn mime(&self) -> Option<&str> {
        self.mime.as_deref()
    }

    /// File extension matching the detected type, used to name the original artifact.
    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Classifies payloads as allowed audio or rejects them.
#[derive(Debug)]
pub struct MediaValidator {
    max_file_size: u64,
    allowed: HashSet<String>,
    mode: ValidationMode,
}

impl MediaValidator {
    pub fn new(security: &SecurityConfig) -> Self {
        if security.validation_mode == ValidationMode::SkipTypeCheck {
            tracing::warn!(
                "Media type validation is DISABLED (validation_mode = skip_type_check); \
                 only the size ceiling is enforced"
            );
        }

        Self {
            max_file_size: security.max_file_size,
            allowed: security.allowed_audio_types.iter().cloned().collect(),
            mode: security.validation_mode,
        }
    }

    /// Validates a payload, consuming it.
    ///
    /// The size ceiling is checked first and applies in every mode.
    ///
    /// # Errors
    /// - `PayloadTooLarge` if the payload exceeds the ceiling
    /// - `NoMediaDetected` if sniffing finds no known signature
    /// - `UnsupportedMediaType` if the sniffed type is not allow-listed
    pub fn validate(&self, payload: MediaPayload) -> Result<ValidatedAudio, ValidationError> {
        let size = payload.size();
        tracing::debug!(
            "Validating payload: {:.2}MB, declared type {:?}",
            size as f64 / 1024.0 / 1024.0,
            payload.declared_mime()
        );

        if size > self.max_file_size {
            tracing::info!(
                "Rejected payload of {size} bytes (limit {})",
                self.max_file_size
            );
            return Err(ValidationError::PayloadTooLarge {
                size,
                limit: self.max_file_size,
            });
        }

        match self.mode {
            ValidationMode::SkipTypeCheck => {
                tracing::warn!("Accepting payload without type check (debug mode)");
                let extension = payload
                    .declared_mime()
                    .and_then(extension_for_declared)
                    .unwrap_or("bin")
                    .to_string();
                Ok(ValidatedAudio {
                    bytes: payload.bytes,
                    mime: None,
                    extension,
                })
            }
            ValidationMode::Strict => {
                let Some((mime, extension)) = sniff(payload.bytes()) else {
                    tracing::info!("No media type detected in payload");
                    return Err(ValidationError::NoMediaDetected);
                };

                if !self.allowed.contains(mime) {
                    tracing::info!("Rejected media type: {mime}");
                    return Err(ValidationError::UnsupportedMediaType {
                        mime: mime.to_string(),
                    });
                }

                tracing::info!("Accepted media type: {mime}");
                Ok(ValidatedAudio {
                    bytes: payload.bytes,
                    mime: Some(mime.to_string()),
                    extension: extension.to_string(),
                })
            }
        }
    }
}

/// Detects the media type of `buf` as `(mime, extension)`.
///
/// Ogg/Opus is refined to the codec-qualified type before falling back to the
/// generic signature table, which would report it as plain "audio/opus".
fn sniff(buf: &[u8]) -> Option<(&'static str, &'static str)> {
    if is_ogg_opus(buf) {
        return Some((OGG_OPUS_MIME, "ogg"));
    }
    infer::get(buf).map(|kind| (kind.mime_type(), kind.extension()))
}

/// Ogg page header followed by an `OpusHead` identification packet.
fn is_ogg_opus(buf: &[u8]) -> bool {
    buf.starts_with(b"OggS") && buf.get(28..36) == Some(&b"OpusHead"[..])
}

fn extension_for_declared(mime: &str) -> Option<&'static str> {
    let base = mime.split(';').next().unwrap_or(mime).trim();
    match base {
        "audio/ogg" | "audio/opus" => Some("ogg"),
        "audio/mpeg" | "audio/mp3" => Some("mp3"),
        "audio/wav" | "audio/x-wav" => Some("wav"),
        "audio/mp4" | "audio/m4a" | "audio/x-m4a" => Some("m4a"),
        "audio/aac" => Some("aac"),
        "audio/amr" => Some("amr"),
        "audio/webm" => Some("webm"),
        _ => None,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A minimal Ogg page carrying an Opus identification header, padded to `len`.
    pub(crate) fn ogg_opus_bytes(len: usize) -> Vec<u8> {
        let mut bytes = b"OggS".to_vec();
        bytes.resize(28, 0);
        bytes.extend_from_slice(b"OpusHead");
        bytes.resize(len.max(36), 0);
        bytes
    }

    fn mp3_bytes(len: usize) -> Vec<u8> {
        let mut bytes = b"ID3".to_vec();
        bytes.extend_from_slice(&[0x03, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);
        bytes.resize(len.max(10), 0);
        bytes
    }

    fn png_bytes() -> Vec<u8> {
        let mut bytes = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        bytes.resize(64, 0);
        bytes
    }

    fn validator_with(mode: ValidationMode, allowed: &[&str]) -> MediaValidator {
        MediaValidator::new(&SecurityConfig {
            max_file_size: 50 * 1024 * 1024,
            allowed_audio_types: allowed.iter().map(|s| s.to_string()).collect(),
            validation_mode: mode,
        })
    }

    #[test]
    fn test_accepts_codec_qualified_ogg() {
        let validator = validator_with(ValidationMode::Strict, &[OGG_OPUS_MIME]);
        let payload = MediaPayload::new(ogg_opus_bytes(2 * 1024 * 1024), Some("audio/ogg".into()));

        let audio = validator.validate(payload).unwrap();
        assert_eq!(audio.mime(), Some(OGG_OPUS_MIME));
        assert_eq!(audio.extension(), "ogg");
        assert_eq!(audio.size(), 2 * 1024 * 1024);
    }

    #[test]
    fn test_codec_qualified_entry_is_distinct_from_bare_type() {
        let validator = validator_with(ValidationMode::Strict, &["audio/ogg"]);
        let result = validator.validate(MediaPayload::new(ogg_opus_bytes(64), None));
        assert_eq!(
            result.unwrap_err(),
            ValidationError::UnsupportedMediaType {
                mime: OGG_OPUS_MIME.to_string()
            }
        );
    }

    #[test]
    fn test_sniffs_content_not_declared_type() {
        let validator = validator_with(ValidationMode::Strict, &["audio/mpeg"]);
        let spoofed = MediaPayload::new(png_bytes(), Some("audio/mpeg".into()));
        assert_eq!(
            validator.validate(spoofed).unwrap_err(),
            ValidationError::UnsupportedMediaType {
                mime: "image/png".to_string()
            }
        );

        let mp3 = MediaPayload::new(mp3_bytes(512), None);
        assert_eq!(validator.validate(mp3).unwrap().mime(), Some("audio/mpeg"));
    }

    #[test]
    fn test_unknown_content_is_no_media() {
        let validator = validator_with(ValidationMode::Strict, &["audio/mpeg"]);
        let text = b"just some plain words, nothing that looks like audio. ".repeat(4);
        let payload = MediaPayload::new(text, Some("audio/mpeg".into()));
        assert_eq!(
            validator.validate(payload).unwrap_err(),
            ValidationError::NoMediaDetected
        );
    }

    #[test]
    fn test_oversized_payload_rejected_regardless_of_type() {
        let validator = validator_with(ValidationMode::Strict, &[OGG_OPUS_MIME]);
        let size = 60 * 1024 * 1024;

        let audio = MediaPayload::new(ogg_opus_bytes(size), None);
        assert_eq!(
            validator.validate(audio).unwrap_err(),
            ValidationError::PayloadTooLarge {
                size: size as u64,
                limit: 50 * 1024 * 1024
            }
        );

        let mut junk = png_bytes();
        junk.resize(size, 0);
        assert!(matches!(
            validator.validate(MediaPayload::new(junk, None)),
            Err(ValidationError::PayloadTooLarge { .. })
        ));
    }

    #[test]
    fn test_skip_type_check_keeps_size_ceiling() {
        let validator = validator_with(ValidationMode::SkipTypeCheck, &[]);

        let junk = MediaPayload::new(vec![0u8; 128], Some("audio/ogg; codecs=opus".into()));
        let audio = validator.validate(junk).unwrap();
        assert_eq!(audio.mime(), None);
        assert_eq!(audio.extension(), "ogg");

        let huge = MediaPayload::new(vec![0u8; 50 * 1024 * 1024 + 1], None);
        assert!(matches!(
            validator.validate(huge),
            Err(ValidationError::PayloadTooLarge { .. })
        ));
    }

    #[test]
    fn test_payload_at_exact_limit_is_accepted() {
        let validator = MediaValidator::new(&SecurityConfig {
            max_file_size: 1024,
            allowed_audio_types: vec![OGG_OPUS_MIME.to_string()],
            validation_mode: ValidationMode::Strict,
        });
        assert!(validator
            .validate(MediaPayload::new(ogg_opus_bytes(1024), None))
            .is_ok());
        assert!(validator
            .validate(MediaPayload::new(ogg_opus_bytes(1025), None))
            .is_err());
    }
}
