//! Media handling for voxscribe.
//!
//! Validation of inbound payloads, the temporary files a run works on, and the
//! external encoder that normalizes audio before upload.

pub mod artifact;
pub mod encoder;
pub mod ffmpeg;
pub mod validator;

pub use artifact::{ArtifactRegistry, ArtifactRole, ArtifactStore, RunId, TemporaryArtifact};
pub use encoder::{AudioEncoder, EncodingSpec, FfmpegEncoder};
pub use ffmpeg::find_ffmpeg;
pub use validator::{MediaPayload, MediaValidator, ValidatedAudio, OGG_OPUS_MIME};
