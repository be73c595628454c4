//! The chat side of a transcription: where voice notes come from and where
//! reactions and the transcript go.

pub mod client;
pub mod local;
pub mod relay;

pub use client::{DownloadedMedia, MessagingClient};
pub use local::LocalFileMessage;
pub use relay::{relay_voice_message, RelayOutcome, REACTION_DONE, REACTION_FAILED, REACTION_WORKING};
