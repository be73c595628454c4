//! A local audio file presented as an inbound voice message.
//!
//! Reactions go to stderr; the reply goes to stdout or an output file, so the
//! transcript can be piped.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::path::{Path, PathBuf};

use super::client::{DownloadedMedia, MessagingClient};

#[derive(Debug, Clone)]
pub struct LocalFileMessage {
    file: PathBuf,
    output: Option<PathBuf>,
}

impl LocalFileMessage {
    pub fn new(file: impl Into<PathBuf>, output: Option<PathBuf>) -> Self {
        Self {
            file: file.into(),
            output,
        }
    }
}

/// MIME type implied by a file extension. Only a hint; the validator sniffs the bytes.
fn declared_mime_for(path: &Path) -> Option<String> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match extension.as_str() {
        "ogg" | "oga" | "opus" => "audio/ogg",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "m4a" => "audio/m4a",
        "aac" => "audio/aac",
        "amr" => "audio/amr",
        "webm" => "audio/webm",
        "mp4" => "audio/mp4",
        "3gp" => "audio/3gpp",
        _ => return None,
    };
    Some(mime.to_string())
}

#[async_trait]
impl MessagingClient for LocalFileMessage {
    fn has_media(&self) -> bool {
        self.file.is_file()
    }

    async fn download_media(&self) -> anyhow::Result<Option<DownloadedMedia>> {
        let bytes = tokio::fs::read(&self.file)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to read '{}': {e}", self.file.display()))?;
        tracing::debug!("Read {} bytes from {}", bytes.len(), self.file.display());

        Ok(Some(DownloadedMedia {
            base64_data: BASE64.encode(bytes),
            declared_mime: declared_mime_for(&self.file),
        }))
    }

    async fn react(&self, emoji: &str) -> anyhow::Result<()> {
        eprintln!("{emoji}");
        Ok(())
    }

    async fn reply(&self, text: &str) -> anyhow::Result<()> {
        match &self.output {
            Some(path) => {
                tokio::fs::write(path, text)
                    .await
                    .map_err(|e| anyhow::anyhow!("Failed to write to file '{}': {e}", path.display()))?;
                tracing::debug!("Reply written to file: {}", path.display());
            }
            None => println!("{text}"),
        }
        Ok(())
    }
}
