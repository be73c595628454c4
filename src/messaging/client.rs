//! Seam to the messaging transport.

use async_trait::async_trait;

/// Media attached to an inbound message, as the transport delivers it.
#[derive(Debug, Clone)]
pub struct DownloadedMedia {
    /// Base64-encoded file contents
    pub base64_data: String,
    /// MIME type claimed by the sender, not trusted
    pub declared_mime: Option<String>,
}

/// One inbound message and the means to answer it.
#[async_trait]
pub trait MessagingClient: Send + Sync {
    fn has_media(&self) -> bool;

    /// Fetches the attached media. `Ok(None)` means the transport had nothing to give.
    async fn download_media(&self) -> anyhow::Result<Option<DownloadedMedia>>;

    async fn react(&self, emoji: &str) -> anyhow::Result<()>;

    async fn reply(&self, text: &str) -> anyhow::Result<()>;
}
