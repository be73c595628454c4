//! Runs an inbound voice message through the pipeline and answers the sender.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use super::client::MessagingClient;
use crate::config::MessagesConfig;
use crate::media::MediaPayload;
use crate::pipeline::TranscriptionPipeline;

pub const REACTION_WORKING: &str = "⏳";
pub const REACTION_DONE: &str = "✅";
pub const REACTION_FAILED: &str = "❌";

/// What the relay did with a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    /// The message carried no media
    Ignored,
    /// The transcript was sent back
    Transcribed(String),
    /// A short failure message was sent back
    Failed(String),
}

/// Transcribes the media attached to `message` and replies with the result.
///
/// Messaging errors (failed reactions or replies) are logged and never abort
/// the relay. Pipeline failure detail goes to the log; the sender only sees
/// the mapped message from `messages`.
pub async fn relay_voice_message(
    message: &dyn MessagingClient,
    pipeline: &TranscriptionPipeline,
    messages: &MessagesConfig,
) -> RelayOutcome {
    if !message.has_media() {
        tracing::debug!("Message has no media, ignoring");
        return RelayOutcome::Ignored;
    }

    react(message, REACTION_WORKING).await;

    let payload = match download(message).await {
        Some(payload) => payload,
        None => return fail(message, &messages.audio_error).await,
    };

    match pipeline.run(payload).await {
        Ok(result) => {
            let text = result.text.trim().to_string();
            react(message, REACTION_DONE).await;
            if let Err(e) = message.reply(&text).await {
                tracing::warn!("Failed to send transcript: {e}");
            }
            RelayOutcome::Transcribed(text)
        }
        Err(e) => {
            tracing::error!("Transcription failed: {e}");
            fail(message, e.user_message(messages)).await
        }
    }
}

/// Downloads and decodes the media, logging why when there is nothing usable.
async fn download(message: &dyn MessagingClient) -> Option<MediaPayload> {
    let media = match message.download_media().await {
        Ok(Some(media)) => media,
        Ok(None) => {
            tracing::warn!("Message reported media but none could be downloaded");
            return None;
        }
        Err(e) => {
            tracing::error!("Failed to download media: {e}");
            return None;
        }
    };

    match BASE64.decode(media.base64_data.as_bytes()) {
        Ok(bytes) => Some(MediaPayload::new(bytes, media.declared_mime)),
        Err(e) => {
            tracing::error!("Downloaded media is not valid base64: {e}");
            None
        }
    }
}

async fn react(message: &dyn MessagingClient, emoji: &str) {
    if let Err(e) = message.react(emoji).await {
        tracing::warn!("Failed to react with {emoji}: {e}");
    }
}

async fn fail(message: &dyn MessagingClient, text: &str) -> RelayOutcome {
    react(message, REACTION_FAILED).await;
    if let Err(e) = message.reply(text).await {
        tracing::warn!("Failed to send failure reply: {e}");
    }
    RelayOutcome::Failed(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::DownloadedMedia;
    use crate::pipeline::tests::{harness, residual_files, Behavior};
    use crate::transcription::client::tests::{prediction, ScriptedBackend};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Event {
        React(String),
        Reply(String),
    }

    struct FakeMessage {
        media: Option<DownloadedMedia>,
        download_fails: bool,
        events: Mutex<Vec<Event>>,
    }

    impl FakeMessage {
        fn with_bytes(bytes: &[u8]) -> Self {
            Self {
                media: Some(DownloadedMedia {
                    base64_data: BASE64.encode(bytes),
                    declared_mime: Some("audio/ogg; codecs=opus".to_string()),
                }),
                download_fails: false,
                events: Mutex::new(Vec::new()),
            }
        }

        fn text_only() -> Self {
            Self {
                media: None,
                download_fails: false,
                events: Mutex::new(Vec::new()),
            }
        }

        fn events(&self) -> Vec<Event> {
            self.events.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MessagingClient for FakeMessage {
        fn has_media(&self) -> bool {
            self.media.is_some() || self.download_fails
        }

        async fn download_media(&self) -> anyhow::Result<Option<DownloadedMedia>> {
            if self.download_fails {
                anyhow::bail!("media expired");
            }
            Ok(self.media.clone())
        }

        async fn react(&self, emoji: &str) -> anyhow::Result<()> {
            self.events.lock().unwrap().push(Event::React(emoji.to_string()));
            Ok(())
        }

        async fn reply(&self, text: &str) -> anyhow::Result<()> {
            self.events.lock().unwrap().push(Event::Reply(text.to_string()));
            Ok(())
        }
    }

    fn ogg_opus(len: usize) -> Vec<u8> {
        crate::media::validator::tests::ogg_opus_bytes(len)
    }

    #[tokio::test]
    async fn test_success_reacts_and_replies_with_text() {
        let h = harness(
            Behavior::Copy,
            ScriptedBackend::new(vec![prediction("succeeded", Some("hello world"))]),
        );
        let message = FakeMessage::with_bytes(&ogg_opus(4096));

        let outcome = relay_voice_message(&message, &h.pipeline, &MessagesConfig::default()).await;

        assert_eq!(outcome, RelayOutcome::Transcribed("hello world".to_string()));
        assert_eq!(
            message.events(),
            vec![
                Event::React(REACTION_WORKING.to_string()),
                Event::React(REACTION_DONE.to_string()),
                Event::Reply("hello world".to_string()),
            ]
        );
        assert_eq!(residual_files(&h), 0);
    }

    #[tokio::test]
    async fn test_message_without_media_is_ignored() {
        let h = harness(Behavior::Copy, ScriptedBackend::stuck());
        let message = FakeMessage::text_only();

        let outcome = relay_voice_message(&message, &h.pipeline, &MessagesConfig::default()).await;

        assert_eq!(outcome, RelayOutcome::Ignored);
        assert!(message.events().is_empty());
    }

    #[tokio::test]
    async fn test_download_failure_replies_audio_error() {
        let h = harness(Behavior::Copy, ScriptedBackend::stuck());
        let message = FakeMessage {
            media: None,
            download_fails: true,
            events: Mutex::new(Vec::new()),
        };
        let messages = MessagesConfig::default();

        let outcome = relay_voice_message(&message, &h.pipeline, &messages).await;

        assert_eq!(outcome, RelayOutcome::Failed(messages.audio_error.clone()));
        assert_eq!(
            message.events().last(),
            Some(&Event::Reply(messages.audio_error.clone()))
        );
        assert_eq!(h.backend.polls(), 0);
    }

    #[tokio::test]
    async fn test_undecodable_media_replies_audio_error() {
        let h = harness(Behavior::Copy, ScriptedBackend::stuck());
        let message = FakeMessage {
            media: Some(DownloadedMedia {
                base64_data: "not base64!".to_string(),
                declared_mime: None,
            }),
            download_fails: false,
            events: Mutex::new(Vec::new()),
        };
        let messages = MessagesConfig::default();

        let outcome = relay_voice_message(&message, &h.pipeline, &messages).await;

        assert_eq!(outcome, RelayOutcome::Failed(messages.audio_error.clone()));
    }

    #[tokio::test]
    async fn test_too_large_gets_specific_message() {
        let h = harness(Behavior::Copy, ScriptedBackend::stuck());
        let message = FakeMessage::with_bytes(&ogg_opus(60 * 1024 * 1024));
        let messages = MessagesConfig::default();

        let outcome = relay_voice_message(&message, &h.pipeline, &messages).await;

        assert_eq!(outcome, RelayOutcome::Failed(messages.too_large.clone()));
        assert!(message
            .events()
            .contains(&Event::React(REACTION_FAILED.to_string())));
    }

    #[tokio::test]
    async fn test_timeout_gets_audio_error_and_failure_reaction() {
        let h = harness(Behavior::Copy, ScriptedBackend::stuck());
        let message = FakeMessage::with_bytes(&ogg_opus(1024));
        let messages = MessagesConfig::default();

        let outcome = relay_voice_message(&message, &h.pipeline, &messages).await;

        assert_eq!(outcome, RelayOutcome::Failed(messages.audio_error.clone()));
        assert_eq!(
            message.events(),
            vec![
                Event::React(REACTION_WORKING.to_string()),
                Event::React(REACTION_FAILED.to_string()),
                Event::Reply(messages.audio_error.clone()),
            ]
        );
        assert_eq!(residual_files(&h), 0);
    }
}
