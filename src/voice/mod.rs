//! Spoken output
//!
//! The pipeline speaks through the [`Speaker`] trait. [`TtsSpeaker`] renders
//! text with a TTS provider and, with the `playback` feature, plays it on the
//! default output device. [`LogSpeaker`] is the silent stand-in used when
//! voice output is disabled.

#[cfg(feature = "playback")]
mod playback;
mod tts;

use async_trait::async_trait;

#[cfg(feature = "playback")]
pub use playback::AudioPlayback;
pub use tts::{TextToSpeech, TtsProvider};

use crate::Result;

/// Renders text as audio
#[async_trait]
pub trait Speaker: Send + Sync {
    /// Speak `text`, resolving once the audio has finished
    ///
    /// # Errors
    ///
    /// Returns error if synthesis or playback fails
    async fn speak(&self, text: &str) -> Result<()>;
}

/// Speaker that only logs what would have been said
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSpeaker;

#[async_trait]
impl Speaker for LogSpeaker {
    async fn speak(&self, text: &str) -> Result<()> {
        tracing::info!(text, "speak");
        Ok(())
    }
}

/// Speaker backed by a TTS provider
#[derive(Debug, Clone)]
pub struct TtsSpeaker {
    tts: TextToSpeech,
}

impl TtsSpeaker {
    /// Wrap a configured TTS client
    #[must_use]
    pub const fn new(tts: TextToSpeech) -> Self {
        Self { tts }
    }
}

#[async_trait]
impl Speaker for TtsSpeaker {
    async fn speak(&self, text: &str) -> Result<()> {
        let audio = self.tts.synthesize(text).await?;
        tracing::debug!(bytes = audio.len(), provider = ?self.tts.provider(), "synthesized speech");
        play(audio).await
    }
}

/// Play MP3 audio on a blocking worker thread
#[cfg(feature = "playback")]
async fn play(audio: Vec<u8>) -> Result<()> {
    tokio::task::spawn_blocking(move || AudioPlayback::new()?.play_mp3(&audio))
        .await
        .map_err(|e| crate::Error::Speech(format!("playback task failed: {e}")))?
}

/// Without an audio device the synthesized clip is dropped
#[cfg(not(feature = "playback"))]
#[allow(clippy::unused_async)]
async fn play(audio: Vec<u8>) -> Result<()> {
    tracing::debug!(bytes = audio.len(), "playback disabled, discarding audio");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_speaker_succeeds() {
        assert!(LogSpeaker.speak("hello").await.is_ok());
    }
}
