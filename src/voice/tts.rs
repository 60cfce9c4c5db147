//! Text-to-speech (TTS) processing

use async_trait::async_trait;

use crate::{Error, Result};

/// A text-to-speech backend
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize one sentence
    ///
    /// # Returns
    ///
    /// WAV audio bytes (mono, 16kHz, 16-bit)
    ///
    /// # Errors
    ///
    /// Returns error if synthesis fails
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>>;
}

/// Synthesizes speech through an Edge-TTS HTTP service
pub struct TextToSpeech {
    client: reqwest::Client,
    url: String,
    voice: String,
    rate: String,
    volume: String,
}

impl TextToSpeech {
    /// Create a TTS client
    ///
    /// `rate` and `volume` are signed percentages such as `+0%` or `-10%`.
    #[must_use]
    pub fn new(url: String, voice: String, rate: String, volume: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
            voice,
            rate,
            volume,
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for TextToSpeech {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct TtsRequest<'a> {
            text: &'a str,
            voice: &'a str,
            rate: &'a str,
            volume: &'a str,
        }

        let request = TtsRequest {
            text,
            voice: &self.voice,
            rate: &self.rate,
            volume: &self.volume,
        };

        tracing::debug!(chars = text.chars().count(), voice = %self.voice, "requesting speech");

        let response = self.client.post(&self.url).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("TTS error {status}: {body}")));
        }

        let audio = response.bytes().await?;
        if audio.is_empty() {
            return Err(Error::Tts("TTS returned no audio".to_string()));
        }
        Ok(audio.to_vec())
    }
}
