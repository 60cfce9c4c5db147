//! Speech-to-text (STT) dispatch
//!
//! Utterances are wrapped in a WAV container and posted to a PhoWhisper-style
//! transcription service. Failures are typed so the session can pick the right
//! fallback; nothing here retries.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use super::wav;
use crate::intent::normalize_transcript;

/// Why a transcription produced no usable text
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TranscriptionError {
    /// The service answered, but heard nothing
    #[error("no speech detected")]
    NoSpeechDetected,

    /// The service is overloaded or unavailable
    #[error("transcription service busy: {0}")]
    ServiceBusy(String),

    /// The call did not finish within its budget
    #[error("transcription timed out")]
    Timeout,

    /// The request could not be delivered or the response was unusable
    #[error("transcription transport error: {0}")]
    Transport(String),
}

/// A speech-to-text backend
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe a WAV container to raw text
    ///
    /// # Errors
    ///
    /// Returns a [`TranscriptionError`] describing the failure
    async fn transcribe(&self, wav: &[u8]) -> Result<String, TranscriptionError>;
}

/// Response from the transcription service
#[derive(serde::Deserialize)]
struct TranscribeResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    text: String,
    #[serde(default)]
    error: Option<String>,
}

/// Transcribes speech via the PhoWhisper HTTP service
pub struct SpeechToText {
    client: reqwest::Client,
    url: String,
}

impl SpeechToText {
    /// Create a client for the service at `url`
    #[must_use]
    pub fn new(url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
        }
    }
}

#[async_trait]
impl Transcriber for SpeechToText {
    async fn transcribe(&self, wav: &[u8]) -> Result<String, TranscriptionError> {
        tracing::debug!(audio_bytes = wav.len(), "starting PhoWhisper transcription");

        let part = reqwest::multipart::Part::bytes(wav.to_vec())
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| TranscriptionError::Transport(e.to_string()))?;
        let form = reqwest::multipart::Form::new().part("audio", part);

        let response = self
            .client
            .post(&self.url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "PhoWhisper request failed");
                if e.is_timeout() {
                    TranscriptionError::Timeout
                } else {
                    TranscriptionError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        tracing::debug!(status = %status, "received response");

        if matches!(status, StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE) {
            return Err(TranscriptionError::ServiceBusy(status.to_string()));
        }

        let body: TranscribeResponse = response
            .json()
            .await
            .map_err(|e| TranscriptionError::Transport(format!("{status}: {e}")))?;

        if !body.success {
            let message = body.error.unwrap_or_else(|| status.to_string());
            tracing::warn!(status = %status, error = %message, "PhoWhisper API error");
            return Err(TranscriptionError::Transport(message));
        }

        tracing::info!(transcript = %body.text, "transcription complete");
        Ok(body.text)
    }
}

/// Transcribe one utterance of raw PCM and normalize the text
///
/// # Errors
///
/// Returns [`TranscriptionError::NoSpeechDetected`] for empty audio or an empty
/// transcript, [`TranscriptionError::Timeout`] when `budget` expires, or the
/// backend's own error
pub async fn transcribe_utterance(
    stt: &dyn Transcriber,
    pcm: &[u8],
    budget: Duration,
) -> Result<String, TranscriptionError> {
    if pcm.is_empty() {
        return Err(TranscriptionError::NoSpeechDetected);
    }

    let container = wav::build_container(pcm);
    let raw = tokio::time::timeout(budget, stt.transcribe(&container))
        .await
        .map_err(|_| TranscriptionError::Timeout)??;

    let text = normalize_transcript(&raw);
    if text.is_empty() {
        return Err(TranscriptionError::NoSpeechDetected);
    }
    Ok(text)
}
