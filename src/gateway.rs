//! The per-utterance pipeline
//!
//! [`Gateway`] owns the immutable configuration and the collaborators, and
//! drives one session through transcription, classification, handling and
//! playback. It is shared by every connection; all per-connection state lives
//! in the [`Session`] passed in.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use secrecy::{ExposeSecret, SecretString};

use crate::assets::{Announcement, Asset, AssetKind, AssetStore};
use crate::config::Config;
use crate::handlers::{self, Reply};
use crate::integrations::{
    ChatModel, GeminiClient, LunarCalendar, LunarClient, WeatherApiClient, WeatherProvider,
};
use crate::intent::classify;
use crate::session::{Session, SessionState};
use crate::voice::{
    AudioSink, Delivery, Inbound, IngestBuffer, Pacer, ResponseSynthesizer, SpeechSynthesizer,
    SpeechToText, SynthesisOutcome, TextToSpeech, Transcriber, transcribe_utterance,
};

/// External collaborators
#[derive(Clone)]
pub struct Services {
    pub stt: Arc<dyn Transcriber>,
    pub tts: Arc<dyn SpeechSynthesizer>,
    pub chat: Arc<dyn ChatModel>,
    pub weather: Arc<dyn WeatherProvider>,
    pub lunar: Arc<dyn LunarCalendar>,
}

impl Services {
    /// HTTP clients for every collaborator
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            stt: Arc::new(SpeechToText::new(config.stt.url.clone())),
            tts: Arc::new(TextToSpeech::new(
                config.tts.url.clone(),
                config.tts.voice.clone(),
                config.tts.rate.clone(),
                config.tts.volume.clone(),
            )),
            chat: Arc::new(GeminiClient::new(
                config.llm.base_url.clone(),
                config.llm.model.clone(),
                SecretString::from(config.llm.api_key.expose_secret().to_owned()),
                config.llm.system_prompt.clone(),
            )),
            weather: Arc::new(WeatherApiClient::new(
                config.weather.base_url.clone(),
                SecretString::from(config.weather.api_key.expose_secret().to_owned()),
            )),
            lunar: Arc::new(LunarClient::new(config.lunar.url.clone())),
        }
    }
}

/// Shared pipeline for all sessions
pub struct Gateway {
    config: Arc<Config>,
    services: Services,
    assets: AssetStore,
    pacer: Pacer,
    music_pacer: Pacer,
    synthesizer: ResponseSynthesizer,
}

impl Gateway {
    #[must_use]
    pub fn new(config: Arc<Config>, services: Services) -> Self {
        let synthesizer = ResponseSynthesizer::new(Arc::clone(&services.tts), config.tts.timeout);
        Self {
            assets: AssetStore::new(&config.assets),
            pacer: config.pacer(),
            music_pacer: config.music_pacer(),
            synthesizer,
            services,
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub const fn services(&self) -> &Services {
        &self.services
    }

    #[must_use]
    pub const fn assets(&self) -> &AssetStore {
        &self.assets
    }

    /// Wall-clock time in the configured zone
    #[must_use]
    pub fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.config.locale.utc_offset)
    }

    /// Fresh state for a new connection
    #[must_use]
    pub fn new_session(&self) -> Session {
        let ingest = IngestBuffer::new(
            self.config.audio.frame_bytes,
            self.config.audio.max_utterance_frames,
        );
        Session::new(ingest, self.config.llm.max_history_turns)
    }

    /// Greet a newly connected device and start listening
    pub async fn welcome(&self, session: &mut Session, sink: &mut dyn AudioSink) {
        let asset = self.assets.announcement(Announcement::Welcome);
        if self.play(&asset, sink).await.is_err() {
            tracing::debug!(session_id = %session.id, "client left during welcome");
        }
        if !session.is_closed() {
            session.state = SessionState::Listening;
        }
    }

    /// Route one inbound message
    pub async fn handle_inbound(
        &self,
        session: &mut Session,
        inbound: Inbound,
        sink: &mut dyn AudioSink,
    ) {
        if inbound.is_end_of_stream() {
            self.handle_end_of_stream(session, sink).await;
            return;
        }

        match inbound {
            Inbound::Audio(frame) => {
                session.ingest.push(frame);
            }
            Inbound::Control(text) => {
                tracing::debug!(session_id = %session.id, text = %text.trim(), "ignoring control message");
            }
        }
    }

    /// Transcribe the buffered utterance and answer it
    ///
    /// The ingest buffer is emptied before anything else happens, so nothing
    /// carries over to the next utterance whatever the outcome.
    pub async fn handle_end_of_stream(&self, session: &mut Session, sink: &mut dyn AudioSink) {
        session.state = SessionState::Flushing;
        let utterance = session.ingest.flush();
        tracing::debug!(
            session_id = %session.id,
            frames = utterance.frames,
            bytes = utterance.bytes.len(),
            truncated = utterance.truncated,
            "utterance complete"
        );

        let transcript =
            transcribe_utterance(self.services.stt.as_ref(), &utterance.bytes, self.config.stt.timeout)
                .await;
        drop(utterance);

        session.state = SessionState::Responding;
        let reply = match transcript {
            Ok(text) => {
                let intent = classify(&text);
                tracing::info!(
                    session_id = %session.id,
                    transcript = %text,
                    intent = intent.kind(),
                    "utterance classified"
                );
                handlers::respond(self, intent, &mut session.conversation).await
            }
            Err(e) => {
                tracing::warn!(session_id = %session.id, error = %e, "transcription failed");
                Reply::Play(self.assets.announcement(Announcement::NotHeard))
            }
        };

        self.deliver(reply, sink).await;

        if !session.is_closed() {
            session.state = SessionState::Listening;
        }
    }

    /// Send a reply to the device
    pub async fn deliver(&self, reply: Reply, sink: &mut dyn AudioSink) {
        match reply {
            Reply::Speak(text) => {
                match self.synthesizer.speak(&text, sink, &self.pacer).await {
                    SynthesisOutcome::Completed { emitted, skipped } => {
                        tracing::debug!(emitted, skipped, "spoken reply delivered");
                    }
                    SynthesisOutcome::NothingSynthesized => {
                        tracing::warn!("speech synthesis produced no audio");
                        let fallback = self.assets.announcement(Announcement::SpeechTimeout);
                        let _ = self.play(&fallback, sink).await;
                    }
                    SynthesisOutcome::Interrupted => {
                        tracing::debug!("client left during reply");
                    }
                }
            }
            Reply::Play(asset) => {
                let _ = self.play(&asset, sink).await;
            }
        }
    }

    /// Stream a recording; music is paced faster than speech
    ///
    /// An unreadable asset is reported to the device as an error text.
    ///
    /// # Errors
    ///
    /// Returns [`crate::voice::SocketClosed`] if the client went away
    pub async fn play(&self, asset: &Asset, sink: &mut dyn AudioSink) -> Delivery {
        let pacer = match asset.kind {
            AssetKind::Announcement => &self.pacer,
            AssetKind::Music => &self.music_pacer,
        };

        match self.assets.load(asset).await {
            Ok(pcm) => {
                tracing::debug!(asset = %asset, bytes = pcm.len(), "playing asset");
                pacer.play(sink, &pcm).await
            }
            Err(e) => {
                tracing::warn!(error = %e, "asset unavailable");
                if !sink.is_open() {
                    return Err(crate::voice::SocketClosed);
                }
                sink.send_text(&format!("Error: audio asset unavailable ({asset})"))
                    .await
            }
        }
    }
}
