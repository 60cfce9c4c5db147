//! Shared test utilities

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;

use loa_gateway::integrations::{ChatModel, LunarCalendar, LunarDate, WeatherProvider, WeatherReport};
use loa_gateway::session::Turn;
use loa_gateway::voice::{
    AudioSink, Delivery, SocketClosed, SpeechSynthesizer, Transcriber, TranscriptionError, wav,
};
use loa_gateway::{Config, Error, Gateway, Result, Services};

/// One message written to a [`RecordingSink`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Text(String),
    Binary(Vec<u8>),
}

/// Sink that records everything and can close itself after N text messages
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub sent: Vec<Sent>,
    close_after_texts: Option<usize>,
    closed: bool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Close once `n` text messages have been sent
    pub fn closing_after_texts(n: usize) -> Self {
        Self {
            close_after_texts: Some(n),
            ..Self::default()
        }
    }

    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn texts(&self) -> Vec<&str> {
        self.sent
            .iter()
            .filter_map(|s| match s {
                Sent::Text(t) => Some(t.as_str()),
                Sent::Binary(_) => None,
            })
            .collect()
    }

    /// Binary payload with the trailing silence pad removed
    pub fn audio(&self) -> Vec<u8> {
        let mut audio: Vec<u8> = self
            .sent
            .iter()
            .filter_map(|s| match s {
                Sent::Binary(b) => Some(b.as_slice()),
                Sent::Text(_) => None,
            })
            .flatten()
            .copied()
            .collect();
        while audio.last() == Some(&0) {
            audio.pop();
        }
        audio
    }

    pub fn audio_text(&self) -> String {
        String::from_utf8(self.audio()).expect("fake audio is utf-8")
    }
}

#[async_trait]
impl AudioSink for RecordingSink {
    fn is_open(&self) -> bool {
        !self.closed
    }

    async fn send_text(&mut self, text: &str) -> Delivery {
        if self.closed {
            return Err(SocketClosed);
        }
        self.sent.push(Sent::Text(text.to_string()));
        if let Some(limit) = self.close_after_texts
            && self.texts().len() >= limit
        {
            self.closed = true;
        }
        Ok(())
    }

    async fn send_binary(&mut self, frame: Vec<u8>) -> Delivery {
        if self.closed {
            return Err(SocketClosed);
        }
        self.sent.push(Sent::Binary(frame));
        Ok(())
    }
}

/// Transcriber returning a fixed answer
pub struct FakeStt {
    answer: std::result::Result<String, TranscriptionError>,
    pub calls: AtomicUsize,
    pub last_len: AtomicUsize,
}

impl FakeStt {
    pub fn hearing(text: &str) -> Self {
        Self::answering(Ok(text.to_string()))
    }

    pub fn failing(error: TranscriptionError) -> Self {
        Self::answering(Err(error))
    }

    fn answering(answer: std::result::Result<String, TranscriptionError>) -> Self {
        Self {
            answer,
            calls: AtomicUsize::new(0),
            last_len: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Transcriber for FakeStt {
    async fn transcribe(&self, wav: &[u8]) -> std::result::Result<String, TranscriptionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.last_len.store(wav.len(), Ordering::SeqCst);
        self.answer.clone()
    }
}

/// Synthesizer whose "audio" is the sentence's own UTF-8 bytes
///
/// Sentences containing a configured marker are delayed or fail.
#[derive(Default)]
pub struct FakeTts {
    delays: Vec<(String, Duration)>,
    failures: Vec<String>,
    pub calls: AtomicUsize,
}

impl FakeTts {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn delay(mut self, marker: &str, delay: Duration) -> Self {
        self.delays.push((marker.to_string(), delay));
        self
    }

    #[must_use]
    pub fn fail(mut self, marker: &str) -> Self {
        self.failures.push(marker.to_string());
        self
    }
}

#[async_trait]
impl SpeechSynthesizer for FakeTts {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some((_, delay)) = self.delays.iter().find(|(m, _)| text.contains(m.as_str())) {
            tokio::time::sleep(*delay).await;
        }
        if self.failures.iter().any(|m| text.contains(m.as_str())) {
            return Err(Error::Tts(format!("refused: {text}")));
        }
        Ok(text.as_bytes().to_vec())
    }
}

/// Chat model that echoes, or fails
pub struct FakeChat {
    answer: Option<String>,
    pub histories: Mutex<Vec<usize>>,
}

impl FakeChat {
    pub fn answering(answer: &str) -> Self {
        Self {
            answer: Some(answer.to_string()),
            histories: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            answer: None,
            histories: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ChatModel for FakeChat {
    async fn reply(&self, history: &[Turn], _text: &str) -> Result<String> {
        self.histories.lock().expect("lock").push(history.len());
        self.answer
            .clone()
            .ok_or_else(|| Error::Llm("model unavailable".to_string()))
    }
}

/// Weather keyed by canonical location
#[derive(Default)]
pub struct FakeWeather {
    reports: HashMap<String, WeatherReport>,
    pub queried: Mutex<Vec<String>>,
}

impl FakeWeather {
    pub fn with(location: &str, condition: &str, temp_c: f64) -> Self {
        let mut reports = HashMap::new();
        reports.insert(
            location.to_string(),
            WeatherReport {
                location: location.to_string(),
                condition: condition.to_string(),
                temp_c,
                feels_like_c: temp_c + 2.0,
                uv: 6.0,
                humidity: 70.0,
            },
        );
        Self {
            reports,
            queried: Mutex::new(Vec::new()),
        }
    }

    fn lookup(&self, location: &str) -> Result<WeatherReport> {
        self.queried.lock().expect("lock").push(location.to_string());
        self.reports
            .get(location)
            .cloned()
            .ok_or_else(|| Error::Weather(format!("unknown location {location}")))
    }
}

#[async_trait]
impl WeatherProvider for FakeWeather {
    async fn current(&self, location: &str) -> Result<WeatherReport> {
        self.lookup(location)
    }

    async fn forecast(&self, location: &str) -> Result<WeatherReport> {
        self.lookup(location)
    }
}

pub struct FakeLunar;

#[async_trait]
impl LunarCalendar for FakeLunar {
    async fn to_lunar(&self, _date: NaiveDate) -> Result<LunarDate> {
        Ok(LunarDate {
            day: 15,
            month: 8,
            year: 2024,
            leap: false,
        })
    }
}

/// Services where every collaborator is a fake
pub fn services(stt: FakeStt, tts: FakeTts) -> Services {
    Services {
        stt: Arc::new(stt),
        tts: Arc::new(tts),
        chat: Arc::new(FakeChat::answering("Mình là Loa.")),
        weather: Arc::new(FakeWeather::with("Hanoi", "trời nắng", 30.0)),
        lunar: Arc::new(FakeLunar),
    }
}

/// Config with assets under `dir`, large frames and no pacing delay
pub fn test_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.assets.dir = dir.join("assets");
    config.assets.music_dir = dir.join("music");
    config.audio.frame_bytes = 4;
    config.audio.max_utterance_frames = 8;
    config.pacing.frame_bytes = 4096;
    config.pacing.frame_delay = Duration::ZERO;
    config.pacing.music_frame_delay = Duration::ZERO;
    config.pacing.silence_bytes = 16;
    config.pacing.end_delay = Duration::ZERO;
    config
}

/// Write every announcement as a WAV whose payload is its own file stem
pub fn write_announcements(config: &Config) {
    let assets = &config.assets;
    std::fs::create_dir_all(&assets.dir).expect("asset dir");
    std::fs::create_dir_all(&assets.music_dir).expect("music dir");
    let names = [
        &assets.welcome,
        &assets.not_heard,
        &assets.weather_unavailable,
        &assets.song_not_found,
        &assets.speech_timeout,
        &assets.chat_unavailable,
    ];
    for name in names.into_iter().chain(&assets.introductions) {
        write_wav(&assets.dir.join(name));
    }
}

/// WAV file whose payload is the file stem as UTF-8
pub fn write_wav(path: &Path) {
    let stem = path
        .file_stem()
        .expect("file stem")
        .to_string_lossy()
        .into_owned();
    std::fs::write(path, wav::build_container(stem.as_bytes())).expect("write wav");
}

/// Gateway over a temp asset directory
pub fn gateway(dir: &Path, services: Services) -> Gateway {
    let config = test_config(dir);
    write_announcements(&config);
    Gateway::new(Arc::new(config), services)
}
