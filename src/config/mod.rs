//! Configuration management for the Loa gateway
//!
//! Resolved once at startup with precedence env > TOML file > default, then
//! shared read-only behind an `Arc`.

pub mod file;

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::FixedOffset;
use secrecy::{ExposeSecret, SecretString};

use self::file::LoaConfigFile;
use crate::{Error, Result};

/// Default API server port
pub const DEFAULT_PORT: u16 = 8080;

/// Loa gateway configuration
#[derive(Debug)]
pub struct Config {
    pub server: ServerConfig,
    pub audio: AudioConfig,
    pub pacing: PacingConfig,
    pub stt: SttConfig,
    pub tts: TtsConfig,
    pub llm: LlmConfig,
    pub weather: WeatherConfig,
    pub lunar: LunarConfig,
    pub assets: AssetsConfig,
    pub locale: LocaleConfig,
}

/// Listener and connection lifecycle
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Ping period; a session that misses a pong is flagged stale
    pub heartbeat_interval: Duration,

    /// Wait after closing sessions so close frames flush
    pub shutdown_grace: Duration,
}

/// Inbound audio
#[derive(Debug, Clone)]
pub struct AudioConfig {
    /// Binary messages of exactly this length are audio
    pub frame_bytes: usize,

    /// Frames kept per utterance before the rest are dropped
    pub max_utterance_frames: usize,
}

/// Outbound framing and pacing
#[derive(Debug, Clone)]
pub struct PacingConfig {
    pub frame_bytes: usize,
    pub frame_delay: Duration,
    pub music_frame_delay: Duration,
    pub silence_bytes: usize,
    pub end_delay: Duration,
}

/// Speech-to-text service
#[derive(Debug, Clone)]
pub struct SttConfig {
    pub url: String,
    pub timeout: Duration,
}

/// Text-to-speech service
#[derive(Debug, Clone)]
pub struct TtsConfig {
    pub url: String,
    pub voice: String,
    pub rate: String,
    pub volume: String,
    /// Budget for one sentence
    pub timeout: Duration,
}

/// Conversational model
#[derive(Debug)]
pub struct LlmConfig {
    /// From `GEMINI_API_KEY`
    pub api_key: SecretString,
    pub model: String,
    pub base_url: String,
    pub system_prompt: Option<String>,
    pub timeout: Duration,

    /// Turns of context kept per session
    pub max_history_turns: usize,
}

/// Weather service
#[derive(Debug)]
pub struct WeatherConfig {
    /// From `WEATHER_API_KEY`
    pub api_key: SecretString,
    pub base_url: String,
    pub timeout: Duration,
}

/// Lunar calendar service
#[derive(Debug, Clone)]
pub struct LunarConfig {
    pub url: String,
    pub timeout: Duration,
}

/// Pre-recorded audio
#[derive(Debug, Clone)]
pub struct AssetsConfig {
    pub dir: PathBuf,
    pub music_dir: PathBuf,
    pub welcome: String,
    pub not_heard: String,
    pub weather_unavailable: String,
    pub song_not_found: String,
    pub speech_timeout: String,
    pub chat_unavailable: String,
    /// Self-introductions, one picked at random per request
    pub introductions: Vec<String>,
}

/// Clock and place defaults
#[derive(Debug, Clone)]
pub struct LocaleConfig {
    /// Offset used for spoken time and date
    pub utc_offset: FixedOffset,

    /// Location used when a weather request names none
    pub home_location: String,
}

/// Default system instruction for the conversational model
const SYSTEM_PROMPT: &str = "Bạn là Loa, một trợ lý giọng nói tiếng Việt thân thiện. \
Trả lời ngắn gọn bằng tiếng Việt, không dùng định dạng markdown, \
vì câu trả lời sẽ được đọc thành tiếng.";

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: DEFAULT_PORT,
                heartbeat_interval: Duration::from_secs(30),
                shutdown_grace: Duration::from_secs(1),
            },
            audio: AudioConfig {
                frame_bytes: 2048,
                // 60 s of 16 kHz 16-bit mono in 2048-byte frames
                max_utterance_frames: 938,
            },
            pacing: PacingConfig {
                frame_bytes: 2048,
                frame_delay: Duration::from_millis(50),
                music_frame_delay: Duration::from_millis(20),
                silence_bytes: 1600,
                end_delay: Duration::from_millis(100),
            },
            stt: SttConfig {
                url: "http://localhost:5000/transcribe".to_string(),
                timeout: Duration::from_secs(30),
            },
            tts: TtsConfig {
                url: "http://localhost:5001/tts".to_string(),
                voice: "vi-VN-HoaiMyNeural".to_string(),
                rate: "+0%".to_string(),
                volume: "+0%".to_string(),
                timeout: Duration::from_secs(15),
            },
            llm: LlmConfig {
                api_key: SecretString::from(String::new()),
                model: "gemini-2.0-flash".to_string(),
                base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
                system_prompt: Some(SYSTEM_PROMPT.to_string()),
                timeout: Duration::from_secs(20),
                max_history_turns: 20,
            },
            weather: WeatherConfig {
                api_key: SecretString::from(String::new()),
                base_url: "https://api.weatherapi.com/v1".to_string(),
                timeout: Duration::from_secs(10),
            },
            lunar: LunarConfig {
                url: "http://localhost:5002/lunar".to_string(),
                timeout: Duration::from_secs(5),
            },
            assets: AssetsConfig {
                dir: PathBuf::from("assets"),
                music_dir: PathBuf::from("music"),
                welcome: "welcome.wav".to_string(),
                not_heard: "not_heard.wav".to_string(),
                weather_unavailable: "weather_unavailable.wav".to_string(),
                song_not_found: "song_not_found.wav".to_string(),
                speech_timeout: "speech_timeout.wav".to_string(),
                chat_unavailable: "chat_unavailable.wav".to_string(),
                introductions: vec![
                    "intro_1.wav".to_string(),
                    "intro_2.wav".to_string(),
                    "intro_3.wav".to_string(),
                ],
            },
            locale: LocaleConfig {
                utc_offset: INDOCHINA_TIME,
                home_location: crate::intent::HOME_LOCATION.to_string(),
            },
        }
    }
}

/// UTC+7
const INDOCHINA_TIME: FixedOffset = match FixedOffset::east_opt(7 * 3600) {
    Some(offset) => offset,
    None => panic!("UTC+7 is a valid offset"),
};

fn secs(value: Option<u64>, default: Duration) -> Duration {
    value.map_or(default, Duration::from_secs)
}

fn millis(value: Option<u64>, default: Duration) -> Duration {
    value.map_or(default, Duration::from_millis)
}

fn parse_env<T: std::str::FromStr>(name: &str, value: Option<String>) -> Result<Option<T>> {
    value
        .map(|v| {
            v.trim()
                .parse::<T>()
                .map_err(|_| Error::Config(format!("invalid value for {name}: {v}")))
        })
        .transpose()
}

impl Config {
    /// Load configuration from the environment and the TOML file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be loaded, a value is invalid, or a
    /// required API key is missing
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let fc = file::load_config_file(path)?;
        let config = Self::resolve(fc, |name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Merge a parsed file and an environment lookup over the defaults
    ///
    /// # Errors
    ///
    /// Returns error if an environment value does not parse
    pub fn resolve(fc: LoaConfigFile, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let d = Self::default();
        let env = |name: &str| env(name).filter(|v| !v.trim().is_empty());

        let port = parse_env::<u16>("LOA_PORT", env("LOA_PORT").or_else(|| env("PORT")))?
            .or(fc.server.port)
            .unwrap_or(d.server.port);

        let server = ServerConfig {
            host: env("LOA_HOST").or(fc.server.host).unwrap_or(d.server.host),
            port,
            heartbeat_interval: secs(
                parse_env("LOA_HEARTBEAT_SECS", env("LOA_HEARTBEAT_SECS"))?
                    .or(fc.server.heartbeat_interval_secs),
                d.server.heartbeat_interval,
            ),
            shutdown_grace: millis(fc.server.shutdown_grace_ms, d.server.shutdown_grace),
        };

        let audio = AudioConfig {
            frame_bytes: fc.audio.frame_bytes.unwrap_or(d.audio.frame_bytes),
            max_utterance_frames: fc
                .audio
                .max_utterance_frames
                .unwrap_or(d.audio.max_utterance_frames),
        };

        let pacing = PacingConfig {
            frame_bytes: fc.pacing.frame_bytes.unwrap_or(d.pacing.frame_bytes),
            frame_delay: millis(fc.pacing.frame_delay_ms, d.pacing.frame_delay),
            music_frame_delay: millis(fc.pacing.music_frame_delay_ms, d.pacing.music_frame_delay),
            silence_bytes: fc.pacing.silence_bytes.unwrap_or(d.pacing.silence_bytes),
            end_delay: millis(fc.pacing.end_delay_ms, d.pacing.end_delay),
        };

        let stt = SttConfig {
            url: env("PHOWHISPER_URL").or(fc.stt.url).unwrap_or(d.stt.url),
            timeout: secs(fc.stt.timeout_secs, d.stt.timeout),
        };

        let tts = TtsConfig {
            url: env("TTS_URL").or(fc.tts.url).unwrap_or(d.tts.url),
            voice: env("TTS_VOICE").or(fc.tts.voice).unwrap_or(d.tts.voice),
            rate: fc.tts.rate.unwrap_or(d.tts.rate),
            volume: fc.tts.volume.unwrap_or(d.tts.volume),
            timeout: secs(fc.tts.timeout_secs, d.tts.timeout),
        };

        let llm = LlmConfig {
            api_key: SecretString::from(
                env("GEMINI_API_KEY").or(fc.llm.api_key).unwrap_or_default(),
            ),
            model: env("GEMINI_MODEL").or(fc.llm.model).unwrap_or(d.llm.model),
            base_url: fc.llm.base_url.unwrap_or(d.llm.base_url),
            system_prompt: fc.llm.system_prompt.or(d.llm.system_prompt),
            timeout: secs(fc.llm.timeout_secs, d.llm.timeout),
            max_history_turns: fc.llm.max_history_turns.unwrap_or(d.llm.max_history_turns),
        };

        let weather = WeatherConfig {
            api_key: SecretString::from(
                env("WEATHER_API_KEY").or(fc.weather.api_key).unwrap_or_default(),
            ),
            base_url: fc.weather.base_url.unwrap_or(d.weather.base_url),
            timeout: secs(fc.weather.timeout_secs, d.weather.timeout),
        };

        let lunar = LunarConfig {
            url: env("LUNAR_URL").or(fc.lunar.url).unwrap_or(d.lunar.url),
            timeout: secs(fc.lunar.timeout_secs, d.lunar.timeout),
        };

        let a = fc.assets;
        let assets = AssetsConfig {
            dir: env("LOA_ASSET_DIR").map(PathBuf::from).or(a.dir).unwrap_or(d.assets.dir),
            music_dir: env("LOA_MUSIC_DIR")
                .map(PathBuf::from)
                .or(a.music_dir)
                .unwrap_or(d.assets.music_dir),
            welcome: a.welcome.unwrap_or(d.assets.welcome),
            not_heard: a.not_heard.unwrap_or(d.assets.not_heard),
            weather_unavailable: a.weather_unavailable.unwrap_or(d.assets.weather_unavailable),
            song_not_found: a.song_not_found.unwrap_or(d.assets.song_not_found),
            speech_timeout: a.speech_timeout.unwrap_or(d.assets.speech_timeout),
            chat_unavailable: a.chat_unavailable.unwrap_or(d.assets.chat_unavailable),
            introductions: a.introductions.unwrap_or(d.assets.introductions),
        };

        let utc_offset = match parse_env::<i32>("LOA_UTC_OFFSET", env("LOA_UTC_OFFSET"))?
            .or(fc.locale.utc_offset_hours)
        {
            Some(hours) => Some(hours)
                .filter(|h| (-12..=14).contains(h))
                .and_then(|h| FixedOffset::east_opt(h * 3600))
                .ok_or_else(|| Error::Config(format!("UTC offset out of range: {hours}")))?,
            None => d.locale.utc_offset,
        };

        let locale = LocaleConfig {
            utc_offset,
            home_location: fc.locale.home_location.unwrap_or(d.locale.home_location),
        };

        Ok(Self {
            server,
            audio,
            pacing,
            stt,
            tts,
            llm,
            weather,
            lunar,
            assets,
            locale,
        })
    }

    /// Check startup requirements
    ///
    /// # Errors
    ///
    /// Returns error if a required key is missing or a size is zero
    pub fn validate(&self) -> Result<()> {
        if self.llm.api_key.expose_secret().is_empty() {
            return Err(Error::Config("GEMINI_API_KEY is required".to_string()));
        }
        if self.weather.api_key.expose_secret().is_empty() {
            return Err(Error::Config("WEATHER_API_KEY is required".to_string()));
        }
        if self.audio.frame_bytes == 0 || self.pacing.frame_bytes == 0 {
            return Err(Error::Config("frame sizes must be non-zero".to_string()));
        }
        if self.audio.max_utterance_frames == 0 {
            return Err(Error::Config("max_utterance_frames must be non-zero".to_string()));
        }
        Ok(())
    }

    /// Outbound pacing for spoken responses
    #[must_use]
    pub const fn pacer(&self) -> crate::voice::Pacer {
        crate::voice::Pacer {
            frame_bytes: self.pacing.frame_bytes,
            frame_delay: self.pacing.frame_delay,
            silence_bytes: self.pacing.silence_bytes,
            end_delay: self.pacing.end_delay,
        }
    }

    /// Outbound pacing for music
    #[must_use]
    pub const fn music_pacer(&self) -> crate::voice::Pacer {
        self.pacer().with_frame_delay(self.pacing.music_frame_delay)
    }
}
