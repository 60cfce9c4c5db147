//! TOML configuration file loading
//!
//! Supports `~/.config/loa/config.toml` (or `--config <path>`) as a persistent
//! config source. All fields are optional; the file is a partial overlay on
//! top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{Error, Result};

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoaConfigFile {
    #[serde(default)]
    pub server: ServerFileConfig,

    #[serde(default)]
    pub audio: AudioFileConfig,

    #[serde(default)]
    pub pacing: PacingFileConfig,

    #[serde(default)]
    pub stt: SttFileConfig,

    #[serde(default)]
    pub tts: TtsFileConfig,

    #[serde(default)]
    pub llm: LlmFileConfig,

    #[serde(default)]
    pub weather: WeatherFileConfig,

    #[serde(default)]
    pub lunar: LunarFileConfig,

    #[serde(default)]
    pub assets: AssetsFileConfig,

    #[serde(default)]
    pub locale: LocaleFileConfig,
}

/// Listener and connection lifecycle
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    /// Bind address (e.g. "0.0.0.0")
    pub host: Option<String>,
    pub port: Option<u16>,
    pub heartbeat_interval_secs: Option<u64>,
    pub shutdown_grace_ms: Option<u64>,
}

/// Inbound audio
#[derive(Debug, Default, Deserialize)]
pub struct AudioFileConfig {
    /// Expected length of one inbound binary frame
    pub frame_bytes: Option<usize>,
    pub max_utterance_frames: Option<usize>,
}

/// Outbound framing and pacing
#[derive(Debug, Default, Deserialize)]
pub struct PacingFileConfig {
    pub frame_bytes: Option<usize>,
    pub frame_delay_ms: Option<u64>,
    pub music_frame_delay_ms: Option<u64>,
    pub silence_bytes: Option<usize>,
    pub end_delay_ms: Option<u64>,
}

/// Speech-to-text service
#[derive(Debug, Default, Deserialize)]
pub struct SttFileConfig {
    pub url: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// Text-to-speech service
#[derive(Debug, Default, Deserialize)]
pub struct TtsFileConfig {
    pub url: Option<String>,
    /// Voice identifier (e.g. "vi-VN-HoaiMyNeural")
    pub voice: Option<String>,
    pub rate: Option<String>,
    pub volume: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// Conversational model
#[derive(Debug, Default, Deserialize)]
pub struct LlmFileConfig {
    pub api_key: Option<String>,
    /// Model identifier (e.g. "gemini-2.0-flash")
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub system_prompt: Option<String>,
    pub timeout_secs: Option<u64>,
    pub max_history_turns: Option<usize>,
}

/// Weather service
#[derive(Debug, Default, Deserialize)]
pub struct WeatherFileConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// Lunar calendar service
#[derive(Debug, Default, Deserialize)]
pub struct LunarFileConfig {
    pub url: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// Pre-recorded audio
#[derive(Debug, Default, Deserialize)]
pub struct AssetsFileConfig {
    pub dir: Option<PathBuf>,
    pub music_dir: Option<PathBuf>,
    pub welcome: Option<String>,
    pub not_heard: Option<String>,
    pub weather_unavailable: Option<String>,
    pub song_not_found: Option<String>,
    pub speech_timeout: Option<String>,
    pub chat_unavailable: Option<String>,
    pub introductions: Option<Vec<String>>,
}

/// Clock and place defaults
#[derive(Debug, Default, Deserialize)]
pub struct LocaleFileConfig {
    pub utc_offset_hours: Option<i32>,
    pub home_location: Option<String>,
}

/// Load the TOML config file
///
/// An explicit `path` must exist and parse. Without one, the standard path is
/// tried and a missing or broken file yields `LoaConfigFile::default()`.
///
/// # Errors
///
/// Returns error if an explicit path cannot be read or parsed
pub fn load_config_file(path: Option<&Path>) -> Result<LoaConfigFile> {
    if let Some(path) = path {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        let config = toml::from_str(&content)?;
        tracing::info!(path = %path.display(), "loaded config file");
        return Ok(config);
    }

    let Some(path) = config_file_path() else {
        return Ok(LoaConfigFile::default());
    };

    if !path.exists() {
        return Ok(LoaConfigFile::default());
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                Ok(config)
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                Ok(LoaConfigFile::default())
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            Ok(LoaConfigFile::default())
        }
    }
}

/// Return the config file path: `~/.config/loa/config.toml`
#[must_use]
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("loa").join("config.toml"))
}
