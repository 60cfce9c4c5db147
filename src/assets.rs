//! Pre-recorded audio: announcements, introductions and music

use std::fmt;
use std::path::{Path, PathBuf};

use rand::seq::SliceRandom;

use crate::config::AssetsConfig;
use crate::intent::song_file_name;
use crate::voice::wav;
use crate::{Error, Result};

/// Fixed spoken announcements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Announcement {
    /// Played when a device connects
    Welcome,
    /// Transcription failed or heard nothing
    NotHeard,
    WeatherUnavailable,
    SongNotFound,
    /// Speech synthesis produced nothing
    SpeechTimeout,
    /// The conversational model did not answer
    ChatUnavailable,
}

/// How an asset is paced on the way out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Announcement,
    Music,
}

/// A playable file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub path: PathBuf,
    pub kind: AssetKind,
}

impl Asset {
    /// File name for logs and messages
    #[must_use]
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map_or_else(|| self.path.display().to_string(), |n| n.to_string_lossy().into_owned())
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Directory-backed asset lookup
#[derive(Debug, Clone)]
pub struct AssetStore {
    config: AssetsConfig,
}

impl AssetStore {
    #[must_use]
    pub fn new(config: &AssetsConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    fn file_name(&self, announcement: Announcement) -> &str {
        let c = &self.config;
        match announcement {
            Announcement::Welcome => &c.welcome,
            Announcement::NotHeard => &c.not_heard,
            Announcement::WeatherUnavailable => &c.weather_unavailable,
            Announcement::SongNotFound => &c.song_not_found,
            Announcement::SpeechTimeout => &c.speech_timeout,
            Announcement::ChatUnavailable => &c.chat_unavailable,
        }
    }

    /// The file for a fixed announcement
    #[must_use]
    pub fn announcement(&self, announcement: Announcement) -> Asset {
        Asset {
            path: self.config.dir.join(self.file_name(announcement)),
            kind: AssetKind::Announcement,
        }
    }

    /// One self-introduction, chosen uniformly at random
    #[must_use]
    pub fn introduction(&self) -> Option<Asset> {
        self.config
            .introductions
            .choose(&mut rand::thread_rng())
            .map(|name| Asset {
                path: self.config.dir.join(name),
                kind: AssetKind::Announcement,
            })
    }

    /// File names of playable tracks, sorted
    ///
    /// A missing or unreadable music directory has no tracks.
    #[must_use]
    pub fn music_tracks(&self) -> Vec<String> {
        let entries = match std::fs::read_dir(&self.config.music_dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(
                    dir = %self.config.music_dir.display(),
                    error = %e,
                    "cannot read music directory"
                );
                return Vec::new();
            }
        };

        let mut tracks: Vec<String> = entries
            .filter_map(std::result::Result::ok)
            .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file()))
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| is_wav(name))
            .collect();
        tracks.sort();
        tracks
    }

    /// The track whose file name matches a spoken song name
    #[must_use]
    pub fn find_track(&self, song: &str) -> Option<Asset> {
        let wanted = song_file_name(song);
        let found = self.music_tracks().into_iter().find(|track| *track == wanted);
        tracing::debug!(song = %song, file = %wanted, found = found.is_some(), "music lookup");
        found.map(|name| self.track(&name))
    }

    /// Any track, chosen uniformly at random
    #[must_use]
    pub fn random_track(&self) -> Option<Asset> {
        self.music_tracks()
            .choose(&mut rand::thread_rng())
            .map(|name| self.track(name))
    }

    fn track(&self, name: &str) -> Asset {
        Asset {
            path: self.config.music_dir.join(name),
            kind: AssetKind::Music,
        }
    }

    /// Read an asset and return its PCM payload
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read
    pub async fn load(&self, asset: &Asset) -> Result<Vec<u8>> {
        let bytes = tokio::fs::read(&asset.path)
            .await
            .map_err(|e| Error::Asset(format!("{}: {e}", asset.path.display())))?;
        tracing::debug!(asset = %asset, bytes = bytes.len(), "asset loaded");
        Ok(wav::pcm_payload(&bytes).to_vec())
    }

    /// Announcements and introductions that are not on disk
    #[must_use]
    pub fn missing(&self) -> Vec<PathBuf> {
        let announcements = [
            Announcement::Welcome,
            Announcement::NotHeard,
            Announcement::WeatherUnavailable,
            Announcement::SongNotFound,
            Announcement::SpeechTimeout,
            Announcement::ChatUnavailable,
        ];
        announcements
            .into_iter()
            .map(|a| self.announcement(a).path)
            .chain(self.config.introductions.iter().map(|n| self.config.dir.join(n)))
            .filter(|path| !path.is_file())
            .collect()
    }

    /// Check that a file is 16 kHz mono 16-bit PCM
    ///
    /// # Errors
    ///
    /// Returns error if the file is unreadable or in another format
    pub fn check_format(path: &Path) -> Result<()> {
        let reader = hound::WavReader::open(path)
            .map_err(|e| Error::Asset(format!("{}: {e}", path.display())))?;
        let spec = reader.spec();
        if spec.sample_rate != wav::SAMPLE_RATE
            || spec.channels != wav::CHANNELS
            || spec.bits_per_sample != wav::BITS_PER_SAMPLE
            || spec.sample_format != hound::SampleFormat::Int
        {
            return Err(Error::Asset(format!(
                "{}: {} Hz, {} channel(s), {}-bit; expected 16000 Hz mono 16-bit",
                path.display(),
                spec.sample_rate,
                spec.channels,
                spec.bits_per_sample
            )));
        }
        Ok(())
    }
}

fn is_wav(name: &str) -> bool {
    Path::new(name)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"))
}
