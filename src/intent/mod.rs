//! Intent classification
//!
//! A transcript is matched against one ordered rule table; the first rule whose
//! matcher accepts the text extracts the intent's parameters. Anything no rule
//! claims is open conversation. Classification is pure and never fails.

mod location;
mod normalize;

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

pub use location::{canonical_location, resolve_location};
pub use normalize::{fold, normalize_transcript, song_file_name};

/// Spoken location used when a weather request names none
pub const HOME_LOCATION: &str = "Hà Nội";

/// Which song a music request asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SongRef {
    /// No song named; pick any
    Random,
    /// Free text following the music verb phrase
    Named(String),
}

impl fmt::Display for SongRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Random => f.write_str("random"),
            Self::Named(name) => f.write_str(name),
        }
    }
}

/// What the user asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Music { song: SongRef },
    WeatherCurrent { location: String },
    WeatherForecast { location: String },
    Time,
    Date,
    LunarDate,
    Introduce,
    /// Open conversation with the assistant
    Normal { text: String },
}

impl Intent {
    /// Short name for logs
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Music { .. } => "music",
            Self::WeatherCurrent { .. } => "weather_current",
            Self::WeatherForecast { .. } => "weather_forecast",
            Self::Time => "time",
            Self::Date => "date",
            Self::LunarDate => "lunar_date",
            Self::Introduce => "introduce",
            Self::Normal { .. } => "normal",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Music { song } => write!(f, "Music({song})"),
            Self::WeatherCurrent { location } => write!(f, "WeatherCurrent({location})"),
            Self::WeatherForecast { location } => write!(f, "WeatherForecast({location})"),
            Self::Time => f.write_str("Time"),
            Self::Date => f.write_str("Date"),
            Self::LunarDate => f.write_str("LunarDate"),
            Self::Introduce => f.write_str("Introduce"),
            Self::Normal { text } => write!(f, "Normal({text})"),
        }
    }
}

/// One entry of the rule table
struct Rule {
    name: &'static str,
    matches: fn(&str) -> bool,
    extract: fn(&str) -> Intent,
}

/// Rules in priority order
static RULES: &[Rule] = &[
    Rule {
        name: "music",
        matches: is_music,
        extract: extract_music,
    },
    Rule {
        name: "weather_current",
        matches: is_weather_current,
        extract: extract_weather_current,
    },
    Rule {
        name: "weather_forecast",
        matches: is_weather_forecast,
        extract: extract_weather_forecast,
    },
    Rule {
        name: "lunar_date",
        matches: is_lunar_date,
        extract: |_| Intent::LunarDate,
    },
    Rule {
        name: "date",
        matches: is_date,
        extract: |_| Intent::Date,
    },
    Rule {
        name: "time",
        matches: is_time,
        extract: |_| Intent::Time,
    },
    Rule {
        name: "introduce",
        matches: is_introduce,
        extract: |_| Intent::Introduce,
    },
];

/// Classify a normalized transcript
#[must_use]
pub fn classify(text: &str) -> Intent {
    let text = text.trim();
    RULES
        .iter()
        .find(|rule| (rule.matches)(text))
        .map_or_else(
            || Intent::Normal {
                text: text.to_string(),
            },
            |rule| {
                tracing::debug!(rule = rule.name, "intent rule matched");
                (rule.extract)(text)
            },
        )
}

fn contains_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| text.contains(k))
}

static MUSIC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^(?:(?:loa ơi|làm ơn|hãy|bạn|(?:tôi|mình|em) muốn|muốn|cho (?:tôi|mình)|giúp (?:tôi|mình))\s+)*",
        r"(?:bật|phát|mở|nghe)\s+(?:cho (?:tôi|mình)\s+)?(?:bài hát|bài nhạc|bài|nhạc)(?:\s+(.*))?$",
    ))
    .unwrap_or_else(|e| panic!("invalid music pattern: {e}"))
});

/// Closing particles that follow the music verb phrase, not part of a title
const SONG_PARTICLES: &[&str] = &[
    "cho tôi nghe",
    "cho mình nghe",
    "cho tôi",
    "cho mình",
    "giúp tôi",
    "giúp mình",
    "lên",
    "đi",
    "nhé",
    "nha",
    "với",
    "nào",
    "không",
];

/// Drop closing particles until none is left at the end of `name`
fn strip_particles(mut name: &str) -> &str {
    loop {
        let stripped = SONG_PARTICLES.iter().find_map(|p| {
            if name == *p {
                Some("")
            } else {
                name.strip_suffix(p)
                    .and_then(|rest| rest.strip_suffix(' '))
                    .map(str::trim_end)
            }
        });
        match stripped {
            Some(rest) => name = rest,
            None => return name,
        }
    }
}

fn is_music(text: &str) -> bool {
    MUSIC_RE.is_match(text)
}

fn extract_music(text: &str) -> Intent {
    let name = MUSIC_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .map_or("", |m| strip_particles(m.as_str().trim()));

    let song = if name.is_empty() || contains_any(name, &["ngẫu nhiên", "bất kỳ", "bất kì"]) {
        SongRef::Random
    } else {
        SongRef::Named(name.to_string())
    };
    Intent::Music { song }
}

const WEATHER: &str = "thời tiết";

fn is_weather_forecast(text: &str) -> bool {
    text.contains("dự báo thời tiết") || (text.contains(WEATHER) && text.contains("ngày mai"))
}

fn is_weather_current(text: &str) -> bool {
    text.contains(WEATHER) && !is_weather_forecast(text)
}

fn extract_weather_current(text: &str) -> Intent {
    Intent::WeatherCurrent {
        location: extract_location(text),
    }
}

fn extract_weather_forecast(text: &str) -> Intent {
    Intent::WeatherForecast {
        location: extract_location(text),
    }
}

static PLACE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|\s)(?:ở|tại)\s+(.+)$").unwrap_or_else(|e| panic!("invalid place pattern: {e}"))
});

static AFTER_WEATHER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"thời tiết\s+(.+)$").unwrap_or_else(|e| panic!("invalid weather pattern: {e}"))
});

/// Phrases that qualify a weather question without naming a place
const NOT_A_PLACE: &[&str] = &[
    "như thế nào",
    "thế nào",
    "ra sao",
    "hôm nay",
    "ngày mai",
    "hiện tại",
    "bây giờ",
    "lúc này",
    "dự báo",
];

/// Filler words dropped from an extracted place
const FILLER: &[&str] = &["là", "thì", "sẽ", "đang", "của"];

/// Spoken location of a weather request, or [`HOME_LOCATION`]
fn extract_location(text: &str) -> String {
    // "hiện tại" would otherwise read as the preposition "tại"
    let mut cleaned = format!(" {text} ");
    for phrase in NOT_A_PLACE {
        cleaned = cleaned.replace(phrase, " ");
    }

    let raw = PLACE_RE
        .captures(&cleaned)
        .or_else(|| AFTER_WEATHER_RE.captures(&cleaned))
        .and_then(|c| c.get(1))
        .map_or("", |m| m.as_str());

    let place = raw
        .split_whitespace()
        .filter(|word| !FILLER.contains(word))
        .collect::<Vec<_>>()
        .join(" ");

    if place.is_empty() {
        HOME_LOCATION.to_string()
    } else {
        place
    }
}

fn is_lunar_date(text: &str) -> bool {
    contains_any(text, &["âm lịch", "lịch âm", "ngày âm"])
}

fn is_date(text: &str) -> bool {
    contains_any(
        text,
        &[
            "ngày mấy",
            "ngày bao nhiêu",
            "hôm nay là ngày",
            "hôm nay ngày",
            "thứ mấy",
            "ngày hôm nay",
        ],
    )
}

fn is_time(text: &str) -> bool {
    contains_any(text, &["mấy giờ", "giờ rồi", "bây giờ là", "thời gian hiện tại"])
}

fn is_introduce(text: &str) -> bool {
    contains_any(
        text,
        &["giới thiệu", "bạn là ai", "bạn tên là gì", "tên bạn là gì", "tên của bạn"],
    )
}
