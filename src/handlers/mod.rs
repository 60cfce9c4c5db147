//! Intent handlers
//!
//! Every intent ends in a [`Reply`]: text to synthesize, or a recording to
//! stream as-is. Collaborator failures are answered here with a fixed
//! fallback, so handling never fails.

pub mod chat;
pub mod clock;
pub mod music;
pub mod weather;

use crate::assets::{Announcement, Asset};
use crate::error::with_timeout;
use crate::gateway::Gateway;
use crate::intent::{Intent, resolve_location};
use crate::session::Conversation;

use self::weather::Outlook;

/// Spoken when no introduction recording is configured
const INTRODUCTION: &str = "Xin chào, mình là Loa, trợ lý giọng nói của bạn.";

/// What to send back for one utterance
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Text for the response synthesizer
    Speak(String),
    /// A recording streamed directly
    Play(Asset),
}

/// Handle one classified utterance
pub async fn respond(gateway: &Gateway, intent: Intent, conversation: &mut Conversation) -> Reply {
    let config = gateway.config();
    let services = gateway.services();
    let assets = gateway.assets();

    match intent {
        Intent::Music { song } => Reply::Play(music::choose_track(assets, &song)),

        Intent::WeatherCurrent { location } => {
            weather_reply(gateway, &location, Outlook::Current).await
        }

        Intent::WeatherForecast { location } => {
            weather_reply(gateway, &location, Outlook::Tomorrow).await
        }

        Intent::Time => Reply::Speak(clock::time_sentence(&gateway.now())),

        Intent::Date => Reply::Speak(clock::date_sentence(gateway.now().date_naive())),

        Intent::LunarDate => {
            let today = gateway.now().date_naive();
            match with_timeout("lunar", config.lunar.timeout, services.lunar.to_lunar(today)).await {
                Ok(lunar) => Reply::Speak(clock::lunar_sentence(&lunar)),
                Err(e) => {
                    tracing::warn!(error = %e, "lunar conversion failed");
                    Reply::Speak(clock::LUNAR_UNAVAILABLE.to_string())
                }
            }
        }

        Intent::Introduce => assets
            .introduction()
            .map_or_else(|| Reply::Speak(INTRODUCTION.to_string()), Reply::Play),

        Intent::Normal { text } => {
            match chat::respond(services.chat.as_ref(), conversation, &text, config.llm.timeout).await {
                Some(answer) => Reply::Speak(answer),
                None => Reply::Play(assets.announcement(Announcement::ChatUnavailable)),
            }
        }
    }
}

async fn weather_reply(gateway: &Gateway, spoken: &str, outlook: Outlook) -> Reply {
    let config = gateway.config();
    let location = resolve_location(spoken, &config.locale.home_location);
    let provider = gateway.services().weather.as_ref();

    match weather::respond(provider, &location, outlook, config.weather.timeout).await {
        Some(sentence) => Reply::Speak(sentence),
        None => Reply::Play(gateway.assets().announcement(Announcement::WeatherUnavailable)),
    }
}
