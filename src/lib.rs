//! Loa Gateway - Vietnamese voice assistant gateway for embedded speakers
//!
//! A device streams microphone audio over a WebSocket. When it signals the end
//! of an utterance the gateway transcribes it, works out what was asked, and
//! streams spoken audio back at a pace the device can play.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                 Device (ESP32 speaker)               │
//! │        PCM frames ──►           ◄── PCM frames       │
//! └────────────────────┬────────────────────────────────┘
//!                      │ WebSocket
//! ┌────────────────────▼────────────────────────────────┐
//! │                    Loa Gateway                       │
//! │  Ingest │ STT │ Intent │ Handlers │ TTS │ Pacer      │
//! └────────────────────┬────────────────────────────────┘
//!                      │ HTTP
//! ┌────────────────────▼────────────────────────────────┐
//! │   PhoWhisper │ TTS │ Gemini │ WeatherAPI │ Lunar     │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod assets;
pub mod config;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod integrations;
pub mod intent;
pub mod session;
pub mod voice;

pub use config::Config;
pub use error::{Error, Result};
pub use gateway::{Gateway, Services};
