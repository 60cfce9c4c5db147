//! External service integrations
//!
//! Each collaborator sits behind a trait so the pipeline can be exercised
//! with in-process fakes.

pub mod gemini;
pub mod lunar;
pub mod weather;

pub use gemini::{ChatModel, GeminiClient};
pub use lunar::{LunarCalendar, LunarClient, LunarDate};
pub use weather::{WeatherApiClient, WeatherProvider, WeatherReport};
