//! Gemini conversational model integration

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::session::{Role, Turn};
use crate::{Error, Result};

/// A conversational model
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Answer `text` given the earlier turns of the conversation
    ///
    /// # Errors
    ///
    /// Returns error if the model cannot be reached or gives no answer
    async fn reply(&self, history: &[Turn], text: &str) -> Result<String>;
}

/// Client for the Gemini `generateContent` API
#[derive(Debug)]
pub struct GeminiClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: SecretString,
    system_prompt: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<PartRef<'a>>,
}

#[derive(Debug, Serialize)]
struct PartRef<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

const fn role_name(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "model",
    }
}

impl GeminiClient {
    /// Create a new Gemini client
    ///
    /// # Arguments
    ///
    /// * `base_url` - API root (e.g., <https://generativelanguage.googleapis.com/v1beta>)
    /// * `model` - Model identifier (e.g., "gemini-2.0-flash")
    /// * `api_key` - Gemini API key
    /// * `system_prompt` - Optional system instruction sent with every request
    #[must_use]
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: SecretString,
        system_prompt: Option<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            model: model.into(),
            api_key,
            system_prompt,
        }
    }

    fn request<'a>(&'a self, history: &'a [Turn], text: &'a str) -> GenerateRequest<'a> {
        let mut contents: Vec<Content<'a>> = history
            .iter()
            .map(|turn| Content {
                role: Some(role_name(turn.role)),
                parts: vec![PartRef { text: &turn.text }],
            })
            .collect();
        contents.push(Content {
            role: Some(role_name(Role::User)),
            parts: vec![PartRef { text }],
        });

        GenerateRequest {
            contents,
            system_instruction: self.system_prompt.as_deref().map(|prompt| Content {
                role: None,
                parts: vec![PartRef { text: prompt }],
            }),
        }
    }
}

#[async_trait]
impl ChatModel for GeminiClient {
    async fn reply(&self, history: &[Turn], text: &str) -> Result<String> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        );
        tracing::debug!(model = %self.model, turns = history.len(), "calling Gemini");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&self.request(history, text))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Llm(format!("Gemini API error: {status} - {body}")));
        }

        let body: GenerateResponse = response.json().await?;
        first_text(body)
    }
}

/// Concatenated text parts of the first candidate
fn first_text(body: GenerateResponse) -> Result<String> {
    let text: String = body
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(Error::Llm("Gemini returned no text".to_string()));
    }
    Ok(text)
}
