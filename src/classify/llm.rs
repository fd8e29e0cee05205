//! Model-backed classifier over an OpenAI-compatible chat-completions API.
//!
//! Works against hosted endpoints and local model servers alike. The prompt
//! pins the reply to a single category word; anything else reads as "no
//! opinion" rather than an error.

use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use crate::services::tag::Category;

use super::{Classifier, ClassifyError};

pub const DEFAULT_CLASSIFIER_MODEL: &str = "llama3.2";
pub const DEFAULT_CLASSIFIER_TIMEOUT_SECS: u64 = 10;
const CONNECT_TIMEOUT_SECS: u64 = 5;
const MAX_TOKENS: u32 = 8;

const SYSTEM_PROMPT: &str = "You sort short meetup suggestions into exactly one category. \
Categories: time, location, food, activity. \
Reply with the category word only, in lowercase, with no punctuation.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifierConfig {
    /// Base URL without trailing slash, e.g. `http://localhost:11434/v1`.
    pub base_url: String,
    pub model: String,
    /// Sent as a bearer token when present.
    pub api_key: Option<String>,
    pub timeout: Duration,
}

pub struct LlmClassifier {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl LlmClassifier {
    /// # Errors
    ///
    /// Returns `HttpClientBuild` if the reqwest client cannot be built.
    pub fn new(config: &ClassifierConfig) -> Result<Self, ClassifyError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS).min(config.timeout))
            .build()
            .map_err(|e| ClassifyError::HttpClientBuild(e.to_string()))?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        })
    }

    async fn send_json(&self, path: &str, body: &impl Serialize) -> Result<String, ClassifyError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.http.post(url).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request
            .send()
            .await
            .map_err(|e| ClassifyError::Request(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| ClassifyError::Request(e.to_string()))?;
        if status != 200 {
            return Err(ClassifyError::Response { status, body: text });
        }
        Ok(text)
    }
}

#[async_trait::async_trait]
impl Classifier for LlmClassifier {
    async fn classify(&self, text: &str) -> Result<Option<Category>, ClassifyError> {
        let messages = [
            CcMessage { role: "system", content: SYSTEM_PROMPT },
            CcMessage { role: "user", content: text },
        ];
        let body = CcRequest { model: &self.model, max_tokens: MAX_TOKENS, temperature: 0.0, messages: &messages };
        let reply = self.send_json("/chat/completions", &body).await?;
        let content = parse_chat_completions_content(&reply)?;
        Ok(parse_category_reply(&content))
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Serialize)]
struct CcRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: &'a [CcMessage<'a>],
}

#[derive(Serialize)]
struct CcMessage<'a> {
    role: &'static str,
    content: &'a str,
}

/// Text of `choices[0].message.content`.
pub(crate) fn parse_chat_completions_content(json_text: &str) -> Result<String, ClassifyError> {
    let root: Value = serde_json::from_str(json_text).map_err(|e| ClassifyError::Parse(e.to_string()))?;
    let Some(choice) = root
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|arr| arr.first())
    else {
        return Err(ClassifyError::Parse("missing choices[0]".to_owned()));
    };
    Ok(choice
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned())
}

/// First word of the reply that names a category.
pub(crate) fn parse_category_reply(reply: &str) -> Option<Category> {
    reply
        .split(|c: char| !c.is_ascii_alphabetic())
        .filter(|w| !w.is_empty())
        .find_map(|w| w.parse::<Category>().ok())
}

#[cfg(test)]
#[path = "llm_test.rs"]
mod tests;
