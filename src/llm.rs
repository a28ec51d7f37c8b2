//! Language model generation
//!
//! The pipeline only needs `prompt -> text`. [`ChatClient`] provides that
//! over any OpenAI-compatible `/chat/completions` endpoint.

use std::time::Duration;

use async_trait::async_trait;

use crate::{Error, Result};

/// Default OpenAI-compatible endpoint
pub const DEFAULT_LLM_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Default chat model
pub const DEFAULT_LLM_MODEL: &str = "openai/gpt-oss-120b";

/// Produces text for a prompt
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generate a completion for `prompt`
    ///
    /// # Errors
    ///
    /// Returns error if the backend is unreachable or rejects the request
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Settings for [`ChatClient`]
#[derive(Debug, Clone)]
pub struct ChatSettings {
    /// API base URL, without the `/chat/completions` suffix
    pub base_url: String,
    /// Model identifier
    pub model: String,
    /// Bearer token
    pub api_key: String,
    /// Max tokens per completion
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
    /// Request timeout; `None` leaves requests unbounded
    pub timeout: Option<Duration>,
}

/// OpenAI-compatible chat completions client
#[derive(Debug, Clone)]
pub struct ChatClient {
    client: reqwest::Client,
    settings: ChatSettings,
}

#[derive(serde::Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(serde::Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(serde::Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(serde::Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(serde::Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatClient {
    /// Create a chat client
    ///
    /// # Errors
    ///
    /// Returns error if the API key is missing or the HTTP client cannot be built
    pub fn new(settings: ChatSettings) -> Result<Self> {
        if settings.api_key.is_empty() {
            return Err(Error::Config("API key required for LLM generation".to_string()));
        }

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = settings.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            settings,
        })
    }

    /// Model used for completions
    #[must_use]
    pub fn model(&self) -> &str {
        &self.settings.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl Generator for ChatClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.settings.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
            stream: false,
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", self.settings.api_key))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Generation(format!("LLM API error {status}: {body}")));
        }

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::Generation("LLM returned no content".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> ChatSettings {
        ChatSettings {
            base_url: "http://localhost:8080/v1/".to_string(),
            model: DEFAULT_LLM_MODEL.to_string(),
            api_key: "key".to_string(),
            max_tokens: 256,
            temperature: 0.7,
            timeout: Some(Duration::from_secs(5)),
        }
    }

    #[test]
    fn test_missing_api_key() {
        let mut s = settings();
        s.api_key = String::new();
        assert!(ChatClient::new(s).is_err());
    }

    #[test]
    fn test_endpoint_joins_cleanly() {
        let client = ChatClient::new(settings()).unwrap();
        assert_eq!(client.endpoint(), "http://localhost:8080/v1/chat/completions");
        assert_eq!(client.model(), DEFAULT_LLM_MODEL);
    }

    #[test]
    fn test_response_without_content() {
        let parsed: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"role":"assistant"}}]}"#).unwrap();
        assert!(parsed.choices[0].message.content.is_none());
    }
}
