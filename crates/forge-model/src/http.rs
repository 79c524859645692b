//! OpenAI-compatible chat-completions backend

use crate::error::GenerationError;
use crate::port::GenerationBackend;
use crate::request::{GenerationRequest, GenerationResponse};
use crate::retry::is_retryable_status;
use serde::{Deserialize, Serialize};

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4";

/// Connection settings; the API key is never serialized
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: String,
    pub model: String,
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
        }
    }
}

impl BackendConfig {
    #[inline]
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    #[serde(default)]
    message: Option<ChoiceMessage>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct OpenAiCompatibleBackend {
    client: reqwest::Client,
    config: BackendConfig,
}

impl OpenAiCompatibleBackend {
    /// # Errors
    /// Returns [`GenerationError::Configuration`] if the HTTP client cannot be built.
    pub fn new(config: BackendConfig) -> Result<Self, GenerationError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| GenerationError::Configuration(format!("failed to create http client: {e}")))?;
        Ok(Self { client, config })
    }

    #[must_use]
    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }
}

/// Map a non-success HTTP status to a failure kind
#[must_use]
pub fn classify_status(status: u16, body: &str) -> GenerationError {
    let detail = format!("http {status}: {}", truncate(body, 200));
    if is_retryable_status(status) || status >= 500 {
        GenerationError::Unavailable(detail)
    } else {
        GenerationError::Rejected(detail)
    }
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[async_trait::async_trait]
impl GenerationBackend for OpenAiCompatibleBackend {
    fn name(&self) -> &str {
        &self.config.model
    }

    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, GenerationError> {
        let body = ChatRequest {
            model: &self.config.model,
            messages: [ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let mut builder = self.client.post(self.endpoint()).json(&body);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| GenerationError::Unavailable(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), &text));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Unavailable(format!("malformed response body: {e}")))?;

        let Some(choice) = parsed.choices.into_iter().next() else {
            return Err(GenerationError::Unavailable("response has no choices".into()));
        };
        if choice.finish_reason.as_deref() == Some("content_filter") {
            return Err(GenerationError::Rejected("response withheld by content filter".into()));
        }
        match choice.message.and_then(|m| m.content) {
            Some(text) if !text.trim().is_empty() => Ok(GenerationResponse { text }),
            _ => Err(GenerationError::Unavailable("response has no text".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert!(matches!(classify_status(503, ""), GenerationError::Unavailable(_)));
        assert!(matches!(classify_status(429, "slow down"), GenerationError::Unavailable(_)));
        assert!(matches!(classify_status(501, ""), GenerationError::Unavailable(_)));
        assert!(matches!(classify_status(400, "content policy"), GenerationError::Rejected(_)));
        assert!(matches!(classify_status(401, "bad key"), GenerationError::Rejected(_)));
    }

    #[test]
    fn long_bodies_are_truncated() {
        let body = "é".repeat(500);
        let GenerationError::Rejected(detail) = classify_status(400, &body) else {
            panic!("expected rejection");
        };
        assert!(detail.chars().count() < 220);
    }

    #[test]
    fn api_key_is_not_serialized() {
        let config = BackendConfig::default().with_api_key("sk-secret");
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("sk-secret"));
    }

    #[test]
    fn endpoint_tolerates_trailing_slash() {
        let backend =
            OpenAiCompatibleBackend::new(BackendConfig::default().with_base_url("http://h/v1/")).unwrap();
        assert_eq!(backend.endpoint(), "http://h/v1/chat/completions");
    }
}
