//! Multi-provider HTTP backends for model handles.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::config::{AiConfig, ProviderKind};

use super::model::{CompletionRequest, LanguageModel};
use super::transcript::Role;

/// Connection timeout for HTTP requests.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Overall request timeout for HTTP requests.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Maximum number of retries for transient failures.
const MAX_RETRIES: u32 = 3;

/// Build an HTTP client with proper timeout configuration.
fn build_http_client() -> Result<Client, AiError> {
    Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| AiError::RequestFailed(format!("Failed to build HTTP client: {e}")))
}

/// Determine if a request should be retried based on status code and attempt count.
fn should_retry(status_code: u16, attempt: u32) -> bool {
    if attempt >= MAX_RETRIES {
        return false;
    }
    (500..600).contains(&status_code)
}

/// Calculate exponential backoff duration for retry attempts.
fn calculate_backoff(attempt: u32) -> Duration {
    // 1s, 2s, 4s
    Duration::from_secs(1 << attempt)
}

/// Errors from model backend operations.
#[derive(Error, Debug)]
pub enum AiError {
    #[error("API key not configured (env: {0})")]
    MissingApiKey(String),
    #[error("API request failed: {0}")]
    RequestFailed(String),
    #[error("Failed to parse response: {0}")]
    ParseError(String),
    #[error("Model request timed out")]
    Timeout,
    #[error("Model chose `{choice}`, expected one of: {}", allowed.join(", "))]
    InvalidChoice { choice: String, allowed: Vec<String> },
    #[error("Structured output failed schema validation: {0}")]
    SchemaValidation(String),
}

/// Which side of a two-party chat API a turn lands on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    User,
    Model,
}

/// A transcript flattened into what chat APIs accept.
#[derive(Debug, Default, PartialEq)]
struct ChatMessages {
    system: String,
    messages: Vec<(Side, String)>,
}

impl ChatMessages {
    /// Map a completion request onto system text plus alternating messages.
    ///
    /// System turns become the system instruction. Turns under the open role
    /// or `assistant` are the model's own; everything else is user-side and
    /// prefixed with its role so the model can tell speakers apart.
    fn from_request(request: &CompletionRequest<'_>) -> Self {
        let mut out = Self::default();
        for turn in request.transcript.turns() {
            match &turn.role {
                Role::System => {
                    if !out.system.is_empty() {
                        out.system.push_str("\n\n");
                    }
                    out.system.push_str(&turn.text());
                }
                role if role == request.role || *role == Role::Assistant => {
                    out.push(Side::Model, turn.text());
                }
                role => out.push(Side::User, format!("[{role}] {}", turn.text())),
            }
        }
        if let Some(instruction) = request.constraint_instruction() {
            out.push(Side::User, instruction);
        }
        if out.messages.first().map(|(side, _)| *side) != Some(Side::User) {
            out.messages.insert(0, (Side::User, "(conversation start)".to_string()));
        }
        // Chat APIs reject a trailing model message that ends in whitespace.
        let prefix = request.prefix.trim_end();
        if !prefix.is_empty() {
            out.push(Side::Model, prefix.to_string());
        }
        out
    }

    fn push(&mut self, side: Side, text: String) {
        match self.messages.last_mut() {
            Some((last, existing)) if *last == side => {
                existing.push_str("\n\n");
                existing.push_str(&text);
            }
            _ => self.messages.push((side, text)),
        }
    }
}

/// Gemini API provider.
#[derive(Debug, Clone)]
pub struct GeminiProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl GeminiProvider {
    /// Create a new Gemini provider.
    ///
    /// # Errors
    ///
    /// Returns `AiError::RequestFailed` if the HTTP client cannot be built.
    pub fn new(
        base_url: String,
        api_key: String,
        model: String,
        max_tokens: u32,
    ) -> Result<Self, AiError> {
        Ok(Self {
            client: build_http_client()?,
            base_url,
            api_key,
            model,
            max_tokens,
        })
    }

    fn body(&self, chat: &ChatMessages) -> serde_json::Value {
        let contents: Vec<_> = chat
            .messages
            .iter()
            .map(|(side, text)| {
                let role = match side {
                    Side::User => "user",
                    Side::Model => "model",
                };
                serde_json::json!({ "role": role, "parts": [{ "text": text }] })
            })
            .collect();
        serde_json::json!({
            "contents": contents,
            "systemInstruction": { "parts": [{ "text": chat.system }] },
            "generationConfig": { "maxOutputTokens": self.max_tokens }
        })
    }
}

#[async_trait]
impl LanguageModel for GeminiProvider {
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<String, AiError> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        );
        let body = self.body(&ChatMessages::from_request(&request));

        let json = post_with_retry(
            self.client
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .header("Content-Type", "application/json")
                .json(&body),
        )
        .await?;

        json["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .map(String::from)
            .ok_or_else(|| AiError::ParseError("No text in Gemini response".to_string()))
    }
}

/// Claude API provider.
#[derive(Debug, Clone)]
pub struct ClaudeProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl ClaudeProvider {
    /// Create a new Claude provider.
    ///
    /// # Errors
    ///
    /// Returns `AiError::RequestFailed` if the HTTP client cannot be built.
    pub fn new(
        base_url: String,
        api_key: String,
        model: String,
        max_tokens: u32,
    ) -> Result<Self, AiError> {
        Ok(Self {
            client: build_http_client()?,
            base_url,
            api_key,
            model,
            max_tokens,
        })
    }

    fn body(&self, chat: &ChatMessages) -> serde_json::Value {
        let messages: Vec<_> = chat
            .messages
            .iter()
            .map(|(side, text)| {
                let role = match side {
                    Side::User => "user",
                    Side::Model => "assistant",
                };
                serde_json::json!({ "role": role, "content": text })
            })
            .collect();
        serde_json::json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "system": chat.system,
            "messages": messages
        })
    }
}

#[async_trait]
impl LanguageModel for ClaudeProvider {
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<String, AiError> {
        let url = format!("{}/v1/messages", self.base_url.trim_end_matches('/'));
        let body = self.body(&ChatMessages::from_request(&request));

        let json = post_with_retry(
            self.client
                .post(&url)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", "2023-06-01")
                .header("Content-Type", "application/json")
                .json(&body),
        )
        .await?;

        json["content"][0]["text"]
            .as_str()
            .map(String::from)
            .ok_or_else(|| AiError::ParseError("No text in Claude response".to_string()))
    }
}

/// Send a request, retrying server errors with exponential backoff.
async fn post_with_retry(request: reqwest::RequestBuilder) -> Result<serde_json::Value, AiError> {
    let mut attempt = 0;
    loop {
        let response = request
            .try_clone()
            .ok_or_else(|| AiError::RequestFailed("Request body is not cloneable".to_string()))?
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AiError::Timeout
                } else {
                    AiError::RequestFailed(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| AiError::ParseError(e.to_string()));
        }

        let status_code = status.as_u16();
        if should_retry(status_code, attempt) {
            let backoff = calculate_backoff(attempt);
            tracing::warn!(status = status_code, attempt, ?backoff, "Retrying model request");
            tokio::time::sleep(backoff).await;
            attempt += 1;
            continue;
        }

        let text = response.text().await.unwrap_or_default();
        return Err(AiError::RequestFailed(format!("HTTP {status}: {text}")));
    }
}

/// Provider enum for dispatch.
#[derive(Debug, Clone)]
pub enum Provider {
    Gemini(GeminiProvider),
    Claude(ClaudeProvider),
}

#[async_trait]
impl LanguageModel for Provider {
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<String, AiError> {
        match self {
            Self::Gemini(p) => p.complete(request).await,
            Self::Claude(p) => p.complete(request).await,
        }
    }
}

/// Configured provider plus the settings it was built from.
#[derive(Debug, Clone)]
pub struct AiClient {
    provider: Provider,
    config: AiConfig,
}

impl AiClient {
    /// Create a new client with the given provider and config.
    #[must_use]
    pub fn new(provider: Provider, config: AiConfig) -> Self {
        Self { provider, config }
    }

    /// Create client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `AiError::MissingApiKey` if the configured API key environment
    /// variable is not set.
    pub fn from_config(config: AiConfig) -> Result<Self, AiError> {
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| AiError::MissingApiKey(config.api_key_env.clone()))?;

        let provider = match config.provider {
            ProviderKind::Gemini => Provider::Gemini(GeminiProvider::new(
                config.base_url.clone(),
                api_key,
                config.model.clone(),
                config.max_tokens,
            )?),
            ProviderKind::Claude => Provider::Claude(ClaudeProvider::new(
                config.base_url.clone(),
                api_key,
                config.model.clone(),
                config.max_tokens,
            )?),
        };

        Ok(Self { provider, config })
    }

    /// Create client from environment variables with default config.
    ///
    /// # Errors
    ///
    /// Returns `AiError::MissingApiKey` if the API key environment variable is not set.
    pub fn from_env() -> Result<Self, AiError> {
        Self::from_config(AiConfig::default())
    }

    /// Get the configured model.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Get the provider kind.
    #[must_use]
    pub fn provider_kind(&self) -> &ProviderKind {
        &self.config.provider
    }

    /// Consume the client, returning the dispatching provider.
    #[must_use]
    pub fn into_provider(self) -> Provider {
        self.provider
    }
}

/// Extract a JSON object from model response text.
///
/// Looks for the first balanced `{ ... }` in the response and parses it into
/// the specified type.
///
/// # Errors
///
/// Returns `AiError::ParseError` if no JSON object is found or parsing fails.
pub fn extract_json<T: DeserializeOwned>(text: &str) -> Result<T, AiError> {
    let json_start = text
        .find('{')
        .ok_or_else(|| AiError::ParseError(format!("No JSON object found in response: {text}")))?;

    let mut depth = 0;
    let mut in_string = false;
    let mut escaped = false;
    let mut json_end = text.len();
    for (i, c) in text[json_start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    json_end = json_start + i + 1;
                    break;
                }
            }
            _ => {}
        }
    }

    let json_str = &text[json_start..json_end];
    serde_json::from_str(json_str)
        .map_err(|e| AiError::ParseError(format!("Failed to parse JSON: {e}")))
}
