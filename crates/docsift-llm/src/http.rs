//! HTTP Provider Implementation
//!
//! Talks to an OpenAI-compatible chat completions endpoint and maps the
//! response onto the normalized `ProviderResponse` shape. Failure classes:
//!
//! - 401/403 -> `Auth` (fatal)
//! - 429 -> `RateLimited` (retryable)
//! - request timeout -> `Timeout` (retryable)
//! - other non-2xx or transport failure -> `Provider` (retryable)
//! - unparseable body or content -> `MalformedResponse` (fatal)
//!
//! Usage is lifted verbatim from the provider's `usage` object, including
//! optional token-detail breakdowns; a missing `usage` object yields `None`.

use crate::response::parse_content;
use async_trait::async_trait;
use docsift_domain::{
    ExtractionProvider, ProviderFailure, ProviderRequest, ProviderResponse, TokenUsage,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

/// Default timeout for provider requests
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Provider backed by an OpenAI-compatible chat completions API
pub struct HttpProvider {
    endpoint: String,
    model: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

/// Request body for the chat completions API
#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

/// Response body from the chat completions API
#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<UsageRaw>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

/// Usage object as providers report it; every counter is optional
#[derive(Deserialize)]
struct UsageRaw {
    prompt_tokens: Option<u64>,
    completion_tokens: Option<u64>,
    total_tokens: Option<u64>,
    #[serde(default)]
    prompt_tokens_details: Option<BTreeMap<String, f64>>,
    #[serde(default)]
    completion_tokens_details: Option<BTreeMap<String, f64>>,
}

impl HttpProvider {
    /// Create a provider for the given endpoint and model
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use docsift_llm::HttpProvider;
    ///
    /// let provider = HttpProvider::new("https://api.example.com", "gpt-4o-mini");
    /// ```
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .unwrap();

        Self {
            endpoint: endpoint.into(),
            model: model.into(),
            api_key: None,
            client,
        }
    }

    /// Attach a bearer token for authenticated endpoints
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Override the request timeout
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.client = reqwest::Client::builder()
            .timeout(Duration::from_secs(secs))
            .build()
            .unwrap();
        self
    }

    /// Compose the system message from instruction and optional schema
    fn system_message(request: &ProviderRequest) -> String {
        match &request.schema {
            Some(schema) => format!(
                "{}\n\nThe output must be valid JSON conforming to this schema:\n{}",
                request.instruction, schema
            ),
            None => format!("{}\n\nRespond with valid JSON only.", request.instruction),
        }
    }
}

#[async_trait]
impl ExtractionProvider for HttpProvider {
    async fn extract(&self, request: &ProviderRequest) -> Result<ProviderResponse, ProviderFailure> {
        let url = format!("{}/v1/chat/completions", self.endpoint);

        let body = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: Self::system_message(request),
                },
                ChatMessage {
                    role: "user",
                    content: request.chunk_text.clone(),
                },
            ],
            temperature: 0.0,
        };

        debug!("Provider request: {} chars", request.chunk_text.len());

        let mut http_request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            http_request = http_request.bearer_auth(key);
        }

        let response = http_request.send().await.map_err(classify_transport)?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ProviderFailure::auth(format!("HTTP {}", status)));
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderFailure::rate_limited(format!("HTTP {}", status)));
        }
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ProviderFailure::provider(format!("HTTP {}: {}", status, text)));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderFailure::malformed(format!("Failed to parse response: {}", e)))?;

        let choice = parsed
            .choices
            .first()
            .ok_or_else(|| ProviderFailure::malformed("Response contained no choices"))?;

        debug!("Provider response: {} chars", choice.message.content.len());

        let content = parse_content(&choice.message.content)?;
        let usage = parsed.usage.map(lift_usage);

        Ok(ProviderResponse { content, usage })
    }
}

/// Map a transport error onto the failure taxonomy
fn classify_transport(error: reqwest::Error) -> ProviderFailure {
    if error.is_timeout() {
        ProviderFailure::timeout(format!("Request timed out: {}", error))
    } else {
        ProviderFailure::provider(format!("Request failed: {}", error))
    }
}

/// Normalize a raw usage object, preserving detail breakdowns
fn lift_usage(raw: UsageRaw) -> TokenUsage {
    let mut usage = TokenUsage::from_counters(raw.prompt_tokens, raw.completion_tokens, raw.total_tokens);
    if let Some(details) = raw.prompt_tokens_details {
        usage = usage.with_prompt_details(details);
    }
    if let Some(details) = raw.completion_tokens_details {
        usage = usage.with_completion_details(details);
    }
    usage
}
