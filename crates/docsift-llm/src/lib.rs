//! Docsift LLM Provider Layer
//!
//! Implementations of the `ExtractionProvider` trait from `docsift-domain`.
//! Each provider makes exactly one outbound call per invocation and
//! normalizes the provider's response shape (content plus optional usage)
//! at this boundary, so the orchestrator and accumulator never depend on
//! provider-specific types. Retry policy belongs to the orchestrator.
//!
//! # Providers
//!
//! - `MockProvider`: Deterministic mock with scripted outcomes for testing
//! - `HttpProvider`: OpenAI-compatible chat completions endpoint
//!
//! # Examples
//!
//! ```
//! use docsift_llm::MockProvider;
//! use docsift_domain::{ExtractionProvider, ProviderRequest};
//! use serde_json::json;
//!
//! # async fn example() {
//! let provider = MockProvider::new(json!({"title": "Hello"}));
//! let request = ProviderRequest::new("chunk text", "extract the title");
//! let response = provider.extract(&request).await.unwrap();
//! assert_eq!(response.content, json!({"title": "Hello"}));
//! # }
//! ```

#![warn(missing_docs)]

pub mod http;
mod response;

use async_trait::async_trait;
use docsift_domain::{
    ExtractionProvider, ProviderFailure, ProviderRequest, ProviderResponse, TokenUsage,
};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

pub use http::HttpProvider;

/// One scripted outcome for a mock call
pub type MockOutcome = Result<ProviderResponse, ProviderFailure>;

/// Mock provider for deterministic testing
///
/// Returns a fixed response for every chunk unless a script is registered
/// for that chunk's text; scripted outcomes are consumed in order, one per
/// call, which makes retry behavior (fail twice, then succeed) testable
/// without a network.
///
/// # Examples
///
/// ```
/// use docsift_llm::MockProvider;
/// use docsift_domain::{ExtractionProvider, ProviderFailure, ProviderRequest};
/// use serde_json::json;
///
/// # async fn example() {
/// let mut provider = MockProvider::new(json!([]));
/// provider.add_script("flaky chunk", vec![
///     Err(ProviderFailure::rate_limited("429")),
///     Ok(MockProvider::response(json!({"ok": true}), Some((10, 2)))),
/// ]);
///
/// let request = ProviderRequest::new("flaky chunk", "extract");
/// assert!(provider.extract(&request).await.is_err());
/// assert!(provider.extract(&request).await.is_ok());
/// assert_eq!(provider.call_count(), 2);
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct MockProvider {
    default_content: Value,
    default_usage: Option<TokenUsage>,
    scripts: Arc<Mutex<HashMap<String, VecDeque<MockOutcome>>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockProvider {
    /// Create a mock that returns the given content for every call
    pub fn new(content: Value) -> Self {
        Self {
            default_content: content,
            default_usage: None,
            scripts: Arc::new(Mutex::new(HashMap::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Report the given usage on every default success
    pub fn with_default_usage(mut self, prompt_tokens: u64, completion_tokens: u64) -> Self {
        self.default_usage = Some(TokenUsage::reported(prompt_tokens, completion_tokens));
        self
    }

    /// Build a successful response, optionally with reported usage
    pub fn response(content: Value, usage: Option<(u64, u64)>) -> ProviderResponse {
        ProviderResponse {
            content,
            usage: usage.map(|(prompt, completion)| TokenUsage::reported(prompt, completion)),
        }
    }

    /// Script outcomes for calls whose chunk text matches exactly
    ///
    /// Outcomes are consumed one per call; once exhausted, the chunk falls
    /// back to the default response.
    pub fn add_script(&mut self, chunk_text: impl Into<String>, outcomes: Vec<MockOutcome>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(chunk_text.into(), outcomes.into());
    }

    /// Total calls made against this mock
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Calls made for one chunk's text
    pub fn calls_for(&self, chunk_text: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|text| text.as_str() == chunk_text)
            .count()
    }

    /// Reset the recorded calls
    pub fn reset_call_count(&self) {
        self.calls.lock().unwrap().clear();
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new(Value::Array(Vec::new()))
    }
}

#[async_trait]
impl ExtractionProvider for MockProvider {
    async fn extract(&self, request: &ProviderRequest) -> Result<ProviderResponse, ProviderFailure> {
        self.calls.lock().unwrap().push(request.chunk_text.clone());

        if let Some(script) = self.scripts.lock().unwrap().get_mut(&request.chunk_text) {
            if let Some(outcome) = script.pop_front() {
                return outcome;
            }
        }

        Ok(ProviderResponse {
            content: self.default_content.clone(),
            usage: self.default_usage.clone(),
        })
    }
}
