//! Docsift Webhook Dispatcher
//!
//! Delivers a completed job's result (including accumulated usage) to a
//! registered callback URL.
//!
//! Delivery is at-least-once: non-2xx responses and transport failures are
//! retried with capped exponential backoff up to the registration's retry
//! budget. Exhausting the budget abandons the attempt and records a
//! delivery failure; it never changes the job's status. The payload carries
//! the job id so receivers can deduplicate retried deliveries of the
//! identical payload.

#![warn(missing_docs)]

use docsift_domain::{Job, TokenUsageReport, WebhookConfig};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::{debug, warn};

/// Header carrying the payload signature when a secret is registered
pub const SIGNATURE_HEADER: &str = "X-Docsift-Signature";

/// Default timeout for one delivery attempt
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Payload POSTed to the callback URL on job completion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookPayload {
    /// Job identifier; stable across redeliveries for deduplication
    pub task_id: String,

    /// Kind of work the job performed
    pub task_type: String,

    /// Terminal job status
    pub status: String,

    /// Inputs the job processed
    pub urls: Vec<String>,

    /// Full aggregate result (per-chunk content, usage, failures)
    pub result: Value,

    /// Accumulated usage with per-chunk breakdown; absent when unreported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<TokenUsageReport>,
}

impl WebhookPayload {
    /// Build the payload for a terminal job
    pub fn for_job(job: &Job) -> Self {
        let (result, token_usage) = match &job.result {
            Some(aggregate) => (
                serde_json::to_value(aggregate).unwrap_or(Value::Null),
                TokenUsageReport::from_aggregate(aggregate),
            ),
            None => (Value::Null, None),
        };

        Self {
            task_id: job.id.to_string(),
            task_type: "extract".to_string(),
            status: job.status.to_string(),
            urls: vec![job.input_ref.clone()],
            result,
            token_usage,
        }
    }
}

/// Outcome of one delivery, attempted once per terminal job
///
/// An abandoned delivery is an observable event, not a job failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Job the delivery was for
    pub task_id: String,

    /// Whether any attempt received a 2xx response
    pub delivered: bool,

    /// Attempts made, bounded by the registration's `max_retries + 1`
    pub attempts: u32,

    /// The failure observed on the last unsuccessful attempt
    pub last_error: Option<String>,
}

/// Delivers completion payloads with bounded retry
pub struct WebhookDispatcher {
    client: reqwest::Client,
    backoff_base_ms: u64,
    backoff_cap_ms: u64,
}

impl WebhookDispatcher {
    /// Create a dispatcher with default timeouts and backoff
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .unwrap();

        Self {
            client,
            backoff_base_ms: 500,
            backoff_cap_ms: 10_000,
        }
    }

    /// Override the retry backoff window
    pub fn with_backoff(mut self, base_ms: u64, cap_ms: u64) -> Self {
        self.backoff_base_ms = base_ms;
        self.backoff_cap_ms = cap_ms;
        self
    }

    /// POST the payload to the registered URL, retrying per the registration
    ///
    /// Returns a report rather than an error: delivery failure is recorded
    /// and logged, never escalated to the caller as a job failure.
    pub async fn deliver(
        &self,
        config: &WebhookConfig,
        payload: &WebhookPayload,
    ) -> DeliveryReport {
        let body = match serde_json::to_vec(payload) {
            Ok(body) => body,
            Err(e) => {
                warn!("Webhook payload for task {} unserializable: {}", payload.task_id, e);
                return DeliveryReport {
                    task_id: payload.task_id.clone(),
                    delivered: false,
                    attempts: 0,
                    last_error: Some(format!("Payload serialization failed: {}", e)),
                };
            }
        };

        let signature = config.secret.as_deref().map(|secret| sign(secret, &body));
        let max_attempts = config.max_retries + 1;
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            let mut request = self
                .client
                .post(&config.url)
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body.clone());
            if let Some(signature) = &signature {
                request = request.header(SIGNATURE_HEADER, signature);
            }

            match request.send().await {
                Ok(response) if response.status().is_success() => {
                    debug!(
                        "Webhook for task {} delivered on attempt {}",
                        payload.task_id, attempt
                    );
                    return DeliveryReport {
                        task_id: payload.task_id.clone(),
                        delivered: true,
                        attempts: attempt,
                        last_error: None,
                    };
                }
                Ok(response) => {
                    last_error = Some(format!("HTTP {}", response.status()));
                }
                Err(e) => {
                    last_error = Some(format!("Request failed: {}", e));
                }
            }

            if attempt < max_attempts {
                let delay = backoff_delay(self.backoff_base_ms, self.backoff_cap_ms, attempt - 1);
                tokio::time::sleep(delay).await;
            }
        }

        warn!(
            "Webhook delivery for task {} abandoned after {} attempt(s): {}",
            payload.task_id,
            max_attempts,
            last_error.as_deref().unwrap_or("unknown error")
        );

        DeliveryReport {
            task_id: payload.task_id.clone(),
            delivered: false,
            attempts: max_attempts,
            last_error,
        }
    }
}

impl Default for WebhookDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Backoff delay before retry number `attempt` (0-based), capped
fn backoff_delay(base_ms: u64, cap_ms: u64, attempt: u32) -> Duration {
    let factor = 1u64 << attempt.min(20);
    Duration::from_millis(base_ms.saturating_mul(factor).min(cap_ms))
}

/// Signature over the secret and the exact request body
fn sign(secret: &str, body: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update(body);
    format!("sha256={:x}", hasher.finalize())
}
