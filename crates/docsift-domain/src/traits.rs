//! Trait definitions for external interactions
//!
//! These traits define the boundaries between the pipeline and its
//! infrastructure. Provider implementations live in `docsift-llm`, store
//! implementations in `docsift-store`.

use crate::failure::ProviderFailure;
use crate::job::{Job, JobId, JobStatus, WebhookConfig};
use crate::result::AggregateResult;
use crate::usage::TokenUsage;
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// One chunk's worth of work for a provider
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    /// The chunk text to extract from
    pub chunk_text: String,

    /// Extraction instruction rendered for the provider
    pub instruction: String,

    /// Optional JSON schema the extracted content must match
    pub schema: Option<Value>,
}

impl ProviderRequest {
    /// Build a request for one chunk
    pub fn new(chunk_text: impl Into<String>, instruction: impl Into<String>) -> Self {
        Self {
            chunk_text: chunk_text.into(),
            instruction: instruction.into(),
            schema: None,
        }
    }

    /// Constrain the extraction to a JSON schema
    pub fn with_schema(mut self, schema: Value) -> Self {
        self.schema = Some(schema);
        self
    }
}

/// Normalized provider output for one call
///
/// This is the single normalization boundary over provider response shapes:
/// downstream components never see provider-specific types.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderResponse {
    /// Structured extraction output
    pub content: Value,

    /// Usage as reported by the provider; `None` when omitted, never zeros
    pub usage: Option<TokenUsage>,
}

/// Trait for one-shot extraction calls against an LLM provider
///
/// An implementation makes exactly one outbound call per invocation and
/// mutates no shared state; retry policy belongs to the orchestrator.
#[async_trait]
pub trait ExtractionProvider: Send + Sync {
    /// Extract structured content from one chunk
    async fn extract(&self, request: &ProviderRequest) -> Result<ProviderResponse, ProviderFailure>;
}

/// Contract violations and failures surfaced by a job store
#[derive(Error, Debug, Clone, PartialEq)]
pub enum JobStoreError {
    /// No job with the given id
    #[error("Job not found: {0}")]
    NotFound(JobId),

    /// The lifecycle graph forbids the requested transition
    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition {
        /// Status the job currently holds
        from: JobStatus,
        /// Status the caller asked for
        to: JobStatus,
    },

    /// Cancellation requested on a job that already reached a terminal state
    #[error("Job already terminal: {0}")]
    AlreadyTerminal(JobStatus),

    /// Stored data could not be decoded
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Underlying storage failure
    #[error("Storage error: {0}")]
    Backend(String),
}

/// Trait for the durable record of job lifecycle state
///
/// Implementations must serialize concurrent transition attempts on the
/// same job id; the lifecycle graph in [`JobStatus`] is enforced on every
/// transition.
pub trait JobStore: Send + Sync {
    /// Create a new pending job
    fn create(
        &self,
        input_ref: &str,
        webhook_config: Option<WebhookConfig>,
    ) -> Result<Job, JobStoreError>;

    /// Fetch a job by id
    fn get(&self, id: JobId) -> Result<Job, JobStoreError>;

    /// Move a job to a new status, optionally committing a result
    ///
    /// Fails with [`JobStoreError::InvalidTransition`] when the lifecycle
    /// graph forbids the move.
    fn transition(
        &self,
        id: JobId,
        status: JobStatus,
        result: Option<AggregateResult>,
    ) -> Result<Job, JobStoreError>;

    /// Cancel a non-terminal job
    ///
    /// Fails with [`JobStoreError::AlreadyTerminal`] when the job has
    /// already reached a terminal state; the status is left unchanged.
    fn cancel(&self, id: JobId) -> Result<Job, JobStoreError>;
}
