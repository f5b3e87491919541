//! Job module - the trackable unit of asynchronous extraction work

use crate::result::{AggregateResult, OverallStatus};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Unique identifier for a job based on UUIDv7
///
/// UUIDv7 provides:
/// - Chronological sortability for temporal queries
/// - 128-bit uniqueness
/// - No coordination required for distributed generation
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    /// Generate a new UUIDv7-based JobId
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Parse a JobId from its string form
    ///
    /// This is primarily for storage layer deserialization.
    pub fn parse(s: &str) -> Result<Self, String> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| format!("Invalid job id: {}", e))
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a job
///
/// Status only moves forward: `Pending -> Running -> terminal`, with
/// cancellation reachable from either non-terminal state. Terminal states
/// admit no further transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Created, not yet picked up by the orchestrator
    Pending,
    /// Extraction is in flight
    Running,
    /// Every chunk succeeded
    Completed,
    /// Some chunks succeeded, some failed
    PartiallyCompleted,
    /// No chunk succeeded, or the input could not be chunked
    Failed,
    /// Cancelled before completion
    Cancelled,
}

impl JobStatus {
    /// True for states that admit no further transitions
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Pending | JobStatus::Running)
    }

    /// Whether the lifecycle graph permits moving to `next`
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        match self {
            JobStatus::Pending => matches!(next, JobStatus::Running | JobStatus::Cancelled),
            JobStatus::Running => matches!(
                next,
                JobStatus::Completed
                    | JobStatus::PartiallyCompleted
                    | JobStatus::Failed
                    | JobStatus::Cancelled
            ),
            _ => false,
        }
    }

    /// Map an aggregate outcome to the terminal job status
    pub fn from_overall(status: OverallStatus) -> Self {
        match status {
            OverallStatus::Success => JobStatus::Completed,
            OverallStatus::Partial => JobStatus::PartiallyCompleted,
            OverallStatus::Failed => JobStatus::Failed,
        }
    }

    /// Stable string form used in logs and the store
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::PartiallyCompleted => "partially_completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    /// Parse the stable string form
    ///
    /// This is primarily for storage layer deserialization.
    pub fn parse(s: &str) -> Result<Self, String> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "partially_completed" => Ok(JobStatus::PartiallyCompleted),
            "failed" => Ok(JobStatus::Failed),
            "cancelled" => Ok(JobStatus::Cancelled),
            other => Err(format!("Unknown job status: {}", other)),
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Callback registration for completion notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Callback URL to POST the completion payload to
    pub url: String,

    /// Optional shared secret used to sign the payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,

    /// Delivery retries after the first attempt
    #[serde(default = "default_webhook_retries")]
    pub max_retries: u32,
}

fn default_webhook_retries() -> u32 {
    3
}

impl WebhookConfig {
    /// Register a callback URL with default retry settings
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            secret: None,
            max_retries: default_webhook_retries(),
        }
    }

    /// Attach a signing secret
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    /// Override the delivery retry budget
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

/// A trackable unit of asynchronous extraction work
///
/// Owned exclusively by the job store; mutated only through its defined
/// state transitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Unique identifier
    pub id: JobId,

    /// Current lifecycle state
    pub status: JobStatus,

    /// Creation time, unix seconds
    pub created_at: u64,

    /// Last transition time, unix seconds
    pub updated_at: u64,

    /// Reference to the input (URL or content reference)
    pub input_ref: String,

    /// Completion callback registration, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_config: Option<WebhookConfig>,

    /// Extraction result, present once the job reaches a result-bearing
    /// terminal state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<AggregateResult>,
}

impl Job {
    /// Create a new pending job
    pub fn new(input_ref: impl Into<String>, webhook_config: Option<WebhookConfig>) -> Self {
        let now = unix_now();
        Self {
            id: JobId::new(),
            status: JobStatus::Pending,
            created_at: now,
            updated_at: now,
            input_ref: input_ref.into(),
            webhook_config,
            result: None,
        }
    }
}

/// Current time as unix seconds
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
