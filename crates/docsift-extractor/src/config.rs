//! Configuration for the extraction pipeline

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for chunking and orchestration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// Maximum input text length (characters)
    pub max_input_length: usize,

    /// Maximum chunk size (characters)
    pub max_chunk_size: usize,

    /// Trailing characters of chunk *i* duplicated at the head of chunk
    /// *i+1* to preserve cross-boundary context
    pub chunk_overlap: usize,

    /// Maximum provider calls concurrently in flight per extraction
    pub concurrency: usize,

    /// Retries per chunk after the first attempt, for retryable failures
    pub max_retries: u32,

    /// Base delay for exponential backoff (milliseconds)
    pub backoff_base_ms: u64,

    /// Upper bound on a single backoff delay (milliseconds)
    pub backoff_cap_ms: u64,

    /// Maximum time for a single provider call (seconds)
    pub call_timeout_secs: u64,
}

impl ExtractorConfig {
    /// Get the per-call timeout as a Duration
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    /// Backoff delay before retry number `attempt` (0-based), capped
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.min(20);
        let delay = self
            .backoff_base_ms
            .saturating_mul(factor)
            .min(self.backoff_cap_ms);
        Duration::from_millis(delay)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_input_length == 0 {
            return Err("max_input_length must be greater than 0".to_string());
        }
        if self.max_chunk_size == 0 {
            return Err("max_chunk_size must be greater than 0".to_string());
        }
        if self.max_chunk_size > self.max_input_length {
            return Err("max_chunk_size cannot exceed max_input_length".to_string());
        }
        if self.chunk_overlap >= self.max_chunk_size {
            return Err("chunk_overlap must be smaller than max_chunk_size".to_string());
        }
        if self.concurrency == 0 {
            return Err("concurrency must be greater than 0".to_string());
        }
        if self.call_timeout_secs == 0 {
            return Err("call_timeout_secs must be greater than 0".to_string());
        }
        Ok(())
    }
}

impl Default for ExtractorConfig {
    /// Default configuration with balanced settings
    fn default() -> Self {
        Self {
            max_input_length: 200_000,
            max_chunk_size: 10_000,
            chunk_overlap: 200,
            concurrency: 4,
            max_retries: 2,
            backoff_base_ms: 500,
            backoff_cap_ms: 10_000,
            call_timeout_secs: 120,
        }
    }
}

impl ExtractorConfig {
    /// Aggressive preset: smaller chunks, tighter timeouts, more parallelism
    pub fn aggressive() -> Self {
        Self {
            max_input_length: 100_000,
            max_chunk_size: 5_000,
            chunk_overlap: 100,
            concurrency: 8,
            max_retries: 1,
            backoff_base_ms: 250,
            backoff_cap_ms: 5_000,
            call_timeout_secs: 60,
        }
    }

    /// Lenient preset: larger chunks and a patient retry budget
    pub fn lenient() -> Self {
        Self {
            max_input_length: 500_000,
            max_chunk_size: 20_000,
            chunk_overlap: 400,
            concurrency: 2,
            max_retries: 4,
            backoff_base_ms: 1_000,
            backoff_cap_ms: 30_000,
            call_timeout_secs: 300,
        }
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, String> {
        toml::from_str(toml_str).map_err(|e| format!("Failed to parse TOML: {}", e))
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize to TOML: {}", e))
    }
}
