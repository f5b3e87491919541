//! Per-chunk and aggregate extraction results

use crate::failure::ProviderFailure;
use crate::usage::{accumulate, TokenUsage};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Terminal status of one chunk's extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStatus {
    /// The provider returned parseable content for this chunk
    Success,
    /// The chunk exhausted its retries or hit a fatal failure
    Failed,
}

/// The outcome of extracting one chunk, possibly after retries
///
/// Immutable once finalized by the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkResult {
    /// 0-based position of the chunk in the source document
    pub chunk_index: usize,

    /// Extracted content, present on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,

    /// Provider-reported usage for the final attempt, if reported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,

    /// Terminal status
    pub status: ChunkStatus,

    /// The failure that finalized this chunk, present on failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ProviderFailure>,

    /// Provider invocations spent on this chunk, including the final one
    pub attempts: u32,
}

impl ChunkResult {
    /// Finalize a successful chunk
    pub fn success(
        chunk_index: usize,
        content: Value,
        usage: Option<TokenUsage>,
        attempts: u32,
    ) -> Self {
        Self {
            chunk_index,
            content: Some(content),
            usage,
            status: ChunkStatus::Success,
            error: None,
            attempts,
        }
    }

    /// Finalize a failed chunk
    pub fn failed(chunk_index: usize, error: ProviderFailure, attempts: u32) -> Self {
        Self {
            chunk_index,
            content: None,
            usage: None,
            status: ChunkStatus::Failed,
            error: Some(error),
            attempts,
        }
    }

    /// True when the chunk resolved successfully
    pub fn is_success(&self) -> bool {
        self.status == ChunkStatus::Success
    }
}

/// Overall outcome across all chunks of one extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    /// Every chunk succeeded
    Success,
    /// At least one chunk succeeded and at least one failed
    Partial,
    /// No chunk succeeded
    Failed,
}

/// All chunk outcomes for one extraction, reassembled in chunk order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateResult {
    /// Chunk outcomes sorted by `chunk_index`, independent of completion order
    pub chunks: Vec<ChunkResult>,

    /// Field-wise sum of usage across chunks that reported it
    pub usage: TokenUsage,

    /// Overall outcome classification
    pub overall_status: OverallStatus,
}

impl AggregateResult {
    /// Assemble the aggregate from finalized chunk results
    ///
    /// Chunks may arrive in any completion order; they are sorted by index
    /// here. An empty input classifies as `Failed` (no chunk succeeded).
    pub fn from_chunks(mut chunks: Vec<ChunkResult>) -> Self {
        chunks.sort_by_key(|chunk| chunk.chunk_index);

        let usage = accumulate(chunks.iter().map(|chunk| chunk.usage.as_ref()));

        let succeeded = chunks.iter().filter(|chunk| chunk.is_success()).count();
        let overall_status = if succeeded == chunks.len() && !chunks.is_empty() {
            OverallStatus::Success
        } else if succeeded > 0 {
            OverallStatus::Partial
        } else {
            OverallStatus::Failed
        };

        Self {
            chunks,
            usage,
            overall_status,
        }
    }

    /// Extracted content of successful chunks, in chunk order
    pub fn contents(&self) -> Vec<&Value> {
        self.chunks
            .iter()
            .filter_map(|chunk| chunk.content.as_ref())
            .collect()
    }
}
