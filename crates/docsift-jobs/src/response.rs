//! External response shapes
//!
//! Wire types the HTTP layer returns for an extraction request, synchronous
//! or completed-async. The HTTP layer itself lives outside this workspace;
//! these conversions are pure.

use docsift_domain::{AggregateResult, Job, JobStatus, OverallStatus, TokenUsageReport};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Response body for an extraction request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractResponse {
    /// True when at least one fragment was extracted; a partial result is
    /// still a success with a per-chunk breakdown
    pub success: bool,

    /// One entry per processed input
    pub results: Vec<UrlResult>,

    /// Wall-clock processing time, seconds
    pub server_processing_time_s: f64,

    /// Resident memory delta across processing, megabytes
    pub server_memory_delta_mb: f64,
}

/// Extraction outcome for one input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlResult {
    /// The input's URL or content reference
    pub url: String,

    /// Whether any fragment of this input was extracted
    pub success: bool,

    /// Successful fragments' content, in chunk order
    pub extracted_content: Value,

    /// Fragments that failed, so callers can identify and retry them
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_chunks: Vec<FailedChunk>,

    /// Aggregate usage with per-chunk breakdown; absent when the provider
    /// reported none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<TokenUsageReport>,
}

/// One failed fragment in a per-chunk breakdown
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedChunk {
    /// Position of the fragment in the source document
    pub chunk_index: usize,

    /// The classified failure that finalized the fragment
    pub error: String,
}

impl UrlResult {
    /// Shape one input's aggregate for the wire
    pub fn from_aggregate(url: &str, aggregate: &AggregateResult) -> Self {
        let extracted_content =
            Value::Array(aggregate.contents().into_iter().cloned().collect());

        let failed_chunks = aggregate
            .chunks
            .iter()
            .filter(|chunk| !chunk.is_success())
            .map(|chunk| FailedChunk {
                chunk_index: chunk.chunk_index,
                error: chunk
                    .error
                    .as_ref()
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "unknown".to_string()),
            })
            .collect();

        Self {
            url: url.to_string(),
            success: aggregate.overall_status != OverallStatus::Failed,
            extracted_content,
            failed_chunks,
            token_usage: TokenUsageReport::from_aggregate(aggregate),
        }
    }

    /// Shape an input that produced no result at all
    pub fn without_result(url: &str) -> Self {
        Self {
            url: url.to_string(),
            success: false,
            extracted_content: Value::Null,
            failed_chunks: Vec::new(),
            token_usage: None,
        }
    }
}

impl ExtractResponse {
    /// Shape a terminal job for the wire
    ///
    /// Timing and memory figures are measured by the HTTP layer and passed
    /// through here.
    pub fn for_job(job: &Job, processing_time_s: f64, memory_delta_mb: f64) -> Self {
        let results = match &job.result {
            Some(aggregate) => vec![UrlResult::from_aggregate(&job.input_ref, aggregate)],
            None => vec![UrlResult::without_result(&job.input_ref)],
        };

        let success = matches!(
            job.status,
            JobStatus::Completed | JobStatus::PartiallyCompleted
        );

        Self {
            success,
            results,
            server_processing_time_s: processing_time_s,
            server_memory_delta_mb: memory_delta_mb,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsift_domain::{ChunkResult, ProviderFailure, TokenUsage};
    use serde_json::json;

    fn partial_aggregate() -> AggregateResult {
        AggregateResult::from_chunks(vec![
            ChunkResult::success(
                0,
                json!({"name": "alpha"}),
                Some(TokenUsage::reported(100, 20)),
                1,
            ),
            ChunkResult::failed(1, ProviderFailure::auth("401"), 1),
        ])
    }

    #[test]
    fn test_url_result_partial_breakdown() {
        let result = UrlResult::from_aggregate("https://example.com", &partial_aggregate());

        assert!(result.success);
        assert_eq!(result.extracted_content, json!([{"name": "alpha"}]));
        assert_eq!(result.failed_chunks.len(), 1);
        assert_eq!(result.failed_chunks[0].chunk_index, 1);
        assert!(result.failed_chunks[0].error.contains("auth_error"));

        let usage = result.token_usage.unwrap();
        assert_eq!(usage.prompt_tokens, 100);
        assert_eq!(usage.chunks.len(), 1);
    }

    #[test]
    fn test_partial_job_is_still_a_success_response() {
        let mut job = Job::new("https://example.com", None);
        job.status = JobStatus::PartiallyCompleted;
        job.result = Some(partial_aggregate());

        let response = ExtractResponse::for_job(&job, 1.25, 4.0);
        assert!(response.success);
        assert_eq!(response.results.len(), 1);
        assert_eq!(response.server_processing_time_s, 1.25);
    }

    #[test]
    fn test_failed_job_without_result() {
        let mut job = Job::new("https://example.com", None);
        job.status = JobStatus::Failed;

        let response = ExtractResponse::for_job(&job, 0.5, 0.0);
        assert!(!response.success);
        assert!(!response.results[0].success);
        assert_eq!(response.results[0].extracted_content, Value::Null);
    }

    #[test]
    fn test_wire_field_names() {
        let mut job = Job::new("https://example.com", None);
        job.status = JobStatus::Completed;
        job.result = Some(AggregateResult::from_chunks(vec![ChunkResult::success(
            0,
            json!([]),
            Some(TokenUsage::reported(10, 2)),
            1,
        )]));

        let json = serde_json::to_value(ExtractResponse::for_job(&job, 0.1, 0.0)).unwrap();

        assert!(json.get("server_processing_time_s").is_some());
        assert!(json.get("server_memory_delta_mb").is_some());
        let result = &json["results"][0];
        assert!(result.get("url").is_some());
        assert!(result.get("extracted_content").is_some());
        let usage = result.get("token_usage").unwrap();
        assert_eq!(usage["prompt_tokens"], 10);
        assert!(usage.get("chunks").is_some());
    }

    #[test]
    fn test_usage_absent_when_unreported() {
        let aggregate = AggregateResult::from_chunks(vec![ChunkResult::success(
            0,
            json!({}),
            None,
            1,
        )]);
        let result = UrlResult::from_aggregate("ref", &aggregate);
        assert!(result.token_usage.is_none());

        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("token_usage").is_none());
    }
}
