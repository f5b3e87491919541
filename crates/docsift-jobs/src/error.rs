//! Error types for the job runner

use docsift_domain::JobStoreError;
use docsift_extractor::ExtractError;
use thiserror::Error;

/// Errors surfaced by job runner operations
#[derive(Error, Debug)]
pub enum JobError {
    /// Job store contract violation or storage failure
    #[error("Store error: {0}")]
    Store(#[from] JobStoreError),

    /// Extraction could not start (bad config or input)
    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractError),

    /// Runner-internal failure (task management)
    #[error("Runner error: {0}")]
    Runner(String),
}
