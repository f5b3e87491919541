//! Error types for the extraction pipeline

use thiserror::Error;

/// Errors that prevent an input from being split into chunks
///
/// These are fatal for the whole extraction and occur before any provider
/// call is made.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChunkingError {
    /// The input contained no extractable text
    #[error("Input is empty")]
    EmptyInput,
}

/// Errors raised by the orchestration entry point
///
/// Per-chunk provider failures are never raised here; they are absorbed
/// into the chunk's result and reflected in the aggregate status.
#[derive(Error, Debug)]
pub enum ExtractError {
    /// The input could not be split into chunks
    #[error("Chunking error: {0}")]
    Chunking(#[from] ChunkingError),

    /// Input text exceeds the configured maximum
    #[error("Input too long: {0} chars (max: {1})")]
    InputTooLong(usize, usize),

    /// Configuration failed validation
    #[error("Configuration error: {0}")]
    Config(String),
}
