//! Extraction orchestration across chunks
//!
//! Owns the chunk set for one extraction request, drives provider calls
//! under bounded concurrency, applies per-chunk retry policy, and
//! assembles the composite result once every chunk is terminal.

use crate::chunking::TextChunker;
use crate::config::ExtractorConfig;
use crate::error::ExtractError;
use crate::prompt::PromptBuilder;
use docsift_domain::{
    AggregateResult, ChunkResult, ExtractionProvider, ProviderFailure, ProviderRequest,
};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Request to extract structured data from one document
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    /// Reference to the input (URL or content reference), for attribution
    pub input_ref: String,

    /// Normalized document text
    pub text: String,

    /// What to extract
    pub instruction: String,

    /// Optional JSON schema the extracted content must match
    pub schema: Option<Value>,
}

impl ExtractionRequest {
    /// Build a request for a document
    pub fn new(
        input_ref: impl Into<String>,
        text: impl Into<String>,
        instruction: impl Into<String>,
    ) -> Self {
        Self {
            input_ref: input_ref.into(),
            text: text.into(),
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

/// How one orchestration run ended
#[derive(Debug, Clone, PartialEq)]
pub enum OrchestrationOutcome {
    /// Every chunk reached a terminal result; the aggregate is usable
    Completed(AggregateResult),
    /// Cancellation was requested; in-flight work drained and any
    /// completed chunk results are discarded
    Cancelled,
}

/// Terminal state of one chunk task
enum ChunkOutcome {
    Finalized(ChunkResult),
    Cancelled,
}

/// Drives concurrent extraction of one request's chunks
///
/// The in-flight chunk result set is owned exclusively by this instance
/// for the duration of one `extract` call; nothing is shared across jobs.
pub struct Extractor<P: ExtractionProvider> {
    provider: Arc<P>,
    config: ExtractorConfig,
}

impl<P: ExtractionProvider + 'static> Extractor<P> {
    /// Create an extractor, validating the configuration
    pub fn new(provider: P, config: ExtractorConfig) -> Result<Self, ExtractError> {
        Self::from_shared(Arc::new(provider), config)
    }

    /// Create an extractor over an already-shared provider
    ///
    /// Useful when one provider client serves many extractions with
    /// per-request configuration (e.g. a per-job concurrency limit).
    pub fn from_shared(provider: Arc<P>, config: ExtractorConfig) -> Result<Self, ExtractError> {
        config.validate().map_err(ExtractError::Config)?;
        Ok(Self { provider, config })
    }

    /// Run the full pipeline for one request
    ///
    /// Chunks the input, fans calls out under the configured concurrency
    /// limit, retries retryable failures per chunk with capped exponential
    /// backoff, and assembles the aggregate once every chunk is terminal.
    /// Chunk-level failures are absorbed into the aggregate; only chunking
    /// and input validation errors are raised here.
    ///
    /// Cancellation is cooperative: after `cancel` fires no new provider
    /// call or retry starts, in-flight calls drain, and the outcome is
    /// [`OrchestrationOutcome::Cancelled`].
    pub async fn extract(
        &self,
        request: ExtractionRequest,
        cancel: CancellationToken,
    ) -> Result<OrchestrationOutcome, ExtractError> {
        if request.text.len() > self.config.max_input_length {
            return Err(ExtractError::InputTooLong(
                request.text.len(),
                self.config.max_input_length,
            ));
        }

        let chunker = TextChunker::new(self.config.max_chunk_size, self.config.chunk_overlap);
        let chunks = chunker.chunk(&request.text)?;

        info!(
            "Starting extraction for '{}': {} chunks, concurrency {}",
            request.input_ref,
            chunks.len(),
            self.config.concurrency
        );

        let instruction = PromptBuilder::new(&request.instruction).build();
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let expected: HashSet<usize> = chunks.iter().map(|chunk| chunk.index).collect();

        let mut tasks = JoinSet::new();
        for chunk in chunks {
            let provider = Arc::clone(&self.provider);
            let semaphore = Arc::clone(&semaphore);
            let cancel = cancel.clone();
            let config = self.config.clone();
            let index = chunk.index;
            let provider_request = ProviderRequest {
                chunk_text: chunk.text,
                instruction: instruction.clone(),
                schema: request.schema.clone(),
            };

            tasks.spawn(async move {
                run_chunk(index, provider_request, provider, semaphore, cancel, config).await
            });
        }

        // Barrier: every chunk must reach a terminal outcome before the
        // aggregate is assembled
        let mut results = Vec::new();
        let mut saw_cancelled = false;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(ChunkOutcome::Finalized(result)) => results.push(result),
                Ok(ChunkOutcome::Cancelled) => saw_cancelled = true,
                Err(e) => error!("Chunk task aborted: {}", e),
            }
        }

        if saw_cancelled || cancel.is_cancelled() {
            info!("Extraction for '{}' cancelled after drain", request.input_ref);
            return Ok(OrchestrationOutcome::Cancelled);
        }

        // A panicked task leaves its chunk without a result; record it as
        // failed so the aggregate still covers every chunk
        let resolved: HashSet<usize> = results.iter().map(|result| result.chunk_index).collect();
        for index in expected.difference(&resolved) {
            results.push(ChunkResult::failed(
                *index,
                ProviderFailure::provider("chunk task aborted"),
                0,
            ));
        }

        let aggregate = AggregateResult::from_chunks(results);
        info!(
            "Extraction for '{}' finished: {:?}, {} total tokens",
            request.input_ref, aggregate.overall_status, aggregate.usage.total_tokens
        );

        Ok(OrchestrationOutcome::Completed(aggregate))
    }
}

/// Run one chunk to a terminal outcome, retrying per policy
///
/// A worker slot (semaphore permit) is held only while a provider call is
/// in flight; backoff sleeps release the slot so siblings can proceed.
/// The chunk is never invoked concurrently with itself.
async fn run_chunk<P: ExtractionProvider>(
    index: usize,
    request: ProviderRequest,
    provider: Arc<P>,
    semaphore: Arc<Semaphore>,
    cancel: CancellationToken,
    config: ExtractorConfig,
) -> ChunkOutcome {
    let mut attempts: u32 = 0;

    loop {
        if cancel.is_cancelled() {
            return ChunkOutcome::Cancelled;
        }

        let permit = tokio::select! {
            _ = cancel.cancelled() => return ChunkOutcome::Cancelled,
            permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => return ChunkOutcome::Cancelled,
            },
        };

        attempts += 1;
        let outcome = tokio::time::timeout(config.call_timeout(), provider.extract(&request)).await;
        drop(permit);

        let failure = match outcome {
            Ok(Ok(response)) => {
                debug!("Chunk {} succeeded on attempt {}", index, attempts);
                return ChunkOutcome::Finalized(ChunkResult::success(
                    index,
                    response.content,
                    response.usage,
                    attempts,
                ));
            }
            Ok(Err(failure)) => failure,
            Err(_) => ProviderFailure::timeout(format!(
                "Call exceeded {}s",
                config.call_timeout_secs
            )),
        };

        if !failure.is_retryable() || attempts > config.max_retries {
            warn!(
                "Chunk {} failed after {} attempt(s): {}",
                index, attempts, failure
            );
            return ChunkOutcome::Finalized(ChunkResult::failed(index, failure, attempts));
        }

        debug!(
            "Chunk {} attempt {} failed ({}), retrying after backoff",
            index, attempts, failure
        );
        let delay = config.backoff_delay(attempts - 1);
        tokio::select! {
            _ = cancel.cancelled() => return ChunkOutcome::Cancelled,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
