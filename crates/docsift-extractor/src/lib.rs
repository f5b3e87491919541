//! Docsift Extractor
//!
//! Chunked structured-data extraction against an LLM provider.
//!
//! # Overview
//!
//! Large documents exceed what one provider call can handle, so the
//! pipeline splits input into bounded chunks, fans them out under a
//! concurrency limit, retries transient failures per chunk, and reassembles
//! the per-chunk outputs into one composite result with faithful token
//! usage accounting.
//!
//! # Architecture
//!
//! ```text
//! Text → TextChunker → Extractor → ExtractionProvider (×N, bounded)
//!                          ↓
//!                   AggregateResult (chunks + usage + status)
//! ```
//!
//! # Key Features
//!
//! - **Boundary-aware chunking**: paragraph, then sentence, then hard cut
//! - **Bounded concurrency**: at most the configured number of calls in flight
//! - **Partial-failure isolation**: one chunk's failure never cancels siblings
//! - **Cooperative cancellation**: in-flight calls drain, nothing new starts
//! - **Usage accounting**: per-chunk records preserved, aggregate summed
//!
//! # Example Usage
//!
//! ```no_run
//! use docsift_extractor::{ExtractionRequest, Extractor, ExtractorConfig, OrchestrationOutcome};
//! use docsift_llm::HttpProvider;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = HttpProvider::new("https://api.example.com", "gpt-4o-mini");
//! let extractor = Extractor::new(provider, ExtractorConfig::default())?;
//!
//! let request = ExtractionRequest::new(
//!     "https://example.com/report",
//!     "Document text...",
//!     "Extract all figures mentioned in the report",
//! );
//!
//! match extractor.extract(request, CancellationToken::new()).await? {
//!     OrchestrationOutcome::Completed(aggregate) => {
//!         println!("{:?}: {} chunks", aggregate.overall_status, aggregate.chunks.len());
//!         println!("Total tokens: {}", aggregate.usage.total_tokens);
//!     }
//!     OrchestrationOutcome::Cancelled => println!("cancelled"),
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod chunking;
mod config;
mod error;
mod orchestrator;
mod prompt;


pub use chunking::{Chunk, TextChunker};
pub use config::ExtractorConfig;
pub use error::{ChunkingError, ExtractError};
pub use orchestrator::{ExtractionRequest, Extractor, OrchestrationOutcome};
pub use prompt::PromptBuilder;
