//! Docsift Domain Layer
//!
//! Core types and trait seams for the docsift extraction pipeline.
//! This crate defines the vocabulary every other layer speaks: token usage
//! records and their accumulation, per-chunk and aggregate extraction
//! results, the job lifecycle state machine, and the provider/store trait
//! boundaries. Infrastructure implementations live in other crates.
//!
//! ## Key Concepts
//!
//! - **TokenUsage**: provider-reported cost for one call, with an explicit
//!   availability flag so "no usage" is never confused with "zero usage"
//! - **ChunkResult**: the immutable outcome of extracting one chunk
//! - **AggregateResult**: all chunk outcomes reassembled in chunk order,
//!   plus accumulated usage and an overall status
//! - **Job**: a trackable unit of asynchronous extraction work whose status
//!   only ever moves forward through the lifecycle graph
//!
//! ## Architecture
//!
//! - Trait definitions for all external interactions
//! - Provider implementations live in `docsift-llm`
//! - Store implementations live in `docsift-store`

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod failure;
pub mod job;
pub mod result;
pub mod traits;
pub mod usage;

// Re-exports for convenience
pub use failure::{FailureKind, ProviderFailure};
pub use job::{Job, JobId, JobStatus, WebhookConfig};
pub use result::{AggregateResult, ChunkResult, ChunkStatus, OverallStatus};
pub use traits::{ExtractionProvider, JobStore, JobStoreError, ProviderRequest, ProviderResponse};
pub use usage::{accumulate, ChunkUsage, TokenUsage, TokenUsageReport, UsageAvailability};
