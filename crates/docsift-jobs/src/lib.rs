//! Docsift Jobs
//!
//! Asynchronous job lifecycle around the extraction pipeline.
//!
//! # Overview
//!
//! A submitted extraction runs as a trackable job: it is recorded in the
//! job store as `Pending`, moves to `Running` when the orchestrator picks
//! it up, and lands in a terminal state mapped from the extraction outcome
//! (`Completed`, `PartiallyCompleted`, `Failed`, or `Cancelled`). Jobs with
//! a registered webhook have their result, including accumulated token
//! usage, delivered to the callback URL once terminal.
//!
//! # Usage
//!
//! ```no_run
//! use docsift_extractor::ExtractorConfig;
//! use docsift_jobs::{JobRequest, JobRunner};
//! use docsift_llm::HttpProvider;
//! use docsift_store::SqliteJobStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = HttpProvider::new("https://api.example.com", "gpt-4o-mini");
//! let store = SqliteJobStore::new("jobs.db")?;
//! let runner = JobRunner::new(provider, store, ExtractorConfig::default())?;
//!
//! let id = runner.submit(JobRequest::new(
//!     "https://example.com/report",
//!     "Document text...",
//!     "Extract all figures",
//! ))?;
//!
//! let job = runner.wait(id).await?;
//! println!("{}: {}", job.id, job.status);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod error;
mod logging;
mod response;
mod runner;

pub use error::JobError;
pub use logging::init_tracing;
pub use response::{ExtractResponse, FailedChunk, UrlResult};
pub use runner::{JobRequest, JobRunner};
