//! Asynchronous job lifecycle
//!
//! Wraps the extraction pipeline in trackable jobs: creation, background
//! execution, cooperative cancellation, terminal store transitions, and
//! webhook notification.

use crate::error::JobError;
use docsift_domain::{ExtractionProvider, Job, JobId, JobStatus, JobStore};
use docsift_extractor::{ExtractionRequest, Extractor, ExtractorConfig, OrchestrationOutcome};
use docsift_webhook::{WebhookDispatcher, WebhookPayload};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// A request to run one document extraction as a job
#[derive(Debug, Clone)]
pub struct JobRequest {
    /// Reference to the input (URL or content reference)
    pub input_ref: String,

    /// Normalized document text
    pub document: String,

    /// What to extract
    pub instruction: String,

    /// Optional JSON schema the extracted content must match
    pub schema: Option<Value>,

    /// Optional completion callback registration
    pub webhook: Option<docsift_domain::WebhookConfig>,

    /// Per-job override of the concurrency limit
    pub concurrency: Option<usize>,
}

impl JobRequest {
    /// Build a job request
    pub fn new(
        input_ref: impl Into<String>,
        document: impl Into<String>,
        instruction: impl Into<String>,
    ) -> Self {
        Self {
            input_ref: input_ref.into(),
            document: document.into(),
            instruction: instruction.into(),
            schema: None,
            webhook: None,
            concurrency: None,
        }
    }

    /// Constrain the extraction to a JSON schema
    pub fn with_schema(mut self, schema: Value) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Register a completion webhook
    pub fn with_webhook(mut self, webhook: docsift_domain::WebhookConfig) -> Self {
        self.webhook = Some(webhook);
        self
    }

    /// Override the concurrency limit for this job only
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = Some(concurrency);
        self
    }
}

/// Runs extraction jobs in the background against a job store
///
/// Each submitted job owns a cancellation token for the duration of its
/// run. The store is the sole writer of job status; the runner only drives
/// transitions through it.
pub struct JobRunner<P: ExtractionProvider, S: JobStore> {
    store: Arc<S>,
    provider: Arc<P>,
    config: ExtractorConfig,
    dispatcher: Arc<WebhookDispatcher>,
    running: Arc<Mutex<HashMap<JobId, CancellationToken>>>,
    handles: Mutex<HashMap<JobId, JoinHandle<()>>>,
}

impl<P, S> JobRunner<P, S>
where
    P: ExtractionProvider + 'static,
    S: JobStore + 'static,
{
    /// Create a runner, validating the extractor configuration
    pub fn new(provider: P, store: S, config: ExtractorConfig) -> Result<Self, JobError> {
        config
            .validate()
            .map_err(|e| JobError::Extraction(docsift_extractor::ExtractError::Config(e)))?;
        Ok(Self {
            store: Arc::new(store),
            provider: Arc::new(provider),
            config,
            dispatcher: Arc::new(WebhookDispatcher::new()),
            running: Arc::new(Mutex::new(HashMap::new())),
            handles: Mutex::new(HashMap::new()),
        })
    }

    /// Replace the webhook dispatcher (custom backoff or timeouts)
    pub fn with_dispatcher(mut self, dispatcher: WebhookDispatcher) -> Self {
        self.dispatcher = Arc::new(dispatcher);
        self
    }

    /// Create a job and start it in the background
    pub fn submit(&self, request: JobRequest) -> Result<JobId, JobError> {
        let job = self
            .store
            .create(&request.input_ref, request.webhook.clone())?;
        let id = job.id;

        let token = CancellationToken::new();
        self.running
            .lock()
            .map_err(|_| JobError::Runner("running map lock poisoned".to_string()))?
            .insert(id, token.clone());

        info!("Submitted job {} for '{}'", id, request.input_ref);

        let store = Arc::clone(&self.store);
        let provider = Arc::clone(&self.provider);
        let config = self.config.clone();
        let dispatcher = Arc::clone(&self.dispatcher);
        let running = Arc::clone(&self.running);
        let handle = tokio::spawn(async move {
            run_job(store, provider, config, dispatcher, id, request, token).await;
            if let Ok(mut map) = running.lock() {
                map.remove(&id);
            }
        });

        self.handles
            .lock()
            .map_err(|_| JobError::Runner("handle map lock poisoned".to_string()))?
            .insert(id, handle);

        Ok(id)
    }

    /// Fetch a job's current state
    pub fn status(&self, id: JobId) -> Result<Job, JobError> {
        Ok(self.store.get(id)?)
    }

    /// Request cancellation of a job
    ///
    /// A running job is signalled cooperatively: no new chunk invocations
    /// or retries start, in-flight calls drain, and the job's own task
    /// records the `Cancelled` state. A job with no live task is cancelled
    /// directly through the store; cancelling an already-terminal job
    /// surfaces the store's `AlreadyTerminal` error.
    pub fn cancel(&self, id: JobId) -> Result<Job, JobError> {
        let token = self
            .running
            .lock()
            .map_err(|_| JobError::Runner("running map lock poisoned".to_string()))?
            .get(&id)
            .cloned();

        match token {
            Some(token) => {
                info!("Cancellation requested for running job {}", id);
                token.cancel();
                Ok(self.store.get(id)?)
            }
            None => Ok(self.store.cancel(id)?),
        }
    }

    /// Wait for a job's background task to finish, then return its state
    pub async fn wait(&self, id: JobId) -> Result<Job, JobError> {
        let handle = self
            .handles
            .lock()
            .map_err(|_| JobError::Runner("handle map lock poisoned".to_string()))?
            .remove(&id);

        if let Some(handle) = handle {
            handle
                .await
                .map_err(|e| JobError::Runner(format!("job task failed: {}", e)))?;
        }

        Ok(self.store.get(id)?)
    }
}

/// Drive one job from `Running` to a terminal state
async fn run_job<P, S>(
    store: Arc<S>,
    provider: Arc<P>,
    mut config: ExtractorConfig,
    dispatcher: Arc<WebhookDispatcher>,
    id: JobId,
    request: JobRequest,
    token: CancellationToken,
) where
    P: ExtractionProvider + 'static,
    S: JobStore + 'static,
{
    if let Err(e) = store.transition(id, JobStatus::Running, None) {
        // A cancel raced ahead of the task; there is nothing to run
        warn!("Job {} could not start: {}", id, e);
        return;
    }

    let JobRequest {
        input_ref,
        document,
        instruction,
        schema,
        concurrency,
        webhook: _,
    } = request;

    if let Some(concurrency) = concurrency {
        config.concurrency = concurrency;
    }

    let mut extraction = ExtractionRequest::new(input_ref, document, instruction);
    if let Some(schema) = schema {
        extraction = extraction.with_schema(schema);
    }

    let extracted = match Extractor::from_shared(provider, config) {
        Ok(extractor) => extractor.extract(extraction, token).await,
        Err(e) => Err(e),
    };

    let (status, result) = match extracted {
        Ok(OrchestrationOutcome::Completed(aggregate)) => {
            (JobStatus::from_overall(aggregate.overall_status), Some(aggregate))
        }
        Ok(OrchestrationOutcome::Cancelled) => (JobStatus::Cancelled, None),
        Err(e) => {
            warn!("Job {} failed before any provider call: {}", id, e);
            (JobStatus::Failed, None)
        }
    };

    let job = match store.transition(id, status, result) {
        Ok(job) => job,
        Err(e) => {
            error!("Job {} could not be finalized as {}: {}", id, status, e);
            return;
        }
    };

    info!("Job {} finished as {}", id, job.status);

    // Delivery failure is logged by the dispatcher and never alters the
    // job's status
    if let Some(config) = &job.webhook_config {
        let payload = WebhookPayload::for_job(&job);
        let report = dispatcher.deliver(config, &payload).await;
        if !report.delivered {
            warn!(
                "Job {} webhook not delivered after {} attempt(s)",
                id, report.attempts
            );
        }
    }
}
