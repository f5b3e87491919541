//! End-to-end job lifecycle tests with a mock provider

use docsift_domain::{
    JobStatus, JobStoreError, OverallStatus, ProviderFailure, WebhookConfig,
};
use docsift_extractor::ExtractorConfig;
use docsift_jobs::{JobError, JobRequest, JobRunner};
use docsift_llm::MockProvider;
use docsift_store::SqliteJobStore;
use docsift_webhook::WebhookDispatcher;
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::task::JoinHandle;

fn fast_config() -> ExtractorConfig {
    ExtractorConfig {
        backoff_base_ms: 1,
        backoff_cap_ms: 4,
        call_timeout_secs: 5,
        ..ExtractorConfig::default()
    }
}

/// Splits "alpha\n\nbravo\n\ncharlie" into one chunk per word
fn three_chunk_config() -> ExtractorConfig {
    ExtractorConfig {
        max_chunk_size: 11,
        chunk_overlap: 0,
        ..fast_config()
    }
}

fn runner(
    provider: MockProvider,
    config: ExtractorConfig,
) -> JobRunner<MockProvider, SqliteJobStore> {
    let store = SqliteJobStore::in_memory().unwrap();
    JobRunner::new(provider, store, config)
        .unwrap()
        .with_dispatcher(WebhookDispatcher::new().with_backoff(1, 4))
}

#[tokio::test]
async fn test_job_completes_with_usage() -> anyhow::Result<()> {
    let provider = MockProvider::new(json!({"title": "Doc"})).with_default_usage(100, 20);
    let runner = runner(provider.clone(), fast_config());

    let id = runner.submit(JobRequest::new(
        "https://example.com/doc",
        "tiny document",
        "extract the title",
    ))?;

    let job = runner.wait(id).await?;
    assert_eq!(job.status, JobStatus::Completed);

    let result = job.result.expect("completed job carries a result");
    assert_eq!(result.overall_status, OverallStatus::Success);
    assert_eq!(result.usage.total_tokens, 120);
    assert_eq!(provider.call_count(), 1);

    // The store is queryable after completion
    assert_eq!(runner.status(id)?.status, JobStatus::Completed);
    Ok(())
}

#[tokio::test]
async fn test_partial_failure_yields_partially_completed() -> anyhow::Result<()> {
    let mut provider = MockProvider::new(json!({"ok": true})).with_default_usage(50, 5);
    provider.add_script("bravo", vec![Err(ProviderFailure::auth("401"))]);

    let runner = runner(provider.clone(), three_chunk_config());
    let id = runner.submit(JobRequest::new(
        "https://example.com/doc",
        "alpha\n\nbravo\n\ncharlie",
        "extract items",
    ))?;

    let job = runner.wait(id).await?;
    assert_eq!(job.status, JobStatus::PartiallyCompleted);

    let result = job.result.unwrap();
    assert_eq!(result.overall_status, OverallStatus::Partial);
    assert_eq!(result.usage.prompt_tokens, 100);
    assert_eq!(provider.calls_for("bravo"), 1);
    Ok(())
}

#[tokio::test]
async fn test_all_chunks_failing_yields_failed() -> anyhow::Result<()> {
    let mut provider = MockProvider::new(json!([]));
    provider.add_script(
        "doomed document",
        vec![Err(ProviderFailure::malformed("garbage"))],
    );

    let runner = runner(provider, fast_config());
    let id = runner.submit(JobRequest::new("ref", "doomed document", "extract"))?;

    let job = runner.wait(id).await?;
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.result.unwrap().overall_status, OverallStatus::Failed);
    Ok(())
}

#[tokio::test]
async fn test_empty_document_fails_before_any_call() -> anyhow::Result<()> {
    let provider = MockProvider::new(json!([]));
    let runner = runner(provider.clone(), fast_config());

    let id = runner.submit(JobRequest::new("ref", "   ", "extract"))?;
    let job = runner.wait(id).await?;

    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.result.is_none());
    assert_eq!(provider.call_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_cancel_running_job_drains_and_marks_cancelled() -> anyhow::Result<()> {
    let mut provider = MockProvider::new(json!([]));
    provider.add_script(
        "slow document",
        vec![
            Err(ProviderFailure::provider("500")),
            Ok(MockProvider::response(json!({"ok": true}), None)),
        ],
    );

    // Long backoff parks the job between attempts
    let config = ExtractorConfig {
        backoff_base_ms: 5_000,
        backoff_cap_ms: 5_000,
        ..ExtractorConfig::default()
    };
    let runner = runner(provider.clone(), config);
    let id = runner.submit(JobRequest::new("ref", "slow document", "extract"))?;

    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    let job = runner.cancel(id)?;
    assert!(!job.status.is_terminal() || job.status == JobStatus::Cancelled);

    let job = runner.wait(id).await?;
    assert_eq!(job.status, JobStatus::Cancelled);
    // Completed chunks are not used; no result is stored
    assert!(job.result.is_none());
    assert_eq!(provider.call_count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_cancel_completed_job_is_already_terminal() -> anyhow::Result<()> {
    let provider = MockProvider::new(json!({"ok": true}));
    let runner = runner(provider, fast_config());

    let id = runner.submit(JobRequest::new("ref", "document", "extract"))?;
    runner.wait(id).await?;

    let error = runner.cancel(id).unwrap_err();
    assert!(matches!(
        error,
        JobError::Store(JobStoreError::AlreadyTerminal(JobStatus::Completed))
    ));

    // Status left unchanged by the rejected cancellation
    assert_eq!(runner.status(id)?.status, JobStatus::Completed);
    Ok(())
}

#[tokio::test]
async fn test_per_job_concurrency_override() -> anyhow::Result<()> {
    let provider = MockProvider::new(json!({"ok": true})).with_default_usage(10, 1);
    let runner = runner(provider.clone(), three_chunk_config());

    let id = runner.submit(
        JobRequest::new("ref", "alpha\n\nbravo\n\ncharlie", "extract").with_concurrency(1),
    )?;

    let job = runner.wait(id).await?;
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(provider.call_count(), 3);
    Ok(())
}

#[tokio::test]
async fn test_unknown_job_is_not_found() {
    let provider = MockProvider::new(json!([]));
    let runner = runner(provider, fast_config());

    let id = docsift_domain::JobId::new();
    assert!(matches!(
        runner.status(id),
        Err(JobError::Store(JobStoreError::NotFound(_)))
    ));
}

// --- webhook delivery -----------------------------------------------------

const RESPONSE_200: &str = "HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";
const RESPONSE_500: &str =
    "HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";

/// Serve one canned response per expected connection, recording requests
async fn recording_server(responses: Vec<&'static str>) -> (String, JoinHandle<Vec<String>>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let mut recorded = Vec::new();
        for response in responses {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut tmp = [0u8; 4096];
            loop {
                let n = socket.read(&mut tmp).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&tmp[..n]);
                if request_complete(&buf) {
                    break;
                }
            }
            recorded.push(String::from_utf8_lossy(&buf).to_string());
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        }
        recorded
    });

    (format!("http://{}", addr), handle)
}

fn request_complete(buf: &[u8]) -> bool {
    let Some(header_end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
        return false;
    };
    let headers = String::from_utf8_lossy(&buf[..header_end]);
    let content_length = headers
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            if name.eq_ignore_ascii_case("content-length") {
                value.trim().parse::<usize>().ok()
            } else {
                None
            }
        })
        .unwrap_or(0);
    buf.len() >= header_end + 4 + content_length
}

#[tokio::test]
async fn test_completed_job_delivers_webhook_with_usage() -> anyhow::Result<()> {
    let (url, server) = recording_server(vec![RESPONSE_200]).await;

    let provider = MockProvider::new(json!({"title": "Doc"})).with_default_usage(100, 20);
    let runner = runner(provider, fast_config());

    let id = runner.submit(
        JobRequest::new("https://example.com/doc", "document", "extract")
            .with_webhook(WebhookConfig::new(&url)),
    )?;

    let job = runner.wait(id).await?;
    assert_eq!(job.status, JobStatus::Completed);

    let requests = server.await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].contains(&id.to_string()));
    assert!(requests[0].contains("\"total_tokens\":120"));
    assert!(requests[0].contains("\"status\":\"completed\""));
    Ok(())
}

#[tokio::test]
async fn test_webhook_failure_never_alters_job_status() -> anyhow::Result<()> {
    let (url, server) = recording_server(vec![RESPONSE_500, RESPONSE_500]).await;

    let provider = MockProvider::new(json!({"ok": true}));
    let runner = runner(provider, fast_config());

    let id = runner.submit(
        JobRequest::new("ref", "document", "extract")
            .with_webhook(WebhookConfig::new(&url).with_max_retries(1)),
    )?;

    let job = runner.wait(id).await?;

    // Delivery was retried to exhaustion, then abandoned
    let requests = server.await.unwrap();
    assert_eq!(requests.len(), 2);

    // The extraction outcome stands regardless of delivery
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(runner.status(id)?.status, JobStatus::Completed);
    Ok(())
}
