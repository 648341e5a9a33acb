//! Remote completion provider abstraction.
//!
//! Defines the [`CompletionProvider`] trait the whole engine is built
//! against, the retry/backoff helper for transient failures, and a scripted
//! [`MockProvider`] so the research loop and job manager can be tested
//! without a network.

pub mod models;
pub mod responses;

use crate::config::RetryConfig;
use crate::error::ProviderError;
use crate::types::{CompletionRequest, CompletionResponse, Job};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

pub use models::{model_info, ModelInfo};
pub use responses::ResponsesClient;

/// The single external capability the engine depends on.
///
/// One request/response call for completions, and a submit/poll/cancel
/// triplet for background jobs keyed by an opaque job identifier.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Issue one completion request and wait for the normalized result.
    async fn complete(&self, request: &CompletionRequest)
        -> Result<CompletionResponse, ProviderError>;

    /// Submit a request as a background job and return the initial snapshot.
    async fn submit(&self, request: &CompletionRequest) -> Result<Job, ProviderError>;

    /// Fetch the current snapshot of a background job by id.
    async fn fetch_job(&self, job_id: &str) -> Result<Job, ProviderError>;

    /// Request cancellation of a background job; returns the provider's
    /// resulting snapshot.
    async fn cancel_job(&self, job_id: &str) -> Result<Job, ProviderError>;
}

/// Execute an async operation with exponential backoff retry on transient errors.
///
/// Retries rate limits (respecting the provider-supplied retry-after when it
/// exceeds the computed backoff), server errors, and transport failures.
/// Permanent errors return immediately.
pub async fn with_retry<F, Fut, T>(config: &RetryConfig, operation: F) -> Result<T, ProviderError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut last_err = None;
    for attempt in 0..=config.max_retries {
        match operation().await {
            Ok(val) => return Ok(val),
            Err(e) => {
                if !e.is_transient() || attempt == config.max_retries {
                    return Err(e);
                }

                let backoff_ms = compute_backoff(config, attempt, &e);
                tracing::warn!(
                    attempt = attempt + 1,
                    max = config.max_retries,
                    backoff_ms = backoff_ms,
                    error = %e,
                    "Retrying after transient provider error"
                );
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                last_err = Some(e);
            }
        }
    }
    Err(last_err.unwrap_or(ProviderError::Connection {
        message: "All retry attempts exhausted".to_string(),
    }))
}

/// Compute backoff delay, respecting rate limit retry-after hints.
fn compute_backoff(config: &RetryConfig, attempt: u32, err: &ProviderError) -> u64 {
    if let ProviderError::RateLimited { retry_after_secs } = err {
        let server_ms = retry_after_secs * 1000;
        let computed = compute_exponential_backoff(config, attempt);
        return server_ms.max(computed);
    }
    compute_exponential_backoff(config, attempt)
}

/// Pure exponential backoff: `initial * multiplier^attempt`, capped.
fn compute_exponential_backoff(config: &RetryConfig, attempt: u32) -> u64 {
    let base = config.initial_backoff_ms as f64 * config.backoff_multiplier.powi(attempt as i32);
    base.min(config.max_backoff_ms as f64) as u64
}

/// A scripted provider for tests.
///
/// Completion responses and job snapshots are queued ahead of time and
/// popped in order; call counters let tests assert how many provider calls
/// an operation actually issued.
#[derive(Default)]
pub struct MockProvider {
    completions: std::sync::Mutex<std::collections::VecDeque<Result<CompletionResponse, ProviderError>>>,
    submits: std::sync::Mutex<std::collections::VecDeque<Result<Job, ProviderError>>>,
    fetches: std::sync::Mutex<std::collections::VecDeque<Result<Job, ProviderError>>>,
    cancels: std::sync::Mutex<std::collections::VecDeque<Result<Job, ProviderError>>>,
    pub complete_calls: std::sync::atomic::AtomicUsize,
    pub fetch_calls: std::sync::atomic::AtomicUsize,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a normalized completion response.
    pub fn queue_completion(&self, response: CompletionResponse) {
        self.completions.lock().unwrap().push_back(Ok(response));
    }

    /// Queue a plain text completion.
    pub fn queue_text(&self, text: &str) {
        self.queue_completion(CompletionResponse::from_text(text));
    }

    /// Queue a completion failure.
    pub fn queue_completion_error(&self, err: ProviderError) {
        self.completions.lock().unwrap().push_back(Err(err));
    }

    /// Queue the snapshot returned by the next `submit` call.
    pub fn queue_submit(&self, job: Job) {
        self.submits.lock().unwrap().push_back(Ok(job));
    }

    /// Queue the result of the next `fetch_job` call.
    pub fn queue_fetch(&self, result: Result<Job, ProviderError>) {
        self.fetches.lock().unwrap().push_back(result);
    }

    /// Queue the snapshot returned by the next `cancel_job` call.
    pub fn queue_cancel(&self, job: Job) {
        self.cancels.lock().unwrap().push_back(Ok(job));
    }

    fn missing_script(kind: &str) -> ProviderError {
        ProviderError::Connection {
            message: format!("MockProvider: no scripted {kind} response left"),
        }
    }
}

#[async_trait]
impl CompletionProvider for MockProvider {
    async fn complete(
        &self,
        _request: &CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        self.complete_calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.completions
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Self::missing_script("completion")))
    }

    async fn submit(&self, _request: &CompletionRequest) -> Result<Job, ProviderError> {
        self.submits
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Self::missing_script("submit")))
    }

    async fn fetch_job(&self, _job_id: &str) -> Result<Job, ProviderError> {
        self.fetch_calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.fetches
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Self::missing_script("fetch")))
    }

    async fn cancel_job(&self, _job_id: &str) -> Result<Job, ProviderError> {
        self.cancels
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Self::missing_script("cancel")))
    }
}
