//! Background-job lifecycle management.
//!
//! Submission, bounded polling with rate-limit-aware backoff, and
//! independent resumption from a bare job id. The polling loop is an
//! explicit state machine: [`next_poll_action`] is a pure transition
//! function over [`PollState`] and one poll outcome, and the async driver
//! only sleeps and fetches. Retry/backoff/timeout logic is therefore
//! testable without real waiting.

use crate::error::{InquestError, JobError, ProviderError};
use crate::provider::CompletionProvider;
use crate::types::{CompletionRequest, Job, JobStatus};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Polling policy for background jobs.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Fixed sleep between status fetches.
    pub interval: Duration,
    /// Wall-clock wait window per invocation; not renewed across resumes.
    pub max_wait: Duration,
    /// Consecutive rate-limit or transport errors tolerated before aborting.
    pub max_consecutive_errors: u32,
    /// Delay applied on a rate-limit response with no retry-after hint.
    pub default_retry_after: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_wait: Duration::from_secs(30 * 60),
            max_consecutive_errors: 3,
            default_retry_after: Duration::from_secs(5),
        }
    }
}

/// Mutable polling state threaded through the transition function.
#[derive(Debug, Clone, Copy, Default)]
pub struct PollState {
    /// Wall-clock time spent in this invocation's wait window.
    pub elapsed: Duration,
    /// Consecutive failed polls; reset to zero by any successful fetch.
    pub consecutive_errors: u32,
    /// Last non-terminal status observed.
    pub last_status: JobStatus,
}

/// Result of one status fetch, as seen by the transition function.
#[derive(Debug)]
pub enum PollOutcome {
    /// The fetch succeeded and returned a snapshot.
    Snapshot(Job),
    /// The provider rate-limited the fetch.
    RateLimited { retry_after: Option<Duration> },
    /// A transport, server, or parse error occurred.
    TransportError(String),
}

/// What the driver should do next.
#[derive(Debug)]
pub enum PollAction {
    /// The job reached a terminal status.
    Terminal(Job),
    /// Sleep for the given delay, then fetch again.
    Sleep(Duration),
    /// Abort: consecutive rate limits reached the bound.
    AbortRateLimited,
    /// Abort: consecutive errors reached the bound.
    AbortErrors(String),
    /// Abort: the wait window is exhausted while the job is non-terminal.
    AbortTimeout,
}

/// Pure transition function for the poll loop.
///
/// Mutates `state` (error counter, last status) and decides the next
/// driver action. The driver owns wall-clock accounting and adds the slept
/// time to `state.elapsed` itself.
pub fn next_poll_action(config: &PollConfig, state: &mut PollState, outcome: PollOutcome) -> PollAction {
    match outcome {
        PollOutcome::Snapshot(job) => {
            state.consecutive_errors = 0;
            if job.status.is_terminal() {
                return PollAction::Terminal(job);
            }
            state.last_status = job.status;
            if state.elapsed >= config.max_wait {
                return PollAction::AbortTimeout;
            }
            PollAction::Sleep(config.interval)
        }
        PollOutcome::RateLimited { retry_after } => {
            state.consecutive_errors += 1;
            if state.consecutive_errors >= config.max_consecutive_errors {
                return PollAction::AbortRateLimited;
            }
            PollAction::Sleep(retry_after.unwrap_or(config.default_retry_after))
        }
        PollOutcome::TransportError(message) => {
            state.consecutive_errors += 1;
            if state.consecutive_errors >= config.max_consecutive_errors {
                return PollAction::AbortErrors(message);
            }
            PollAction::Sleep(config.interval)
        }
    }
}

/// Manages the lifecycle of background remote jobs.
///
/// Carries no per-job state: every operation works from a job id alone, so
/// a job submitted by one process can be resumed by another.
pub struct BackgroundJobManager {
    provider: Arc<dyn CompletionProvider>,
    config: PollConfig,
}

impl BackgroundJobManager {
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        Self {
            provider,
            config: PollConfig::default(),
        }
    }

    pub fn with_config(provider: Arc<dyn CompletionProvider>, config: PollConfig) -> Self {
        Self { provider, config }
    }

    /// Submit a request as a background job and poll it to a terminal state.
    ///
    /// When the submission response is already terminal, no polling happens.
    pub async fn submit_and_wait(&self, request: &CompletionRequest) -> Result<Job, InquestError> {
        let job = self.provider.submit(request).await.map_err(InquestError::from)?;
        info!(job_id = %job.id, status = %job.status, "Background job submitted");
        if job.status.is_terminal() {
            return Self::into_terminal(job);
        }
        self.poll_to_terminal(job.id.clone(), job.status).await
    }

    /// Submit a request and return the initial snapshot without waiting.
    pub async fn submit(&self, request: &CompletionRequest) -> Result<Job, InquestError> {
        let job = self.provider.submit(request).await?;
        info!(job_id = %job.id, status = %job.status, "Background job submitted");
        Ok(job)
    }

    /// Resume a job from its id alone.
    ///
    /// Fetches the current status once; terminal jobs return immediately
    /// with no further polling, non-terminal jobs enter a fresh poll loop
    /// with its own full wait window.
    pub async fn resume(&self, job_id: &str) -> Result<Job, InquestError> {
        let job = self.provider.fetch_job(job_id).await?;
        if job.status.is_terminal() {
            debug!(job_id = %job.id, status = %job.status, "Job already terminal on resume");
            return Self::into_terminal(job);
        }
        self.poll_to_terminal(job.id.clone(), job.status).await
    }

    /// One status fetch; returns the snapshot whatever the status.
    pub async fn status(&self, job_id: &str) -> Result<Job, InquestError> {
        Ok(self.provider.fetch_job(job_id).await?)
    }

    /// One-shot cancellation request; returns the provider's resulting
    /// snapshot. Does not preempt an in-flight poll loop, which observes
    /// the cancellation on its next fetch.
    pub async fn cancel(&self, job_id: &str) -> Result<Job, InquestError> {
        let job = self.provider.cancel_job(job_id).await?;
        info!(job_id = %job.id, status = %job.status, "Cancellation requested");
        Ok(job)
    }

    /// Drive the poll state machine until a terminal action.
    async fn poll_to_terminal(
        &self,
        job_id: String,
        initial_status: JobStatus,
    ) -> Result<Job, InquestError> {
        let mut state = PollState {
            elapsed: Duration::ZERO,
            consecutive_errors: 0,
            last_status: initial_status,
        };

        loop {
            tokio::time::sleep(self.config.interval).await;
            state.elapsed += self.config.interval;

            let outcome = match self.provider.fetch_job(&job_id).await {
                Ok(job) => PollOutcome::Snapshot(job),
                Err(ProviderError::RateLimited { retry_after_secs }) => PollOutcome::RateLimited {
                    retry_after: Some(Duration::from_secs(retry_after_secs)),
                },
                Err(e) if e.is_transient() || matches!(e, ProviderError::Parse { .. }) => {
                    warn!(job_id = %job_id, error = %e, "Poll attempt failed");
                    PollOutcome::TransportError(e.to_string())
                }
                // Permanent rejections (auth, unknown job) are not poll
                // noise; surface them directly.
                Err(e) => return Err(e.into()),
            };

            match next_poll_action(&self.config, &mut state, outcome) {
                PollAction::Terminal(job) => return Self::into_terminal(job),
                PollAction::Sleep(extra) if extra != self.config.interval => {
                    // Rate-limit delay on top of the regular cadence.
                    tokio::time::sleep(extra.saturating_sub(self.config.interval)).await;
                    state.elapsed += extra.saturating_sub(self.config.interval);
                }
                PollAction::Sleep(_) => {}
                PollAction::AbortRateLimited => {
                    return Err(JobError::RateLimited {
                        job_id,
                        consecutive: state.consecutive_errors,
                    }
                    .into())
                }
                PollAction::AbortErrors(message) => {
                    return Err(JobError::PollExhausted {
                        job_id,
                        consecutive: state.consecutive_errors,
                        message,
                    }
                    .into())
                }
                PollAction::AbortTimeout => {
                    return Err(JobError::Timeout {
                        job_id,
                        last_status: state.last_status,
                        waited_secs: state.elapsed.as_secs(),
                    }
                    .into())
                }
            }
        }
    }

    /// Map a terminal snapshot to the caller-facing result.
    fn into_terminal(job: Job) -> Result<Job, InquestError> {
        match job.status {
            JobStatus::Completed => Ok(job),
            JobStatus::Failed => {
                let detail = job.error.clone().unwrap_or_default();
                Err(JobError::Failed {
                    job_id: job.id,
                    code: detail.code,
                    message: detail
                        .message
                        .unwrap_or_else(|| "no error detail from provider".to_string()),
                }
                .into())
            }
            JobStatus::Cancelled => Err(JobError::Cancelled { job_id: job.id }.into()),
            // Non-terminal statuses never reach here from the state machine.
            other => Err(JobError::PollExhausted {
                job_id: job.id,
                consecutive: 0,
                message: format!("unexpected non-terminal status {other}"),
            }
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MockProvider;
    use serde_json::json;

    fn job(id: &str, status: JobStatus) -> Job {
        Job {
            id: id.into(),
            status,
            error: None,
            raw_result: None,
        }
    }

    fn completed_job(id: &str) -> Job {
        Job {
            id: id.into(),
            status: JobStatus::Completed,
            error: None,
            raw_result: Some(json!({
                "output": [{"type": "message", "content": [
                    {"type": "output_text", "text": "final answer"}
                ]}]
            })),
        }
    }

    fn fast_config() -> PollConfig {
        PollConfig {
            interval: Duration::from_millis(1),
            max_wait: Duration::from_secs(60),
            ..Default::default()
        }
    }

    // --- transition function ---

    #[test]
    fn test_transition_terminal_snapshot() {
        let config = PollConfig::default();
        let mut state = PollState::default();
        let action = next_poll_action(
            &config,
            &mut state,
            PollOutcome::Snapshot(job("j", JobStatus::Completed)),
        );
        assert!(matches!(action, PollAction::Terminal(_)));
    }

    #[test]
    fn test_transition_nonterminal_sleeps_interval() {
        let config = PollConfig::default();
        let mut state = PollState::default();
        let action = next_poll_action(
            &config,
            &mut state,
            PollOutcome::Snapshot(job("j", JobStatus::InProgress)),
        );
        match action {
            PollAction::Sleep(delay) => assert_eq!(delay, config.interval),
            other => panic!("Expected Sleep, got {other:?}"),
        }
        assert_eq!(state.last_status, JobStatus::InProgress);
    }

    #[test]
    fn test_transition_timeout_when_window_spent() {
        let config = PollConfig::default();
        let mut state = PollState {
            elapsed: config.max_wait,
            ..Default::default()
        };
        let action = next_poll_action(
            &config,
            &mut state,
            PollOutcome::Snapshot(job("j", JobStatus::InProgress)),
        );
        assert!(matches!(action, PollAction::AbortTimeout));
    }

    #[test]
    fn test_transition_rate_limit_uses_retry_after() {
        let config = PollConfig::default();
        let mut state = PollState::default();
        let action = next_poll_action(
            &config,
            &mut state,
            PollOutcome::RateLimited {
                retry_after: Some(Duration::from_secs(9)),
            },
        );
        match action {
            PollAction::Sleep(delay) => assert_eq!(delay, Duration::from_secs(9)),
            other => panic!("Expected Sleep, got {other:?}"),
        }
        assert_eq!(state.consecutive_errors, 1);
    }

    #[test]
    fn test_transition_rate_limit_default_delay() {
        let config = PollConfig::default();
        let mut state = PollState::default();
        let action =
            next_poll_action(&config, &mut state, PollOutcome::RateLimited { retry_after: None });
        match action {
            PollAction::Sleep(delay) => assert_eq!(delay, config.default_retry_after),
            other => panic!("Expected Sleep, got {other:?}"),
        }
    }

    #[test]
    fn test_transition_consecutive_error_bound() {
        let config = PollConfig::default();
        let mut state = PollState::default();
        for _ in 0..2 {
            let action = next_poll_action(
                &config,
                &mut state,
                PollOutcome::TransportError("connection reset".into()),
            );
            assert!(matches!(action, PollAction::Sleep(_)));
        }
        let action = next_poll_action(
            &config,
            &mut state,
            PollOutcome::TransportError("connection reset".into()),
        );
        assert!(matches!(action, PollAction::AbortErrors(_)));
    }

    #[test]
    fn test_transition_error_counter_resets_on_success() {
        let config = PollConfig::default();
        let mut state = PollState::default();
        next_poll_action(
            &config,
            &mut state,
            PollOutcome::TransportError("reset".into()),
        );
        next_poll_action(
            &config,
            &mut state,
            PollOutcome::TransportError("reset".into()),
        );
        assert_eq!(state.consecutive_errors, 2);

        next_poll_action(
            &config,
            &mut state,
            PollOutcome::Snapshot(job("j", JobStatus::InProgress)),
        );
        assert_eq!(state.consecutive_errors, 0);

        // The bound needs a fresh run of consecutive failures now.
        let action = next_poll_action(
            &config,
            &mut state,
            PollOutcome::TransportError("reset".into()),
        );
        assert!(matches!(action, PollAction::Sleep(_)));
    }

    // --- driver ---

    #[tokio::test]
    async fn test_submit_terminal_response_skips_polling() {
        let mock = MockProvider::new();
        mock.queue_submit(completed_job("resp_1"));
        let manager =
            BackgroundJobManager::with_config(Arc::new(mock), fast_config());
        let job = manager
            .submit_and_wait(&CompletionRequest::new("o3-deep-research", "q"))
            .await
            .unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.output_text().unwrap(), "final answer");
    }

    #[tokio::test]
    async fn test_submit_then_polls_to_completion() {
        let mock = MockProvider::new();
        mock.queue_submit(job("resp_1", JobStatus::Queued));
        mock.queue_fetch(Ok(job("resp_1", JobStatus::InProgress)));
        mock.queue_fetch(Ok(completed_job("resp_1")));
        let manager = BackgroundJobManager::with_config(Arc::new(mock), fast_config());
        let job = manager
            .submit_and_wait(&CompletionRequest::new("o3-deep-research", "q"))
            .await
            .unwrap();
        assert_eq!(job.status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_resume_completed_job_fetches_once() {
        let mock = MockProvider::new();
        mock.queue_fetch(Ok(completed_job("resp_1")));
        mock.queue_fetch(Ok(completed_job("resp_1")));
        let provider = Arc::new(mock);
        let manager = BackgroundJobManager::with_config(provider.clone(), fast_config());

        let first = manager.resume("resp_1").await.unwrap();
        let second = manager.resume("resp_1").await.unwrap();
        assert_eq!(first.output_text(), second.output_text());
        // One status fetch per resume, nothing more.
        assert_eq!(
            provider.fetch_calls.load(std::sync::atomic::Ordering::SeqCst),
            2
        );
    }

    #[tokio::test]
    async fn test_resume_nonterminal_enters_poll_loop() {
        let mock = MockProvider::new();
        mock.queue_fetch(Ok(job("resp_1", JobStatus::InProgress)));
        mock.queue_fetch(Ok(job("resp_1", JobStatus::InProgress)));
        mock.queue_fetch(Ok(completed_job("resp_1")));
        let manager = BackgroundJobManager::with_config(Arc::new(mock), fast_config());
        let job = manager.resume("resp_1").await.unwrap();
        assert_eq!(job.status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_failed_job_surfaces_detail() {
        let mock = MockProvider::new();
        mock.queue_fetch(Ok(Job {
            id: "resp_1".into(),
            status: JobStatus::Failed,
            error: Some(crate::types::JobErrorDetail {
                code: Some("server_error".into()),
                message: Some("model crashed".into()),
            }),
            raw_result: None,
        }));
        let manager = BackgroundJobManager::with_config(Arc::new(mock), fast_config());
        let err = manager.resume("resp_1").await.unwrap_err();
        match err {
            InquestError::Job(JobError::Failed { job_id, code, message }) => {
                assert_eq!(job_id, "resp_1");
                assert_eq!(code.as_deref(), Some("server_error"));
                assert_eq!(message, "model crashed");
            }
            other => panic!("Expected JobError::Failed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cancelled_job_is_terminal() {
        let mock = MockProvider::new();
        mock.queue_fetch(Ok(job("resp_1", JobStatus::InProgress)));
        mock.queue_fetch(Ok(job("resp_1", JobStatus::Cancelled)));
        let manager = BackgroundJobManager::with_config(Arc::new(mock), fast_config());
        let err = manager.resume("resp_1").await.unwrap_err();
        assert!(matches!(
            err,
            InquestError::Job(JobError::Cancelled { .. })
        ));
    }

    #[tokio::test]
    async fn test_consecutive_rate_limits_abort() {
        let mock = MockProvider::new();
        mock.queue_fetch(Ok(job("resp_1", JobStatus::InProgress)));
        for _ in 0..3 {
            mock.queue_fetch(Err(ProviderError::RateLimited { retry_after_secs: 0 }));
        }
        let manager = BackgroundJobManager::with_config(Arc::new(mock), fast_config());
        let err = manager.resume("resp_1").await.unwrap_err();
        match err {
            InquestError::Job(JobError::RateLimited { job_id, consecutive }) => {
                assert_eq!(job_id, "resp_1");
                assert_eq!(consecutive, 3);
            }
            other => panic!("Expected JobError::RateLimited, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_transient_errors_tolerated_below_bound() {
        let mock = MockProvider::new();
        mock.queue_fetch(Ok(job("resp_1", JobStatus::InProgress)));
        mock.queue_fetch(Err(ProviderError::Connection {
            message: "reset".into(),
        }));
        mock.queue_fetch(Err(ProviderError::Server {
            status: 502,
            message: "bad gateway".into(),
        }));
        mock.queue_fetch(Ok(completed_job("resp_1")));
        let manager = BackgroundJobManager::with_config(Arc::new(mock), fast_config());
        let job = manager.resume("resp_1").await.unwrap();
        assert_eq!(job.status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_permanent_error_during_poll_propagates() {
        let mock = MockProvider::new();
        mock.queue_fetch(Ok(job("resp_1", JobStatus::InProgress)));
        mock.queue_fetch(Err(ProviderError::Request {
            status: 404,
            message: "unknown job".into(),
        }));
        let manager = BackgroundJobManager::with_config(Arc::new(mock), fast_config());
        let err = manager.resume("resp_1").await.unwrap_err();
        assert!(matches!(err, InquestError::Provider(_)));
    }

    #[tokio::test]
    async fn test_timeout_carries_job_id_and_status() {
        let mock = MockProvider::new();
        mock.queue_fetch(Ok(job("resp_1", JobStatus::InProgress)));
        mock.queue_fetch(Ok(job("resp_1", JobStatus::InProgress)));
        let config = PollConfig {
            interval: Duration::from_millis(1),
            max_wait: Duration::from_millis(1),
            ..Default::default()
        };
        let manager = BackgroundJobManager::with_config(Arc::new(mock), config);
        let err = manager.resume("resp_1").await.unwrap_err();
        match err {
            InquestError::Job(JobError::Timeout {
                job_id,
                last_status,
                ..
            }) => {
                assert_eq!(job_id, "resp_1");
                assert_eq!(last_status, JobStatus::InProgress);
            }
            other => panic!("Expected JobError::Timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_status_returns_snapshot_without_polling() {
        let mock = MockProvider::new();
        mock.queue_fetch(Ok(job("resp_1", JobStatus::InProgress)));
        let provider = Arc::new(mock);
        let manager = BackgroundJobManager::with_config(provider.clone(), fast_config());
        let snapshot = manager.status("resp_1").await.unwrap();
        assert_eq!(snapshot.status, JobStatus::InProgress);
        assert_eq!(
            provider.fetch_calls.load(std::sync::atomic::Ordering::SeqCst),
            1
        );
    }

    #[tokio::test]
    async fn test_cancel_is_one_shot() {
        let mock = MockProvider::new();
        mock.queue_cancel(job("resp_1", JobStatus::Cancelled));
        let manager = BackgroundJobManager::with_config(Arc::new(mock), fast_config());
        let snapshot = manager.cancel("resp_1").await.unwrap();
        assert_eq!(snapshot.status, JobStatus::Cancelled);
    }
}
