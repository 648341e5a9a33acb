//! The external boundary of the research core.
//!
//! [`ResearchService`] exposes the four operations the hosting layer calls:
//! run a research request, and resume / inspect / cancel a background job.
//! Requests route to the synchronous research loop for standard models and
//! to the background-job path for deep-research models; both bottom out in
//! the same [`CompletionProvider`].

use crate::config::{EngineConfig, RequestOptions};
use crate::error::Result;
use crate::jobs::BackgroundJobManager;
use crate::provider::{models, CompletionProvider, ResponsesClient};
use crate::research::{ResearchEngine, ResearchReport};
use crate::types::{CompletionRequest, Job, WebSearchOptions};
use std::sync::Arc;
use tracing::info;

/// Outcome of one `run_research` call.
#[derive(Debug)]
pub enum ResearchOutcome {
    /// The synchronous loop produced a full report.
    Report(Box<ResearchReport>),
    /// The request ran as a background job. The snapshot is terminal when
    /// the call waited for completion, non-terminal when it only submitted;
    /// in the latter case the job id is what the caller resumes with.
    Background(Job),
}

/// Facade over the research engine and the background-job manager.
///
/// Holds no request-scoped state: every call builds its own evidence set,
/// trace, and poll window, so one service can serve many concurrent
/// requests.
pub struct ResearchService {
    provider: Arc<dyn CompletionProvider>,
    config: EngineConfig,
}

impl ResearchService {
    /// Create a service backed by the real provider client.
    pub fn new(config: EngineConfig) -> Result<Self> {
        let client = ResponsesClient::new(&config).map_err(crate::error::InquestError::Config)?;
        Ok(Self::with_provider(config, Arc::new(client)))
    }

    /// Create a service with an explicit provider (fakes in tests).
    pub fn with_provider(config: EngineConfig, provider: Arc<dyn CompletionProvider>) -> Self {
        Self { provider, config }
    }

    /// Run a research request to completion or submission.
    pub async fn run_research(
        &self,
        question: &str,
        options: &RequestOptions,
    ) -> Result<ResearchOutcome> {
        let model = options
            .model
            .clone()
            .unwrap_or_else(|| self.config.default_model.clone());
        let info = models::model_info(&model);
        let options = options.normalized(info.background_only);

        if info.background_only || (options.background && info.supports_background) {
            let request = deep_research_request(&model, question, &options);
            let manager = BackgroundJobManager::new(self.provider.clone());
            if options.background {
                info!(model = %model, "Submitting background research job");
                let job = manager.submit(&request).await?;
                return Ok(ResearchOutcome::Background(job));
            }
            info!(model = %model, "Running background research job to completion");
            let job = manager.submit_and_wait(&request).await?;
            return Ok(ResearchOutcome::Background(job));
        }

        let engine = ResearchEngine::new(self.provider.clone(), self.config.clone());
        let report = engine.run(question, &options).await?;
        Ok(ResearchOutcome::Report(Box::new(report)))
    }

    /// Resume a background job from its id alone, polling to terminal.
    pub async fn resume_job(&self, job_id: &str) -> Result<Job> {
        BackgroundJobManager::new(self.provider.clone())
            .resume(job_id)
            .await
    }

    /// One status fetch for a background job.
    pub async fn job_status(&self, job_id: &str) -> Result<Job> {
        BackgroundJobManager::new(self.provider.clone())
            .status(job_id)
            .await
    }

    /// Request cancellation of a background job.
    pub async fn cancel_job(&self, job_id: &str) -> Result<Job> {
        BackgroundJobManager::new(self.provider.clone())
            .cancel(job_id)
            .await
    }
}

/// Build the single-call request the background path submits.
fn deep_research_request(
    model: &str,
    question: &str,
    options: &RequestOptions,
) -> CompletionRequest {
    let mut request = CompletionRequest::new(
        model,
        format!(
            "Research the following question and produce a thorough, fully \
             cited answer. Name the source URL for every claim.\n\n\
             Question: {question}"
        ),
    );
    request.instructions = options.instructions.clone();
    request.temperature = options.temperature;
    request.top_p = options.top_p;
    request.max_output_tokens = options.max_output_tokens;
    request.reasoning_effort = options.reasoning_effort;
    request.reasoning_summary = options.reasoning_summary;
    request.web_search = Some(WebSearchOptions {
        context_size: options.web_context_size,
        user_location: options.user_location.clone(),
    });
    request.code_interpreter = options.code_interpreter;
    request.max_tool_calls = options.max_tool_calls;
    request.store = options.store;
    request.max_retries = options.max_retries;
    request.background = true;
    request
}
