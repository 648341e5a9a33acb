//! Research pipeline — multi-round search orchestration.
//!
//! Drives a bounded loop of stages against the remote provider:
//! 1. **Plan** — turn the question into queries and stop conditions
//! 2. **Search** — run one query through provider-side web search
//! 3. **Extract** — pull attributed facts and conflicts out of the evidence
//! 4. **Synthesize** — draft a cited answer from the ranked facts
//! 5. **Validate** — check the draft against the facts, revising if needed
//!
//! Evidence accumulates across rounds in an [`evidence::EvidenceSet`];
//! stop conditions decide when coverage is good enough.

pub mod engine;
pub mod evidence;
pub mod extract;
pub mod parse;
pub mod plan;
pub mod search;
pub mod synthesis;

pub use engine::{ResearchEngine, ResearchPhase, ResearchReport, RoundSummary, StopReason};
pub use evidence::{Conflict, EvidenceSet, Fact};
pub use plan::{ResearchPlan, StopCondition};
pub use synthesis::Validation;

use crate::config::RequestOptions;
use crate::provider::CompletionProvider;
use crate::types::CompletionRequest;

/// Shared per-request context handed to every stage.
pub(crate) struct StageContext<'a> {
    pub provider: &'a dyn CompletionProvider,
    pub model: &'a str,
    /// Normalized request options.
    pub options: &'a RequestOptions,
}

impl StageContext<'_> {
    /// Build the base request for one stage call.
    ///
    /// The caller's sampling overrides win; otherwise the stage's default
    /// temperature applies.
    pub(crate) fn request(&self, input: String, default_temperature: f32) -> CompletionRequest {
        let mut request = CompletionRequest::new(self.model, input);
        request.instructions = self.options.instructions.clone();
        request.temperature = Some(
            self.options
                .temperature
                .unwrap_or(default_temperature),
        );
        request.top_p = self.options.top_p;
        request.max_output_tokens = self.options.max_output_tokens;
        request.reasoning_effort = self.options.reasoning_effort;
        request.reasoning_summary = self.options.reasoning_summary;
        request.store = self.options.store;
        request.max_retries = self.options.max_retries;
        request
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MockProvider;

    #[test]
    fn test_stage_request_applies_options() {
        let mock = MockProvider::new();
        let options = RequestOptions {
            temperature: Some(0.9),
            instructions: Some("cite carefully".into()),
            ..Default::default()
        };
        let ctx = StageContext {
            provider: &mock,
            model: "gpt-4o",
            options: &options,
        };
        let request = ctx.request("input".into(), 0.2);
        assert_eq!(request.temperature, Some(0.9));
        assert_eq!(request.instructions.as_deref(), Some("cite carefully"));
        assert_eq!(request.model, "gpt-4o");
    }

    #[test]
    fn test_stage_request_default_temperature() {
        let mock = MockProvider::new();
        let options = RequestOptions::default();
        let ctx = StageContext {
            provider: &mock,
            model: "gpt-4o",
            options: &options,
        };
        assert_eq!(ctx.request("x".into(), 0.2).temperature, Some(0.2));
    }
}
