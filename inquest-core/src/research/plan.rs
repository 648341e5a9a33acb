//! Planning stage: question -> research plan.
//!
//! One provider call produces an ordered query list, must-answer
//! sub-questions, source-type hints, and the stop conditions for the loop.
//! Parse failure never aborts the pipeline; it degrades to a single-query
//! fallback plan.

use super::parse::parse_payload;
use super::StageContext;
use crate::error::ProviderError;
use serde::{Deserialize, Serialize};
use tracing::warn;

const PLAN_TEMPERATURE: f32 = 0.3;

/// Thresholds that decide when the loop has gathered enough evidence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StopCondition {
    /// Distinct source URLs needed for coverage.
    pub min_distinct_sources: usize,
    /// Accumulated facts needed for coverage.
    pub min_facts: usize,
    /// Consecutive low-yield rounds tolerated before stopping.
    pub no_new_facts_round_limit: usize,
}

impl Default for StopCondition {
    fn default() -> Self {
        Self {
            min_distinct_sources: 3,
            min_facts: 8,
            no_new_facts_round_limit: 2,
        }
    }
}

/// Output of the planning stage. Created once per request, read-only after.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ResearchPlan {
    /// Ordered search queries, reused cyclically when rounds exceed them.
    pub queries: Vec<String>,
    /// Sub-questions the final answer must address.
    pub must_answer: Vec<String>,
    /// Source types to prefer (hints for the search stage).
    pub prefer_sources: Vec<String>,
    /// Source types to avoid.
    pub avoid_sources: Vec<String>,
    /// Stop conditions for the research loop.
    pub stop: StopCondition,
}

impl Default for ResearchPlan {
    fn default() -> Self {
        Self {
            queries: Vec::new(),
            must_answer: Vec::new(),
            prefer_sources: Vec::new(),
            avoid_sources: Vec::new(),
            stop: StopCondition::default(),
        }
    }
}

impl ResearchPlan {
    /// The hardcoded fallback: one query, the question verbatim.
    pub fn fallback(question: &str) -> Self {
        Self {
            queries: vec![question.to_string()],
            ..Default::default()
        }
    }

    /// Drop blank queries; degrade to the fallback when nothing usable
    /// remains.
    fn sanitized(mut self, question: &str) -> Self {
        self.queries = self
            .queries
            .into_iter()
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .collect();
        if self.queries.is_empty() {
            warn!("Plan contained no usable queries, falling back to the question");
            return Self::fallback(question);
        }
        self
    }

    /// Query for a 1-based round, cycling when rounds exceed the list.
    pub fn query_for_round(&self, round: usize) -> &str {
        &self.queries[(round - 1) % self.queries.len()]
    }
}

fn plan_prompt(question: &str) -> String {
    format!(
        "You are planning a web research session.\n\
         Research question: {question}\n\n\
         Produce a JSON object with exactly these keys:\n\
         - \"queries\": 6 to 10 distinct web search queries, ordered from broad to specific\n\
         - \"must_answer\": sub-questions a complete answer has to address\n\
         - \"prefer_sources\": source types to favor (e.g. \"government\", \"peer-reviewed\")\n\
         - \"avoid_sources\": source types to avoid\n\
         - \"stop\": an object with integer keys \"min_distinct_sources\", \"min_facts\", \
         \"no_new_facts_round_limit\"\n\n\
         Respond with the JSON object only."
    )
}

/// Run the planning stage.
///
/// Provider failures propagate; parse failures degrade to
/// [`ResearchPlan::fallback`].
pub(crate) async fn plan(
    ctx: &StageContext<'_>,
    question: &str,
) -> Result<ResearchPlan, ProviderError> {
    let request = ctx.request(plan_prompt(question), PLAN_TEMPERATURE);
    let response = ctx.provider.complete(&request).await?;

    match parse_payload::<ResearchPlan>(&response.text) {
        Some(plan) => Ok(plan.sanitized(question)),
        None => {
            warn!("Plan stage output was not parseable JSON, using fallback plan");
            Ok(ResearchPlan::fallback(question))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RequestOptions;
    use crate::provider::MockProvider;

    fn ctx<'a>(mock: &'a MockProvider, options: &'a RequestOptions) -> StageContext<'a> {
        StageContext {
            provider: mock,
            model: "gpt-4o",
            options,
        }
    }

    #[test]
    fn test_default_stop_condition() {
        let stop = StopCondition::default();
        assert_eq!(stop.min_distinct_sources, 3);
        assert_eq!(stop.min_facts, 8);
        assert_eq!(stop.no_new_facts_round_limit, 2);
    }

    #[test]
    fn test_query_cycling() {
        let plan = ResearchPlan {
            queries: vec!["a".into(), "b".into(), "c".into()],
            ..Default::default()
        };
        assert_eq!(plan.query_for_round(1), "a");
        assert_eq!(plan.query_for_round(3), "c");
        assert_eq!(plan.query_for_round(4), "a");
    }

    #[tokio::test]
    async fn test_plan_parses_model_output() {
        let mock = MockProvider::new();
        mock.queue_text(
            r#"Here is your plan:
            {"queries": ["rust async history", "tokio design"],
             "must_answer": ["when was async/await stabilized"],
             "prefer_sources": ["official docs"],
             "avoid_sources": ["social media"],
             "stop": {"min_distinct_sources": 4, "min_facts": 10, "no_new_facts_round_limit": 2}}"#,
        );
        let options = RequestOptions::default();
        let plan = plan(&ctx(&mock, &options), "How did Rust async evolve?")
            .await
            .unwrap();
        assert_eq!(plan.queries.len(), 2);
        assert_eq!(plan.stop.min_facts, 10);
    }

    #[tokio::test]
    async fn test_plan_falls_back_on_parse_failure() {
        let mock = MockProvider::new();
        mock.queue_text("I could not produce a plan, sorry.");
        let options = RequestOptions::default();
        let plan = plan(&ctx(&mock, &options), "What is X?").await.unwrap();
        assert_eq!(plan.queries, vec!["What is X?".to_string()]);
        assert_eq!(plan.stop, StopCondition::default());
    }

    #[tokio::test]
    async fn test_plan_falls_back_on_empty_queries() {
        let mock = MockProvider::new();
        mock.queue_text(r#"{"queries": ["", "   "]}"#);
        let options = RequestOptions::default();
        let plan = plan(&ctx(&mock, &options), "What is X?").await.unwrap();
        assert_eq!(plan.queries, vec!["What is X?".to_string()]);
    }

    #[tokio::test]
    async fn test_plan_propagates_provider_error() {
        let mock = MockProvider::new();
        mock.queue_completion_error(crate::error::ProviderError::Request {
            status: 400,
            message: "bad".into(),
        });
        let options = RequestOptions::default();
        assert!(plan(&ctx(&mock, &options), "Q").await.is_err());
    }
}
