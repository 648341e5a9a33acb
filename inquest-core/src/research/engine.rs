//! Research engine — drives the bounded search/extract loop.
//!
//! One invocation owns its evidence set and trace; rounds run strictly
//! sequentially, each stage's output feeding the next. The loop stops on
//! the first stop condition to fire, in fixed priority order: fact budget,
//! coverage, stagnation, round budget.

use super::evidence::{self, Conflict, EvidenceSet, Fact};
use super::plan::ResearchPlan;
use super::synthesis::{self, Validation};
use super::{extract, plan, search, StageContext};
use crate::config::{EngineConfig, RequestOptions};
use crate::error::Result;
use crate::provider::{models, CompletionProvider};
use crate::trace::Trace;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// Current phase of a research invocation, recorded in the trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResearchPhase {
    Planning,
    Searching(usize),
    Extracting(usize),
    Synthesizing,
    Validating,
    Done,
}

impl std::fmt::Display for ResearchPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResearchPhase::Planning => write!(f, "planning"),
            ResearchPhase::Searching(round) => write!(f, "searching:{round}"),
            ResearchPhase::Extracting(round) => write!(f, "extracting:{round}"),
            ResearchPhase::Synthesizing => write!(f, "synthesizing"),
            ResearchPhase::Validating => write!(f, "validating"),
            ResearchPhase::Done => write!(f, "done"),
        }
    }
}

/// Why the search loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Accumulated facts reached the configured budget.
    FactBudget,
    /// Distinct-source and fact thresholds both met.
    Coverage,
    /// Too many consecutive rounds produced too few new facts.
    Stagnation,
    /// The round budget ran out before any condition fired.
    RoundBudget,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::FactBudget => write!(f, "fact budget reached"),
            StopReason::Coverage => write!(f, "coverage reached"),
            StopReason::Stagnation => write!(f, "stagnation"),
            StopReason::RoundBudget => write!(f, "round budget exhausted"),
        }
    }
}

/// Summary statistics for one search round.
#[derive(Debug, Clone, Serialize)]
pub struct RoundSummary {
    pub round: usize,
    pub query: String,
    /// Candidate facts the extraction stage produced.
    pub candidates: usize,
    /// Candidates that survived filtering.
    pub accepted: usize,
    /// Accepted facts that were new to the evidence set.
    pub new_facts: usize,
    pub total_facts: usize,
    pub distinct_sources: usize,
    pub conflicts: usize,
}

/// Final output of one research invocation.
#[derive(Debug, Clone, Serialize)]
pub struct ResearchReport {
    pub question: String,
    /// The validated final answer, with `[F{n}]` citations into `facts`.
    pub answer: String,
    /// Ranked fact table; fact ids are 1-indexed positions in this list.
    pub facts: Vec<Fact>,
    pub conflicts: Vec<Conflict>,
    pub plan: ResearchPlan,
    pub validation: Validation,
    pub stop_reason: StopReason,
    pub rounds: Vec<RoundSummary>,
    pub trace: Trace,
}

/// The research loop driver.
pub struct ResearchEngine {
    provider: Arc<dyn CompletionProvider>,
    config: EngineConfig,
}

impl ResearchEngine {
    pub fn new(provider: Arc<dyn CompletionProvider>, config: EngineConfig) -> Self {
        Self { provider, config }
    }

    /// Run the full pipeline for one question.
    ///
    /// Stage parse failures degrade to per-stage defaults and never abort;
    /// provider failures abort the whole invocation.
    pub async fn run(&self, question: &str, options: &RequestOptions) -> Result<ResearchReport> {
        let model = options
            .model
            .clone()
            .unwrap_or_else(|| self.config.default_model.clone());
        let options = options.normalized(models::model_info(&model).background_only);
        let ctx = StageContext {
            provider: self.provider.as_ref(),
            model: &model,
            options: &options,
        };

        let mut trace = Trace::new();
        trace.record(ResearchPhase::Planning.to_string(), question);
        let plan = plan::plan(&ctx, question).await?;
        trace.record(
            ResearchPhase::Planning.to_string(),
            format!("{} queries", plan.queries.len()),
        );

        let mut evidence = EvidenceSet::new();
        let mut rounds = Vec::new();
        let mut stagnant_rounds = 0usize;
        let mut stop_reason = StopReason::RoundBudget;

        for round in 1..=options.max_search_rounds {
            let query = plan.query_for_round(round).to_string();
            trace.record(ResearchPhase::Searching(round).to_string(), &query);
            let findings = search::search(&ctx, &query).await?;
            trace.record(
                ResearchPhase::Searching(round).to_string(),
                format!("{} search results", findings.results.len()),
            );

            let extraction = extract::extract(&ctx, question, &findings.evidence_blob()).await?;
            let candidates = extraction.facts.len();
            let accepted = evidence::filter_acceptable(extraction.facts, &options.force_domains);
            let accepted_count = accepted.len();
            let new_facts = evidence.merge_facts(accepted);
            evidence.add_conflicts(extraction.conflicts);

            let summary = RoundSummary {
                round,
                query,
                candidates,
                accepted: accepted_count,
                new_facts,
                total_facts: evidence.fact_count(),
                distinct_sources: evidence.distinct_sources(),
                conflicts: evidence.conflicts().len(),
            };
            trace.record(
                ResearchPhase::Extracting(round).to_string(),
                format!(
                    "{candidates} candidates, {accepted_count} accepted, {new_facts} new, {} total",
                    evidence.fact_count()
                ),
            );
            info!(
                round,
                new_facts,
                total = evidence.fact_count(),
                sources = evidence.distinct_sources(),
                "Search round complete"
            );
            rounds.push(summary);

            // Stop conditions, fixed priority: first true wins.
            if evidence.fact_count() >= options.max_facts {
                stop_reason = StopReason::FactBudget;
                break;
            }
            if evidence.distinct_sources() >= plan.stop.min_distinct_sources
                && evidence.fact_count() >= plan.stop.min_facts
            {
                stop_reason = StopReason::Coverage;
                break;
            }
            if new_facts < options.min_new_facts_per_round {
                stagnant_rounds += 1;
                if stagnant_rounds >= plan.stop.no_new_facts_round_limit {
                    stop_reason = StopReason::Stagnation;
                    break;
                }
            } else {
                stagnant_rounds = 0;
            }
        }
        trace.record("loop", format!("stopped: {stop_reason}"));

        let (facts, conflicts) = evidence.into_parts();
        let facts = evidence::rank(facts);
        trace.record(
            ResearchPhase::Synthesizing.to_string(),
            format!("{} facts, {} conflicts", facts.len(), conflicts.len()),
        );
        let draft = synthesis::synthesize(&ctx, question, &facts, &conflicts).await?;

        trace.record(ResearchPhase::Validating.to_string(), "checking draft");
        let validation = synthesis::validate(&ctx, question, &facts, &draft).await?;
        let answer = synthesis::final_answer(&validation, draft);
        trace.record(ResearchPhase::Done.to_string(), "");

        Ok(ResearchReport {
            question: question.to_string(),
            answer,
            facts,
            conflicts,
            plan,
            validation,
            stop_reason,
            rounds,
            trace,
        })
    }
}
