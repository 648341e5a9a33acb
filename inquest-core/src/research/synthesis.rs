//! Synthesis and validation stages.
//!
//! Synthesis drafts a cited answer from the ranked facts; validation checks
//! the draft against the same facts and revises it when unsupported. The
//! engine keeps the draft whenever validation reports it supported.

use super::evidence::{Conflict, Fact};
use super::parse::parse_payload;
use super::StageContext;
use crate::error::ProviderError;
use serde::{Deserialize, Serialize};
use tracing::warn;

const SYNTHESIZE_TEMPERATURE: f32 = 0.4;
const VALIDATE_TEMPERATURE: f32 = 0.0;

/// Output of the validation stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Validation {
    /// Whether the draft is fully supported by the supplied facts.
    pub supported: bool,
    /// Problems the validator found.
    pub issues: Vec<String>,
    /// Corrected answer, used when the draft is unsupported.
    pub revised_answer: String,
}

impl Default for Validation {
    fn default() -> Self {
        Self {
            supported: false,
            issues: Vec::new(),
            revised_answer: String::new(),
        }
    }
}

impl Validation {
    /// The documented parse-failure fallback: unsupported, draft preserved.
    pub fn parse_failure(draft: &str) -> Self {
        Self {
            supported: false,
            issues: vec!["parse failure".to_string()],
            revised_answer: draft.to_string(),
        }
    }
}

/// Render the ranked fact table handed to synthesis and validation.
///
/// Ids are 1-indexed in rank order and match the `[F{n}]` citation markers
/// the synthesizer is instructed to use.
pub fn fact_table(facts: &[Fact]) -> String {
    facts
        .iter()
        .enumerate()
        .map(|(i, f)| {
            format!(
                "[F{}] (trust {}/5, confidence {}/5) {} (source: {})",
                i + 1,
                f.source_quality,
                f.confidence,
                f.text,
                f.source_url
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn conflict_table(conflicts: &[Conflict]) -> String {
    if conflicts.is_empty() {
        return "none".to_string();
    }
    conflicts
        .iter()
        .map(|c| {
            format!(
                "- {}: \"{}\" ({}) vs \"{}\" ({})",
                c.topic, c.claim_a, c.source_a, c.claim_b, c.source_b
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn synthesize_prompt(question: &str, facts: &[Fact], conflicts: &[Conflict]) -> String {
    format!(
        "Research question: {question}\n\n\
         Facts, ranked by source trust:\n{}\n\n\
         Known conflicts between sources:\n{}\n\n\
         Write an answer to the research question using ONLY the facts \
         above. Cite every claim inline with its fact id, e.g. [F1] or \
         [F2][F5]. Where the conflicts list shows contradictory claims on a \
         topic, state both sides explicitly and cite both facts. Do not \
         introduce information that is not in the fact list.",
        fact_table(facts),
        conflict_table(conflicts)
    )
}

fn validate_prompt(question: &str, facts: &[Fact], draft: &str) -> String {
    format!(
        "Research question: {question}\n\n\
         Fact list:\n{}\n\n\
         Draft answer:\n{draft}\n\n\
         Check whether every claim in the draft is supported by the fact \
         list and correctly cited. Produce a JSON object with exactly these \
         keys:\n\
         - \"supported\": true if the draft is fully supported, else false\n\
         - \"issues\": a list of strings describing each unsupported or \
         miscited claim\n\
         - \"revised_answer\": the corrected answer (repeat the draft \
         verbatim when supported is true)\n\n\
         Respond with the JSON object only.",
        fact_table(facts)
    )
}

/// Run the synthesis stage; returns the draft answer.
pub(crate) async fn synthesize(
    ctx: &StageContext<'_>,
    question: &str,
    facts: &[Fact],
    conflicts: &[Conflict],
) -> Result<String, ProviderError> {
    let request = ctx.request(
        synthesize_prompt(question, facts, conflicts),
        SYNTHESIZE_TEMPERATURE,
    );
    let response = ctx.provider.complete(&request).await?;
    Ok(response.text)
}

/// Run the validation stage over a draft.
///
/// Parse failure degrades to [`Validation::parse_failure`], which keeps the
/// draft as the revised answer.
pub(crate) async fn validate(
    ctx: &StageContext<'_>,
    question: &str,
    facts: &[Fact],
    draft: &str,
) -> Result<Validation, ProviderError> {
    let request = ctx.request(validate_prompt(question, facts, draft), VALIDATE_TEMPERATURE);
    let response = ctx.provider.complete(&request).await?;

    match parse_payload::<Validation>(&response.text) {
        Some(validation) => Ok(validation),
        None => {
            warn!("Validation output was not parseable JSON, keeping the draft");
            Ok(Validation::parse_failure(draft))
        }
    }
}

/// Select the final answer: the draft when supported, otherwise the
/// validator's revision (falling back to the draft if the revision is
/// empty).
pub fn final_answer(validation: &Validation, draft: String) -> String {
    if validation.supported || validation.revised_answer.trim().is_empty() {
        draft
    } else {
        validation.revised_answer.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RequestOptions;
    use crate::provider::MockProvider;

    fn fact(text: &str, url: &str, confidence: u8) -> Fact {
        Fact::new(text, url, None, None, confidence)
    }

    fn ctx<'a>(mock: &'a MockProvider, options: &'a RequestOptions) -> StageContext<'a> {
        StageContext {
            provider: mock,
            model: "gpt-4o",
            options,
        }
    }

    #[test]
    fn test_fact_table_ids_are_one_indexed() {
        let facts = vec![
            fact("first", "https://a.edu/1", 4),
            fact("second", "https://b.edu/2", 3),
        ];
        let table = fact_table(&facts);
        assert!(table.contains("[F1] (trust 5/5, confidence 4/5) first"));
        assert!(table.contains("[F2]"));
        assert!(!table.contains("[F0]"));
    }

    #[tokio::test]
    async fn test_synthesize_returns_draft_text() {
        let mock = MockProvider::new();
        mock.queue_text("X is a thing [F1].");
        let options = RequestOptions::default();
        let facts = vec![fact("X is a thing", "https://a.edu/1", 4)];
        let draft = synthesize(&ctx(&mock, &options), "What is X?", &facts, &[])
            .await
            .unwrap();
        assert_eq!(draft, "X is a thing [F1].");
    }

    #[tokio::test]
    async fn test_validate_parses_verdict() {
        let mock = MockProvider::new();
        mock.queue_text(r#"{"supported": true, "issues": [], "revised_answer": "same"}"#);
        let options = RequestOptions::default();
        let validation = validate(&ctx(&mock, &options), "q", &[], "draft")
            .await
            .unwrap();
        assert!(validation.supported);
        assert!(validation.issues.is_empty());
    }

    #[tokio::test]
    async fn test_validate_fallback_preserves_draft() {
        let mock = MockProvider::new();
        mock.queue_text("nope");
        let options = RequestOptions::default();
        let validation = validate(&ctx(&mock, &options), "q", &[], "the draft")
            .await
            .unwrap();
        assert!(!validation.supported);
        assert_eq!(validation.issues, vec!["parse failure".to_string()]);
        assert_eq!(validation.revised_answer, "the draft");
    }

    #[test]
    fn test_final_answer_selection() {
        let supported = Validation {
            supported: true,
            issues: vec![],
            revised_answer: "revised".into(),
        };
        assert_eq!(final_answer(&supported, "draft".into()), "draft");

        let unsupported = Validation {
            supported: false,
            issues: vec!["bad cite".into()],
            revised_answer: "revised".into(),
        };
        assert_eq!(final_answer(&unsupported, "draft".into()), "revised");

        let empty_revision = Validation {
            supported: false,
            issues: vec![],
            revised_answer: "  ".into(),
        };
        assert_eq!(final_answer(&empty_revision, "draft".into()), "draft");
    }
}
