//! Extraction stage: evidence blob -> candidate facts and conflicts.
//!
//! Candidates are normalized ([`Fact::new`] derives source quality and
//! applies the low-trust confidence cap) but not yet filtered; the engine
//! filters and merges them. Parse failure degrades to empty lists.

use super::evidence::{Conflict, Fact};
use super::parse::parse_payload;
use super::StageContext;
use crate::error::ProviderError;
use serde::Deserialize;
use tracing::warn;

const EXTRACT_TEMPERATURE: f32 = 0.1;

/// Normalized output of one extraction call.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    /// Candidate facts, normalized but unfiltered.
    pub facts: Vec<Fact>,
    /// Conflicts with both claims present.
    pub conflicts: Vec<Conflict>,
}

/// Wire shape of the extraction payload, tolerant of missing fields.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawExtraction {
    facts: Vec<RawFact>,
    conflicts: Vec<Conflict>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawFact {
    claim: String,
    url: String,
    title: Option<String>,
    published: Option<String>,
    confidence: Option<u8>,
}

fn extract_prompt(question: &str, evidence: &str) -> String {
    format!(
        "Research question: {question}\n\n\
         Evidence gathered from web search:\n{evidence}\n\n\
         Extract atomic factual claims from the evidence above. Produce a \
         JSON object with exactly these keys:\n\
         - \"facts\": a list of objects with keys \"claim\" (one atomic \
         statement), \"url\" (the source URL it came from), \"title\" \
         (source title if stated, else omit), \"published\" (publication \
         date if stated, else omit), \"confidence\" (integer 1-5, how \
         strongly the source supports the claim)\n\
         - \"conflicts\": a list of objects with keys \"topic\", \
         \"claim_a\", \"source_a\", \"claim_b\", \"source_b\" for any pair \
         of sources that contradict each other\n\n\
         Only use claims actually present in the evidence. Never invent \
         URLs, titles, or dates. Respond with the JSON object only."
    )
}

/// Run the extraction stage over one round's evidence blob.
pub(crate) async fn extract(
    ctx: &StageContext<'_>,
    question: &str,
    evidence: &str,
) -> Result<Extraction, ProviderError> {
    let request = ctx.request(extract_prompt(question, evidence), EXTRACT_TEMPERATURE);
    let response = ctx.provider.complete(&request).await?;

    let Some(raw) = parse_payload::<RawExtraction>(&response.text) else {
        warn!("Extraction output was not parseable JSON, treating round as empty");
        return Ok(Extraction::default());
    };

    let facts = raw
        .facts
        .into_iter()
        .map(|f| {
            Fact::new(
                f.claim,
                f.url,
                f.title,
                f.published,
                f.confidence.unwrap_or(2),
            )
        })
        .collect();

    let conflicts = raw
        .conflicts
        .into_iter()
        .filter(|c| !c.claim_a.trim().is_empty() && !c.claim_b.trim().is_empty())
        .collect();

    Ok(Extraction { facts, conflicts })
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

    #[tokio::test]
    async fn test_extract_parses_facts_and_conflicts() {
        let mock = MockProvider::new();
        mock.queue_text(
            r#"{"facts": [
                 {"claim": "X was released in 2015", "url": "https://x.edu/page",
                  "title": "X history", "confidence": 4}
               ],
               "conflicts": [
                 {"topic": "release year", "claim_a": "2015", "source_a": "https://a.example",
                  "claim_b": "2016", "source_b": "https://b.example"}
               ]}"#,
        );
        let options = RequestOptions::default();
        let extraction = extract(&ctx(&mock, &options), "When was X released?", "blob")
            .await
            .unwrap();
        assert_eq!(extraction.facts.len(), 1);
        assert_eq!(extraction.facts[0].source_quality, 5);
        assert_eq!(extraction.facts[0].confidence, 4);
        assert_eq!(extraction.conflicts.len(), 1);
    }

    #[tokio::test]
    async fn test_extract_applies_confidence_cap() {
        let mock = MockProvider::new();
        mock.queue_text(
            r#"{"facts": [{"claim": "hot take", "url": "https://x.com/u/status/1", "confidence": 5}]}"#,
        );
        let options = RequestOptions::default();
        let extraction = extract(&ctx(&mock, &options), "q", "blob").await.unwrap();
        assert_eq!(extraction.facts[0].source_quality, 1);
        assert_eq!(extraction.facts[0].confidence, 3);
    }

    #[tokio::test]
    async fn test_extract_missing_confidence_defaults_low() {
        let mock = MockProvider::new();
        mock.queue_text(r#"{"facts": [{"claim": "c", "url": "https://a.example/1"}]}"#);
        let options = RequestOptions::default();
        let extraction = extract(&ctx(&mock, &options), "q", "blob").await.unwrap();
        assert_eq!(extraction.facts[0].confidence, 2);
    }

    #[tokio::test]
    async fn test_extract_fallback_on_parse_failure() {
        let mock = MockProvider::new();
        mock.queue_text("no json at all");
        let options = RequestOptions::default();
        let extraction = extract(&ctx(&mock, &options), "q", "blob").await.unwrap();
        assert!(extraction.facts.is_empty());
        assert!(extraction.conflicts.is_empty());
    }

    #[tokio::test]
    async fn test_extract_drops_incomplete_conflicts() {
        let mock = MockProvider::new();
        mock.queue_text(
            r#"{"facts": [], "conflicts": [{"topic": "t", "claim_a": "only one side"}]}"#,
        );
        let options = RequestOptions::default();
        let extraction = extract(&ctx(&mock, &options), "q", "blob").await.unwrap();
        assert!(extraction.conflicts.is_empty());
    }
}
