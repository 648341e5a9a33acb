//! Search stage: one query through provider-side web search.
//!
//! Produces an evidence blob for the extraction stage: the model's free-text
//! findings followed by one line per search-result item.

use super::StageContext;
use crate::error::ProviderError;
use crate::types::{SearchResult, WebSearchOptions};

const SEARCH_TEMPERATURE: f32 = 0.2;

/// Output of one search round.
#[derive(Debug, Clone)]
pub struct SearchFindings {
    /// The model's free-text summary of what it found.
    pub summary: String,
    /// Search-result items surfaced by the web search tool, document order.
    pub results: Vec<SearchResult>,
}

impl SearchFindings {
    /// Assemble the evidence blob the extraction stage consumes: summary
    /// first, then one `- url [title] snippet` line per result.
    pub fn evidence_blob(&self) -> String {
        let mut blob = self.summary.clone();
        for result in &self.results {
            if !blob.is_empty() {
                blob.push('\n');
            }
            blob.push_str(&format!(
                "- {} [{}] {}",
                result.url, result.title, result.snippet
            ));
        }
        blob
    }
}

fn search_prompt(query: &str) -> String {
    format!(
        "Search the web for: {query}\n\n\
         Report everything relevant you find as plain text. For each claim, \
         name the source URL it came from. Include publication dates when \
         the source states them. Do not speculate beyond what the sources say."
    )
}

/// Run the search stage for one query.
pub(crate) async fn search(
    ctx: &StageContext<'_>,
    query: &str,
) -> Result<SearchFindings, ProviderError> {
    let mut request = ctx.request(search_prompt(query), SEARCH_TEMPERATURE);
    request.web_search = Some(WebSearchOptions {
        context_size: ctx.options.web_context_size,
        user_location: ctx.options.user_location.clone(),
    });

    let response = ctx.provider.complete(&request).await?;
    Ok(SearchFindings {
        summary: response.text,
        results: response.search_results,
    })
}
