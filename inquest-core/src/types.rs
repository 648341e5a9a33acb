//! Core type definitions shared across the Inquest engine.
//!
//! Defines the normalized request/response pair exchanged with the remote
//! completion provider and the background-job snapshot types.

use crate::config::{ReasoningEffort, ReasoningSummary, UserLocation, WebContextSize};
use serde::{Deserialize, Serialize};

/// A single normalized request to the remote completion provider.
///
/// Carries everything one outbound call needs: the model, the input payload,
/// the enabled capabilities, and the stage-specific sampling options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Model identifier (e.g. "gpt-4o", "o4-mini-deep-research").
    pub model: String,
    /// The prompt/input payload.
    pub input: String,
    /// Optional free-text system instructions.
    pub instructions: Option<String>,
    /// Sampling temperature, if overridden for this call.
    pub temperature: Option<f32>,
    /// Nucleus sampling parameter, if overridden.
    pub top_p: Option<f32>,
    /// Maximum tokens to generate.
    pub max_output_tokens: Option<u32>,
    /// Reasoning effort for reasoning-capable models.
    pub reasoning_effort: Option<ReasoningEffort>,
    /// Reasoning summary verbosity.
    pub reasoning_summary: Option<ReasoningSummary>,
    /// Enable the provider-side web search tool.
    pub web_search: Option<WebSearchOptions>,
    /// Enable the provider-side code execution tool.
    pub code_interpreter: bool,
    /// Run as a background job instead of waiting for the response.
    pub background: bool,
    /// Budget of provider-side tool invocations for this call.
    pub max_tool_calls: Option<u32>,
    /// Whether the provider should store the response.
    pub store: bool,
    /// Per-request override of the retry bound (client-level policy otherwise).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
}

impl CompletionRequest {
    /// Create a minimal text-in request for the given model.
    pub fn new(model: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            input: input.into(),
            instructions: None,
            temperature: None,
            top_p: None,
            max_output_tokens: None,
            reasoning_effort: None,
            reasoning_summary: None,
            web_search: None,
            code_interpreter: false,
            background: false,
            max_tool_calls: None,
            store: true,
            max_retries: None,
        }
    }

    /// Attach system instructions.
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Enable web search with the given options.
    pub fn with_web_search(mut self, options: WebSearchOptions) -> Self {
        self.web_search = Some(options);
        self
    }
}

/// Options for the provider-side web search tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebSearchOptions {
    /// How much retrieved context the provider should feed the model.
    pub context_size: WebContextSize,
    /// Optional approximate user location for localized results.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_location: Option<UserLocation>,
}

/// A normalized provider response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// All text-bearing output segments, in order, newline-joined and trimmed.
    pub text: String,
    /// Search-result items found in tool-call output, flattened in document order.
    pub search_results: Vec<SearchResult>,
    /// Provider response id, when present.
    pub response_id: Option<String>,
}

impl CompletionResponse {
    /// A plain-text response with no tool output.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            search_results: Vec::new(),
            response_id: None,
        }
    }
}

/// One search-result item surfaced by the provider's web search tool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub snippet: String,
}

/// Lifecycle status of a background job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Queued,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Whether no further transition can occur from this status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "queued"),
            JobStatus::InProgress => write!(f, "in_progress"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
            JobStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Machine-readable error detail attached to a failed job by the provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobErrorDetail {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// One snapshot of a background remote operation.
///
/// Created by submission, mutated only by polling responses. A job may
/// outlive the process that created it: everything needed to resume is the
/// `id` alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Opaque provider-assigned job identifier.
    pub id: String,
    /// Current lifecycle status.
    pub status: JobStatus,
    /// Provider error detail, present on failed jobs.
    #[serde(default)]
    pub error: Option<JobErrorDetail>,
    /// Raw provider result payload, present once the job completed.
    #[serde(default)]
    pub raw_result: Option<serde_json::Value>,
}

impl Job {
    /// Extract the final answer text from a completed job's raw result.
    ///
    /// Concatenates all text-bearing output segments the same way the
    /// synchronous path normalizes responses. Returns `None` when the job
    /// has no stored result.
    pub fn output_text(&self) -> Option<String> {
        let raw = self.raw_result.as_ref()?;
        let output = raw.get("output")?.as_array()?;
        let mut segments = Vec::new();
        for item in output {
            if item.get("type").and_then(|t| t.as_str()) != Some("message") {
                continue;
            }
            let Some(parts) = item.get("content").and_then(|c| c.as_array()) else {
                continue;
            };
            for part in parts {
                if part.get("type").and_then(|t| t.as_str()) == Some("output_text") {
                    if let Some(text) = part.get("text").and_then(|t| t.as_str()) {
                        segments.push(text);
                    }
                }
            }
        }
        if segments.is_empty() {
            None
        } else {
            Some(segments.join("\n").trim().to_string())
        }
    }
}
