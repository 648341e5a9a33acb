//! HTTP client for the provider's responses API.
//!
//! One endpoint family covers both paths the engine uses: POST for
//! completions (optionally with the background flag), GET for background
//! job status, and POST to the cancel sub-resource.

use crate::config::{EngineConfig, RetryConfig};
use crate::error::{ConfigError, ProviderError};
use crate::provider::{with_retry, CompletionProvider};
use crate::types::{
    CompletionRequest, CompletionResponse, Job, JobErrorDetail, JobStatus, SearchResult,
};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

/// Per-attempt HTTP timeout.
const REQUEST_TIMEOUT_SECS: u64 = 300;

/// Client for the remote responses API.
pub struct ResponsesClient {
    client: Client,
    base_url: String,
    api_key: String,
    retry: RetryConfig,
}

impl ResponsesClient {
    /// Create a client from engine configuration.
    ///
    /// Resolves the API key from the config value or the configured
    /// environment variable.
    pub fn new(config: &EngineConfig) -> Result<Self, ConfigError> {
        let api_key = config.resolve_api_key()?;
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| ConfigError::Invalid {
                message: format!("Failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            retry: config.retry.clone(),
        })
    }

    /// Build the wire request body.
    fn request_body(request: &CompletionRequest) -> Value {
        let mut body = json!({
            "model": request.model,
            "input": request.input,
            "store": request.store,
        });

        if let Some(ref instructions) = request.instructions {
            body["instructions"] = json!(instructions);
        }
        if let Some(temperature) = request.temperature {
            body["temperature"] = json!(temperature);
        }
        if let Some(top_p) = request.top_p {
            body["top_p"] = json!(top_p);
        }
        if let Some(max_output_tokens) = request.max_output_tokens {
            body["max_output_tokens"] = json!(max_output_tokens);
        }
        if request.reasoning_effort.is_some() || request.reasoning_summary.is_some() {
            let mut reasoning = json!({});
            if let Some(effort) = request.reasoning_effort {
                reasoning["effort"] = json!(effort.to_string());
            }
            if let Some(summary) = request.reasoning_summary {
                reasoning["summary"] = json!(summary.to_string());
            }
            body["reasoning"] = reasoning;
        }

        let mut tools = Vec::new();
        if let Some(ref search) = request.web_search {
            let mut tool = json!({
                "type": "web_search",
                "search_context_size": search.context_size.to_string(),
            });
            if let Some(ref location) = search.user_location {
                let mut loc = json!({ "type": "approximate" });
                if let Some(ref country) = location.country {
                    loc["country"] = json!(country);
                }
                if let Some(ref city) = location.city {
                    loc["city"] = json!(city);
                }
                if let Some(ref region) = location.region {
                    loc["region"] = json!(region);
                }
                if let Some(ref timezone) = location.timezone {
                    loc["timezone"] = json!(timezone);
                }
                tool["user_location"] = loc;
            }
            tools.push(tool);
        }
        if request.code_interpreter {
            tools.push(json!({
                "type": "code_interpreter",
                "container": { "type": "auto" },
            }));
        }
        if !tools.is_empty() {
            body["tools"] = json!(tools);
        }
        if let Some(max_tool_calls) = request.max_tool_calls {
            body["max_tool_calls"] = json!(max_tool_calls);
        }
        if request.background {
            body["background"] = json!(true);
        }

        body
    }

    /// Normalize a provider response body.
    ///
    /// Text is the newline-joined concatenation of every `output_text`
    /// segment in document order; search results are flattened out of all
    /// tool-call segments that carry them.
    fn parse_response(body: &Value) -> CompletionResponse {
        let mut segments: Vec<&str> = Vec::new();
        let mut search_results = Vec::new();

        if let Some(output) = body.get("output").and_then(|o| o.as_array()) {
            for item in output {
                let item_type = item.get("type").and_then(|t| t.as_str()).unwrap_or("");
                match item_type {
                    "message" => {
                        if let Some(parts) = item.get("content").and_then(|c| c.as_array()) {
                            for part in parts {
                                if part.get("type").and_then(|t| t.as_str()) == Some("output_text")
                                {
                                    if let Some(text) = part.get("text").and_then(|t| t.as_str()) {
                                        segments.push(text);
                                    }
                                }
                            }
                        }
                    }
                    _ => {
                        // Tool-call segments may embed search-result items.
                        if let Some(results) = item.get("results").and_then(|r| r.as_array()) {
                            for entry in results {
                                if let Some(url) = entry.get("url").and_then(|u| u.as_str()) {
                                    search_results.push(SearchResult {
                                        url: url.to_string(),
                                        title: entry
                                            .get("title")
                                            .and_then(|t| t.as_str())
                                            .unwrap_or_default()
                                            .to_string(),
                                        snippet: entry
                                            .get("snippet")
                                            .and_then(|s| s.as_str())
                                            .unwrap_or_default()
                                            .to_string(),
                                    });
                                }
                            }
                        }
                    }
                }
            }
        }

        CompletionResponse {
            text: segments.join("\n").trim().to_string(),
            search_results,
            response_id: body
                .get("id")
                .and_then(|i| i.as_str())
                .map(|s| s.to_string()),
        }
    }

    /// Parse a response body into a background-job snapshot.
    fn parse_job(body: &Value) -> Result<Job, ProviderError> {
        let id = body
            .get("id")
            .and_then(|i| i.as_str())
            .ok_or_else(|| ProviderError::Parse {
                message: "Job response has no id".to_string(),
            })?
            .to_string();

        let status_str = body.get("status").and_then(|s| s.as_str()).unwrap_or("");
        let status = match status_str {
            "queued" => JobStatus::Queued,
            "in_progress" => JobStatus::InProgress,
            "completed" => JobStatus::Completed,
            "failed" => JobStatus::Failed,
            "cancelled" => JobStatus::Cancelled,
            other => {
                warn!(job_id = %id, status = other, "Unrecognized job status, treating as in_progress");
                JobStatus::InProgress
            }
        };

        let error = body
            .get("error")
            .filter(|e| !e.is_null())
            .map(|e| JobErrorDetail {
                code: e.get("code").and_then(|c| c.as_str()).map(String::from),
                message: e.get("message").and_then(|m| m.as_str()).map(String::from),
            });

        let raw_result = if status == JobStatus::Completed {
            Some(body.clone())
        } else {
            None
        };

        Ok(Job {
            id,
            status,
            error,
            raw_result,
        })
    }

    /// Map an HTTP error status to the appropriate ProviderError.
    fn map_http_error(status: u16, body: &str) -> ProviderError {
        match status {
            401 | 403 => ProviderError::Auth {
                message: extract_error_message(body)
                    .unwrap_or_else(|| format!("HTTP {status}")),
            },
            429 => ProviderError::RateLimited {
                retry_after_secs: extract_retry_after_secs(body).unwrap_or(5),
            },
            s if s >= 500 => ProviderError::Server {
                status: s,
                message: extract_error_message(body).unwrap_or_else(|| body.to_string()),
            },
            s => ProviderError::Request {
                status: s,
                message: extract_error_message(body).unwrap_or_else(|| body.to_string()),
            },
        }
    }

    /// Map a transport-level failure.
    fn map_transport_error(e: reqwest::Error) -> ProviderError {
        if e.is_timeout() {
            ProviderError::Timeout {
                timeout_secs: REQUEST_TIMEOUT_SECS,
            }
        } else {
            ProviderError::Connection {
                message: e.to_string(),
            }
        }
    }

    /// Retry policy for one request, honoring a per-request override.
    fn retry_for(&self, request: &CompletionRequest) -> RetryConfig {
        let mut retry = self.retry.clone();
        if let Some(max_retries) = request.max_retries {
            retry.max_retries = max_retries;
        }
        retry
    }

    /// One POST attempt to the responses endpoint; returns the parsed body.
    async fn post_once(&self, body: &Value) -> Result<Value, ProviderError> {
        let url = format!("{}/responses", self.base_url);
        debug!(url = %url, model = %body["model"], "Sending completion request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(Self::map_transport_error)?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(Self::map_transport_error)?;

        if !(200..300).contains(&status) {
            return Err(Self::map_http_error(status, &text));
        }

        serde_json::from_str(&text).map_err(|e| ProviderError::Parse {
            message: format!("Invalid JSON in response body: {e}"),
        })
    }

    /// One GET or cancel-POST attempt against a job sub-resource.
    async fn job_request_once(&self, job_id: &str, cancel: bool) -> Result<Value, ProviderError> {
        let url = if cancel {
            format!("{}/responses/{}/cancel", self.base_url, job_id)
        } else {
            format!("{}/responses/{}", self.base_url, job_id)
        };

        let builder = if cancel {
            self.client.post(&url)
        } else {
            self.client.get(&url)
        };
        let response = builder
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(Self::map_transport_error)?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(Self::map_transport_error)?;

        if !(200..300).contains(&status) {
            return Err(Self::map_http_error(status, &text));
        }

        serde_json::from_str(&text).map_err(|e| ProviderError::Parse {
            message: format!("Invalid JSON in job body: {e}"),
        })
    }
}

#[async_trait]
impl CompletionProvider for ResponsesClient {
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        let body = Self::request_body(request);
        let retry = self.retry_for(request);
        let parsed = with_retry(&retry, || self.post_once(&body)).await?;
        Ok(Self::parse_response(&parsed))
    }

    async fn submit(&self, request: &CompletionRequest) -> Result<Job, ProviderError> {
        let mut background = request.clone();
        background.background = true;
        let body = Self::request_body(&background);
        let retry = self.retry_for(request);
        let parsed = with_retry(&retry, || self.post_once(&body)).await?;
        Self::parse_job(&parsed)
    }

    // Polling errors are counted by the job manager's consecutive-error
    // bound; a status fetch is therefore a single attempt.
    async fn fetch_job(&self, job_id: &str) -> Result<Job, ProviderError> {
        let parsed = self.job_request_once(job_id, false).await?;
        Self::parse_job(&parsed)
    }

    async fn cancel_job(&self, job_id: &str) -> Result<Job, ProviderError> {
        let parsed = self.job_request_once(job_id, true).await?;
        Self::parse_job(&parsed)
    }
}

/// Pull a human-readable message out of the provider's JSON error envelope.
fn extract_error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .get("error")?
        .get("message")?
        .as_str()
        .map(String::from)
}

/// Extract a retry-after hint from a 429 error envelope.
///
/// Checks a structured `retry_after` field first, then falls back to the
/// "try again in Ns" phrasing some providers put in the message.
fn extract_retry_after_secs(body: &str) -> Option<u64> {
    let value: Value = serde_json::from_str(body).ok()?;
    let error = value.get("error")?;
    if let Some(secs) = error.get("retry_after").and_then(|r| r.as_u64()) {
        return Some(secs);
    }
    let message = error.get("message")?.as_str()?;
    message
        .split("in ")
        .last()
        .and_then(|s| s.trim_end_matches('.').trim_end_matches('s').parse().ok())
}
