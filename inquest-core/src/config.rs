//! Configuration system for Inquest.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment.
//! Engine-level settings (provider endpoint, credentials, retry policy) live in
//! [`EngineConfig`]; per-request knobs live in [`RequestOptions`] and are
//! normalized with range clamping before a request runs.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;

/// Engine-level configuration: how to reach the provider and how to retry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Base URL of the provider API endpoint.
    pub base_url: String,
    /// Environment variable name containing the API key.
    pub api_key_env: String,
    /// Explicit API key; takes precedence over the env var when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Model used when a request does not name one.
    pub default_model: String,
    /// Retry policy for transient provider failures.
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            api_key: None,
            default_model: "gpt-4o".to_string(),
            retry: RetryConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration in layers: defaults, then an optional TOML file,
    /// then `INQUEST_`-prefixed environment variables.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(EngineConfig::default()));
        if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::FileNotFound {
                    path: path.to_path_buf(),
                });
            }
            figment = figment.merge(Toml::file(path));
        }
        figment
            .merge(Env::prefixed("INQUEST_"))
            .extract()
            .map_err(|e| ConfigError::ParseError {
                message: e.to_string(),
            })
    }

    /// Resolve the API key: explicit config value first, then the env var.
    pub fn resolve_api_key(&self) -> Result<String, ConfigError> {
        if let Some(ref key) = self.api_key {
            return Ok(key.clone());
        }
        std::env::var(&self.api_key_env).map_err(|_| ConfigError::EnvVarMissing {
            var: self.api_key_env.clone(),
        })
    }
}

/// Retry policy for transient provider errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum retry attempts after the initial call.
    pub max_retries: u32,
    /// Delay before the first retry, doubled on each subsequent attempt.
    pub initial_backoff_ms: u64,
    /// Upper bound on any single backoff delay.
    pub max_backoff_ms: u64,
    /// Multiplier applied per attempt.
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 1000,
            max_backoff_ms: 60_000,
            backoff_multiplier: 2.0,
        }
    }
}

/// Reasoning effort for reasoning-capable models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for ReasoningEffort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReasoningEffort::Low => write!(f, "low"),
            ReasoningEffort::Medium => write!(f, "medium"),
            ReasoningEffort::High => write!(f, "high"),
        }
    }
}

/// Verbosity of provider-generated reasoning summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningSummary {
    Auto,
    Concise,
    Detailed,
}

impl std::fmt::Display for ReasoningSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReasoningSummary::Auto => write!(f, "auto"),
            ReasoningSummary::Concise => write!(f, "concise"),
            ReasoningSummary::Detailed => write!(f, "detailed"),
        }
    }
}

/// How much retrieved web context the provider feeds the model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WebContextSize {
    Low,
    #[default]
    Medium,
    High,
}

impl std::fmt::Display for WebContextSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WebContextSize::Low => write!(f, "low"),
            WebContextSize::Medium => write!(f, "medium"),
            WebContextSize::High => write!(f, "high"),
        }
    }
}

/// Approximate user location passed to the web search tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserLocation {
    /// Two-letter country code, normalized to uppercase.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

impl UserLocation {
    /// Normalize the country to a 2-letter uppercase code; values that are
    /// not two ASCII letters are dropped rather than sent malformed.
    pub fn normalized(mut self) -> Self {
        self.country = self.country.and_then(|c| {
            let trimmed = c.trim().to_ascii_uppercase();
            if trimmed.len() == 2 && trimmed.chars().all(|ch| ch.is_ascii_alphabetic()) {
                Some(trimmed)
            } else {
                None
            }
        });
        self
    }
}

/// Per-request options recognized by the research boundary.
///
/// All numeric fields are clamped into their valid range by
/// [`RequestOptions::normalized`]; unset fields fall back to the documented
/// defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestOptions {
    /// Model identifier; the engine default is used when absent.
    pub model: Option<String>,
    /// Sampling temperature, clamped to 0.0..=2.0.
    pub temperature: Option<f32>,
    /// Nucleus sampling parameter, clamped to 0.0..=1.0.
    pub top_p: Option<f32>,
    /// Maximum output tokens, clamped to 16..=100_000.
    pub max_output_tokens: Option<u32>,
    /// Reasoning effort for reasoning-capable models.
    pub reasoning_effort: Option<ReasoningEffort>,
    /// Reasoning summary verbosity.
    pub reasoning_summary: Option<ReasoningSummary>,
    /// Free-text instructions prepended to every stage call.
    pub instructions: Option<String>,
    /// Search rounds bound, clamped to 1..=10.
    pub max_search_rounds: usize,
    /// Accumulated-fact budget, clamped to 5..=50.
    pub max_facts: usize,
    /// Per-round new-fact threshold for stagnation, clamped to 0..=10.
    pub min_new_facts_per_round: usize,
    /// Web search context size; forced to medium on background-only models.
    pub web_context_size: WebContextSize,
    /// Domain suffixes or exact hosts facts must come from.
    pub force_domains: Vec<String>,
    /// Approximate user location for localized search.
    pub user_location: Option<UserLocation>,
    /// Whether the provider stores responses.
    pub store: bool,
    /// Submit as a background job (background-capable models only).
    pub background: bool,
    /// Enable the code execution tool (background-capable models only).
    pub code_interpreter: bool,
    /// Provider-side tool-call budget, clamped to 1..=1000.
    /// Defaults to 50 when background mode is active.
    pub max_tool_calls: Option<u32>,
    /// Retry bound override, clamped to 0..=5.
    pub max_retries: Option<u32>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            model: None,
            temperature: None,
            top_p: None,
            max_output_tokens: None,
            reasoning_effort: None,
            reasoning_summary: None,
            instructions: None,
            max_search_rounds: 4,
            max_facts: 18,
            min_new_facts_per_round: 2,
            web_context_size: WebContextSize::default(),
            force_domains: Vec::new(),
            user_location: None,
            store: true,
            background: false,
            code_interpreter: false,
            max_tool_calls: None,
            max_retries: None,
        }
    }
}

impl RequestOptions {
    /// Clamp every field into its valid range and apply model-dependent
    /// normalization rules.
    ///
    /// `background_only` is true when the selected model can only run as a
    /// background job (deep-research models); such models ignore the
    /// configured web context size and always run at medium.
    pub fn normalized(&self, background_only: bool) -> Self {
        let mut out = self.clone();
        out.temperature = self.temperature.map(|t| t.clamp(0.0, 2.0));
        out.top_p = self.top_p.map(|p| p.clamp(0.0, 1.0));
        out.max_output_tokens = self.max_output_tokens.map(|m| m.clamp(16, 100_000));
        out.max_search_rounds = self.max_search_rounds.clamp(1, 10);
        out.max_facts = self.max_facts.clamp(5, 50);
        out.min_new_facts_per_round = self.min_new_facts_per_round.min(10);
        out.max_retries = self.max_retries.map(|r| r.min(5));
        out.user_location = self.user_location.clone().map(UserLocation::normalized);
        out.force_domains = self
            .force_domains
            .iter()
            .map(|d| d.trim().to_ascii_lowercase())
            .filter(|d| !d.is_empty())
            .collect();

        if background_only {
            out.web_context_size = WebContextSize::Medium;
        }
        let background_active = self.background || background_only;
        out.max_tool_calls = match self.max_tool_calls {
            Some(n) => Some(n.clamp(1, 1000)),
            None if background_active => Some(50),
            None => None,
        };
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_engine_config_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.base_url, "https://api.openai.com/v1");
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.initial_backoff_ms, 1000);
    }

    #[test]
    fn test_engine_config_missing_file() {
        let result = EngineConfig::load(Some(Path::new("/nonexistent/inquest.toml")));
        assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));
    }

    #[test]
    fn test_options_clamping() {
        let options = RequestOptions {
            temperature: Some(9.0),
            top_p: Some(-1.0),
            max_search_rounds: 99,
            max_facts: 1,
            min_new_facts_per_round: 50,
            max_retries: Some(20),
            ..Default::default()
        };
        let n = options.normalized(false);
        assert_eq!(n.temperature, Some(2.0));
        assert_eq!(n.top_p, Some(0.0));
        assert_eq!(n.max_search_rounds, 10);
        assert_eq!(n.max_facts, 5);
        assert_eq!(n.min_new_facts_per_round, 10);
        assert_eq!(n.max_retries, Some(5));
    }

    #[test]
    fn test_options_defaults_pass_through() {
        let n = RequestOptions::default().normalized(false);
        assert_eq!(n.max_search_rounds, 4);
        assert_eq!(n.max_facts, 18);
        assert_eq!(n.min_new_facts_per_round, 2);
        assert_eq!(n.web_context_size, WebContextSize::Medium);
        assert!(n.store);
        assert_eq!(n.max_tool_calls, None);
    }

    #[test]
    fn test_background_forces_medium_context_and_tool_budget() {
        let options = RequestOptions {
            web_context_size: WebContextSize::High,
            ..Default::default()
        };
        let n = options.normalized(true);
        assert_eq!(n.web_context_size, WebContextSize::Medium);
        assert_eq!(n.max_tool_calls, Some(50));
    }

    #[test]
    fn test_explicit_tool_budget_clamped() {
        let options = RequestOptions {
            background: true,
            max_tool_calls: Some(5000),
            ..Default::default()
        };
        let n = options.normalized(false);
        assert_eq!(n.max_tool_calls, Some(1000));
    }

    #[test]
    fn test_country_normalization() {
        let loc = UserLocation {
            country: Some(" us ".into()),
            city: Some("Portland".into()),
            ..Default::default()
        };
        let n = loc.normalized();
        assert_eq!(n.country.as_deref(), Some("US"));
        assert_eq!(n.city.as_deref(), Some("Portland"));

        let bad = UserLocation {
            country: Some("United States".into()),
            ..Default::default()
        };
        assert_eq!(bad.normalized().country, None);
    }

    #[test]
    fn test_force_domains_normalized() {
        let options = RequestOptions {
            force_domains: vec!["  .Gov ".into(), String::new(), "EPA.gov".into()],
            ..Default::default()
        };
        let n = options.normalized(false);
        assert_eq!(n.force_domains, vec![".gov".to_string(), "epa.gov".into()]);
    }
}
