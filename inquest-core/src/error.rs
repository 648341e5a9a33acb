//! Error types for the Inquest research core.
//!
//! Uses `thiserror` for public API error types with structured variants
//! covering provider, background-job, and configuration domains.

use crate::types::JobStatus;
use std::path::PathBuf;

/// Top-level error type for the Inquest core library.
#[derive(Debug, thiserror::Error)]
pub enum InquestError {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Job error: {0}")]
    Job(#[from] JobError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from the remote completion provider.
///
/// Variants are split along the retry boundary: [`ProviderError::is_transient`]
/// returns true for errors the client retries with backoff (rate limits,
/// server errors, transport failures), false for errors surfaced immediately.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Provider server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Provider connection failed: {message}")]
    Connection { message: String },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Provider rejected request ({status}): {message}")]
    Request { status: u16, message: String },

    #[error("Authentication failed: {message}")]
    Auth { message: String },

    #[error("Provider response parse error: {message}")]
    Parse { message: String },
}

impl ProviderError {
    /// Whether this error should be retried with backoff.
    ///
    /// Rate limits, 5xx responses, and transport-level failures are
    /// transient; everything else propagates immediately.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimited { .. }
                | ProviderError::Server { .. }
                | ProviderError::Connection { .. }
                | ProviderError::Timeout { .. }
        )
    }
}

/// Terminal failures from the background-job lifecycle.
///
/// Every variant carries the job id so the caller can resume or inspect
/// the job later.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Job {job_id} still {last_status} after {waited_secs}s wait window")]
    Timeout {
        job_id: String,
        last_status: JobStatus,
        waited_secs: u64,
    },

    #[error("Job {job_id} polling aborted after {consecutive} consecutive rate-limit responses")]
    RateLimited { job_id: String, consecutive: u32 },

    #[error("Job {job_id} polling aborted after {consecutive} consecutive errors: {message}")]
    PollExhausted {
        job_id: String,
        consecutive: u32,
        message: String,
    },

    #[error("Job {job_id} failed: {message}")]
    Failed {
        job_id: String,
        code: Option<String>,
        message: String,
    },

    #[error("Job {job_id} was cancelled")]
    Cancelled { job_id: String },
}

impl JobError {
    /// The id of the job this failure belongs to.
    pub fn job_id(&self) -> &str {
        match self {
            JobError::Timeout { job_id, .. }
            | JobError::RateLimited { job_id, .. }
            | JobError::PollExhausted { job_id, .. }
            | JobError::Failed { job_id, .. }
            | JobError::Cancelled { job_id } => job_id,
        }
    }
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Environment variable not set: {var}")]
    EnvVarMissing { var: String },

    #[error("Configuration parse error: {message}")]
    ParseError { message: String },
}

/// A type alias for results using the top-level `InquestError`.
pub type Result<T> = std::result::Result<T, InquestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_provider() {
        let err = InquestError::Provider(ProviderError::RateLimited {
            retry_after_secs: 30,
        });
        assert_eq!(
            err.to_string(),
            "Provider error: Rate limited by provider, retry after 30s"
        );
    }

    #[test]
    fn test_provider_transient_classification() {
        assert!(ProviderError::RateLimited {
            retry_after_secs: 5
        }
        .is_transient());
        assert!(ProviderError::Server {
            status: 503,
            message: "overloaded".into()
        }
        .is_transient());
        assert!(ProviderError::Connection {
            message: "refused".into()
        }
        .is_transient());
        assert!(ProviderError::Timeout { timeout_secs: 60 }.is_transient());

        assert!(!ProviderError::Request {
            status: 400,
            message: "bad input".into()
        }
        .is_transient());
        assert!(!ProviderError::Auth {
            message: "bad key".into()
        }
        .is_transient());
        assert!(!ProviderError::Parse {
            message: "not json".into()
        }
        .is_transient());
    }

    #[test]
    fn test_job_error_carries_id() {
        let err = JobError::Timeout {
            job_id: "resp_abc".into(),
            last_status: JobStatus::InProgress,
            waited_secs: 1800,
        };
        assert_eq!(err.job_id(), "resp_abc");
        assert!(err.to_string().contains("resp_abc"));
        assert!(err.to_string().contains("in_progress"));
    }

    #[test]
    fn test_error_from_serde() {
        let serde_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: InquestError = serde_err.into();
        assert!(matches!(err, InquestError::Serialization(_)));
    }
}
