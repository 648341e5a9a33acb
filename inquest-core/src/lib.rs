//! # Inquest Core
//!
//! Core library for the Inquest research engine.
//! Provides the provider client, evidence model, multi-round research loop,
//! background-job manager, configuration, and fundamental types.

pub mod config;
pub mod error;
pub mod jobs;
pub mod provider;
pub mod research;
pub mod service;
pub mod trace;
pub mod types;

// Re-export commonly used types at the crate root.
pub use config::{
    EngineConfig, ReasoningEffort, ReasoningSummary, RequestOptions, RetryConfig, UserLocation,
    WebContextSize,
};
pub use error::{ConfigError, InquestError, JobError, ProviderError, Result};
pub use jobs::{BackgroundJobManager, PollConfig};
pub use provider::{CompletionProvider, MockProvider, ResponsesClient};
pub use research::{
    Conflict, EvidenceSet, Fact, ResearchEngine, ResearchPlan, ResearchReport, StopCondition,
    StopReason, Validation,
};
pub use service::{ResearchOutcome, ResearchService};
pub use trace::{Trace, TraceEvent};
pub use types::{CompletionRequest, CompletionResponse, Job, JobStatus, SearchResult};
