//! Append-only request trace.
//!
//! Each research invocation carries one [`Trace`]: an ordered log of
//! stage/phase events with summary detail. Write-only from the engine's
//! perspective; callers read it for diagnostics, including on failure.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// One recorded event in a request lifecycle.
#[derive(Debug, Clone, Serialize)]
pub struct TraceEvent {
    pub at: DateTime<Utc>,
    /// Phase label, e.g. "planning" or "searching:2".
    pub phase: String,
    /// Summary statistics or outcome for the phase.
    pub detail: String,
}

/// An append-only ordered log of events for one request.
#[derive(Debug, Clone, Serialize)]
pub struct Trace {
    pub request_id: Uuid,
    events: Vec<TraceEvent>,
}

impl Trace {
    pub fn new() -> Self {
        Self {
            request_id: Uuid::new_v4(),
            events: Vec::new(),
        }
    }

    /// Append an event.
    pub fn record(&mut self, phase: impl Into<String>, detail: impl Into<String>) {
        let event = TraceEvent {
            at: Utc::now(),
            phase: phase.into(),
            detail: detail.into(),
        };
        tracing::debug!(phase = %event.phase, detail = %event.detail, "trace");
        self.events.push(event);
    }

    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }
}

impl Default for Trace {
    fn default() -> Self {
        Self::new()
    }
}
