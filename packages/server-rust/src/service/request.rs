//! Dispatch input and outcome types.

use catuan_core::{Reply, RouteLabels};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Fixed messages of the denial replies produced by the dispatch core itself.
pub mod denials {
    pub const ROLE_NOT_FOUND: &str = "access denied,role not found";
    pub const GROUP_NOT_FOUND: &str = "access denied,group not found";
    pub const ACTION_NOT_FOUND: &str = "action not found";
    pub const TIMEOUT: &str = "timeout";
    pub const INTERNAL_ERROR: &str = "internal error";
    pub const REQUEST_ABORTED: &str = "request aborted";
    pub const SERVER_OVERLOADED: &str = "server overloaded";
    pub const REQUEST_IN_PROGRESS: &str = "request in progress";
}

// ---------------------------------------------------------------------------
// DispatchRequest
// ---------------------------------------------------------------------------

/// One inbound request, already resolved to its route labels.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    pub request_id: Uuid,
    pub labels: RouteLabels,
    /// Decoded request parameters; `Value::Null` when the request carried none.
    pub params: Value,
    /// Fires when the caller goes away (e.g. the connection closed).
    pub cancel: Option<CancellationToken>,
}

impl DispatchRequest {
    #[must_use]
    pub fn new(labels: RouteLabels) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            labels,
            params: Value::Null,
            cancel: None,
        }
    }

    #[must_use]
    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

// ---------------------------------------------------------------------------
// DispatchOutcome
// ---------------------------------------------------------------------------

/// Terminal state of one dispatch.
///
/// State machine: `Pending -> Running -> {Completed, TimedOut, Cancelled, Faulted}`.
/// `Denied` covers requests rejected before a task was spawned. Every stage
/// of the pipeline answers with an outcome, so the service error type is
/// `Infallible`.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// The handler chain produced (or settled) a reply in time.
    Completed(Reply),
    /// Rejected before a task was spawned: role or group lookup failed, or
    /// the pipeline shed the request under load.
    Denied(Reply),
    /// The deadline elapsed first.
    TimedOut(Reply),
    /// A handler faulted or panicked.
    Faulted(Reply),
    /// The caller cancelled; nothing is delivered.
    Cancelled,
}

impl DispatchOutcome {
    #[must_use]
    pub fn reply(&self) -> Option<&Reply> {
        match self {
            Self::Completed(reply)
            | Self::Denied(reply)
            | Self::TimedOut(reply)
            | Self::Faulted(reply) => Some(reply),
            Self::Cancelled => None,
        }
    }

    /// The reply to hand to the serialization layer, if any.
    #[must_use]
    pub fn into_reply(self) -> Option<Reply> {
        match self {
            Self::Completed(reply)
            | Self::Denied(reply)
            | Self::TimedOut(reply)
            | Self::Faulted(reply) => Some(reply),
            Self::Cancelled => None,
        }
    }

    /// Short label used in logs and metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Completed(_) => "completed",
            Self::Denied(_) => "denied",
            Self::TimedOut(_) => "timed_out",
            Self::Faulted(_) => "faulted",
            Self::Cancelled => "cancelled",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancelled_has_no_reply() {
        assert_eq!(DispatchOutcome::Cancelled.reply(), None);
        assert_eq!(DispatchOutcome::Cancelled.into_reply(), None);
        assert_eq!(DispatchOutcome::Cancelled.kind(), "cancelled");
    }

    #[test]
    fn timed_out_carries_timeout_denial() {
        let outcome = DispatchOutcome::TimedOut(Reply::denied(denials::TIMEOUT));
        assert_eq!(outcome.kind(), "timed_out");
        assert_eq!(outcome.into_reply().unwrap().message, "timeout");
    }

    #[test]
    fn request_builder_sets_fields() {
        let token = CancellationToken::new();
        let request = DispatchRequest::new(RouteLabels::new("user", "profile", "get"))
            .with_params(serde_json::json!({"id": 1}))
            .with_cancellation(token);
        assert_eq!(request.params["id"], 1);
        assert!(request.cancel.is_some());
    }
}
