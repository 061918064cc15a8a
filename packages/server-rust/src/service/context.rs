//! Per-request dispatch state.

use std::any::Any;

use catuan_core::{Reply, RouteLabels};
use http::Extensions;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

/// What the handler task hands back to the waiting dispatcher.
///
/// Only one value is ever sent per request: either the reply a handler wrote,
/// or the settlement the task produces once the chain ends without one.
#[derive(Debug)]
pub(crate) enum Handoff {
    /// A handler wrote a reply.
    Reply(Reply),
    /// The chain stopped on an abort without writing a reply.
    Aborted,
    /// The chain ran to the end without writing a reply.
    Finished,
    /// The chain faulted before writing a reply.
    Faulted,
}

/// Mutable state threaded through every handler of one request.
///
/// Holds the continue flag, the single-slot result handoff, the route labels,
/// the decoded request parameters and a typed extension map that earlier
/// handlers use to pass values (authenticated principal, limiter guards, ...)
/// to later ones. Values stored in the extensions are dropped together with
/// the context when the handler task ends; values passed to
/// [`DispatchContext::hold_until_reply`] are dropped just before the reply is
/// handed off.
#[derive(Debug)]
pub struct DispatchContext {
    request_id: Uuid,
    labels: RouteLabels,
    params: Value,
    extensions: Extensions,
    held: Vec<Box<dyn Any + Send + Sync>>,
    next: bool,
    handoff: Option<oneshot::Sender<Handoff>>,
    cancel: CancellationToken,
}

impl DispatchContext {
    pub(crate) fn new(
        request_id: Uuid,
        labels: RouteLabels,
        params: Value,
        handoff: oneshot::Sender<Handoff>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            request_id,
            labels,
            params,
            extensions: Extensions::new(),
            held: Vec::new(),
            next: true,
            handoff: Some(handoff),
            cancel,
        }
    }

    /// Writes the request's reply.
    ///
    /// `data` is packed as in [`Reply::new`]: empty means no payload, one value
    /// is stored as-is, several become an array. Only the first reply written
    /// for a request is delivered; later calls are ignored.
    pub fn result(&mut self, err_code: i32, message: impl Into<String>, data: Vec<Value>) {
        self.reply(Reply::new(err_code, message, data));
    }

    /// Writes an already-built reply. Same single-write rule as [`Self::result`].
    pub fn reply(&mut self, reply: Reply) {
        if !self.send(Handoff::Reply(reply)) {
            warn!(
                request_id = %self.request_id,
                role = %self.labels.role,
                group = %self.labels.group,
                action = %self.labels.action,
                "reply already written for this request; ignoring"
            );
        }
    }

    /// Settles a request that ended without a handler reply.
    /// Returns `false` if a reply was already written.
    pub(crate) fn settle(&mut self, handoff: Handoff) -> bool {
        self.send(handoff)
    }

    fn send(&mut self, handoff: Handoff) -> bool {
        let Some(tx) = self.handoff.take() else {
            return false;
        };
        // Released first so a caller retrying on this reply finds them free.
        self.held.clear();
        if tx.send(handoff).is_err() {
            // The dispatcher already resolved on timeout or cancellation.
            debug!(request_id = %self.request_id, "dispatcher gone; reply orphaned");
        }
        true
    }

    /// Returns `true` once a reply has been written.
    #[must_use]
    pub fn has_result(&self) -> bool {
        self.handoff.is_none()
    }

    /// Clears the continue flag. Later stages will not run.
    pub fn abort(&mut self) {
        self.next = false;
    }

    /// Reads the continue flag.
    #[must_use]
    pub fn is_next(&self) -> bool {
        self.next
    }

    #[must_use]
    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    #[must_use]
    pub fn labels(&self) -> &RouteLabels {
        &self.labels
    }

    #[must_use]
    pub fn role_label(&self) -> &str {
        &self.labels.role
    }

    #[must_use]
    pub fn group_label(&self) -> &str {
        &self.labels.group
    }

    #[must_use]
    pub fn action_label(&self) -> &str {
        &self.labels.action
    }

    /// Request parameters decoded by the routing layer (`Value::Null` when none).
    #[must_use]
    pub fn params(&self) -> &Value {
        &self.params
    }

    #[must_use]
    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    /// Keeps `value` alive until the request's reply is handed off, or until
    /// the context is dropped if no reply is ever written. Used for guards
    /// that must not outlive the answer the caller sees. If a reply was
    /// already written, `value` is dropped at once.
    pub fn hold_until_reply<T: Send + Sync + 'static>(&mut self, value: T) {
        if self.handoff.is_some() {
            self.held.push(Box::new(value));
        }
    }

    /// Token cancelled when the dispatcher stops waiting for this request.
    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
