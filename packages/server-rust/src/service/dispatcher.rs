//! Layered dispatch: resolves the role and group for a request, runs the
//! handler chain on its own task, and races it against the deadline and the
//! caller's cancellation.

use std::any::Any;
use std::convert::Infallible;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use catuan_core::Reply;
use futures_util::FutureExt;
use tokio::sync::oneshot;
use tower::Service;
use tracing::{debug, error, warn};

use super::config::DispatchConfig;
use super::context::{DispatchContext, Handoff};
use super::group::Group;
use super::handler::HandlerError;
use super::registry::Registry;
use super::request::{denials, DispatchOutcome, DispatchRequest};
use super::role::Role;

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// Dispatches resolved `(role, group, action)` requests through the registry.
///
/// Every dispatch delivers exactly one [`DispatchOutcome`]:
/// - lookup failures are answered immediately, without spawning anything
/// - otherwise one task runs `Role::call` then `Group::call`, and the
///   dispatcher resolves on the first of {handoff, deadline, cancellation}
///
/// When the deadline or the caller's cancellation wins, or the caller drops
/// the `dispatch` future, the task's cancellation token is cancelled so the
/// chain stops at its next await point or handler boundary. Handlers that
/// block synchronously keep running until they return; their late reply is
/// dropped. The deadline still fires on time in that case only on a
/// multi-thread runtime, where the blocked worker is not the one polling
/// the dispatcher.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<Registry>,
    deadline: Duration,
}

impl Dispatcher {
    #[must_use]
    pub fn new(registry: Registry, config: &DispatchConfig) -> Self {
        Self::with_deadline(Arc::new(registry), config.deadline())
    }

    #[must_use]
    pub fn with_deadline(registry: Arc<Registry>, deadline: Duration) -> Self {
        Self { registry, deadline }
    }

    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    #[must_use]
    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Dispatches one request and waits for its outcome.
    pub async fn dispatch(&self, request: DispatchRequest) -> DispatchOutcome {
        let DispatchRequest {
            request_id,
            labels,
            params,
            cancel,
        } = request;

        let Some(role) = self.registry.find_role(&labels.role) else {
            debug!(request_id = %request_id, role = %labels.role, "role not found");
            return DispatchOutcome::Denied(Reply::denied(denials::ROLE_NOT_FOUND));
        };
        let Some(group) = self.registry.find_group(&labels.role, &labels.group) else {
            debug!(
                request_id = %request_id,
                role = %labels.role,
                group = %labels.group,
                "group not found"
            );
            return DispatchOutcome::Denied(Reply::denied(denials::GROUP_NOT_FOUND));
        };

        let cancel = cancel.unwrap_or_default();
        let task_token = cancel.child_token();
        let (tx, rx) = oneshot::channel();
        let ctx = DispatchContext::new(request_id, labels, params, tx, task_token.clone());
        tokio::spawn(run_chain(Arc::clone(role), Arc::clone(group), ctx));
        // Cancels the task on every exit that is not a handoff, including the
        // caller dropping this future.
        let cancel_on_drop = task_token.drop_guard();

        tokio::select! {
            biased;

            handoff = rx => match handoff {
                Ok(handoff) => {
                    // Work a handler does after writing its reply may finish.
                    let _ = cancel_on_drop.disarm();
                    settle(handoff)
                }
                // The task ended without settling; only happens once the
                // chain observed cancellation or the runtime is shutting down.
                Err(_) if cancel.is_cancelled() => DispatchOutcome::Cancelled,
                Err(_) => {
                    error!(request_id = %request_id, "handler task ended without a reply");
                    DispatchOutcome::Faulted(Reply::denied(denials::INTERNAL_ERROR))
                }
            },
            () = cancel.cancelled() => {
                debug!(request_id = %request_id, "caller cancelled dispatch");
                DispatchOutcome::Cancelled
            }
            () = tokio::time::sleep(self.deadline) => {
                warn!(
                    request_id = %request_id,
                    deadline_ms = u64::try_from(self.deadline.as_millis()).unwrap_or(u64::MAX),
                    "dispatch deadline elapsed"
                );
                DispatchOutcome::TimedOut(Reply::denied(denials::TIMEOUT))
            }
        }
    }
}

/// Maps the task's handoff to the outcome delivered to the caller.
fn settle(handoff: Handoff) -> DispatchOutcome {
    match handoff {
        Handoff::Reply(reply) => DispatchOutcome::Completed(reply),
        Handoff::Aborted => DispatchOutcome::Completed(Reply::denied(denials::REQUEST_ABORTED)),
        Handoff::Finished => DispatchOutcome::Completed(Reply::empty()),
        Handoff::Faulted => DispatchOutcome::Faulted(Reply::denied(denials::INTERNAL_ERROR)),
    }
}

// ---------------------------------------------------------------------------
// Handler task
// ---------------------------------------------------------------------------

/// Body of the per-request task.
///
/// Panics are caught here and treated like any other handler fault, so the
/// dispatcher hears about them through the handoff instead of waiting out
/// the deadline.
async fn run_chain(role: Arc<Role>, group: Arc<Group>, mut ctx: DispatchContext) {
    let token = ctx.cancellation().clone();
    let result = {
        let chain = AssertUnwindSafe(execute(&role, &group, &mut ctx)).catch_unwind();
        tokio::select! {
            () = token.cancelled() => Err(HandlerError::Cancelled),
            caught = chain => caught.unwrap_or_else(|payload| {
                Err(HandlerError::Panicked(panic_message(payload.as_ref())))
            }),
        }
    };

    match result {
        Ok(()) => {
            let handoff = if ctx.is_next() {
                Handoff::Finished
            } else {
                Handoff::Aborted
            };
            ctx.settle(handoff);
        }
        Err(HandlerError::Cancelled) => {
            debug!(
                request_id = %ctx.request_id(),
                role = %ctx.role_label(),
                group = %ctx.group_label(),
                action = %ctx.action_label(),
                "handler chain abandoned"
            );
        }
        Err(err) => {
            error!(
                request_id = %ctx.request_id(),
                role = %ctx.role_label(),
                group = %ctx.group_label(),
                action = %ctx.action_label(),
                error = %err,
                "handler chain faulted"
            );
            ctx.settle(Handoff::Faulted);
        }
    }
}

async fn execute(role: &Role, group: &Group, ctx: &mut DispatchContext) -> Result<(), HandlerError> {
    role.call(ctx).await?;
    if ctx.is_next() {
        group.call(ctx).await?;
    }
    Ok(())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

// ---------------------------------------------------------------------------
// tower::Service
// ---------------------------------------------------------------------------

impl Service<DispatchRequest> for Dispatcher {
    type Response = DispatchOutcome;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<DispatchOutcome, Infallible>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: DispatchRequest) -> Self::Future {
        let dispatcher = self.clone();
        Box::pin(async move { Ok(dispatcher.dispatch(request).await) })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
