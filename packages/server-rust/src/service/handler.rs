//! Handler abstraction shared by role before-handlers, group before-handlers
//! and action handlers.
//!
//! Every handler reports an explicit outcome instead of unwinding:
//! - `Ok(Flow::Next)` -- continue with the chain
//! - `Ok(Flow::Abort)` -- stop before the next stage boundary
//! - `Err(HandlerError)` -- fault; the chain stops immediately

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use super::context::DispatchContext;

// ---------------------------------------------------------------------------
// Outcome types
// ---------------------------------------------------------------------------

/// Control-flow signal returned by a handler that did not fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Let the chain continue.
    Next,
    /// Clear the continue flag. Honored at the next stage boundary.
    Abort,
}

/// Fault raised inside the handler chain.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("handler failed: {0}")]
    Failed(#[from] anyhow::Error),
    #[error("handler panicked: {0}")]
    Panicked(String),
    /// The request was abandoned (timeout or caller cancellation) while the
    /// chain was still running.
    #[error("dispatch cancelled")]
    Cancelled,
}

/// Result type returned by every handler.
pub type HandlerResult = Result<Flow, HandlerError>;

// ---------------------------------------------------------------------------
// Handler trait
// ---------------------------------------------------------------------------

/// A unit of work in the dispatch chain.
///
/// Handlers that wait on I/O should select on `ctx.cancellation()` so an
/// abandoned request stops them. Synchronous blocking inside `call` cannot be
/// interrupted by the dispatcher.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    async fn call(&self, ctx: &mut DispatchContext) -> HandlerResult;
}

/// Handler shared between the lists that reference it.
pub type SharedHandler = Arc<dyn Handler>;

// ---------------------------------------------------------------------------
// FnHandler (closure adapter)
// ---------------------------------------------------------------------------

/// Adapts a synchronous closure into a [`Handler`].
pub struct FnHandler<F>(F);

impl<F> fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnHandler")
    }
}

/// Wraps `f` so it can be registered wherever a [`Handler`] is expected.
pub fn handler_fn<F>(f: F) -> FnHandler<F>
where
    F: Fn(&mut DispatchContext) -> HandlerResult + Send + Sync + 'static,
{
    FnHandler(f)
}

#[async_trait]
impl<F> Handler for FnHandler<F>
where
    F: Fn(&mut DispatchContext) -> HandlerResult + Send + Sync + 'static,
{
    async fn call(&self, ctx: &mut DispatchContext) -> HandlerResult {
        (self.0)(ctx)
    }
}

// ---------------------------------------------------------------------------
// Stage execution
// ---------------------------------------------------------------------------

/// Runs one stage (an ordered handler list) against `ctx`.
///
/// `Flow::Abort` only clears the continue flag; the remaining handlers of the
/// same list still run and the caller checks `ctx.is_next()` afterwards.
/// Faults and cancellation end the stage at once.
pub(crate) async fn run_stage(
    handlers: &[SharedHandler],
    ctx: &mut DispatchContext,
) -> Result<(), HandlerError> {
    for handler in handlers {
        if ctx.cancellation().is_cancelled() {
            return Err(HandlerError::Cancelled);
        }
        apply(handler.call(ctx).await?, ctx);
    }
    Ok(())
}

/// Applies a non-fault outcome to the context.
pub(crate) fn apply(flow: Flow, ctx: &mut DispatchContext) {
    if flow == Flow::Abort {
        ctx.abort();
    }
}
