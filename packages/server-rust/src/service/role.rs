//! First dispatch stage: the before-handlers of one role.

use std::fmt;
use std::sync::Arc;

use super::context::DispatchContext;
use super::handler::{run_stage, Handler, HandlerError, SharedHandler};

/// Outermost dispatch grouping: before-handlers shared by every request
/// addressed to this role, whatever its group or action.
pub struct Role {
    label: String,
    before: Vec<SharedHandler>,
}

impl Role {
    pub(crate) fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            before: Vec::new(),
        }
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Appends a before-handler. Handlers run in the order they were added.
    pub fn use_before<H: Handler>(&mut self, handler: H) -> &mut Self {
        self.before.push(Arc::new(handler));
        self
    }

    /// Appends a handler that is also registered elsewhere.
    pub fn use_shared(&mut self, handler: SharedHandler) -> &mut Self {
        self.before.push(handler);
        self
    }

    #[must_use]
    pub fn find_before(&self) -> &[SharedHandler] {
        &self.before
    }

    /// Runs every before-handler in order.
    ///
    /// The continue flag is not consulted between handlers: an abort from one
    /// role handler still lets the rest of the role list run, and the
    /// dispatcher honors it before the group stage.
    ///
    /// # Errors
    ///
    /// Returns the first fault raised by a handler, or `HandlerError::Cancelled`
    /// if the request is abandoned between two handlers.
    pub async fn call(&self, ctx: &mut DispatchContext) -> Result<(), HandlerError> {
        run_stage(&self.before, ctx).await
    }
}

impl fmt::Debug for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Role")
            .field("label", &self.label)
            .field("before", &self.before.len())
            .finish()
    }
}
