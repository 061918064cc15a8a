//! Second-level dispatch grouping: common before-handlers, per-action
//! before-handlers and the terminal action handlers of one `(role, group)`.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use catuan_core::Reply;
use tracing::debug;

use super::context::DispatchContext;
use super::handler::{apply, run_stage, Handler, HandlerError, SharedHandler};
use super::request::denials::ACTION_NOT_FOUND;

/// Handlers registered under one `(role, group)` pair.
pub struct Group {
    role_label: String,
    group_label: String,
    common: Vec<SharedHandler>,
    before_actions: HashMap<String, Vec<SharedHandler>>,
    actions: HashMap<String, SharedHandler>,
}

impl Group {
    pub(crate) fn new(role_label: impl Into<String>, group_label: impl Into<String>) -> Self {
        Self {
            role_label: role_label.into(),
            group_label: group_label.into(),
            common: Vec::new(),
            before_actions: HashMap::new(),
            actions: HashMap::new(),
        }
    }

    #[must_use]
    pub fn role_label(&self) -> &str {
        &self.role_label
    }

    #[must_use]
    pub fn group_label(&self) -> &str {
        &self.group_label
    }

    /// Registers a before-handler.
    ///
    /// With no `dest_actions` the handler joins the common list that runs for
    /// every action of the group. Otherwise one shared instance is appended to
    /// the before-list of each named action.
    pub fn use_before<H: Handler>(&mut self, handler: H, dest_actions: &[&str]) -> &mut Self {
        self.use_shared(Arc::new(handler), dest_actions)
    }

    /// Same as [`Self::use_before`] for a handler already wrapped in an `Arc`.
    pub fn use_shared(&mut self, handler: SharedHandler, dest_actions: &[&str]) -> &mut Self {
        if dest_actions.is_empty() {
            self.common.push(handler);
        } else {
            for action in dest_actions {
                self.before_actions
                    .entry((*action).to_string())
                    .or_default()
                    .push(Arc::clone(&handler));
            }
        }
        self
    }

    /// Binds the terminal handler for `action`. A later bind replaces an earlier one.
    pub fn bind_action<H: Handler>(&mut self, action: impl Into<String>, handler: H) -> &mut Self {
        self.actions.insert(action.into(), Arc::new(handler));
        self
    }

    #[must_use]
    pub fn find_action(&self, action: &str) -> Option<&SharedHandler> {
        self.actions.get(action)
    }

    /// Before-handlers registered for `action` only.
    #[must_use]
    pub fn find_before(&self, action: &str) -> Option<&[SharedHandler]> {
        self.before_actions.get(action).map(Vec::as_slice)
    }

    /// Runs the group stages for `ctx.action_label()`.
    ///
    /// Order: common handlers, then the action's before-handlers, then the
    /// action handler. The continue flag is checked after each of the first
    /// two stages. An unbound action writes `{-1, "action not found"}` and
    /// aborts.
    ///
    /// # Errors
    ///
    /// Returns the first handler fault, or `HandlerError::Cancelled` if the
    /// request is abandoned mid-chain.
    pub async fn call(&self, ctx: &mut DispatchContext) -> Result<(), HandlerError> {
        run_stage(&self.common, ctx).await?;
        if !ctx.is_next() {
            return Ok(());
        }

        if let Some(before) = self.before_actions.get(ctx.action_label()) {
            run_stage(before, ctx).await?;
        }
        if !ctx.is_next() {
            return Ok(());
        }

        if let Some(handler) = self.actions.get(ctx.action_label()) {
            if ctx.cancellation().is_cancelled() {
                return Err(HandlerError::Cancelled);
            }
            apply(handler.call(ctx).await?, ctx);
        } else {
            debug!(
                role = %self.role_label,
                group = %self.group_label,
                action = %ctx.action_label(),
                "no handler bound for action"
            );
            ctx.reply(Reply::denied(ACTION_NOT_FOUND));
            ctx.abort();
        }
        Ok(())
    }
}

impl fmt::Debug for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut actions: Vec<&str> = self.actions.keys().map(String::as_str).collect();
        actions.sort_unstable();
        f.debug_struct("Group")
            .field("role", &self.role_label)
            .field("group", &self.group_label)
            .field("common", &self.common.len())
            .field("actions", &actions)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::service::context::tests::make_ctx;
    use crate::service::context::Handoff;
    use crate::service::handler::{handler_fn, Flow};

    type Log = Arc<parking_lot::Mutex<Vec<&'static str>>>;

    fn logging(log: &Log, name: &'static str, flow: Flow) -> impl Handler {
        let log = log.clone();
        handler_fn(move |_ctx| {
            log.lock().push(name);
            Ok(flow)
        })
    }

    fn make_group(log: &Log) -> Group {
        let mut group = Group::new("user", "profile");
        group
            .use_before(logging(log, "common-1", Flow::Next), &[])
            .use_before(logging(log, "common-2", Flow::Next), &[])
            .use_before(logging(log, "get-before", Flow::Next), &["get"])
            .use_before(logging(log, "write-before", Flow::Next), &["update", "delete"]);
        group.bind_action("get", logging(log, "get", Flow::Next));
        group.bind_action("update", logging(log, "update", Flow::Next));
        group
    }

    #[tokio::test]
    async fn stages_run_in_fixed_order() {
        let log = Log::default();
        let group = make_group(&log);

        let (mut ctx, _rx) = make_ctx("user", "profile", "get");
        group.call(&mut ctx).await.unwrap();

        assert_eq!(*log.lock(), vec!["common-1", "common-2", "get-before", "get"]);
    }

    #[tokio::test]
    async fn per_action_handlers_only_run_for_their_actions() {
        let log = Log::default();
        let group = make_group(&log);

        let (mut ctx, _rx) = make_ctx("user", "profile", "update");
        group.call(&mut ctx).await.unwrap();

        assert_eq!(
            *log.lock(),
            vec!["common-1", "common-2", "write-before", "update"]
        );
        assert_eq!(group.find_before("delete").map(<[_]>::len), Some(1));
        assert!(group.find_before("get-all").is_none());
    }

    #[tokio::test]
    async fn unbound_action_writes_denial_and_aborts() {
        let log = Log::default();
        let group = make_group(&log);

        let (mut ctx, rx) = make_ctx("user", "profile", "delete");
        group.call(&mut ctx).await.unwrap();

        assert!(!ctx.is_next());
        match rx.await.unwrap() {
            Handoff::Reply(reply) => {
                assert_eq!(reply.err_code, -1);
                assert_eq!(reply.message, ACTION_NOT_FOUND);
                assert_eq!(reply.data, None);
            }
            other => panic!("unexpected handoff: {other:?}"),
        }
    }

    #[tokio::test]
    async fn abort_in_common_stage_skips_action_stages() {
        let log = Log::default();
        let mut group = Group::new("user", "profile");
        group
            .use_before(logging(&log, "guard", Flow::Abort), &[])
            .use_before(logging(&log, "common-after-guard", Flow::Next), &[])
            .use_before(logging(&log, "get-before", Flow::Next), &["get"]);
        group.bind_action("get", logging(&log, "get", Flow::Next));

        let (mut ctx, _rx) = make_ctx("user", "profile", "get");
        group.call(&mut ctx).await.unwrap();

        // Same-stage handlers still run; the next stage does not.
        assert_eq!(*log.lock(), vec!["guard", "common-after-guard"]);
        assert!(!ctx.is_next());
    }

    #[tokio::test]
    async fn abort_in_action_before_stage_skips_action() {
        let log = Log::default();
        let mut group = Group::new("user", "profile");
        group.use_before(
            handler_fn(|ctx| {
                ctx.result(-1, "forbidden", vec![]);
                Ok(Flow::Abort)
            }),
            &["get"],
        );
        group.bind_action("get", logging(&log, "get", Flow::Next));

        let (mut ctx, rx) = make_ctx("user", "profile", "get");
        group.call(&mut ctx).await.unwrap();

        assert!(log.lock().is_empty());
        assert!(matches!(rx.await.unwrap(), Handoff::Reply(r) if r.message == "forbidden"));
    }

    #[tokio::test]
    async fn rebinding_action_replaces_handler() {
        let mut group = Group::new("user", "profile");
        group.bind_action(
            "get",
            handler_fn(|ctx| {
                ctx.result(0, "", vec![json!("old")]);
                Ok(Flow::Next)
            }),
        );
        group.bind_action(
            "get",
            handler_fn(|ctx| {
                ctx.result(0, "", vec![json!("new")]);
                Ok(Flow::Next)
            }),
        );

        let (mut ctx, rx) = make_ctx("user", "profile", "get");
        group.call(&mut ctx).await.unwrap();

        assert!(matches!(
            rx.await.unwrap(),
            Handoff::Reply(r) if r.data == Some(json!("new"))
        ));
        assert!(group.find_action("get").is_some());
        assert!(group.find_action("list").is_none());
    }
}
