//! Load shedding for dispatches.
//!
//! Caps the number of in-flight dispatches at `max_concurrent_dispatches`.
//! A request over the cap never reaches the dispatcher, so no handler task is
//! spawned for it; it is answered with a `Denied` outcome carrying
//! `{-1, "server overloaded"}` and counted per role in `dispatch_shed_total`.

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use catuan_core::Reply;
use tokio::sync::Semaphore;
use tower::{Layer, Service};
use tracing::warn;

use crate::service::request::{denials, DispatchOutcome, DispatchRequest};

/// Shares one permit pool between every service it wraps.
#[derive(Debug, Clone)]
pub struct LoadShedLayer {
    permits: Arc<Semaphore>,
}

impl LoadShedLayer {
    #[must_use]
    pub fn new(max_in_flight: u32) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_in_flight as usize)),
        }
    }

    /// Permits currently free.
    #[must_use]
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

impl<S> Layer<S> for LoadShedLayer {
    type Service = LoadShedService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        LoadShedService {
            inner,
            permits: Arc::clone(&self.permits),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoadShedService<S> {
    inner: S,
    permits: Arc<Semaphore>,
}

impl<S> Service<DispatchRequest> for LoadShedService<S>
where
    S: Service<DispatchRequest, Response = DispatchOutcome, Error = Infallible> + Send,
    S::Future: Send + 'static,
{
    type Response = DispatchOutcome;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<DispatchOutcome, Infallible>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: DispatchRequest) -> Self::Future {
        let Ok(permit) = Arc::clone(&self.permits).try_acquire_owned() else {
            warn!(
                request_id = %request.request_id,
                role = %request.labels.role,
                group = %request.labels.group,
                action = %request.labels.action,
                "dispatch shed: too many in flight"
            );
            metrics::counter!("dispatch_shed_total", "role" => request.labels.role).increment(1);
            return Box::pin(async {
                Ok(DispatchOutcome::Denied(Reply::denied(
                    denials::SERVER_OVERLOADED,
                )))
            });
        };

        let fut = self.inner.call(request);
        Box::pin(async move {
            let outcome = fut.await;
            drop(permit);
            outcome
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use catuan_core::RouteLabels;
    use serde_json::json;
    use tower::ServiceExt;

    use super::*;
    use crate::service::context::DispatchContext;
    use crate::service::dispatcher::Dispatcher;
    use crate::service::handler::{Flow, Handler, HandlerResult};
    use crate::service::registry::RegistryBuilder;

    /// Counts invocations and replies after one second on the tokio clock.
    struct Export {
        runs: Arc<AtomicU32>,
    }

    #[async_trait]
    impl Handler for Export {
        async fn call(&self, ctx: &mut DispatchContext) -> HandlerResult {
            self.runs.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(1)).await;
            ctx.result(0, "", vec![json!("exported")]);
            Ok(Flow::Next)
        }
    }

    fn report_dispatcher(runs: &Arc<AtomicU32>) -> Dispatcher {
        let mut builder = RegistryBuilder::new();
        builder.register_role("admin").unwrap();
        builder
            .register_group("admin", "report")
            .unwrap()
            .bind_action("export", Export { runs: runs.clone() });
        Dispatcher::with_deadline(Arc::new(builder.build()), Duration::from_secs(5))
    }

    fn export_request() -> DispatchRequest {
        DispatchRequest::new(RouteLabels::new("admin", "report", "export"))
    }

    #[tokio::test(start_paused = true)]
    async fn shed_request_is_denied_without_running_handlers() {
        let runs = Arc::new(AtomicU32::new(0));
        let layer = LoadShedLayer::new(1);
        let svc = layer.layer(report_dispatcher(&runs));

        let in_flight = tokio::spawn(svc.clone().oneshot(export_request()));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(layer.available(), 0);

        let shed = svc.clone().oneshot(export_request()).await.unwrap();
        assert_eq!(
            shed,
            DispatchOutcome::Denied(Reply::denied(denials::SERVER_OVERLOADED))
        );
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        let first = in_flight.await.unwrap().unwrap();
        assert_eq!(first, DispatchOutcome::Completed(Reply::ok(json!("exported"))));
    }

    #[tokio::test(start_paused = true)]
    async fn permit_returns_once_dispatch_resolves() {
        let runs = Arc::new(AtomicU32::new(0));
        let layer = LoadShedLayer::new(1);
        let svc = layer.layer(report_dispatcher(&runs));

        for _ in 0..3 {
            let outcome = svc.clone().oneshot(export_request()).await.unwrap();
            assert_eq!(outcome.kind(), "completed");
            assert_eq!(layer.available(), 1);
        }
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn lookup_denials_pass_through_and_release_permit() {
        let runs = Arc::new(AtomicU32::new(0));
        let layer = LoadShedLayer::new(1);
        let svc = layer.layer(report_dispatcher(&runs));

        let outcome = svc
            .oneshot(DispatchRequest::new(RouteLabels::new("guest", "report", "export")))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            DispatchOutcome::Denied(Reply::denied(denials::ROLE_NOT_FOUND))
        );
        assert_eq!(layer.available(), 1);
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }
}
