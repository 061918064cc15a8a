//! Pipeline composition: wraps the dispatcher with the middleware layers.

use std::convert::Infallible;

use tower::ServiceBuilder;

use super::load_shed::LoadShedLayer;
use super::metrics::MetricsLayer;
use crate::service::config::DispatchConfig;
use crate::service::dispatcher::Dispatcher;
use crate::service::request::{DispatchOutcome, DispatchRequest};

/// Build the dispatch pipeline by wrapping the `Dispatcher` with middleware layers.
///
/// Layer order (outermost to innermost):
/// 1. `MetricsLayer` -- record timing and outcome, including shed requests
/// 2. `LoadShedLayer` -- deny when overloaded before spawning any work
///
/// The deadline is enforced inside the dispatcher itself, not by a layer,
/// because it has to cancel the handler task it spawned.
#[must_use]
pub fn build_dispatch_pipeline(
    dispatcher: Dispatcher,
    config: &DispatchConfig,
) -> impl tower::Service<DispatchRequest, Response = DispatchOutcome, Error = Infallible> + Clone
{
    ServiceBuilder::new()
        .layer(MetricsLayer)
        .layer(LoadShedLayer::new(config.max_concurrent_dispatches))
        .service(dispatcher)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
