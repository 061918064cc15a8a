//! Catuan Server: layered role/group/action dispatch with a hard deadline,
//! fault containment and exactly-one-outcome delivery.

pub mod service;

pub use service::{
    build_dispatch_pipeline, handler_fn, DispatchConfig, DispatchContext, DispatchOutcome,
    DispatchRequest, Dispatcher, Flow, Handler, HandlerError, HandlerResult, RegistryBuilder,
};

#[cfg(test)]
mod tests {
    #[test]
    fn crate_loads() {
        // Empty body: if this test runs, the crate compiles and loads.
    }
}
