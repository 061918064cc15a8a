//! Layered request dispatch.
//!
//! Requests arrive already resolved to a `(role, group, action)` triple and
//! flow through:
//!
//! 1. **Registry** (`registry`): immutable role/group tables built at startup
//! 2. **Role** (`role`): before-handlers shared by every request of a role
//! 3. **Group** (`group`): common, per-action and terminal action handlers
//! 4. **Dispatcher** (`dispatcher`): spawns the chain, enforces the deadline,
//!    contains faults and delivers exactly one outcome
//! 5. **Middleware** (`middleware`): tower layers (metrics, load-shedding)
//! 6. **Limiter** (`limit`): keyed single-flight guard for before-handlers

pub mod config;
pub mod context;
pub mod dispatcher;
pub mod group;
pub mod handler;
pub mod limit;
pub mod middleware;
pub mod registry;
pub mod request;
pub mod role;

// Re-export key types for convenient access.
pub use config::{ConfigError, DispatchConfig};
pub use context::DispatchContext;
pub use dispatcher::Dispatcher;
pub use group::Group;
pub use handler::{handler_fn, Flow, FnHandler, Handler, HandlerError, HandlerResult, SharedHandler};
pub use limit::{single_flight, KeyedLimiter, LimitGuard};
pub use middleware::build_dispatch_pipeline;
pub use registry::{Registry, RegistryBuilder, RegistryError};
pub use request::{denials, DispatchOutcome, DispatchRequest};
pub use role::Role;
