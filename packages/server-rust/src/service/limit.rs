//! Keyed single-flight limiting.
//!
//! A [`KeyedLimiter`] lets at most one holder own a key at a time (one
//! in-flight payment per order, one profile update per user, ...). The
//! [`single_flight`] before-handler hands the acquired guard to the dispatch
//! context, which releases the key just before the request's reply is handed
//! off (or when the handler task ends without one). Work an action does after
//! writing its reply therefore runs outside the limit.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use async_trait::async_trait;
use catuan_core::Reply;
use dashmap::DashSet;
use tracing::debug;

use super::context::DispatchContext;
use super::handler::{Flow, Handler, HandlerResult};
use super::request::denials;

// ---------------------------------------------------------------------------
// KeyedLimiter
// ---------------------------------------------------------------------------

/// Set of currently held keys. Cloning shares the same set.
pub struct KeyedLimiter<K: Eq + Hash> {
    held: Arc<DashSet<K>>,
}

impl<K> KeyedLimiter<K>
where
    K: Eq + Hash + Clone,
{
    #[must_use]
    pub fn new() -> Self {
        Self {
            held: Arc::new(DashSet::new()),
        }
    }

    /// Marks `key` as held. Returns `false` if it was already held.
    ///
    /// The caller must pair a successful check with [`Self::release`];
    /// prefer [`Self::try_acquire`], which releases on drop.
    pub fn check(&self, key: K) -> bool {
        self.held.insert(key)
    }

    /// Releases `key`. Releasing a key that is not held is a no-op.
    pub fn release(&self, key: &K) {
        self.held.remove(key);
    }

    /// Holds `key` until the returned guard is dropped, or returns `None` if
    /// someone else holds it.
    #[must_use]
    pub fn try_acquire(&self, key: K) -> Option<LimitGuard<K>> {
        if self.held.insert(key.clone()) {
            Some(LimitGuard {
                held: Arc::clone(&self.held),
                key,
            })
        } else {
            None
        }
    }

    #[must_use]
    pub fn is_held(&self, key: &K) -> bool {
        self.held.contains(key)
    }

    #[must_use]
    pub fn held_count(&self) -> usize {
        self.held.len()
    }
}

impl<K: Eq + Hash + Clone> Default for KeyedLimiter<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash> Clone for KeyedLimiter<K> {
    fn clone(&self) -> Self {
        Self {
            held: Arc::clone(&self.held),
        }
    }
}

impl<K: Eq + Hash> fmt::Debug for KeyedLimiter<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyedLimiter")
            .field("held", &self.held.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// LimitGuard
// ---------------------------------------------------------------------------

/// Releases its key when dropped.
pub struct LimitGuard<K: Eq + Hash> {
    held: Arc<DashSet<K>>,
    key: K,
}

impl<K: Eq + Hash> LimitGuard<K> {
    #[must_use]
    pub fn key(&self) -> &K {
        &self.key
    }
}

impl<K: Eq + Hash> Drop for LimitGuard<K> {
    fn drop(&mut self) {
        self.held.remove(&self.key);
    }
}

impl<K: Eq + Hash + fmt::Debug> fmt::Debug for LimitGuard<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LimitGuard").field("key", &self.key).finish()
    }
}

// ---------------------------------------------------------------------------
// single_flight
// ---------------------------------------------------------------------------

/// Before-handler refusing a request while another request with the same key
/// is in flight.
///
/// `key_fn` extracts the key from the context; `None` lets the request
/// through unlimited. A busy key writes `{-1, "request in progress"}` and
/// aborts. The acquired key stays held until the request's reply is written.
#[must_use]
pub fn single_flight<K, F>(limiter: KeyedLimiter<K>, key_fn: F) -> SingleFlight<K, F>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    F: Fn(&DispatchContext) -> Option<K> + Send + Sync + 'static,
{
    SingleFlight { limiter, key_fn }
}

pub struct SingleFlight<K: Eq + Hash, F> {
    limiter: KeyedLimiter<K>,
    key_fn: F,
}

#[async_trait]
impl<K, F> Handler for SingleFlight<K, F>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    F: Fn(&DispatchContext) -> Option<K> + Send + Sync + 'static,
{
    async fn call(&self, ctx: &mut DispatchContext) -> HandlerResult {
        let Some(key) = (self.key_fn)(ctx) else {
            return Ok(Flow::Next);
        };

        let Some(guard) = self.limiter.try_acquire(key.clone()) else {
            debug!(request_id = %ctx.request_id(), key = ?key, "key already in flight");
            ctx.reply(Reply::denied(denials::REQUEST_IN_PROGRESS));
            return Ok(Flow::Abort);
        };

        ctx.hold_until_reply(guard);
        Ok(Flow::Next)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
