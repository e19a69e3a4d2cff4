//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects sources and the
//! computations that read them. It owns the per-thread configuration and
//! performs the notification pass that follows every write.
//!
//! # How It Works
//!
//! 1. When a memo or effect reads a source, the source records the running
//!    computation in its subscriber set (see [`ReactiveContext`]).
//!
//! 2. When a source is written, the runtime walks a snapshot of its
//!    subscribers in insertion order:
//!    a. Memos are marked dirty and their own subscribers are walked in place
//!    b. Effects are collected, each at most once
//!    c. The collected effects then run, synchronously, in that order
//!    d. Memos are lazy - they recompute on next access
//!
//! There is one pass per write. Writes are never coalesced.

use std::cell::Cell;
use std::collections::HashSet;
use std::sync::Arc;

use indexmap::IndexMap;

use super::context::ReactiveContext;
use super::subscriber::{Subscriber, SubscriberId, Subscribers};
use crate::config::{ErrorPolicy, RuntimeConfig};
use crate::error::{ReactiveError, Result};

thread_local! {
    static CONFIG: Cell<RuntimeConfig> = Cell::new(RuntimeConfig::default());
}

/// The reactive runtime.
///
/// All state is per thread; this type only groups the entry points.
pub struct Runtime;

impl Runtime {
    /// Install `config` for the current thread.
    pub fn configure(config: RuntimeConfig) {
        tracing::debug!(?config, "runtime configured");
        CONFIG.with(|cell| cell.set(config));
    }

    /// The configuration in effect on the current thread.
    pub fn config() -> RuntimeConfig {
        CONFIG.with(Cell::get)
    }

    /// Run `f` with `config` installed, restoring the previous configuration
    /// afterwards (also when `f` panics).
    pub fn with_config<R>(config: RuntimeConfig, f: impl FnOnce() -> R) -> R {
        struct Restore(RuntimeConfig);

        impl Drop for Restore {
            fn drop(&mut self) {
                CONFIG.with(|cell| cell.set(self.0));
            }
        }

        let _restore = Restore(CONFIG.with(|cell| cell.replace(config)));
        f()
    }

    /// Run `f` without subscribing the current computation to anything it
    /// reads.
    pub fn untrack<R>(f: impl FnOnce() -> R) -> R {
        let _ctx = ReactiveContext::enter_untracked();
        f()
    }

    /// Get the current subscriber being tracked, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        ReactiveContext::current_subscriber()
    }

    /// Check if we're inside a reactive context.
    pub fn is_tracking() -> bool {
        ReactiveContext::is_active()
    }

    /// Notify the subscribers of a source that was just written.
    ///
    /// This is the core update propagation mechanism.
    pub(crate) fn notify(subscribers: Subscribers) -> Result<()> {
        if subscribers.is_empty() {
            return Ok(());
        }

        let mut visited = HashSet::new();
        let mut effects = IndexMap::new();
        for subscriber in subscribers {
            collect_effects(subscriber, &mut visited, &mut effects);
        }

        tracing::debug!(effects = effects.len(), "notification pass");

        let policy = Self::config().error_policy;
        let mut errors = Vec::new();
        for (id, effect) in effects {
            if let Err(err) = effect.run() {
                match policy {
                    ErrorPolicy::FailFast => return Err(err),
                    ErrorPolicy::Isolate => {
                        tracing::debug!(effect = %id, error = %err, "effect failed, continuing");
                        errors.push(err);
                    }
                }
            }
        }

        ReactiveError::collect(errors)
    }
}

/// Walk `subscriber` depth-first, invalidating lazy computations and
/// gathering the effects that must run.
fn collect_effects(
    subscriber: Arc<dyn Subscriber>,
    visited: &mut HashSet<SubscriberId>,
    effects: &mut IndexMap<SubscriberId, Arc<dyn Subscriber>>,
) {
    let id = subscriber.subscriber_id();
    if !visited.insert(id) {
        return;
    }

    if subscriber.is_eager() {
        effects.insert(id, subscriber);
    } else {
        for downstream in subscriber.invalidate() {
            collect_effects(downstream, visited, effects);
        }
    }
}
