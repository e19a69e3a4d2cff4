//! Reactive-Object Registry
//!
//! Associates `(target, property)` pairs with the computations that read
//! them, without touching the target's own storage.
//!
//! Targets are identified by a [`TargetId`]. An entry for a target appears on
//! the first tracked read of any of its properties and is released by the
//! target's drop hook, so the registry never outlives what it describes.
//! Per-property subscriber sets shrink only when effects re-run or are
//! disposed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;

use crate::error::Result;
use crate::reactive::{ReactiveContext, Runtime, SubscriberSet};

/// Stable identity of a reactive object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetId(u64);

impl TargetId {
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for TargetId {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-target dependents, keyed by property.
#[derive(Default)]
struct TargetEntry {
    properties: HashMap<String, Arc<SubscriberSet>>,
}

/// Map from target to property to dependent computations.
#[derive(Default)]
pub struct Registry {
    targets: DashMap<TargetId, TargetEntry>,
}

static REGISTRY: OnceLock<Registry> = OnceLock::new();

/// The process-wide registry used by [`ReactiveObject`](super::ReactiveObject).
pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a read of `key` on `target` by the running computation.
    ///
    /// Outside a reactive context this does nothing, and in particular
    /// creates no entry.
    pub fn track(&self, target: TargetId, key: &str) {
        if !ReactiveContext::is_active() {
            return;
        }

        // Release the shard lock before subscribing.
        let set = {
            let mut entry = self.targets.entry(target).or_insert_with(|| {
                tracing::trace!(object = ?target, "registry entry created");
                TargetEntry::default()
            });
            entry
                .properties
                .entry(key.to_owned())
                .or_insert_with(SubscriberSet::new)
                .clone()
        };
        set.track();
    }

    /// Notify everything that read `key` on `target`.
    pub fn trigger(&self, target: TargetId, key: &str) -> Result<()> {
        let subscribers = self
            .targets
            .get(&target)
            .and_then(|entry| entry.properties.get(key).map(|set| set.snapshot()));

        match subscribers {
            Some(subscribers) => Runtime::notify(subscribers),
            None => Ok(()),
        }
    }

    /// Forget everything about `target`.
    pub fn release(&self, target: TargetId) {
        // The entry is dropped after the shard lock is released: dropping it
        // can drop effects, which can drop other targets.
        if let Some((_, entry)) = self.targets.remove(&target) {
            tracing::trace!(object = ?target, properties = entry.properties.len(), "registry entry released");
            drop(entry);
        }
    }

    /// Whether `target` has an entry.
    pub fn contains(&self, target: TargetId) -> bool {
        self.targets.contains_key(&target)
    }

    /// Number of computations subscribed to `key` on `target`.
    pub fn dependent_count(&self, target: TargetId, key: &str) -> usize {
        self.targets
            .get(&target)
            .and_then(|entry| entry.properties.get(key).map(|set| set.len()))
            .unwrap_or(0)
    }

    /// Number of targets with an entry.
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("targets", &self.len())
            .finish()
    }
}
