//! Subscriber types for the reactive system.
//!
//! A Subscriber represents any computation that depends on reactive values.
//! This includes memos and effects. Every readable source (signal, memo,
//! reactive-object property) owns a [`SubscriberSet`] recording who read it.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;
use smallvec::SmallVec;

use super::context::ReactiveContext;
use crate::error::Result;

/// Unique identifier for a subscriber.
///
/// Each subscriber (memo, effect, or other reactive computation) gets a unique
/// ID when created. This ID is used to track dependencies and avoid duplicate
/// subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    ///
    /// Uses an atomic counter to ensure uniqueness across threads.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Unique identifier for a readable source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId(u64);

impl SourceId {
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SourceId {
    fn default() -> Self {
        Self::new()
    }
}

/// A computation that can be notified when something it read changes.
pub trait Subscriber: Send + Sync {
    /// Get the subscriber ID for this computation.
    fn subscriber_id(&self) -> SubscriberId;

    /// Whether this computation runs as soon as it is notified (effects) or
    /// waits to be read (memos).
    fn is_eager(&self) -> bool;

    /// Mark this computation stale.
    ///
    /// Lazy subscribers return their own subscribers so that the staleness
    /// keeps travelling downstream. Eager subscribers return nothing.
    fn invalidate(&self) -> Subscribers;

    /// Run the computation in response to a notification.
    fn run(self: Arc<Self>) -> Result<()>;

    /// Take ownership of an effect or memo created while this computation
    /// was running.
    fn adopt(&self, _child: Box<dyn Owned>) {}
}

/// A computation that can be owned by another and disposed with it.
pub trait Owned: Send + Sync {
    /// Unsubscribe from everything and never run again.
    fn dispose(&self);
}

/// Snapshot of a subscriber set, taken before notifying.
pub type Subscribers = SmallVec<[Arc<dyn Subscriber>; 4]>;

/// Insertion-ordered set of the computations that read one source.
///
/// Subscribers are held strongly: a computation stays alive for as long as
/// something it depends on can still notify it.
pub struct SubscriberSet {
    id: SourceId,
    entries: Mutex<IndexMap<SubscriberId, Arc<dyn Subscriber>>>,
}

impl SubscriberSet {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            id: SourceId::new(),
            entries: Mutex::new(IndexMap::new()),
        })
    }

    /// The ID of the source this set belongs to.
    pub fn source_id(&self) -> SourceId {
        self.id
    }

    /// Subscribe the running computation, if there is one.
    ///
    /// This is the read half of every tracked source.
    pub fn track(self: &Arc<Self>) {
        if let Some(subscriber) = ReactiveContext::track(Dependency::new(self)) {
            self.insert(subscriber);
        }
    }

    /// Add a subscriber. Adding one that is already present keeps its
    /// original position.
    pub fn insert(&self, subscriber: Arc<dyn Subscriber>) {
        let id = subscriber.subscriber_id();
        let mut entries = self.entries.lock();
        if !entries.contains_key(&id) {
            tracing::trace!(source = ?self.id, subscriber = %id, "subscribed");
            entries.insert(id, subscriber);
        }
    }

    /// Remove a subscriber, keeping the order of the rest.
    pub fn remove(&self, id: SubscriberId) -> bool {
        // The removed subscriber is dropped after the lock is released:
        // dropping a memo can unsubscribe it from this same set.
        let removed = self.entries.lock().shift_remove(&id);
        if removed.is_some() {
            tracing::trace!(source = ?self.id, subscriber = %id, "unsubscribed");
        }
        removed.is_some()
    }

    pub fn contains(&self, id: SubscriberId) -> bool {
        self.entries.lock().contains_key(&id)
    }

    /// Clone the current subscribers in insertion order.
    ///
    /// The lock is released before anyone is notified, so subscribers may
    /// freely subscribe or unsubscribe while the snapshot is being walked.
    pub fn snapshot(&self) -> Subscribers {
        self.entries.lock().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl fmt::Debug for SubscriberSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberSet")
            .field("id", &self.id)
            .field("len", &self.len())
            .finish()
    }
}

/// A source read by a computation during one run.
///
/// Holds the source's subscriber set weakly so that a computation never keeps
/// its sources alive.
#[derive(Clone)]
pub struct Dependency {
    source: SourceId,
    subscribers: Weak<SubscriberSet>,
}

impl Dependency {
    pub fn new(set: &Arc<SubscriberSet>) -> Self {
        Self {
            source: set.source_id(),
            subscribers: Arc::downgrade(set),
        }
    }

    pub fn source_id(&self) -> SourceId {
        self.source
    }

    /// Remove `subscriber` from the source, if the source is still alive.
    pub fn unsubscribe(&self, subscriber: SubscriberId) {
        if let Some(set) = self.subscribers.upgrade() {
            set.remove(subscriber);
        }
    }
}

impl fmt::Debug for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Dependency").field(&self.source).finish()
    }
}

/// Dependencies established by one run, in first-read order.
pub type Dependencies = SmallVec<[Dependency; 4]>;

/// Unsubscribe `subscriber` from every source in `previous` that is missing
/// from `current`.
pub(crate) fn unsubscribe_stale(
    subscriber: SubscriberId,
    previous: &[Dependency],
    current: &[Dependency],
) {
    for old in previous {
        if !current.iter().any(|dep| dep.source == old.source) {
            old.unsubscribe(subscriber);
        }
    }
}
