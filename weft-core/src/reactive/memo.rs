//! Memo Implementation
//!
//! A Memo is a cached derived value that re-evaluates only when its
//! dependencies change.
//!
//! # How Memos Work
//!
//! 1. On first access, the memo runs its computation and caches the result.
//!
//! 2. When accessed again, if no dependencies have changed, returns cached value.
//!
//! 3. When a dependency changes, the memo is marked dirty. Nothing is
//!    recomputed yet, but the staleness is passed on to whatever read the
//!    memo, so dependent effects still re-run.
//!
//! 4. On next access, the memo recomputes and is clean again.
//!
//! # Why This Matters
//!
//! This "lazy" approach avoids unnecessary recomputation:
//!
//! - A signal changes
//! - 10 memos depend on it
//! - Only the memos actually accessed will recompute
//! - Memos that are never read stay dirty (no wasted work)
//!
//! # Lifetime
//!
//! A memo is disposed when its last handle is dropped, when
//! [`Memo::dispose`] is called, or, for a memo created inside an effect, when
//! that effect re-runs or is disposed. A disposed memo unsubscribes from its
//! sources; reading it afterwards computes a fresh value without caching.
//!
//! # Locking
//!
//! The computation runs with no lock held, so it may read other memos and
//! signals freely.

use std::convert::Infallible;
use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use super::context::{ReactiveContext, TrackingScope};
use super::runtime::Runtime;
use super::subscriber::{
    unsubscribe_stale, Dependencies, Owned, SourceId, Subscriber, SubscriberId, SubscriberSet,
    Subscribers,
};
use crate::error::{BoxError, ReactiveError, Result};

/// Dirty state for a memo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoState {
    /// The cached value is up-to-date.
    Clean,

    /// The memo needs to recompute before its value can be read.
    Dirty,
}

/// A cached derived value that recomputes only when dependencies change.
///
/// # Type Parameters
///
/// - `T`: The type of the computed value. Must be Clone + Send + Sync.
/// - `E`: The error a fallible computation can return. Memos built with
///   [`Memo::new`] cannot fail.
///
/// # Example
///
/// ```rust
/// use weft_core::{Memo, Signal};
///
/// let first = Signal::new("Hello");
/// let last = Signal::new("World");
///
/// let (f, l) = (first.clone(), last.clone());
/// let full = Memo::new(move || format!("{} {}", f.get(), l.get()));
/// assert_eq!(full.get(), "Hello World");
///
/// first.set("Hi").unwrap();
/// assert_eq!(full.get(), "Hi World");
/// ```
pub struct Memo<T, E = Infallible>
where
    T: Clone + Send + Sync + 'static,
    E: 'static,
{
    handle: Arc<MemoHandle<T, E>>,
}

/// Shared by every clone of a [`Memo`]; disposes the memo when the last one
/// goes away.
struct MemoHandle<T, E> {
    inner: Arc<MemoInner<T, E>>,
}

impl<T, E> Drop for MemoHandle<T, E> {
    fn drop(&mut self) {
        self.inner.dispose();
    }
}

type ComputeFn<T, E> = dyn Fn() -> std::result::Result<T, E> + Send + Sync;

struct MemoInner<T, E> {
    /// The subscriber ID used for dependency tracking.
    id: SubscriberId,

    /// The computation function.
    compute: Box<ComputeFn<T, E>>,

    /// The cached value (None if never computed).
    value: RwLock<Option<T>>,

    /// Current dirty state.
    state: Mutex<MemoState>,

    /// Sources read by the most recent computation.
    dependencies: Mutex<Dependencies>,

    /// Computations that read this memo.
    subscribers: Arc<SubscriberSet>,

    compute_count: AtomicUsize,

    disposed: AtomicBool,
}

impl<T> Memo<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a new memo with the given computation function.
    ///
    /// The computation is not run immediately. It runs on first access.
    pub fn new<F>(compute: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::build(move || Ok(compute()))
    }

    /// Get the current value, recomputing if necessary.
    ///
    /// This is the main entry point for reading a memo's value. Inside a
    /// reactive context it also subscribes the running computation.
    pub fn get(&self) -> T {
        match self.handle.inner.read() {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    /// Get the current value without subscribing the running computation.
    ///
    /// Still recomputes if the memo is dirty.
    pub fn get_untracked(&self) -> T {
        Runtime::untrack(|| self.get())
    }
}

impl<T, E> Memo<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: 'static,
{
    /// Create a memo whose computation can fail.
    ///
    /// Read it with [`Memo::try_get`]. A failed computation caches nothing
    /// and leaves the memo dirty, so the next read tries again.
    pub fn try_new<F>(compute: F) -> Self
    where
        F: Fn() -> std::result::Result<T, E> + Send + Sync + 'static,
    {
        Self::build(compute)
    }

    fn build<F>(compute: F) -> Self
    where
        F: Fn() -> std::result::Result<T, E> + Send + Sync + 'static,
    {
        let memo = Self {
            handle: Arc::new(MemoHandle {
                inner: Arc::new(MemoInner {
                    id: SubscriberId::new(),
                    compute: Box::new(compute),
                    value: RwLock::new(None),
                    state: Mutex::new(MemoState::Dirty),
                    dependencies: Mutex::new(Dependencies::new()),
                    subscribers: SubscriberSet::new(),
                    compute_count: AtomicUsize::new(0),
                    disposed: AtomicBool::new(false),
                }),
            }),
        };

        if let Some(parent) = ReactiveContext::current() {
            parent.adopt(Box::new(memo.clone()));
        }

        memo
    }

    /// Get the current value, recomputing if necessary.
    ///
    /// A failing computation is reported as [`ReactiveError::Memo`].
    pub fn try_get(&self) -> Result<T>
    where
        E: Into<BoxError>,
    {
        self.handle
            .inner
            .read()
            .map_err(|source| ReactiveError::Memo {
                subscriber: self.id(),
                source: source.into(),
            })
    }

    /// Get the subscriber ID for this memo.
    pub fn id(&self) -> SubscriberId {
        self.handle.inner.id
    }

    /// Get the ID this memo has as a source.
    pub fn source_id(&self) -> SourceId {
        self.handle.inner.subscribers.source_id()
    }

    /// Get the current dirty state.
    pub fn state(&self) -> MemoState {
        *self.handle.inner.state.lock()
    }

    /// Get the number of dependents.
    pub fn dependent_count(&self) -> usize {
        self.handle.inner.subscribers.len()
    }

    /// Get the number of sources read by the most recent computation.
    pub fn dependency_count(&self) -> usize {
        self.handle.inner.dependencies.lock().len()
    }

    /// Check if the memo has a cached value.
    pub fn has_value(&self) -> bool {
        self.handle.inner.value.read().is_some()
    }

    /// Get the number of times the computation has run.
    pub fn compute_count(&self) -> usize {
        self.handle.inner.compute_count.load(Ordering::SeqCst)
    }

    /// Unsubscribe from every source. The memo is never invalidated again.
    pub fn dispose(&self) {
        self.handle.inner.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.handle.inner.is_disposed()
    }
}

impl<T, E> MemoInner<T, E> {
    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        let dependencies = std::mem::take(&mut *self.dependencies.lock());
        for dep in &dependencies {
            dep.unsubscribe(self.id);
        }
        tracing::debug!(memo = %self.id, "memo disposed");
    }

    /// Replace the dependencies of the previous computation with `current`.
    fn record_dependencies(&self, current: Dependencies) {
        if self.is_disposed() {
            for dep in &current {
                dep.unsubscribe(self.id);
            }
        } else {
            let mut dependencies = self.dependencies.lock();
            let previous = std::mem::replace(&mut *dependencies, current);
            unsubscribe_stale(self.id, &previous, &dependencies);
        }
    }
}

impl<T, E> MemoInner<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: 'static,
{
    fn read(self: &Arc<Self>) -> std::result::Result<T, E> {
        if self.is_disposed() {
            return Runtime::untrack(|| (self.compute)());
        }

        self.subscribers.track();

        if *self.state.lock() == MemoState::Clean {
            if let Some(value) = self.value.read().clone() {
                return Ok(value);
            }
        }

        self.recompute()
    }

    /// Recompute the memo's value.
    ///
    /// This runs the computation function within a reactive context to
    /// track dependencies.
    fn recompute(self: &Arc<Self>) -> std::result::Result<T, E> {
        // Clean before computing: a write made during the computation must
        // leave the memo dirty.
        let guard = DirtyUnlessFinished::mark_clean(&self.state);

        let outcome = {
            let _scope = TrackingScope::enter(Arc::clone(self) as Arc<dyn Subscriber>, |current| {
                self.record_dependencies(current)
            });
            (self.compute)()
        };
        let count = self.compute_count.fetch_add(1, Ordering::SeqCst) + 1;

        let value = match outcome {
            Ok(value) => value,
            Err(err) => {
                tracing::debug!(memo = %self.id, count, "memo computation failed");
                return Err(err);
            }
        };
        guard.finish();

        *self.value.write() = Some(value.clone());
        tracing::debug!(memo = %self.id, count, "memo recomputed");

        Ok(value)
    }
}

impl<T, E> Subscriber for MemoInner<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: 'static,
{
    fn subscriber_id(&self) -> SubscriberId {
        self.id
    }

    fn is_eager(&self) -> bool {
        false
    }

    fn invalidate(&self) -> Subscribers {
        if self.is_disposed() {
            return Subscribers::new();
        }
        *self.state.lock() = MemoState::Dirty;
        self.subscribers.snapshot()
    }

    fn run(self: Arc<Self>) -> Result<()> {
        // Lazy: the next read recomputes.
        Ok(())
    }
}

/// Marks a memo clean for a computation and dirty again unless the
/// computation finishes, so failures and panics both leave it dirty.
struct DirtyUnlessFinished<'a> {
    state: &'a Mutex<MemoState>,
    finished: bool,
}

impl<'a> DirtyUnlessFinished<'a> {
    fn mark_clean(state: &'a Mutex<MemoState>) -> Self {
        *state.lock() = MemoState::Clean;
        Self {
            state,
            finished: false,
        }
    }

    fn finish(mut self) {
        self.finished = true;
    }
}

impl Drop for DirtyUnlessFinished<'_> {
    fn drop(&mut self) {
        if !self.finished {
            *self.state.lock() = MemoState::Dirty;
        }
    }
}

impl<T, E> Owned for Memo<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: 'static,
{
    fn dispose(&self) {
        Memo::dispose(self);
    }
}

impl<T, E> Clone for Memo<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: 'static,
{
    fn clone(&self) -> Self {
        Self {
            handle: Arc::clone(&self.handle),
        }
    }
}

impl<T, E> Debug for Memo<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memo")
            .field("id", &self.id())
            .field("state", &self.state())
            .field("has_value", &self.has_value())
            .field("dependent_count", &self.dependent_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Create a memo over `compute`.
pub fn create_memo<T, F>(compute: F) -> Memo<T>
where
    T: Clone + Send + Sync + 'static,
    F: Fn() -> T + Send + Sync + 'static,
{
    Memo::new(compute)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
