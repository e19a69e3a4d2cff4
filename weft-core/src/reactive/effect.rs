//! Effect Implementation
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately to establish
//!    initial dependencies.
//!
//! 2. When any dependency changes, the effect re-runs synchronously, before
//!    the write that triggered it returns.
//!
//! 3. Each run records exactly what it read. Sources read by the previous run
//!    but not by this one are unsubscribed afterwards.
//!
//! # Use Cases
//!
//! Effects are used to synchronize reactive state with the outside world:
//!
//! - Updating the DOM when state changes
//! - Logging state changes
//! - Writing to files
//!
//! # Differences from Memo
//!
//! - Memos return a value; effects do not.
//! - Memos are lazy (compute on access); effects are eager (run when deps change).
//! - Memos cache results; effects just run their side effect.
//!
//! # Ownership
//!
//! An effect created while another effect is running belongs to that outer
//! effect and is disposed when the outer one re-runs or is disposed.
//! Dropping an `Effect` handle does not dispose it; call [`Effect::dispose`].
//!
//! # Re-entrancy
//!
//! A write performed by an effect body can notify the same effect while it
//! is still running. What happens then is decided by
//! [`CyclePolicy`](crate::CyclePolicy).

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::context::{ReactiveContext, TrackingScope};
use super::runtime::Runtime;
use super::subscriber::{
    unsubscribe_stale, Dependencies, Owned, Subscriber, SubscriberId, Subscribers,
};
use crate::config::CyclePolicy;
use crate::error::{BoxError, ReactiveError, Result};

type EffectFn = dyn Fn() -> std::result::Result<(), BoxError> + Send + Sync;

/// A side-effecting computation that runs when dependencies change.
///
/// # Example
///
/// ```rust
/// use std::sync::{Arc, Mutex};
/// use weft_core::{Effect, Signal};
///
/// let count = Signal::new(0);
/// let seen = Arc::new(Mutex::new(Vec::new()));
///
/// let (c, log) = (count.clone(), seen.clone());
/// let _effect = Effect::new(move || log.lock().unwrap().push(c.get())).unwrap();
///
/// count.set(5).unwrap();
/// assert_eq!(*seen.lock().unwrap(), vec![0, 5]);
/// ```
pub struct Effect {
    inner: Arc<EffectInner>,
}

struct EffectInner {
    /// The subscriber ID used for dependency tracking.
    id: SubscriberId,

    /// The effect function.
    body: Box<EffectFn>,

    /// Sources read by the most recent run.
    dependencies: Mutex<Dependencies>,

    /// Effects and memos created during the most recent run.
    children: Mutex<Vec<Box<dyn Owned>>>,

    disposed: AtomicBool,

    /// Set for the duration of a run.
    running: AtomicBool,

    /// Notified during its own run under `CyclePolicy::Defer`.
    pending: AtomicBool,

    /// Notified during its own run under `CyclePolicy::Error`.
    cycle: AtomicBool,

    run_count: AtomicUsize,
}

impl Effect {
    /// Create a new effect with the given function.
    ///
    /// The function runs immediately to establish initial dependencies.
    /// An error from that first run is returned and the effect is disposed.
    pub fn new<F>(run: F) -> Result<Self>
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::try_new(move || {
            run();
            Ok::<(), BoxError>(())
        })
    }

    /// Create a new effect whose body can fail.
    ///
    /// A failure is reported as [`ReactiveError::Effect`] from whichever call
    /// caused the run: this constructor for the first run, the triggering
    /// write afterwards.
    pub fn try_new<F, E>(run: F) -> Result<Self>
    where
        F: Fn() -> std::result::Result<(), E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        let effect = Self::new_lazy_fallible(run);
        if let Err(err) = effect.execute() {
            effect.dispose();
            return Err(err);
        }
        Ok(effect)
    }

    /// Create a new effect without running it immediately.
    ///
    /// Useful for cases where you want to control when the effect first runs.
    pub fn new_lazy<F>(run: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::new_lazy_fallible(move || {
            run();
            Ok::<(), BoxError>(())
        })
    }

    fn new_lazy_fallible<F, E>(run: F) -> Self
    where
        F: Fn() -> std::result::Result<(), E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        let effect = Self {
            inner: Arc::new(EffectInner {
                id: SubscriberId::new(),
                body: Box::new(move || run().map_err(Into::into)),
                dependencies: Mutex::new(Dependencies::new()),
                children: Mutex::new(Vec::new()),
                disposed: AtomicBool::new(false),
                running: AtomicBool::new(false),
                pending: AtomicBool::new(false),
                cycle: AtomicBool::new(false),
                run_count: AtomicUsize::new(0),
            }),
        };

        if let Some(parent) = ReactiveContext::current() {
            parent.adopt(Box::new(effect.clone()));
        }

        effect
    }

    /// Get the effect's unique ID.
    pub fn id(&self) -> SubscriberId {
        self.inner.id
    }

    /// Run the effect now, exactly as a dependency change would.
    pub fn execute(&self) -> Result<()> {
        Arc::clone(&self.inner).run()
    }

    /// Dispose of the effect.
    ///
    /// Unsubscribes it from everything it read, disposes the effects it owns,
    /// and guarantees it never runs again.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    /// Check if the effect has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Get the number of times the effect has run.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.load(Ordering::SeqCst)
    }

    /// Get the number of sources read by the most recent run.
    pub fn dependency_count(&self) -> usize {
        self.inner.dependencies.lock().len()
    }

    /// Get the number of effects and memos owned from the most recent run.
    pub fn child_count(&self) -> usize {
        self.inner.children.lock().len()
    }
}

impl EffectInner {
    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Run the body, then keep re-running while writes made during the run
    /// asked for it.
    fn execute(self: &Arc<Self>) -> Result<()> {
        let _running = RunningFlag::raise(&self.running);
        let limit = Runtime::config().max_reruns;
        let mut reruns = 0;

        loop {
            self.pending.store(false, Ordering::SeqCst);
            self.run_once()?;

            if self.cycle.swap(false, Ordering::SeqCst) {
                return Err(ReactiveError::Cycle { subscriber: self.id });
            }
            if self.is_disposed() || !self.pending.load(Ordering::SeqCst) {
                return Ok(());
            }

            reruns += 1;
            if reruns > limit {
                self.pending.store(false, Ordering::SeqCst);
                tracing::warn!(effect = %self.id, limit, "effect keeps re-triggering itself");
                return Err(ReactiveError::RerunLimit {
                    subscriber: self.id,
                    limit,
                });
            }
            tracing::debug!(effect = %self.id, reruns, "re-running after write during own run");
        }
    }

    fn run_once(self: &Arc<Self>) -> Result<()> {
        self.cycle.store(false, Ordering::SeqCst);
        self.dispose_children();

        let outcome = {
            let _scope = TrackingScope::enter(Arc::clone(self) as Arc<dyn Subscriber>, |current| {
                self.record_dependencies(current)
            });
            (self.body)()
        };

        let runs = self.run_count.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(effect = %self.id, runs, "effect ran");

        outcome.map_err(|source| ReactiveError::Effect {
            subscriber: self.id,
            source,
        })
    }

    /// Replace the dependencies of the previous run with `current`.
    fn record_dependencies(&self, current: Dependencies) {
        if self.is_disposed() {
            // Disposed by its own body: drop whatever this run subscribed to.
            for dep in &current {
                dep.unsubscribe(self.id);
            }
        } else {
            let mut dependencies = self.dependencies.lock();
            let previous = std::mem::replace(&mut *dependencies, current);
            unsubscribe_stale(self.id, &previous, &dependencies);
        }
    }

    fn dispose_children(&self) {
        let children = std::mem::take(&mut *self.children.lock());
        for child in children {
            child.dispose();
        }
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        let dependencies = std::mem::take(&mut *self.dependencies.lock());
        for dep in &dependencies {
            dep.unsubscribe(self.id);
        }
        self.dispose_children();
        tracing::debug!(effect = %self.id, "effect disposed");
    }
}

impl Subscriber for EffectInner {
    fn subscriber_id(&self) -> SubscriberId {
        self.id
    }

    fn is_eager(&self) -> bool {
        true
    }

    fn invalidate(&self) -> Subscribers {
        Subscribers::new()
    }

    fn run(self: Arc<Self>) -> Result<()> {
        if self.is_disposed() {
            return Ok(());
        }

        if !self.running.load(Ordering::SeqCst) {
            return self.execute();
        }

        match Runtime::config().cycle_policy {
            CyclePolicy::Defer => {
                tracing::debug!(effect = %self.id, "write during own run, deferring re-run");
                self.pending.store(true, Ordering::SeqCst);
                Ok(())
            }
            CyclePolicy::Error => {
                tracing::warn!(effect = %self.id, "write during own run");
                self.cycle.store(true, Ordering::SeqCst);
                Err(ReactiveError::Cycle { subscriber: self.id })
            }
        }
    }

    fn adopt(&self, child: Box<dyn Owned>) {
        if self.is_disposed() {
            child.dispose();
        } else {
            self.children.lock().push(child);
        }
    }
}

/// Raises a flag for the lifetime of the guard, including unwinding.
struct RunningFlag<'a>(&'a AtomicBool);

impl<'a> RunningFlag<'a> {
    fn raise(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for RunningFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Owned for Effect {
    fn dispose(&self) {
        Effect::dispose(self);
    }
}

impl Clone for Effect {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl std::fmt::Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.id())
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Create an effect and run it once.
pub fn create_effect<F>(run: F) -> Result<Effect>
where
    F: Fn() + Send + Sync + 'static,
{
    Effect::new(run)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
