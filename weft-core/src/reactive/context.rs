//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when a signal is read,
//! we can register the current computation as a dependent.
//!
//! # Implementation
//!
//! We use a thread-local stack to track the currently executing computation.
//! When entering a reactive context (e.g., running a memo or effect), we push
//! the subscriber onto the stack. When the computation completes, we pop it,
//! which restores whatever was running before.
//!
//! This design supports nested reactive contexts (e.g., a memo that reads
//! from another memo, or an effect created inside another effect's body).
//! Untracked reads push an entry without a subscriber.

use std::cell::RefCell;
use std::sync::Arc;

use super::subscriber::{Dependencies, Dependency, Subscriber, SubscriberId};

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<ContextEntry>> = const { RefCell::new(Vec::new()) };
}

/// An entry in the reactive context stack.
struct ContextEntry {
    /// The running computation, or `None` inside an untracked scope.
    subscriber: Option<Arc<dyn Subscriber>>,
    /// Sources read during this computation, deduplicated, in first-read order.
    dependencies: Dependencies,
}

/// Guard that pops the context when dropped.
///
/// This ensures the context stack is properly maintained even if
/// the computation panics.
pub struct ReactiveContext {
    subscriber_id: Option<SubscriberId>,
}

impl ReactiveContext {
    /// Enter a new reactive context for the given subscriber.
    ///
    /// While this context is active, any sources that are read will
    /// register the subscriber as a dependent.
    ///
    /// The context is automatically exited when the returned guard is dropped.
    pub fn enter(subscriber: Arc<dyn Subscriber>) -> Self {
        let subscriber_id = Some(subscriber.subscriber_id());
        Self::push(Some(subscriber));
        Self { subscriber_id }
    }

    /// Enter a scope in which reads do not subscribe anything.
    pub fn enter_untracked() -> Self {
        Self::push(None);
        Self { subscriber_id: None }
    }

    fn push(subscriber: Option<Arc<dyn Subscriber>>) {
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(ContextEntry {
                subscriber,
                dependencies: Dependencies::new(),
            });
        });
    }

    /// Check if there is an active reactive context.
    pub fn is_active() -> bool {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .is_some_and(|entry| entry.subscriber.is_some())
        })
    }

    /// Get the current subscriber ID, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        Self::current().map(|subscriber| subscriber.subscriber_id())
    }

    /// Get the running computation, if any.
    pub fn current() -> Option<Arc<dyn Subscriber>> {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .and_then(|entry| entry.subscriber.clone())
        })
    }

    /// Number of entries on this thread's stack.
    pub fn depth() -> usize {
        CONTEXT_STACK.with(|stack| stack.borrow().len())
    }

    /// Record a read of `dependency` by the running computation.
    ///
    /// Returns the computation that should be subscribed, or `None` when
    /// nothing is being tracked.
    pub fn track(dependency: Dependency) -> Option<Arc<dyn Subscriber>> {
        CONTEXT_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            let entry = stack.last_mut()?;
            let subscriber = entry.subscriber.clone()?;
            if !entry
                .dependencies
                .iter()
                .any(|dep| dep.source_id() == dependency.source_id())
            {
                entry.dependencies.push(dependency);
            }
            Some(subscriber)
        })
    }

    /// Take the dependencies collected so far by this context.
    pub fn take_dependencies(&self) -> Dependencies {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow_mut()
                .last_mut()
                .map(|entry| std::mem::take(&mut entry.dependencies))
                .unwrap_or_default()
        })
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        CONTEXT_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();

            // Verify we're popping the right context.
            // This helps catch bugs where contexts are mismatched.
            if let Some(entry) = popped {
                debug_assert_eq!(
                    entry.subscriber.as_ref().map(|s| s.subscriber_id()),
                    self.subscriber_id,
                    "ReactiveContext mismatch"
                );
            }
        });
    }
}

/// Runs a computation in its own context and hands what it read to
/// `finish` when the scope ends.
///
/// `finish` also runs when the computation unwinds, so sources subscribed
/// before a panic are still recorded by their subscriber.
pub(crate) struct TrackingScope<F>
where
    F: FnOnce(Dependencies),
{
    ctx: Option<ReactiveContext>,
    finish: Option<F>,
}

impl<F> TrackingScope<F>
where
    F: FnOnce(Dependencies),
{
    pub(crate) fn enter(subscriber: Arc<dyn Subscriber>, finish: F) -> Self {
        Self {
            ctx: Some(ReactiveContext::enter(subscriber)),
            finish: Some(finish),
        }
    }
}

impl<F> Drop for TrackingScope<F>
where
    F: FnOnce(Dependencies),
{
    fn drop(&mut self) {
        if let (Some(ctx), Some(finish)) = (self.ctx.take(), self.finish.take()) {
            let dependencies = ctx.take_dependencies();
            drop(ctx);
            finish(dependencies);
        }
    }
}
