//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and
//! tracks which computations depend on it.
//!
//! # How Signals Work
//!
//! 1. When a signal is read within a reactive context (memo/effect), the
//!    signal registers that context as a subscriber.
//!
//! 2. When a signal's value is written, all subscribers are notified,
//!    synchronously and in the order they subscribed, before `set` returns.
//!
//! 3. Notifications trigger re-execution of dependent computations.
//!
//! # Write Policy
//!
//! [`Signal::set`] and [`Signal::update`] notify on every call, whether or
//! not the value changed. [`Signal::set_if_changed`] is the explicit
//! comparing variant.
//!
//! # Memory Layout
//!
//! Each signal consists of:
//! - The value (stored behind Arc<RwLock>)
//! - A set of subscribers (grows with number of dependents)

use std::fmt::Debug;
use std::sync::Arc;

use parking_lot::RwLock;

use super::runtime::Runtime;
use super::subscriber::{SourceId, SubscriberSet};
use crate::error::Result;

/// A reactive signal holding a value of type T.
///
/// # Type Parameters
///
/// - `T`: The type of value stored in the signal. Must be Clone + Send + Sync.
///
/// # Example
///
/// ```rust
/// use weft_core::Signal;
///
/// let count = Signal::new(0);
///
/// // Read the value
/// assert_eq!(count.get(), 0);
///
/// // Update the value (notifies subscribers)
/// count.set(5).unwrap();
/// count.update(|n| n + 1).unwrap();
/// assert_eq!(count.get(), 6);
/// ```
pub struct Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// The current value.
    value: Arc<RwLock<T>>,

    /// Computations that read this signal.
    subscribers: Arc<SubscriberSet>,
}

impl<T> Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a new signal with the given initial value.
    pub fn new(value: T) -> Self {
        Self {
            value: Arc::new(RwLock::new(value)),
            subscribers: SubscriberSet::new(),
        }
    }

    /// Get the signal's unique ID.
    pub fn id(&self) -> SourceId {
        self.subscribers.source_id()
    }

    /// Get the current value.
    ///
    /// If called within a reactive context, this also registers the
    /// current computation as a subscriber.
    pub fn get(&self) -> T {
        self.subscribers.track();
        self.get_untracked()
    }

    /// Get the current value without tracking dependencies.
    pub fn get_untracked(&self) -> T {
        self.value.read().clone()
    }

    /// Set a new value and notify subscribers.
    ///
    /// Subscribers are notified even if `value` equals the current value.
    /// Errors raised by the effects that re-run are returned here.
    pub fn set(&self, value: T) -> Result<()> {
        *self.value.write() = value;
        self.notify()
    }

    /// Update the value using a function of the previous value.
    ///
    /// `f` sees the value as it was before this call and runs without the
    /// signal locked, so it may read the signal itself.
    pub fn update<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&T) -> T,
    {
        let current = self.get_untracked();
        self.set(f(&current))
    }

    /// Set a new value, notifying subscribers only if it differs from the
    /// current one.
    ///
    /// Returns whether subscribers were notified.
    pub fn set_if_changed(&self, value: T) -> Result<bool>
    where
        T: PartialEq,
    {
        {
            let mut guard = self.value.write();
            if *guard == value {
                return Ok(false);
            }
            *guard = value;
        }
        self.notify()?;
        Ok(true)
    }

    /// Notify all subscribers that the value has changed.
    fn notify(&self) -> Result<()> {
        Runtime::notify(self.subscribers.snapshot())
    }

    /// Get the number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Split into a read half and a write half sharing this signal.
    pub fn split(self) -> (ReadSignal<T>, WriteSignal<T>) {
        (ReadSignal(self.clone()), WriteSignal(self))
    }
}

impl<T> Clone for Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
            subscribers: Arc::clone(&self.subscribers),
        }
    }
}

impl<T> Debug for Signal<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.id())
            .field("value", &self.get_untracked())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

/// The read half of a signal.
pub struct ReadSignal<T>(Signal<T>)
where
    T: Clone + Send + Sync + 'static;

impl<T> ReadSignal<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Get the current value, subscribing the running computation.
    pub fn get(&self) -> T {
        self.0.get()
    }

    pub fn get_untracked(&self) -> T {
        self.0.get_untracked()
    }

    pub fn id(&self) -> SourceId {
        self.0.id()
    }

    pub fn subscriber_count(&self) -> usize {
        self.0.subscriber_count()
    }
}

impl<T> Clone for ReadSignal<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Debug for ReadSignal<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ReadSignal").field(&self.0).finish()
    }
}

/// The write half of a signal.
pub struct WriteSignal<T>(Signal<T>)
where
    T: Clone + Send + Sync + 'static;

impl<T> WriteSignal<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Replace the value and notify subscribers.
    pub fn set(&self, value: T) -> Result<()> {
        self.0.set(value)
    }

    /// Replace the value with `f(previous)` and notify subscribers.
    pub fn update<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&T) -> T,
    {
        self.0.update(f)
    }

    pub fn set_if_changed(&self, value: T) -> Result<bool>
    where
        T: PartialEq,
    {
        self.0.set_if_changed(value)
    }
}

impl<T> Clone for WriteSignal<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Debug for WriteSignal<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("WriteSignal").field(&self.0.id()).finish()
    }
}

/// Create a signal and return its read and write halves.
///
/// ```rust
/// use weft_core::create_signal;
///
/// let (name, set_name) = create_signal(String::from("Craig"));
/// set_name.set(String::from("Bob")).unwrap();
/// assert_eq!(name.get(), "Bob");
/// ```
pub fn create_signal<T>(value: T) -> (ReadSignal<T>, WriteSignal<T>)
where
    T: Clone + Send + Sync + 'static,
{
    Signal::new(value).split()
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
