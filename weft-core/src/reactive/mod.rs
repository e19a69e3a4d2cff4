//! Reactive Primitives
//!
//! This module implements the core reactive system: signals, memos, and effects.
//! These primitives form the foundation of weft's fine-grained reactivity.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state. When a signal's value is read
//! within a tracking context (such as a memo or effect), the signal automatically
//! registers that context as a dependent. When the signal's value is written,
//! all dependents are notified.
//!
//! ## Memos
//!
//! A Memo is a derived value that caches its result. It re-evaluates only when
//! one of its dependencies changes, and only once it is read again. Memos are
//! useful for expensive computations that should not be repeated unnecessarily.
//! A memo lives as long as its handles do, or until the effect that created
//! it re-runs.
//!
//! ## Effects
//!
//! An Effect is a side-effecting computation that runs whenever its dependencies
//! change. Effects are used to synchronize reactive state with external systems,
//! such as updating the DOM or logging.
//!
//! # Implementation Notes
//!
//! The reactive system uses a thread-local tracking context to automatically
//! detect dependencies. When a signal is read, we check if there is an active
//! tracking context and, if so, register the dependency.
//!
//! This approach (sometimes called "automatic dependency tracking" or
//! "transparent reactivity") is used by SolidJS, Vue 3, and Leptos.

mod signal;
mod context;
mod subscriber;
mod memo;
mod effect;
mod runtime;

pub use signal::{create_signal, ReadSignal, Signal, WriteSignal};
pub use context::ReactiveContext;
pub use subscriber::{
    Dependencies, Dependency, Owned, SourceId, Subscriber, SubscriberId, SubscriberSet,
    Subscribers,
};
pub use memo::{create_memo, Memo, MemoState};
pub use effect::{create_effect, Effect};
pub use runtime::Runtime;
