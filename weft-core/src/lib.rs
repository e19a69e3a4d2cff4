//! Weft Core
//!
//! This crate provides a fine-grained reactive runtime: reads are recorded as
//! subscriptions automatically, and writes re-run exactly the computations
//! that read the written value. It implements:
//!
//! - Reactive primitives (signals, memos, effects)
//! - Property-level tracking over plain objects (reactive objects)
//! - Per-thread policies for re-entrant writes and failing effects
//!
//! Everything is synchronous: by the time a write returns, every affected
//! effect has run.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Core reactive primitives and dependency tracking
//! - `object`: Reactive objects and the registry behind them
//! - `config`: Runtime policies
//! - `error`: The error type shared by everything above
//!
//! # Example
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//! use weft_core::{Effect, Memo, Signal};
//!
//! // Create a signal
//! let count = Signal::new(0);
//!
//! // Create a derived value
//! let c = count.clone();
//! let doubled = Memo::new(move || c.get() * 2);
//!
//! // Create an effect
//! let log = Arc::new(Mutex::new(Vec::new()));
//! let (c, d, l) = (count.clone(), doubled.clone(), log.clone());
//! let _effect = Effect::new(move || {
//!     l.lock().unwrap().push(format!("Count: {}, Doubled: {}", c.get(), d.get()));
//! })
//! .unwrap();
//!
//! // Update the signal
//! count.set(5).unwrap();
//! // Effect automatically runs
//! assert_eq!(log.lock().unwrap().last().unwrap(), "Count: 5, Doubled: 10");
//! ```

pub mod config;
pub mod error;
pub mod object;
pub mod reactive;

pub use config::{CyclePolicy, ErrorPolicy, RuntimeConfig};
pub use error::{BoxError, ReactiveError, Result};
pub use object::{
    reactive, registry, Mutability, ReactiveObject, Registry, TargetId, WeakReactiveObject,
};
pub use reactive::{
    create_effect, create_memo, create_signal, Effect, Memo, MemoState, ReactiveContext,
    ReadSignal, Runtime, Signal, SubscriberId, WriteSignal,
};
