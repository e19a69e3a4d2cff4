//! Reactive Objects
//!
//! Property-level tracking over plain objects. A [`ReactiveObject`] performs
//! the real read or write on its target and then does the bookkeeping: reads
//! are recorded in the [`Registry`] against the running computation, and
//! writes that change a value re-run the computations recorded for that
//! property.

mod proxy;
mod registry;

pub use proxy::{reactive, Mutability, ReactiveObject, WeakReactiveObject};
pub use registry::{registry, Registry, TargetId};
