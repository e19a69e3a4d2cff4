//! Runtime Configuration
//!
//! Policies that govern how the runtime reacts to re-entrant writes and to
//! failing effects. Configuration is per thread, like the tracking context,
//! and can be loaded from any serde format.
//!
//! ```rust
//! use weft_core::{CyclePolicy, ErrorPolicy, Runtime, RuntimeConfig};
//!
//! let config: RuntimeConfig =
//!     serde_json::from_str(r#"{ "cycle_policy": "error", "error_policy": "fail_fast" }"#)
//!         .unwrap();
//! assert_eq!(config.cycle_policy, CyclePolicy::Error);
//! assert_eq!(config.error_policy, ErrorPolicy::FailFast);
//! assert_eq!(config.max_reruns, 100);
//!
//! Runtime::with_config(config, || {
//!     assert_eq!(Runtime::config().cycle_policy, CyclePolicy::Error);
//! });
//! ```

use serde::{Deserialize, Serialize};

/// Default bound on self-triggered re-runs of a single effect.
pub const DEFAULT_MAX_RERUNS: usize = 100;

/// What happens when an effect is notified while it is still running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePolicy {
    /// Re-run the effect once its current run finishes, until it settles or
    /// `max_reruns` is exceeded.
    #[default]
    Defer,

    /// Fail the offending write with a cycle error.
    Error,
}

/// How failures are handled when one write notifies several effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Run every effect, then report the collected errors.
    #[default]
    Isolate,

    /// Stop at the first failing effect.
    FailFast,
}

/// Per-thread runtime configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub cycle_policy: CyclePolicy,

    /// Maximum number of deferred re-runs an effect may trigger on itself
    /// within one outer run.
    pub max_reruns: usize,

    pub error_policy: ErrorPolicy,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            cycle_policy: CyclePolicy::default(),
            max_reruns: DEFAULT_MAX_RERUNS,
            error_policy: ErrorPolicy::default(),
        }
    }
}

impl RuntimeConfig {
    pub fn with_cycle_policy(mut self, policy: CyclePolicy) -> Self {
        self.cycle_policy = policy;
        self
    }

    pub fn with_max_reruns(mut self, max_reruns: usize) -> Self {
        self.max_reruns = max_reruns;
        self
    }

    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }
}
