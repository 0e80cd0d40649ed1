//! Coordinator and executor configuration.
//!
//! Configuration is plain data with serde support, so it can be embedded in
//! an application's own settings file or loaded from a standalone TOML file:
//!
//! ```toml
//! isolation = "thread"
//! thread_name = "listing-offload"
//! queue_capacity = 32
//! delivery = "latest_per_kind"
//! shutdown_timeout_ms = 500
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default capacity of the executor's request queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Default name of the executor thread.
pub const DEFAULT_THREAD_NAME: &str = "estate-offload-executor";

/// Default time to wait for the executor to exit on shutdown.
pub const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 1000;

/// Whether an isolated background context can be created in this host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Isolation {
    /// A dedicated OS thread per coordinator.
    Thread,
    /// No background context; every call runs through the fallback.
    Unavailable,
}

impl Default for Isolation {
    #[cfg(not(all(target_arch = "wasm32", not(target_feature = "atomics"))))]
    fn default() -> Self {
        Self::Thread
    }

    #[cfg(all(target_arch = "wasm32", not(target_feature = "atomics")))]
    fn default() -> Self {
        Self::Unavailable
    }
}

/// How results are delivered when requests of the same kind overlap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryPolicy {
    /// Every request's callback fires exactly once.
    #[default]
    PerRequest,
    /// A newer request of the same kind supersedes an older one still in
    /// flight. The older callback is dropped without being invoked.
    LatestPerKind,
}

/// Configuration for a dispatch coordinator and its executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OffloadConfig {
    /// Background isolation facility.
    pub isolation: Isolation,
    /// Name for the executor thread.
    pub thread_name: String,
    /// Stack size for the executor thread in bytes. `None` uses the default.
    pub stack_size: Option<usize>,
    /// Capacity of the executor's request queue.
    pub queue_capacity: usize,
    /// Overlapping same-kind request policy.
    pub delivery: DeliveryPolicy,
    /// How long shutdown waits for the executor thread, in milliseconds.
    pub shutdown_timeout_ms: u64,
}

impl Default for OffloadConfig {
    fn default() -> Self {
        Self {
            isolation: Isolation::default(),
            thread_name: DEFAULT_THREAD_NAME.to_string(),
            stack_size: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            delivery: DeliveryPolicy::default(),
            shutdown_timeout_ms: DEFAULT_SHUTDOWN_TIMEOUT_MS,
        }
    }
}

impl OffloadConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|err| ConfigError::io(path, err))?;
        Self::from_toml_str(&source)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_capacity == 0 {
            return Err(ConfigError::invalid("queue_capacity", "must be greater than zero"));
        }
        if self.thread_name.trim().is_empty() {
            return Err(ConfigError::invalid("thread_name", "must not be empty"));
        }
        if self.stack_size == Some(0) {
            return Err(ConfigError::invalid("stack_size", "must be greater than zero"));
        }
        Ok(())
    }

    /// The shutdown wait as a duration.
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}
