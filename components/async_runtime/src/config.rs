//! Runtime configuration.
//!
//! Configuration is read from JSON. Every field is optional; missing fields
//! take their defaults.
//!
//! ```
//! use async_runtime::RuntimeConfig;
//!
//! let config = RuntimeConfig::from_json(r#"{ "microtask_budget": 1000 }"#).unwrap();
//! assert_eq!(config.microtask_budget, Some(1000));
//! assert_eq!(config.track_rejections, None);
//! ```

use crate::error::RuntimeResult;
use serde::Deserialize;
use std::path::Path;

/// Settings for a [`Scheduler`](crate::Scheduler) and the event loop hosting it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Maximum microtasks run by one drain before it gives up.
    /// `None` drains until the queue is empty.
    pub microtask_budget: Option<usize>,
    /// Record rejections that have no handler attached.
    ///
    /// `None` leaves the choice to whoever hosts the scheduler: a bare
    /// [`Scheduler`](crate::Scheduler) records nothing, while an
    /// [`EventLoop`](crate::EventLoop) turns recording on because it
    /// collects the records at every checkpoint.
    pub track_rejections: Option<bool>,
}

impl RuntimeConfig {
    /// Parses a configuration from a JSON document.
    pub fn from_json(source: &str) -> RuntimeResult<Self> {
        Ok(serde_json::from_str(source)?)
    }

    /// Reads and parses a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> RuntimeResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_json(&content)?;
        tracing::debug!(path = %path.display(), ?config, "loaded runtime configuration");
        Ok(config)
    }
}
