//! Pool configuration.
//!
//! Loaded from YAML (or built in code) and handed to
//! [`ExecPool::with_config`](crate::ExecPool::with_config):
//!
//! ```yaml
//! workers: 4
//! env:
//!   - "LANG=C"
//!   - "RUST_BACKTRACE=1"
//! inherit_env: false
//! seed: 42
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::error::{PoolError, Result};

const DEFAULT_WORKERS: usize = 4;

/// Settings for one [`ExecPool`](crate::ExecPool).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of worker threads spawned at start.
    pub workers: usize,
    /// `KEY=VALUE` settings applied to every queued command.
    pub env: Vec<String>,
    /// Layer `env` over the inherited process environment.
    ///
    /// Off by default: a non-empty `env` replaces the environment entirely.
    pub inherit_env: bool,
    /// Seed for the pool's random source (pool and worker ids).
    pub seed: Option<u64>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            env: Vec::new(),
            inherit_env: false,
            seed: None,
        }
    }
}

impl PoolConfig {
    /// Config with `workers` threads and defaults for everything else.
    #[must_use]
    pub fn with_workers(workers: usize) -> Self {
        Self {
            workers,
            ..Self::default()
        }
    }

    /// Parse a YAML document.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidConfig`] if the document does not match the schema.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)
            .map_err(|e| PoolError::InvalidConfig(e.to_string()))?;
        Ok(config.normalized())
    }

    /// Read and parse a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::ConfigRead`] if the file cannot be read and
    /// [`PoolError::InvalidConfig`] if it cannot be parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| PoolError::ConfigRead {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    fn normalized(mut self) -> Self {
        self.workers = self.workers.max(1);
        self
    }
}
