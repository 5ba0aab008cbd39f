//! Error types for the execution pool.
//!
//! Follows ODF-EP: Explicit error enums with context.
//!
//! Two families are kept apart on purpose:
//! - [`PoolError`] is returned to the caller of a pool operation.
//! - [`RunError`] describes why a single job failed and lives inside its
//!   [`CommandResult`](crate::CommandResult).

use serde::Serialize;
use thiserror::Error;

/// Pool lifecycle and configuration errors.
#[derive(Error, Debug)]
pub enum PoolError {
    /// `set_env` or `start` called after the pool has started.
    #[error("Pool already started")]
    AlreadyStarted,

    /// `wait` called before `start`.
    #[error("Pool not started")]
    NotStarted,

    /// `wait` called a second time.
    #[error("Pool results already collected")]
    AlreadyWaited,

    /// Environment setting is not in `KEY=VALUE` form.
    #[error("Invalid environment setting: {0:?}")]
    InvalidEnvSetting(String),

    /// Worker thread could not be spawned.
    #[error("Failed to spawn worker {worker}: {source}")]
    Spawn {
        /// Worker id that failed to spawn.
        worker: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// Configuration file could not be read.
    #[error("Failed to read config {path}: {source}")]
    ConfigRead {
        /// Path that was read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Configuration could not be parsed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Per-job execution failure, stored in the job's result.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum RunError {
    /// Process could not be started (missing executable, permissions, ...).
    #[error("Failed to start process: {0}")]
    Spawn(String),

    /// Process exited with a non-zero status.
    #[error("exit status {0}")]
    ExitStatus(i32),

    /// Process was terminated by a signal.
    #[error("terminated by signal {0}")]
    Signal(i32),

    /// Process ended without an exit code or signal.
    #[error("Process ended abnormally: {0}")]
    Abnormal(String),
}

/// Result type for pool operations.
pub type Result<T> = std::result::Result<T, PoolError>;
