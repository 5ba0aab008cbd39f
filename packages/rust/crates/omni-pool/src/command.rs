//! Command collaborator contract.
//!
//! The pool never builds command lines itself. Callers hand it anything that
//! implements [`Executable`]: a fully-formed, not-yet-started command that can
//! take an environment, run to completion and report what happened.

use std::io;
use std::process::{Command, ExitStatus, Output};

use crate::error::{PoolError, Result, RunError};

/// Exit code reported when the process never produced one.
pub const UNKNOWN_EXIT_CODE: i32 = -1;

/// One `KEY=VALUE` environment setting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvVar {
    /// Variable name.
    pub key: String,
    /// Variable value (may be empty).
    pub value: String,
}

impl EnvVar {
    /// Parse a `KEY=VALUE` setting. The value may itself contain `=`.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidEnvSetting`] if there is no `=` or the key is empty.
    pub fn parse(setting: &str) -> Result<Self> {
        match setting.split_once('=') {
            Some((key, value)) if !key.is_empty() => Ok(Self {
                key: key.to_string(),
                value: value.to_string(),
            }),
            _ => Err(PoolError::InvalidEnvSetting(setting.to_string())),
        }
    }
}

/// Environment applied to every command when the pool starts.
///
/// A non-empty `vars` list becomes the command's whole environment unless
/// `inherit` is set, in which case it is layered over the parent's.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    /// Settings in the order they were added.
    pub vars: Vec<EnvVar>,
    /// Keep the inherited environment and apply `vars` on top of it.
    pub inherit: bool,
}

impl Environment {
    /// No settings, so commands keep whatever environment they were built with.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.vars.is_empty()
    }
}

/// Captured outcome of one synchronous run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution {
    /// Raw standard output.
    pub stdout: Vec<u8>,
    /// Raw standard error.
    pub stderr: Vec<u8>,
    /// Process exit code, or [`UNKNOWN_EXIT_CODE`].
    pub exit_code: i32,
    /// Why the run did not succeed, if it did not.
    pub error: Option<RunError>,
}

impl Execution {
    /// Build from a finished process' output.
    #[must_use]
    pub fn from_output(output: Output) -> Self {
        let error = if output.status.success() {
            None
        } else {
            Some(exit_error(output.status))
        };
        Self {
            stdout: output.stdout,
            stderr: output.stderr,
            exit_code: output.status.code().unwrap_or(UNKNOWN_EXIT_CODE),
            error,
        }
    }

    /// Build for a process that could not be started.
    #[must_use]
    pub fn spawn_failure(err: &io::Error) -> Self {
        Self {
            stdout: Vec::new(),
            stderr: Vec::new(),
            exit_code: UNKNOWN_EXIT_CODE,
            error: Some(RunError::Spawn(err.to_string())),
        }
    }
}

fn exit_error(status: ExitStatus) -> RunError {
    if let Some(code) = status.code() {
        return RunError::ExitStatus(code);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return RunError::Signal(signal);
        }
    }
    RunError::Abnormal(status.to_string())
}

/// A not-yet-started command the pool can run on a worker thread.
pub trait Executable: Send {
    /// Apply the pool-wide environment. Called once, at start, before dispatch.
    fn apply_env(&mut self, env: &Environment);

    /// Run to completion with stdout and stderr captured into memory.
    fn run(&mut self) -> Execution;

    /// Short description for logs.
    fn describe(&self) -> String {
        String::from("<command>")
    }
}

impl Executable for Command {
    fn apply_env(&mut self, env: &Environment) {
        if env.is_noop() {
            return;
        }
        if !env.inherit {
            self.env_clear();
        }
        for var in &env.vars {
            self.env(&var.key, &var.value);
        }
    }

    fn run(&mut self) -> Execution {
        match self.output() {
            Ok(output) => Execution::from_output(output),
            Err(err) => Execution::spawn_failure(&err),
        }
    }

    fn describe(&self) -> String {
        format!("{self:?}")
    }
}
