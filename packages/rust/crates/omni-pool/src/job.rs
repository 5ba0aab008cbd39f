//! Job identity, requests and results.

use std::borrow::Borrow;
use std::fmt;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::Serialize;

use crate::command::{Executable, Execution};
use crate::error::RunError;

/// Length of the random pool id embedded in every job id.
pub const POOL_ID_LEN: usize = 12;

/// Length of the random suffix in worker ids.
pub(crate) const WORKER_ID_LEN: usize = 8;

/// Stable identifier handed out by [`ExecPool::enqueue`](crate::ExecPool::enqueue).
///
/// Format: `<RFC3339 UTC, nanoseconds>-<sequence, 12 digits>-<pool id>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub(crate) fn generate(sequence: usize, pool_id: &str) -> Self {
        let stamp = Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true);
        Self(format!("{stamp}-{sequence:012}-{pool_id}"))
    }

    /// Borrow as `&str`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for JobId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for JobId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

pub(crate) fn random_alphanumeric<R: Rng>(rng: &mut R, len: usize) -> String {
    (0..len)
        .map(|_| char::from(rng.sample(Alphanumeric)))
        .collect()
}

/// One queued unit of work.
pub(crate) struct CommandRequest {
    pub(crate) sequence: usize,
    pub(crate) job_id: JobId,
    pub(crate) command: Box<dyn Executable>,
}

impl fmt::Debug for CommandRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandRequest")
            .field("sequence", &self.sequence)
            .field("job_id", &self.job_id)
            .field("command", &self.command.describe())
            .finish()
    }
}

/// Outcome of one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandResult {
    /// Id returned by `enqueue`.
    pub job_id: JobId,
    /// 0-based enqueue position.
    pub sequence: usize,
    /// Set when the process failed to start or did not exit successfully.
    pub run_error: Option<RunError>,
    /// Captured standard output (lossy UTF-8).
    pub stdout: String,
    /// Captured standard error (lossy UTF-8).
    pub stderr: String,
    /// Exit code, `-1` if the process never produced one.
    pub exit_code: i32,
    /// Wall time spent running the command.
    pub execution_time_ms: u64,
}

impl CommandResult {
    pub(crate) fn new(
        sequence: usize,
        job_id: JobId,
        execution: Execution,
        elapsed: Duration,
    ) -> Self {
        Self {
            job_id,
            sequence,
            run_error: execution.error,
            stdout: String::from_utf8_lossy(&execution.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&execution.stderr).into_owned(),
            exit_code: execution.exit_code,
            execution_time_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// `true` when the command ran and exited with status 0.
    #[must_use]
    pub fn success(&self) -> bool {
        self.run_error.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_job_id_layout() {
        let id = JobId::generate(42, "abcdefghijkl");
        let text = id.as_str();
        assert!(text.ends_with("-000000000042-abcdefghijkl"));
        let stamp = text.trim_end_matches("-000000000042-abcdefghijkl");
        assert!(chrono::DateTime::parse_from_rfc3339(stamp).is_ok());
    }

    #[test]
    fn test_random_alphanumeric_is_seeded() {
        let a = random_alphanumeric(&mut StdRng::seed_from_u64(7), POOL_ID_LEN);
        let b = random_alphanumeric(&mut StdRng::seed_from_u64(7), POOL_ID_LEN);
        assert_eq!(a, b);
        assert_eq!(a.len(), POOL_ID_LEN);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_result_decodes_lossy_utf8() {
        let execution = Execution {
            stdout: b"ok\xff".to_vec(),
            stderr: Vec::new(),
            exit_code: 0,
            error: None,
        };
        let result = CommandResult::new(
            0,
            JobId::generate(0, "pool"),
            execution,
            Duration::from_millis(5),
        );
        assert!(result.success());
        assert_eq!(result.stdout, "ok\u{fffd}");
        assert_eq!(result.execution_time_ms, 5);
    }
}
