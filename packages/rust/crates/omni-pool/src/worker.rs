//! Worker threads.

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam::channel::{Receiver, Sender};
use crossbeam::sync::WaitGroup;

use crate::command::Execution;
use crate::error::RunError;
use crate::job::{CommandRequest, CommandResult};

/// Pulls requests until the dispatch channel is closed and drained.
pub(crate) struct Worker {
    id: String,
    jobs: Receiver<CommandRequest>,
    results: Sender<CommandResult>,
    done: WaitGroup,
}

impl Worker {
    pub(crate) fn new(
        id: String,
        jobs: Receiver<CommandRequest>,
        results: Sender<CommandResult>,
        done: WaitGroup,
    ) -> Self {
        Self {
            id,
            jobs,
            results,
            done,
        }
    }

    /// Start the worker on its own named OS thread.
    ///
    /// The handle yields the number of jobs the worker processed.
    pub(crate) fn spawn(self) -> io::Result<JoinHandle<usize>> {
        thread::Builder::new()
            .name(self.id.clone())
            .spawn(move || self.run())
    }

    fn run(self) -> usize {
        let Self {
            id,
            jobs,
            results,
            done,
        } = self;
        let mut processed = 0;

        for request in &jobs {
            let result = execute(&id, request);
            if result.success() {
                tracing::debug!(worker = %id, job_id = %result.job_id, "job finished");
            } else {
                tracing::warn!(
                    worker = %id,
                    job_id = %result.job_id,
                    exit_code = result.exit_code,
                    error = ?result.run_error,
                    "job failed"
                );
            }
            if results.send(result).is_err() {
                tracing::error!(worker = %id, "result channel closed; stopping worker");
                break;
            }
            processed += 1;
        }

        drop(results);
        drop(done);
        tracing::debug!(worker = %id, processed, "worker exiting");
        processed
    }
}

fn execute(worker: &str, request: CommandRequest) -> CommandResult {
    let CommandRequest {
        sequence,
        job_id,
        mut command,
    } = request;
    tracing::debug!(worker, %job_id, command = %command.describe(), "starting job");

    let started = Instant::now();
    let execution = panic::catch_unwind(AssertUnwindSafe(|| command.run()))
        .unwrap_or_else(|payload| panicked(payload.as_ref()));
    CommandResult::new(sequence, job_id, execution, started.elapsed())
}

fn panicked(payload: &(dyn std::any::Any + Send)) -> Execution {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| String::from("unknown panic"));
    Execution {
        stdout: Vec::new(),
        stderr: Vec::new(),
        exit_code: crate::command::UNKNOWN_EXIT_CODE,
        error: Some(RunError::Abnormal(format!("command panicked: {message}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{Environment, Executable};
    use crate::job::JobId;
    use crossbeam::channel;

    struct Exploding;

    impl Executable for Exploding {
        fn apply_env(&mut self, _env: &Environment) {}

        fn run(&mut self) -> Execution {
            panic!("boom");
        }
    }

    #[test]
    fn test_panicking_command_becomes_run_error() {
        let request = CommandRequest {
            sequence: 0,
            job_id: JobId::generate(0, "pool"),
            command: Box::new(Exploding),
        };
        let result = execute("worker-test", request);
        assert!(!result.success());
        assert_eq!(
            result.run_error,
            Some(RunError::Abnormal("command panicked: boom".to_string()))
        );
    }

    #[test]
    fn test_worker_exits_when_dispatch_closed() {
        let (job_tx, job_rx) = channel::bounded::<CommandRequest>(0);
        let (result_tx, result_rx) = channel::bounded(1);
        drop(job_tx);
        let done = WaitGroup::new();
        let handle = Worker::new("worker-test".into(), job_rx, result_tx, done.clone())
            .spawn()
            .unwrap();
        done.wait();
        assert_eq!(handle.join().unwrap(), 0);
        assert!(result_rx.recv().is_err());
    }
}
