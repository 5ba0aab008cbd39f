//! Job queue: requests buffered before the pool starts.

use crate::command::{Environment, Executable};
use crate::job::{CommandRequest, JobId};

#[derive(Debug, Default)]
pub(crate) struct JobQueue {
    requests: Vec<CommandRequest>,
    next_sequence: usize,
}

impl JobQueue {
    /// Assign the next sequence number and an id, then append.
    pub(crate) fn push(&mut self, command: Box<dyn Executable>, pool_id: &str) -> JobId {
        let request = self.mint(command, pool_id);
        let job_id = request.job_id.clone();
        self.requests.push(request);
        job_id
    }

    /// Assign the next sequence number and an id without queueing.
    pub(crate) fn mint(&mut self, command: Box<dyn Executable>, pool_id: &str) -> CommandRequest {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        CommandRequest {
            sequence,
            job_id: JobId::generate(sequence, pool_id),
            command,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.requests.len()
    }

    /// Apply `env` to every request and hand them over in enqueue order.
    pub(crate) fn drain_with_env(&mut self, env: &Environment) -> Vec<CommandRequest> {
        let mut requests = std::mem::take(&mut self.requests);
        if !env.is_noop() {
            for request in &mut requests {
                request.command.apply_env(env);
            }
        }
        requests
    }
}
