//! Dispatch and collection channels.
//!
//! Both are bounded to the number of queued jobs, so loading the dispatch
//! side at start and buffering every result never waits on capacity.
//! Disconnection is the only "no more work" / "no more results" signal.

use crossbeam::channel::{self, Receiver, Sender};

use crate::job::{CommandRequest, CommandResult};

/// Load every request, then close the sending side.
///
/// Workers see the channel as disconnected once it is drained.
pub(crate) fn load_dispatch(requests: Vec<CommandRequest>) -> Receiver<CommandRequest> {
    let (tx, rx) = channel::bounded(requests.len());
    for request in requests {
        if let Err(err) = tx.try_send(request) {
            // Capacity equals the request count and `rx` is alive, so this cannot happen.
            tracing::error!(job_id = %err.into_inner().job_id, "dispatch channel rejected job");
        }
    }
    rx
}

/// Results flowing from workers back to the coordinator.
pub(crate) struct Collection {
    tx: Sender<CommandResult>,
    rx: Receiver<CommandResult>,
}

impl Collection {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        let (tx, rx) = channel::bounded(capacity);
        Self { tx, rx }
    }

    pub(crate) fn sender(&self) -> Sender<CommandResult> {
        self.tx.clone()
    }

    /// Close the coordinator's sender and take every buffered result.
    ///
    /// Only call once every worker has dropped its sender, otherwise this blocks.
    pub(crate) fn close_and_drain(self) -> Vec<CommandResult> {
        let Self { tx, rx } = self;
        drop(tx);
        rx.iter().collect()
    }
}
