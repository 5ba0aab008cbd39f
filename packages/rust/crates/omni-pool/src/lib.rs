//! omni-pool - Bounded worker pool for external processes
//!
//! Queue any number of fully-built commands, run them on a fixed set of
//! worker threads, then look up each job's captured output by id.
//!
//! # Architecture
//!
//! ```text
//! enqueue ──▶ JobQueue ──start──▶ dispatch channel ──▶ Worker × N
//!                                                        │
//!  get_result ◀── result store ◀──wait── collection channel
//! ```
//!
//! - Channels are bounded to the queue length and the dispatch side is closed
//!   right after loading, which is how workers learn there is no more work.
//! - `wait` blocks on a wait-group barrier before draining results, so the
//!   result store is filled exactly once, after every worker has exited.
//! - A failing job only shows up in its own [`CommandResult`].
//!
//! # Logging
//!
//! Emits `tracing` events (`omni_pool=debug` for per-job detail). No
//! subscriber is installed by this crate.

mod channel;
mod command;
mod config;
mod error;
mod job;
mod pool;
mod queue;
mod worker;

pub use command::{EnvVar, Environment, Executable, Execution, UNKNOWN_EXIT_CODE};
pub use config::PoolConfig;
pub use error::{PoolError, Result, RunError};
pub use job::{CommandResult, JobId, POOL_ID_LEN};
pub use pool::ExecPool;
