//! Pool coordinator: queue → start → workers → wait → lookup.

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam::sync::WaitGroup;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::channel::{Collection, load_dispatch};
use crate::command::{EnvVar, Environment, Executable};
use crate::config::PoolConfig;
use crate::error::{PoolError, Result};
use crate::job::{CommandResult, JobId, POOL_ID_LEN, WORKER_ID_LEN, random_alphanumeric};
use crate::queue::JobQueue;
use crate::worker::Worker;

/// Runs queued external commands on a fixed number of worker threads.
///
/// Lifecycle: [`enqueue`](Self::enqueue) / [`set_env`](Self::set_env) →
/// [`start`](Self::start) (once) → [`wait`](Self::wait) (once) →
/// [`get_result`](Self::get_result).
///
/// ```rust,ignore
/// use std::process::Command;
/// use omni_pool::ExecPool;
///
/// let mut pool = ExecPool::new(2);
/// let mut cmd = Command::new("echo");
/// cmd.arg("hello");
/// let id = pool.enqueue(cmd);
/// pool.start()?;
/// pool.wait()?;
/// assert_eq!(pool.get_result(id.as_str()).map(|r| r.stdout.as_str()), Some("hello\n"));
/// ```
pub struct ExecPool {
    pool_id: String,
    workers: usize,
    rng: StdRng,
    queue: JobQueue,
    env: Environment,
    state: PoolState,
    results: Vec<CommandResult>,
    index: HashMap<JobId, usize>,
    started_at: Option<Instant>,
    finished_at: Option<Instant>,
}

enum PoolState {
    Pending,
    Running(RunningPool),
    Completed,
}

struct RunningPool {
    done: WaitGroup,
    handles: Vec<JoinHandle<usize>>,
    collection: Collection,
}

impl RunningPool {
    /// Block on the completion barrier, reap the threads, then drain results.
    fn finish(self) -> Vec<CommandResult> {
        let Self {
            done,
            handles,
            collection,
        } = self;
        done.wait();

        for handle in handles {
            let worker = handle.thread().name().unwrap_or("worker").to_string();
            match handle.join() {
                Ok(processed) => tracing::debug!(%worker, processed, "worker joined"),
                Err(_) => tracing::error!(%worker, "worker thread panicked"),
            }
        }

        collection.close_and_drain()
    }
}

impl ExecPool {
    /// Pool with `workers` threads and an entropy-seeded id.
    ///
    /// Zero workers is accepted; the queue is then never run.
    #[must_use]
    pub fn new(workers: usize) -> Self {
        Self::build(workers, StdRng::from_entropy())
    }

    /// Pool from a [`PoolConfig`].
    ///
    /// `workers` is raised to at least one here, however the config was built.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidEnvSetting`] if an `env` entry is not `KEY=VALUE`.
    pub fn with_config(config: PoolConfig) -> Result<Self> {
        let rng = config
            .seed
            .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
        let mut pool = Self::build(config.workers.max(1), rng);
        pool.env.inherit = config.inherit_env;
        for setting in &config.env {
            pool.set_env(setting)?;
        }
        Ok(pool)
    }

    fn build(workers: usize, mut rng: StdRng) -> Self {
        let pool_id = random_alphanumeric(&mut rng, POOL_ID_LEN);
        Self {
            pool_id,
            workers,
            rng,
            queue: JobQueue::default(),
            env: Environment::default(),
            state: PoolState::Pending,
            results: Vec::new(),
            index: HashMap::new(),
            started_at: None,
            finished_at: None,
        }
    }

    /// Queue a not-yet-started command and return its job id.
    ///
    /// Never fails. After [`start`](Self::start) the id is still minted but the
    /// command is dropped without running, since dispatch is already closed.
    pub fn enqueue<C>(&mut self, command: C) -> JobId
    where
        C: Executable + 'static,
    {
        let command: Box<dyn Executable> = Box::new(command);
        if matches!(self.state, PoolState::Pending) {
            let job_id = self.queue.push(command, &self.pool_id);
            tracing::debug!(pool_id = %self.pool_id, %job_id, "job queued");
            return job_id;
        }

        let request = self.queue.mint(command, &self.pool_id);
        tracing::warn!(
            pool_id = %self.pool_id,
            job_id = %request.job_id,
            "job enqueued after start will not run"
        );
        request.job_id
    }

    /// Add one `KEY=VALUE` setting applied to every command at start.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::AlreadyStarted`] after start and
    /// [`PoolError::InvalidEnvSetting`] for malformed settings.
    pub fn set_env(&mut self, setting: &str) -> Result<()> {
        if self.is_started() {
            return Err(PoolError::AlreadyStarted);
        }
        self.env.vars.push(EnvVar::parse(setting)?);
        Ok(())
    }

    /// Dispatch every queued job and spawn the workers. Does not block.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::AlreadyStarted`] on a second call, and
    /// [`PoolError::Spawn`] if a worker thread could not be created. In the
    /// latter case the pool is still started and the workers that did spawn
    /// drain the queue; call [`wait`](Self::wait) as usual.
    pub fn start(&mut self) -> Result<()> {
        self.start_with(Worker::spawn)
    }

    /// [`start`](Self::start) with a custom thread spawner.
    pub(crate) fn start_with<F>(&mut self, mut spawn: F) -> Result<()>
    where
        F: FnMut(Worker) -> io::Result<JoinHandle<usize>>,
    {
        if self.is_started() {
            return Err(PoolError::AlreadyStarted);
        }

        let requests = self.queue.drain_with_env(&self.env);
        let job_count = requests.len();
        let dispatch = load_dispatch(requests);
        let collection = Collection::with_capacity(job_count);

        if self.workers == 0 && job_count > 0 {
            tracing::warn!(
                pool_id = %self.pool_id,
                jobs = job_count,
                "pool started without workers; queued jobs will not run"
            );
        }

        self.started_at = Some(Instant::now());
        let done = WaitGroup::new();
        let mut handles = Vec::with_capacity(self.workers);
        let mut spawn_error = None;

        for _ in 0..self.workers {
            let worker_id = format!(
                "worker-{}",
                random_alphanumeric(&mut self.rng, WORKER_ID_LEN)
            );
            let worker = Worker::new(
                worker_id.clone(),
                dispatch.clone(),
                collection.sender(),
                done.clone(),
            );
            match spawn(worker) {
                Ok(handle) => handles.push(handle),
                Err(source) => {
                    spawn_error = Some(PoolError::Spawn {
                        worker: worker_id,
                        source,
                    });
                    break;
                }
            }
        }

        tracing::info!(
            pool_id = %self.pool_id,
            jobs = job_count,
            workers = handles.len(),
            "pool started"
        );

        self.state = PoolState::Running(RunningPool {
            done,
            handles,
            collection,
        });

        match spawn_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Block until every worker is done, then collect all results.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::NotStarted`] before [`start`](Self::start) and
    /// [`PoolError::AlreadyWaited`] on a second call. Neither blocks.
    pub fn wait(&mut self) -> Result<()> {
        let running = match std::mem::replace(&mut self.state, PoolState::Completed) {
            PoolState::Running(running) => running,
            PoolState::Pending => {
                self.state = PoolState::Pending;
                return Err(PoolError::NotStarted);
            }
            PoolState::Completed => return Err(PoolError::AlreadyWaited),
        };

        for result in running.finish() {
            self.index.insert(result.job_id.clone(), self.results.len());
            self.results.push(result);
        }

        let finished_at = Instant::now();
        self.finished_at = Some(finished_at);
        let elapsed = self
            .started_at
            .map_or(Duration::ZERO, |started| finished_at - started);
        let failed = self.results.iter().filter(|r| !r.success()).count();
        tracing::info!(
            pool_id = %self.pool_id,
            completed = self.results.len(),
            failed,
            elapsed_secs = elapsed.as_secs_f64(),
            "pool finished"
        );
        Ok(())
    }

    /// Result for `job_id`, if that job has been collected.
    #[must_use]
    pub fn get_result(&self, job_id: &str) -> Option<&CommandResult> {
        self.index.get(job_id).map(|&pos| &self.results[pos])
    }

    /// All collected results, in completion order.
    #[must_use]
    pub fn results(&self) -> &[CommandResult] {
        &self.results
    }

    /// All collected results, in enqueue order.
    #[must_use]
    pub fn results_by_sequence(&self) -> Vec<&CommandResult> {
        let mut ordered: Vec<&CommandResult> = self.results.iter().collect();
        ordered.sort_by_key(|r| r.sequence);
        ordered
    }

    /// Random id embedded in every job id from this pool.
    #[must_use]
    pub fn pool_id(&self) -> &str {
        &self.pool_id
    }

    /// Configured worker count.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.workers
    }

    /// Jobs waiting for [`start`](Self::start).
    #[must_use]
    pub fn queued_jobs(&self) -> usize {
        self.queue.len()
    }

    /// `true` once [`start`](Self::start) has been called.
    #[must_use]
    pub fn is_started(&self) -> bool {
        !matches!(self.state, PoolState::Pending)
    }

    /// Wall time from start to the end of [`wait`](Self::wait).
    #[must_use]
    pub fn elapsed(&self) -> Option<Duration> {
        match (self.started_at, self.finished_at) {
            (Some(started), Some(finished)) => Some(finished - started),
            _ => None,
        }
    }
}

impl fmt::Debug for ExecPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state {
            PoolState::Pending => "pending",
            PoolState::Running(_) => "running",
            PoolState::Completed => "completed",
        };
        f.debug_struct("ExecPool")
            .field("pool_id", &self.pool_id)
            .field("workers", &self.workers)
            .field("queued", &self.queue.len())
            .field("state", &state)
            .field("results", &self.results.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Execution;

    struct Echo(usize);

    impl Executable for Echo {
        fn apply_env(&mut self, _env: &Environment) {}

        fn run(&mut self) -> Execution {
            Execution {
                stdout: self.0.to_string().into_bytes(),
                stderr: Vec::new(),
                exit_code: 0,
                error: None,
            }
        }
    }

    /// Spawns `limit` real workers, then fails like an exhausted thread table.
    fn limited_spawner(limit: usize) -> impl FnMut(Worker) -> io::Result<JoinHandle<usize>> {
        let mut spawned = 0;
        move |worker| {
            if spawned == limit {
                return Err(io::Error::other("thread limit reached"));
            }
            spawned += 1;
            worker.spawn()
        }
    }

    #[test]
    fn test_partial_spawn_failure_still_runs_every_job() {
        let mut pool = ExecPool::new(4);
        let ids: Vec<JobId> = (0..6).map(|i| pool.enqueue(Echo(i))).collect();

        let err = pool.start_with(limited_spawner(1)).unwrap_err();
        assert!(matches!(err, PoolError::Spawn { .. }));
        assert!(pool.is_started());
        assert!(matches!(pool.start(), Err(PoolError::AlreadyStarted)));

        pool.wait().unwrap();
        assert_eq!(pool.results().len(), 6);
        for (i, id) in ids.iter().enumerate() {
            assert_eq!(pool.get_result(id.as_str()).unwrap().stdout, i.to_string());
        }
    }

    #[test]
    fn test_spawn_failure_without_workers_collects_nothing() {
        let mut pool = ExecPool::new(2);
        pool.enqueue(Echo(0));

        let err = pool.start_with(limited_spawner(0)).unwrap_err();
        assert!(matches!(err, PoolError::Spawn { .. }));
        assert!(pool.is_started());

        pool.wait().unwrap();
        assert!(pool.results().is_empty());
    }
}
