//! Coordinator log events.

use std::io;
use std::sync::{Arc, Mutex};

use tracing_subscriber::fmt::writer::MakeWriter;

use omni_pool::{Environment, ExecPool, Executable, Execution};

#[derive(Clone, Default)]
struct SharedLogBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl SharedLogBuffer {
    fn as_string(&self) -> String {
        match self.inner.lock() {
            Ok(guard) => String::from_utf8_lossy(&guard).to_string(),
            Err(_) => String::new(),
        }
    }
}

struct SharedLogWriter {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl<'a> MakeWriter<'a> for SharedLogBuffer {
    type Writer = SharedLogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        SharedLogWriter {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl io::Write for SharedLogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Ok(mut guard) = self.inner.lock() {
            guard.extend_from_slice(buf);
            Ok(buf.len())
        } else {
            Err(io::Error::other("failed to lock shared log buffer"))
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct Quiet;

impl Executable for Quiet {
    fn apply_env(&mut self, _env: &Environment) {}

    fn run(&mut self) -> Execution {
        Execution {
            stdout: Vec::new(),
            stderr: Vec::new(),
            exit_code: 0,
            error: None,
        }
    }
}

#[test]
fn test_pool_lifecycle_is_logged() {
    let logs = SharedLogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .without_time()
        .with_max_level(tracing::Level::DEBUG)
        .with_writer(logs.clone())
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let mut pool = ExecPool::new(2);
    let id = pool.enqueue(Quiet);
    pool.start().unwrap();
    pool.wait().unwrap();

    let output = logs.as_string();
    assert!(output.contains("job queued"));
    assert!(output.contains(id.as_str()));
    assert!(output.contains("pool started"));
    assert!(output.contains("pool finished"));
    assert!(output.contains("elapsed_secs"));
    assert!(output.contains(pool.pool_id()));
}

#[test]
fn test_zero_worker_start_warns() {
    let logs = SharedLogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .without_time()
        .with_writer(logs.clone())
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let mut pool = ExecPool::new(0);
    pool.enqueue(Quiet);
    pool.start().unwrap();
    pool.wait().unwrap();

    let output = logs.as_string();
    assert!(output.contains("WARN"));
    assert!(output.contains("queued jobs will not run"));
}
