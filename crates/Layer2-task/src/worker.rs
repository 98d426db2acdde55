//! Serial worker - a single background thread that runs jobs one at a time
//!
//! Features:
//! - Lazy thread start on first submission
//! - Strict FIFO, never more than one job running
//! - Shutdown that refuses new jobs but drains queued ones
//! - Panicking jobs are caught and logged; the thread keeps serving

use handoff_foundation::{Error, Result};
use parking_lot::{Condvar, Mutex};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

/// A job for the worker thread
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Lifecycle of the worker thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    /// No thread yet
    Idle,
    /// Thread spawned and accepting jobs
    Running,
    /// No new jobs accepted; thread may still be draining
    ShutDown,
    /// Thread has exited (or was never started before shutdown)
    Terminated,
}

struct WorkerState {
    lifecycle: Lifecycle,
    tx: Option<mpsc::UnboundedSender<Job>>,
}

struct Inner {
    name: String,
    state: Mutex<WorkerState>,
    terminated: Condvar,
    completed: AtomicU64,
    panicked: AtomicU64,
}

/// Single-thread execution context
///
/// Dropping the worker shuts it down; the thread exits once its queue drains.
pub struct SerialWorker {
    inner: Arc<Inner>,
}

impl SerialWorker {
    /// Create a worker; the thread is spawned on first [`submit`](Self::submit)
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                state: Mutex::new(WorkerState {
                    lifecycle: Lifecycle::Idle,
                    tx: None,
                }),
                terminated: Condvar::new(),
                completed: AtomicU64::new(0),
                panicked: AtomicU64::new(0),
            }),
        }
    }

    /// Thread name
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Queue a job. Fails once the worker has been shut down.
    pub fn submit(&self, job: Job) -> Result<()> {
        let mut state = self.inner.state.lock();

        if state.lifecycle == Lifecycle::Idle {
            let (tx, rx) = mpsc::unbounded_channel();
            let inner = Arc::clone(&self.inner);
            std::thread::Builder::new()
                .name(self.inner.name.clone())
                .spawn(move || run_loop(inner, rx))?;
            state.tx = Some(tx);
            state.lifecycle = Lifecycle::Running;
            debug!("Worker thread '{}' started", self.inner.name);
        }

        let tx = state.tx.as_ref().ok_or_else(|| {
            Error::WorkerShutdown(format!("worker '{}' is shut down", self.inner.name))
        })?;

        tx.send(job).map_err(|_| {
            Error::WorkerShutdown(format!("worker '{}' has exited", self.inner.name))
        })
    }

    /// Stop accepting jobs. The running job and any queued jobs still finish.
    pub fn shutdown(&self) {
        let mut state = self.inner.state.lock();
        match state.lifecycle {
            Lifecycle::Idle => {
                state.lifecycle = Lifecycle::Terminated;
                self.inner.terminated.notify_all();
            }
            Lifecycle::Running => {
                // dropping the sender lets the loop exit after the queue drains
                state.tx = None;
                state.lifecycle = Lifecycle::ShutDown;
            }
            Lifecycle::ShutDown | Lifecycle::Terminated => return,
        }
        debug!("Worker '{}' shut down", self.inner.name);
    }

    /// True once [`shutdown`](Self::shutdown) has been called
    pub fn is_shutdown(&self) -> bool {
        matches!(
            self.inner.state.lock().lifecycle,
            Lifecycle::ShutDown | Lifecycle::Terminated
        )
    }

    /// True once the thread has exited after shutdown
    pub fn is_terminated(&self) -> bool {
        self.inner.state.lock().lifecycle == Lifecycle::Terminated
    }

    /// Block until terminated or `timeout` elapses. Returns whether terminated.
    pub fn await_termination(&self, timeout: Duration) -> bool {
        let mut state = self.inner.state.lock();
        if state.lifecycle != Lifecycle::Terminated {
            let _ = self.inner.terminated.wait_while_for(
                &mut state,
                |s| s.lifecycle != Lifecycle::Terminated,
                timeout,
            );
        }
        state.lifecycle == Lifecycle::Terminated
    }

    /// Jobs that ran to completion (including ones that panicked)
    pub fn completed_jobs(&self) -> u64 {
        self.inner.completed.load(Ordering::Relaxed)
    }

    /// Jobs that panicked
    pub fn panicked_jobs(&self) -> u64 {
        self.inner.panicked.load(Ordering::Relaxed)
    }
}

impl Drop for SerialWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for SerialWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialWorker")
            .field("name", &self.inner.name)
            .field("lifecycle", &self.inner.state.lock().lifecycle)
            .field("completed", &self.completed_jobs())
            .finish()
    }
}

fn run_loop(inner: Arc<Inner>, mut rx: mpsc::UnboundedReceiver<Job>) {
    while let Some(job) = rx.blocking_recv() {
        // uncaught failure handler: log and keep serving
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
            inner.panicked.fetch_add(1, Ordering::Relaxed);
            error!(
                "Uncaught failure in worker '{}': {}",
                inner.name,
                Error::from_panic(payload)
            );
        }
        inner.completed.fetch_add(1, Ordering::Relaxed);
    }

    let mut state = inner.state.lock();
    if state.lifecycle == Lifecycle::Running {
        warn!("Worker '{}' channel closed without shutdown", inner.name);
    }
    state.lifecycle = Lifecycle::Terminated;
    state.tx = None;
    inner.terminated.notify_all();
    debug!("Worker thread '{}' terminated", inner.name);
}
