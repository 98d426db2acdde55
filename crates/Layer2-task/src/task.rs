//! Task - runs a [`BackgroundTask`] body with its phases marshaled between
//! a serial worker and the owning context

use crate::body::BackgroundTask;
use crate::dispatcher::OwnerDispatcher;
use crate::handle::{Completion, RunHandle, RunOutcome};
use crate::priority::apply_background_priority;
use crate::progress::ProgressPublisher;
use crate::state::RunState;
use crate::worker::SerialWorker;
use chrono::{DateTime, Utc};
use handoff_foundation::{Error, HandoffConfig, TaskConfig};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

/// Unique identifier for a single run of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new random RunId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// Snapshot of the most recent run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    /// Run identifier
    pub id: RunId,

    /// Current phase
    pub state: RunState,

    /// When the worker picked the run up (or when it was rejected)
    pub started_at: DateTime<Utc>,

    /// When the run reached a terminal state
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunRecord {
    /// Get run duration if it has finished
    pub fn duration(&self) -> Option<Duration> {
        let end = self.finished_at?;
        Some((end - self.started_at).to_std().unwrap_or_default())
    }
}

/// Counters over the lifetime of a task
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStats {
    /// Runs the worker picked up
    pub started: u64,
    /// Runs whose post phase finished
    pub completed: u64,
    /// Runs whose body failed or whose pre phase was discarded
    pub failed: u64,
    /// Runs the worker refused
    pub rejected: u64,
    /// Progress batches handed to `on_progress_update`
    pub progress_delivered: u64,
    /// Progress batches dropped (cancelled before delivery or dispatcher closed)
    pub progress_dropped: u64,
}

#[derive(Default)]
pub(crate) struct Counters {
    started: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    rejected: AtomicU64,
    progress_delivered: AtomicU64,
    progress_dropped: AtomicU64,
}

impl Counters {
    pub(crate) fn record_progress_delivered(&self) {
        self.progress_delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_progress_dropped(&self) {
        self.progress_dropped.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> TaskStats {
        TaskStats {
            started: self.started.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            progress_delivered: self.progress_delivered.load(Ordering::Relaxed),
            progress_dropped: self.progress_dropped.load(Ordering::Relaxed),
        }
    }
}

/// State shared by the task, its worker jobs and its owning-context callbacks
pub(crate) struct Shared<T: BackgroundTask> {
    pub(crate) body: Arc<T>,
    pub(crate) dispatcher: Arc<dyn OwnerDispatcher>,
    pub(crate) stats: Counters,
    cancelled: AtomicBool,
    worker: SerialWorker,
    last_run: Mutex<Option<RunRecord>>,
    config: TaskConfig,
}

impl<T: BackgroundTask> Shared<T> {
    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
            || self.worker.is_shutdown()
            || self.worker.is_terminated()
    }

    fn log_phase(&self, run_id: RunId, phase: &str) {
        if self.config.trace_phases {
            info!("Run {} {}", run_id, phase);
        } else {
            debug!("Run {} {}", run_id, phase);
        }
    }

    /// Record a phase change for `run_id`. Changes for a run that is no
    /// longer the most recent one are ignored.
    fn transition(&self, run_id: RunId, next: RunState) {
        let mut last = self.last_run.lock();
        let now = Utc::now();

        match last.as_mut() {
            Some(record) if record.id == run_id => {
                if !record.state.can_transition_to(next) {
                    warn!(
                        "Run {} unexpected transition {} -> {}",
                        run_id, record.state, next
                    );
                }
                record.state = next;
                if next.is_terminal() {
                    record.finished_at = Some(now);
                }
            }
            Some(record) if next == RunState::PreExecuting || !record.state.is_active() => {
                *record = RunRecord {
                    id: run_id,
                    state: next,
                    started_at: now,
                    finished_at: next.is_terminal().then_some(now),
                };
            }
            Some(record) => {
                trace!(
                    "Run {} -> {} ignored, run {} is current",
                    run_id,
                    next,
                    record.id
                );
            }
            None => {
                *last = Some(RunRecord {
                    id: run_id,
                    state: next,
                    started_at: now,
                    finished_at: next.is_terminal().then_some(now),
                });
            }
        }
    }

    /// The worker job for one run
    fn run(
        self: &Arc<Self>,
        run_id: RunId,
        params: Option<Arc<Vec<T::Params>>>,
        completion: Completion,
    ) {
        self.stats.started.fetch_add(1, Ordering::Relaxed);
        self.transition(run_id, RunState::PreExecuting);
        self.log_phase(run_id, "pre execution");

        // the body may not start before on_pre_execute has returned
        let (gate_tx, gate_rx) = oneshot::channel::<()>();
        let body = Arc::clone(&self.body);
        let scheduled = self.dispatcher.schedule(Box::new(move || {
            body.on_pre_execute();
            let _ = gate_tx.send(());
        }));
        if let Err(e) = scheduled {
            self.abort(run_id, e, &completion);
            return;
        }
        if gate_rx.blocking_recv().is_err() {
            let e = Error::Dispatcher("pre-execute callback was discarded".to_string());
            self.abort(run_id, e, &completion);
            return;
        }

        self.transition(run_id, RunState::BackgroundRunning);
        self.log_phase(run_id, "background execution");
        if let Some(nice) = self.config.background_nice {
            apply_background_priority(nice);
        }

        let publisher = ProgressPublisher::new(Arc::clone(self), run_id);
        let params = params.as_deref().map(Vec::as_slice);
        let result = match panic::catch_unwind(AssertUnwindSafe(|| {
            self.body.do_in_background(params, &publisher)
        })) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(Error::Task(format!("{:#}", e))),
            Err(payload) => Err(Error::from_panic(payload)),
        };
        drop(publisher);

        match result {
            Ok(value) => self.finish(run_id, value, completion),
            Err(e) => self.fail(run_id, e, completion),
        }
    }

    /// Body succeeded: schedule the post phase
    fn finish(self: &Arc<Self>, run_id: RunId, value: T::Output, completion: Completion) {
        self.transition(run_id, RunState::PostExecuting);

        let shared = Arc::clone(self);
        let resolver = completion.clone();
        let scheduled = self.dispatcher.schedule(Box::new(move || {
            shared.log_phase(run_id, "post execution");
            shared.body.on_post_execute(value);
            shared.transition(run_id, RunState::Done);
            shared.stats.completed.fetch_add(1, Ordering::Relaxed);
            resolver.resolve(RunOutcome::Completed);
        }));

        if let Err(e) = scheduled {
            warn!("Run {} post execution could not be scheduled: {}", run_id, e);
            self.transition(run_id, RunState::Failed);
            self.stats.failed.fetch_add(1, Ordering::Relaxed);
            completion.resolve(RunOutcome::Failed(e));
        }
    }

    /// Body failed: flag the task, skip the post phase, report the failure
    fn fail(self: &Arc<Self>, run_id: RunId, e: Error, completion: Completion) {
        self.cancelled.store(true, Ordering::SeqCst);
        error!("Run {} failed in background: {}", run_id, e);
        self.transition(run_id, RunState::Failed);
        self.stats.failed.fetch_add(1, Ordering::Relaxed);

        let body = Arc::clone(&self.body);
        let resolver = completion.clone();
        let scheduled = self.dispatcher.schedule(Box::new(move || {
            body.on_failure(&e);
            resolver.resolve(RunOutcome::Failed(e));
        }));

        if let Err(dispatch_err) = scheduled {
            warn!(
                "Run {} failure hook could not be scheduled: {}",
                run_id, dispatch_err
            );
            completion.resolve(RunOutcome::Failed(dispatch_err));
        }
    }

    /// Pre phase never ran: end the run without touching the body
    fn abort(&self, run_id: RunId, e: Error, completion: &Completion) {
        warn!("Run {} aborted before background execution: {}", run_id, e);
        self.transition(run_id, RunState::Failed);
        self.stats.failed.fetch_add(1, Ordering::Relaxed);
        completion.resolve(RunOutcome::Failed(e));
    }
}

/// A reusable phased background task.
///
/// Owns a single worker thread, the owning-context dispatcher and a
/// cancellation flag. Each [`execute`](Self::execute) queues one run:
/// `on_pre_execute` on the owning context, then `do_in_background` on the
/// worker, then `on_post_execute` (or `on_failure`) on the owning context.
/// Runs queued on one task execute strictly one after another.
pub struct Task<T: BackgroundTask> {
    shared: Arc<Shared<T>>,
    params: Mutex<Option<Arc<Vec<T::Params>>>>,
}

impl<T: BackgroundTask> Task<T> {
    /// Create a task with the default configuration
    pub fn new(body: T, dispatcher: Arc<dyn OwnerDispatcher>) -> Self {
        Self::with_config(body, dispatcher, TaskConfig::default())
    }

    /// Create a task from the `task` section of a loaded configuration
    pub fn from_config(body: T, dispatcher: Arc<dyn OwnerDispatcher>, config: &HandoffConfig) -> Self {
        debug!(
            "Task configured from v{} config: worker '{}', nice {:?}",
            config.version, config.task.worker_name, config.task.background_nice
        );
        Self::with_config(body, dispatcher, config.task.clone())
    }

    /// Create a task with an explicit configuration
    pub fn with_config(body: T, dispatcher: Arc<dyn OwnerDispatcher>, config: TaskConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                body: Arc::new(body),
                dispatcher,
                stats: Counters::default(),
                cancelled: AtomicBool::new(false),
                worker: SerialWorker::new(config.worker_name.clone()),
                last_run: Mutex::new(None),
                config,
            }),
            params: Mutex::new(None),
        }
    }

    /// Store `params` (if given, replacing earlier ones) and start a run
    pub fn execute(&self, params: Option<Vec<T::Params>>) -> RunHandle {
        if let Some(params) = params {
            *self.params.lock() = Some(Arc::new(params));
        }
        self.start()
    }

    /// Queue a run with the currently stored params.
    ///
    /// Submission failures are logged and reported only through the
    /// returned handle.
    pub fn start(&self) -> RunHandle {
        let run_id = RunId::new();
        let (handle, completion) = RunHandle::channel(run_id);
        let params = self.params.lock().clone();

        let shared = Arc::clone(&self.shared);
        let job_completion = completion.clone();
        let submitted = self
            .shared
            .worker
            .submit(Box::new(move || shared.run(run_id, params, job_completion)));

        match submitted {
            Ok(()) => trace!("Run {} queued on '{}'", run_id, self.shared.worker.name()),
            Err(e) => {
                warn!("Run {} could not be submitted: {}", run_id, e);
                self.shared.transition(run_id, RunState::Rejected);
                self.shared.stats.rejected.fetch_add(1, Ordering::Relaxed);
                completion.resolve(RunOutcome::Rejected(e));
            }
        }

        handle
    }

    /// Request cooperative cancellation.
    ///
    /// Progress stops being delivered and the worker refuses new runs. A body
    /// that is already running is not interrupted; it should poll
    /// `is_cancelled` and return early.
    pub fn cancel(&self) {
        self.shared.cancelled.store(true, Ordering::SeqCst);
        self.shared.worker.shutdown();
        info!("Task on '{}' cancelled", self.shared.worker.name());
    }

    /// True if cancel was requested, a body failed, or the worker is shut down
    pub fn is_cancelled(&self) -> bool {
        self.shared.is_cancelled()
    }

    /// Block until the worker thread has exited after [`cancel`](Self::cancel)
    pub fn await_termination(&self, timeout: Duration) -> bool {
        self.shared.worker.await_termination(timeout)
    }

    /// Currently stored params
    pub fn params(&self) -> Option<Arc<Vec<T::Params>>> {
        self.params.lock().clone()
    }

    /// Phase of the most recent run
    pub fn state(&self) -> RunState {
        self.shared
            .last_run
            .lock()
            .as_ref()
            .map(|r| r.state)
            .unwrap_or_default()
    }

    /// Record of the most recent run
    pub fn last_run(&self) -> Option<RunRecord> {
        self.shared.last_run.lock().clone()
    }

    /// Lifetime counters
    pub fn stats(&self) -> TaskStats {
        self.shared.stats.snapshot()
    }

    /// The task body
    pub fn body(&self) -> &Arc<T> {
        &self.shared.body
    }

    /// The task configuration
    pub fn config(&self) -> &TaskConfig {
        &self.shared.config
    }

    /// Name of the owning dispatcher
    pub fn dispatcher_name(&self) -> &'static str {
        self.shared.dispatcher.name()
    }
}

impl<T: BackgroundTask> std::fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("worker", &self.shared.worker)
            .field("dispatcher", &self.shared.dispatcher.name())
            .field("cancelled", &self.is_cancelled())
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::FnTask;
    use crate::dispatcher::InlineDispatcher;

    type Summer = FnTask<u32, u32, u32>;

    fn summer() -> Summer {
        FnTask::new(|params: Option<&[u32]>, _progress: &ProgressPublisher<Summer>| {
            Ok(params.map(|p| p.iter().sum()).unwrap_or_default())
        })
    }

    #[test]
    fn test_run_id_display() {
        let id = RunId::new();
        assert_eq!(id.to_string().len(), 8);
        assert!(id.0.to_string().starts_with(&id.to_string()));
    }

    #[test]
    fn test_new_task_state() {
        let task = Task::new(summer(), Arc::new(InlineDispatcher::new()));
        assert_eq!(task.state(), RunState::Created);
        assert!(task.last_run().is_none());
        assert!(!task.is_cancelled());
        assert!(task.params().is_none());
        assert_eq!(task.stats(), TaskStats::default());
        assert_eq!(task.dispatcher_name(), "inline");
    }

    #[test]
    fn test_inline_run_completes() {
        let task = Task::new(summer(), Arc::new(InlineDispatcher::new()));

        let outcome = task.execute(Some(vec![1, 2, 3])).blocking_wait();
        assert!(outcome.is_completed());

        let record = task.last_run().unwrap();
        assert_eq!(record.state, RunState::Done);
        assert!(record.duration().is_some());
        assert_eq!(task.stats().completed, 1);
        assert_eq!(task.stats().started, 1);
    }

    #[test]
    fn test_params_kept_between_runs() {
        let task = Task::new(summer(), Arc::new(InlineDispatcher::new()));

        task.execute(Some(vec![4, 5])).blocking_wait();
        task.execute(None).blocking_wait();

        assert_eq!(task.params().unwrap().as_slice(), &[4, 5]);
        assert_eq!(task.stats().completed, 2);
    }

    #[test]
    fn test_rejected_after_cancel() {
        let task = Task::new(summer(), Arc::new(InlineDispatcher::new()));
        task.cancel();

        let outcome = task.execute(Some(vec![1])).blocking_wait();
        assert!(matches!(outcome, RunOutcome::Rejected(Error::WorkerShutdown(_))));
        assert_eq!(task.state(), RunState::Rejected);
        assert_eq!(task.stats().rejected, 1);
        assert_eq!(task.stats().started, 0);
        assert!(task.is_cancelled());
        assert!(task.await_termination(Duration::from_millis(10)));
    }

    #[test]
    fn test_run_record_serializes() {
        let task = Task::new(summer(), Arc::new(InlineDispatcher::new()));
        task.execute(Some(vec![7])).blocking_wait();

        let record = task.last_run().unwrap();
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["state"], "Done");

        let back: RunRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back.id, record.id);
        assert_eq!(back.finished_at, record.finished_at);
    }

    #[test]
    fn test_closed_dispatcher_aborts_before_body() {
        let (handle, main) = crate::dispatcher::main_loop();
        drop(main);

        let ran = Arc::new(AtomicBool::new(false));
        let body = {
            let ran = Arc::clone(&ran);
            FnTask::new(move |_: Option<&[u32]>, _: &ProgressPublisher<FnTask<u32, u32, ()>>| {
                ran.store(true, Ordering::SeqCst);
                Ok(())
            })
        };
        let task = Task::new(body, Arc::new(handle));

        let outcome = task.start().blocking_wait();
        assert!(matches!(outcome, RunOutcome::Failed(Error::Dispatcher(_))));
        assert!(!ran.load(Ordering::SeqCst));
        assert_eq!(task.state(), RunState::Failed);
        assert_eq!(task.stats().failed, 1);
    }
}
