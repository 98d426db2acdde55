//! Run handles - a single completion channel per run

use crate::task::RunId;
use handoff_foundation::Error;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

/// How a run ended
#[derive(Debug)]
pub enum RunOutcome {
    /// `on_post_execute` ran on the owning context
    Completed,

    /// The body failed (or its pre phase was discarded); the post phase was skipped
    Failed(Error),

    /// The worker refused the run, nothing executed
    Rejected(Error),
}

impl RunOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, RunOutcome::Completed)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, RunOutcome::Failed(_))
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, RunOutcome::Rejected(_))
    }

    /// The failure, if any
    pub fn error(&self) -> Option<&Error> {
        match self {
            RunOutcome::Completed => None,
            RunOutcome::Failed(e) | RunOutcome::Rejected(e) => Some(e),
        }
    }
}

/// Resolving side, shared by every place that may finish a run
#[derive(Clone)]
pub(crate) struct Completion {
    tx: Arc<Mutex<Option<oneshot::Sender<RunOutcome>>>>,
}

impl Completion {
    /// First resolution wins
    pub(crate) fn resolve(&self, outcome: RunOutcome) {
        if let Some(tx) = self.tx.lock().take() {
            let _ = tx.send(outcome);
        }
    }
}

/// Waiting side returned by `Task::execute` / `Task::start`.
///
/// Dropping the handle does not affect the run.
#[derive(Debug)]
pub struct RunHandle {
    id: RunId,
    rx: oneshot::Receiver<RunOutcome>,
    taken: bool,
}

impl RunHandle {
    pub(crate) fn channel(id: RunId) -> (Self, Completion) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                id,
                rx,
                taken: false,
            },
            Completion {
                tx: Arc::new(Mutex::new(Some(tx))),
            },
        )
    }

    /// Id of the run
    pub fn id(&self) -> RunId {
        self.id
    }

    /// Wait for the outcome. The owning context must keep being driven.
    pub async fn wait(self) -> RunOutcome {
        settle(self.rx.await)
    }

    /// Wait at most `timeout`. Returns `None` on timeout or if the outcome
    /// was already taken by an earlier call.
    pub async fn wait_timeout(&mut self, timeout: Duration) -> Option<RunOutcome> {
        if self.taken {
            return None;
        }
        match tokio::time::timeout(timeout, &mut self.rx).await {
            Ok(result) => {
                self.taken = true;
                Some(settle(result))
            }
            Err(_) => None,
        }
    }

    /// Block the current thread until the outcome arrives.
    ///
    /// Must not be called on the owning context or inside an async runtime.
    pub fn blocking_wait(self) -> RunOutcome {
        settle(self.rx.blocking_recv())
    }

    /// Non-blocking poll. `None` while the run is still in progress or once
    /// the outcome has been taken.
    pub fn try_outcome(&mut self) -> Option<RunOutcome> {
        if self.taken {
            return None;
        }
        match self.rx.try_recv() {
            Ok(outcome) => {
                self.taken = true;
                Some(outcome)
            }
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => {
                self.taken = true;
                Some(discarded())
            }
        }
    }
}

fn settle(result: Result<RunOutcome, oneshot::error::RecvError>) -> RunOutcome {
    result.unwrap_or_else(|_| discarded())
}

fn discarded() -> RunOutcome {
    RunOutcome::Failed(Error::Dispatcher(
        "run ended without reporting an outcome".to_string(),
    ))
}
