//! Progress publishing from inside a background body

use crate::body::BackgroundTask;
use crate::task::{RunId, Shared};
use std::sync::Arc;
use tracing::trace;

/// Handed to [`BackgroundTask::do_in_background`]; only exists while the
/// body runs, so progress can never be published outside a run.
pub struct ProgressPublisher<T: BackgroundTask> {
    shared: Arc<Shared<T>>,
    run_id: RunId,
}

impl<T: BackgroundTask> ProgressPublisher<T> {
    pub(crate) fn new(shared: Arc<Shared<T>>, run_id: RunId) -> Self {
        Self { shared, run_id }
    }

    /// Forward `values` to `on_progress_update` on the owning context.
    ///
    /// Dropped without delivery once the task is cancelled, including batches
    /// that were already queued when `cancel` ran. Returns whether the update
    /// was scheduled.
    pub fn publish_progress(&self, values: Vec<T::Progress>) -> bool {
        if self.shared.is_cancelled() {
            self.shared.stats.record_progress_dropped();
            trace!("Run {} progress dropped after cancel", self.run_id);
            return false;
        }

        let shared = Arc::clone(&self.shared);
        let run_id = self.run_id;
        let deliver = move || {
            // cancel may have landed while the batch sat in the owner's queue
            if shared.is_cancelled() {
                shared.stats.record_progress_dropped();
                trace!("Run {} queued progress dropped after cancel", run_id);
                return;
            }
            shared.stats.record_progress_delivered();
            shared.body.on_progress_update(values);
        };

        match self.shared.dispatcher.schedule(Box::new(deliver)) {
            Ok(()) => true,
            Err(e) => {
                self.shared.stats.record_progress_dropped();
                trace!("Run {} progress not scheduled: {}", self.run_id, e);
                false
            }
        }
    }

    /// Publish a single value
    pub fn publish(&self, value: T::Progress) -> bool {
        self.publish_progress(vec![value])
    }

    /// Cooperative cancellation check for the body
    pub fn is_cancelled(&self) -> bool {
        self.shared.is_cancelled()
    }

    /// Id of the run this publisher belongs to
    pub fn run_id(&self) -> RunId {
        self.run_id
    }
}

impl<T: BackgroundTask> std::fmt::Debug for ProgressPublisher<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressPublisher")
            .field("run_id", &self.run_id)
            .finish()
    }
}
