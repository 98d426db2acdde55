//! Run state machine

use serde::{Deserialize, Serialize};

/// Phase a run is in.
///
/// `Created -> PreExecuting -> BackgroundRunning -> {PostExecuting | Failed} -> Done`.
/// `Rejected` is reached directly from `Created` when the worker refuses the job.
/// Cancellation is tracked separately and never forces a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    /// No run has been started yet
    Created,

    /// Queued on the worker, waiting for `on_pre_execute` on the owning context
    PreExecuting,

    /// Body is running on the worker
    BackgroundRunning,

    /// Body returned, `on_post_execute` is scheduled on the owning context
    PostExecuting,

    /// Body failed; the post phase is skipped
    Failed,

    /// Post phase finished
    Done,

    /// Worker refused the job
    Rejected,
}

impl RunState {
    /// Check if this is a terminal state (cannot transition further)
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Done | RunState::Failed | RunState::Rejected)
    }

    /// Check if a run is currently in flight
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            RunState::PreExecuting | RunState::BackgroundRunning | RunState::PostExecuting
        )
    }

    /// Check if the run finished successfully
    pub fn is_success(&self) -> bool {
        matches!(self, RunState::Done)
    }

    /// Whether `next` is a legal successor of `self`
    pub fn can_transition_to(&self, next: RunState) -> bool {
        use RunState::*;
        match (self, next) {
            // a new run may start once the previous one settled
            (Created | Done | Failed | Rejected, PreExecuting | Rejected) => true,
            (PreExecuting, BackgroundRunning | Failed) => true,
            (BackgroundRunning, PostExecuting | Failed) => true,
            (PostExecuting, Done | Failed) => true,
            _ => false,
        }
    }

    /// Get display name for the state
    pub fn display_name(&self) -> &'static str {
        match self {
            RunState::Created => "Created",
            RunState::PreExecuting => "PreExecuting",
            RunState::BackgroundRunning => "BackgroundRunning",
            RunState::PostExecuting => "PostExecuting",
            RunState::Failed => "Failed",
            RunState::Done => "Done",
            RunState::Rejected => "Rejected",
        }
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::Created
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        let path = [
            RunState::Created,
            RunState::PreExecuting,
            RunState::BackgroundRunning,
            RunState::PostExecuting,
            RunState::Done,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_illegal_transitions() {
        assert!(!RunState::Created.can_transition_to(RunState::BackgroundRunning));
        assert!(!RunState::PreExecuting.can_transition_to(RunState::PostExecuting));
        assert!(!RunState::Done.can_transition_to(RunState::BackgroundRunning));
        assert!(!RunState::Failed.can_transition_to(RunState::PostExecuting));
    }

    #[test]
    fn test_classification() {
        assert!(RunState::Done.is_terminal());
        assert!(RunState::Failed.is_terminal());
        assert!(RunState::Rejected.is_terminal());
        assert!(!RunState::Created.is_terminal());
        assert!(RunState::BackgroundRunning.is_active());
        assert!(!RunState::Created.is_active());
        assert!(RunState::Done.is_success());
        assert!(!RunState::Failed.is_success());
        assert_eq!(RunState::default(), RunState::Created);
    }
}
