//! # handoff-task
//!
//! Phased background tasks for applications with a single owning thread
//! (a UI or main loop).
//!
//! ## Features
//!
//! - `on_pre_execute` -> `do_in_background` -> `on_post_execute`, strictly ordered per run
//! - Background body on a dedicated serial worker thread
//! - Progress publishing from the body, dropped once cancelled
//! - Cooperative cancellation that also closes the worker
//! - A per-run completion handle reporting success, failure or rejection
//! - Pluggable owning-context dispatchers (`MainLoop`, `InlineDispatcher`)
//!
//! ```ignore
//! let (handle, mut main) = main_loop();
//! let task = Task::new(body, Arc::new(handle));
//! let run = task.execute(Some(vec![url]));
//! main.run_until(|| task.state().is_terminal()).await;
//! ```

pub mod body;
pub mod dispatcher;
pub mod handle;
pub mod priority;
pub mod progress;
pub mod state;
pub mod task;
pub mod worker;

pub use body::{BackgroundTask, FnTask};
pub use dispatcher::{main_loop, Callback, InlineDispatcher, LoopHandle, MainLoop, OwnerDispatcher};
pub use handle::{RunHandle, RunOutcome};
pub use priority::apply_background_priority;
pub use progress::ProgressPublisher;
pub use state::RunState;
pub use task::{RunId, RunRecord, Task, TaskStats};
pub use worker::{Job, SerialWorker};

// Foundation re-exports used in task signatures
pub use handoff_foundation::{Error, HandoffConfig, JsonStore, Result, TaskConfig};
