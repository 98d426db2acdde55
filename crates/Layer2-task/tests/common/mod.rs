//! Shared helpers for the task integration tests

#![allow(dead_code)]

use handoff_task::{MainLoop, RunHandle, RunOutcome};
use std::time::Duration;

/// Upper bound for any single test run
pub const TIMEOUT: Duration = Duration::from_secs(10);

/// Drive the owning loop until `run` reports its outcome
pub async fn drive(main: &mut MainLoop, run: &mut RunHandle) -> RunOutcome {
    handoff_foundation::logging::init_for_tests();
    let mut outcome = None;
    main.run_until_timeout(
        || {
            if outcome.is_none() {
                outcome = run.try_outcome();
            }
            outcome.is_some()
        },
        TIMEOUT,
    )
    .await
    .expect("run did not finish in time");
    outcome.expect("outcome recorded")
}

/// Drive the owning loop until every handle has reported
pub async fn drive_all(main: &mut MainLoop, runs: &mut [RunHandle]) -> Vec<RunOutcome> {
    let mut outcomes = Vec::with_capacity(runs.len());
    for run in runs.iter_mut() {
        outcomes.push(drive(main, run).await);
    }
    outcomes
}
