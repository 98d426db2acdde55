//! Queue-backed owning context
//!
//! `LoopHandle` is the cheap, cloneable scheduling side; `MainLoop` is the
//! draining side, owned by the thread that plays the role of the UI/main
//! thread. Callbacks run on whichever thread drives the `MainLoop`, strictly
//! in FIFO order.

use super::r#trait::{Callback, OwnerDispatcher};
use handoff_foundation::{Error, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Create a connected handle/loop pair
pub fn main_loop() -> (LoopHandle, MainLoop) {
    let (tx, rx) = mpsc::unbounded_channel();
    let scheduled = Arc::new(AtomicU64::new(0));
    (
        LoopHandle {
            tx,
            scheduled: Arc::clone(&scheduled),
        },
        MainLoop {
            rx,
            scheduled,
            executed: 0,
        },
    )
}

/// Scheduling side of a [`MainLoop`]
#[derive(Debug, Clone)]
pub struct LoopHandle {
    tx: mpsc::UnboundedSender<Callback>,
    scheduled: Arc<AtomicU64>,
}

impl LoopHandle {
    /// Check if the loop has been dropped
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Total callbacks accepted so far
    pub fn scheduled_count(&self) -> u64 {
        self.scheduled.load(Ordering::Relaxed)
    }
}

impl OwnerDispatcher for LoopHandle {
    fn schedule(&self, callback: Callback) -> Result<()> {
        self.tx
            .send(callback)
            .map_err(|_| Error::Dispatcher("main loop is closed".to_string()))?;
        self.scheduled.fetch_add(1, Ordering::Relaxed);
        trace!("Callback scheduled on main loop");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "main-loop"
    }
}

/// Draining side of the owning context
pub struct MainLoop {
    rx: mpsc::UnboundedReceiver<Callback>,
    scheduled: Arc<AtomicU64>,
    executed: u64,
}

impl MainLoop {
    /// Run every callback that is already queued, without waiting.
    /// Returns how many ran.
    pub fn run_pending(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(callback) = self.rx.try_recv() {
            self.dispatch(callback);
            ran += 1;
        }
        ran
    }

    /// Wait for the next callback and run it.
    /// Returns `false` once every handle is gone and the queue is empty.
    pub async fn turn(&mut self) -> bool {
        match self.rx.recv().await {
            Some(callback) => {
                self.dispatch(callback);
                true
            }
            None => false,
        }
    }

    /// Run callbacks until `done` returns true.
    /// Returns the final value of `done` if the queue closes first.
    pub async fn run_until<F>(&mut self, mut done: F) -> bool
    where
        F: FnMut() -> bool,
    {
        loop {
            if done() {
                return true;
            }
            if !self.turn().await {
                return done();
            }
        }
    }

    /// Like [`run_until`](Self::run_until) but gives up after `timeout`
    pub async fn run_until_timeout<F>(&mut self, done: F, timeout: Duration) -> Result<()>
    where
        F: FnMut() -> bool,
    {
        match tokio::time::timeout(timeout, self.run_until(done)).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(Error::Dispatcher(
                "main loop closed before condition was met".to_string(),
            )),
            Err(_) => Err(Error::Timeout(format!(
                "condition not met within {:?}",
                timeout
            ))),
        }
    }

    /// Keep running callbacks for `duration`, then return how many ran
    pub async fn run_for(&mut self, duration: Duration) -> u64 {
        let before = self.executed;
        let deadline = tokio::time::Instant::now() + duration;
        while let Ok(true) = tokio::time::timeout_at(deadline, self.turn()).await {}
        self.executed - before
    }

    /// Run until every handle is dropped
    pub async fn run(mut self) {
        while self.turn().await {}
        debug!("Main loop finished after {} callbacks", self.executed);
    }

    /// Total callbacks executed by this loop
    pub fn executed_count(&self) -> u64 {
        self.executed
    }

    /// Callbacks scheduled but not yet executed
    pub fn pending_count(&self) -> u64 {
        self.scheduled
            .load(Ordering::Relaxed)
            .saturating_sub(self.executed)
    }

    /// Stop accepting callbacks; already queued ones can still be drained
    pub fn close(&mut self) {
        self.rx.close();
    }

    fn dispatch(&mut self, callback: Callback) {
        callback();
        self.executed += 1;
    }
}

impl std::fmt::Debug for MainLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MainLoop")
            .field("executed", &self.executed)
            .field("pending", &self.pending_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_run_pending_is_fifo() {
        let (handle, mut main) = main_loop();
        let log = Arc::new(Mutex::new(Vec::new()));

        for i in 0..5 {
            let log = Arc::clone(&log);
            handle.schedule(Box::new(move || log.lock().push(i))).unwrap();
        }
        assert_eq!(main.pending_count(), 5);
        assert!(log.lock().is_empty());

        assert_eq!(main.run_pending(), 5);
        assert_eq!(*log.lock(), vec![0, 1, 2, 3, 4]);
        assert_eq!(main.executed_count(), 5);
        assert_eq!(main.pending_count(), 0);
    }

    #[test]
    fn test_schedule_after_drop_fails() {
        let (handle, main) = main_loop();
        drop(main);

        assert!(handle.is_closed());
        let result = handle.schedule(Box::new(|| {}));
        assert!(matches!(result, Err(Error::Dispatcher(_))));
        assert_eq!(handle.scheduled_count(), 0);
    }

    #[tokio::test]
    async fn test_callbacks_from_other_threads() {
        let (handle, mut main) = main_loop();
        let owner = std::thread::current().id();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let worker = {
            let seen = Arc::clone(&seen);
            std::thread::spawn(move || {
                for i in 0..3 {
                    let seen = Arc::clone(&seen);
                    handle
                        .schedule(Box::new(move || {
                            seen.lock().push((i, std::thread::current().id()));
                        }))
                        .unwrap();
                }
            })
        };
        worker.join().unwrap();

        main.run_until_timeout(|| seen.lock().len() == 3, Duration::from_secs(5))
            .await
            .unwrap();

        let seen = seen.lock();
        assert_eq!(seen.iter().map(|(i, _)| *i).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert!(seen.iter().all(|(_, id)| *id == owner));
    }

    #[tokio::test]
    async fn test_run_stops_when_handles_dropped() {
        let (handle, main) = main_loop();
        handle.schedule(Box::new(|| {})).unwrap();
        drop(handle);

        tokio::time::timeout(Duration::from_secs(5), main.run())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_run_until_timeout_expires() {
        let (_handle, mut main) = main_loop();
        let result = main
            .run_until_timeout(|| false, Duration::from_millis(50))
            .await;
        assert!(matches!(result, Err(Error::Timeout(_))));
    }

    #[tokio::test]
    async fn test_run_for_counts_callbacks() {
        let (handle, mut main) = main_loop();
        handle.schedule(Box::new(|| {})).unwrap();
        handle.schedule(Box::new(|| {})).unwrap();

        assert_eq!(main.run_for(Duration::from_millis(50)).await, 2);
    }
}
