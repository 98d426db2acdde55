//! Inline dispatcher - the scheduling thread is the owning context

use super::r#trait::{Callback, OwnerDispatcher};
use handoff_foundation::Result;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

/// Runs callbacks synchronously on the thread that schedules them.
///
/// Exactly one thread drains the queue at a time, so callbacks never
/// overlap and run in submission order. A callback scheduled from inside
/// another callback is queued and runs right after the outer one returns;
/// a callback scheduled while another thread is draining is run by that
/// thread. Intended for headless use and tests; phase callbacks end up on
/// the worker thread.
#[derive(Default)]
pub struct InlineDispatcher {
    queue: Mutex<VecDeque<Callback>>,
    draining: AtomicBool,
}

impl InlineDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn drain(&self) {
        while self
            .draining
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            let guard = DrainGuard(&self.draining);
            loop {
                // lock released before the callback runs
                let next = self.queue.lock().pop_front();
                match next {
                    Some(callback) => callback(),
                    None => break,
                }
            }
            drop(guard);

            // another thread may have queued work after our last pop
            if self.queue.lock().is_empty() {
                break;
            }
        }
    }
}

/// Clears the draining flag even if a callback panics
struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl OwnerDispatcher for InlineDispatcher {
    fn schedule(&self, callback: Callback) -> Result<()> {
        self.queue.lock().push_back(callback);
        self.drain();
        Ok(())
    }

    fn name(&self) -> &'static str {
        "inline"
    }
}

impl std::fmt::Debug for InlineDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InlineDispatcher")
            .field("queued", &self.queue.lock().len())
            .field("draining", &self.draining.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[test]
    fn test_runs_immediately_in_order() {
        let dispatcher = InlineDispatcher::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        for i in 0..3 {
            let log = Arc::clone(&log);
            dispatcher
                .schedule(Box::new(move || log.lock().push(i)))
                .unwrap();
        }

        assert_eq!(*log.lock(), vec![0, 1, 2]);
        assert_eq!(dispatcher.name(), "inline");
    }

    #[test]
    fn test_nested_callback_runs_after_outer_returns() {
        let dispatcher = Arc::new(InlineDispatcher::new());
        let log = Arc::new(Mutex::new(Vec::new()));

        let outer = {
            let dispatcher = Arc::clone(&dispatcher);
            let log = Arc::clone(&log);
            move || {
                log.lock().push("outer start");
                let nested_log = Arc::clone(&log);
                dispatcher
                    .schedule(Box::new(move || nested_log.lock().push("nested")))
                    .unwrap();
                log.lock().push("outer end");
            }
        };
        dispatcher.schedule(Box::new(outer)).unwrap();

        assert_eq!(*log.lock(), vec!["outer start", "outer end", "nested"]);
    }

    #[test]
    fn test_callbacks_from_many_threads_never_overlap() {
        let dispatcher = Arc::new(InlineDispatcher::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));
        let ran = Arc::new(AtomicUsize::new(0));

        let threads: Vec<_> = (0..4)
            .map(|_| {
                let dispatcher = Arc::clone(&dispatcher);
                let inside = Arc::clone(&inside);
                let max_inside = Arc::clone(&max_inside);
                let ran = Arc::clone(&ran);
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        let inside = Arc::clone(&inside);
                        let max_inside = Arc::clone(&max_inside);
                        let ran = Arc::clone(&ran);
                        dispatcher
                            .schedule(Box::new(move || {
                                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                                max_inside.fetch_max(now, Ordering::SeqCst);
                                std::thread::yield_now();
                                inside.fetch_sub(1, Ordering::SeqCst);
                                ran.fetch_add(1, Ordering::SeqCst);
                            }))
                            .unwrap();
                    }
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }

        assert_eq!(ran.load(Ordering::SeqCst), 100);
        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
    }
}
