//! Best-effort background scheduling hint for the worker thread

use tracing::debug;

/// Lower the calling thread's scheduling priority to `nice`.
///
/// Linux keeps a nice value per thread, so only the worker is affected.
/// Elsewhere this is a no-op. Returns whether the hint was applied; failures
/// are never fatal.
#[cfg(target_os = "linux")]
pub fn apply_background_priority(nice: i32) -> bool {
    // SAFETY: setpriority has no memory-safety preconditions; who = 0 is the caller.
    let rc = unsafe { libc::setpriority(libc::PRIO_PROCESS, 0, nice) };
    if rc != 0 {
        debug!(
            "Could not apply background priority {}: {}",
            nice,
            std::io::Error::last_os_error()
        );
        return false;
    }
    true
}

#[cfg(not(target_os = "linux"))]
pub fn apply_background_priority(nice: i32) -> bool {
    debug!("Background priority {} not supported on this platform", nice);
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hint_never_panics() {
        let applied = std::thread::spawn(|| apply_background_priority(10))
            .join()
            .unwrap();

        if cfg!(target_os = "linux") {
            assert!(applied);
        } else {
            assert!(!applied);
        }
    }
}
