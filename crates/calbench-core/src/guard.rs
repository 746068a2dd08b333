//! Busy guard for engine operations.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Holds an engine's busy flag for the lifetime of one operation.
///
/// The flag is cleared when the guard is dropped, including on panic
/// unwinding inside a worker.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use std::sync::atomic::AtomicBool;
/// use calbench_core::BusyGuard;
///
/// let flag = Arc::new(AtomicBool::new(false));
/// let guard = BusyGuard::try_acquire(&flag).unwrap();
/// assert!(BusyGuard::try_acquire(&flag).is_none());
/// drop(guard);
/// assert!(BusyGuard::try_acquire(&flag).is_some());
/// ```
#[derive(Debug)]
pub struct BusyGuard {
    flag: Arc<AtomicBool>,
}

impl BusyGuard {
    /// Set the flag if it is clear. Returns `None` when already set.
    pub fn try_acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self {
                flag: Arc::clone(flag),
            })
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}
