use std::sync::atomic::{AtomicBool, Ordering};

/// Process-local "a sweep is running" flag. Each dispatcher owns one.
///
/// This only serializes sweeps inside one process. Nothing stops another process from sweeping
/// the same store at the same time.
#[derive(Debug, Default)]
pub struct SweepLock {
    in_progress: AtomicBool,
}

impl SweepLock {
    /// Take the lock if nobody holds it. The lock is released when the permit is dropped, including
    /// on early return and panic.
    pub fn try_acquire(&self) -> Option<SweepPermit<'_>> {
        self.in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SweepPermit { lock: self })
    }

    pub fn is_held(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }
}

#[must_use = "the sweep lock is released as soon as the permit is dropped"]
#[derive(Debug)]
pub struct SweepPermit<'a> {
    lock: &'a SweepLock,
}

impl Drop for SweepPermit<'_> {
    fn drop(&mut self) {
        self.lock.in_progress.store(false, Ordering::Release);
    }
}
