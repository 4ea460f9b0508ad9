//! Control state for the periodic sweeps.
//!
//! A [`TaskControl`] is shared between a sweep loop and whoever owns it.
//! All fields are atomics wrapped in [`std::sync::Arc`] by the caller, so
//! checking them on every iteration costs no locks.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

/// Pause, resume, and stop switches for one periodic task.
#[derive(Debug, Default)]
pub struct TaskControl {
    /// Whether the task is currently paused.
    paused: AtomicBool,

    /// Whether a stop has been requested.
    stop_requested: AtomicBool,

    /// Wakes the task when resumed or stopped.
    wake: Notify,
}

impl TaskControl {
    /// Create a running task control.
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Pause / Resume
    // -----------------------------------------------------------------------

    /// Check whether the task is paused.
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Pause the task. It finishes its current sweep, then sleeps until resumed.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::Release);
    }

    /// Resume the task and wake it.
    pub fn resume(&self) {
        self.paused.store(false, Ordering::Release);
        self.wake.notify_waiters();
    }

    /// Wait until the task is no longer paused (or a stop arrives).
    pub async fn wait_if_paused(&self) {
        while self.is_paused() && !self.is_stop_requested() {
            let notified = self.wake.notified();
            if !self.is_paused() || self.is_stop_requested() {
                break;
            }
            notified.await;
        }
    }

    // -----------------------------------------------------------------------
    // Stop
    // -----------------------------------------------------------------------

    /// Request a clean stop and wake the task.
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
        self.wake.notify_waiters();
    }

    /// Check whether a stop has been requested.
    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    /// Sleep for `period`, returning early with `false` if a stop arrives.
    pub async fn sleep_or_stop(&self, period: std::time::Duration) -> bool {
        // Register for the wakeup before checking the flag, so a stop landing
        // in between is not lost.
        let notified = self.wake.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        if self.is_stop_requested() {
            return false;
        }
        tokio::select! {
            () = tokio::time::sleep(period) => !self.is_stop_requested(),
            () = notified => !self.is_stop_requested(),
        }
    }
}
