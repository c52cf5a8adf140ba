// Transfer completion signal
//
// Binary "pipeline idle" flag plus an embassy Signal to wake the waiter.
// Starts idle. present() arms it; the transfer task fires it once per
// submitted frame, success or not, and records whether it failed.

use core::sync::atomic::{AtomicBool, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;

pub struct Completion {
    idle: AtomicBool,
    failed: AtomicBool,
    signal: Signal<CriticalSectionRawMutex, ()>,
}

impl Default for Completion {
    fn default() -> Self {
        Self::new()
    }
}

impl Completion {
    pub const fn new() -> Self {
        Self {
            idle: AtomicBool::new(true),
            failed: AtomicBool::new(false),
            signal: Signal::new(),
        }
    }

    /// Back to the initial idle state.
    pub fn reset(&self) {
        self.failed.store(false, Ordering::Relaxed);
        self.idle.store(true, Ordering::Release);
        self.signal.reset();
    }

    pub fn arm(&self) {
        self.signal.reset();
        self.failed.store(false, Ordering::Relaxed);
        self.idle.store(false, Ordering::Release);
    }

    pub fn fire(&self, ok: bool) {
        self.failed.store(!ok, Ordering::Relaxed);
        self.idle.store(true, Ordering::Release);
        self.signal.signal(());
    }

    pub fn is_idle(&self) -> bool {
        self.idle.load(Ordering::Acquire)
    }

    /// Outcome of the last fired frame.
    pub fn failed(&self) -> bool {
        self.failed.load(Ordering::Relaxed)
    }

    pub async fn wait(&self) {
        while !self.is_idle() {
            self.signal.wait().await;
        }
    }
}
