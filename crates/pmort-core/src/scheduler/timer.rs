//! One-shot timer and shutdown token for the scheduling loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Granularity at which [`SleepTimer`] checks for shutdown.
const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// Cooperative shutdown flag shared between the signal handler and the loop.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    requested: Arc<AtomicBool>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks the scheduler to stop at its next suspension point.
    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}

/// Why a wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    /// The full duration passed.
    Elapsed,
    /// Shutdown was requested before or during the wait.
    Shutdown,
}

/// Suspends the scheduler between iterations.
pub trait Timer {
    /// Blocks for `duration` or until `shutdown` is requested.
    fn wait(&mut self, duration: Duration, shutdown: &Shutdown) -> Wake;
}

/// Wall-clock timer that sleeps in short slices so shutdown stays responsive.
#[derive(Debug, Clone, Copy, Default)]
pub struct SleepTimer;

impl Timer for SleepTimer {
    fn wait(&mut self, duration: Duration, shutdown: &Shutdown) -> Wake {
        let mut remaining = duration;
        while remaining > Duration::ZERO {
            if shutdown.is_requested() {
                return Wake::Shutdown;
            }
            let slice = remaining.min(SLEEP_SLICE);
            std::thread::sleep(slice);
            remaining = remaining.saturating_sub(slice);
        }

        if shutdown.is_requested() {
            Wake::Shutdown
        } else {
            Wake::Elapsed
        }
    }
}
