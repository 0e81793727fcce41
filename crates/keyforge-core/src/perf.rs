// Keyforge Call Timing
// Flags hook callbacks that run long enough to be felt as input lag

use std::time::{Duration, Instant};

use log::{trace, warn};

/// Callbacks slower than this are logged as warnings
pub const DEFAULT_SLOW_THRESHOLD: Duration = Duration::from_millis(10);

/// Measures a named operation and warns when it exceeds a threshold
#[derive(Debug, Clone)]
pub struct SlowCallTimer {
    label: &'static str,
    threshold: Duration,
}

impl SlowCallTimer {
    pub fn new(label: &'static str, threshold: Duration) -> Self {
        Self { label, threshold }
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    /// Start timing; the measurement is logged when the guard drops
    pub fn start(&self) -> TimingGuard<'_> {
        TimingGuard {
            timer: self,
            started: Instant::now(),
        }
    }

    /// Log a finished measurement, returning whether it was slow
    pub fn record(&self, elapsed: Duration) -> bool {
        if elapsed > self.threshold {
            warn!(
                "{} took {:.2}ms (threshold {}ms)",
                self.label,
                elapsed.as_secs_f64() * 1000.0,
                self.threshold.as_millis()
            );
            true
        } else {
            trace!("{} took {:?}", self.label, elapsed);
            false
        }
    }
}

impl Default for SlowCallTimer {
    fn default() -> Self {
        Self::new("operation", DEFAULT_SLOW_THRESHOLD)
    }
}

pub struct TimingGuard<'a> {
    timer: &'a SlowCallTimer,
    started: Instant,
}

impl TimingGuard<'_> {
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Drop for TimingGuard<'_> {
    fn drop(&mut self) {
        self.timer.record(self.started.elapsed());
    }
}
