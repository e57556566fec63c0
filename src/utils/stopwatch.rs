//! Wall-clock timing for pipeline stages.

use std::time::{Duration, Instant};

use log::debug;

/// Restartable stage timer.
///
/// `lap` logs the time since the last lap (or start) at debug level and
/// resets, so a sequence of laps times consecutive stages.
pub struct StopWatch {
    started: Instant,
    last_lap: Instant,
}

impl StopWatch {
    pub fn start() -> Self {
        let now = Instant::now();
        Self {
            started: now,
            last_lap: now,
        }
    }

    /// Time since the last lap, logged under `label`.
    pub fn lap(&mut self, label: &str) -> Duration {
        let now = Instant::now();
        let elapsed = now - self.last_lap;
        self.last_lap = now;
        debug!("{label}: {:.1} ms", elapsed.as_secs_f64() * 1e3);
        elapsed
    }

    /// Total time since the watch was started.
    pub fn total(&self) -> Duration {
        self.started.elapsed()
    }
}
