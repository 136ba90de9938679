use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use serde::Deserialize;

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClockKind {
    #[default]
    Monotonic,
    Wall,
}

/// Source of timestamps for tick measurement.
///
/// `now` reports the time elapsed since the source was created. Only differences between two
/// readings are meaningful.
pub trait ClockSource: Send + Sync {
    fn now(&self) -> Duration;
    fn label(&self) -> &'static str;
    fn is_monotonic(&self) -> bool;
}

pub fn select_clock(kind: ClockKind) -> Arc<dyn ClockSource> {
    match kind {
        ClockKind::Monotonic => Arc::new(MonotonicClock::new()),
        ClockKind::Wall => Arc::new(WallClock::new()),
    }
}

pub struct MonotonicClock {
    anchor: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            anchor: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockSource for MonotonicClock {
    fn now(&self) -> Duration {
        self.anchor.elapsed()
    }

    fn label(&self) -> &'static str {
        "MONOTONIC"
    }

    fn is_monotonic(&self) -> bool {
        true
    }
}

/// Wall-clock source. Follows system clock adjustments, but its output is clamped so it never
/// runs backwards: a backward jump holds the reading until real time catches up.
pub struct WallClock {
    anchor: DateTime<Local>,
    last_output: Mutex<Duration>,
}

impl WallClock {
    pub fn new() -> Self {
        Self::with_anchor(Local::now())
    }

    fn with_anchor(anchor: DateTime<Local>) -> Self {
        Self {
            anchor,
            last_output: Mutex::new(Duration::ZERO),
        }
    }

    fn elapsed_at(&self, wall_now: DateTime<Local>) -> Duration {
        let proposed = (wall_now - self.anchor).to_std().unwrap_or(Duration::ZERO);
        self.clamp_output_monotonic(proposed)
    }

    fn clamp_output_monotonic(&self, proposed: Duration) -> Duration {
        let mut guard = self
            .last_output
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if proposed < *guard {
            return *guard;
        }
        *guard = proposed;
        proposed
    }
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockSource for WallClock {
    fn now(&self) -> Duration {
        self.elapsed_at(Local::now())
    }

    fn label(&self) -> &'static str {
        "WALL_CLAMPED"
    }

    fn is_monotonic(&self) -> bool {
        false
    }
}

/// Test clock that only moves when told to.
#[cfg(test)]
#[derive(Default)]
pub struct ManualClock {
    now: Mutex<Duration>,
}

#[cfg(test)]
impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, step: Duration) {
        let mut guard = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *guard += step;
    }
}

#[cfg(test)]
impl ClockSource for ManualClock {
    fn now(&self) -> Duration {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn label(&self) -> &'static str {
        "MANUAL"
    }

    fn is_monotonic(&self) -> bool {
        true
    }
}
