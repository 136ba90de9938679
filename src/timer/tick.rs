use std::thread;
use std::time::Duration;

use tracing::{trace, warn};

use crate::clock::ClockSource;
use crate::timer::model::{DisplayUpdater, Generation};
use crate::timer::token::CancellationToken;

pub const NOMINAL_TICK: Duration = Duration::from_secs(1);
pub const DEFAULT_TICK_TOLERANCE_PERCENT: u32 = 10;

/// Accepted elapsed interval between two ticks: `nominal ± tolerance_percent`, bounds inclusive.
///
/// Only `lower` gates emission. A poll past `upper` is classified late but still emits the
/// next tick and resyncs, so `upper` only separates on-time ticks from late ones in the warn
/// log and [`RunStats`].
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct TickWindow {
    nominal: Duration,
    tolerance_percent: u32,
    lower: Duration,
    upper: Duration,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum TickDecision {
    Early,
    OnTime,
    Late,
}

impl TickWindow {
    pub fn new(nominal: Duration, tolerance_percent: u32) -> Self {
        let band = nominal * tolerance_percent / 100;
        Self {
            nominal,
            tolerance_percent,
            lower: nominal.saturating_sub(band),
            upper: nominal.saturating_add(band),
        }
    }

    pub fn with_tolerance_percent(tolerance_percent: u32) -> Self {
        Self::new(NOMINAL_TICK, tolerance_percent)
    }

    pub fn nominal(&self) -> Duration {
        self.nominal
    }

    pub fn tolerance_percent(&self) -> u32 {
        self.tolerance_percent
    }

    pub fn lower(&self) -> Duration {
        self.lower
    }

    pub fn upper(&self) -> Duration {
        self.upper
    }

    pub fn band_width(&self) -> Duration {
        self.upper - self.lower
    }

    pub fn classify(&self, elapsed: Duration) -> TickDecision {
        if elapsed < self.lower {
            TickDecision::Early
        } else if elapsed <= self.upper {
            TickDecision::OnTime
        } else {
            TickDecision::Late
        }
    }
}

impl Default for TickWindow {
    fn default() -> Self {
        Self::with_tolerance_percent(DEFAULT_TICK_TOLERANCE_PERCENT)
    }
}

/// State owned by one countdown run.
#[derive(Debug)]
pub struct RunContext {
    duration: u64,
    remaining: u64,
    last_tick: Duration,
    token: CancellationToken,
}

impl RunContext {
    pub fn new(duration: u64, started_at: Duration, token: CancellationToken) -> Self {
        Self {
            duration,
            remaining: duration,
            last_tick: started_at,
            token,
        }
    }

    pub fn duration(&self) -> u64 {
        self.duration
    }

    pub fn generation(&self) -> Generation {
        self.token.generation()
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum RunEnd {
    Exhausted,
    Cancelled,
}

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct RunStats {
    pub polls: u64,
    pub ticks: u64,
    pub late_ticks: u64,
    pub max_drift: Duration,
}

impl RunStats {
    fn record_tick(&mut self, elapsed: Duration, nominal: Duration, decision: TickDecision) {
        self.ticks += 1;
        if decision == TickDecision::Late {
            self.late_ticks += 1;
        }
        self.max_drift = self.max_drift.max(elapsed.abs_diff(nominal));
    }
}

/// Runs one countdown to completion or cancellation.
///
/// Emits `remaining` for every tick, from the requested duration down to and including zero.
/// Elapsed time is always measured from the last emitted tick. The token is checked before
/// every clock read, so a cancellation is observed within one `poll_interval`.
pub fn run_countdown(
    mut ctx: RunContext,
    clock: &dyn ClockSource,
    display: &dyn DisplayUpdater,
    window: &TickWindow,
    poll_interval: Duration,
) -> (RunEnd, RunStats) {
    let mut stats = RunStats::default();
    loop {
        if ctx.token.is_cancelled() {
            return (RunEnd::Cancelled, stats);
        }

        let current = clock.now();
        stats.polls += 1;
        let elapsed = current.saturating_sub(ctx.last_tick);
        let decision = window.classify(elapsed);
        if decision != TickDecision::Early {
            if decision == TickDecision::Late {
                warn!(
                    generation = ctx.generation(),
                    remaining = ctx.remaining,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "tick arrived after the tolerance window; resyncing"
                );
            }
            trace!(generation = ctx.generation(), remaining = ctx.remaining, "tick");
            stats.record_tick(elapsed, window.nominal(), decision);
            display.on_tick(ctx.remaining);
            ctx.last_tick = current;
            match ctx.remaining.checked_sub(1) {
                Some(next) => ctx.remaining = next,
                None => return (RunEnd::Exhausted, stats),
            }
        }

        if !poll_interval.is_zero() {
            thread::sleep(poll_interval);
        }
    }
}
