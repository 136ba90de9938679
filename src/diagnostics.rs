use std::collections::VecDeque;
use std::io::Write;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;

use crate::clock::ClockSource;
use crate::timer::engine::EngineSettings;

const GAP_BUCKETS_MS: [u64; 5] = [1, 5, 10, 25, 50];

/// Gaps between successive polls of the tick loop.
pub struct PollStats {
    total_polls: u64,
    risky_polls: u64,
    max_gap: Duration,
    risk_threshold: Duration,
    window_size: usize,
    window: VecDeque<Duration>,
    gap_histogram: [u64; 6],
}

impl PollStats {
    pub fn new(window_size: usize, risk_threshold: Duration) -> Self {
        let window_size = window_size.max(1);
        Self {
            total_polls: 0,
            risky_polls: 0,
            max_gap: Duration::ZERO,
            risk_threshold,
            window_size,
            window: VecDeque::with_capacity(window_size),
            gap_histogram: [0; 6],
        }
    }

    pub fn record_gap(&mut self, gap: Duration) {
        self.total_polls += 1;
        self.max_gap = self.max_gap.max(gap);
        if gap > self.risk_threshold {
            self.risky_polls += 1;
        }

        if self.window.len() >= self.window_size {
            let _ = self.window.pop_front();
        }
        self.window.push_back(gap);
        self.update_histogram(gap);
    }

    pub fn rolling_mean_gap(&self) -> Duration {
        if self.window.is_empty() {
            return Duration::ZERO;
        }
        let total: Duration = self.window.iter().sum();
        total / self.window.len() as u32
    }

    pub fn total_polls(&self) -> u64 {
        self.total_polls
    }

    /// Polls whose gap exceeded the threshold; a tick due during such a gap may land late.
    pub fn risky_polls(&self) -> u64 {
        self.risky_polls
    }

    pub fn max_gap(&self) -> Duration {
        self.max_gap
    }

    pub fn histogram(&self) -> [u64; 6] {
        self.gap_histogram
    }

    fn update_histogram(&mut self, gap: Duration) {
        let ms = gap.as_secs_f64() * 1_000.0;
        let bucket = GAP_BUCKETS_MS
            .iter()
            .position(|&limit| ms <= limit as f64)
            .unwrap_or(GAP_BUCKETS_MS.len());
        self.gap_histogram[bucket] += 1;
    }
}

pub fn run_diagnostics<W: Write>(
    out: &mut W,
    clock: &dyn ClockSource,
    settings: &EngineSettings,
    benchmark: Duration,
) -> Result<()> {
    let window = settings.tick_window;
    writeln!(out, "Countdown diagnostics")?;
    writeln!(out, "Selected clock source: {}", clock.label())?;
    writeln!(out, "Monotonic clock: {}", clock.is_monotonic())?;
    writeln!(
        out,
        "Tick window: {} ms to {} ms ({}% tolerance)",
        window.lower().as_millis(),
        window.upper().as_millis(),
        window.tolerance_percent()
    )?;
    writeln!(
        out,
        "Poll interval: {} ms",
        settings.poll_interval.as_millis()
    )?;

    writeln!(
        out,
        "Running {:.1} second poll pacing benchmark...",
        benchmark.as_secs_f64()
    )?;
    let mut stats = PollStats::new(512, window.band_width() / 2);
    let bench_end = Instant::now() + benchmark;
    let mut previous = clock.now();
    while Instant::now() < bench_end {
        thread::sleep(settings.poll_interval);
        let current = clock.now();
        stats.record_gap(current.saturating_sub(previous));
        previous = current;
    }

    writeln!(out, "Benchmark summary:")?;
    writeln!(out, "  Polls: {}", stats.total_polls())?;
    writeln!(
        out,
        "  Mean gap: {:.3} ms",
        stats.rolling_mean_gap().as_secs_f64() * 1_000.0
    )?;
    writeln!(
        out,
        "  Max gap: {:.3} ms",
        stats.max_gap().as_secs_f64() * 1_000.0
    )?;
    writeln!(out, "  Risky polls: {}", stats.risky_polls())?;
    writeln!(
        out,
        "  Poll-gap histogram buckets (<=1, <=5, <=10, <=25, <=50, >50 ms):"
    )?;
    writeln!(out, "  {:?}", stats.histogram())?;
    Ok(())
}
