use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::clock::ClockSource;
use crate::timer::model::{
    DisplayUpdater, Generation, TimerError, TimerState, parse_seconds,
};
use crate::timer::tick::{RunContext, RunEnd, TickWindow, run_countdown};
use crate::timer::token::CancellationToken;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct EngineSettings {
    pub poll_interval: Duration,
    pub tick_window: TickWindow,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            tick_window: TickWindow::default(),
        }
    }
}

struct EngineInner {
    state: TimerState,
    live: Option<CancellationToken>,
    last_generation: Generation,
    worker: Option<JoinHandle<()>>,
}

impl EngineInner {
    fn is_live(&self, generation: Generation) -> bool {
        self.live
            .as_ref()
            .is_some_and(|token| token.generation() == generation)
    }
}

struct Shared {
    inner: Mutex<EngineInner>,
    idle: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, EngineInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Single-timer countdown engine.
///
/// At most one countdown runs at a time, on its own thread. Control calls never wait for that
/// thread: `cancel` only signals the run's token, and the thread moves the engine back to
/// [`TimerState::Idle`] once it has concluded.
pub struct TimerEngine {
    shared: Arc<Shared>,
    clock: Arc<dyn ClockSource>,
    display: Arc<dyn DisplayUpdater>,
    settings: EngineSettings,
}

impl TimerEngine {
    pub fn new(
        clock: Arc<dyn ClockSource>,
        display: Arc<dyn DisplayUpdater>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(EngineInner {
                    state: TimerState::Idle,
                    live: None,
                    last_generation: 0,
                    worker: None,
                }),
                idle: Condvar::new(),
            }),
            clock,
            display,
            settings,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn status(&self) -> TimerState {
        self.shared.lock().state
    }

    /// Starts a countdown from raw user input.
    ///
    /// Input is only examined while idle. Malformed input is reported through
    /// [`DisplayUpdater::on_validation_error`] before the error is returned.
    pub fn start(&self, input: &str) -> Result<Generation, TimerError> {
        if self.status().is_engaged() {
            debug!("start ignored while engaged");
            return Err(TimerError::AlreadyRunning);
        }
        let seconds = match parse_seconds(input) {
            Ok(seconds) => seconds,
            Err(err) => {
                debug!(%err, input = err.input().unwrap_or_default(), "rejected timer input");
                self.display.on_validation_error(&err.to_string());
                return Err(err.into());
            }
        };
        self.start_seconds(seconds)
    }

    pub fn start_seconds(&self, seconds: u64) -> Result<Generation, TimerError> {
        let mut inner = self.shared.lock();
        if inner.state != TimerState::Idle {
            debug!(state = %inner.state, "start ignored while engaged");
            return Err(TimerError::AlreadyRunning);
        }

        if let Some(stale) = inner.live.take() {
            warn!(
                generation = stale.generation(),
                "superseding a countdown that never concluded"
            );
            stale.cancel();
        }
        // A handle that is still running belongs to a thread inside its final
        // `on_disengaged` callback, possibly this one; it exits on its own.
        if let Some(previous) = inner.worker.take()
            && previous.is_finished()
        {
            join_worker(previous);
        }

        let generation = inner.last_generation + 1;
        let token = CancellationToken::new(generation);
        let ctx = RunContext::new(seconds, self.clock.now(), token.clone());
        let shared = Arc::clone(&self.shared);
        let clock = Arc::clone(&self.clock);
        let display = Arc::clone(&self.display);
        let settings = self.settings;
        let worker = thread::Builder::new()
            .name(format!("countdown-{generation}"))
            .spawn(move || run_worker(shared, clock, display, ctx, settings))?;

        inner.last_generation = generation;
        inner.live = Some(token);
        inner.state = TimerState::Running;
        inner.worker = Some(worker);
        info!(generation, seconds, "countdown started");
        Ok(generation)
    }

    pub fn cancel(&self) -> Result<(), TimerError> {
        let mut inner = self.shared.lock();
        if inner.state != TimerState::Running {
            debug!(state = %inner.state, "cancel ignored while not running");
            return Err(TimerError::NotRunning);
        }
        if let Some(token) = inner.live.as_ref() {
            token.cancel();
            info!(generation = token.generation(), "countdown cancelled");
        }
        inner.state = TimerState::Cancelled;
        Ok(())
    }

    /// Blocks until the engine is idle and the last countdown thread has exited, or the
    /// timeout elapses. Returns whether the engine is idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let worker = {
            let guard = self.shared.lock();
            let (mut guard, _) = self
                .shared
                .idle
                .wait_timeout_while(guard, timeout, |inner| inner.state != TimerState::Idle)
                .unwrap_or_else(PoisonError::into_inner);
            if guard.state != TimerState::Idle {
                return false;
            }
            guard.worker.take()
        };
        if let Some(worker) = worker {
            join_worker(worker);
        }
        true
    }
}

impl Drop for TimerEngine {
    fn drop(&mut self) {
        let worker = {
            let mut inner = self.shared.lock();
            if let Some(token) = inner.live.as_ref() {
                token.cancel();
            }
            if inner.state == TimerState::Running {
                inner.state = TimerState::Cancelled;
            }
            inner.worker.take()
        };
        if let Some(worker) = worker {
            join_worker(worker);
        }
    }
}

fn join_worker(worker: JoinHandle<()>) {
    if worker.thread().id() == thread::current().id() {
        return;
    }
    if worker.join().is_err() {
        warn!("countdown thread panicked");
    }
}

fn run_worker(
    shared: Arc<Shared>,
    clock: Arc<dyn ClockSource>,
    display: Arc<dyn DisplayUpdater>,
    ctx: RunContext,
    settings: EngineSettings,
) {
    let generation = ctx.generation();
    let duration = ctx.duration();
    let (end, stats) = run_countdown(
        ctx,
        clock.as_ref(),
        display.as_ref(),
        &settings.tick_window,
        settings.poll_interval,
    );

    // The token is read under the lock so a cancel racing the last tick either lands before
    // this point (cancelled) or is rejected afterwards as not running.
    let finished = {
        let mut inner = shared.lock();
        if !inner.is_live(generation) {
            debug!(generation, "superseded countdown exiting");
            return;
        }
        let cancelled = inner
            .live
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled);
        if end == RunEnd::Exhausted && !cancelled {
            inner.state = TimerState::Finished;
            true
        } else {
            inner.state = TimerState::Cancelled;
            false
        }
    };

    info!(
        generation,
        duration,
        outcome = if finished { "finished" } else { "cancelled" },
        ticks = stats.ticks,
        late_ticks = stats.late_ticks,
        polls = stats.polls,
        max_drift_ms = stats.max_drift.as_millis() as u64,
        "countdown concluded"
    );
    if finished {
        display.on_finished();
    }

    {
        let mut inner = shared.lock();
        inner.state = TimerState::Idle;
        inner.live = None;
        shared.idle.notify_all();
    }
    display.on_disengaged();
}
