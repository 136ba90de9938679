mod clock;
mod config;
mod console;
mod diagnostics;
mod logging;
mod timer;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::info;

use crate::clock::{ClockKind, select_clock};
use crate::config::{Settings, load_settings};
use crate::console::{ConsoleDisplay, run_console};
use crate::timer::engine::TimerEngine;

const DIAGNOSTIC_BENCHMARK: Duration = Duration::from_secs(1);

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliClock {
    Monotonic,
    Wall,
}

impl From<CliClock> for ClockKind {
    fn from(value: CliClock) -> Self {
        match value {
            CliClock::Monotonic => ClockKind::Monotonic,
            CliClock::Wall => ClockKind::Wall,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "countdown",
    version,
    about = "Interactive countdown timer driven by console commands"
)]
struct Cli {
    /// JSON settings file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Overrides the clock source from the settings file
    #[arg(long, value_enum)]
    clock: Option<CliClock>,

    /// Do not ring the terminal bell when a countdown finishes
    #[arg(long)]
    no_bell: bool,

    #[arg(long)]
    diagnostics: bool,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging();

    let mut settings = match &cli.config {
        Some(path) => {
            load_settings(path).with_context(|| format!("failed to load {}", path.display()))?
        }
        None => Settings::default(),
    };
    if let Some(clock) = cli.clock {
        settings.clock = clock.into();
    }
    if cli.no_bell {
        settings.bell = false;
    }

    let clock = select_clock(settings.clock);
    if cli.diagnostics {
        let stdout = io::stdout();
        return diagnostics::run_diagnostics(
            &mut stdout.lock(),
            clock.as_ref(),
            &settings.engine,
            DIAGNOSTIC_BENCHMARK,
        );
    }

    let display = Arc::new(ConsoleDisplay::new(io::stdout(), settings.bell));
    let engine = TimerEngine::new(clock, display.clone(), settings.engine);
    info!(
        clock = ?settings.clock,
        poll_interval_ms = engine.settings().poll_interval.as_millis() as u64,
        tolerance_percent = engine.settings().tick_window.tolerance_percent(),
        "countdown ready"
    );
    run_console(&engine, display.as_ref(), io::stdin().lock())
}
