use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::clock::ClockKind;
use crate::timer::engine::{DEFAULT_POLL_INTERVAL, EngineSettings};
use crate::timer::tick::{DEFAULT_TICK_TOLERANCE_PERCENT, TickWindow};

const MAX_POLL_INTERVAL_MS: u64 = 100;
const MAX_TICK_TOLERANCE_PERCENT: u32 = 49;

#[derive(Debug, Clone)]
pub struct Settings {
    pub engine: EngineSettings,
    pub clock: ClockKind,
    pub bell: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            engine: EngineSettings::default(),
            clock: ClockKind::default(),
            bell: true,
        }
    }
}

pub fn load_settings(path: &Path) -> Result<Settings> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("unable to read settings file {}", path.display()))?;
    parse_settings_text(&content)
}

pub fn parse_settings_text(content: &str) -> Result<Settings> {
    let raw = serde_json::from_str::<SettingsFile>(content).map_err(|err| {
        let line = err.line();
        let column = err.column();
        anyhow::anyhow!("invalid JSON at line {line}, column {column}: {err}")
    })?;

    if raw.version != 1 {
        bail!(
            "unsupported settings version {}; expected version 1",
            raw.version
        );
    }

    let poll_interval_ms = raw.engine.poll_interval_ms;
    if poll_interval_ms == 0 || poll_interval_ms > MAX_POLL_INTERVAL_MS {
        bail!(
            "poll_interval_ms must be between 1 and {MAX_POLL_INTERVAL_MS}, got {poll_interval_ms}"
        );
    }

    let tolerance = raw.engine.tick_tolerance_percent;
    if tolerance == 0 || tolerance > MAX_TICK_TOLERANCE_PERCENT {
        bail!(
            "tick_tolerance_percent must be between 1 and {MAX_TICK_TOLERANCE_PERCENT}, got {tolerance}"
        );
    }

    Ok(Settings {
        engine: EngineSettings {
            poll_interval: Duration::from_millis(poll_interval_ms),
            tick_window: TickWindow::with_tolerance_percent(tolerance),
        },
        clock: raw.clock,
        bell: raw.bell,
    })
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SettingsFile {
    version: u32,
    #[serde(default)]
    engine: EngineSettingsFile,
    #[serde(default)]
    clock: ClockKind,
    #[serde(default = "default_bell")]
    bell: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EngineSettingsFile {
    #[serde(default = "default_poll_interval_ms")]
    poll_interval_ms: u64,
    #[serde(default = "default_tick_tolerance_percent")]
    tick_tolerance_percent: u32,
}

impl Default for EngineSettingsFile {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            tick_tolerance_percent: default_tick_tolerance_percent(),
        }
    }
}

fn default_bell() -> bool {
    true
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL.as_millis() as u64
}

fn default_tick_tolerance_percent() -> u32 {
    DEFAULT_TICK_TOLERANCE_PERCENT
}
