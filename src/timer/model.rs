use std::fmt;
use std::num::IntErrorKind;

use thiserror::Error;

/// Identifies one run of the engine. Every `start` mints the next generation.
pub type Generation = u64;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum TimerState {
    Idle,
    Running,
    Cancelled,
    Finished,
}

impl TimerState {
    pub fn is_engaged(self) -> bool {
        !matches!(self, TimerState::Idle)
    }
}

impl fmt::Display for TimerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TimerState::Idle => "idle",
            TimerState::Running => "running",
            TimerState::Cancelled => "cancelled",
            TimerState::Finished => "finished",
        };
        f.write_str(label)
    }
}

/// Receiver of countdown events.
///
/// `on_tick`, `on_finished` and `on_disengaged` run on the countdown thread. Within one run
/// ticks arrive in strictly decreasing order, and exactly one `on_disengaged` closes every
/// accepted run. `on_validation_error` runs synchronously inside the rejected `start` call.
pub trait DisplayUpdater: Send + Sync {
    fn on_tick(&self, remaining_seconds: u64);

    fn on_finished(&self) {}

    fn on_disengaged(&self) {}

    fn on_validation_error(&self, _message: &str) {}
}

#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum InputError {
    #[error("timer value cannot be empty")]
    Empty,
    #[error("Timer value must be a number")]
    NotANumber(String),
    #[error("timer value cannot be negative")]
    Negative(String),
    #[error("timer value is too large")]
    TooLarge(String),
}

#[derive(Debug, Error)]
pub enum TimerError {
    #[error(transparent)]
    InvalidInput(#[from] InputError),
    #[error("timer is already running")]
    AlreadyRunning,
    #[error("timer is not running")]
    NotRunning,
    #[error("failed to spawn countdown thread: {0}")]
    Spawn(#[from] std::io::Error),
}

impl InputError {
    /// The offending input, if there was any.
    pub fn input(&self) -> Option<&str> {
        match self {
            InputError::Empty => None,
            InputError::NotANumber(input)
            | InputError::Negative(input)
            | InputError::TooLarge(input) => Some(input),
        }
    }
}

/// Parses a user supplied duration in whole seconds.
pub fn parse_seconds(input: &str) -> Result<u64, InputError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(InputError::Empty);
    }
    trimmed.parse::<u64>().map_err(|err| match err.kind() {
        IntErrorKind::PosOverflow => InputError::TooLarge(trimmed.to_string()),
        _ if is_negative_integer(trimmed) => InputError::Negative(trimmed.to_string()),
        _ => InputError::NotANumber(trimmed.to_string()),
    })
}

fn is_negative_integer(text: &str) -> bool {
    text.strip_prefix('-')
        .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
}
