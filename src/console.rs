use std::io::{BufRead, Write};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::timer::engine::TimerEngine;
use crate::timer::model::{DisplayUpdater, TimerError};

const SHUTDOWN_WAIT: Duration = Duration::from_secs(5);
const IDLE_WAIT_SLICE: Duration = Duration::from_secs(60);

const HELP: &str = "\
commands:
  start <seconds>   start a countdown (a bare number works too)
  stop | cancel     cancel the running countdown
  status            show the timer state
  help              show this help
  quit | exit       cancel any countdown and leave";

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Command<'a> {
    Start(&'a str),
    Stop,
    Status,
    Help,
    Quit,
    Empty,
    Unknown(&'a str),
}

pub fn parse_command(line: &str) -> Command<'_> {
    let trimmed = line.trim();
    let (word, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (trimmed, ""),
    };
    match word.to_ascii_lowercase().as_str() {
        "" => Command::Empty,
        "start" | "s" => Command::Start(rest),
        "stop" | "cancel" => Command::Stop,
        "status" => Command::Status,
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        _ if looks_numeric(word) && rest.is_empty() => Command::Start(word),
        _ => Command::Unknown(word),
    }
}

fn looks_numeric(word: &str) -> bool {
    word.trim_start_matches(['+', '-'])
        .starts_with(|c: char| c.is_ascii_digit())
}

/// Line-oriented display: one line per event.
pub struct ConsoleDisplay<W: Write + Send> {
    out: Mutex<W>,
    bell: bool,
}

impl<W: Write + Send> ConsoleDisplay<W> {
    pub fn new(out: W, bell: bool) -> Self {
        Self {
            out: Mutex::new(out),
            bell,
        }
    }

    pub fn write_line(&self, line: &str) {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(err) = writeln!(out, "{line}").and_then(|()| out.flush()) {
            warn!(%err, "failed to write console output");
        }
    }
}

impl<W: Write + Send> DisplayUpdater for ConsoleDisplay<W> {
    fn on_tick(&self, remaining_seconds: u64) {
        self.write_line(&remaining_seconds.to_string());
    }

    fn on_finished(&self) {
        if self.bell {
            self.write_line("\u{7}done");
        } else {
            self.write_line("done");
        }
    }

    fn on_disengaged(&self) {
        self.write_line("ready");
    }

    fn on_validation_error(&self, message: &str) {
        self.write_line(&format!("error: {message}"));
    }
}

/// Drives `engine` from console commands until `quit` or end of input.
///
/// At end of input a running countdown is allowed to finish; `quit` cancels it.
pub fn run_console<R, W>(engine: &TimerEngine, console: &ConsoleDisplay<W>, input: R) -> Result<()>
where
    R: BufRead,
    W: Write + Send,
{
    for line in input.lines() {
        let line = line.context("failed to read console input")?;
        match parse_command(&line) {
            Command::Start(value) => match engine.start(value) {
                Ok(_) | Err(TimerError::InvalidInput(_)) => {}
                Err(TimerError::AlreadyRunning) => debug!("start ignored while engaged"),
                Err(err) => {
                    warn!(%err, "countdown could not start");
                    console.write_line(&format!("error: {err}"));
                }
            },
            Command::Stop => {
                if let Err(err) = engine.cancel() {
                    debug!(%err, "stop ignored");
                }
            }
            Command::Status => console.write_line(&format!("status: {}", engine.status())),
            Command::Help => console.write_line(HELP),
            Command::Quit => {
                let _ = engine.cancel();
                if !engine.wait_idle(SHUTDOWN_WAIT) {
                    warn!("countdown did not stop before shutdown");
                }
                return Ok(());
            }
            Command::Empty => {}
            Command::Unknown(word) => {
                console.write_line(&format!("error: unknown command '{word}' (try 'help')"));
            }
        }
    }

    while !engine.wait_idle(IDLE_WAIT_SLICE) {}
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    use super::*;
    use crate::clock::ManualClock;
    use crate::timer::engine::EngineSettings;
    use crate::timer::tick::TickWindow;

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl SharedBuffer {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().expect("buffer").clone()).expect("utf8 output")
        }
    }

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().expect("buffer").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn console_engine(
        bell: bool,
    ) -> (
        TimerEngine,
        Arc<ConsoleDisplay<SharedBuffer>>,
        Arc<ManualClock>,
        SharedBuffer,
    ) {
        let buffer = SharedBuffer::default();
        let display = Arc::new(ConsoleDisplay::new(buffer.clone(), bell));
        let clock = Arc::new(ManualClock::new());
        let engine = TimerEngine::new(
            clock.clone(),
            display.clone(),
            EngineSettings {
                poll_interval: Duration::from_millis(1),
                tick_window: TickWindow::default(),
            },
        );
        (engine, display, clock, buffer)
    }

    #[test]
    fn parses_commands() {
        assert_eq!(parse_command("start 5"), Command::Start("5"));
        assert_eq!(parse_command("  START   12  "), Command::Start("12"));
        assert_eq!(parse_command("start"), Command::Start(""));
        assert_eq!(parse_command("s abc"), Command::Start("abc"));
        assert_eq!(parse_command("30"), Command::Start("30"));
        assert_eq!(parse_command("-4"), Command::Start("-4"));
        assert_eq!(parse_command("stop"), Command::Stop);
        assert_eq!(parse_command("cancel"), Command::Stop);
        assert_eq!(parse_command("status"), Command::Status);
        assert_eq!(parse_command("?"), Command::Help);
        assert_eq!(parse_command("exit"), Command::Quit);
        assert_eq!(parse_command("   "), Command::Empty);
        assert_eq!(parse_command("pause"), Command::Unknown("pause"));
        assert_eq!(parse_command("12 34"), Command::Unknown("12"));
    }

    #[test]
    fn display_writes_one_line_per_event() {
        let buffer = SharedBuffer::default();
        let display = ConsoleDisplay::new(buffer.clone(), true);
        display.on_tick(2);
        display.on_finished();
        display.on_disengaged();
        display.on_validation_error("Timer value must be a number");

        assert_eq!(
            buffer.text(),
            "2\n\u{7}done\nready\nerror: Timer value must be a number\n"
        );
    }

    #[test]
    fn silent_display_omits_bell() {
        let buffer = SharedBuffer::default();
        let display = ConsoleDisplay::new(buffer.clone(), false);
        display.on_finished();
        assert_eq!(buffer.text(), "done\n");
    }

    #[test]
    fn reports_validation_errors_status_and_unknown_commands() {
        let (engine, display, _clock, buffer) = console_engine(false);
        let input = Cursor::new("start abc\nstart\n\nstatus\nfrobnicate\nstop\n");

        run_console(&engine, &display, input).expect("console run");

        assert_eq!(
            buffer.text(),
            "error: Timer value must be a number\n\
             error: timer value cannot be empty\n\
             status: idle\n\
             error: unknown command 'frobnicate' (try 'help')\n"
        );
    }

    #[test]
    fn help_lists_commands() {
        let (engine, display, _clock, buffer) = console_engine(false);
        run_console(&engine, &display, Cursor::new("help\n")).expect("console run");
        assert!(buffer.text().contains("start <seconds>"));
        assert!(buffer.text().contains("quit | exit"));
    }

    #[test]
    fn quit_cancels_running_countdown() {
        let (engine, display, _clock, buffer) = console_engine(false);
        let input = Cursor::new("start 30\nstart 5\nstatus\nquit\nstatus\n");

        run_console(&engine, &display, input).expect("console run");

        assert_eq!(buffer.text(), "status: running\nready\n");
        assert_eq!(engine.status(), crate::timer::model::TimerState::Idle);
    }

    #[test]
    fn end_of_input_lets_countdown_finish() {
        let (engine, display, clock, buffer) = console_engine(false);
        let done = Arc::new(AtomicBool::new(false));
        let ticker = {
            let clock = Arc::clone(&clock);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                while !done.load(Ordering::Relaxed) {
                    clock.advance(Duration::from_secs(1));
                    thread::sleep(Duration::from_millis(20));
                }
            })
        };

        run_console(&engine, &display, Cursor::new("2\n")).expect("console run");
        done.store(true, Ordering::Relaxed);
        ticker.join().expect("ticker thread");

        assert_eq!(buffer.text(), "2\n1\n0\ndone\nready\n");
    }
}
