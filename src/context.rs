//! The interpreter-scoped context: printer, requester, clock, and picker,
//! threaded explicitly through the pipeline. Tests replace individual
//! fields instead of swapping process globals.

use std::io::{self, BufRead, Write};

use chrono::{DateTime, Local};

use crate::http::Requester;
use crate::output::Printer;

/// Clock access for the date/epoch builtins, injectable so tests can
/// freeze time.
pub trait Clock {
    fn now(&self) -> DateTime<Local>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// A clock pinned to a fixed instant.
pub struct FixedClock(pub DateTime<Local>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Local> {
        self.0
    }
}

/// Interactive selection for the `pick()` builtin.
pub trait Picker {
    fn pick(&self, prompt: &str, options: &[String]) -> Result<String, String>;
}

/// Prompts on stderr and reads the selected index from stdin. Refuses to
/// run when stdin is not a terminal.
pub struct TerminalPicker;

impl Picker for TerminalPicker {
    fn pick(&self, prompt: &str, options: &[String]) -> Result<String, String> {
        if !atty::is(atty::Stream::Stdin) {
            return Err("pick() requires an interactive terminal".to_string());
        }

        let mut err = io::stderr();
        let _ = writeln!(err, "{}", prompt);
        for (i, option) in options.iter().enumerate() {
            let _ = writeln!(err, "  {}) {}", i + 1, option);
        }
        let _ = write!(err, "> ");
        let _ = err.flush();

        let mut line = String::new();
        io::stdin()
            .lock()
            .read_line(&mut line)
            .map_err(|e| format!("Could not read selection: {}", e))?;
        let choice: usize = line
            .trim()
            .parse()
            .map_err(|_| format!("Invalid selection: {}", line.trim()))?;
        options
            .get(choice.wrapping_sub(1))
            .cloned()
            .ok_or_else(|| format!("Selection out of range: {}", choice))
    }
}

/// A picker that always selects a fixed option, for tests.
pub struct FixedPicker(pub String);

impl Picker for FixedPicker {
    fn pick(&self, _prompt: &str, _options: &[String]) -> Result<String, String> {
        Ok(self.0.clone())
    }
}

pub struct RadContext {
    pub printer: Printer,
    pub requester: Requester,
    pub clock: Box<dyn Clock>,
    pub picker: Box<dyn Picker>,
}

impl RadContext {
    pub fn new(printer: Printer, requester: Requester) -> Self {
        RadContext {
            printer,
            requester,
            clock: Box::new(SystemClock),
            picker: Box::new(TerminalPicker),
        }
    }
}
