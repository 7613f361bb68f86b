//! Terminal output.
//!
//! Every user-facing status line goes through [`Shell`]: a right-aligned,
//! optionally colored status word followed by the message. JSON mode prints
//! one event object per line on stdout instead. Logging proper goes through
//! `tracing`; the shell is for the operator.

use std::fmt::Display;
use std::io::{self, IsTerminal, Write};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use crate::core::lifecycle::ProgressReporter;

/// Human or machine output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellMode {
    Human {
        verbosity: Verbosity,
        color: ColorChoice,
    },
    Json,
}

impl Default for ShellMode {
    fn default() -> Self {
        ShellMode::Human {
            verbosity: Verbosity::Normal,
            color: ColorChoice::Auto,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Errors only
    Quiet,
    #[default]
    Normal,
    /// Also every bootstrap step
    Verbose,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorChoice {
    #[default]
    Auto,
    Always,
    Never,
}

/// Status words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Starting,
    Exporting,
    Extracted,
    Loaded,
    Removed,
    Ready,
    Cleaning,
    Step,
    Info,
    Error,
}

impl Status {
    fn as_str(&self) -> &'static str {
        match self {
            Status::Starting => "Starting",
            Status::Exporting => "Exporting",
            Status::Extracted => "Extracted",
            Status::Loaded => "Loaded",
            Status::Removed => "Removed",
            Status::Ready => "Ready",
            Status::Cleaning => "Cleaning",
            Status::Step => "...",
            Status::Info => "Info",
            Status::Error => "error",
        }
    }

    fn color_code(&self) -> &'static str {
        match self {
            Status::Extracted | Status::Loaded | Status::Removed | Status::Ready => "\x1b[1;32m",
            Status::Starting | Status::Exporting | Status::Cleaning => "\x1b[1;36m",
            Status::Step | Status::Info => "\x1b[1;34m",
            Status::Error => "\x1b[1;31m",
        }
    }
}

const STATUS_WIDTH: usize = 12;

#[derive(Debug)]
pub struct Shell {
    mode: ShellMode,
    use_color: bool,
}

impl Shell {
    pub fn new(mode: ShellMode) -> Self {
        let use_color = match &mode {
            ShellMode::Json => false,
            ShellMode::Human { color, .. } => match color {
                ColorChoice::Auto => io::stderr().is_terminal(),
                ColorChoice::Always => true,
                ColorChoice::Never => false,
            },
        };
        Shell { mode, use_color }
    }

    /// Shell from the global CLI flags. JSON wins over quiet and verbose.
    pub fn from_flags(quiet: bool, verbose: bool, no_color: bool, json: bool) -> Self {
        if json {
            return Shell::new(ShellMode::Json);
        }
        let verbosity = if quiet {
            Verbosity::Quiet
        } else if verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Normal
        };
        let color = if no_color {
            ColorChoice::Never
        } else {
            ColorChoice::Auto
        };
        Shell::new(ShellMode::Human { verbosity, color })
    }

    pub fn is_quiet(&self) -> bool {
        matches!(
            self.mode,
            ShellMode::Human {
                verbosity: Verbosity::Quiet,
                ..
            }
        )
    }

    pub fn is_verbose(&self) -> bool {
        matches!(
            self.mode,
            ShellMode::Human {
                verbosity: Verbosity::Verbose,
                ..
            }
        )
    }

    pub fn is_json(&self) -> bool {
        matches!(self.mode, ShellMode::Json)
    }

    pub fn use_color(&self) -> bool {
        self.use_color
    }

    /// `{status:>12} {message}` on stderr. Quiet mode keeps errors only.
    pub fn status(&self, status: Status, msg: impl Display) {
        if self.is_json() {
            self.json_event(&serde_json::json!({
                "reason": status.as_str().to_lowercase(),
                "message": msg.to_string(),
            }));
            return;
        }
        if self.is_quiet() && status != Status::Error {
            return;
        }
        eprintln!("{} {}", self.format_status(status), msg);
    }

    pub fn note(&self, msg: impl Display) {
        self.status(Status::Info, msg);
    }

    pub fn error(&self, msg: impl Display) {
        self.status(Status::Error, msg);
    }

    /// Print command output on stdout. Suppressed in JSON mode.
    pub fn print(&self, msg: impl Display) {
        if !self.is_json() {
            println!("{}", msg);
        }
    }

    /// One JSON object per line on stdout; ignored in human mode.
    pub fn json_event(&self, event: &serde_json::Value) {
        if !self.is_json() {
            return;
        }
        let mut out = io::stdout().lock();
        let _ = writeln!(out, "{}", serde_json::to_string(event).unwrap_or_default());
        let _ = out.flush();
    }

    fn format_status(&self, status: Status) -> String {
        if self.use_color {
            format!(
                "{}{:>width$}\x1b[0m",
                status.color_code(),
                status.as_str(),
                width = STATUS_WIDTH
            )
        } else {
            format!("{:>width$}", status.as_str(), width = STATUS_WIDTH)
        }
    }

    /// Spinner for a blocking operation. Hidden unless in normal human mode
    /// on a terminal.
    pub fn spinner(&self, msg: impl Display) -> Spinner {
        let visible = !self.is_quiet()
            && !self.is_verbose()
            && !self.is_json()
            && io::stderr().is_terminal();
        let bar = visible.then(|| {
            let bar = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
                bar.set_style(style);
            }
            bar.set_message(msg.to_string());
            bar.enable_steady_tick(Duration::from_millis(100));
            bar
        });
        Spinner { bar }
    }
}

impl Default for Shell {
    fn default() -> Self {
        Shell::new(ShellMode::default())
    }
}

impl ProgressReporter for Shell {
    fn action(&self, msg: &str) {
        self.status(Status::Starting, msg);
    }

    fn step(&self, msg: &str) {
        if self.is_verbose() || self.is_json() {
            self.status(Status::Step, msg);
        }
    }
}

/// Handle to a running spinner; cleared on drop.
pub struct Spinner {
    bar: Option<ProgressBar>,
}

impl Spinner {
    pub fn set_message(&self, msg: impl Display) {
        if let Some(bar) = &self.bar {
            bar.set_message(msg.to_string());
        }
    }

    pub fn finish(self) {}
}

impl Drop for Spinner {
    fn drop(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}
