//! Terminal logging with colored module prefixes.
//!
//! Output goes through a [`Logger`] handle that is created once in `main`
//! and handed to the build and serve paths, so nothing here is configured
//! through process-wide state.
//!
//! # Example
//!
//! ```ignore
//! let logger = Logger::new(false);
//! log!(logger => "build"; "generating {} pages", count);
//! ```

use colored::{ColoredString, Colorize};
use crossterm::terminal::size;
use std::{
    io::{Write, stderr, stdout},
    sync::OnceLock,
};

/// Cached terminal width (fetched once on first use)
static TERMINAL_WIDTH: OnceLock<u16> = OnceLock::new();

/// Fallback width when the terminal size can't be detected (pipes, CI)
const DEFAULT_TERMINAL_WIDTH: u16 = 120;

/// Length of brackets around module name: "[]"
const BRACKET_LEN: usize = 2;
/// Space after prefix: "[module] " <- this space
const SPACE_AFTER_PREFIX: usize = 1;

/// Calculate total prefix length for a module name.
///
/// Returns: `module.len() + 3` (for "[", "]", and trailing space)
#[inline]
const fn calc_prefix_len(module_len: usize) -> usize {
    module_len + BRACKET_LEN + SPACE_AFTER_PREFIX
}

fn get_terminal_width() -> u16 {
    *TERMINAL_WIDTH.get_or_init(|| size().map(|(w, _)| w).unwrap_or(DEFAULT_TERMINAL_WIDTH))
}

/// Log a message with a colored module prefix through a [`Logger`].
///
/// # Usage
/// ```ignore
/// log!(logger => "module"; "message with {} formatting", args);
/// ```
#[macro_export]
macro_rules! log {
    ($logger:expr => $module:expr; $($arg:tt)*) => {{
        $logger.log($module, &format!($($arg)*))
    }};
}

/// Handle used by every component that reports progress.
///
/// Cheap to copy; pass it by value into threads.
#[derive(Debug, Clone, Copy, Default)]
pub struct Logger {
    quiet: bool,
}

impl Logger {
    /// Create a logger. A quiet logger only lets `error` lines through.
    pub const fn new(quiet: bool) -> Self {
        Self { quiet }
    }

    /// Write `[module] message`.
    ///
    /// `error` lines go to stderr in full; everything else goes to stdout,
    /// truncated to the terminal width.
    pub fn log(&self, module: &str, message: &str) {
        let module_lower = module.to_ascii_lowercase();
        if !self.should_print(&module_lower) {
            return;
        }

        let prefix = colorize_prefix(module, &module_lower);
        if module_lower == "error" {
            let mut stderr = stderr().lock();
            writeln!(stderr, "{prefix} {message}").ok();
        } else {
            let width = get_terminal_width() as usize;
            let max_msg_len = width.saturating_sub(calc_prefix_len(module.len()));
            let message = truncate_str(message, max_msg_len);

            let mut stdout = stdout().lock();
            writeln!(stdout, "{prefix} {message}").ok();
            stdout.flush().ok();
        }
    }

    fn should_print(&self, module_lower: &str) -> bool {
        !self.quiet || module_lower == "error"
    }
}

/// Apply color to a module prefix based on module type.
#[inline]
fn colorize_prefix(module: &str, module_lower: &str) -> ColoredString {
    let prefix = format!("[{module}]");
    match module_lower {
        "serve" => prefix.bright_blue().bold(),
        "build" => prefix.bright_green().bold(),
        "error" | "warn" => prefix.bright_red().bold(),
        _ => prefix.bright_yellow().bold(),
    }
}

/// Truncate a string to fit within max_len bytes.
///
/// Ensures the result is valid UTF-8 by finding the nearest character boundary.
#[inline]
fn truncate_str(s: &str, max_len: usize) -> &str {
    if s.len() <= max_len {
        return s;
    }
    let mut end = max_len;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
