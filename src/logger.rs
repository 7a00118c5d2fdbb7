//! Logging utilities with colored module prefixes.
//!
//! This module provides:
//! - `log!` macro for formatted terminal output with colored prefixes
//! - `debug!` macro for output only shown with `--verbose`
//!
//! # Example
//!
//! ```ignore
//! log!("serve"; "http://{}", addr);
//! debug!("session"; "dispatch {}", kind);
//! ```

use crossterm::{
    execute,
    terminal::{Clear, ClearType},
};
use owo_colors::{OwoColorize, Stream, Style};
use std::{
    io::{Write, stdout},
    sync::atomic::{AtomicBool, Ordering},
};

/// Global verbose flag (set by --verbose CLI argument)
static VERBOSE: AtomicBool = AtomicBool::new(false);

/// Set verbose mode globally
pub fn set_verbose(v: bool) {
    VERBOSE.store(v, Ordering::SeqCst);
}

/// Check if verbose mode is enabled
pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::SeqCst)
}

// ============================================================================
// Log Macro
// ============================================================================

/// Log a message with a colored module prefix
///
/// # Usage
/// ```ignore
/// log!("module"; "message with {} formatting", args);
/// ```
#[macro_export]
macro_rules! log {
    ($module:expr; $($arg:tt)*) => {{
        $crate::logger::log($module, &format!($($arg)*))
    }};
}

/// Log a debug message (only shown when --verbose is enabled)
///
/// # Usage
/// ```ignore
/// debug!("module"; "debug info: {}", value);
/// ```
#[macro_export]
macro_rules! debug {
    ($module:expr; $($arg:tt)*) => {{
        if $crate::logger::is_verbose() {
            $crate::logger::log($module, &format!($($arg)*))
        }
    }};
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Log a message with a colored module prefix
#[inline]
pub fn log(module: &str, message: &str) {
    let module_lower = module.to_ascii_lowercase();
    let prefix = colorize_prefix(module, &module_lower);

    let mut stdout = stdout().lock();
    execute!(stdout, Clear(ClearType::UntilNewLine)).ok();
    writeln!(stdout, "{prefix} {message}").ok();
    stdout.flush().ok();
}

/// Apply color to a module prefix based on module type
#[inline]
fn colorize_prefix(module: &str, module_lower: &str) -> String {
    let prefix = format!("[{module}]");
    let style = match module_lower {
        "serve" | "ws" => Style::new().bright_blue(),
        "render" => Style::new().bright_green(),
        "repo" => Style::new().bright_magenta(),
        "error" => Style::new().bright_red(),
        _ => Style::new().bright_yellow(),
    };
    // Honors `--color` through the global override
    prefix
        .if_supports_color(Stream::Stdout, |p| p.style(style.bold()))
        .to_string()
}

// ============================================================================
// Tests
// ============================================================================
