#![deny(missing_docs)]
//! Shared logging utilities for the offload workspace.
//!
//! This crate provides the `offload_*` logging macros used across the codebase
//! and a minimal test initializer for the global logger.
//!
//! Every macro accepts an optional `job = <expr>;` prefix. When present, the
//! message is tagged with `[job <expr>]` so interleaved output from concurrent
//! jobs can be told apart.

#[doc(hidden)]
pub use log;

/// Log target shared by every macro in this crate.
pub const TARGET: &str = "offload";

/// Logs a trace-level message using the global logging facade.
#[macro_export]
macro_rules! offload_trace {
    (job = $job:expr; $($arg:tt)*) => {{
        $crate::log::trace!(target: $crate::TARGET, "[job {}] {}", $job, format_args!($($arg)*));
    }};
    ($($arg:tt)*) => {{
        $crate::log::trace!(target: $crate::TARGET, $($arg)*);
    }};
}

/// Logs a debug-level message using the global logging facade.
#[macro_export]
macro_rules! offload_debug {
    (job = $job:expr; $($arg:tt)*) => {{
        $crate::log::debug!(target: $crate::TARGET, "[job {}] {}", $job, format_args!($($arg)*));
    }};
    ($($arg:tt)*) => {{
        $crate::log::debug!(target: $crate::TARGET, $($arg)*);
    }};
}

/// Logs an info-level message using the global logging facade.
#[macro_export]
macro_rules! offload_info {
    (job = $job:expr; $($arg:tt)*) => {{
        $crate::log::info!(target: $crate::TARGET, "[job {}] {}", $job, format_args!($($arg)*));
    }};
    ($($arg:tt)*) => {{
        $crate::log::info!(target: $crate::TARGET, $($arg)*);
    }};
}

/// Logs a warn-level message using the global logging facade.
#[macro_export]
macro_rules! offload_warn {
    (job = $job:expr; $($arg:tt)*) => {{
        $crate::log::warn!(target: $crate::TARGET, "[job {}] {}", $job, format_args!($($arg)*));
    }};
    ($($arg:tt)*) => {{
        $crate::log::warn!(target: $crate::TARGET, $($arg)*);
    }};
}

/// Logs an error-level message using the global logging facade.
#[macro_export]
macro_rules! offload_error {
    (job = $job:expr; $($arg:tt)*) => {{
        $crate::log::error!(target: $crate::TARGET, "[job {}] {}", $job, format_args!($($arg)*));
    }};
    ($($arg:tt)*) => {{
        $crate::log::error!(target: $crate::TARGET, $($arg)*);
    }};
}

/// Initializes a simple terminal logger for use in unit tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};

    // Trace in debug builds so protocol steps show up in failing test output.
    let level = if cfg!(debug_assertions) {
        log::LevelFilter::Trace
    } else {
        log::LevelFilter::Info
    };

    // Ignore the error if a logger was already set by another test.
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}
