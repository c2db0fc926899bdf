#![deny(missing_docs)]
//! Shared logging utilities for the multimark workspace.
//!
//! This crate provides the `engine_*` logging macros used across the codebase,
//! the [`LogContext`] tags that say which execution context emitted a line,
//! and a minimal test initializer for the global logger.

#[doc(hidden)]
pub use log;

/// The isolated execution context a log line originates from.
///
/// Each context maps to its own log target so the contexts can be filtered
/// independently (`multimark::engine=debug`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogContext {
    /// The popup-like UI that drives searches.
    Surface,
    /// The document engine injected into a page.
    Engine,
    /// The long-lived background coordinator and log store.
    Background,
}

impl LogContext {
    /// Log target used for records emitted from this context.
    pub const fn target(self) -> &'static str {
        match self {
            LogContext::Surface => "multimark::surface",
            LogContext::Engine => "multimark::engine",
            LogContext::Background => "multimark::background",
        }
    }
}

/// Logs a trace-level message, optionally tagged with a [`LogContext`].
#[macro_export]
macro_rules! engine_trace {
    (ctx: $ctx:expr, $($arg:tt)*) => {{
        $crate::log::trace!(target: $crate::LogContext::target($ctx), $($arg)*);
    }};
    ($($arg:tt)*) => {{
        $crate::log::trace!($($arg)*);
    }};
}

/// Logs an info-level message, optionally tagged with a [`LogContext`].
#[macro_export]
macro_rules! engine_info {
    (ctx: $ctx:expr, $($arg:tt)*) => {{
        $crate::log::info!(target: $crate::LogContext::target($ctx), $($arg)*);
    }};
    ($($arg:tt)*) => {{
        $crate::log::info!($($arg)*);
    }};
}

/// Logs a debug-level message, optionally tagged with a [`LogContext`].
#[macro_export]
macro_rules! engine_debug {
    (ctx: $ctx:expr, $($arg:tt)*) => {{
        $crate::log::debug!(target: $crate::LogContext::target($ctx), $($arg)*);
    }};
    ($($arg:tt)*) => {{
        $crate::log::debug!($($arg)*);
    }};
}

/// Logs a warn-level message, optionally tagged with a [`LogContext`].
#[macro_export]
macro_rules! engine_warn {
    (ctx: $ctx:expr, $($arg:tt)*) => {{
        $crate::log::warn!(target: $crate::LogContext::target($ctx), $($arg)*);
    }};
    ($($arg:tt)*) => {{
        $crate::log::warn!($($arg)*);
    }};
}

/// Logs an error-level message, optionally tagged with a [`LogContext`].
#[macro_export]
macro_rules! engine_error {
    (ctx: $ctx:expr, $($arg:tt)*) => {{
        $crate::log::error!(target: $crate::LogContext::target($ctx), $($arg)*);
    }};
    ($($arg:tt)*) => {{
        $crate::log::error!($($arg)*);
    }};
}

/// Initializes a simple terminal logger for use in tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};

    // Use debug level in debug builds, info in release builds.
    let level = if cfg!(debug_assertions) {
        log::LevelFilter::Debug
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
