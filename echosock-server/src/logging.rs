//! Server logging
//!
//! With the `logging` feature the `log_*` macros forward to `tracing`.
//! Without it, errors, warnings and info lines still reach stderr so a bind
//! failure or a broken connection is never silent, while debug and trace
//! output (which includes message contents) is compiled down to nothing.

/// Severity used by the stderr fallback
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    /// Failures
    Error,
    /// Recoverable problems
    Warn,
    /// Lifecycle events
    Info,
    /// Per-connection details
    Debug,
    /// Per-message details
    Trace,
}

impl Level {
    /// Tag printed in front of fallback lines
    pub fn label(self) -> &'static str {
        match self {
            Level::Error => "ERROR",
            Level::Warn => "WARN",
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
            Level::Trace => "TRACE",
        }
    }
}

/// Whether the stderr fallback prints events at `level`
pub const fn fallback_enabled(level: Level) -> bool {
    matches!(level, Level::Error | Level::Warn | Level::Info)
}

#[doc(hidden)]
#[macro_export]
macro_rules! __log_event {
    ($tracing:ident, $level:ident, $($arg:tt)*) => {{
        #[cfg(feature = "logging")]
        {
            tracing::$tracing!($($arg)*);
        }
        #[cfg(not(feature = "logging"))]
        {
            if $crate::logging::fallback_enabled($crate::logging::Level::$level) {
                eprintln!(
                    "[{}] {}",
                    $crate::logging::Level::$level.label(),
                    format_args!($($arg)*)
                );
            }
        }
    }};
}

/// Log an error message
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => { $crate::__log_event!(error, Error, $($arg)*) };
}

/// Log a warning message
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => { $crate::__log_event!(warn, Warn, $($arg)*) };
}

/// Log an info message
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => { $crate::__log_event!(info, Info, $($arg)*) };
}

/// Log a debug message. Dropped unless the `logging` feature is on.
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => { $crate::__log_event!(debug, Debug, $($arg)*) };
}

/// Log a trace message. Dropped unless the `logging` feature is on.
#[macro_export]
macro_rules! log_trace {
    ($($arg:tt)*) => { $crate::__log_event!(trace, Trace, $($arg)*) };
}

/// Install the global `tracing` subscriber.
///
/// Verbosity comes from `RUST_LOG` and defaults to `info`. Fails if a
/// subscriber is already installed.
#[cfg(feature = "logging")]
pub fn init_logging() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()?;

    Ok(())
}

/// Without the `logging` feature there is nothing to install
#[cfg(not(feature = "logging"))]
pub fn init_logging() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_drops_debug_and_trace() {
        assert!(fallback_enabled(Level::Error));
        assert!(fallback_enabled(Level::Warn));
        assert!(fallback_enabled(Level::Info));
        assert!(!fallback_enabled(Level::Debug));
        assert!(!fallback_enabled(Level::Trace));
    }

    #[test]
    fn test_level_labels() {
        assert_eq!(Level::Warn.label(), "WARN");
        assert_eq!(Level::Trace.label(), "TRACE");
        assert!(Level::Error < Level::Trace);
    }

    #[test]
    fn test_logging_macros() {
        let peer = "127.0.0.1:9";
        log_info!("Test info message from {}", peer);
        log_warn!("Test warning message");
        log_error!("Test error message");
        log_debug!("Test debug message {}", peer);
        log_trace!("Test trace message");
    }

    #[test]
    fn test_init_logging_twice() {
        let first = init_logging();
        let second = init_logging();
        // At most one subscriber can be installed per process
        assert!(first.is_ok() || second.is_err());
    }
}
