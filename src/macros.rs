//! Logging macros for ergonomic log message formatting.
//!
//! Each macro formats its arguments like `format!` and calls the matching
//! [`Logger`](crate::Logger) method. The call site recorded in the `caller`
//! field is the line where the macro is used.
//!
//! # Examples
//!
//! ```
//! use fanout_logger::prelude::*;
//! use fanout_logger::info;
//! use std::sync::Arc;
//!
//! let queue = Arc::new(MemoryQueue::new());
//! let logger = Logger::builder().sink(QueueSink::new(Arc::clone(&queue))).build();
//!
//! let port = 8080;
//! info!(logger, "Server listening on port {}", port);
//! assert_eq!(queue.len("ELK_LOG"), 1);
//! ```

/// Log a message at an explicit level.
///
/// ```
/// # use fanout_logger::prelude::*;
/// # let logger = Logger::builder().build();
/// use fanout_logger::log;
/// log!(logger, LogLevel::Info, "Simple message");
/// log!(logger, LogLevel::Error, "Error code: {}", 500);
/// ```
#[macro_export]
macro_rules! log {
    ($logger:expr, $level:expr, $($arg:tt)+) => {
        $logger.log($level, format!($($arg)+))
    };
}

/// Log a debug-level message.
#[macro_export]
macro_rules! debug {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Debug, $($arg)+)
    };
}

/// Log an info-level message.
#[macro_export]
macro_rules! info {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Info, $($arg)+)
    };
}

/// Log a warning-level message.
///
/// ```
/// # use fanout_logger::prelude::*;
/// # let logger = Logger::builder().build();
/// use fanout_logger::warn;
/// warn!(logger, "Retry attempt {} of {}", 3, 5);
/// ```
#[macro_export]
macro_rules! warn {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Warn, $($arg)+)
    };
}

/// Log an error-level message.
#[macro_export]
macro_rules! error {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Error, $($arg)+)
    };
}

/// Log a fatal-level message, flush and exit the process with status 1.
///
/// ```no_run
/// # use fanout_logger::prelude::*;
/// # let logger = Logger::builder().build();
/// use fanout_logger::fatal;
/// fatal!(logger, "config file {} is unreadable", "/etc/app.toml");
/// ```
#[macro_export]
macro_rules! fatal {
    ($logger:expr, $($arg:tt)+) => {
        $logger.fatal(format!($($arg)+))
    };
}

/// Log a panic-level message, flush and panic.
#[macro_export]
macro_rules! panic_log {
    ($logger:expr, $($arg:tt)+) => {
        $logger.panic(format!($($arg)+))
    };
}
