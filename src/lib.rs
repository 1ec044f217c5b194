//! # Fan-out Logger
//!
//! A structured logging facade that writes every record, encoded as one JSON
//! line, to a rotating local file, optionally to stdout, and optionally to a
//! Redis list (`ELK_LOG`) that a log shipper drains.
//!
//! ## Features
//!
//! - **Best-effort fan-out**: a failing sink never blocks the others
//! - **Self-expiring queue**: the remote list carries a rolling 24h expiry
//! - **Call-site capture**: the `caller` field points at your code
//! - **Synchronous**: no background threads, nothing lost on exit
//!
//! ## Example
//!
//! ```no_run
//! use fanout_logger::factory::{self, LoggerOptions};
//!
//! let logger = factory::new(
//!     LoggerOptions::default()
//!         .with_project_name("billing")
//!         .with_stdout("yes"),
//! )?;
//! logger.info("ready");
//! # Ok::<(), fanout_logger::LoggerError>(())
//! ```

pub mod core;
pub mod factory;
pub mod macros;
pub mod sinks;

pub mod prelude {
    pub use crate::core::{
        Caller, EncoderConfig, FieldValue, JsonEncoder, LogContext, LogEntry, LogLevel, Logger,
        LoggerBuilder, LoggerError, LoggerMetrics, Result, Sink, TimestampFormat,
    };
    pub use crate::factory::{LogOption, LoggerOptions};
    pub use crate::sinks::{
        ConsoleSink, ExpiryPolicy, MemoryQueue, MultiSink, QueueClient, QueueSink,
        RotatingFileSink, RotationPolicy,
    };
}

pub use crate::core::{
    Caller, EncoderConfig, FieldValue, JsonEncoder, LogContext, LogEntry, LogLevel, Logger,
    LoggerBuilder, LoggerError, LoggerMetrics, Result, Sink, SinkFailure, TimestampFormat,
};
pub use crate::factory::{LogOption, LoggerOptions};
