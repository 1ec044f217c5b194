//! Core logger types and traits

pub mod encoder;
pub mod error;
pub mod log_bridge;
pub mod log_context;
pub mod log_entry;
pub mod log_level;
pub mod logger;
pub mod metrics;
pub mod sink;

pub use encoder::{EncoderConfig, JsonEncoder, TimestampFormat};
pub use error::{LoggerError, Result, SinkFailure};
pub use log_bridge::{redirect_std_log, LogBridge};
pub use log_context::{FieldValue, LogContext};
pub use log_entry::{Caller, LogEntry};
pub use log_level::LogLevel;
pub use logger::{Logger, LoggerBuilder};
pub use metrics::LoggerMetrics;
pub use sink::Sink;
