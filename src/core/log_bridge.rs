//! Bridge from the `log` crate facade to [`Logger`]
//!
//! Libraries that log through `log::info!` and friends end up in the same
//! sinks as the application once [`redirect_std_log`] has been called.

use super::{
    error::{LoggerError, Result},
    log_entry::Caller,
    log_level::LogLevel,
    logger::Logger,
};
use log::{Log, Metadata, Record};

/// Adapter implementing `log::Log` on top of a [`Logger`]
pub struct LogBridge {
    logger: Logger,
}

impl LogBridge {
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }
}

impl Log for LogBridge {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.logger.enabled(LogLevel::from(metadata.level()))
    }

    fn log(&self, record: &Record) {
        let level = LogLevel::from(record.level());
        let caller = match (record.file(), record.line()) {
            (Some(file), Some(line)) => Some(Caller::new(file, line)),
            _ => None,
        };
        self.logger.log_at(level, record.args().to_string(), caller);
    }

    fn flush(&self) {
        if let Err(e) = self.logger.flush() {
            eprintln!("[LOGGER ERROR] Failed to flush bridged logger: {}", e);
        }
    }
}

/// Install `logger` as the global `log` backend.
///
/// Fails when another backend was installed first; the logger itself stays
/// usable either way. The `log` crate's own max level is opened fully so that
/// later [`Logger::set_min_level`] calls take effect for bridged records too.
///
/// # Example
/// ```no_run
/// use fanout_logger::prelude::*;
/// use fanout_logger::core::redirect_std_log;
///
/// let logger = Logger::builder().sink(ConsoleSink::new()).build();
/// redirect_std_log(&logger).expect("no other log backend installed");
/// log::info!("routed through the fan-out logger");
/// ```
pub fn redirect_std_log(logger: &Logger) -> Result<()> {
    log::set_boxed_logger(Box::new(LogBridge::new(logger.clone())))
        .map_err(|e| LoggerError::config("log bridge", e.to_string()))?;
    // Thresholds can change at runtime, so filtering stays with the logger
    log::set_max_level(log::LevelFilter::Trace);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sinks::{MemoryQueue, QueueSink, DEFAULT_QUEUE_KEY};
    use std::sync::Arc;

    fn bridged(min_level: LogLevel) -> (LogBridge, Arc<MemoryQueue>) {
        let queue = Arc::new(MemoryQueue::new());
        let logger = Logger::builder()
            .min_level(min_level)
            .sink(QueueSink::new(Arc::clone(&queue)))
            .build();
        (LogBridge::new(logger), queue)
    }

    #[test]
    fn test_bridge_forwards_records_with_location() {
        let (bridge, queue) = bridged(LogLevel::Debug);

        bridge.log(
            &Record::builder()
                .args(format_args!("from a library"))
                .level(log::Level::Warn)
                .file(Some("src/net/client.rs"))
                .line(Some(17))
                .build(),
        );

        let raw = queue.lpop(DEFAULT_QUEUE_KEY).unwrap();
        let record: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(record["level"], "warn");
        assert_eq!(record["msg"], "from a library");
        assert_eq!(record["caller"], "net/client.rs:17");
    }

    #[test]
    fn test_bridge_respects_threshold() {
        let (bridge, queue) = bridged(LogLevel::Error);

        let metadata = Metadata::builder().level(log::Level::Info).build();
        assert!(!bridge.enabled(&metadata));

        bridge.log(
            &Record::builder()
                .args(format_args!("chatty"))
                .level(log::Level::Trace)
                .build(),
        );
        assert_eq!(queue.len(DEFAULT_QUEUE_KEY), 0);
    }

    #[test]
    fn test_bridge_follows_runtime_threshold() {
        let (bridge, queue) = bridged(LogLevel::Info);
        let debug = Metadata::builder().level(log::Level::Debug).build();
        assert!(!bridge.enabled(&debug));

        bridge.logger().set_min_level(LogLevel::Debug);

        assert!(bridge.enabled(&debug));
        bridge.log(
            &Record::builder()
                .args(format_args!("now visible"))
                .level(log::Level::Debug)
                .build(),
        );
        assert_eq!(queue.len(DEFAULT_QUEUE_KEY), 1);
    }
}
