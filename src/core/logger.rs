//! Main logger implementation
//!
//! A [`Logger`] is a cheap, cloneable handle. Clones share the sink, the
//! thresholds and the metrics; child loggers made with
//! [`Logger::with_field`] or [`Logger::named`] add their own fields or name
//! on top. Everything happens on the calling thread: a log call filters,
//! encodes and writes before it returns.

use super::{
    encoder::{EncoderConfig, JsonEncoder},
    error::{LoggerError, Result},
    log_context::{FieldValue, LogContext},
    log_entry::{Caller, LogEntry},
    log_level::LogLevel,
    metrics::LoggerMetrics,
    sink::Sink,
};
use crate::sinks::MultiSink;
use parking_lot::RwLock;
use std::backtrace::Backtrace;
use std::sync::Arc;

struct Shared {
    min_level: RwLock<LogLevel>,
    stacktrace_level: LogLevel,
    encoder: JsonEncoder,
    sink: Arc<dyn Sink>,
    metrics: Arc<LoggerMetrics>,
}

#[derive(Clone)]
pub struct Logger {
    shared: Arc<Shared>,
    name: Option<String>,
    fields: LogContext,
}

impl Logger {
    /// Create a builder for Logger
    ///
    /// # Example
    /// ```
    /// use fanout_logger::prelude::*;
    /// use std::sync::Arc;
    ///
    /// let queue = Arc::new(MemoryQueue::new());
    /// let logger = Logger::builder()
    ///     .min_level(LogLevel::Info)
    ///     .sink(QueueSink::new(Arc::clone(&queue)))
    ///     .field("project", "billing")
    ///     .build();
    ///
    /// logger.debug("filtered out");
    /// logger.info("invoice sent");
    /// assert_eq!(queue.len("ELK_LOG"), 1);
    /// ```
    #[must_use]
    pub fn builder() -> LoggerBuilder {
        LoggerBuilder::new()
    }

    pub fn min_level(&self) -> LogLevel {
        *self.shared.min_level.read()
    }

    /// Change the severity threshold for this logger and all its clones
    pub fn set_min_level(&self, level: LogLevel) {
        *self.shared.min_level.write() = level;
    }

    pub fn stacktrace_level(&self) -> LogLevel {
        self.shared.stacktrace_level
    }

    #[inline]
    pub fn enabled(&self, level: LogLevel) -> bool {
        level >= self.min_level()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn fields(&self) -> &LogContext {
        &self.fields
    }

    /// Child logger whose records carry one more field
    #[must_use]
    pub fn with_field<K, V>(&self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<FieldValue>,
    {
        let mut child = self.clone();
        child.fields.add_field(key, value);
        child
    }

    /// Child logger whose records carry every field of `context`
    #[must_use]
    pub fn with_fields(&self, context: &LogContext) -> Self {
        let mut child = self.clone();
        child.fields.extend(context);
        child
    }

    /// Child logger with `name` appended to this logger's name, dot-separated
    #[must_use]
    pub fn named(&self, name: &str) -> Self {
        let mut child = self.clone();
        child.name = match (&self.name, name.is_empty()) {
            (_, true) => self.name.clone(),
            (Some(parent), false) => Some(format!("{}.{}", parent, name)),
            (None, false) => Some(name.to_string()),
        };
        child
    }

    /// Log at `level`, reporting the caller of this method as the call site
    #[track_caller]
    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        if !self.enabled(level) {
            self.shared.metrics.record_filtered();
            return;
        }
        self.write_entry(level, message.into(), Some(Caller::here()));
    }

    /// Log with an explicit call site, for bridges that know the origin
    pub fn log_at(&self, level: LogLevel, message: impl Into<String>, caller: Option<Caller>) {
        if !self.enabled(level) {
            self.shared.metrics.record_filtered();
            return;
        }
        self.write_entry(level, message.into(), caller);
    }

    fn write_entry(&self, level: LogLevel, message: String, caller: Option<Caller>) {
        let mut entry = LogEntry::new(level, message).with_logger_name(self.name.clone());
        if let Some(caller) = caller {
            entry = entry.with_caller(caller);
        }
        if level >= self.shared.stacktrace_level {
            entry = entry.with_stacktrace(Backtrace::force_capture().to_string());
        }

        let payload = match self.shared.encoder.encode(&entry, &self.fields) {
            Ok(payload) => payload,
            Err(e) => {
                eprintln!("[LOGGER ERROR] Failed to encode entry: {}", e);
                self.shared.metrics.record_dropped();
                return;
            }
        };

        match self.shared.sink.write(&payload) {
            Ok(_) => {
                self.shared.metrics.record_logged();
            }
            Err(e) => self.handle_write_error(e),
        }
    }

    fn handle_write_error(&self, err: LoggerError) {
        let metrics = &self.shared.metrics;
        match err {
            LoggerError::SinkFailures { ref failures, .. } => {
                metrics.record_sink_failures(failures.len() as u64);
            }
            _ => {
                metrics.record_sink_failure();
            }
        }
        if err.was_delivered() {
            metrics.record_logged();
        } else {
            metrics.record_dropped();
        }

        eprintln!("[LOGGER ERROR] write error: {}", err);

        if err.is_fatal() {
            eprintln!("[LOGGER CRITICAL] Local log storage exhausted, exiting");
            std::process::exit(1);
        }
    }

    /// Flush every sink
    pub fn flush(&self) -> Result<()> {
        self.shared.sink.flush()
    }

    /// Counters shared by this logger, its clones and its sinks
    pub fn metrics(&self) -> &LoggerMetrics {
        &self.shared.metrics
    }

    pub fn metrics_handle(&self) -> Arc<LoggerMetrics> {
        Arc::clone(&self.shared.metrics)
    }

    #[inline]
    #[track_caller]
    pub fn debug(&self, message: impl Into<String>) {
        self.log(LogLevel::Debug, message);
    }

    #[inline]
    #[track_caller]
    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    #[inline]
    #[track_caller]
    pub fn warn(&self, message: impl Into<String>) {
        self.log(LogLevel::Warn, message);
    }

    #[inline]
    #[track_caller]
    pub fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message);
    }

    /// Log at fatal level, flush, then exit the process with status 1
    #[track_caller]
    pub fn fatal(&self, message: impl Into<String>) -> ! {
        self.log(LogLevel::Fatal, message);
        if let Err(e) = self.flush() {
            eprintln!("[LOGGER ERROR] Failed to flush before exit: {}", e);
        }
        std::process::exit(1)
    }

    /// Log at panic level, flush, then panic with the message
    #[track_caller]
    pub fn panic(&self, message: impl Into<String>) -> ! {
        let message = message.into();
        self.log(LogLevel::Panic, message.clone());
        if let Err(e) = self.flush() {
            eprintln!("[LOGGER ERROR] Failed to flush before panic: {}", e);
        }
        panic!("{}", message)
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.name)
            .field("min_level", &self.min_level())
            .field("stacktrace_level", &self.shared.stacktrace_level)
            .field("sink", &self.shared.sink.name())
            .field("fields", &self.fields)
            .finish()
    }
}

/// Builder for constructing Logger with a fluent API
///
/// Sinks are written in the order they are added.
///
/// # Example
/// ```
/// use fanout_logger::prelude::*;
///
/// let logger = Logger::builder()
///     .min_level(LogLevel::Debug)
///     .stacktrace_level(LogLevel::Error)
///     .sink(ConsoleSink::new())
///     .name("worker")
///     .build();
/// ```
pub struct LoggerBuilder {
    min_level: LogLevel,
    stacktrace_level: LogLevel,
    sinks: MultiSink,
    encoder: EncoderConfig,
    name: Option<String>,
    fields: LogContext,
    metrics: Option<Arc<LoggerMetrics>>,
}

impl LoggerBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self {
            min_level: LogLevel::Debug,
            stacktrace_level: LogLevel::Error,
            sinks: MultiSink::new(),
            encoder: EncoderConfig::default(),
            name: None,
            fields: LogContext::new(),
            metrics: None,
        }
    }

    /// Set minimum log level
    #[must_use = "builder methods return a new value"]
    pub fn min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    /// Set the level from which records carry a stack trace
    #[must_use = "builder methods return a new value"]
    pub fn stacktrace_level(mut self, level: LogLevel) -> Self {
        self.stacktrace_level = level;
        self
    }

    /// Add a sink after the ones already configured
    #[must_use = "builder methods return a new value"]
    pub fn sink<S: Sink + 'static>(mut self, sink: S) -> Self {
        self.sinks = self.sinks.with_sink(sink);
        self
    }

    /// Add an already shared sink
    #[must_use = "builder methods return a new value"]
    pub fn shared_sink(mut self, sink: Arc<dyn Sink>) -> Self {
        self.sinks = self.sinks.with_shared(sink);
        self
    }

    /// Replace the configured sinks with an already composed set
    #[must_use = "builder methods return a new value"]
    pub fn sinks(mut self, sinks: MultiSink) -> Self {
        self.sinks = sinks;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn encoder(mut self, config: EncoderConfig) -> Self {
        self.encoder = config;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Attach a field to every record of the built logger
    #[must_use = "builder methods return a new value"]
    pub fn field<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<FieldValue>,
    {
        self.fields.add_field(key, value);
        self
    }

    /// Share counters with sinks that were given the same instance
    #[must_use = "builder methods return a new value"]
    pub fn metrics(mut self, metrics: Arc<LoggerMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Build the Logger
    pub fn build(self) -> Logger {
        Logger {
            shared: Arc::new(Shared {
                min_level: RwLock::new(self.min_level),
                stacktrace_level: self.stacktrace_level,
                encoder: JsonEncoder::new(self.encoder),
                sink: Arc::new(self.sinks),
                metrics: self.metrics.unwrap_or_default(),
            }),
            name: self.name,
            fields: self.fields,
        }
    }
}

impl Default for LoggerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sinks::{MemoryQueue, QueueSink, DEFAULT_QUEUE_KEY};

    fn queue_logger(min_level: LogLevel) -> (Logger, Arc<MemoryQueue>) {
        let queue = Arc::new(MemoryQueue::new());
        let logger = Logger::builder()
            .min_level(min_level)
            .sink(QueueSink::new(Arc::clone(&queue)))
            .field("project", "billing")
            .build();
        (logger, queue)
    }

    fn records(queue: &MemoryQueue) -> Vec<serde_json::Value> {
        queue
            .range(DEFAULT_QUEUE_KEY)
            .iter()
            .map(|raw| serde_json::from_slice(raw).unwrap())
            .collect()
    }

    #[test]
    fn test_builder_defaults() {
        let logger = LoggerBuilder::default().build();
        assert_eq!(logger.min_level(), LogLevel::Debug);
        assert_eq!(logger.stacktrace_level(), LogLevel::Error);
        assert!(logger.name().is_none());
    }

    #[test]
    fn test_severity_threshold() {
        let (logger, queue) = queue_logger(LogLevel::Warn);

        logger.debug("hidden");
        logger.info("hidden");
        logger.warn("shown");
        logger.error("shown");

        assert_eq!(queue.len(DEFAULT_QUEUE_KEY), 2);
        assert_eq!(logger.metrics().filtered_count(), 2);
        assert_eq!(logger.metrics().total_logged(), 2);
    }

    #[test]
    fn test_record_carries_service_tag() {
        let (logger, queue) = queue_logger(LogLevel::Debug);

        logger.info("started");

        let record = &records(&queue)[0];
        assert_eq!(record["project"], "billing");
        assert_eq!(record["msg"], "started");
        assert_eq!(record["level"], "info");
    }

    #[test]
    fn test_caller_is_the_call_site() {
        let (logger, queue) = queue_logger(LogLevel::Debug);

        let line = line!() + 1;
        logger.info("where am I");

        let record = &records(&queue)[0];
        assert_eq!(record["caller"], format!("core/logger.rs:{}", line));
    }

    #[test]
    fn test_stacktrace_threshold() {
        let (logger, queue) = queue_logger(LogLevel::Debug);

        logger.warn("no trace");
        logger.error("with trace");

        let records = records(&queue);
        assert!(records[0].get("stacktrace").is_none());
        assert!(records[1]["stacktrace"].is_string());
    }

    #[test]
    fn test_child_loggers() {
        let (logger, queue) = queue_logger(LogLevel::Debug);
        let child = logger.named("orders").named("sync").with_field("request_id", "r-1");

        child.info("child");
        logger.info("parent");

        let records = records(&queue);
        assert_eq!(records[0]["app"], "orders.sync");
        assert_eq!(records[0]["request_id"], "r-1");
        assert_eq!(records[0]["project"], "billing");
        assert!(records[1].get("app").is_none());
        assert!(records[1].get("request_id").is_none());
    }

    #[test]
    fn test_set_min_level_is_shared_by_clones() {
        let (logger, queue) = queue_logger(LogLevel::Debug);
        let clone = logger.clone();

        logger.set_min_level(LogLevel::Error);
        clone.info("hidden");

        assert_eq!(queue.len(DEFAULT_QUEUE_KEY), 0);
    }

    #[test]
    fn test_sink_failure_never_reaches_caller() {
        let (logger, queue) = queue_logger(LogLevel::Debug);
        queue.set_fail_pushes(true);

        logger.error("queue is down");

        assert_eq!(logger.metrics().sink_failures(), 1);
        assert_eq!(logger.metrics().dropped_count(), 1);
    }

    #[test]
    #[should_panic(expected = "unrecoverable state")]
    fn test_panic_level_logs_then_panics() {
        let (logger, _queue) = queue_logger(LogLevel::Debug);
        logger.panic("unrecoverable state");
    }

    #[test]
    fn test_panic_record_is_written_before_unwinding() {
        let (logger, queue) = queue_logger(LogLevel::Debug);
        let child = logger.clone();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            child.panic("boom");
        }));

        assert!(result.is_err());
        let records = records(&queue);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["level"], "panic");
        assert!(records[0]["stacktrace"].is_string());
    }
}
