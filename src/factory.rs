//! Logger factory
//!
//! Turns a flat set of options into a ready [`Logger`]: a rotating file sink
//! that is always present, an optional stdout mirror and an optional remote
//! queue, all behind one best-effort [`MultiSink`].
//!
//! # Example
//!
//! ```no_run
//! use fanout_logger::factory::{self, LoggerOptions};
//!
//! let logger = factory::new(
//!     LoggerOptions::default()
//!         .with_log_path("/var/log/billing")
//!         .with_log_name("billing")
//!         .with_log_level("info")
//!         .with_project_name("billing")
//!         .with_redis_addr("127.0.0.1:6379"),
//! )?;
//!
//! logger.info("service started");
//! # Ok::<(), fanout_logger::LoggerError>(())
//! ```

use crate::core::{redirect_std_log, LogLevel, Logger, LoggerMetrics, Result, Sink};
use crate::sinks::{ConsoleSink, MultiSink, RotatingFileSink, RotationPolicy};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Field attached to every record, naming the service
pub const SERVICE_TAG: &str = "project";

/// Override applied to [`LoggerOptions`] in order
pub type LogOption = Box<dyn FnOnce(&mut LoggerOptions)>;

/// Factory settings
///
/// Every field has a default, so partial JSON documents deserialize:
///
/// ```
/// use fanout_logger::factory::LoggerOptions;
///
/// let opts: LoggerOptions =
///     serde_json::from_str(r#"{"log_level": "warn", "is_stdout": "yes"}"#).unwrap();
/// assert_eq!(opts.log_level, "warn");
/// assert_eq!(opts.log_name, "app");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerOptions {
    /// Directory holding the log file
    pub log_path: String,
    /// File base name; the file is `<log_path>/<log_name>.log`
    pub log_name: String,
    /// Minimum severity name
    pub log_level: String,
    /// Rotation size in megabytes; 0 falls back to 100
    pub max_size: u64,
    /// Days to keep rotated files; 0 keeps them forever
    pub max_age: u64,
    /// Gzip rotated files
    pub compress: bool,
    /// Severity name from which records carry a stack trace
    pub stacktrace: String,
    /// `"yes"` mirrors records to stdout
    pub is_stdout: String,
    pub project_name: String,
    /// `host:port` of the remote queue; empty disables it
    pub redis_addr: String,
    pub redis_pass: String,
    pub redis_db: i64,
    /// Connect and command timeout for the remote queue
    pub redis_timeout_ms: u64,
    /// Route the `log` crate facade into the built logger
    pub redirect_std_log: bool,
}

impl Default for LoggerOptions {
    fn default() -> Self {
        Self {
            log_path: "./logs".to_string(),
            log_name: "app".to_string(),
            log_level: "debug".to_string(),
            max_size: 100,
            max_age: 7,
            compress: false,
            stacktrace: "error".to_string(),
            is_stdout: "no".to_string(),
            project_name: "app".to_string(),
            redis_addr: String::new(),
            redis_pass: String::new(),
            redis_db: 0,
            redis_timeout_ms: 1000,
            redirect_std_log: true,
        }
    }
}

impl LoggerOptions {
    /// Defaults with `overrides` applied in order
    pub fn from_overrides<I>(overrides: I) -> Self
    where
        I: IntoIterator<Item = LogOption>,
    {
        Self::default().apply(overrides)
    }

    #[must_use = "builder methods return a new value"]
    pub fn apply<I>(mut self, overrides: I) -> Self
    where
        I: IntoIterator<Item = LogOption>,
    {
        for opt in overrides {
            opt(&mut self);
        }
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_log_path(mut self, path: impl Into<String>) -> Self {
        self.log_path = path.into();
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_log_name(mut self, name: impl Into<String>) -> Self {
        self.log_name = name.into();
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_max_size(mut self, megabytes: u64) -> Self {
        self.max_size = megabytes;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_max_age(mut self, days: u64) -> Self {
        self.max_age = days;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_compress(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_stacktrace(mut self, level: impl Into<String>) -> Self {
        self.stacktrace = level.into();
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_stdout(mut self, is_stdout: impl Into<String>) -> Self {
        self.is_stdout = is_stdout.into();
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_project_name(mut self, name: impl Into<String>) -> Self {
        self.project_name = name.into();
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_redis_addr(mut self, addr: impl Into<String>) -> Self {
        self.redis_addr = addr.into();
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_redis_pass(mut self, pass: impl Into<String>) -> Self {
        self.redis_pass = pass.into();
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_redis_db(mut self, db: i64) -> Self {
        self.redis_db = db;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_redis_timeout(mut self, timeout: Duration) -> Self {
        self.redis_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_redirect_std_log(mut self, redirect: bool) -> Self {
        self.redirect_std_log = redirect;
        self
    }

    /// Path of the active log file
    pub fn file_path(&self) -> PathBuf {
        PathBuf::from(&self.log_path).join(format!("{}.log", self.log_name))
    }

    pub fn stdout_enabled(&self) -> bool {
        self.is_stdout == "yes"
    }

    pub fn queue_enabled(&self) -> bool {
        !self.redis_addr.is_empty()
    }

    pub fn rotation_policy(&self) -> RotationPolicy {
        let megabytes = if self.max_size == 0 { 100 } else { self.max_size };
        RotationPolicy::new()
            .with_max_size_mb(megabytes)
            .with_max_age_days(self.max_age)
            .with_compression(self.compress)
    }

    pub fn build(self) -> Result<Logger> {
        new(self)
    }
}

pub fn log_path(path: impl Into<String>) -> LogOption {
    let path = path.into();
    Box::new(move |o| o.log_path = path)
}

pub fn log_name(name: impl Into<String>) -> LogOption {
    let name = name.into();
    Box::new(move |o| o.log_name = name)
}

pub fn log_level(level: impl Into<String>) -> LogOption {
    let level = level.into();
    Box::new(move |o| o.log_level = level)
}

pub fn max_size(megabytes: u64) -> LogOption {
    Box::new(move |o| o.max_size = megabytes)
}

pub fn max_age(days: u64) -> LogOption {
    Box::new(move |o| o.max_age = days)
}

pub fn compress(enabled: bool) -> LogOption {
    Box::new(move |o| o.compress = enabled)
}

pub fn stacktrace(level: impl Into<String>) -> LogOption {
    let level = level.into();
    Box::new(move |o| o.stacktrace = level)
}

pub fn is_stdout(flag: impl Into<String>) -> LogOption {
    let flag = flag.into();
    Box::new(move |o| o.is_stdout = flag)
}

pub fn project_name(name: impl Into<String>) -> LogOption {
    let name = name.into();
    Box::new(move |o| o.project_name = name)
}

pub fn redis_addr(addr: impl Into<String>) -> LogOption {
    let addr = addr.into();
    Box::new(move |o| o.redis_addr = addr)
}

pub fn redis_pass(pass: impl Into<String>) -> LogOption {
    let pass = pass.into();
    Box::new(move |o| o.redis_pass = pass)
}

pub fn redis_db(db: i64) -> LogOption {
    Box::new(move |o| o.redis_db = db)
}

/// Compose the sinks described by `opts` in write order: file, stdout, queue.
///
/// Queue sinks count their expiry refresh failures in `metrics`.
pub fn build_sinks(opts: &LoggerOptions, metrics: &Arc<LoggerMetrics>) -> Result<MultiSink> {
    let file = RotatingFileSink::with_policy(opts.file_path(), opts.rotation_policy())?;
    let mut sinks = MultiSink::new().with_sink(file);

    if opts.stdout_enabled() {
        sinks = sinks.with_sink(ConsoleSink::new());
    }

    if opts.queue_enabled() {
        sinks = sinks.with_shared(queue_sink(opts, metrics)?);
    }

    Ok(sinks)
}

#[cfg(feature = "redis-queue")]
fn queue_sink(opts: &LoggerOptions, metrics: &Arc<LoggerMetrics>) -> Result<Arc<dyn Sink>> {
    use crate::sinks::{QueueConfig, QueueSink, RedisQueue};

    let config = QueueConfig {
        address: opts.redis_addr.clone(),
        password: opts.redis_pass.clone(),
        db: opts.redis_db,
        timeout: Duration::from_millis(opts.redis_timeout_ms.max(1)),
    };
    let queue = RedisQueue::open(&config)?;
    Ok(Arc::new(
        QueueSink::new(queue).with_metrics(Arc::clone(metrics)),
    ))
}

#[cfg(not(feature = "redis-queue"))]
fn queue_sink(opts: &LoggerOptions, _metrics: &Arc<LoggerMetrics>) -> Result<Arc<dyn Sink>> {
    Err(crate::core::LoggerError::config(
        "LoggerOptions",
        format!(
            "redis_addr '{}' set but the redis-queue feature is disabled",
            opts.redis_addr
        ),
    ))
}

/// Build a logger from `opts`.
///
/// Unrecognized level names fall back to debug. Fails only when a sink
/// cannot be created; a failed `log` redirection is reported and ignored.
pub fn new(opts: LoggerOptions) -> Result<Logger> {
    let metrics = Arc::new(LoggerMetrics::new());
    let sinks = build_sinks(&opts, &metrics)?;

    let logger = Logger::builder()
        .min_level(LogLevel::resolve(&opts.log_level))
        .stacktrace_level(LogLevel::resolve(&opts.stacktrace))
        .sinks(sinks)
        .field(SERVICE_TAG, opts.project_name.as_str())
        .metrics(metrics)
        .build();

    if opts.redirect_std_log {
        if let Err(e) = redirect_std_log(&logger) {
            eprintln!("[LOGGER WARNING] Failed to redirect log facade: {}", e);
        }
    }

    Ok(logger)
}

/// Build a logger from the defaults plus `overrides`, applied in order
pub fn with_options<I>(overrides: I) -> Result<Logger>
where
    I: IntoIterator<Item = LogOption>,
{
    new(LoggerOptions::from_overrides(overrides))
}
