//! Error types for the logger system

pub type Result<T> = std::result::Result<T, LoggerError>;

/// A single sink's failure inside a fan-out write
#[derive(Debug)]
pub struct SinkFailure {
    /// Name of the sink that rejected the record
    pub sink: String,
    pub error: LoggerError,
}

impl std::fmt::Display for SinkFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.sink, self.error)
    }
}

fn join_failures(failures: &[SinkFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    /// IO error with context
    #[error("IO error while {operation}: {message}")]
    IoOperation {
        operation: String,
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Generic IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Invalid configuration with details
    #[error("Invalid configuration for {component}: {message}")]
    InvalidConfiguration { component: String, message: String },

    /// File sink error with path
    #[error("File sink error for '{path}': {message}")]
    FileSinkError { path: String, message: String },

    /// File rotation error
    #[error("File rotation failed for '{path}': {message}")]
    FileRotationError { path: String, message: String },

    /// The device holding the log file has no space left
    #[error("Storage exhausted while writing '{path}'")]
    StorageExhausted { path: String },

    /// Remote queue command failed
    #[error("Queue error during {command}: {message}")]
    Queue { command: String, message: String },

    /// One or more sinks rejected a fan-out write
    #[error(
        "{} of {attempted} sinks failed ({delivered} accepted): {}",
        failures.len(),
        join_failures(failures)
    )]
    SinkFailures {
        attempted: usize,
        delivered: usize,
        failures: Vec<SinkFailure>,
    },

    /// Writer error (generic)
    #[error("Writer error: {0}")]
    WriterError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl LoggerError {
    /// Create an IO operation error with context
    pub fn io_operation(
        operation: impl Into<String>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        LoggerError::IoOperation {
            operation: operation.into(),
            message: message.into(),
            source,
        }
    }

    /// Create an invalid configuration error
    pub fn config(component: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::InvalidConfiguration {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Create a file sink error
    pub fn file_sink(path: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::FileSinkError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a file rotation error
    pub fn file_rotation(path: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::FileRotationError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a storage exhausted error
    pub fn storage_exhausted(path: impl Into<String>) -> Self {
        LoggerError::StorageExhausted { path: path.into() }
    }

    /// Create a queue command error
    pub fn queue(command: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::Queue {
            command: command.into(),
            message: message.into(),
        }
    }

    /// Create a writer error (generic)
    pub fn writer<S: Into<String>>(msg: S) -> Self {
        LoggerError::WriterError(msg.into())
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        LoggerError::Other(msg.into())
    }

    /// Whether the error leaves the process unable to keep a local log.
    ///
    /// For a fan-out failure this is true when any member failure is fatal.
    pub fn is_fatal(&self) -> bool {
        match self {
            LoggerError::StorageExhausted { .. } => true,
            LoggerError::SinkFailures { failures, .. } => {
                failures.iter().any(|f| f.error.is_fatal())
            }
            _ => false,
        }
    }

    /// Whether at least one sink still accepted the record
    pub fn was_delivered(&self) -> bool {
        matches!(self, LoggerError::SinkFailures { delivered, .. } if *delivered > 0)
    }
}

#[cfg(feature = "redis-queue")]
impl From<redis::RedisError> for LoggerError {
    fn from(err: redis::RedisError) -> Self {
        LoggerError::Queue {
            command: "redis".to_string(),
            message: err.to_string(),
        }
    }
}
