//! Fan-out sink composing several sinks into one
//!
//! Every member sees every record. A failing member never stops delivery to
//! the members after it; failures are collected and reported together once
//! all members have been attempted.

use crate::core::{LoggerError, Result, Sink, SinkFailure};
use std::sync::Arc;

/// Best-effort composition of sinks in a fixed order.
///
/// The byte count reported on success is the first member's, so the member
/// added first (normally the file sink) decides it.
///
/// # Example
///
/// ```
/// use fanout_logger::sinks::{MemoryQueue, MultiSink, QueueSink};
/// use fanout_logger::core::Sink;
/// use std::sync::Arc;
///
/// let queue = Arc::new(MemoryQueue::new());
/// let sink = MultiSink::new()
///     .with_sink(QueueSink::new(Arc::clone(&queue)))
///     .with_sink(QueueSink::with_key(Arc::clone(&queue), "AUDIT_LOG"));
///
/// sink.write(b"{\"msg\":\"hello\"}\n").unwrap();
/// assert_eq!(queue.len("ELK_LOG"), 1);
/// assert_eq!(queue.len("AUDIT_LOG"), 1);
/// ```
#[derive(Clone, Default)]
pub struct MultiSink {
    sinks: Vec<Arc<dyn Sink>>,
}

impl MultiSink {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    /// Append a sink after the ones already configured
    #[must_use = "builder methods return a new value"]
    pub fn with_sink<S: Sink + 'static>(mut self, sink: S) -> Self {
        self.sinks.push(Arc::new(sink));
        self
    }

    /// Append an already shared sink
    #[must_use = "builder methods return a new value"]
    pub fn with_shared(mut self, sink: Arc<dyn Sink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Member names in write order
    pub fn sink_names(&self) -> Vec<&str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }
}

impl Sink for MultiSink {
    fn write(&self, payload: &[u8]) -> Result<usize> {
        let mut written = None;
        let mut delivered = 0;
        let mut failures = Vec::new();

        for (idx, sink) in self.sinks.iter().enumerate() {
            match sink.write(payload) {
                Ok(n) => {
                    delivered += 1;
                    if idx == 0 {
                        written = Some(n);
                    }
                }
                Err(error) => failures.push(SinkFailure {
                    sink: sink.name().to_string(),
                    error,
                }),
            }
        }

        if failures.is_empty() {
            Ok(written.unwrap_or(0))
        } else {
            Err(LoggerError::SinkFailures {
                attempted: self.sinks.len(),
                delivered,
                failures,
            })
        }
    }

    fn flush(&self) -> Result<()> {
        let mut failures = Vec::new();
        for sink in &self.sinks {
            if let Err(error) = sink.flush() {
                failures.push(SinkFailure {
                    sink: sink.name().to_string(),
                    error,
                });
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(LoggerError::SinkFailures {
                attempted: self.sinks.len(),
                delivered: self.sinks.len() - failures.len(),
                failures,
            })
        }
    }

    fn name(&self) -> &str {
        "multi"
    }
}
