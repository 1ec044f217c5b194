//! Sink trait for encoded log output destinations

use super::error::Result;

/// A byte-stream destination for encoded records.
///
/// Sinks receive already-encoded records and must forward them verbatim.
/// Methods take `&self` because one sink is shared by every clone of a
/// logger; implementations serialize concurrent writes themselves.
pub trait Sink: Send + Sync {
    /// Write one encoded record, returning the sink's notion of bytes written
    fn write(&self, payload: &[u8]) -> Result<usize>;

    fn flush(&self) -> Result<()>;

    fn name(&self) -> &str;
}

impl<S: Sink + ?Sized> Sink for std::sync::Arc<S> {
    fn write(&self, payload: &[u8]) -> Result<usize> {
        (**self).write(payload)
    }

    fn flush(&self) -> Result<()> {
        (**self).flush()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<S: Sink + ?Sized> Sink for Box<S> {
    fn write(&self, payload: &[u8]) -> Result<usize> {
        (**self).write(payload)
    }

    fn flush(&self) -> Result<()> {
        (**self).flush()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
