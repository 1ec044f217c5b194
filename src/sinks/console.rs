//! Standard output sink

use crate::core::{Result, Sink};
use std::io::Write;

/// Mirrors encoded records to stdout.
///
/// The stdout lock is held for the whole record so concurrent writers never
/// interleave inside a line.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSink;

impl ConsoleSink {
    pub fn new() -> Self {
        Self
    }
}

impl Sink for ConsoleSink {
    fn write(&self, payload: &[u8]) -> Result<usize> {
        let mut out = std::io::stdout().lock();
        out.write_all(payload)?;
        Ok(payload.len())
    }

    fn flush(&self) -> Result<()> {
        std::io::stdout().flush()?;
        Ok(())
    }

    fn name(&self) -> &str {
        "stdout"
    }
}
