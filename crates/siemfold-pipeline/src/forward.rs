use crate::error::ForwardError;
use siemfold_core::{ForwardRecord, Forwarder};
use std::convert::Infallible;
use std::io::Write;

/// Writes one JSON document per record, newline-terminated.
///
/// Each record goes out in a single `write_all`, so several tenants sharing
/// stdout do not interleave within a line.
#[derive(Debug)]
pub struct JsonLinesForwarder<W: Write> {
    writer: W,
    written: u64,
}

impl<W: Write> JsonLinesForwarder<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, written: 0 }
    }

    /// Records written since construction.
    #[must_use]
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> Forwarder for JsonLinesForwarder<W> {
    type Error = ForwardError;

    fn forward(&mut self, record: &ForwardRecord) -> Result<(), ForwardError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        self.writer.write_all(&line)?;
        self.written += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), ForwardError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Keeps every record in memory.
#[derive(Debug, Default, Clone)]
pub struct CollectingForwarder {
    pub records: Vec<ForwardRecord>,
}

impl Forwarder for CollectingForwarder {
    type Error = Infallible;

    fn forward(&mut self, record: &ForwardRecord) -> Result<(), Infallible> {
        self.records.push(record.clone());
        Ok(())
    }
}
