use std::io::Write;

use crate::Result;
use crate::report::{CueReport, ReportEncoder};

/// A `ReportEncoder` that writes cue reports as a single JSON array.
///
/// Design:
/// - We stream output directly to a `Write` implementation to avoid buffering
///   all reports in memory.
/// - The encoder is stateful so we can emit a well-formed JSON array incrementally.
///
/// Example output:
/// ```json
/// [
///   { "index": 1, "text": "Hello", "start_ms": 0, "end_ms": 1000, ... },
///   { "index": 2, "text": "World", "start_ms": 2500, "end_ms": 3500, ... }
/// ]
/// ```
pub struct JsonArrayEncoder<W: Write> {
    w: W,

    /// Whether we have written the opening `[`.
    started: bool,

    /// Whether the next element is the first one (no leading comma).
    first: bool,

    /// Once closed, no further writes are allowed.
    closed: bool,
}

impl<W: Write> JsonArrayEncoder<W> {
    pub fn new(w: W) -> Self {
        Self {
            w,
            started: false,
            first: true,
            closed: false,
        }
    }

    /// Write the opening `[` if we have not already done so.
    ///
    /// Deferred so that empty output is still valid JSON (`[]`).
    fn start_if_needed(&mut self) -> Result<()> {
        if !self.started {
            self.w.write_all(b"[")?;
            self.started = true;
        }
        Ok(())
    }

    /// Give back the underlying writer.
    pub fn into_inner(self) -> W {
        self.w
    }
}

impl<W: Write> ReportEncoder for JsonArrayEncoder<W> {
    fn write_report(&mut self, report: &CueReport) -> Result<()> {
        if self.closed {
            return Err(crate::Error::msg(
                "cannot write report: encoder is already closed",
            ));
        }

        self.start_if_needed()?;

        if !self.first {
            self.w.write_all(b",")?;
        }
        self.first = false;

        serde_json::to_writer(&mut self.w, report)?;
        Ok(())
    }

    /// Finalize the JSON array and flush. Idempotent.
    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }

        self.start_if_needed()?;
        self.w.write_all(b"]")?;
        self.w.flush()?;

        self.closed = true;
        Ok(())
    }
}
