use std::io::Write;

use crate::Result;
use crate::shot_encoder::ShotEncoder;
use crate::timeline::Shot;

/// A `ShotEncoder` that writes shots as a single JSON array.
///
/// Shots are streamed straight to the writer; the array is opened lazily so an empty run still
/// produces `[]`.
///
/// Example output:
/// ```json
/// [
///   { "shot_number": 1, "start_time": 0.5, "end_time": 9.1, "media_id": "v1", ... },
///   { "shot_number": 2, "start_time": 9.1, "end_time": 17.4, "media_id": "g3", ... }
/// ]
/// ```
pub struct JsonArrayEncoder<W: Write> {
    w: W,

    /// Whether the opening `[` has been written.
    started: bool,

    /// Whether the next element is the first, so no comma precedes it.
    first: bool,

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

    fn start_if_needed(&mut self) -> Result<()> {
        if !self.started {
            self.w.write_all(b"[")?;
            self.started = true;
        }
        Ok(())
    }
}

impl<W: Write> ShotEncoder for JsonArrayEncoder<W> {
    fn write_shot(&mut self, shot: &Shot) -> Result<()> {
        if self.closed {
            return Err(crate::Error::msg(
                "cannot write shot: encoder is already closed",
            ));
        }

        self.start_if_needed()?;

        if !self.first {
            self.w.write_all(b",")?;
        }
        self.first = false;

        serde_json::to_writer(&mut self.w, shot)?;

        // Flush so streaming consumers (stdout, pipes) see output promptly.
        self.w.flush()?;

        Ok(())
    }

    /// Finalize the JSON array. Idempotent; no shots may be written afterwards.
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
