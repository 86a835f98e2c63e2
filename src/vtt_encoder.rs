use std::io::Write;

use crate::Result;
use crate::shot_encoder::ShotEncoder;
use crate::timeline::Shot;

/// A `ShotEncoder` that writes each shot's captions as WebVTT cues.
///
/// Cues follow phrase timing, not shot timing, so captions change more often than the video
/// cuts. Shots without captions (sequential timelines, intro filler) produce no cues.
pub struct VttEncoder<W: Write> {
    w: W,

    /// Whether the `WEBVTT` header has been written.
    started: bool,

    closed: bool,
}

impl<W: Write> VttEncoder<W> {
    pub fn new(w: W) -> Self {
        Self {
            w,
            started: false,
            closed: false,
        }
    }

    fn start_if_needed(&mut self) -> Result<()> {
        if !self.started {
            // Mandatory header line followed by a blank line.
            self.w.write_all(b"WEBVTT\n\n")?;
            self.started = true;
        }
        Ok(())
    }
}

impl<W: Write> ShotEncoder for VttEncoder<W> {
    fn write_shot(&mut self, shot: &Shot) -> Result<()> {
        if self.closed {
            return Err(crate::Error::msg(
                "cannot write shot: encoder is already closed",
            ));
        }

        if shot.captions.is_empty() {
            return Ok(());
        }

        self.start_if_needed()?;

        for caption in &shot.captions {
            let start = format_timestamp_vtt(caption.start_time);
            let end = format_timestamp_vtt(caption.end_time);

            writeln!(&mut self.w, "{start} --> {end}")?;
            writeln!(&mut self.w, "{}", caption.text)?;
            writeln!(&mut self.w)?;
        }

        self.w.flush()?;

        Ok(())
    }

    /// Flush the underlying writer. Idempotent.
    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }

        self.w.flush()?;
        self.closed = true;

        Ok(())
    }
}

/// Format seconds into a WebVTT timestamp (`HH:MM:SS.mmm`), rounded to the nearest millisecond.
/// Negative inputs clamp to zero.
pub(crate) fn format_timestamp_vtt(seconds: f64) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;

    let ms = total_ms % 1000;
    let total_s = total_ms / 1000;

    let s = total_s % 60;
    let total_m = total_s / 60;

    let m = total_m % 60;
    let h = total_m / 60;

    format!("{h:02}:{m:02}:{s:02}.{ms:03}")
}
