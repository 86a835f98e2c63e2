//! Fixed-interval shot timing for runs without word-level timestamps.

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::Result;
use crate::error::Error;
use crate::media::MediaCandidate;
use crate::timeline::{Shot, SyncMethod, Timeline};

/// Upper bound on the shots one sequential timeline may hold.
pub const MAX_SEQUENTIAL_SHOTS: usize = 100_000;

/// Sequential fallback options.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequentialOpts {
    /// Length of every shot except possibly the last (seconds).
    pub shot_duration: f64,
    /// Length of the audio, when known. Defaults to one shot per candidate.
    pub total_duration: Option<f64>,
}

impl Default for SequentialOpts {
    fn default() -> Self {
        Self {
            shot_duration: 5.0,
            total_duration: None,
        }
    }
}

/// Cut `pool` into back-to-back shots of `opts.shot_duration`, cycling through the pool in order.
///
/// The last shot is clipped so the timeline ends exactly at the total duration. Shots carry no
/// topics, captions, or scores.
pub fn sequential_timeline(pool: &[MediaCandidate], opts: &SequentialOpts) -> Result<Timeline> {
    if pool.is_empty() {
        return Err(Error::NoCandidates);
    }
    if opts.shot_duration.is_nan() || opts.shot_duration <= 0.0 {
        return Err(Error::msg(format!(
            "shot duration must be positive, got {}",
            opts.shot_duration
        )));
    }

    let total = opts
        .total_duration
        .unwrap_or(opts.shot_duration * pool.len() as f64)
        .max(0.0);
    if !total.is_finite() {
        return Err(Error::msg(format!("total duration must be finite, got {total}")));
    }
    let shot_count = (total / opts.shot_duration).ceil();
    if shot_count > MAX_SEQUENTIAL_SHOTS as f64 {
        return Err(Error::msg(format!(
            "{total}s at {}s per shot needs {shot_count} shots, more than {MAX_SEQUENTIAL_SHOTS}",
            opts.shot_duration
        )));
    }

    let mut shots = Vec::new();
    let mut start = 0.0;
    let mut i = 0usize;
    while start < total {
        // Index-based start times avoid accumulating float error over long songs.
        let end = (((i + 1) as f64) * opts.shot_duration).min(total);
        shots.push(Shot::plain(&pool[i % pool.len()], start, end));
        i += 1;
        start = end;
    }

    let timeline = Timeline::from_shots(Uuid::new_v4(), SyncMethod::Sequential, shots);
    info!(
        shots = timeline.total_shots,
        duration = timeline.total_duration,
        "built sequential timeline"
    );
    Ok(timeline)
}
