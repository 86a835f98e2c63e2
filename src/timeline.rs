//! Final shot list handed to the renderer.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::Result;
use crate::consolidate::{ConsolidatedClip, Transition};
use crate::error::Error;
use crate::media::{MediaCandidate, MediaType};
use crate::phrase::Phrase;

/// Tolerance when comparing clip boundaries.
const BOUNDARY_EPSILON: f64 = 1e-9;

/// Suffix added to the description of an instrumental intro filler shot.
pub const INTRO_DESCRIPTION_SUFFIX: &str = " (instrumental intro)";

/// Timeline construction options.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineOpts {
    /// Cover silence before the first lyric with the first clip's media.
    pub fill_intro: bool,
    /// Minimum leading silence (seconds) that gets a filler shot.
    pub intro_threshold: f64,
}

impl Default for TimelineOpts {
    fn default() -> Self {
        Self {
            fill_intro: false,
            intro_threshold: 0.5,
        }
    }
}

/// How shot timing was derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMethod {
    /// Cuts follow the lyric timestamps.
    LyricSync,
    /// Fixed-interval cuts; no lyric data was available.
    Sequential,
}

/// One entry of the shot list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shot {
    pub shot_number: u32,
    pub start_time: f64,
    pub end_time: f64,
    pub duration: f64,
    pub media_id: String,
    pub local_path: String,
    pub media_type: MediaType,
    pub description: String,
    pub transition: Transition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clip_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub topics: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_score: Option<f32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub phrase_group_ids: Vec<u32>,
    /// Phrase-level captions, timed independently of the cut.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub captions: Vec<Phrase>,
}

impl Shot {
    /// A shot with only media and timing; synchronization metadata left empty.
    pub(crate) fn plain(media: &MediaCandidate, start_time: f64, end_time: f64) -> Self {
        Self {
            shot_number: 0,
            start_time,
            end_time,
            duration: end_time - start_time,
            media_id: media.id.clone(),
            local_path: media.local_path.clone(),
            media_type: media.media_type,
            description: media.description.clone(),
            transition: Transition::Crossfade,
            clip_id: None,
            topics: Vec::new(),
            match_score: None,
            phrase_group_ids: Vec::new(),
            captions: Vec::new(),
        }
    }
}

/// The ordered, gap-free shot list for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub run_id: Uuid,
    pub sync_method: SyncMethod,
    pub total_duration: f64,
    pub total_shots: usize,
    #[serde(rename = "shot_list")]
    pub shots: Vec<Shot>,
}

impl Timeline {
    /// Build a timeline from shots: numbers them, fades in and out, and fills the totals.
    pub(crate) fn from_shots(run_id: Uuid, sync_method: SyncMethod, mut shots: Vec<Shot>) -> Self {
        let last = shots.len().saturating_sub(1);
        for (i, shot) in shots.iter_mut().enumerate() {
            shot.shot_number = u32::try_from(i + 1).unwrap_or(u32::MAX);
            if i == 0 || i == last {
                shot.transition = Transition::Fade;
            }
        }

        Self {
            run_id,
            sync_method,
            total_duration: shots.last().map_or(0.0, |s| s.end_time),
            total_shots: shots.len(),
            shots,
        }
    }

    /// Whether every shot ends exactly where the next begins.
    pub fn is_continuous(&self) -> bool {
        self.shots
            .windows(2)
            .all(|pair| (pair[0].end_time - pair[1].start_time).abs() <= BOUNDARY_EPSILON)
    }

    /// Cut out `[start, end)` as its own timeline, with all times relative to `start`.
    ///
    /// Shots and captions overlapping the window are clamped to it; captions entirely outside
    /// are dropped.
    pub fn window(&self, start: f64, end: f64) -> Timeline {
        let shots = self
            .shots
            .iter()
            .filter(|shot| shot.start_time < end && shot.end_time > start)
            .map(|shot| {
                let clamped_start = shot.start_time.max(start);
                let clamped_end = shot.end_time.min(end);

                let captions = shot
                    .captions
                    .iter()
                    .filter(|c| c.start_time < end && c.end_time > start)
                    .map(|c| Phrase {
                        text: c.text.clone(),
                        start_time: c.start_time.max(start) - start,
                        end_time: c.end_time.min(end) - start,
                    })
                    .collect();

                Shot {
                    start_time: clamped_start - start,
                    end_time: clamped_end - start,
                    duration: clamped_end - clamped_start,
                    transition: Transition::Crossfade,
                    captions,
                    ..shot.clone()
                }
            })
            .collect();

        Timeline::from_shots(self.run_id, self.sync_method, shots)
    }
}

/// Orders consolidated clips into a continuous shot list.
#[derive(Debug, Clone, Default)]
pub struct TimelineBuilder {
    opts: TimelineOpts,
}

impl TimelineBuilder {
    pub fn new(opts: TimelineOpts) -> Self {
        Self { opts }
    }

    /// Build the shot list for `clips`, resolving media details from `pool`.
    ///
    /// Each shot runs from its clip's start to the next clip's start, so silences between clips
    /// are covered by the preceding cut. The last shot ends with the last lyric. Fails when clips
    /// overlap or run backwards, or reference media missing from `pool`.
    pub fn build(&self, clips: &[ConsolidatedClip], pool: &[MediaCandidate]) -> Result<Timeline> {
        self.build_with_id(Uuid::new_v4(), clips, pool)
    }

    pub(crate) fn build_with_id(
        &self,
        run_id: Uuid,
        clips: &[ConsolidatedClip],
        pool: &[MediaCandidate],
    ) -> Result<Timeline> {
        check_order(clips)?;

        let media: HashMap<&str, &MediaCandidate> =
            pool.iter().map(|c| (c.id.as_str(), c)).collect();

        let mut shots = Vec::with_capacity(clips.len() + 1);

        if let Some(first) = clips.first() {
            if self.opts.fill_intro && first.start_time > self.opts.intro_threshold {
                warn!(
                    silence = first.start_time,
                    "lyrics start late; adding instrumental intro shot"
                );
                let first_media = lookup(&media, &first.media_id)?;
                let mut intro = Shot::plain(first_media, 0.0, first.start_time);
                intro.description.push_str(INTRO_DESCRIPTION_SUFFIX);
                shots.push(intro);
            }
        }

        for (i, clip) in clips.iter().enumerate() {
            let end_time = clips.get(i + 1).map_or(clip.end_time, |next| next.start_time);

            let clip_media = lookup(&media, &clip.media_id)?;
            let mut shot = Shot::plain(clip_media, clip.start_time, end_time);
            shot.clip_id = Some(clip.id);
            shot.topics = clip.topics.clone();
            shot.match_score = Some(clip.match_score);
            shot.phrase_group_ids = clip.phrase_groups.iter().map(|g| g.id).collect();
            shot.captions = clip
                .phrase_groups
                .iter()
                .flat_map(|g| g.phrases.iter().cloned())
                .collect();
            shots.push(shot);
        }

        let timeline = Timeline::from_shots(run_id, SyncMethod::LyricSync, shots);
        info!(
            shots = timeline.total_shots,
            duration = timeline.total_duration,
            "built lyric-synchronized timeline"
        );
        Ok(timeline)
    }
}

/// Mark the first and last clip with a fade; the clips between crossfade.
pub fn fade_clip_edges(clips: &mut [ConsolidatedClip]) {
    if let Some(first) = clips.first_mut() {
        first.transition = Transition::Fade;
    }
    if let Some(last) = clips.last_mut() {
        last.transition = Transition::Fade;
    }
}

fn lookup<'p>(media: &HashMap<&str, &'p MediaCandidate>, id: &str) -> Result<&'p MediaCandidate> {
    media
        .get(id)
        .copied()
        .ok_or_else(|| Error::UnknownMedia(id.to_owned()))
}

fn check_order(clips: &[ConsolidatedClip]) -> Result<()> {
    for pair in clips.windows(2) {
        if pair[1].start_time + BOUNDARY_EPSILON < pair[0].end_time {
            return Err(Error::Discontinuous {
                clip_id: pair[1].id,
                start: pair[1].start_time,
                previous_end: pair[0].end_time,
            });
        }
    }
    Ok(())
}
