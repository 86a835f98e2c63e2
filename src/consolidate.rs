//! Clip consolidation: many short matched phrase groups → fewer, evenly paced clips.
//!
//! Consecutive segments are merged while the clip is shorter than the target, the next segment's
//! key terms agree with the clip's, and the maximum would not be exceeded. Clips that end up
//! shorter than the minimum are force-merged into a neighbour. Phrase groups (and with them the
//! phrase-level caption timing) are carried through untouched.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::Result;
use crate::matcher::{CandidateIndex, MatchedSegment, SemanticMatcher};
use crate::topic::PhraseGroup;

pub const DEFAULT_TARGET_CLIP_DURATION: f64 = 8.0;
pub const DEFAULT_MIN_CLIP_DURATION: f64 = 4.0;
pub const DEFAULT_MAX_CLIP_DURATION: f64 = 15.0;
pub const DEFAULT_COHERENCE_THRESHOLD: f64 = 0.7;

/// Consolidation tuning (seconds, and a Jaccard threshold in `[0, 1]`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsolidationOpts {
    #[serde(alias = "target_duration")]
    pub target_clip_duration: f64,
    #[serde(alias = "min_duration")]
    pub min_clip_duration: f64,
    #[serde(alias = "max_duration")]
    pub max_clip_duration: f64,
    #[serde(alias = "coherence_threshold")]
    pub semantic_coherence_threshold: f64,
}

impl Default for ConsolidationOpts {
    fn default() -> Self {
        Self {
            target_clip_duration: DEFAULT_TARGET_CLIP_DURATION,
            min_clip_duration: DEFAULT_MIN_CLIP_DURATION,
            max_clip_duration: DEFAULT_MAX_CLIP_DURATION,
            semantic_coherence_threshold: DEFAULT_COHERENCE_THRESHOLD,
        }
    }
}

/// How the renderer should enter a clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transition {
    Fade,
    Crossfade,
    Cut,
}

/// A clip boundary decision before media is re-resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipPlan {
    pub id: u32,
    pub start_time: f64,
    pub end_time: f64,
    pub duration: f64,
    /// Distinct constituent topics, in order of first appearance.
    pub topics: Vec<String>,
    pub key_terms: BTreeSet<String>,
    pub phrase_groups: Vec<PhraseGroup>,
}

impl ClipPlan {
    /// Text the clip's media is re-resolved against: topics followed by the key-term union.
    pub fn match_text(&self) -> String {
        let mut parts: Vec<&str> = self.topics.iter().map(String::as_str).collect();
        parts.extend(self.key_terms.iter().map(String::as_str));
        parts.join(" ")
    }
}

/// One video cut on the final timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidatedClip {
    pub id: u32,
    pub start_time: f64,
    pub end_time: f64,
    pub duration: f64,
    pub topics: Vec<String>,
    pub key_terms: BTreeSet<String>,
    pub phrase_groups: Vec<PhraseGroup>,
    pub media_id: String,
    pub match_score: f32,
    pub transition: Transition,
}

/// Jaccard similarity of two key-term sets. Empty sets are never similar to anything.
pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    intersection as f64 / union as f64
}

/// Merge buffer over consecutive matched segments.
struct Buffer<'a> {
    segments: Vec<&'a MatchedSegment>,
    key_terms: BTreeSet<String>,
}

impl<'a> Buffer<'a> {
    fn new(segment: &'a MatchedSegment) -> Self {
        Self {
            segments: vec![segment],
            key_terms: segment.group.key_terms.clone(),
        }
    }

    fn start(&self) -> f64 {
        self.segments[0].group.start_time
    }

    fn end(&self) -> f64 {
        self.segments[self.segments.len() - 1].group.end_time
    }

    fn duration(&self) -> f64 {
        self.end() - self.start()
    }

    /// Duration the buffer would have after absorbing `segment`.
    fn duration_with(&self, segment: &MatchedSegment) -> f64 {
        segment.group.end_time - self.start()
    }

    fn absorb(&mut self, segment: &'a MatchedSegment) {
        self.key_terms.extend(segment.group.key_terms.iter().cloned());
        self.segments.push(segment);
    }

    fn append(&mut self, other: Buffer<'a>) {
        self.key_terms.extend(other.key_terms);
        self.segments.extend(other.segments);
    }

    fn into_plan(self, id: u32) -> ClipPlan {
        let start_time = self.start();
        let end_time = self.end();

        let mut topics: Vec<String> = Vec::new();
        for segment in &self.segments {
            if !topics.contains(&segment.group.topic) {
                topics.push(segment.group.topic.clone());
            }
        }

        ClipPlan {
            id,
            start_time,
            end_time,
            duration: end_time - start_time,
            topics,
            key_terms: self.key_terms,
            phrase_groups: self.segments.iter().map(|s| s.group.clone()).collect(),
        }
    }
}

/// Turns matched segments into consolidated clips.
#[derive(Debug, Clone, Default)]
pub struct Consolidator {
    opts: ConsolidationOpts,
}

impl Consolidator {
    pub fn new(opts: ConsolidationOpts) -> Self {
        Self { opts }
    }

    pub fn opts(&self) -> &ConsolidationOpts {
        &self.opts
    }

    /// Decide clip boundaries.
    ///
    /// The result is contiguous and exhaustive over `segments`. No clip is shorter than
    /// `min_clip_duration` unless all segments together are. A clip may exceed
    /// `max_clip_duration` when a single segment is longer than that, or when a short tail had
    /// to be merged backwards.
    pub fn plan(&self, segments: &[MatchedSegment]) -> Vec<ClipPlan> {
        let opts = &self.opts;
        let mut closed: Vec<Buffer<'_>> = Vec::new();
        let mut carry: Option<Buffer<'_>> = None;
        let mut next = 0;

        while next < segments.len() {
            let mut buffer = match carry.take() {
                Some(mut carried) => {
                    if carried.duration_with(&segments[next]) > opts.max_clip_duration {
                        warn!(
                            start = carried.start(),
                            end = segments[next].group.end_time,
                            max = opts.max_clip_duration,
                            "forced forward merge exceeds maximum clip duration"
                        );
                    }
                    carried.absorb(&segments[next]);
                    carried
                }
                None => Buffer::new(&segments[next]),
            };
            next += 1;

            while let Some(candidate) = segments.get(next) {
                let coherent = jaccard(&candidate.group.key_terms, &buffer.key_terms)
                    >= opts.semantic_coherence_threshold;
                if buffer.duration() >= opts.target_clip_duration
                    || !coherent
                    || buffer.duration_with(candidate) > opts.max_clip_duration
                {
                    break;
                }
                buffer.absorb(candidate);
                next += 1;
            }

            if buffer.duration() >= opts.min_clip_duration {
                closed.push(buffer);
                continue;
            }

            // Too short: merge into a neighbour. Forward is preferred; backward is used when
            // there is no following segment, or when only the backward merge stays within the
            // maximum.
            let following = segments.get(next);
            let backward_fits = closed
                .last()
                .is_some_and(|previous| buffer.end() - previous.start() <= opts.max_clip_duration);

            match (following, closed.last_mut()) {
                (Some(following), Some(previous))
                    if buffer.duration_with(following) > opts.max_clip_duration
                        && backward_fits =>
                {
                    previous.append(buffer);
                }
                (Some(_), _) => carry = Some(buffer),
                (None, Some(previous)) => {
                    previous.append(buffer);
                    if previous.duration() > opts.max_clip_duration {
                        warn!(
                            start = previous.start(),
                            end = previous.end(),
                            max = opts.max_clip_duration,
                            "short tail merged backwards; clip exceeds maximum duration"
                        );
                    }
                }
                (None, None) => closed.push(buffer),
            }
        }

        let plans: Vec<ClipPlan> = closed
            .into_iter()
            .enumerate()
            .map(|(i, buffer)| buffer.into_plan(u32::try_from(i + 1).unwrap_or(u32::MAX)))
            .collect();

        info!(
            segments = segments.len(),
            clips = plans.len(),
            "consolidated phrase groups into clips"
        );
        plans
    }

    /// Pick one media per clip from the whole pool, scoring the clip's topics and key terms.
    ///
    /// Diversity and topic-continuation rules do not apply here.
    pub fn resolve(
        &self,
        plans: Vec<ClipPlan>,
        matcher: &SemanticMatcher<'_>,
        index: &CandidateIndex<'_>,
    ) -> Result<Vec<ConsolidatedClip>> {
        plans
            .into_iter()
            .map(|plan| {
                let best = matcher.best_match(&plan.match_text(), &plan.key_terms, index)?;
                debug!(
                    clip = plan.id,
                    groups = plan.phrase_groups.len(),
                    duration = plan.duration,
                    media = %best.candidate.id,
                    score = best.score,
                    "resolved clip media"
                );

                Ok(ConsolidatedClip {
                    id: plan.id,
                    start_time: plan.start_time,
                    end_time: plan.end_time,
                    duration: plan.duration,
                    topics: plan.topics,
                    key_terms: plan.key_terms,
                    phrase_groups: plan.phrase_groups,
                    media_id: best.candidate.id.clone(),
                    match_score: best.score,
                    transition: Transition::Crossfade,
                })
            })
            .collect()
    }

    /// [`Self::plan`] followed by [`Self::resolve`].
    pub fn consolidate(
        &self,
        segments: &[MatchedSegment],
        matcher: &SemanticMatcher<'_>,
        index: &CandidateIndex<'_>,
    ) -> Result<Vec<ConsolidatedClip>> {
        self.resolve(self.plan(segments), matcher, index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingEmbedder;
    use crate::matcher::MatcherOpts;
    use crate::media::MediaCandidate;
    use crate::phrase::Phrase;

    fn terms(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|t| t.to_string()).collect()
    }

    fn segment(id: u32, topic: &str, start: f64, end: f64, key_terms: &[&str]) -> MatchedSegment {
        let group = PhraseGroup::new(
            id,
            topic,
            vec![Phrase {
                text: format!("phrase {id}"),
                start_time: start,
                end_time: end,
            }],
            key_terms.iter().map(|t| t.to_string()),
        )
        .expect("one phrase");

        MatchedSegment {
            group,
            media_id: format!("m{id}"),
            match_score: 0.5,
        }
    }

    fn ids(plan: &ClipPlan) -> Vec<u32> {
        plan.phrase_groups.iter().map(|g| g.id).collect()
    }

    fn assert_contiguous_and_exhaustive(plans: &[ClipPlan], segments: &[MatchedSegment]) {
        let flattened: Vec<u32> = plans.iter().flat_map(ids).collect();
        let expected: Vec<u32> = segments.iter().map(|s| s.group.id).collect();
        assert_eq!(flattened, expected);
        for pair in plans.windows(2) {
            assert!(pair[0].end_time <= pair[1].start_time);
        }
    }

    #[test]
    fn jaccard_similarity() {
        assert_eq!(jaccard(&terms(&["a", "b"]), &terms(&["a", "b"])), 1.0);
        assert_eq!(jaccard(&terms(&["a", "b"]), &terms(&["b", "c"])), 1.0 / 3.0);
        assert_eq!(jaccard(&terms(&[]), &terms(&[])), 0.0);
        assert_eq!(jaccard(&terms(&["a"]), &terms(&[])), 0.0);
    }

    #[test]
    fn merges_coherent_groups_up_to_target() {
        let segments: Vec<MatchedSegment> = (0..86)
            .map(|i| {
                let start = f64::from(i);
                segment(i + 1, "light", start, start + 1.0, &["photosynthesis", "light"])
            })
            .collect();

        let plans = Consolidator::default().plan(&segments);

        assert!((10..=14).contains(&plans.len()), "got {} clips", plans.len());
        assert!(plans.iter().all(|p| p.duration <= DEFAULT_MAX_CLIP_DURATION));
        assert!(plans.iter().all(|p| p.duration >= DEFAULT_MIN_CLIP_DURATION));
        assert_eq!(plans[0].duration, 8.0);
        assert_eq!(plans[0].topics, vec!["light".to_string()]);
        assert_contiguous_and_exhaustive(&plans, &segments);
    }

    #[test]
    fn respects_max_duration() {
        let segments: Vec<MatchedSegment> = (0..5)
            .map(|i| {
                let start = f64::from(i) * 5.0;
                segment(i + 1, "test", start, start + 5.0, &["test"])
            })
            .collect();

        let consolidator = Consolidator::new(ConsolidationOpts {
            max_clip_duration: 12.0,
            semantic_coherence_threshold: 0.9,
            ..ConsolidationOpts::default()
        });
        let plans = consolidator.plan(&segments);

        assert_eq!(plans.len(), 3);
        assert!(plans.iter().all(|p| p.duration <= 12.0));
        assert_contiguous_and_exhaustive(&plans, &segments);
    }

    #[test]
    fn incoherent_short_groups_are_forced_together() {
        let segments = vec![
            segment(1, "chlorophyll", 0.0, 2.0, &["chlorophyll", "green"]),
            segment(2, "chlorophyll structure", 2.1, 4.0, &["chlorophyll", "molecule"]),
            segment(3, "photosynthesis", 4.2, 7.0, &["photosynthesis", "light"]),
        ];

        let plans = Consolidator::default().plan(&segments);

        // 1+2 reach the minimum by forced merge; 3 alone is too short and has no successor,
        // so it joins the previous clip.
        assert_eq!(plans.len(), 1);
        assert_eq!(ids(&plans[0]), vec![1, 2, 3]);
        assert_eq!(plans[0].duration, 7.0);
        assert_eq!(
            plans[0].topics,
            vec!["chlorophyll", "chlorophyll structure", "photosynthesis"]
        );
        assert_eq!(
            plans[0].key_terms,
            terms(&["chlorophyll", "green", "light", "molecule", "photosynthesis"])
        );
    }

    #[test]
    fn short_clip_prefers_forward_merge() {
        let segments = vec![
            segment(1, "a", 0.0, 5.0, &["a"]),
            segment(2, "b", 5.0, 6.0, &["b"]),
            segment(3, "c", 6.0, 11.0, &["c"]),
        ];

        let plans = Consolidator::default().plan(&segments);

        assert_eq!(plans.iter().map(ids).collect::<Vec<_>>(), vec![vec![1], vec![2, 3]]);
    }

    #[test]
    fn short_clip_merges_backward_when_forward_would_overflow() {
        let segments = vec![
            segment(1, "a", 0.0, 5.0, &["a"]),
            segment(2, "b", 5.0, 6.0, &["b"]),
            segment(3, "c", 6.0, 30.0, &["c"]),
        ];

        let plans = Consolidator::default().plan(&segments);

        assert_eq!(plans.iter().map(ids).collect::<Vec<_>>(), vec![vec![1, 2], vec![3]]);
    }

    #[test]
    fn short_tail_may_exceed_max_when_merged_backward() {
        let segments = vec![
            segment(1, "a", 0.0, 12.0, &["a"]),
            segment(2, "b", 12.0, 14.0, &["b"]),
        ];

        let consolidator = Consolidator::new(ConsolidationOpts {
            max_clip_duration: 13.0,
            ..ConsolidationOpts::default()
        });
        let plans = consolidator.plan(&segments);

        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].duration, 14.0);
    }

    #[test]
    fn sole_short_segment_stays_short() {
        let segments = vec![segment(1, "a", 0.0, 1.5, &[])];
        let plans = Consolidator::default().plan(&segments);
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].duration, 1.5);
    }

    #[test]
    fn no_clip_is_below_minimum_for_uneven_input() {
        // Mixed durations, no shared key terms: everything is driven by forced merges.
        let durations = [0.7, 3.2, 1.1, 6.5, 0.4, 0.9, 2.2, 9.0, 1.3, 0.5, 4.0, 2.7];
        let mut start = 0.0;
        let segments: Vec<MatchedSegment> = durations
            .iter()
            .enumerate()
            .map(|(i, d)| {
                let id = u32::try_from(i + 1).expect("small");
                let s = segment(id, &format!("t{id}"), start, start + d, &[]);
                start += d + 0.25;
                s
            })
            .collect();

        let plans = Consolidator::default().plan(&segments);

        assert!(plans.len() > 1);
        assert!(plans.iter().all(|p| p.duration >= DEFAULT_MIN_CLIP_DURATION));
        assert_contiguous_and_exhaustive(&plans, &segments);
        for (i, plan) in plans.iter().enumerate() {
            assert_eq!(plan.id as usize, i + 1);
        }
    }

    #[test]
    fn empty_input_yields_no_clips() {
        assert!(Consolidator::default().plan(&[]).is_empty());
    }

    #[test]
    fn resolve_searches_the_whole_pool() -> anyhow::Result<()> {
        let embedder = HashingEmbedder::default();
        let matcher = SemanticMatcher::new(&embedder, MatcherOpts::default());
        let pool = vec![
            MediaCandidate::new("m1", "green leaf closeup", "m1.mp4"),
            MediaCandidate::new("m2", "sunlight through forest", "m2.mp4"),
            MediaCandidate::new("z9", "chlorophyll molecule absorbing sunlight", "z9.mp4"),
        ];
        let index = matcher.index(&pool)?;

        let segments = vec![
            segment(1, "chlorophyll", 0.0, 3.0, &["chlorophyll", "sunlight"]),
            segment(2, "chlorophyll", 3.0, 6.0, &["chlorophyll", "sunlight"]),
        ];

        let clips = Consolidator::default().consolidate(&segments, &matcher, &index)?;

        assert_eq!(clips.len(), 1);
        assert_eq!(clips[0].media_id, "z9");
        assert_eq!(clips[0].transition, Transition::Crossfade);
        assert_eq!(clips[0].phrase_groups.len(), 2);
        assert_eq!(clips[0].phrase_groups[1].phrases[0].text, "phrase 2");
        Ok(())
    }
}
