//! Semantic matching: one media candidate per phrase group.
//!
//! Scoring for a (group, candidate) pair:
//! 1. cosine similarity between the group text embedding and the candidate description embedding
//! 2. multiplied by `keyword_boost` once per group key term found in the description
//! 3. minus `diversity_penalty` per occurrence of the candidate in the recent-use window
//!
//! Groups are matched strictly in chronological order because the recent-use window carries
//! state from one group to the next.

use std::collections::{BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::Result;
use crate::embedding::{Embedder, cosine_similarity};
use crate::error::Error;
use crate::media::MediaCandidate;
use crate::topic::PhraseGroup;

pub const DEFAULT_KEYWORD_BOOST: f32 = 2.0;
pub const DEFAULT_DIVERSITY_PENALTY: f32 = 0.1;
pub const DEFAULT_DIVERSITY_WINDOW: usize = 3;

/// Matcher tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherOpts {
    /// Score multiplier applied per matching key term (compounds).
    pub keyword_boost: f32,
    /// Score subtracted per occurrence in the recent-use window.
    pub diversity_penalty: f32,
    /// Number of recent media uses remembered.
    pub diversity_window: usize,
}

impl Default for MatcherOpts {
    fn default() -> Self {
        Self {
            keyword_boost: DEFAULT_KEYWORD_BOOST,
            diversity_penalty: DEFAULT_DIVERSITY_PENALTY,
            diversity_window: DEFAULT_DIVERSITY_WINDOW,
        }
    }
}

/// A phrase group together with the media chosen for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedSegment {
    #[serde(flatten)]
    pub group: PhraseGroup,
    pub media_id: String,
    /// The adjusted score the media was selected with.
    pub match_score: f32,
}

/// Bounded FIFO of recently assigned media ids.
///
/// Owned by one matching run; pass a fresh window per run so runs stay independent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiversityWindow {
    capacity: usize,
    recent: VecDeque<String>,
}

impl DiversityWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            recent: VecDeque::new(),
        }
    }

    /// Seed a window with prior uses, oldest first. Only the newest `capacity` ids are kept.
    pub fn from_recent<I, S>(capacity: usize, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut window = Self::new(capacity);
        for id in ids {
            window.push(id.into());
        }
        window
    }

    /// Record a new use of `media_id`.
    ///
    /// A repeat of the most recent entry is not a new use and leaves the window unchanged.
    pub fn record(&mut self, media_id: &str) {
        if self.most_recent() == Some(media_id) {
            return;
        }
        self.push(media_id.to_owned());
    }

    fn push(&mut self, media_id: String) {
        self.recent.push_back(media_id);
        while self.recent.len() > self.capacity {
            self.recent.pop_front();
        }
    }

    pub fn occurrences(&self, media_id: &str) -> usize {
        self.recent.iter().filter(|id| *id == media_id).count()
    }

    pub fn most_recent(&self) -> Option<&str> {
        self.recent.back().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.recent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recent.is_empty()
    }

    /// Window contents, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.recent.iter().map(String::as_str)
    }
}

/// Candidate pool with description embeddings computed once per run.
pub struct CandidateIndex<'p> {
    pool: &'p [MediaCandidate],
    descriptions: Vec<String>,
    embeddings: Vec<Vec<f32>>,
    // Pool indices sorted by candidate id; iterating in this order makes ties resolve to the
    // smallest id.
    by_id: Vec<usize>,
}

impl<'p> CandidateIndex<'p> {
    pub fn pool(&self) -> &'p [MediaCandidate] {
        self.pool
    }

    pub fn len(&self) -> usize {
        self.pool.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    /// Similarity times keyword boost, before any diversity adjustment.
    fn relevance(
        &self,
        candidate: usize,
        embedding: &[f32],
        key_terms: &BTreeSet<String>,
        boost: f32,
    ) -> f32 {
        let base = cosine_similarity(embedding, &self.embeddings[candidate]);
        base * keyword_boost(key_terms, &self.descriptions[candidate], boost)
    }
}

/// Boost factor for a lowercase description: `multiplier` to the power of the number of key
/// terms it contains.
pub fn keyword_boost(key_terms: &BTreeSet<String>, description_lower: &str, multiplier: f32) -> f32 {
    key_terms
        .iter()
        .filter(|term| description_lower.contains(term.to_lowercase().as_str()))
        .fold(1.0, |boost, _| boost * multiplier)
}

/// A candidate's adjusted score for one group.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateScore<'p> {
    pub candidate: &'p MediaCandidate,
    pub score: f32,
}

/// Assigns media to phrase groups.
pub struct SemanticMatcher<'e> {
    embedder: &'e dyn Embedder,
    opts: MatcherOpts,
}

impl<'e> SemanticMatcher<'e> {
    pub fn new(embedder: &'e dyn Embedder, opts: MatcherOpts) -> Self {
        Self { embedder, opts }
    }

    pub fn opts(&self) -> &MatcherOpts {
        &self.opts
    }

    /// Embed every candidate description in one batch.
    ///
    /// Fails with [`Error::NoCandidates`] for an empty pool.
    pub fn index<'p>(&self, pool: &'p [MediaCandidate]) -> Result<CandidateIndex<'p>> {
        if pool.is_empty() {
            return Err(Error::NoCandidates);
        }

        let texts: Vec<&str> = pool.iter().map(MediaCandidate::embedding_text).collect();
        let embeddings = self.embedder.embed_batch(&texts)?;
        if embeddings.len() != pool.len() {
            return Err(Error::msg(format!(
                "embedder returned {} vectors for {} candidates",
                embeddings.len(),
                pool.len()
            )));
        }

        let mut by_id: Vec<usize> = (0..pool.len()).collect();
        by_id.sort_by(|&a, &b| pool[a].id.cmp(&pool[b].id));

        Ok(CandidateIndex {
            pool,
            descriptions: pool.iter().map(MediaCandidate::keyword_text).collect(),
            embeddings,
            by_id,
        })
    }

    /// Match every group, in order, against `pool` with a fresh diversity window.
    pub fn match_all(
        &self,
        groups: &[PhraseGroup],
        pool: &[MediaCandidate],
    ) -> Result<Vec<MatchedSegment>> {
        let index = self.index(pool)?;
        let mut window = DiversityWindow::new(self.opts.diversity_window);
        self.match_groups(groups, &index, &mut window)
    }

    /// Match every group, in order, updating `window` as media are used.
    ///
    /// When a group has the same topic as the group before it, the previous media may be chosen
    /// again without penalty and the window is left untouched.
    pub fn match_groups(
        &self,
        groups: &[PhraseGroup],
        index: &CandidateIndex<'_>,
        window: &mut DiversityWindow,
    ) -> Result<Vec<MatchedSegment>> {
        let mut matched: Vec<MatchedSegment> = Vec::with_capacity(groups.len());

        for group in groups {
            let continuation = matched
                .last()
                .filter(|previous| previous.group.topic == group.topic)
                .map(|previous| previous.media_id.clone());

            let scores = self.score_group(group, index, window, continuation.as_deref())?;
            let best = select_best(&scores).ok_or(Error::NoCandidates)?;
            let media_id = best.candidate.id.clone();
            let match_score = best.score;

            if continuation.is_none() {
                window.record(&media_id);
            }

            debug!(
                group = group.id,
                topic = %group.topic,
                media = %media_id,
                score = match_score,
                continuation = continuation.is_some(),
                "matched phrase group"
            );

            matched.push(MatchedSegment {
                group: group.clone(),
                media_id,
                match_score,
            });
        }

        info!(groups = matched.len(), candidates = index.len(), "semantic matching done");
        Ok(matched)
    }

    /// Adjusted score of every candidate for `group`, in candidate id order.
    ///
    /// `exempt` names a media id that is not penalized (topic continuation).
    pub fn score_group<'p>(
        &self,
        group: &PhraseGroup,
        index: &CandidateIndex<'p>,
        window: &DiversityWindow,
        exempt: Option<&str>,
    ) -> Result<Vec<CandidateScore<'p>>> {
        let embedding = self.embedder.embed(&group.match_text())?;

        let scores = index
            .by_id
            .iter()
            .map(|&i| {
                let candidate = &index.pool[i];
                let mut score =
                    index.relevance(i, &embedding, &group.key_terms, self.opts.keyword_boost);
                if exempt != Some(candidate.id.as_str()) {
                    score -= self.opts.diversity_penalty * window.occurrences(&candidate.id) as f32;
                }
                CandidateScore { candidate, score }
            })
            .collect();

        Ok(scores)
    }

    /// Best candidate for free text and key terms, ignoring diversity.
    pub fn best_match<'p>(
        &self,
        text: &str,
        key_terms: &BTreeSet<String>,
        index: &CandidateIndex<'p>,
    ) -> Result<CandidateScore<'p>> {
        let embedding = self.embedder.embed(text)?;

        let scores: Vec<CandidateScore<'p>> = index
            .by_id
            .iter()
            .map(|&i| CandidateScore {
                candidate: &index.pool[i],
                score: index.relevance(i, &embedding, key_terms, self.opts.keyword_boost),
            })
            .collect();

        select_best(&scores).cloned().ok_or(Error::NoCandidates)
    }
}

/// Strictly highest score wins; `scores` must already be in id order so the first of equal
/// scores is the smallest id.
fn select_best<'a, 'p>(scores: &'a [CandidateScore<'p>]) -> Option<&'a CandidateScore<'p>> {
    let mut best: Option<&CandidateScore<'p>> = None;
    for score in scores {
        if best.is_none_or(|b| score.score > b.score) {
            best = Some(score);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingEmbedder;
    use crate::phrase::Phrase;

    /// Two-axis embedder: "atp" texts point one way, everything else the other.
    struct AxisEmbedder;

    impl Embedder for AxisEmbedder {
        fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    if t.to_lowercase().contains("atp") {
                        vec![1.0, 0.0]
                    } else {
                        vec![0.0, 1.0]
                    }
                })
                .collect())
        }
    }

    /// Every text embeds to the same vector, so only boosts and penalties differ.
    struct FlatEmbedder;

    impl Embedder for FlatEmbedder {
        fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0, 1.0]).collect())
        }
    }

    fn group(id: u32, topic: &str, text: &str, terms: &[&str]) -> PhraseGroup {
        let start = f64::from(id) * 2.0;
        PhraseGroup::new(
            id,
            topic,
            vec![Phrase {
                text: text.to_string(),
                start_time: start,
                end_time: start + 1.5,
            }],
            terms.iter().map(|t| t.to_string()),
        )
        .expect("one phrase")
    }

    fn pool() -> Vec<MediaCandidate> {
        vec![
            MediaCandidate::new("v1", "ATP synthase rotating", "media/v1.mp4"),
            MediaCandidate::new("v2", "plant cell structure", "media/v2.mp4"),
        ]
    }

    #[test]
    fn keyword_boost_selects_matching_description() -> anyhow::Result<()> {
        let embedder = HashingEmbedder::default();
        let matcher = SemanticMatcher::new(&embedder, MatcherOpts::default());
        let g = group(
            1,
            "ATP synthase molecular motor",
            "ATP synthase spins like a motor",
            &["atp synthase"],
        );

        let pool = pool();
        let matched = matcher.match_all(std::slice::from_ref(&g), &pool)?;

        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].media_id, "v1");

        let text = embedder.embed(&g.match_text())?;
        let desc = embedder.embed("ATP synthase rotating")?;
        let expected = cosine_similarity(&text, &desc) * DEFAULT_KEYWORD_BOOST;
        assert!((matched[0].match_score - expected).abs() < 1e-6);
        assert!(matched[0].match_score > 0.5);
        Ok(())
    }

    #[test]
    fn boosts_compound_per_distinct_term() {
        let terms: BTreeSet<String> = ["atp synthase", "rotating", "chlorophyll"]
            .iter()
            .map(|t| t.to_string())
            .collect();
        assert_eq!(keyword_boost(&terms, "atp synthase rotating", 2.0), 4.0);
        assert_eq!(keyword_boost(&BTreeSet::new(), "anything", 2.0), 1.0);
    }

    #[test]
    fn empty_pool_is_no_candidates() {
        let embedder = HashingEmbedder::default();
        let matcher = SemanticMatcher::new(&embedder, MatcherOpts::default());
        let err = matcher
            .match_all(&[group(1, "t", "x", &[])], &[])
            .unwrap_err();
        assert!(matches!(err, Error::NoCandidates));
    }

    #[test]
    fn enhanced_description_is_embedded_and_searched() -> anyhow::Result<()> {
        let pool = vec![
            MediaCandidate::new("a", "plant cell structure", "media/a.mp4"),
            MediaCandidate::new("x", "stock footage 1234", "media/x.mp4")
                .with_enhanced_description("ATP synthase enzyme rotating"),
        ];

        // Only the enhanced text mentions ATP, so it must be what gets embedded.
        let matcher = SemanticMatcher::new(&AxisEmbedder, MatcherOpts::default());
        let matched = matcher.match_all(&[group(1, "atp", "atp spins", &[])], &pool)?;
        assert_eq!(matched[0].media_id, "x");

        // With identical embeddings only the key-term boost separates them.
        let matcher = SemanticMatcher::new(&FlatEmbedder, MatcherOpts::default());
        let matched =
            matcher.match_all(&[group(1, "t", "x", &["atp synthase"])], &pool)?;
        assert_eq!(matched[0].media_id, "x");
        assert!((matched[0].match_score - DEFAULT_KEYWORD_BOOST).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn huge_window_capacity_does_not_allocate_up_front() -> anyhow::Result<()> {
        let mut window = DiversityWindow::new(usize::MAX);
        window.record("v1");
        window.record("v2");
        assert_eq!(window.len(), 2);

        let matcher = SemanticMatcher::new(&FlatEmbedder, MatcherOpts {
            diversity_window: usize::MAX,
            ..MatcherOpts::default()
        });
        let matched = matcher.match_all(&[group(1, "t", "x", &[])], &pool())?;
        assert_eq!(matched.len(), 1);
        Ok(())
    }

    #[test]
    fn ties_break_by_id_ascending() -> anyhow::Result<()> {
        let matcher = SemanticMatcher::new(&FlatEmbedder, MatcherOpts::default());
        let pool = vec![
            MediaCandidate::new("b", "same", "b.mp4"),
            MediaCandidate::new("a", "same", "a.mp4"),
            MediaCandidate::new("c", "same", "c.mp4"),
        ];
        let matched = matcher.match_all(&[group(1, "t", "x", &[])], &pool)?;
        assert_eq!(matched[0].media_id, "a");
        Ok(())
    }

    #[test]
    fn penalty_grows_with_recent_uses() -> anyhow::Result<()> {
        let matcher = SemanticMatcher::new(&FlatEmbedder, MatcherOpts::default());
        let pool = pool();
        let index = matcher.index(&pool)?;
        let g = group(1, "fresh topic", "x", &[]);

        let score_of_v1 = |window: &DiversityWindow| -> anyhow::Result<f32> {
            let scores = matcher.score_group(&g, &index, window, None)?;
            Ok(scores
                .iter()
                .find(|s| s.candidate.id == "v1")
                .map(|s| s.score)
                .ok_or_else(|| anyhow::anyhow!("v1 missing"))?)
        };

        let unused = score_of_v1(&DiversityWindow::new(3))?;
        let once = score_of_v1(&DiversityWindow::from_recent(3, ["v1"]))?;
        let twice = score_of_v1(&DiversityWindow::from_recent(3, ["v1", "v1"]))?;
        let thrice = score_of_v1(&DiversityWindow::from_recent(3, ["v1", "v1", "v1"]))?;

        assert!(unused > once && once > twice && twice > thrice);
        assert!((unused - thrice - 3.0 * DEFAULT_DIVERSITY_PENALTY).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn diversity_rotates_between_equal_candidates() -> anyhow::Result<()> {
        let matcher = SemanticMatcher::new(&FlatEmbedder, MatcherOpts::default());
        let pool = pool();
        let groups = vec![
            group(1, "one", "x", &[]),
            group(2, "two", "x", &[]),
            group(3, "three", "x", &[]),
        ];

        let matched = matcher.match_all(&groups, &pool)?;
        let ids: Vec<&str> = matched.iter().map(|m| m.media_id.as_str()).collect();
        assert_eq!(ids, vec!["v1", "v2", "v1"]);
        Ok(())
    }

    #[test]
    fn same_topic_continuation_reuses_media_without_penalty() -> anyhow::Result<()> {
        let matcher = SemanticMatcher::new(&AxisEmbedder, MatcherOpts::default());
        let pool = pool();
        let index = matcher.index(&pool)?;
        let mut window = DiversityWindow::new(3);

        let groups = vec![
            group(1, "atp", "atp spins", &[]),
            group(2, "atp", "atp spins again", &[]),
        ];
        let matched = matcher.match_groups(&groups, &index, &mut window)?;

        assert_eq!(matched[0].media_id, "v1");
        assert_eq!(matched[1].media_id, "v1");
        assert_eq!(matched[1].match_score, matched[0].match_score);
        assert_eq!(window.iter().collect::<Vec<_>>(), vec!["v1"]);
        Ok(())
    }

    #[test]
    fn topic_change_applies_penalty() -> anyhow::Result<()> {
        let matcher = SemanticMatcher::new(&AxisEmbedder, MatcherOpts::default());
        let pool = pool();
        let groups = vec![
            group(1, "atp", "atp spins", &[]),
            group(2, "atp motor", "atp spins again", &[]),
        ];

        let matched = matcher.match_all(&groups, &pool)?;

        assert_eq!(matched[1].media_id, "v1");
        assert!((matched[0].match_score - matched[1].match_score - DEFAULT_DIVERSITY_PENALTY).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn window_skips_repeat_of_most_recent_and_evicts_oldest() {
        let mut window = DiversityWindow::new(2);
        window.record("a");
        window.record("a");
        assert_eq!(window.len(), 1);

        window.record("b");
        window.record("c");
        assert_eq!(window.iter().collect::<Vec<_>>(), vec!["b", "c"]);
        assert_eq!(window.occurrences("a"), 0);
    }

    #[test]
    fn best_match_ignores_diversity() -> anyhow::Result<()> {
        let matcher = SemanticMatcher::new(&AxisEmbedder, MatcherOpts::default());
        let pool = pool();
        let index = matcher.index(&pool)?;
        let best = matcher.best_match("plant cells", &BTreeSet::new(), &index)?;
        assert_eq!(best.candidate.id, "v2");
        assert_eq!(best.score, 1.0);
        Ok(())
    }
}
