//! Topic grouping: phrases → phrase groups.
//!
//! Topic and key-term assignment is delegated to a [`TopicCollaborator`] (typically a language
//! model behind some transport). Whatever it returns is validated before use; if the collaborator
//! is missing, fails, or returns something that is not a contiguous partition of the phrases, we
//! fall back to one group per phrase.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::Result;
use crate::error::Error;
use crate::phrase::Phrase;

/// Number of characters of phrase text kept as the topic of a fallback group.
pub const FALLBACK_TOPIC_CHARS: usize = 30;

/// A contiguous run of phrases that discuss one concept.
///
/// Invariant: `phrases` is non-empty and time-ordered; `start_time`, `end_time` and `duration`
/// are derived from its first and last phrase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhraseGroup {
    pub id: u32,
    pub topic: String,
    pub phrases: Vec<Phrase>,
    pub key_terms: BTreeSet<String>,
    pub start_time: f64,
    pub end_time: f64,
    pub duration: f64,
}

impl PhraseGroup {
    /// Build a group, deriving its bounds from `phrases`.
    ///
    /// Returns `None` when `phrases` is empty.
    pub fn new(
        id: u32,
        topic: impl Into<String>,
        phrases: Vec<Phrase>,
        key_terms: impl IntoIterator<Item = String>,
    ) -> Option<Self> {
        let start_time = phrases.first()?.start_time;
        let end_time = phrases.last()?.end_time;

        Some(Self {
            id,
            topic: topic.into(),
            phrases,
            key_terms: normalize_key_terms(key_terms),
            start_time,
            end_time,
            duration: end_time - start_time,
        })
    }

    /// Text used to embed this group: the topic followed by every phrase.
    pub fn match_text(&self) -> String {
        let mut text = self.topic.clone();
        for phrase in &self.phrases {
            text.push(' ');
            text.push_str(&phrase.text);
        }
        text
    }
}

/// One entry of a collaborator's partition: which phrases belong together and what they are about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSpan {
    /// Zero-based phrase indices covered by this group.
    pub phrase_indices: Vec<usize>,
    pub topic: String,
    #[serde(default)]
    pub key_terms: Vec<String>,
}

/// External text-understanding capability that partitions phrases into topical groups.
///
/// Implementations should not retry internally beyond what their transport already does; any
/// error is treated as "collaborator unavailable" and the local fallback takes over.
pub trait TopicCollaborator {
    /// Partition `phrases` (in order) into contiguous topical groups.
    ///
    /// `facts` are domain facts from the research stage, used as topic vocabulary.
    fn partition(&self, phrases: &[Phrase], facts: &[String]) -> Result<Vec<GroupSpan>>;
}

/// Which strategy produced a [`Grouping`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupingStrategy {
    Collaborator,
    LocalFallback,
}

/// The phrase groups for one run and how they were obtained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grouping {
    pub strategy: GroupingStrategy,
    pub groups: Vec<PhraseGroup>,
}

/// Group `phrases` by topic.
///
/// Uses `collaborator` when one is given and its answer validates; otherwise every phrase becomes
/// its own group. This never fails.
pub fn group_phrases(
    phrases: &[Phrase],
    facts: &[String],
    collaborator: Option<&dyn TopicCollaborator>,
) -> Grouping {
    if phrases.is_empty() {
        return Grouping {
            strategy: GroupingStrategy::LocalFallback,
            groups: Vec::new(),
        };
    }

    let Some(collaborator) = collaborator else {
        info!(phrases = phrases.len(), "no topic collaborator configured; grouping locally");
        return fallback_grouping(phrases);
    };

    match collaborator
        .partition(phrases, facts)
        .and_then(|spans| groups_from_partition(phrases, &spans))
    {
        Ok(groups) => {
            info!(
                phrases = phrases.len(),
                groups = groups.len(),
                "topic collaborator grouping accepted"
            );
            Grouping {
                strategy: GroupingStrategy::Collaborator,
                groups,
            }
        }
        Err(err) => {
            warn!(error = %err, "topic collaborator grouping unusable; grouping locally");
            fallback_grouping(phrases)
        }
    }
}

/// Build phrase groups from a collaborator partition, rejecting anything that is not a
/// contiguous, gap-free, index-ordered partition of `phrases`.
pub fn groups_from_partition(phrases: &[Phrase], spans: &[GroupSpan]) -> Result<Vec<PhraseGroup>> {
    validate_partition(spans, phrases.len())?;

    let mut groups = Vec::with_capacity(spans.len());
    for (i, span) in spans.iter().enumerate() {
        let members = span
            .phrase_indices
            .iter()
            .map(|&idx| phrases[idx].clone())
            .collect();
        let group = PhraseGroup::new(
            group_id(i),
            span.topic.trim(),
            members,
            span.key_terms.iter().cloned(),
        )
        .ok_or_else(|| Error::invalid_grouping(format!("group {} is empty", i + 1)))?;
        groups.push(group);
    }

    Ok(groups)
}

/// Check that `spans` partitions `0..phrase_count` into consecutive, non-empty runs.
pub fn validate_partition(spans: &[GroupSpan], phrase_count: usize) -> Result<()> {
    let mut expected = 0usize;

    for (i, span) in spans.iter().enumerate() {
        if span.phrase_indices.is_empty() {
            return Err(Error::invalid_grouping(format!("group {} has no phrases", i + 1)));
        }

        for &idx in &span.phrase_indices {
            if idx != expected {
                return Err(Error::invalid_grouping(format!(
                    "group {} lists phrase {idx} where phrase {expected} was expected",
                    i + 1
                )));
            }
            expected += 1;
        }
    }

    if expected != phrase_count {
        return Err(Error::invalid_grouping(format!(
            "partition covers {expected} of {phrase_count} phrases"
        )));
    }

    Ok(())
}

/// One group per phrase, topic taken from the phrase text, no key terms.
pub fn fallback_grouping(phrases: &[Phrase]) -> Grouping {
    let groups = phrases
        .iter()
        .enumerate()
        .filter_map(|(i, phrase)| {
            let topic: String = phrase.text.chars().take(FALLBACK_TOPIC_CHARS).collect();
            PhraseGroup::new(group_id(i), topic, vec![phrase.clone()], Vec::new())
        })
        .collect();

    Grouping {
        strategy: GroupingStrategy::LocalFallback,
        groups,
    }
}

fn group_id(index: usize) -> u32 {
    u32::try_from(index + 1).unwrap_or(u32::MAX)
}

/// Key terms are lowercase and unique.
pub(crate) fn normalize_key_terms(terms: impl IntoIterator<Item = String>) -> BTreeSet<String> {
    terms
        .into_iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}
