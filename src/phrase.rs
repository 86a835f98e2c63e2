use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::word::AlignedWord;

/// Default silence (seconds) that separates two phrases.
pub const DEFAULT_GAP_THRESHOLD: f64 = 0.3;

/// A run of consecutive words sung without a pause longer than the gap threshold.
///
/// Phrases are also the caption unit: their timing is carried through to the final shot list
/// untouched, so captions can change more often than the video cuts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phrase {
    pub text: String,
    pub start_time: f64,
    pub end_time: f64,
}

impl Phrase {
    fn from_words(words: &[AlignedWord]) -> Self {
        let text = words
            .iter()
            .map(|w| w.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        // Callers only pass non-empty runs.
        let start_time = words.first().map_or(0.0, |w| w.start_time);
        let end_time = words.last().map_or(0.0, |w| w.end_time);

        Self {
            text,
            start_time,
            end_time,
        }
    }

    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }
}

/// Split a time-ordered word list into phrases.
///
/// A phrase closes when the silence between a word's end and the next word's start is strictly
/// greater than `gap_threshold`. A gap exactly equal to the threshold keeps the words together.
pub fn segment_phrases(words: &[AlignedWord], gap_threshold: f64) -> Vec<Phrase> {
    phrase_ranges(words, gap_threshold)
        .into_iter()
        .map(|range| Phrase::from_words(&words[range]))
        .collect()
}

/// Word index ranges for each phrase. The ranges are contiguous and cover `0..words.len()`.
pub(crate) fn phrase_ranges(words: &[AlignedWord], gap_threshold: f64) -> Vec<Range<usize>> {
    let mut ranges = Vec::new();
    let mut start = 0;

    for (i, pair) in words.windows(2).enumerate() {
        let gap = pair[1].start_time - pair[0].end_time;
        if gap > gap_threshold {
            ranges.push(start..i + 1);
            start = i + 1;
        }
    }

    if start < words.len() {
        ranges.push(start..words.len());
    }

    ranges
}
