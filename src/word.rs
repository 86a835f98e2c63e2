use serde::{Deserialize, Serialize};

/// A single sung word with its position in the song, as delivered by the word-timestamp service.
///
/// The service spells its fields `word`, `startS` and `endS`; we accept those names on input so
/// its payload can be deserialized directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignedWord {
    /// Word text.
    #[serde(alias = "word")]
    pub text: String,
    /// Start time in seconds.
    #[serde(alias = "startS")]
    pub start_time: f64,
    /// End time in seconds.
    #[serde(alias = "endS")]
    pub end_time: f64,
}

impl AlignedWord {
    pub fn new(text: impl Into<String>, start_time: f64, end_time: f64) -> Self {
        Self {
            text: text.into(),
            start_time,
            end_time,
        }
    }
}

/// The envelope the word-timestamp service wraps its word list in.
#[derive(Debug, Deserialize)]
struct AlignedLyrics {
    #[serde(rename = "alignedWords")]
    aligned_words: Vec<AlignedWord>,
}

/// Parse word timestamps from JSON.
///
/// Accepts either a bare array of words or the service envelope `{"alignedWords": [...]}`.
pub fn words_from_json(json: &str) -> crate::Result<Vec<AlignedWord>> {
    let value: serde_json::Value = serde_json::from_str(json)?;
    if value.is_array() {
        return Ok(serde_json::from_value(value)?);
    }

    let envelope: AlignedLyrics = serde_json::from_value(value)?;
    Ok(envelope.aligned_words)
}
