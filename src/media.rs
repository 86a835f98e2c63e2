use std::path::Path;

use serde::{Deserialize, Serialize};

/// Kind of downloaded media.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Video,
    Gif,
}

impl MediaType {
    /// Guess the media type from a file extension. Anything that is not a GIF is treated as video.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let is_gif = path
            .as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("gif"));

        if is_gif { Self::Gif } else { Self::Video }
    }
}

/// An already-downloaded clip that may be placed on the timeline.
///
/// The pool is read-only for the whole run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawCandidate")]
pub struct MediaCandidate {
    pub id: String,
    pub description: String,
    pub local_path: String,
    pub media_type: MediaType,
    /// Richer description from an upstream video-model analysis, when one was run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enhanced_description: Option<String>,
}

impl MediaCandidate {
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        local_path: impl Into<String>,
    ) -> Self {
        let local_path = local_path.into();
        Self {
            id: id.into(),
            description: description.into(),
            media_type: MediaType::from_path(&local_path),
            local_path,
            enhanced_description: None,
        }
    }

    pub fn with_enhanced_description(mut self, enhanced: impl Into<String>) -> Self {
        self.enhanced_description = Some(enhanced.into());
        self
    }

    /// Text to embed: the enhanced description when present and non-empty, else the description.
    pub fn embedding_text(&self) -> &str {
        match self.enhanced_description.as_deref() {
            Some(enhanced) if !enhanced.trim().is_empty() => enhanced,
            _ => &self.description,
        }
    }

    /// Lowercase text searched for key terms: enhanced and stock descriptions together.
    pub fn keyword_text(&self) -> String {
        let enhanced = self.enhanced_description.as_deref().unwrap_or_default();
        format!("{enhanced} {}", self.description).to_lowercase()
    }
}

/// Wire form of a candidate: `media_type` may be omitted, and the curation stage names the
/// description `description_text` in some records.
#[derive(Deserialize)]
struct RawCandidate {
    id: String,
    #[serde(alias = "description_text", alias = "descriptionText")]
    description: String,
    #[serde(default, alias = "localPath")]
    local_path: String,
    #[serde(default, alias = "mediaType")]
    media_type: Option<MediaType>,
    #[serde(default, alias = "enhancedDescription")]
    enhanced_description: Option<String>,
}

impl From<RawCandidate> for MediaCandidate {
    fn from(raw: RawCandidate) -> Self {
        let media_type = raw
            .media_type
            .unwrap_or_else(|| MediaType::from_path(&raw.local_path));

        Self {
            id: raw.id,
            description: raw.description,
            local_path: raw.local_path,
            media_type,
            enhanced_description: raw.enhanced_description,
        }
    }
}
