use std::path::Path;

use crate::Result;
use crate::phrase::Phrase;
use crate::topic::{GroupSpan, TopicCollaborator};

/// A collaborator that replays a partition computed earlier.
///
/// Useful for re-running a pipeline offline from a saved collaborator reply, and in tests.
/// The partition is returned as-is; validation happens in [`crate::topic::group_phrases`].
#[derive(Debug, Clone, Default)]
pub struct StaticPartition {
    spans: Vec<GroupSpan>,
}

impl StaticPartition {
    pub fn new(spans: Vec<GroupSpan>) -> Self {
        Self { spans }
    }

    /// Load a partition saved as a JSON array of `{phrase_indices, topic, key_terms}` objects.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let spans: Vec<GroupSpan> = serde_json::from_str(&json)?;
        Ok(Self::new(spans))
    }

    pub fn spans(&self) -> &[GroupSpan] {
        &self.spans
    }
}

impl TopicCollaborator for StaticPartition {
    fn partition(&self, _phrases: &[Phrase], _facts: &[String]) -> Result<Vec<GroupSpan>> {
        Ok(self.spans.clone())
    }
}
