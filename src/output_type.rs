use serde::{Deserialize, Serialize};

/// The supported output formats for a finished timeline.
///
/// With the `cli` feature this doubles as a `clap` value enum, so the same type backs both the
/// `-o` flag and config files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum OutputType {
    /// The whole timeline as one pretty-printed JSON document.
    #[default]
    Plan,

    /// Shots only, streamed as a JSON array.
    Shots,

    /// Phrase captions in WebVTT format.
    Vtt,
}
