use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::Result;
use crate::consolidate::ConsolidationOpts;
use crate::matcher::MatcherOpts;
use crate::output_type::OutputType;
use crate::phrase::DEFAULT_GAP_THRESHOLD;
use crate::sequential::SequentialOpts;
use crate::timeline::TimelineOpts;

/// Phrase segmentation options.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhraseOpts {
    /// Silence between two words (seconds) above which a new phrase starts.
    pub gap_threshold: f64,
}

impl Default for PhraseOpts {
    fn default() -> Self {
        Self {
            gap_threshold: DEFAULT_GAP_THRESHOLD,
        }
    }
}

/// Options that control a synchronization run.
///
/// This struct is *library-level configuration*, not CLI flags. The CLI maps its flags onto it,
/// and other frontends (tests, batch jobs) construct it directly or load it from JSON. Every
/// field has a default, so a config file only needs to name what it overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Opts {
    pub phrase: PhraseOpts,
    pub matcher: MatcherOpts,
    pub consolidation: ConsolidationOpts,
    pub timeline: TimelineOpts,
    pub sequential: SequentialOpts,

    /// The desired output format.
    pub output_type: OutputType,
}

impl Opts {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}
