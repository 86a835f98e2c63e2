//! `syncopate`: lyric-synchronized shot planning.
//!
//! This crate turns word-level lyric timestamps and a pool of pre-downloaded media into a
//! continuous shot list for a video renderer:
//! - Phrase segmentation on silence gaps
//! - Topic grouping through a pluggable collaborator, with a local fallback
//! - Semantic media matching with keyword boosts and a diversity penalty
//! - Clip consolidation toward a target cut length
//! - Timeline building, sequential fallback timing, and caption/shot encoders
//!
//! Every stage is deterministic given its inputs and carries no global state, so independent runs
//! can proceed side by side.

// High-level API (most consumers should start here).
pub mod opts;
pub mod syncopate;

// Pipeline stages, in order.
pub mod word;
pub mod phrase;
pub mod topic;
pub mod collaborators;
pub mod embedding;
pub mod media;
pub mod matcher;
pub mod consolidate;
pub mod timeline;
pub mod sequential;

// Output selection and encoder interfaces.
pub mod output_type;
pub mod shot_encoder;

// Output encoders that serialize shots into various formats.
pub mod json_array_encoder;
pub mod vtt_encoder;

// Persisted intermediate records.
pub mod state;

pub mod error;

// Logging configuration and control.
#[cfg(feature = "logging")]
pub mod logging;

pub use error::{Error, Result};
pub use opts::Opts;
pub use output_type::OutputType;
pub use syncopate::{SyncRequest, SyncRun, Syncopate};
