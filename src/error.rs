use std::error::Error as StdError;

use thiserror::Error;

/// Syncopate's crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Syncopate's crate-wide error type.
///
/// This is intentionally decoupled from `anyhow` so downstream libraries aren't forced to
/// adopt `anyhow` in their own public APIs.
///
/// Not every variant is fatal to a run:
/// - `TimestampUnavailable` is absorbed by [`crate::Syncopate::plan`] (sequential fallback).
/// - `TopicGroupingInvalid` never leaves [`crate::topic::group_phrases`] (local fallback).
/// - `NoCandidates` always reaches the caller.
#[derive(Debug, Error)]
pub enum Error {
    #[error("no word-level timestamps are available for this run")]
    TimestampUnavailable,

    #[error("topic grouping rejected: {0}")]
    TopicGroupingInvalid(String),

    #[error("media candidate pool is empty")]
    NoCandidates,

    #[error("clip {clip_id} starts at {start:.3}s, before the previous clip ends at {previous_end:.3}s")]
    Discontinuous {
        clip_id: u32,
        start: f64,
        previous_end: f64,
    },

    #[error("media '{0}' is not in the candidate pool")]
    UnknownMedia(String),

    #[error("{0}")]
    Message(String),

    #[error(transparent)]
    Other(#[from] Box<dyn StdError + Send + Sync>),
}

impl Error {
    pub(crate) fn msg(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }

    pub(crate) fn invalid_grouping(reason: impl Into<String>) -> Self {
        Self::TopicGroupingInvalid(reason.into())
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Message(format!("{err:#}"))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Other(Box::new(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Other(Box::new(err))
    }
}

impl From<tempfile::PersistError> for Error {
    fn from(err: tempfile::PersistError) -> Self {
        Self::Other(Box::new(err))
    }
}
