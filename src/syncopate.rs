//! High-level API for synchronizing lyrics with media.
//!
//! `Syncopate` wires the stages together: words → phrases → topic groups → matched media →
//! consolidated clips → timeline. Each stage also lives in its own module so it can be driven
//! and tested on its own.

use std::io::{BufWriter, Write};

use tracing::{info, warn};

use crate::Result;
use crate::consolidate::{ConsolidatedClip, Consolidator};
use crate::embedding::{Embedder, HashingEmbedder};
use crate::error::Error;
use crate::json_array_encoder::JsonArrayEncoder;
use crate::matcher::{DiversityWindow, SemanticMatcher};
use crate::media::MediaCandidate;
use crate::opts::Opts;
use crate::output_type::OutputType;
use crate::phrase::{Phrase, segment_phrases};
use crate::sequential::sequential_timeline;
use crate::shot_encoder::ShotEncoder;
use crate::timeline::{Timeline, TimelineBuilder, fade_clip_edges};
use crate::topic::{Grouping, TopicCollaborator, group_phrases};
use crate::vtt_encoder::VttEncoder;
use crate::word::AlignedWord;

/// Everything one run needs from the outside world.
#[derive(Clone, Copy)]
pub struct SyncRequest<'a> {
    pub words: &'a [AlignedWord],
    /// Domain facts handed to the topic collaborator.
    pub facts: &'a [String],
    pub pool: &'a [MediaCandidate],
    pub collaborator: Option<&'a dyn TopicCollaborator>,
}

impl<'a> SyncRequest<'a> {
    pub fn new(words: &'a [AlignedWord], pool: &'a [MediaCandidate]) -> Self {
        Self {
            words,
            facts: &[],
            pool,
            collaborator: None,
        }
    }

    pub fn with_facts(mut self, facts: &'a [String]) -> Self {
        self.facts = facts;
        self
    }

    pub fn with_collaborator(mut self, collaborator: &'a dyn TopicCollaborator) -> Self {
        self.collaborator = Some(collaborator);
        self
    }
}

/// The records produced by one run.
///
/// A sequential run has no phrases, grouping, or clips; only the timeline. The first and last clip
/// fade in and out of the lyrics.
#[derive(Debug, Clone)]
pub struct SyncRun {
    pub phrases: Vec<Phrase>,
    pub grouping: Option<Grouping>,
    pub clips: Vec<ConsolidatedClip>,
    pub timeline: Timeline,
}

/// The main synchronization entry point.
///
/// Holds the embedder (possibly an expensive model) and the options, and can be reused across
/// runs. Each run gets its own diversity window, so runs never influence each other.
pub struct Syncopate<E: Embedder = HashingEmbedder> {
    embedder: E,
    opts: Opts,
}

impl Syncopate<HashingEmbedder> {
    /// Create an instance using the built-in hashing embedder.
    pub fn new(opts: Opts) -> Self {
        Self::with_embedder(HashingEmbedder::default(), opts)
    }
}

impl<E: Embedder> Syncopate<E> {
    pub fn with_embedder(embedder: E, opts: Opts) -> Self {
        Self { embedder, opts }
    }

    pub fn opts(&self) -> &Opts {
        &self.opts
    }

    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    /// Run the full lyric synchronization.
    ///
    /// Fails with [`Error::TimestampUnavailable`] when there are no words and with
    /// [`Error::NoCandidates`] when the pool is empty. Topic grouping problems never fail the run.
    pub fn synchronize(&self, request: &SyncRequest<'_>) -> Result<SyncRun> {
        if request.words.is_empty() {
            return Err(Error::TimestampUnavailable);
        }
        if request.pool.is_empty() {
            return Err(Error::NoCandidates);
        }

        let phrases = segment_phrases(request.words, self.opts.phrase.gap_threshold);
        info!(
            words = request.words.len(),
            phrases = phrases.len(),
            "segmented phrases"
        );

        let grouping = group_phrases(&phrases, request.facts, request.collaborator);

        let matcher = SemanticMatcher::new(&self.embedder, self.opts.matcher);
        let index = matcher.index(request.pool)?;
        let mut window = DiversityWindow::new(self.opts.matcher.diversity_window);
        let matched = matcher.match_groups(&grouping.groups, &index, &mut window)?;

        let mut clips =
            Consolidator::new(self.opts.consolidation).consolidate(&matched, &matcher, &index)?;
        fade_clip_edges(&mut clips);
        let timeline = TimelineBuilder::new(self.opts.timeline).build(&clips, request.pool)?;

        Ok(SyncRun {
            phrases,
            grouping: Some(grouping),
            clips,
            timeline,
        })
    }

    /// Like [`Self::synchronize`], but falls back to fixed-interval shots when no word timestamps
    /// are available. An empty pool still fails.
    pub fn plan(&self, request: &SyncRequest<'_>) -> Result<SyncRun> {
        match self.synchronize(request) {
            Err(Error::TimestampUnavailable) => {
                warn!("no word timestamps; falling back to sequential timing");
                let timeline = sequential_timeline(request.pool, &self.opts.sequential)?;
                Ok(SyncRun {
                    phrases: Vec::new(),
                    grouping: None,
                    clips: Vec::new(),
                    timeline,
                })
            }
            other => other,
        }
    }

    /// Write `timeline` to `w` in the configured output format.
    pub fn write_timeline<W: Write>(&self, timeline: &Timeline, w: W) -> Result<()> {
        write_timeline(timeline, w, self.opts.output_type)
    }
}

/// Write `timeline` to `w` as `output_type`.
pub fn write_timeline<W: Write>(timeline: &Timeline, w: W, output_type: OutputType) -> Result<()> {
    let mut writer = BufWriter::new(w);

    match output_type {
        OutputType::Plan => {
            serde_json::to_writer_pretty(&mut writer, timeline)?;
            writer.write_all(b"\n")?;
            writer.flush()?;
            Ok(())
        }
        OutputType::Shots => {
            let mut encoder = JsonArrayEncoder::new(writer);
            let run_res = write_shots(timeline, &mut encoder);
            merge_run_and_close(run_res, encoder.close())
        }
        OutputType::Vtt => {
            let mut encoder = VttEncoder::new(writer);
            let run_res = write_shots(timeline, &mut encoder);
            merge_run_and_close(run_res, encoder.close())
        }
    }
}

fn write_shots<E: ShotEncoder>(timeline: &Timeline, encoder: &mut E) -> Result<()> {
    for shot in &timeline.shots {
        encoder.write_shot(shot)?;
    }
    Ok(())
}

fn merge_run_and_close(run_res: Result<()>, close_res: Result<()>) -> Result<()> {
    match (run_res, close_res) {
        (Ok(()), Ok(())) => Ok(()),
        (Ok(()), Err(close_err)) => Err(close_err),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(close_err)) => Err(Error::msg(format!(
            "{err} (closing output also failed: {close_err})"
        ))),
    }
}
