use anyhow::{Context, Result, bail};
use clap::Parser;

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use syncopate::collaborators::StaticPartition;
use syncopate::logging;
use syncopate::media::MediaCandidate;
use syncopate::opts::Opts;
use syncopate::output_type::OutputType;
use syncopate::state::StateDir;
use syncopate::syncopate::{SyncRequest, Syncopate, write_timeline};
use syncopate::word::{AlignedWord, words_from_json};

fn main() -> Result<()> {
    logging::init();
    let params = get_params()?;
    let opts = build_opts(&params)?;

    let words = match &params.words_path {
        Some(path) => read_words(path)?,
        None => Vec::new(),
    };
    let pool = read_pool(&params.media_path)?;
    let facts = match &params.facts_path {
        Some(path) => read_facts(path)?,
        None => Vec::new(),
    };
    let partition = match &params.groups_path {
        Some(path) => Some(
            StaticPartition::from_json_file(path)
                .with_context(|| format!("failed to read topic groups '{}'", path.display()))?,
        ),
        None => None,
    };

    let mut request = SyncRequest::new(&words, &pool).with_facts(&facts);
    if let Some(partition) = &partition {
        request = request.with_collaborator(partition);
    }

    let output_type = opts.output_type;
    let syncopate = Syncopate::new(opts);
    let run = syncopate.plan(&request).context("failed to build timeline")?;

    if let Some(dir) = &params.state_dir {
        let state = StateDir::create(dir)
            .with_context(|| format!("failed to create state dir '{}'", dir.display()))?;
        state
            .save_run(&run)
            .with_context(|| format!("failed to save run records to '{}'", dir.display()))?;
    }

    let timeline = match (params.window_start, params.window_end) {
        (None, None) => run.timeline,
        (start, end) => {
            let start = start.unwrap_or(0.0);
            let end = end.unwrap_or(run.timeline.total_duration);
            if end <= start {
                bail!("window end ({end}) must be after window start ({start})");
            }
            run.timeline.window(start, end)
        }
    };

    let out: Box<dyn Write> = match &params.out_path {
        Some(path) => Box::new(
            File::create(path)
                .with_context(|| format!("failed to create output file '{}'", path.display()))?,
        ),
        None => Box::new(io::stdout().lock()),
    };
    write_timeline(&timeline, out, output_type).context("failed to write timeline")?;

    Ok(())
}

#[derive(Parser, Debug)]
#[command(name = "syncopate")]
#[command(about = "Plan lyric-synchronized shots from word timestamps and a media pool")]
struct Params {
    /// Word timestamps: a JSON array of words or an `{"alignedWords": [...]}` envelope.
    /// Without it, shots are timed sequentially.
    #[arg(short = 'w', long = "words")]
    pub words_path: Option<PathBuf>,

    /// Media candidates as a JSON array.
    #[arg(short = 'm', long = "media")]
    pub media_path: PathBuf,

    /// Pre-computed topic groups (JSON array of `{phrase_indices, topic, key_terms}`).
    #[arg(short = 'g', long = "groups")]
    pub groups_path: Option<PathBuf>,

    /// Domain facts, one per line.
    #[arg(short = 'f', long = "facts")]
    pub facts_path: Option<PathBuf>,

    /// JSON config file; flags below override its values.
    #[arg(short = 'c', long = "config")]
    pub config_path: Option<PathBuf>,

    #[arg(short = 'o', long = "output-type", value_enum)]
    pub output_type: Option<OutputType>,

    /// Write output here instead of stdout.
    #[arg(long = "out")]
    pub out_path: Option<PathBuf>,

    /// Save phrase groups and the timeline into this directory.
    #[arg(long = "state-dir")]
    pub state_dir: Option<PathBuf>,

    #[arg(long = "gap-threshold")]
    pub gap_threshold: Option<f64>,

    #[arg(long = "target-duration")]
    pub target_clip_duration: Option<f64>,

    #[arg(long = "min-duration")]
    pub min_clip_duration: Option<f64>,

    #[arg(long = "max-duration")]
    pub max_clip_duration: Option<f64>,

    #[arg(long = "coherence-threshold")]
    pub semantic_coherence_threshold: Option<f64>,

    /// Cover silence before the first lyric with the first clip.
    #[arg(long = "fill-intro", default_value_t = false)]
    pub fill_intro: bool,

    /// Shot length when no word timestamps are available.
    #[arg(long = "shot-duration")]
    pub shot_duration: Option<f64>,

    /// Song length when no word timestamps are available.
    #[arg(long = "total-duration")]
    pub total_duration: Option<f64>,

    /// Only output the part of the timeline starting here (seconds).
    #[arg(long = "window-start")]
    pub window_start: Option<f64>,

    /// Only output the part of the timeline ending here (seconds).
    #[arg(long = "window-end")]
    pub window_end: Option<f64>,
}

fn get_params() -> Result<Params> {
    Ok(Params::parse())
}

fn build_opts(params: &Params) -> Result<Opts> {
    let mut opts = match &params.config_path {
        Some(path) => Opts::from_json_file(path)
            .with_context(|| format!("failed to read config '{}'", path.display()))?,
        None => Opts::default(),
    };

    if let Some(output_type) = params.output_type {
        opts.output_type = output_type;
    }
    if let Some(v) = params.gap_threshold {
        opts.phrase.gap_threshold = v;
    }
    if let Some(v) = params.target_clip_duration {
        opts.consolidation.target_clip_duration = v;
    }
    if let Some(v) = params.min_clip_duration {
        opts.consolidation.min_clip_duration = v;
    }
    if let Some(v) = params.max_clip_duration {
        opts.consolidation.max_clip_duration = v;
    }
    if let Some(v) = params.semantic_coherence_threshold {
        opts.consolidation.semantic_coherence_threshold = v;
    }
    if params.fill_intro {
        opts.timeline.fill_intro = true;
    }
    if let Some(v) = params.shot_duration {
        opts.sequential.shot_duration = v;
    }
    if params.total_duration.is_some() {
        opts.sequential.total_duration = params.total_duration;
    }

    Ok(opts)
}

fn read_words(path: &Path) -> Result<Vec<AlignedWord>> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read words '{}'", path.display()))?;
    words_from_json(&json).with_context(|| format!("failed to parse words '{}'", path.display()))
}

fn read_pool(path: &Path) -> Result<Vec<MediaCandidate>> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read media '{}'", path.display()))?;
    serde_json::from_str(&json)
        .with_context(|| format!("failed to parse media '{}'", path.display()))
}

fn read_facts(path: &Path) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read facts '{}'", path.display()))?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect())
}
