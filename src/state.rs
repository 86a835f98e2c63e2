//! Inspectable per-stage records on disk.
//!
//! Records are written to a temp file in the target directory and renamed into place, so a
//! reader never sees a half-written file.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::Result;
use crate::syncopate::SyncRun;
use crate::timeline::Timeline;
use crate::topic::Grouping;

pub const PHRASE_GROUPS_FILE: &str = "phrase_groups.json";
pub const TIMELINE_FILE: &str = "synchronized_plan.json";

/// A directory holding the records of one run.
#[derive(Debug, Clone)]
pub struct StateDir {
    root: PathBuf,
}

impl StateDir {
    /// Open `root`, creating it if needed.
    pub fn create(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn save_grouping(&self, grouping: &Grouping) -> Result<PathBuf> {
        self.write_json(PHRASE_GROUPS_FILE, grouping)
    }

    pub fn load_grouping(&self) -> Result<Grouping> {
        self.read_json(PHRASE_GROUPS_FILE)
    }

    pub fn save_timeline(&self, timeline: &Timeline) -> Result<PathBuf> {
        self.write_json(TIMELINE_FILE, timeline)
    }

    pub fn load_timeline(&self) -> Result<Timeline> {
        self.read_json(TIMELINE_FILE)
    }

    /// Save every record `run` produced. Sequential runs have no grouping to save.
    pub fn save_run(&self, run: &SyncRun) -> Result<()> {
        if let Some(grouping) = &run.grouping {
            self.save_grouping(grouping)?;
        }
        self.save_timeline(&run.timeline)?;
        Ok(())
    }

    fn write_json<T: Serialize>(&self, name: &str, value: &T) -> Result<PathBuf> {
        let path = self.root.join(name);
        write_json_atomic(&path, value)?;
        debug!(path = %path.display(), "saved record");
        Ok(path)
    }

    fn read_json<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let json = fs::read_to_string(self.root.join(name))?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// Write `value` as pretty JSON to `path`, replacing any existing file atomically.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let tmp = NamedTempFile::new_in(dir)?;
    {
        let mut w = BufWriter::new(tmp.as_file());
        serde_json::to_writer_pretty(&mut w, value)?;
        w.write_all(b"\n")?;
        w.flush()?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path)?;
    Ok(())
}
