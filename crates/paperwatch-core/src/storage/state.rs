//! Persistent identifier → record mapping.
//!
//! The whole store lives in memory and is flushed as one JSON snapshot.
//! Loading never fails: a missing file is an empty store and an unreadable one
//! is set aside and replaced by an empty store.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::error::Result;
use crate::models::{PaperIdentifier, ProcessingRecord, RecordStatus};
use crate::storage::atomic::write_atomic;

pub const STATE_FILE_NAME: &str = ".paperwatch_state.json";
const STATE_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    #[serde(default)]
    records: BTreeMap<PaperIdentifier, ProcessingRecord>,
}

#[derive(Debug)]
pub struct StateStore {
    path: PathBuf,
    records: BTreeMap<PaperIdentifier, ProcessingRecord>,
}

/// Record counts per status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateSummary {
    pub pending: usize,
    pub metadata_ready: usize,
    pub asset_ready: usize,
    pub completed: usize,
    pub failed: usize,
    pub unknown_citations: usize,
}

impl StateSummary {
    pub fn total(&self) -> usize {
        self.pending + self.metadata_ready + self.asset_ready + self.completed + self.failed
    }
}

impl StateStore {
    /// An empty store that will be saved to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            records: BTreeMap::new(),
        }
    }

    /// Read the snapshot at `path`, or start empty if it is absent or corrupt.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no state file yet, starting empty");
                return Self::new(path);
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "state file unreadable, starting empty");
                return Self::new(path);
            }
        };

        match serde_json::from_str::<Snapshot>(&contents) {
            Ok(snapshot) => {
                if snapshot.version != STATE_VERSION {
                    warn!(
                        found = snapshot.version,
                        expected = STATE_VERSION,
                        "state file version differs, loading anyway"
                    );
                }
                debug!(records = snapshot.records.len(), "state loaded");
                Self {
                    path,
                    records: snapshot.records,
                }
            }
            Err(e) => {
                error!(
                    path = %path.display(),
                    error = %e,
                    "state file is corrupt, every link will be reprocessed"
                );
                set_aside(&path);
                Self::new(path)
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, id: &PaperIdentifier) -> Option<&ProcessingRecord> {
        self.records.get(id)
    }

    pub fn upsert(&mut self, id: PaperIdentifier, record: ProcessingRecord) {
        self.records.insert(id, record);
    }

    pub fn records(&self) -> impl Iterator<Item = (&PaperIdentifier, &ProcessingRecord)> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Write the full snapshot atomically.
    pub fn save(&self) -> Result<()> {
        let snapshot = SnapshotRef {
            version: STATE_VERSION,
            records: &self.records,
        };
        let json = serde_json::to_string_pretty(&snapshot)?;
        write_atomic(&self.path, json.as_bytes())
    }

    pub fn summary(&self) -> StateSummary {
        let mut summary = StateSummary::default();
        for record in self.records.values() {
            match record.status {
                RecordStatus::Pending => summary.pending += 1,
                RecordStatus::MetadataReady => summary.metadata_ready += 1,
                RecordStatus::AssetReady => summary.asset_ready += 1,
                RecordStatus::Completed => summary.completed += 1,
                RecordStatus::Failed(_) => summary.failed += 1,
            }
            if record.needs_citations() {
                summary.unknown_citations += 1;
            }
        }
        summary
    }
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    version: u32,
    records: &'a BTreeMap<PaperIdentifier, ProcessingRecord>,
}

fn set_aside(path: &Path) {
    let mut backup = path.as_os_str().to_owned();
    backup.push(".corrupt");
    if let Err(e) = fs::rename(path, &backup) {
        warn!(error = %e, "could not move corrupt state file aside");
    }
}
