//! watermark.rs — per-source "already notified" markers and their JSON file.
//!
//! The file is a flat object: `{ "<source key>": 1770048000.0 | ["id", ...] }`.
//! Which shape a key must have is decided by the source's configured
//! [`DedupMode`]; a stored value of the other shape is ignored.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Maximum number of identifiers an id-set watermark keeps.
pub const MAX_SEEN_IDS: usize = 50;
/// How far back a fresh timestamp watermark starts.
pub const FIRST_RUN_LOOKBACK_SECS: f64 = 24.0 * 3600.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupMode {
    #[default]
    Timestamp,
    IdSet,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Watermark {
    /// Last confirmed-seen publish time.
    Timestamp(f64),
    /// Most recently notified ids, oldest first.
    IdSet(VecDeque<String>),
}

impl Watermark {
    /// Fresh watermark for `mode`: 24h before `now`, or no ids.
    pub fn initial(mode: DedupMode, now: f64) -> Self {
        match mode {
            DedupMode::Timestamp => Watermark::Timestamp(now - FIRST_RUN_LOOKBACK_SECS),
            DedupMode::IdSet => Watermark::IdSet(VecDeque::new()),
        }
    }

    /// Whether a stored value can serve a source configured for `mode`.
    fn fits(&self, mode: DedupMode) -> bool {
        match self {
            Watermark::Timestamp(v) => mode == DedupMode::Timestamp && v.is_finite(),
            Watermark::IdSet(_) => mode == DedupMode::IdSet,
        }
    }

    /// Bring an id set back under the cap, dropping the oldest.
    fn bound(mut self) -> Self {
        if let Watermark::IdSet(ids) = &mut self {
            while ids.len() > MAX_SEEN_IDS {
                ids.pop_front();
            }
        }
        self
    }
}

/// Watermarks of every source, loaded once per run and written back once.
#[derive(Debug)]
pub struct WatermarkStore {
    path: PathBuf,
    marks: BTreeMap<String, Watermark>,
    dirty: bool,
}

impl WatermarkStore {
    /// Reads `path`. A missing, unreadable or malformed file yields an empty
    /// store; a single malformed entry is dropped and the rest kept.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let marks = match std::fs::read_to_string(&path) {
            Ok(s) => parse_marks(&s, &path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "no watermark file yet; starting from defaults");
                BTreeMap::new()
            }
            Err(e) => {
                tracing::warn!(error = ?e, path = %path.display(), "watermark file unreadable; using defaults");
                BTreeMap::new()
            }
        };
        Self {
            path,
            marks,
            dirty: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored watermarks keyed by source key.
    pub fn entries(&self) -> &BTreeMap<String, Watermark> {
        &self.marks
    }

    /// Watermark for `key`, or the mode's default when the stored value is
    /// absent or has the wrong shape.
    pub fn get(&self, key: &str, mode: DedupMode) -> Watermark {
        self.get_at(key, mode, crate::ingest::now_ts())
    }

    pub fn get_at(&self, key: &str, mode: DedupMode, now: f64) -> Watermark {
        match self.marks.get(key) {
            Some(w) if w.fits(mode) => w.clone().bound(),
            Some(_) => {
                tracing::warn!(source = key, ?mode, "stored watermark has the wrong shape; using default");
                Watermark::initial(mode, now)
            }
            None => Watermark::initial(mode, now),
        }
    }

    pub fn set(&mut self, key: &str, mark: Watermark) {
        let mark = mark.bound();
        if self.marks.get(key) != Some(&mark) {
            self.marks.insert(key.to_string(), mark);
            self.dirty = true;
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Replace the file with the full mapping: written to a temp file in the
    /// same directory, then renamed over the old one.
    pub fn save(&mut self) -> Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("creating state dir {}", dir.display()))?;

        let body = serde_json::to_vec_pretty(&self.marks).context("serializing watermarks")?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)
            .with_context(|| format!("temp file in {}", dir.display()))?;
        tmp.write_all(&body).context("writing watermarks")?;
        tmp.as_file().sync_all().context("syncing watermarks")?;
        tmp.persist(&self.path)
            .with_context(|| format!("replacing {}", self.path.display()))?;

        self.dirty = false;
        Ok(())
    }
}

fn parse_marks(s: &str, path: &Path) -> BTreeMap<String, Watermark> {
    let raw: BTreeMap<String, serde_json::Value> = match serde_json::from_str(s) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, path = %path.display(), "watermark file malformed; using defaults");
            return BTreeMap::new();
        }
    };
    raw.into_iter()
        .filter_map(|(key, value)| match serde_json::from_value::<Watermark>(value) {
            Ok(w) => Some((key, w)),
            Err(_) => {
                tracing::warn!(source = %key, "dropping unrecognized watermark entry");
                None
            }
        })
        .collect()
}
