//! 📦 Common data structures: the building blocks every other module passes around.
//!
//! 🎬 COLD OPEN. INT. SERVER CLOSET. 2:13 AM.
//! A list of paths sits in memory. Nobody has touched it since discovery.
//! Nobody will. It is read-only now. It has made peace with that.
//!
//! This module holds the `Manifest` (what to back up), the `WorkUnit`
//! (which slice of it a worker owns), the `RunPrefix` (where in the bucket
//! this run lands), the `KeyStyle` (how paths become object keys), the
//! `UploadOutcome` (what happened to one file), and the `RunContext`
//! (everything a worker may read but never write). 🦆

use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local, TimeZone};
use serde::Deserialize;

use crate::backends::DestinationBackend;
use crate::progress::UploadProgress;

// ============================================================
//  📜 Manifest
// ============================================================

/// 📜 The flat, ordered list of files discovered for this run.
///
/// Cheap to clone: the paths live behind an `Arc<[PathBuf]>`, so every worker
/// can hold the whole manifest and index only its own slice.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    paths: Arc<[PathBuf]>,
}

impl Manifest {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self {
            paths: paths.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// 🔪 The slice of paths covered by a work unit.
    pub(crate) fn slice(&self, unit: &WorkUnit) -> &[PathBuf] {
        &self.paths[unit.range.clone()]
    }
}

impl From<Vec<PathBuf>> for Manifest {
    fn from(paths: Vec<PathBuf>) -> Self {
        Self::new(paths)
    }
}

// ============================================================
//  🧱 WorkUnit
// ============================================================

/// 🧱 A contiguous range of manifest indexes owned by exactly one worker.
///
/// Stored half-open; `first()`/`last()` give the inclusive `[start, end]` view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkUnit {
    pub index: usize,
    pub range: Range<usize>,
}

impl WorkUnit {
    pub fn new(index: usize, range: Range<usize>) -> Self {
        Self { index, range }
    }

    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    pub fn first(&self) -> usize {
        self.range.start
    }

    /// Inclusive end. Meaningless for an empty unit, which the partitioner never makes.
    pub fn last(&self) -> usize {
        self.range.end.saturating_sub(1)
    }
}

// ============================================================
//  ⏰ RunPrefix
// ============================================================

/// ⏰ A timestamp-shaped namespace for every object written in one run.
///
/// Format is `YYYY-MM-DD_HH:MM:SS` in local time. Two runs in different
/// seconds never share a prefix. Two runs in the same second do, and then
/// you have bigger problems than key collisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPrefix(String);

pub(crate) const RUN_PREFIX_FORMAT: &str = "%Y-%m-%d_%H:%M:%S";

impl RunPrefix {
    /// 📸 Capture the prefix right now.
    pub fn now() -> Self {
        Self::from_datetime(&Local::now())
    }

    pub fn from_datetime<Tz: TimeZone>(moment: &DateTime<Tz>) -> Self
    where
        Tz::Offset: std::fmt::Display,
    {
        Self(moment.format(RUN_PREFIX_FORMAT).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RunPrefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================
//  🗝️ KeyStyle
// ============================================================

/// 🗝️ How a source path turns into an object key.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum KeyStyle {
    /// `prefix + path`, glued together as-is. `2026-10-18_02:13:00/home/me/notes.txt`.
    #[default]
    Verbatim,
    /// `prefix + "/" + path` with leading separators trimmed and `\` turned into `/`.
    Nested,
}

impl KeyStyle {
    pub fn object_key(&self, prefix: &RunPrefix, path: &Path) -> String {
        let the_path = path.to_string_lossy();
        match self {
            KeyStyle::Verbatim => format!("{}{}", prefix, the_path),
            KeyStyle::Nested => {
                let the_normalized = the_path.replace('\\', "/");
                format!("{}/{}", prefix, the_normalized.trim_start_matches('/'))
            }
        }
    }
}

// ============================================================
//  🎯 UploadOutcome
// ============================================================

/// 🎯 What happened to one file. Folded into a tally, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Success { bytes: u64 },
    /// The file was there at discovery and gone by upload time.
    SkippedMissing,
    /// Open, stream, commit, or timeout failure. Counted as a failure.
    TransferError { reason: String },
}

// ============================================================
//  🧭 RunContext
// ============================================================

/// 🧭 Immutable per-run state, shared read-only by every worker behind an `Arc`.
#[derive(Debug)]
pub(crate) struct RunContext {
    pub prefix: RunPrefix,
    pub destination: DestinationBackend,
    pub key_style: KeyStyle,
    /// Budget for a single file transfer. Each file gets a fresh one.
    pub transfer_timeout: Duration,
    pub started_at: Instant,
    pub progress: UploadProgress,
}

impl RunContext {
    pub(crate) fn object_key(&self, path: &Path) -> String {
        self.key_style.object_key(&self.prefix, path)
    }
}
