//! Tree differ: classify every file of a built tree against the live project.
//!
//! [`diff_trees`] walks the source (staging) tree and, for each file, looks at
//! the same relative path under the destination:
//!
//! | destination path | bytes       | status                 |
//! |------------------|-------------|------------------------|
//! | absent           | -           | [`FileStatus::Add`]     |
//! | present          | equal       | [`FileStatus::Same`]    |
//! | present          | different   | [`FileStatus::Changed`] |
//!
//! Only the source side is enumerated. Files that exist solely in the
//! destination never show up in a [`Classification`], which is what keeps the
//! apply step from ever deleting anything.

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::staging::{list_files, relative_key};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Classification of one file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileStatus {
    /// Byte-identical in both trees.
    Same,
    /// Present in the source only.
    Add,
    /// Present in both, contents differ. Applying it overwrites local edits.
    #[serde(rename = "OVERWRITE")]
    Changed,
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Same => write!(f, "SAME"),
            Self::Add => write!(f, "ADD"),
            Self::Changed => write!(f, "OVERWRITE"),
        }
    }
}

/// Relative path (`/`-separated, no leading `/`) → status, sorted by path.
pub type Classification = BTreeMap<String, FileStatus>;

/// Errors from walking or reading either tree.
#[derive(Debug)]
pub struct DiffError {
    pub path: PathBuf,
    pub source: io::Error,
}

impl fmt::Display for DiffError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "diff failed at {}: {}", self.path.display(), self.source)
    }
}

impl std::error::Error for DiffError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

// ---------------------------------------------------------------------------
// Diff
// ---------------------------------------------------------------------------

/// Compare one source file with its destination counterpart.
///
/// # Errors
/// Read errors on either file (a missing destination is not an error).
pub fn compare_file(source: &Path, dest: &Path) -> Result<FileStatus, DiffError> {
    if !dest.exists() {
        return Ok(FileStatus::Add);
    }
    let read = |p: &Path| {
        std::fs::read(p).map_err(|source| DiffError {
            path: p.to_owned(),
            source,
        })
    };
    if read(source)? == read(dest)? {
        Ok(FileStatus::Same)
    } else {
        Ok(FileStatus::Changed)
    }
}

/// Classify every file under `source` against `dest`.
///
/// # Errors
/// Walk or read errors. A missing `dest` root is fine: everything is `Add`.
pub fn diff_trees(source: &Path, dest: &Path) -> Result<Classification, DiffError> {
    let files = list_files(source).map_err(|e| DiffError {
        path: source.to_owned(),
        source: e,
    })?;

    let mut out = Classification::new();
    for file in files {
        let Some(key) = relative_key(source, &file) else {
            continue;
        };
        let status = compare_file(&file, &dest.join(&key))?;
        out.insert(key, status);
    }
    Ok(out)
}

/// Keep only the entries whose status is in `allowed`.
#[must_use]
pub fn filter_by_status(record: &Classification, allowed: &[FileStatus]) -> Classification {
    record
        .iter()
        .filter(|(_, status)| allowed.contains(status))
        .map(|(k, v)| (k.clone(), *v))
        .collect()
}

/// Per-status counts, for summaries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DiffStats {
    pub same: usize,
    pub add: usize,
    pub changed: usize,
}

impl DiffStats {
    #[must_use]
    pub fn of(record: &Classification) -> Self {
        let mut stats = Self::default();
        for status in record.values() {
            match status {
                FileStatus::Same => stats.same += 1,
                FileStatus::Add => stats.add += 1,
                FileStatus::Changed => stats.changed += 1,
            }
        }
        stats
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
