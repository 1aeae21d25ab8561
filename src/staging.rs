//! Staging area: the scratch tree a build is assembled in.
//!
//! A [`Staging`] value owns one scratch directory. Every run starts with
//! [`Staging::reset`] followed by [`Staging::populate`], so the tree a
//! transform sees is always a complete copy of the template, never a partial
//! one. Nothing here ever touches the live project.
//!
//! # Directory layout
//!
//! ```text
//! <staging root>/
//! ├── stencil.toml        ← copy of the project's config (hooks may edit it)
//! ├── template-tools/     ← helper scripts for hooks, removed after build
//! └── ...                 ← template files, transformed in place
//! ```

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors from staging area operations.
#[derive(Debug)]
pub enum StagingError {
    /// The template source to copy from does not exist.
    MissingSource { path: PathBuf },
    /// A cleanup glob pattern is malformed.
    BadPattern { pattern: String, reason: String },
    /// An I/O error occurred.
    Io { path: PathBuf, source: io::Error },
}

impl fmt::Display for StagingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSource { path } => {
                write!(f, "template source '{}' does not exist", path.display())
            }
            Self::BadPattern { pattern, reason } => {
                write!(f, "invalid cleanup pattern '{pattern}': {reason}")
            }
            Self::Io { path, source } => write!(f, "{}: {source}", path.display()),
        }
    }
}

impl std::error::Error for StagingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> StagingError + '_ {
    move |source| StagingError::Io {
        path: path.to_owned(),
        source,
    }
}

// ---------------------------------------------------------------------------
// Filesystem helpers
// ---------------------------------------------------------------------------

/// Remove a file or directory tree. A missing path counts as success.
///
/// # Errors
/// Any I/O error other than `NotFound`.
pub fn remove_path(path: &Path) -> io::Result<()> {
    let result = match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(path),
        Ok(_) => std::fs::remove_file(path),
        Err(e) => Err(e),
    };
    match result {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// Copy one file, creating missing parent directories. Permissions are
/// carried over by `std::fs::copy`.
///
/// # Errors
/// Any I/O error from creating the parent or copying.
pub fn copy_file(src: &Path, dst: &Path) -> io::Result<()> {
    if let Some(parent) = dst.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::copy(src, dst)?;
    Ok(())
}

/// Path of `path` relative to `base`, with `/` separators and no leading
/// separator. Returns `None` when `path` is not under `base`.
#[must_use]
pub fn relative_key(base: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(base).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// Every regular file under `root`, sorted by path.
///
/// # Errors
/// Any error raised while walking.
pub fn list_files(root: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(io::Error::other)?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

// ---------------------------------------------------------------------------
// Staging
// ---------------------------------------------------------------------------

/// Handle on one scratch directory.
///
/// Concurrent runs must use distinct roots; the handle does no locking.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Staging {
    root: PathBuf,
}

impl Staging {
    /// Create a handle for `root`. Nothing is touched on disk.
    #[must_use]
    pub const fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Handle on `$TMPDIR/stencil-staging`.
    #[must_use]
    pub fn default_location() -> Self {
        Self::new(std::env::temp_dir().join("stencil-staging"))
    }

    /// The staging root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of `rel` inside staging.
    #[must_use]
    pub fn path(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    /// Delete the staging root (if any) and recreate it empty.
    ///
    /// # Errors
    /// I/O errors other than the root not existing.
    pub fn reset(&self) -> Result<(), StagingError> {
        remove_path(&self.root).map_err(io_err(&self.root))?;
        std::fs::create_dir_all(&self.root).map_err(io_err(&self.root))?;
        debug!(root = %self.root.display(), "staging reset");
        Ok(())
    }

    /// Recursively copy `source` into the staging root.
    ///
    /// Directory structure and file permissions are preserved. Symlinked
    /// files are copied by content.
    ///
    /// # Errors
    /// [`StagingError::MissingSource`] if `source` does not exist, otherwise
    /// the first I/O error.
    pub fn populate(&self, source: &Path) -> Result<usize, StagingError> {
        if !source.is_dir() {
            return Err(StagingError::MissingSource {
                path: source.to_owned(),
            });
        }

        let mut copied = 0;
        for entry in WalkDir::new(source).follow_links(true).sort_by_file_name() {
            let entry = entry.map_err(|e| StagingError::Io {
                path: e.path().unwrap_or(source).to_owned(),
                source: io::Error::other(e.to_string()),
            })?;
            let Ok(rel) = entry.path().strip_prefix(source) else {
                continue;
            };
            let dest = self.root.join(rel);
            if entry.file_type().is_dir() {
                std::fs::create_dir_all(&dest).map_err(io_err(&dest))?;
                let perms = entry.metadata().map_err(|e| StagingError::Io {
                    path: entry.path().to_owned(),
                    source: io::Error::other(e.to_string()),
                })?;
                std::fs::set_permissions(&dest, perms.permissions()).map_err(io_err(&dest))?;
            } else {
                copy_file(entry.path(), &dest).map_err(io_err(&dest))?;
                copied += 1;
            }
        }
        debug!(source = %source.display(), files = copied, "staging populated");
        Ok(copied)
    }

    /// Copy a single outside file into staging at `rel`.
    ///
    /// Returns `false` (and copies nothing) when `src` does not exist.
    ///
    /// # Errors
    /// I/O errors from the copy.
    pub fn copy_in(&self, src: &Path, rel: &str) -> Result<bool, StagingError> {
        if !src.is_file() {
            return Ok(false);
        }
        let dest = self.path(rel);
        copy_file(src, &dest).map_err(io_err(&dest))?;
        Ok(true)
    }

    /// Remove `rel` (file or directory) from staging. Missing is fine.
    ///
    /// # Errors
    /// I/O errors other than `NotFound`.
    pub fn remove(&self, rel: &str) -> Result<(), StagingError> {
        let path = self.path(rel);
        remove_path(&path).map_err(io_err(&path))
    }

    /// Remove every entry whose relative path matches one of `patterns`.
    ///
    /// Returns the removed relative paths, sorted.
    ///
    /// # Errors
    /// [`StagingError::BadPattern`] for an invalid glob, or an I/O error.
    pub fn clean(&self, patterns: &[String]) -> Result<Vec<String>, StagingError> {
        let compiled = patterns
            .iter()
            .map(|p| {
                glob::Pattern::new(p).map_err(|e| StagingError::BadPattern {
                    pattern: p.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        if compiled.is_empty() {
            return Ok(Vec::new());
        }

        let mut removed = Vec::new();
        let mut walker = WalkDir::new(&self.root).min_depth(1).sort_by_file_name().into_iter();
        while let Some(entry) = walker.next() {
            let entry = entry.map_err(|e| StagingError::Io {
                path: self.root.clone(),
                source: io::Error::other(e.to_string()),
            })?;
            let Some(key) = relative_key(&self.root, entry.path()) else {
                continue;
            };
            if compiled.iter().any(|p| p.matches(&key)) {
                if entry.file_type().is_dir() {
                    walker.skip_current_dir();
                }
                remove_path(entry.path()).map_err(io_err(entry.path()))?;
                debug!(path = %key, "removed cache entry");
                removed.push(key);
            }
        }
        Ok(removed)
    }

    /// Every regular file currently in staging, sorted.
    ///
    /// # Errors
    /// Any error raised while walking.
    pub fn files(&self) -> Result<Vec<PathBuf>, StagingError> {
        list_files(&self.root).map_err(io_err(&self.root))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
