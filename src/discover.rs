//! Project discovery and git checks for batch updates.
//!
//! A project is any directory that contains a `stencil.toml`. Batch mode
//! walks a search root, updates each project in turn, and by default skips
//! projects whose git work tree has uncommitted changes so an update never
//! mixes with unrelated edits.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;
use walkdir::WalkDir;

use crate::config::CONFIG_FILE_NAME;

/// Every directory under `root` (including `root`) holding a config file,
/// sorted. Directories in `exclude` (compared after canonicalization) are not
/// reported, though their subdirectories still are. `.git` is never entered.
///
/// # Errors
/// Walk errors, or a `root` that cannot be canonicalized.
pub fn find_projects(root: &Path, exclude: &[PathBuf]) -> io::Result<Vec<PathBuf>> {
    let exclude: Vec<PathBuf> = exclude
        .iter()
        .filter_map(|p| std::fs::canonicalize(p).ok())
        .collect();
    let root = std::fs::canonicalize(root)?;

    let mut projects = Vec::new();
    let walker = WalkDir::new(&root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.file_name() != ".git");
    for entry in walker {
        let entry = entry.map_err(|e| io::Error::other(e.to_string()))?;
        if !entry.file_type().is_dir() || !entry.path().join(CONFIG_FILE_NAME).is_file() {
            continue;
        }
        let dir = entry.into_path();
        if exclude.contains(&dir) {
            debug!(path = %dir.display(), "skipping excluded directory");
            continue;
        }
        projects.push(dir);
    }
    Ok(projects)
}

// ---------------------------------------------------------------------------
// Git
// ---------------------------------------------------------------------------

/// State of the git work tree a project lives in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GitState {
    /// No uncommitted or untracked changes.
    Clean,
    /// Paths reported by `git status --porcelain`.
    Dirty(Vec<String>),
    /// Not inside a git work tree (or git is unavailable).
    NotARepo,
}

impl GitState {
    /// Whether an update may proceed without `--allow-dirty`.
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        matches!(self, Self::Clean | Self::NotARepo)
    }
}

/// Inspect the work tree containing `dir`.
///
/// # Errors
/// Only if `git` is found but its output cannot be read.
pub fn git_state(dir: &Path) -> io::Result<GitState> {
    let output = match Command::new("git")
        .args(["status", "--porcelain"])
        .current_dir(dir)
        .output()
    {
        Ok(o) => o,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(GitState::NotARepo),
        Err(e) => return Err(e),
    };
    if !output.status.success() {
        return Ok(GitState::NotARepo);
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let paths: Vec<String> = stdout
        .lines()
        .filter(|line| line.len() >= 4)
        .map(|line| {
            let path = &line[3..];
            path.strip_prefix('"')
                .and_then(|s| s.strip_suffix('"'))
                .unwrap_or(path)
                .to_owned()
        })
        .collect();
    if paths.is_empty() {
        Ok(GitState::Clean)
    } else {
        Ok(GitState::Dirty(paths))
    }
}

/// Stage everything under `dir` and commit it with `message`.
///
/// Returns `false` when there was nothing to commit.
///
/// # Errors
/// A git command that fails to start or exits non-zero.
pub fn commit_all(dir: &Path, message: &str) -> io::Result<bool> {
    if git_state(dir)?.is_clean() {
        return Ok(false);
    }
    git(dir, &["add", "--all", "."])?;
    git(dir, &["commit", "--quiet", "-m", message])?;
    Ok(true)
}

fn git(dir: &Path, args: &[&str]) -> io::Result<()> {
    let output = Command::new("git").args(args).current_dir(dir).output()?;
    if output.status.success() {
        Ok(())
    } else {
        Err(io::Error::other(format!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch_config(dir: &Path) {
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(dir.join(CONFIG_FILE_NAME), "").unwrap();
    }

    #[test]
    fn finds_projects_and_skips_excluded() {
        let root = tempfile::tempdir().unwrap();
        touch_config(&root.path().join("sites/a"));
        touch_config(&root.path().join("sites/b"));
        touch_config(&root.path().join("template"));
        touch_config(&root.path().join(".git/nested"));
        std::fs::create_dir_all(root.path().join("empty")).unwrap();

        let found = find_projects(root.path(), &[root.path().join("template")]).unwrap();
        let canon = std::fs::canonicalize(root.path()).unwrap();
        assert_eq!(found, vec![canon.join("sites/a"), canon.join("sites/b")]);
    }

    #[test]
    fn root_itself_can_be_a_project() {
        let root = tempfile::tempdir().unwrap();
        touch_config(root.path());
        let found = find_projects(root.path(), &[]).unwrap();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn missing_root_is_an_error() {
        assert!(find_projects(Path::new("/definitely/not/here"), &[]).is_err());
    }

    fn git_init(dir: &Path) {
        for args in [
            &["init", "--quiet"][..],
            &["config", "user.email", "test@example.com"][..],
            &["config", "user.name", "test"][..],
            &["config", "commit.gpgsign", "false"][..],
        ] {
            git(dir, args).unwrap();
        }
    }

    #[test]
    fn git_state_tracks_changes_and_commit() {
        let dir = tempfile::tempdir().unwrap();
        git_init(dir.path());
        assert_eq!(git_state(dir.path()).unwrap(), GitState::Clean);

        std::fs::write(dir.path().join("a.txt"), "1").unwrap();
        assert_eq!(
            git_state(dir.path()).unwrap(),
            GitState::Dirty(vec!["a.txt".to_owned()])
        );

        assert!(commit_all(dir.path(), "update").unwrap());
        assert_eq!(git_state(dir.path()).unwrap(), GitState::Clean);
        assert!(!commit_all(dir.path(), "again").unwrap());
    }

    #[test]
    fn only_dirty_blocks_an_update() {
        assert!(GitState::Clean.is_clean());
        assert!(GitState::NotARepo.is_clean());
        assert!(!GitState::Dirty(vec!["x".to_owned()]).is_clean());
    }
}
