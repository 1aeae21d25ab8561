//! Apply a classification to the live project.
//!
//! Only files the [`ApplyPolicy`] selects are copied from staging into the
//! project. `SAME` entries are never touched and nothing is ever deleted.
//! With a [`Confirm`] prompt supplied, the user sees the selected list first
//! and can decline, in which case the project is left exactly as it was.

use std::fmt;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use tracing::info;

use crate::diff::{Classification, FileStatus, filter_by_status};
use crate::staging::copy_file;

// ---------------------------------------------------------------------------
// Policy and outcome
// ---------------------------------------------------------------------------

/// Which statuses get written to the project.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ApplyPolicy {
    pub include_add: bool,
    pub include_changed: bool,
}

impl ApplyPolicy {
    /// New files only. Local edits are never overwritten.
    #[must_use]
    pub const fn additions_only() -> Self {
        Self {
            include_add: true,
            include_changed: false,
        }
    }

    /// New and changed files.
    #[must_use]
    pub const fn force() -> Self {
        Self {
            include_add: true,
            include_changed: true,
        }
    }

    /// Pick the policy for a `--force` flag.
    #[must_use]
    pub const fn from_force(force: bool) -> Self {
        if force {
            Self::force()
        } else {
            Self::additions_only()
        }
    }

    /// Statuses this policy writes.
    #[must_use]
    pub fn statuses(self) -> Vec<FileStatus> {
        let mut out = Vec::with_capacity(2);
        if self.include_add {
            out.push(FileStatus::Add);
        }
        if self.include_changed {
            out.push(FileStatus::Changed);
        }
        out
    }

    /// The subset of `record` this policy would write.
    #[must_use]
    pub fn select(self, record: &Classification) -> Classification {
        filter_by_status(record, &self.statuses())
    }
}

impl Default for ApplyPolicy {
    fn default() -> Self {
        Self::additions_only()
    }
}

/// What [`apply`] did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The policy selected nothing.
    NothingToDo,
    /// The user declined the prompt. No file was written.
    Declined,
    /// These relative paths were written, in sorted order.
    Applied(Vec<String>),
}

impl ApplyOutcome {
    /// Number of files written.
    #[must_use]
    pub fn written(&self) -> usize {
        match self {
            Self::Applied(paths) => paths.len(),
            Self::NothingToDo | Self::Declined => 0,
        }
    }
}

/// Copy failure. Files before `path` in sorted order were already written.
#[derive(Debug)]
pub enum ApplyError {
    Copy {
        path: String,
        source: io::Error,
    },
    Prompt(io::Error),
}

impl fmt::Display for ApplyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Copy { path, source } => write!(f, "failed to write {path}: {source}"),
            Self::Prompt(e) => write!(f, "failed to read confirmation: {e}"),
        }
    }
}

impl std::error::Error for ApplyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Copy { source, .. } => Some(source),
            Self::Prompt(e) => Some(e),
        }
    }
}

// ---------------------------------------------------------------------------
// Confirmation
// ---------------------------------------------------------------------------

/// Asks the user whether to go ahead with a set of writes.
pub trait Confirm {
    /// Show `selected` and return `true` to proceed.
    ///
    /// # Errors
    /// I/O errors talking to the user.
    fn confirm(&mut self, selected: &Classification) -> io::Result<bool>;
}

/// Print `question` followed by `[y/N]` and read one line from stdin.
/// Only `y` or `yes` (any case) counts as agreement.
///
/// # Errors
/// I/O errors on stdout or stdin.
pub fn prompt_yes_no(question: &str) -> io::Result<bool> {
    let mut out = io::stdout().lock();
    write!(out, "{question} [y/N] ")?;
    out.flush()?;
    drop(out);

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(is_affirmative(&line))
}

fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Interactive prompt on stdout/stdin.
#[derive(Debug, Default)]
pub struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&mut self, selected: &Classification) -> io::Result<bool> {
        println!("The following files will be written:");
        for (path, status) in selected {
            println!("  {path}: {status}");
        }
        prompt_yes_no("Continue?")
    }
}

/// Fixed answer, for `--yes` and tests.
#[derive(Debug, Clone, Copy)]
pub struct AutoConfirm(pub bool);

impl Confirm for AutoConfirm {
    fn confirm(&mut self, _selected: &Classification) -> io::Result<bool> {
        Ok(self.0)
    }
}

// ---------------------------------------------------------------------------
// Apply
// ---------------------------------------------------------------------------

/// Write the files `policy` selects from `record`, copying `staging/<key>` to
/// `dest/<key>` and creating parent directories as needed.
///
/// # Errors
/// Prompt I/O errors, or the first failed copy.
pub fn apply(
    record: &Classification,
    staging: &Path,
    dest: &Path,
    policy: ApplyPolicy,
    confirm: Option<&mut dyn Confirm>,
) -> Result<ApplyOutcome, ApplyError> {
    let selected = policy.select(record);
    if selected.is_empty() {
        info!("nothing to apply");
        return Ok(ApplyOutcome::NothingToDo);
    }

    if let Some(prompt) = confirm
        && !prompt.confirm(&selected).map_err(ApplyError::Prompt)?
    {
        info!("apply declined");
        return Ok(ApplyOutcome::Declined);
    }

    let mut written = Vec::with_capacity(selected.len());
    for (key, status) in selected {
        let src: PathBuf = staging.join(&key);
        let dst: PathBuf = dest.join(&key);
        info!(path = %key, %status, "writing");
        copy_file(&src, &dst).map_err(|source| ApplyError::Copy {
            path: key.clone(),
            source,
        })?;
        written.push(key);
    }
    Ok(ApplyOutcome::Applied(written))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    struct Trees {
        staging: tempfile::TempDir,
        project: tempfile::TempDir,
        record: Classification,
    }

    /// staging: index.html (new), css/style.css (changed), same.txt (same).
    /// project: css/style.css, same.txt, notes.txt (local only).
    fn trees() -> Trees {
        let staging = tempfile::tempdir().unwrap();
        let project = tempfile::tempdir().unwrap();
        let s = staging.path();
        let p = project.path();
        std::fs::create_dir_all(s.join("css")).unwrap();
        std::fs::create_dir_all(p.join("css")).unwrap();
        std::fs::write(s.join("index.html"), "<p>new</p>").unwrap();
        std::fs::write(s.join("css/style.css"), "a{color:red}").unwrap();
        std::fs::write(p.join("css/style.css"), "a{color:blue}").unwrap();
        std::fs::write(s.join("same.txt"), "x").unwrap();
        std::fs::write(p.join("same.txt"), "x").unwrap();
        std::fs::write(p.join("notes.txt"), "mine").unwrap();

        let record = crate::diff::diff_trees(s, p).unwrap();
        Trees {
            staging,
            project,
            record,
        }
    }

    fn read(root: &Path, rel: &str) -> String {
        std::fs::read_to_string(root.join(rel)).unwrap()
    }

    #[test]
    fn additions_only_keeps_local_edits() {
        let t = trees();
        let outcome = apply(
            &t.record,
            t.staging.path(),
            t.project.path(),
            ApplyPolicy::additions_only(),
            None,
        )
        .unwrap();
        assert_eq!(outcome, ApplyOutcome::Applied(vec!["index.html".to_owned()]));
        assert_eq!(read(t.project.path(), "index.html"), "<p>new</p>");
        assert_eq!(read(t.project.path(), "css/style.css"), "a{color:blue}");
        assert_eq!(read(t.project.path(), "notes.txt"), "mine");
    }

    #[test]
    fn force_overwrites_changed() {
        let t = trees();
        let outcome = apply(
            &t.record,
            t.staging.path(),
            t.project.path(),
            ApplyPolicy::force(),
            None,
        )
        .unwrap();
        assert_eq!(
            outcome,
            ApplyOutcome::Applied(vec!["css/style.css".to_owned(), "index.html".to_owned()])
        );
        assert_eq!(read(t.project.path(), "css/style.css"), "a{color:red}");
        assert_eq!(read(t.project.path(), "notes.txt"), "mine");
    }

    #[test]
    fn declined_prompt_writes_nothing() {
        let t = trees();
        let mut no = AutoConfirm(false);
        let outcome = apply(
            &t.record,
            t.staging.path(),
            t.project.path(),
            ApplyPolicy::force(),
            Some(&mut no),
        )
        .unwrap();
        assert_eq!(outcome, ApplyOutcome::Declined);
        assert!(!t.project.path().join("index.html").exists());
        assert_eq!(read(t.project.path(), "css/style.css"), "a{color:blue}");
    }

    #[test]
    fn accepted_prompt_applies() {
        let t = trees();
        let mut yes = AutoConfirm(true);
        let outcome = apply(
            &t.record,
            t.staging.path(),
            t.project.path(),
            ApplyPolicy::additions_only(),
            Some(&mut yes),
        )
        .unwrap();
        assert_eq!(outcome.written(), 1);
    }

    #[test]
    fn nothing_selected_skips_prompt() {
        struct Panics;
        impl Confirm for Panics {
            fn confirm(&mut self, _: &Classification) -> io::Result<bool> {
                panic!("prompt shown with nothing to apply")
            }
        }

        let record: Classification = [("same.txt".to_owned(), FileStatus::Same)]
            .into_iter()
            .collect();
        let dir = tempfile::tempdir().unwrap();
        let outcome = apply(
            &record,
            dir.path(),
            dir.path(),
            ApplyPolicy::force(),
            Some(&mut Panics),
        )
        .unwrap();
        assert_eq!(outcome, ApplyOutcome::NothingToDo);
    }

    #[test]
    fn creates_missing_parent_directories() {
        let staging = tempfile::tempdir().unwrap();
        let project = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(staging.path().join("a/b")).unwrap();
        std::fs::write(staging.path().join("a/b/c.txt"), "deep").unwrap();
        let record = crate::diff::diff_trees(staging.path(), project.path()).unwrap();

        apply(
            &record,
            staging.path(),
            project.path(),
            ApplyPolicy::additions_only(),
            None,
        )
        .unwrap();
        assert_eq!(read(project.path(), "a/b/c.txt"), "deep");
    }

    #[test]
    fn missing_staging_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let record: Classification = [("gone.txt".to_owned(), FileStatus::Add)]
            .into_iter()
            .collect();
        let err = apply(
            &record,
            &dir.path().join("staging"),
            &dir.path().join("project"),
            ApplyPolicy::additions_only(),
            None,
        )
        .unwrap_err();
        assert!(err.to_string().contains("gone.txt"));
    }

    #[test]
    fn only_yes_is_affirmative() {
        assert!(is_affirmative("y\n"));
        assert!(is_affirmative(" YES "));
        assert!(!is_affirmative(""));
        assert!(!is_affirmative("n"));
        assert!(!is_affirmative("yep"));
    }

    #[test]
    fn policy_statuses() {
        assert_eq!(ApplyPolicy::additions_only().statuses(), vec![FileStatus::Add]);
        assert_eq!(
            ApplyPolicy::from_force(true).statuses(),
            vec![FileStatus::Add, FileStatus::Changed]
        );
        assert!(
            ApplyPolicy {
                include_add: false,
                include_changed: false
            }
            .select(&trees().record)
            .is_empty()
        );
    }
}
