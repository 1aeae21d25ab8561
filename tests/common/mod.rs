//! Shared test helpers for stencil integration tests.
#![allow(dead_code)]
//!
//! [`TestSite`] owns a temp dir laid out as
//!
//! ```text
//! <tmp>/
//! ├── template/   ← the template source
//! ├── project/    ← the live project being updated
//! └── staging/    ← scratch directory for builds
//! ```
//!
//! and cleans everything up on drop.

use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use tempfile::TempDir;

pub struct TestSite {
    _dir: TempDir,
    root: PathBuf,
}

impl TestSite {
    #[must_use]
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let root = dir.path().to_path_buf();
        for sub in ["template", "project"] {
            std::fs::create_dir_all(root.join(sub)).expect("failed to create dir");
        }
        Self { _dir: dir, root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn template(&self) -> PathBuf {
        self.root.join("template")
    }

    pub fn project(&self) -> PathBuf {
        self.root.join("project")
    }

    pub fn staging(&self) -> PathBuf {
        self.root.join("staging")
    }

    /// Write `(relative path, contents)` pairs under the template.
    pub fn seed_template(&self, files: &[(&str, &str)]) {
        write_all(&self.template(), files);
    }

    /// Write `(relative path, contents)` pairs under the project.
    pub fn seed_project(&self, files: &[(&str, &str)]) {
        write_all(&self.project(), files);
    }

    /// Write the project's `stencil.toml`.
    pub fn write_config(&self, toml: &str) {
        write_all(&self.project(), &[("stencil.toml", toml)]);
    }

    pub fn read_project(&self, rel: &str) -> String {
        std::fs::read_to_string(self.project().join(rel))
            .unwrap_or_else(|e| panic!("failed to read project/{rel}: {e}"))
    }

    pub fn project_has(&self, rel: &str) -> bool {
        self.project().join(rel).exists()
    }

    /// Run `stencil <args> --template <template> --staging <staging>` with
    /// the project path substituted for `{project}`.
    pub fn stencil(&self, args: &[&str]) -> Output {
        self.stencil_with_input(args, "")
    }

    /// Like [`TestSite::stencil`], feeding `input` on stdin.
    pub fn stencil_with_input(&self, args: &[&str], input: &str) -> Output {
        let project = self.project();
        let project = project.to_string_lossy();
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_stencil"));
        cmd.args(args.iter().map(|a| a.replace("{project}", &project)))
            .arg("--template")
            .arg(self.template())
            .env_remove("STENCIL_TEMPLATE")
            .env_remove("STENCIL_LOG")
            .current_dir(&self.root)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .arg("--staging")
            .arg(self.staging());

        let mut child = cmd.spawn().expect("failed to execute stencil");
        if let Some(mut stdin) = child.stdin.take() {
            // The process may exit before reading; a broken pipe is fine.
            let _ = stdin.write_all(input.as_bytes());
        }
        child.wait_with_output().expect("failed to wait for stencil")
    }

    /// Run stencil and assert it succeeds. Returns stdout.
    pub fn stencil_ok(&self, args: &[&str]) -> String {
        let out = self.stencil(args);
        let stdout = String::from_utf8_lossy(&out.stdout).into_owned();
        assert!(
            out.status.success(),
            "stencil {args:?} failed:\nstdout: {stdout}\nstderr: {}",
            String::from_utf8_lossy(&out.stderr)
        );
        stdout
    }
}

impl Default for TestSite {
    fn default() -> Self {
        Self::new()
    }
}

pub fn write_all(root: &Path, files: &[(&str, &str)]) {
    for (rel, contents) in files {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("failed to create parent");
        }
        std::fs::write(&path, contents).expect("failed to write file");
    }
}
