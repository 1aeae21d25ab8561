//! Pre-/post-build hook execution.
//!
//! Hooks are shell command strings from `stencil.toml`. Each one runs via
//! `sh -c` with its working directory set to the staging root, after the
//! literal [`PROJECT_TOKEN`] has been replaced with the absolute path of the
//! live project. Output is not captured: the operator sees it as it happens,
//! on stderr, so stdout stays reserved for stencil's own summaries.
//!
//! The stencil process never changes its own working directory. Commands get
//! an explicit `current_dir`, so there is nothing to restore when a command
//! fails halfway through a list.
//!
//! # Failure policy
//!
//! | `hooks.on_failure` | non-zero exit                         |
//! |--------------------|---------------------------------------|
//! | `warn` (default)   | logged, next command runs             |
//! | `abort`            | [`HookError::Failed`], run stops      |
//!
//! Failing to spawn the shell at all is always an error.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use std::time::Instant;

use tracing::{info, warn};

use crate::config::OnFailure;

/// Placeholder replaced with the live project's absolute path.
pub const PROJECT_TOKEN: &str = "<PROJECT>";

// ---------------------------------------------------------------------------
// CommandRunner
// ---------------------------------------------------------------------------

/// Exit information for one external command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommandStatus {
    /// Process exit code, `None` if killed by a signal.
    pub code: Option<i32>,
}

impl CommandStatus {
    /// A successful exit.
    pub const SUCCESS: Self = Self { code: Some(0) };

    /// Returns `true` for exit code 0.
    #[must_use]
    pub const fn success(self) -> bool {
        matches!(self.code, Some(0))
    }
}

impl From<ExitStatus> for CommandStatus {
    fn from(status: ExitStatus) -> Self {
        Self {
            code: status.code(),
        }
    }
}

/// Seam for running external processes.
///
/// The hook runner and the `sass` rule go through this trait so the core
/// pipeline can be tested without spawning anything.
pub trait CommandRunner {
    /// Run a shell command line in `cwd`, streaming its output to stderr.
    ///
    /// # Errors
    /// Returns an error only when the command could not be started.
    fn run_shell(&self, command: &str, cwd: &Path) -> std::io::Result<CommandStatus>;

    /// Run a program with explicit arguments in `cwd`.
    ///
    /// # Errors
    /// Returns an error only when the program could not be started.
    fn run_program(&self, program: &str, args: &[String], cwd: &Path)
    -> std::io::Result<CommandStatus>;
}

/// Runs commands for real: `sh -c` for hooks, direct exec for programs.
#[derive(Clone, Copy, Debug, Default)]
pub struct ShellRunner;

impl CommandRunner for ShellRunner {
    fn run_shell(&self, command: &str, cwd: &Path) -> std::io::Result<CommandStatus> {
        Command::new("sh")
            .args(["-c", command])
            .current_dir(cwd)
            .stdout(std::io::stderr())
            .status()
            .map(CommandStatus::from)
    }

    fn run_program(
        &self,
        program: &str,
        args: &[String],
        cwd: &Path,
    ) -> std::io::Result<CommandStatus> {
        Command::new(program)
            .args(args)
            .current_dir(cwd)
            .stdout(std::io::stderr())
            .status()
            .map(CommandStatus::from)
    }
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Pipeline stage a hook list belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HookStage {
    /// Before transformation.
    PreBuild,
    /// After transformation, before the diff.
    PostBuild,
}

impl fmt::Display for HookStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PreBuild => write!(f, "pre_build"),
            Self::PostBuild => write!(f, "post_build"),
        }
    }
}

/// What happened to one hook command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HookResult {
    /// The command after `<PROJECT>` substitution.
    pub command: String,
    /// Exit status.
    pub status: CommandStatus,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

/// Results of one stage's hook list, in execution order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HookReport {
    pub results: Vec<HookResult>,
}

impl HookReport {
    /// Returns `true` if every command exited 0.
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.results.iter().all(|r| r.status.success())
    }

    /// Commands that exited non-zero.
    pub fn failures(&self) -> impl Iterator<Item = &HookResult> {
        self.results.iter().filter(|r| !r.status.success())
    }
}

// ---------------------------------------------------------------------------
// HookError
// ---------------------------------------------------------------------------

/// Errors from running hooks.
#[derive(Debug)]
pub enum HookError {
    /// The shell could not be started for `command`.
    Spawn {
        command: String,
        source: std::io::Error,
    },
    /// A command failed and the policy is `abort`.
    Failed {
        stage: HookStage,
        command: String,
        exit_code: Option<i32>,
    },
}

impl fmt::Display for HookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spawn { command, source } => {
                write!(f, "failed to spawn hook `{command}`: {source}")
            }
            Self::Failed {
                stage,
                command,
                exit_code,
            } => {
                write!(f, "{stage} hook `{command}` failed")?;
                match exit_code {
                    Some(code) => write!(f, " (exit code {code})"),
                    None => write!(f, " (killed by signal)"),
                }
            }
        }
    }
}

impl std::error::Error for HookError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Spawn { source, .. } => Some(source),
            Self::Failed { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// HookRunner
// ---------------------------------------------------------------------------

/// Substitute [`PROJECT_TOKEN`] in `command`.
#[must_use]
pub fn substitute_project(command: &str, project: &Path) -> String {
    command.replace(PROJECT_TOKEN, &project.to_string_lossy())
}

/// Runs hook lists inside one staging directory.
pub struct HookRunner<'a> {
    runner: &'a dyn CommandRunner,
    staging_root: PathBuf,
    on_failure: OnFailure,
}

impl<'a> HookRunner<'a> {
    #[must_use]
    pub fn new(runner: &'a dyn CommandRunner, staging_root: &Path, on_failure: OnFailure) -> Self {
        Self {
            runner,
            staging_root: staging_root.to_owned(),
            on_failure,
        }
    }

    /// Run `commands` in order.
    ///
    /// `project` is made absolute against the caller's working directory
    /// before substitution.
    ///
    /// # Errors
    /// [`HookError::Spawn`] if the shell cannot start, [`HookError::Failed`]
    /// on the first non-zero exit when the policy is `abort`.
    pub fn run(
        &self,
        stage: HookStage,
        commands: &[String],
        project: &Path,
    ) -> Result<HookReport, HookError> {
        let mut report = HookReport::default();
        if commands.is_empty() {
            info!(%stage, "no hook commands configured");
            return Ok(report);
        }

        let project = std::path::absolute(project).unwrap_or_else(|_| project.to_owned());
        for raw in commands {
            let command = substitute_project(raw, &project);
            info!(%stage, %command, "running hook");
            let start = Instant::now();
            let status = self
                .runner
                .run_shell(&command, &self.staging_root)
                .map_err(|source| HookError::Spawn {
                    command: command.clone(),
                    source,
                })?;
            let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

            if !status.success() {
                match self.on_failure {
                    OnFailure::Warn => {
                        warn!(%stage, %command, exit_code = ?status.code, "hook failed, continuing");
                    }
                    OnFailure::Abort => {
                        return Err(HookError::Failed {
                            stage,
                            command,
                            exit_code: status.code,
                        });
                    }
                }
            }
            report.results.push(HookResult {
                command,
                status,
                duration_ms,
            });
        }
        Ok(report)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
