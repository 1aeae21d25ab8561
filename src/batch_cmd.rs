use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Args;
use tracing::{error, warn};

use stencil::apply::{ApplyOutcome, ApplyPolicy, Confirm, StdinConfirm, prompt_yes_no};
use stencil::discover::{GitState, commit_all, find_projects, git_state};
use stencil::hooks::ShellRunner;
use stencil::pipeline::Pipeline;

use crate::build_cmd::SourceArgs;

/// Update every project found under a directory
///
/// Searches ROOT recursively for directories containing stencil.toml and
/// updates each one from the template. Projects in a git work tree with
/// uncommitted changes are skipped unless --allow-dirty is given.
///
/// Examples:
///   stencil batch ~/sites
///   stencil batch ~/sites --yes --commit "Update from template"
#[derive(Args, Debug)]
pub struct BatchArgs {
    /// Directory to search for projects
    pub root: PathBuf,

    #[command(flatten)]
    pub source: SourceArgs,

    /// Also overwrite files that differ from the template (local edits are lost)
    #[arg(long, short)]
    pub force: bool,

    /// Show each project's file list and ask before writing
    #[arg(long)]
    pub ask: bool,

    /// Update projects even when their work tree has uncommitted changes
    #[arg(long)]
    pub allow_dirty: bool,

    /// Do not ask before each project (or before committing)
    #[arg(long, short)]
    pub yes: bool,

    /// Commit the changes in each updated project with this message
    #[arg(long, value_name = "MESSAGE")]
    pub commit: Option<String>,
}

/// How one project fared.
#[derive(Debug)]
enum ProjectResult {
    Updated { files: usize, committed: bool },
    Unchanged,
    Skipped(&'static str),
    Failed,
}

impl fmt::Display for ProjectResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Updated { files, committed } => {
                write!(f, "updated {files} file(s)")?;
                if *committed {
                    write!(f, ", committed")?;
                }
                Ok(())
            }
            Self::Unchanged => write!(f, "unchanged"),
            Self::Skipped(reason) => write!(f, "skipped ({reason})"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

pub fn run(args: &BatchArgs) -> Result<()> {
    println!("Searching for projects in '{}'", args.root.display());
    let projects = find_projects(&args.root, std::slice::from_ref(&args.source.template))
        .with_context(|| format!("Failed to search '{}'", args.root.display()))?;
    if projects.is_empty() {
        println!("No projects found.");
        return Ok(());
    }
    for project in &projects {
        println!("  found: {}", project.display());
    }

    let mut results = Vec::with_capacity(projects.len());
    for project in &projects {
        let result = match update_one(args, project) {
            Ok(r) => r,
            Err(e) => {
                error!(project = %project.display(), "{e:#}");
                eprintln!("error: {}: {e:#}", project.display());
                ProjectResult::Failed
            }
        };
        results.push((project, result));
    }

    println!();
    println!("Summary:");
    for (project, result) in &results {
        println!("  {}: {result}", project.display());
    }

    let failed = results
        .iter()
        .filter(|(_, r)| matches!(r, ProjectResult::Failed))
        .count();
    if failed > 0 {
        bail!("{failed} of {} project(s) failed", results.len());
    }
    Ok(())
}

fn update_one(args: &BatchArgs, project: &Path) -> Result<ProjectResult> {
    match git_state(project).context("Failed to run git status")? {
        GitState::Dirty(paths) if !args.allow_dirty => {
            warn!(
                project = %project.display(),
                changes = paths.len(),
                "work tree not clean, skipping"
            );
            return Ok(ProjectResult::Skipped("uncommitted changes; commit them or pass --allow-dirty"));
        }
        GitState::Dirty(_) => {
            warn!(project = %project.display(), "work tree not clean, updating anyway");
        }
        GitState::Clean | GitState::NotARepo => {}
    }

    if !args.yes && !prompt_yes_no(&format!("Update '{}'?", project.display()))? {
        return Ok(ProjectResult::Skipped("declined"));
    }

    let runner = ShellRunner;
    let policy = ApplyPolicy::from_force(args.force);
    let pipeline = Pipeline::new(&runner, args.source.settings(project.to_owned(), policy));
    let mut prompt = StdinConfirm;
    let confirm: Option<&mut dyn Confirm> = if args.ask { Some(&mut prompt) } else { None };
    let report = pipeline.run(confirm)?;

    let files = match report.outcome {
        ApplyOutcome::NothingToDo => return Ok(ProjectResult::Unchanged),
        ApplyOutcome::Declined => return Ok(ProjectResult::Skipped("declined")),
        ApplyOutcome::Applied(paths) => paths.len(),
    };

    let mut committed = false;
    if let Some(message) = &args.commit
        && (args.yes || prompt_yes_no("Commit the changes?")?)
    {
        committed = commit_all(project, message).context("Failed to commit")?;
    }
    Ok(ProjectResult::Updated { files, committed })
}
