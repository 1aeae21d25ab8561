use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use stencil::apply::{ApplyOutcome, ApplyPolicy, Confirm, StdinConfirm};
use stencil::diff::{Classification, DiffStats};
use stencil::format::{OutputFormat, render_classification};
use stencil::hooks::ShellRunner;
use stencil::pipeline::{DiffSummary, Pipeline, Settings};
use stencil::staging::Staging;

use crate::ExitCodeError;

/// Where the build comes from and where it is assembled.
#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// Template directory to build from
    #[arg(long, short = 't', env = "STENCIL_TEMPLATE", default_value = "template")]
    pub template: PathBuf,

    /// Scratch directory for the build [default: <tmp>/stencil-staging]
    ///
    /// Wiped at the start of every run. Left in place afterwards so the
    /// result can be inspected.
    #[arg(long)]
    pub staging: Option<PathBuf>,
}

impl SourceArgs {
    pub fn staging(&self) -> Staging {
        self.staging
            .clone()
            .map_or_else(Staging::default_location, Staging::new)
    }

    pub fn settings(&self, project: PathBuf, policy: ApplyPolicy) -> Settings {
        Settings {
            project_dir: project,
            template_dir: self.template.clone(),
            staging: self.staging(),
            policy,
        }
    }
}

/// Build the template for a project and write the result into it
///
/// New files are always written. Files that differ from the template are
/// only overwritten with --force; files that exist only in the project are
/// never touched.
///
/// Examples:
///   stencil build ../my-site
///   stencil build ../my-site --force --ask
#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Project directory to update
    pub project: PathBuf,

    #[command(flatten)]
    pub source: SourceArgs,

    /// Also overwrite files that differ from the template (local edits are lost)
    #[arg(long, short)]
    pub force: bool,

    /// Show the files about to be written and ask before writing any
    #[arg(long)]
    pub ask: bool,
}

pub fn run(args: &BuildArgs) -> Result<()> {
    let runner = ShellRunner;
    let policy = ApplyPolicy::from_force(args.force);
    let pipeline = Pipeline::new(&runner, args.source.settings(args.project.clone(), policy));

    let mut prompt = StdinConfirm;
    let confirm: Option<&mut dyn Confirm> = if args.ask { Some(&mut prompt) } else { None };
    let report = pipeline
        .run(confirm)
        .with_context(|| format!("Failed to update '{}'", args.project.display()))?;

    print_outcome(&report.outcome, &report.build.record, policy)
}

/// Print what an apply did. A declined prompt becomes exit code 2.
pub fn print_outcome(outcome: &ApplyOutcome, record: &Classification, policy: ApplyPolicy) -> Result<()> {
    let stats = DiffStats::of(record);
    match outcome {
        ApplyOutcome::Declined => return Err(ExitCodeError(2).into()),
        ApplyOutcome::NothingToDo => println!("Nothing to update."),
        ApplyOutcome::Applied(paths) => {
            for path in paths {
                if let Some(status) = record.get(path) {
                    println!("  {path}: {status}");
                }
            }
            println!("Updated {} file(s).", paths.len());
        }
    }
    if !policy.include_changed && stats.changed > 0 {
        println!(
            "{} file(s) differ from the template and were kept.\n  To overwrite them: rerun with --force",
            stats.changed
        );
    }
    Ok(())
}

/// Build the template for a project and show what would change
///
/// Runs the full build, including hooks, but writes nothing to the project.
#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Project directory to compare against
    pub project: PathBuf,

    #[command(flatten)]
    pub source: SourceArgs,

    /// Also list files that are already up to date
    #[arg(long)]
    pub all: bool,

    /// Output format: text or json
    #[arg(long, default_value = "text")]
    pub format: OutputFormat,
}

pub fn run_diff(args: &DiffArgs) -> Result<()> {
    let runner = ShellRunner;
    let pipeline = Pipeline::new(
        &runner,
        args.source
            .settings(args.project.clone(), ApplyPolicy::additions_only()),
    );
    let report = pipeline
        .build()
        .with_context(|| format!("Failed to build '{}'", args.project.display()))?;
    let stats = report.stats();

    match args.format {
        OutputFormat::Json => {
            let summary = DiffSummary {
                project: &pipeline.settings().project_dir,
                stats,
                files: &report.record,
            };
            println!("{}", args.format.serialize(&summary)?);
        }
        OutputFormat::Text => {
            print!("{}", render_classification(&report.record, args.all));
            println!(
                "{} to add, {} to overwrite, {} unchanged",
                stats.add, stats.changed, stats.same
            );
        }
    }
    Ok(())
}
