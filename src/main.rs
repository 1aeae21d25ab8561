use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod batch_cmd;
mod build_cmd;

/// Template scaffolding updater
///
/// Stencil renders a template tree into a scratch directory, runs the
/// project's hooks and file transforms there, and then copies the result
/// into the project without silently destroying local edits.
///
/// FILE STATES:
///   ADD        exists in the build, not in the project   (always written)
///   OVERWRITE  exists in both, contents differ            (written with --force)
///   SAME       identical in both                          (never written)
///
/// Files that exist only in the project are never touched.
///
/// QUICK START:
///
///   # Preview what an update would change
///   stencil diff ../my-site --template ./template
///
///   # Write new files only
///   stencil build ../my-site --template ./template
///
///   # Also overwrite changed files, after confirming the list
///   stencil build ../my-site --template ./template --force --ask
///
/// LOGGING:
///   RUST_LOG=debug       more detail on stderr
///   STENCIL_LOG=json     one JSON object per log event
#[derive(Parser)]
#[command(name = "stencil")]
#[command(version, about)]
#[command(propagate_version = true)]
#[command(after_help = "See 'stencil <command> --help' for more information on a specific command.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Build(build_cmd::BuildArgs),
    Diff(build_cmd::DiffArgs),
    Batch(batch_cmd::BatchArgs),
}

/// Error carrying a specific process exit code.
#[derive(Debug)]
pub struct ExitCodeError(pub u8);

impl std::fmt::Display for ExitCodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "exiting with code {}", self.0)
    }
}

impl std::error::Error for ExitCodeError {}

fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Build(ref args) => build_cmd::run(args),
        Commands::Diff(ref args) => build_cmd::run_diff(args),
        Commands::Batch(ref args) => batch_cmd::run(args),
    }
}

fn main() -> ExitCode {
    stencil::telemetry::init();
    let cli = Cli::parse();

    match dispatch(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if let Some(ExitCodeError(code)) = e.downcast_ref::<ExitCodeError>() {
                if *code == 2 {
                    println!("Aborted, nothing changed.");
                }
                return ExitCode::from(*code);
            }
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
