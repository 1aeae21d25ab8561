//! The build-and-apply pipeline.
//!
//! One [`Pipeline`] updates one project from one template. [`Pipeline::build`]
//! produces a fully built staging tree plus its classification against the
//! project; [`Pipeline::run`] additionally applies it. Stages, in order:
//!
//! 1. reset staging and copy the template into it
//! 2. copy the project's `stencil.toml` into staging
//! 3. cache cleanup
//! 4. `pre_build` hooks
//! 5. reload the config from staging (hooks may have rewritten it)
//! 6. transform until fixed point
//! 7. remove the tools directory, the config copy and consumed sources
//! 8. `post_build` hooks
//! 9. cache cleanup again
//! 10. diff staging against the project
//! 11. apply (only in [`Pipeline::run`])
//!
//! Before step 1 the project's config is read and `build.tools_dir` checked,
//! so a bad setting fails before staging is wiped. The project is read,
//! never written, before step 11.

use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use tracing::{info, info_span};

use crate::apply::{ApplyOutcome, ApplyPolicy, Confirm, apply};
use crate::config::{CONFIG_FILE_NAME, ConfigError, SiteConfig};
use crate::diff::{Classification, DiffStats, diff_trees};
use crate::error::StencilError;
use crate::hooks::{CommandRunner, HookReport, HookRunner, HookStage};
use crate::staging::Staging;
use crate::transform::{TransformReport, Transformer, default_rules};

/// Per-run settings.
#[derive(Clone, Debug)]
pub struct Settings {
    /// The live project to update.
    pub project_dir: PathBuf,
    /// The template source tree.
    pub template_dir: PathBuf,
    /// Where to assemble the build.
    pub staging: Staging,
    /// Which classifications [`Pipeline::run`] writes.
    pub policy: ApplyPolicy,
}

/// What a build produced, before anything was applied.
#[derive(Debug, Default)]
pub struct BuildReport {
    /// The config the build ran with (after `pre_build` hooks).
    pub config: SiteConfig,
    /// Cache entries removed, both passes.
    pub cleaned: Vec<String>,
    pub pre_hooks: HookReport,
    pub transform: TransformReport,
    /// Tools directory, config copy and consumed sources removed after the
    /// transform.
    pub removed: Vec<String>,
    pub post_hooks: HookReport,
    /// Staging tree vs. project.
    pub record: Classification,
}

impl BuildReport {
    #[must_use]
    pub fn stats(&self) -> DiffStats {
        DiffStats::of(&self.record)
    }
}

/// A build followed by an apply.
#[derive(Debug)]
pub struct RunReport {
    pub build: BuildReport,
    pub outcome: ApplyOutcome,
}

/// Machine-readable summary of a classification.
#[derive(Debug, Serialize)]
pub struct DiffSummary<'a> {
    pub project: &'a Path,
    pub stats: DiffStats,
    pub files: &'a Classification,
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Runs the stages for one project.
pub struct Pipeline<'a> {
    runner: &'a dyn CommandRunner,
    settings: Settings,
}

impl<'a> Pipeline<'a> {
    #[must_use]
    pub const fn new(runner: &'a dyn CommandRunner, settings: Settings) -> Self {
        Self { runner, settings }
    }

    #[must_use]
    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Build the staging tree and classify it against the project.
    ///
    /// # Errors
    /// A missing project or template, an invalid config, a fatal hook, or a
    /// transform failure. The project is untouched in every case.
    pub fn build(&self) -> Result<BuildReport, StencilError> {
        let project = std::path::absolute(&self.settings.project_dir)?;
        if !project.is_dir() {
            return Err(StencilError::ProjectNotFound { path: project });
        }
        let staging = Staging::new(std::path::absolute(self.settings.staging.root())?);
        let template = std::path::absolute(&self.settings.template_dir)?;
        for other in [&project, &template] {
            if overlaps(staging.root(), other) {
                return Err(StencilError::StagingOverlap {
                    staging: staging.root().to_owned(),
                    other: other.clone(),
                });
            }
        }

        let span = info_span!("build", project = %project.display());
        let _guard = span.enter();

        let mut report = BuildReport::default();

        let project_config = project.join(CONFIG_FILE_NAME);
        let initial = SiteConfig::load(&project_config)?;
        check_tools_dir(&initial.build.tools_dir)?;

        staging.reset()?;
        let copied = staging.populate(&template)?;
        info!(files = copied, template = %template.display(), "staging populated");

        if staging.copy_in(&project_config, CONFIG_FILE_NAME)? {
            info!("project config copied into staging");
        }

        report.cleaned = staging.clean(&initial.build.cleanup)?;

        let pre = HookRunner::new(self.runner, staging.root(), initial.hooks.on_failure);
        report.pre_hooks = pre.run(HookStage::PreBuild, &initial.pre_build, &project)?;

        let config = SiteConfig::load_from_dir(staging.root())?;

        let mut transformer = Transformer::new(default_rules(self.runner, &config.build));
        report.transform = transformer.run(staging.root(), &config)?;
        info!(
            batches = report.transform.batches.len(),
            files = report.transform.files_processed(),
            "transform complete"
        );

        report.removed = remove_build_inputs(&staging, &config)?;

        let post = HookRunner::new(self.runner, staging.root(), config.hooks.on_failure);
        report.post_hooks = post.run(HookStage::PostBuild, &config.post_build, &project)?;

        report.cleaned.extend(staging.clean(&config.build.cleanup)?);

        report.record = diff_trees(staging.root(), &project)?;
        let stats = report.stats();
        info!(
            add = stats.add,
            changed = stats.changed,
            same = stats.same,
            "diff complete"
        );

        report.config = config;
        Ok(report)
    }

    /// Build, then apply under the configured policy.
    ///
    /// # Errors
    /// Everything [`Pipeline::build`] reports, plus apply failures.
    pub fn run(&self, confirm: Option<&mut dyn Confirm>) -> Result<RunReport, StencilError> {
        let build = self.build()?;
        let project = std::path::absolute(&self.settings.project_dir)?;
        let staging_root = std::path::absolute(self.settings.staging.root())?;

        let outcome = apply(
            &build.record,
            &staging_root,
            &project,
            self.settings.policy,
            confirm,
        )?;
        if let ApplyOutcome::Applied(paths) = &outcome {
            info!(files = paths.len(), "applied");
        }
        Ok(RunReport { build, outcome })
    }
}

/// Either path contains the other.
fn overlaps(a: &Path, b: &Path) -> bool {
    a.starts_with(b) || b.starts_with(a)
}

/// `build.tools_dir` names a directory inside staging, or nothing.
fn check_tools_dir(rel: &str) -> Result<(), ConfigError> {
    if Path::new(rel)
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
    {
        Ok(())
    } else {
        Err(ConfigError {
            path: None,
            message: format!("build.tools_dir '{rel}' must be a relative path inside the template"),
        })
    }
}

/// Drop what only the build needed: the tools directory, the config copy and
/// every file with a consumed extension. Returns the removed relative paths.
fn remove_build_inputs(staging: &Staging, config: &SiteConfig) -> Result<Vec<String>, StencilError> {
    // Hooks may have rewritten the config since the first check.
    check_tools_dir(&config.build.tools_dir)?;

    let mut removed = Vec::new();
    for rel in [config.build.tools_dir.as_str(), CONFIG_FILE_NAME] {
        if rel.is_empty() {
            continue;
        }
        if staging.path(rel).exists() {
            removed.push(rel.to_owned());
        }
        staging.remove(rel)?;
    }

    let patterns: Vec<String> = config
        .build
        .consumed
        .iter()
        .map(|ext| ext.trim_start_matches('.'))
        .filter(|ext| !ext.is_empty())
        .map(|ext| format!("**/*.{ext}"))
        .collect();
    removed.extend(staging.clean(&patterns)?);
    Ok(removed)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
