//! Extension-priority transformer.
//!
//! Rewrites the staging tree in place by repeatedly applying an ordered list
//! of rules until no rule has anything left to do. Each rule claims a set of
//! file extensions and maps one file to its output path (or to nothing, for
//! files it deliberately skips).
//!
//! # Batch loop
//!
//! ```text
//! loop:
//!   files   ← fresh walk of the staging root
//!   rule    ← first rule (in list order) with a file that matches its
//!             extensions and is not yet processed
//!   none?   → done
//!   mark every matched file processed, then transform each one
//! ```
//!
//! Selection is strict priority: a lower rule never runs while a higher one
//! still has eligible files, and a file handled once is never considered
//! again, not even by a rule that would also match it. Outputs with a new
//! name show up in the next walk and can be picked up by any rule, which is
//! how `page.html.liquid` → `page.html` → minified `page.html` chains work.
//!
//! The processed set lives in the [`Transformer`], so running the same
//! transformer a second time over an already transformed tree does nothing.

pub mod inject;
pub mod minify;
pub mod sass;
pub mod template;

use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::{BuildSettings, SiteConfig};
use crate::hooks::CommandRunner;
use crate::staging::list_files;

pub use inject::InjectRule;
pub use minify::MinifyRule;
pub use sass::SassRule;
pub use template::TemplateRule;

// ---------------------------------------------------------------------------
// TransformError
// ---------------------------------------------------------------------------

/// Errors raised while transforming the staging tree.
#[derive(Debug)]
pub enum TransformError {
    /// An I/O error on `path`.
    Io { path: PathBuf, source: io::Error },
    /// A text rule found a file that is not valid UTF-8.
    NotUtf8 { path: PathBuf },
    /// The template engine rejected or failed to render a file.
    Template { path: PathBuf, message: String },
    /// An injection target lacks the placeholder it must contain.
    MissingPlaceholder { path: PathBuf, placeholder: String },
    /// An external compiler could not be started.
    Spawn { program: String, source: io::Error },
    /// An external compiler exited non-zero.
    Compiler {
        path: PathBuf,
        program: String,
        exit_code: Option<i32>,
    },
    /// A rule was configured with an unusable setting.
    InvalidSetting { rule: String, message: String },
    /// The batch loop did not converge. This is a bug in a rule.
    BatchLimit { limit: usize },
}

impl fmt::Display for TransformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "{}: {source}", path.display()),
            Self::NotUtf8 { path } => write!(f, "{}: not valid UTF-8", path.display()),
            Self::Template { path, message } => {
                write!(f, "{}: template error: {message}", path.display())
            }
            Self::MissingPlaceholder { path, placeholder } => write!(
                f,
                "{}: placeholder `{placeholder}` not found; refusing to emit the file unchanged",
                path.display()
            ),
            Self::Spawn { program, source } => write!(f, "failed to start `{program}`: {source}"),
            Self::Compiler {
                path,
                program,
                exit_code,
            } => {
                write!(f, "`{program}` failed on {}", path.display())?;
                if let Some(code) = exit_code {
                    write!(f, " (exit code {code})")?;
                }
                Ok(())
            }
            Self::InvalidSetting { rule, message } => write!(f, "rule `{rule}`: {message}"),
            Self::BatchLimit { limit } => write!(
                f,
                "transform did not settle after {limit} batches; a rule keeps emitting new files"
            ),
        }
    }
}

impl std::error::Error for TransformError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } | Self::Spawn { source, .. } => Some(source),
            _ => None,
        }
    }
}

pub(crate) fn io_err(path: &Path) -> impl FnOnce(io::Error) -> TransformError + '_ {
    move |source| TransformError::Io {
        path: path.to_owned(),
        source,
    }
}

// ---------------------------------------------------------------------------
// Transform trait
// ---------------------------------------------------------------------------

/// Result of transforming one file: the path it now lives at, or `None` if
/// the rule left it alone on purpose.
pub type TransformResult = Result<Option<PathBuf>, TransformError>;

/// One per-format processor.
///
/// The engine only knows the extension claim and the output-path contract;
/// how the file is rewritten is up to the implementation.
pub trait Transform {
    /// Short name used in logs and reports.
    fn name(&self) -> &str;

    /// Claimed extensions, without the leading dot.
    fn extensions(&self) -> &[String];

    /// Transform the file at `path`.
    ///
    /// # Errors
    /// Any failure aborts the whole run.
    fn apply(&self, config: &SiteConfig, path: &Path) -> TransformResult;
}

/// A rule backed by a closure. Handy for ad-hoc processors and tests.
pub struct FnRule<F> {
    name: String,
    extensions: Vec<String>,
    handler: F,
}

impl<F> FnRule<F>
where
    F: Fn(&SiteConfig, &Path) -> TransformResult,
{
    pub fn new(name: &str, extensions: &[&str], handler: F) -> Self {
        Self {
            name: name.to_owned(),
            extensions: normalize_extensions(extensions),
            handler,
        }
    }
}

impl<F> Transform for FnRule<F>
where
    F: Fn(&SiteConfig, &Path) -> TransformResult,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn extensions(&self) -> &[String] {
        &self.extensions
    }

    fn apply(&self, config: &SiteConfig, path: &Path) -> TransformResult {
        (self.handler)(config, path)
    }
}

/// Strip leading dots so `".scss"` and `"scss"` mean the same thing.
#[must_use]
pub fn normalize_extensions(extensions: &[&str]) -> Vec<String> {
    extensions
        .iter()
        .map(|e| e.trim_start_matches('.').to_owned())
        .collect()
}

fn claims(rule: &dyn Transform, path: &Path) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .is_some_and(|ext| rule.extensions().iter().any(|e| e == ext))
}

// ---------------------------------------------------------------------------
// Shared file helpers for rules
// ---------------------------------------------------------------------------

/// Read `path` as UTF-8, rewrite it with `f`, write it back.
pub(crate) fn rewrite_text(
    path: &Path,
    f: impl FnOnce(&str) -> Result<String, TransformError>,
) -> Result<(), TransformError> {
    let bytes = std::fs::read(path).map_err(io_err(path))?;
    let text = String::from_utf8(bytes).map_err(|_| TransformError::NotUtf8 {
        path: path.to_owned(),
    })?;
    let out = f(&text)?;
    std::fs::write(path, out).map_err(io_err(path))
}

/// Rename `path` to itself minus its last extension and return the new path.
pub(crate) fn strip_last_extension(path: &Path) -> Result<PathBuf, TransformError> {
    let target = path.with_extension("");
    std::fs::rename(path, &target).map_err(io_err(path))?;
    Ok(target)
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// One iteration of the batch loop.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Batch {
    /// Name of the selected rule.
    pub rule: String,
    /// Files handed to the rule, sorted.
    pub inputs: Vec<PathBuf>,
    /// Output per input, same order.
    pub outputs: Vec<Option<PathBuf>>,
}

/// Everything a [`Transformer::run`] did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransformReport {
    pub batches: Vec<Batch>,
}

impl TransformReport {
    /// Total number of files handed to a rule.
    #[must_use]
    pub fn files_processed(&self) -> usize {
        self.batches.iter().map(|b| b.inputs.len()).sum()
    }

    /// Returns `true` if nothing was transformed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Transformer
// ---------------------------------------------------------------------------

/// The fixed-point batch processor.
pub struct Transformer<'a> {
    rules: Vec<Box<dyn Transform + 'a>>,
    processed: BTreeSet<PathBuf>,
}

impl<'a> Transformer<'a> {
    /// Create a transformer over `rules`, highest priority first.
    #[must_use]
    pub fn new(rules: Vec<Box<dyn Transform + 'a>>) -> Self {
        Self {
            rules,
            processed: BTreeSet::new(),
        }
    }

    /// Files handled so far, across all runs of this transformer.
    #[must_use]
    pub const fn processed(&self) -> &BTreeSet<PathBuf> {
        &self.processed
    }

    /// Transform everything under `root` until no rule has work left.
    ///
    /// Every batch handles at least one path it has never seen. A rule that
    /// renames or strips the last extension keeps each file's lineage within
    /// `dots × extensions` distinct paths, so a terminating rule set needs at
    /// most `files × dots × extensions` batches. `files` and `dots` (the most
    /// dots in one file name) are measured at the start of the run;
    /// `extensions` is the union of every rule's claim. Going past that is
    /// reported, not retried.
    ///
    /// # Errors
    /// The first error from a rule or from walking the tree, or
    /// [`TransformError::BatchLimit`] if the loop fails to settle.
    pub fn run(&mut self, root: &Path, config: &SiteConfig) -> Result<TransformReport, TransformError> {
        let mut report = TransformReport::default();
        let limit = self.batch_limit(&list_files(root).map_err(io_err(root))?);

        loop {
            let files = list_files(root).map_err(io_err(root))?;

            let processed = &self.processed;
            let selected = self.rules.iter().find_map(|rule| {
                let batch: Vec<PathBuf> = files
                    .iter()
                    .filter(|f| claims(rule.as_ref(), f) && !processed.contains(*f))
                    .cloned()
                    .collect();
                (!batch.is_empty()).then_some((rule, batch))
            });
            let Some((rule, inputs)) = selected else {
                break;
            };

            if report.batches.len() >= limit {
                return Err(TransformError::BatchLimit { limit });
            }

            info!(rule = rule.name(), files = inputs.len(), "transform batch");
            self.processed.extend(inputs.iter().cloned());

            let mut outputs = Vec::with_capacity(inputs.len());
            for input in &inputs {
                let output = rule.apply(config, input)?;
                match &output {
                    Some(out) if out != input => {
                        debug!(rule = rule.name(), from = %input.display(), to = %out.display(), "transformed");
                    }
                    Some(_) => debug!(rule = rule.name(), path = %input.display(), "rewritten"),
                    None => debug!(rule = rule.name(), path = %input.display(), "skipped"),
                }
                outputs.push(output);
            }
            report.batches.push(Batch {
                rule: rule.name().to_owned(),
                inputs,
                outputs,
            });
        }

        Ok(report)
    }

    fn batch_limit(&self, files: &[PathBuf]) -> usize {
        let dots = files
            .iter()
            .filter_map(|p| p.file_name())
            .map(|n| n.to_string_lossy().matches('.').count())
            .max()
            .unwrap_or(0);
        let claimed: BTreeSet<&str> = self
            .rules
            .iter()
            .flat_map(|r| r.extensions().iter().map(String::as_str))
            .collect();
        files
            .len()
            .max(1)
            .saturating_mul(dots.max(1))
            .saturating_mul(claimed.len().max(1))
            .saturating_add(1)
    }
}

/// The built-in rule list, highest priority first:
/// `template` (`.liquid`), `sass` (`.scss`/`.sass`), `inject` (`.inject`),
/// then `minify` (`.html`/`.htm`) when enabled.
#[must_use]
pub fn default_rules<'a>(
    runner: &'a dyn CommandRunner,
    settings: &BuildSettings,
) -> Vec<Box<dyn Transform + 'a>> {
    let mut rules: Vec<Box<dyn Transform + 'a>> = vec![
        Box::new(TemplateRule::new()),
        Box::new(SassRule::new(runner)),
        Box::new(InjectRule::new()),
    ];
    if settings.minify_html {
        rules.push(Box::new(MinifyRule::new()));
    }
    rules
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
