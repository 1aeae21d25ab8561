//! Project configuration (`stencil.toml`).
//!
//! Defines the typed view of the configuration document that lives in the
//! root of every project managed by stencil. Only a handful of keys are
//! interpreted here (hook command lists, `[hooks]`, `[build]`); every other
//! key is kept verbatim in [`SiteConfig::fields`] so templates can read it
//! through [`SiteConfig::lookup`].

use std::fmt;
use std::path::Path;

use serde::Deserialize;

/// File name of the configuration document inside a project directory.
pub const CONFIG_FILE_NAME: &str = "stencil.toml";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level project configuration.
///
/// Missing fields use defaults. Missing file → all defaults (no error).
/// Unknown keys are not rejected; they end up in [`Self::fields`].
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct SiteConfig {
    /// Commands run inside the staging tree before any file is transformed.
    #[serde(default)]
    pub pre_build: Vec<String>,

    /// Commands run inside the staging tree after every transform finished.
    #[serde(default)]
    pub post_build: Vec<String>,

    /// Hook execution settings.
    #[serde(default)]
    pub hooks: HookSettings,

    /// Build step settings.
    #[serde(default)]
    pub build: BuildSettings,

    /// Everything else in the document, exposed to templates.
    #[serde(flatten)]
    pub fields: toml::Table,
}

// ---------------------------------------------------------------------------
// HookSettings
// ---------------------------------------------------------------------------

/// How pre-/post-build hooks are run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HookSettings {
    /// What to do when a hook command exits non-zero.
    #[serde(default)]
    pub on_failure: OnFailure,
}

/// Action to take when a hook command fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OnFailure {
    /// Log a warning and keep going with the next command.
    #[default]
    Warn,
    /// Stop the run at the first failing command.
    Abort,
}

impl fmt::Display for OnFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warn => write!(f, "warn"),
            Self::Abort => write!(f, "abort"),
        }
    }
}

// ---------------------------------------------------------------------------
// BuildSettings
// ---------------------------------------------------------------------------

/// Settings consumed by the staging cleanup and the built-in rules.
///
/// ```toml
/// [build]
/// tools_dir = "template-tools"
/// cleanup = ["**/__pycache__", "**/.mypy_cache"]
/// consumed = ["scss", "sass"]
/// minify_html = true
/// sass_command = ["sassc", "--style", "compressed"]
/// placeholder = "__DATA_JSON__"
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildSettings {
    /// Directory (relative to the template root) holding helper scripts for
    /// hooks. Removed from staging before the diff.
    #[serde(default = "default_tools_dir")]
    pub tools_dir: String,

    /// Glob patterns (relative to the staging root) removed before and after
    /// the build.
    #[serde(default = "default_cleanup")]
    pub cleanup: Vec<String>,

    /// Source extensions whose files are deleted once compiled.
    #[serde(default = "default_consumed")]
    pub consumed: Vec<String>,

    /// Minify `.html`/`.htm` files.
    #[serde(default = "default_minify_html")]
    pub minify_html: bool,

    /// Style-sheet compiler invocation. Load path, input and output are
    /// appended by the `sass` rule.
    #[serde(default = "default_sass_command")]
    pub sass_command: Vec<String>,

    /// Token that `.inject` files must contain.
    #[serde(default = "default_placeholder")]
    pub placeholder: String,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            tools_dir: default_tools_dir(),
            cleanup: default_cleanup(),
            consumed: default_consumed(),
            minify_html: default_minify_html(),
            sass_command: default_sass_command(),
            placeholder: default_placeholder(),
        }
    }
}

fn default_tools_dir() -> String {
    "template-tools".to_owned()
}

fn default_cleanup() -> Vec<String> {
    vec!["**/__pycache__".to_owned(), "**/.mypy_cache".to_owned()]
}

fn default_consumed() -> Vec<String> {
    vec!["scss".to_owned(), "sass".to_owned()]
}

const fn default_minify_html() -> bool {
    true
}

fn default_sass_command() -> Vec<String> {
    vec![
        "sassc".to_owned(),
        "--style".to_owned(),
        "compressed".to_owned(),
    ]
}

fn default_placeholder() -> String {
    "__DATA_JSON__".to_owned()
}

// ---------------------------------------------------------------------------
// Lookup
// ---------------------------------------------------------------------------

static EMPTY: toml::Value = toml::Value::String(String::new());

impl SiteConfig {
    /// Look up a dotted path (`"social.twitter"`) in the free-form fields.
    ///
    /// Missing keys, and paths that walk through a non-table value, resolve
    /// to the empty string rather than an error.
    #[must_use]
    pub fn lookup(&self, path: &str) -> &toml::Value {
        self.get(path).unwrap_or(&EMPTY)
    }

    /// Like [`Self::lookup`] but distinguishes a missing key.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&toml::Value> {
        let mut parts = path.split('.').filter(|p| !p.is_empty());
        let first = parts.next()?;
        let mut current = self.fields.get(first)?;
        for part in parts {
            current = current.as_table()?.get(part)?;
        }
        Some(current)
    }

    /// Render a value the way templates see it: strings verbatim, scalars in
    /// their TOML spelling, arrays and tables as JSON.
    #[must_use]
    pub fn render_value(value: &toml::Value) -> String {
        match value {
            toml::Value::String(s) => s.clone(),
            toml::Value::Integer(i) => i.to_string(),
            toml::Value::Float(f) => f.to_string(),
            toml::Value::Boolean(b) => b.to_string(),
            toml::Value::Datetime(d) => d.to_string(),
            toml::Value::Array(_) | toml::Value::Table(_) => {
                serde_json::to_string(value).unwrap_or_default()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// A `stencil.toml` that cannot be used.
#[derive(Debug)]
pub struct ConfigError {
    /// The file involved; `None` for text parsed directly or a setting
    /// rejected after loading.
    pub path: Option<std::path::PathBuf>,
    /// What is wrong, prefixed with `line N:` when the parser knows.
    pub message: String,
}

impl ConfigError {
    fn in_file(mut self, path: &Path) -> Self {
        self.path = Some(path.to_owned());
        self
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(p) => write!(f, "bad {CONFIG_FILE_NAME} at {}: {}", p.display(), self.message),
            None => write!(f, "bad {CONFIG_FILE_NAME}: {}", self.message),
        }
    }
}

impl std::error::Error for ConfigError {}

/// 1-based line of byte `offset` in `text`.
fn line_of(text: &str, offset: usize) -> usize {
    text.get(..offset)
        .map_or(0, |head| head.matches('\n').count())
        + 1
}

impl SiteConfig {
    /// Read the config at `path`. No file means all defaults: a project
    /// without `stencil.toml` still builds.
    ///
    /// # Errors
    /// The file exists but is unreadable or does not parse.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            read => read.map_err(|e| {
                ConfigError {
                    path: None,
                    message: format!("unreadable: {e}"),
                }
                .in_file(path)
            })?,
        };
        Self::parse(&text).map_err(|e| e.in_file(path))
    }

    /// Read `stencil.toml` from `dir`.
    ///
    /// # Errors
    /// See [`Self::load`].
    pub fn load_from_dir(dir: &Path) -> Result<Self, ConfigError> {
        Self::load(&dir.join(CONFIG_FILE_NAME))
    }

    /// Parse config text.
    ///
    /// # Errors
    /// Invalid TOML, a wrongly typed known key, or an unknown key inside
    /// `[hooks]` or `[build]`.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError {
            path: None,
            message: match e.span() {
                Some(span) => format!("line {}: {}", line_of(text, span.start), e.message()),
                None => e.message().to_owned(),
            },
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
