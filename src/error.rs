//! Crate-wide error type.
//!
//! [`StencilError`] wraps the per-module errors so the pipeline can use `?`
//! across stage boundaries. Each message names the failing stage and, where
//! there is one, what to do about it.

use std::fmt;
use std::path::PathBuf;

use crate::apply::ApplyError;
use crate::config::ConfigError;
use crate::diff::DiffError;
use crate::hooks::HookError;
use crate::staging::StagingError;
use crate::transform::TransformError;

// ---------------------------------------------------------------------------
// StencilError
// ---------------------------------------------------------------------------

/// Any failure of a build or apply run.
#[derive(Debug)]
pub enum StencilError {
    /// The project directory to update does not exist.
    ProjectNotFound { path: PathBuf },
    /// The staging root overlaps the project or the template. Resetting it
    /// would delete one of them.
    StagingOverlap { staging: PathBuf, other: PathBuf },
    Staging(StagingError),
    Config(ConfigError),
    Hook(HookError),
    Transform(TransformError),
    Diff(DiffError),
    Apply(ApplyError),
    Io(std::io::Error),
}

impl fmt::Display for StencilError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProjectNotFound { path } => write!(
                f,
                "project directory '{}' does not exist.\n  To fix: pass the path of an existing project.",
                path.display()
            ),
            Self::StagingOverlap { staging, other } => write!(
                f,
                "staging directory '{}' overlaps '{}'; it is wiped on every run.\n  To fix: pass a --staging directory outside the project and the template.",
                staging.display(),
                other.display()
            ),
            Self::Staging(e) => write!(f, "staging: {e}"),
            Self::Config(e) => write!(
                f,
                "{e}\n  To fix: correct stencil.toml in the project (or the file a pre_build hook wrote)."
            ),
            Self::Hook(e) => write!(
                f,
                "{e}\n  To fix: run the hook by hand in the staging directory, or set hooks.on_failure = \"warn\"."
            ),
            Self::Transform(e) => write!(f, "transform: {e}"),
            Self::Diff(e) => write!(f, "{e}"),
            Self::Apply(e) => write!(
                f,
                "apply: {e}\n  Files written before the failure were kept; rerun to finish."
            ),
            Self::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for StencilError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ProjectNotFound { .. } | Self::StagingOverlap { .. } => None,
            Self::Staging(e) => Some(e),
            Self::Config(e) => Some(e),
            Self::Hook(e) => Some(e),
            Self::Transform(e) => Some(e),
            Self::Diff(e) => Some(e),
            Self::Apply(e) => Some(e),
            Self::Io(e) => Some(e),
        }
    }
}

// ---------------------------------------------------------------------------
// From impls
// ---------------------------------------------------------------------------

impl From<StagingError> for StencilError {
    fn from(err: StagingError) -> Self {
        Self::Staging(err)
    }
}

impl From<ConfigError> for StencilError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

impl From<HookError> for StencilError {
    fn from(err: HookError) -> Self {
        Self::Hook(err)
    }
}

impl From<TransformError> for StencilError {
    fn from(err: TransformError) -> Self {
        Self::Transform(err)
    }
}

impl From<DiffError> for StencilError {
    fn from(err: DiffError) -> Self {
        Self::Diff(err)
    }
}

impl From<ApplyError> for StencilError {
    fn from(err: ApplyError) -> Self {
        Self::Apply(err)
    }
}

impl From<std::io::Error> for StencilError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_not_found_suggests_fix() {
        let err = StencilError::ProjectNotFound {
            path: PathBuf::from("/nope"),
        };
        let msg = err.to_string();
        assert!(msg.contains("/nope"));
        assert!(msg.contains("To fix"));
    }

    #[test]
    fn wraps_module_errors_with_source() {
        use std::error::Error as _;

        let err: StencilError = StagingError::MissingSource {
            path: PathBuf::from("/tpl"),
        }
        .into();
        assert!(err.to_string().contains("/tpl"));
        assert!(err.source().is_some());

        let err: StencilError = TransformError::BatchLimit { limit: 7 }.into();
        assert!(matches!(err, StencilError::Transform(_)));
    }
}
