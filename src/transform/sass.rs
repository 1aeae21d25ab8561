//! `sass` rule: `.scss` / `.sass` style sheets.
//!
//! Compiles `x.scss` to a sibling `x.css` with the external compiler from
//! `build.sass_command`, passing the source's directory as load path.
//! Partials (`_name.scss`) are meant to be imported by other sheets, so they
//! are skipped. The sources themselves stay in staging until the post-build
//! cleanup removes the `build.consumed` extensions.

use std::path::Path;

use tracing::info;

use super::{Transform, TransformError, TransformResult, normalize_extensions};
use crate::config::SiteConfig;
use crate::hooks::CommandRunner;

/// Compiles style sheets through a [`CommandRunner`].
pub struct SassRule<'a> {
    runner: &'a dyn CommandRunner,
    extensions: Vec<String>,
}

impl<'a> SassRule<'a> {
    #[must_use]
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self {
            runner,
            extensions: normalize_extensions(&["scss", "sass"]),
        }
    }
}

/// Returns `true` for `_partial.scss`-style file names.
fn is_partial(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('_'))
}

impl Transform for SassRule<'_> {
    fn name(&self) -> &str {
        "sass"
    }

    fn extensions(&self) -> &[String] {
        &self.extensions
    }

    fn apply(&self, config: &SiteConfig, path: &Path) -> TransformResult {
        if is_partial(path) {
            info!(path = %path.display(), "ignoring partial");
            return Ok(None);
        }

        let Some((program, base_args)) = config.build.sass_command.split_first() else {
            return Err(TransformError::InvalidSetting {
                rule: self.name().to_owned(),
                message: "build.sass_command is empty".to_owned(),
            });
        };
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let output = path.with_extension("css");

        let mut args = base_args.to_vec();
        args.push("--load-path".to_owned());
        args.push(dir.to_string_lossy().into_owned());
        args.push(path.to_string_lossy().into_owned());
        args.push(output.to_string_lossy().into_owned());

        info!(path = %path.display(), "compiling style sheet");
        let status = self
            .runner
            .run_program(program, &args, dir)
            .map_err(|source| TransformError::Spawn {
                program: program.clone(),
                source,
            })?;
        if !status.success() {
            return Err(TransformError::Compiler {
                path: path.to_owned(),
                program: program.clone(),
                exit_code: status.code,
            });
        }
        Ok(Some(output))
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::path::PathBuf;

    use super::*;
    use crate::hooks::CommandStatus;

    /// Pretends to be the compiler: writes the output file named last.
    #[derive(Default)]
    struct FakeCompiler {
        calls: RefCell<Vec<(String, Vec<String>)>>,
        exit_code: i32,
    }

    impl CommandRunner for FakeCompiler {
        fn run_shell(&self, _: &str, _: &Path) -> std::io::Result<CommandStatus> {
            unreachable!("sass never uses the shell")
        }

        fn run_program(
            &self,
            program: &str,
            args: &[String],
            _: &Path,
        ) -> std::io::Result<CommandStatus> {
            self.calls
                .borrow_mut()
                .push((program.to_owned(), args.to_vec()));
            if self.exit_code == 0
                && let Some(out) = args.last()
            {
                std::fs::write(out, "a{color:red}")?;
            }
            Ok(CommandStatus {
                code: Some(self.exit_code),
            })
        }
    }

    #[test]
    fn compiles_to_sibling_css() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("site.scss");
        std::fs::write(&src, "a { color: red; }").unwrap();
        let fake = FakeCompiler::default();

        let out = SassRule::new(&fake)
            .apply(&SiteConfig::default(), &src)
            .unwrap();
        assert_eq!(out, Some(dir.path().join("site.css")));
        assert!(dir.path().join("site.css").is_file());

        let calls = fake.calls.borrow();
        assert_eq!(calls[0].0, "sassc");
        let args: Vec<&str> = calls[0].1.iter().map(String::as_str).collect();
        assert_eq!(&args[..3], &["--style", "compressed", "--load-path"]);
        assert_eq!(PathBuf::from(args[3]), dir.path());
    }

    #[test]
    fn partials_are_skipped() {
        let fake = FakeCompiler::default();
        let out = SassRule::new(&fake)
            .apply(&SiteConfig::default(), Path::new("/x/_vars.scss"))
            .unwrap();
        assert_eq!(out, None);
        assert!(fake.calls.borrow().is_empty());
    }

    #[test]
    fn compiler_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("site.sass");
        std::fs::write(&src, "a\n  color: red").unwrap();
        let fake = FakeCompiler {
            exit_code: 1,
            ..FakeCompiler::default()
        };
        let err = SassRule::new(&fake)
            .apply(&SiteConfig::default(), &src)
            .unwrap_err();
        assert!(matches!(
            err,
            TransformError::Compiler {
                exit_code: Some(1),
                ..
            }
        ));
    }

    #[test]
    fn empty_command_is_rejected() {
        let fake = FakeCompiler::default();
        let mut config = SiteConfig::default();
        config.build.sass_command.clear();
        let err = SassRule::new(&fake)
            .apply(&config, Path::new("/x/site.scss"))
            .unwrap_err();
        assert!(err.to_string().contains("sass_command"));
    }
}
