//! `inject` rule: data injection into `.inject` files.
//!
//! `public/i18n.js.inject` becomes `public/i18n.js` with the placeholder
//! token (`build.placeholder`) replaced by the JSON encoding of
//! `[data."i18n.js"]` from the configuration. Keys come out sorted, so the
//! same config always yields the same bytes. A missing data entry injects
//! `{}`; a file without the placeholder is an error, since emitting it
//! unchanged would ship a broken script.

use std::path::Path;

use super::{
    Transform, TransformError, TransformResult, normalize_extensions, rewrite_text,
    strip_last_extension,
};
use crate::config::SiteConfig;

/// JSON for the `data` entry named `file_name`.
#[must_use]
pub fn data_json(config: &SiteConfig, file_name: &str) -> String {
    config
        .fields
        .get("data")
        .and_then(toml::Value::as_table)
        .and_then(|t| t.get(file_name))
        .and_then(|v| serde_json::to_string(v).ok())
        .unwrap_or_else(|| "{}".to_owned())
}

/// Injects configuration data into `.inject` templates.
pub struct InjectRule {
    extensions: Vec<String>,
}

impl InjectRule {
    #[must_use]
    pub fn new() -> Self {
        Self {
            extensions: normalize_extensions(&["inject"]),
        }
    }
}

impl Default for InjectRule {
    fn default() -> Self {
        Self::new()
    }
}

impl Transform for InjectRule {
    fn name(&self) -> &str {
        "inject"
    }

    fn extensions(&self) -> &[String] {
        &self.extensions
    }

    fn apply(&self, config: &SiteConfig, path: &Path) -> TransformResult {
        let placeholder = config.build.placeholder.as_str();
        if placeholder.is_empty() {
            return Err(TransformError::InvalidSetting {
                rule: self.name().to_owned(),
                message: "build.placeholder is empty".to_owned(),
            });
        }

        let target = strip_last_extension(path)?;
        let file_name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let json = data_json(config, &file_name);

        tracing::info!(path = %target.display(), "injecting data");
        rewrite_text(&target, |text| {
            if text.contains(placeholder) {
                Ok(text.replace(placeholder, &json))
            } else {
                Err(TransformError::MissingPlaceholder {
                    path: target.clone(),
                    placeholder: placeholder.to_owned(),
                })
            }
        })?;
        Ok(Some(target))
    }
}
