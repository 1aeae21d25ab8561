//! `template` rule: `.liquid` files.
//!
//! `page.html.liquid` becomes `page.html`, rendered as a Liquid template with
//! the configuration bound to `site`. Every `site.<path>` the template
//! mentions but the configuration lacks is bound to `nil`, so it renders
//! empty and counts as false in conditions.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use super::{
    Transform, TransformError, TransformResult, normalize_extensions, rewrite_text,
    strip_last_extension,
};
use crate::config::SiteConfig;

static SITE_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bsite((?:\.[A-Za-z_][A-Za-z0-9_\-]*)+)")
        .unwrap_or_else(|e| unreachable!("static regex: {e}"))
});

/// Render `text` as Liquid with `site` bound to the configuration.
///
/// # Errors
/// Template syntax errors and render failures reported by the engine.
pub fn render(text: &str, config: &SiteConfig) -> Result<String, liquid::Error> {
    let mut site: Map<String, Value> = config
        .fields
        .iter()
        .map(|(k, v)| (k.clone(), to_json(v)))
        .collect();
    for caps in SITE_REF.captures_iter(text) {
        bind_missing(&mut site, &caps[1]);
    }

    let mut root = Map::new();
    root.insert("site".to_owned(), Value::Object(site));
    let globals = liquid::to_object(&root)?;

    let template = liquid::ParserBuilder::with_stdlib().build()?.parse(text)?;
    template.render(&globals)
}

fn to_json(value: &toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s.clone()),
        toml::Value::Integer(i) => Value::from(*i),
        toml::Value::Float(f) => Value::from(*f),
        toml::Value::Boolean(b) => Value::Bool(*b),
        toml::Value::Datetime(d) => Value::String(d.to_string()),
        toml::Value::Array(items) => Value::Array(items.iter().map(to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .iter()
                .map(|(k, v)| (k.clone(), to_json(v)))
                .collect(),
        ),
    }
}

/// Make `.a.b.c` resolvable: missing intermediate keys become empty objects
/// and a missing last key becomes `null`. Stops at the first existing value
/// that is not an object (arrays keep `first`, `size` and friends).
fn bind_missing(site: &mut Map<String, Value>, path: &str) {
    let mut node = site;
    let mut segments = path.split('.').filter(|s| !s.is_empty()).peekable();
    while let Some(key) = segments.next() {
        if segments.peek().is_none() {
            node.entry(key.to_owned()).or_insert(Value::Null);
            return;
        }
        let child = node
            .entry(key.to_owned())
            .or_insert_with(|| Value::Object(Map::new()));
        let Value::Object(child) = child else {
            return;
        };
        node = child;
    }
}

/// Renders `.liquid` files against the site configuration.
pub struct TemplateRule {
    extensions: Vec<String>,
}

impl TemplateRule {
    #[must_use]
    pub fn new() -> Self {
        Self {
            extensions: normalize_extensions(&["liquid"]),
        }
    }
}

impl Default for TemplateRule {
    fn default() -> Self {
        Self::new()
    }
}

impl Transform for TemplateRule {
    fn name(&self) -> &str {
        "template"
    }

    fn extensions(&self) -> &[String] {
        &self.extensions
    }

    fn apply(&self, config: &SiteConfig, path: &Path) -> TransformResult {
        tracing::info!(path = %path.display(), "rendering template");
        let target = strip_last_extension(path)?;
        rewrite_text(&target, |text| {
            render(text, config).map_err(|e| TransformError::Template {
                path: path.to_owned(),
                message: e.to_string(),
            })
        })?;
        Ok(Some(target))
    }
}
