//! `minify` rule: `.html` / `.htm` files, rewritten in place.
//!
//! Drops comments, removes whitespace between tags and collapses every other
//! whitespace run to one space. `<pre>`, `<textarea>`, `<script>` and
//! `<style>` elements are copied through byte for byte.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use super::{Transform, TransformResult, normalize_extensions, rewrite_text};
use crate::config::SiteConfig;

/// Comments, plus every element whose body must not be touched.
static PROTECTED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?is)<!--.*?-->",
        r"|<pre\b[^>]*>.*?</pre\s*>",
        r"|<textarea\b[^>]*>.*?</textarea\s*>",
        r"|<script\b[^>]*>.*?</script\s*>",
        r"|<style\b[^>]*>.*?</style\s*>",
    ))
    .unwrap_or_else(|e| unreachable!("static regex: {e}"))
});
static BETWEEN_TAGS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r">\s+<").unwrap_or_else(|e| unreachable!("static regex: {e}")));
static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").unwrap_or_else(|e| unreachable!("static regex: {e}")));

/// Minify an HTML document. The result ends with exactly one newline.
#[must_use]
pub fn minify_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending = String::new();
    let mut last = 0;
    for m in PROTECTED.find_iter(text) {
        pending.push_str(&text[last..m.start()]);
        last = m.end();
        if m.as_str().starts_with("<!--") {
            continue;
        }
        push_collapsed(&mut out, &pending, true);
        pending.clear();
        out.push_str(m.as_str());
    }
    pending.push_str(&text[last..]);
    push_collapsed(&mut out, &pending, false);

    let mut out = out.trim().to_owned();
    out.push('\n');
    out
}

/// Collapse `chunk` and append it. A protected element counts as a tag on
/// either side, so whitespace between it and a neighbouring tag goes too.
fn push_collapsed(out: &mut String, chunk: &str, before_protected: bool) {
    let collapsed = BETWEEN_TAGS.replace_all(chunk, "><");
    let collapsed = WHITESPACE.replace_all(&collapsed, " ");
    let mut s: &str = &collapsed;
    if !out.is_empty()
        && let Some(rest) = s.strip_prefix(' ')
        && (rest.is_empty() || rest.starts_with('<'))
    {
        s = rest;
    }
    if before_protected
        && let Some(rest) = s.strip_suffix(' ')
        && rest.ends_with('>')
    {
        s = rest;
    }
    out.push_str(s);
}

/// Minifies HTML in place.
pub struct MinifyRule {
    extensions: Vec<String>,
}

impl MinifyRule {
    #[must_use]
    pub fn new() -> Self {
        Self {
            extensions: normalize_extensions(&["html", "htm"]),
        }
    }
}

impl Default for MinifyRule {
    fn default() -> Self {
        Self::new()
    }
}

impl Transform for MinifyRule {
    fn name(&self) -> &str {
        "minify"
    }

    fn extensions(&self) -> &[String] {
        &self.extensions
    }

    fn apply(&self, _config: &SiteConfig, path: &Path) -> TransformResult {
        tracing::info!(path = %path.display(), "minifying");
        rewrite_text(path, |text| Ok(minify_html(text)))?;
        Ok(Some(path.to_owned()))
    }
}
