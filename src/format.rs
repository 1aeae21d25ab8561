use anyhow::{Result, bail};
use serde::Serialize;
use std::str::FromStr;

use crate::diff::Classification;

/// Output format for structured data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Plain text, one `path: STATUS` line per file
    #[default]
    Text,
    /// JSON - machine-parseable
    Json,
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => bail!("Invalid format '{s}'. Use: text or json"),
        }
    }
}

impl OutputFormat {
    /// Serialize data to the requested format
    pub fn serialize<T: Serialize>(self, data: &T) -> Result<String> {
        match self {
            Self::Json => serde_json::to_string_pretty(data)
                .map_err(|e| anyhow::anyhow!("JSON serialization failed: {e}")),
            Self::Text => {
                // Text format shouldn't use this path - caller renders text itself
                bail!("Text format should not use serialize()")
            }
        }
    }
}

/// Text rendering of a classification. `SAME` entries are listed only when
/// `show_same` is set.
#[must_use]
pub fn render_classification(record: &Classification, show_same: bool) -> String {
    use crate::diff::FileStatus;

    let mut out = String::new();
    for (path, status) in record {
        if *status == FileStatus::Same && !show_same {
            continue;
        }
        out.push_str(path);
        out.push_str(": ");
        out.push_str(&status.to_string());
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::FileStatus;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert!("toon".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn text_lists_changes() {
        let record: Classification = [
            ("a.html".to_owned(), FileStatus::Add),
            ("b.css".to_owned(), FileStatus::Changed),
            ("c.txt".to_owned(), FileStatus::Same),
        ]
        .into_iter()
        .collect();
        assert_eq!(
            render_classification(&record, false),
            "a.html: ADD\nb.css: OVERWRITE\n"
        );
        assert!(render_classification(&record, true).ends_with("c.txt: SAME\n"));
    }

    #[test]
    fn text_does_not_serialize() {
        assert!(OutputFormat::Text.serialize(&1).is_err());
        assert_eq!(OutputFormat::Json.serialize(&[1, 2]).unwrap(), "[\n  1,\n  2\n]");
    }
}
