//! Logging initialization.
//!
//! Events go to stderr so stdout stays free for summaries and prompts.
//! Controlled by two environment variables:
//! - `RUST_LOG` → the usual `EnvFilter` directives (default `info`)
//! - `STENCIL_LOG=json` → one JSON object per event instead of text

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

/// Output style for log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStyle {
    Text,
    Json,
}

impl LogStyle {
    /// Read the style from a `STENCIL_LOG` value.
    #[must_use]
    pub fn from_env_value(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Text,
        }
    }
}

/// Install the global subscriber. A second call is a no-op.
pub fn init() {
    let style = LogStyle::from_env_value(std::env::var("STENCIL_LOG").ok().as_deref());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    let result = match style {
        LogStyle::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        LogStyle::Text => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    };
    if let Err(e) = result {
        eprintln!("warning: logging already initialized: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn style_from_env_value() {
        assert_eq!(LogStyle::from_env_value(None), LogStyle::Text);
        assert_eq!(LogStyle::from_env_value(Some("JSON")), LogStyle::Json);
        assert_eq!(LogStyle::from_env_value(Some(" json ")), LogStyle::Json);
        assert_eq!(LogStyle::from_env_value(Some("pretty")), LogStyle::Text);
    }
}
