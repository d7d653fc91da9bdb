//! # Logging Configuration
//!
//! Structured logging setup read from `LOG_LEVEL` (an `EnvFilter` directive, eg/
//! `info` or `data=debug,risk=warn`) and `LOG_FORMAT` (`text` or `json`).
//!
//! ```rust,ignore
//! use perpbot_core::logging::init_logging;
//!
//! fn main() {
//!     init_logging(LogFormat::Text, "info");
//!     tracing::info!("trading system started");
//! }
//! ```

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }
}

/// Initializes the global `tracing` subscriber. `directive` is the `EnvFilter`
/// default, overridable by the `RUST_LOG` environment variable at runtime.
pub fn init_logging(format: LogFormat, directive: &str) {
    let env_filter = tracing_subscriber::filter::EnvFilter::builder()
        .with_default_directive(directive.parse().unwrap_or(tracing_subscriber::filter::LevelFilter::INFO.into()))
        .from_env_lossy();

    match format {
        LogFormat::Text => {
            tracing_subscriber::registry().with(env_filter).with(tracing_subscriber::fmt::layer()).init()
        }
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().flatten_event(true))
            .init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_formats_case_insensitively() {
        assert_eq!(LogFormat::parse("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::parse("text"), LogFormat::Text);
    }

    #[test]
    fn unknown_format_falls_back_to_text() {
        assert_eq!(LogFormat::parse("yaml"), LogFormat::Text);
    }
}
