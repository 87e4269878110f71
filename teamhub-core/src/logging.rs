use std::env;
use std::io;
use std::sync::OnceLock;

use thiserror::Error;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

const LOG_FILTER_VAR: &str = "TEAMHUB_LOG";
const LOG_FORMAT_VAR: &str = "TEAMHUB_LOG_FORMAT";

/// How log lines are rendered on stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line, for log collectors.
    Json,
    /// Plain text for terminals.
    Human,
}

impl LogFormat {
    /// `TEAMHUB_LOG_FORMAT=json` selects JSON; anything else is human.
    pub fn from_env() -> Self {
        match env::var(LOG_FORMAT_VAR) {
            Ok(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Human,
        }
    }
}

static LOGGING_FORMAT: OnceLock<LogFormat> = OnceLock::new();

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid logging filter: {0}")]
    Filter(#[from] ParseError),
    #[error("failed to install logging subscriber: {0}")]
    Subscriber(#[from] tracing_subscriber::util::TryInitError),
}

/// Install the global subscriber. The first call wins; later calls return
/// the format that was installed.
pub fn init_logging(format: LogFormat) -> Result<LogFormat, LoggingError> {
    if let Some(installed) = LOGGING_FORMAT.get() {
        return Ok(*installed);
    }

    let filter = build_filter(env::var(LOG_FILTER_VAR).ok().as_deref())?;
    let layer = match format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .event_format(
                tracing_subscriber::fmt::format()
                    .json()
                    .with_level(true)
                    .with_target(true),
            )
            .with_writer(io::stderr)
            .with_ansi(false)
            .boxed(),
        LogFormat::Human => tracing_subscriber::fmt::layer()
            .event_format(
                tracing_subscriber::fmt::format()
                    .with_level(true)
                    .with_target(true),
            )
            .with_writer(io::stderr)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init()?;

    let installed = *LOGGING_FORMAT.get_or_init(|| format);
    debug!(format = ?installed, "logging initialized");
    Ok(installed)
}

fn build_filter(directives: Option<&str>) -> Result<EnvFilter, ParseError> {
    match directives.map(str::trim) {
        Some(d) if !d.is_empty() => EnvFilter::try_new(d),
        _ => EnvFilter::try_new("info"),
    }
}
