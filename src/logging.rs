//! Tracing subscriber setup
//!
//! Readers emit `tracing` events (`debug!` per read call, `trace!` per drained
//! packet, `warn!` for discarded samples). Nothing is printed until the
//! application installs a subscriber; [`init`] installs a `tracing-subscriber`
//! fmt layer driven by [`LogSettings`].
//!
//! # Example
//! ```no_run
//! use daq_reader::config::ReaderSettings;
//! use daq_reader::logging;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = ReaderSettings::load()?;
//! logging::init(&settings.log)?;
//! tracing::info!("reader subsystem ready");
//! # Ok(())
//! # }
//! ```

use crate::config::LogSettings;
use crate::error::{ReaderError, ReaderResult};
use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Output format for log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Pretty-printed format with colors (for development)
    Pretty,
    /// Compact single-line format without colors
    #[default]
    Compact,
    /// JSON lines for log aggregation
    Json,
}

/// Install a global subscriber.
///
/// `RUST_LOG` takes precedence over `settings.level` when set. Returns
/// `Ok(true)` if this call installed the subscriber and `Ok(false)` if one was
/// already installed, so it is safe to call from tests and libraries.
pub fn init(settings: &LogSettings) -> ReaderResult<bool> {
    let level = parse_level(&settings.level)?;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_to_filter_string(level)));

    let layer = match settings.format {
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_thread_names(true)
            .with_filter(filter)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_ansi(false)
            .with_filter(filter)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_thread_names(true)
            .with_filter(filter)
            .boxed(),
    };

    match tracing_subscriber::registry().with(layer).try_init() {
        Ok(()) => Ok(true),
        Err(e) if e.to_string().contains("already been set") => Ok(false),
        Err(e) => Err(ReaderError::Configuration(format!(
            "Failed to initialize tracing: {e}"
        ))),
    }
}

/// Parse a log level name (case-insensitive).
pub fn parse_level(level: &str) -> ReaderResult<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => Err(ReaderError::Configuration(format!(
            "Invalid log level '{level}'. Must be one of: trace, debug, info, warn, error"
        ))),
    }
}

fn level_to_filter_string(level: Level) -> &'static str {
    match level {
        Level::TRACE => "trace",
        Level::DEBUG => "debug",
        Level::INFO => "info",
        Level::WARN => "warn",
        Level::ERROR => "error",
    }
}
