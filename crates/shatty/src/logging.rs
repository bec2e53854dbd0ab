//! Log subscriber setup for the binary.

use std::fs::OpenOptions;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

use crate::config::{LogConfig, LogFormat};
use crate::error::{Result, ShattyError};

/// Variables consulted for a filter directive, in order.
pub const FILTER_VARS: [&str; 2] = ["SHATTY_LOG", "RUST_LOG"];

/// The filter directive to use: the first non-empty of [`FILTER_VARS`],
/// else the configured level.
pub fn filter_directive<F>(config: &LogConfig, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    FILTER_VARS
        .iter()
        .find_map(|name| lookup(name).filter(|v| !v.trim().is_empty()))
        .unwrap_or_else(|| config.level.clone())
}

/// Install the global subscriber.
///
/// Logs go to stderr unless `config.file` is set, in which case they are
/// appended to that file without ANSI colours.
pub fn init_logging(config: &LogConfig) -> Result<()> {
    let directive = filter_directive(config, |name| std::env::var(name).ok());
    let filter = EnvFilter::try_new(&directive)
        .map_err(|e| ShattyError::config(None, format!("invalid log filter {directive:?}: {e}")))?;

    let (writer, ansi) = match &config.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| ShattyError::config(Some(path.clone()), e.to_string()))?;
            (BoxMakeWriter::new(Mutex::new(file)), false)
        }
        None => (BoxMakeWriter::new(std::io::stderr), true),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(ansi)
        .with_target(false);

    let installed = match config.format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|e| ShattyError::config(None, format!("cannot install logger: {e}")))
}
