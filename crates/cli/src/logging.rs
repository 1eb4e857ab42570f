//! Process-wide `tracing` subscriber.
//!
//! Logs go to stderr so that command output on stdout stays machine readable. The configured level
//! applies to the lattice crates; `RUST_LOG` directives are layered on top of it.

use std::io::IsTerminal;

use itertools::Itertools;
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{FmtSubscriber, filter::EnvFilter, util::SubscriberInitExt};

use crate::{
    config::{LogFormat, LogLevel, LoggingConfig},
    error::Error,
};

/// Crates whose level follows the configured one.
const LATTICE_CRATES: &[&str] = &["lattice_cli", "lattice_genesis", "lattice_module"];

/// Installs the global subscriber described by `config`.
///
/// Buffered lines are flushed when the returned guard drops, so bind it to a named variable for
/// the lifetime of the program.
pub fn init(config: &LoggingConfig) -> Result<WorkerGuard, Error> {
    let extra = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = filter(config.log_level, extra.as_deref())?;

    let (writer, guard) = tracing_appender::non_blocking(std::io::stderr());
    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false);

    let installed = match config.log_format {
        LogFormat::Plaintext => builder.finish().try_init(),
        LogFormat::Json => builder.json().finish().try_init(),
    };
    installed.map_err(|e| Error::LoggerInit(e.to_string()))?;

    Ok(guard)
}

/// Directive setting every lattice crate to `level`, e.g. `lattice_cli=debug,...`.
pub fn lattice_directive(level: LogLevel) -> String {
    LATTICE_CRATES.iter().map(|krate| format!("{krate}={level}")).join(",")
}

/// Filter for `level`, with `extra` directives appended. Other crates log at `info`.
fn filter(level: LogLevel, extra: Option<&str>) -> Result<EnvFilter, Error> {
    let mut directives = lattice_directive(level);
    if let Some(extra) = extra.map(str::trim)
        && !extra.is_empty()
    {
        directives.push(',');
        directives.push_str(extra);
    }

    EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .parse(&directives)
        .map_err(|e| Error::LogFilter(format!("`{directives}`: {e}")))
}
