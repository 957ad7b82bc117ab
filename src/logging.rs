//! Tracing subscriber setup for the binary.
//!
//! Stdout carries protocol frames when serving, so every log line goes to
//! stderr.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::LogLevel;
use crate::{Error, Result};

/// Filter used when `RUST_LOG` is not set
pub fn default_filter(level: LogLevel) -> EnvFilter {
    EnvFilter::new(format!("jarindex={level},warn"))
}

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
pub fn init_logging(level: LogLevel) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(level));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(console::Term::stderr().is_term()),
        )
        .with(filter)
        .try_init()
        .map_err(|e| Error::Config(format!("failed to install log subscriber: {e}")))?;

    Ok(())
}
