/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 14/10/26
******************************************************************************/

//! Tracing subscriber setup for the binary.
//!
//! `FOLLOWER_RELAY_LOG` takes any `EnvFilter` directive and overrides the
//! configured level. `FOLLOWER_RELAY_LOG_FORMAT=json` switches to one JSON
//! object per line; anything else gives compact text.

use crate::config::LogLevel;
use std::env;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt};

/// Environment variable holding a filter directive.
pub const LOG_ENV: &str = "FOLLOWER_RELAY_LOG";

/// Environment variable selecting the output format.
pub const LOG_FORMAT_ENV: &str = "FOLLOWER_RELAY_LOG_FORMAT";

/// Output format of the global subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Single-line human-readable output.
    #[default]
    Compact,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    /// Reads the format from [`LOG_FORMAT_ENV`].
    #[must_use]
    pub fn from_env() -> Self {
        match env::var(LOG_FORMAT_ENV) {
            Ok(value) if value.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Compact,
        }
    }
}

/// The filter used when [`LOG_ENV`] is unset: this crate at `level`,
/// dependencies at `warn`.
#[must_use]
pub fn default_directive(level: LogLevel) -> String {
    format!("follower_relay={level},warn")
}

/// Installs the global subscriber.
///
/// # Errors
///
/// Returns an error if a global subscriber is already set.
pub fn init_tracing(level: LogLevel) -> Result<(), TryInitError> {
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_directive(level)));

    let registry = tracing_subscriber::registry().with(filter);

    match LogFormat::from_env() {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_ansi(false).with_target(true))
            .try_init(),
        LogFormat::Compact => registry.with(fmt::layer().compact()).try_init(),
    }
}
