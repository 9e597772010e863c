/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 14/10/26
******************************************************************************/

//! Error types for the relay.
//!
//! Errors are strictly local to the line or connection that produced them:
//! nothing in this module is ever allowed to reach the sequencer's state.

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

/// A line that could not be decoded into an event or a registration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// A producer line that is not a valid event.
    #[error("malformed event {line:?}: {reason}")]
    MalformedEvent {
        /// The offending line, without its terminator.
        line: String,
        /// What was wrong with it.
        reason: &'static str,
    },

    /// A subscriber registration line that is not a user id.
    #[error("malformed registration {line:?}")]
    MalformedRegistration {
        /// The offending line, without its terminator.
        line: String,
    },
}

impl CodecError {
    pub(crate) fn malformed_event(line: &str, reason: &'static str) -> Self {
        Self::MalformedEvent {
            line: line.to_owned(),
            reason,
        }
    }
}

/// A line that was read off the socket but cannot be handed to the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FrameError {
    /// The line was longer than the configured limit and has been discarded.
    #[error("line exceeds {limit} bytes")]
    TooLong {
        /// The configured maximum line length.
        limit: usize,
    },

    /// The line is not valid UTF-8.
    #[error("line is not valid UTF-8")]
    InvalidUtf8,
}

/// Errors returned when talking to the sequencer task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SequencerError {
    /// The sequencer has been shut down.
    #[error("sequencer has been shut down")]
    Shutdown,
}

/// Errors produced by the network server and its lifecycle.
#[derive(Debug, Error)]
pub enum ServerError {
    /// A listening socket could not be opened at startup.
    #[error("failed to bind {role} listener on {addr}: {source}")]
    Bind {
        /// Which listener failed (`event` or `subscriber`).
        role: &'static str,
        /// The address that was requested.
        addr: SocketAddr,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// A socket read or write failed; only that connection is affected.
    #[error("connection error with {peer}: {source}")]
    Connection {
        /// The remote end of the connection.
        peer: SocketAddr,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// One or more resources did not release cleanly during shutdown.
    #[error("shutdown completed with {} failure(s): {}", .failures.len(), .failures.join("; "))]
    Shutdown {
        /// A description of every task that failed to stop cleanly.
        failures: Vec<String>,
    },
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file {}: {source}", .path.display())]
    Io {
        /// The file that was requested.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The configuration file is not valid JSON for [`ServerConfig`].
    ///
    /// [`ServerConfig`]: crate::ServerConfig
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// A command-line override that is not of the form `key=value`.
    #[error("invalid override {0:?}: expected key=value")]
    MalformedOverride(String),

    /// A command-line override naming a key that does not exist.
    #[error("unknown configuration key {0:?}")]
    UnknownKey(String),

    /// A value that cannot be parsed for its key.
    #[error("invalid value {value:?} for {key}")]
    InvalidValue {
        /// The key being set.
        key: String,
        /// The rejected value.
        value: String,
    },

    /// A configuration that parsed but cannot be used.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
