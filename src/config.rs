/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 14/10/26
******************************************************************************/

//! Server configuration.
//!
//! Configuration is read once at startup from a JSON file, then adjusted by
//! `key=value` overrides from the command line, then validated. Keys accept
//! both snake_case and the legacy names used by older `conf.json` files
//! (`LogLevel`, `EventListenerPort`, `ClientListenerPort`, `SequenceNumber`).

use crate::error::ConfigError;
use crate::mailbox::{MailboxSettings, OverflowPolicy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Verbosity of the relay's own log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// The lowercase name understood by `tracing` filters.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses a level name, case-insensitively.
///
/// `ALL` is accepted as a synonym for `trace` and `WARNING` for `warn`.
///
/// # Examples
///
/// ```
/// use follower_relay::LogLevel;
///
/// assert_eq!("DEBUG".parse::<LogLevel>().unwrap(), LogLevel::Debug);
/// assert_eq!("ALL".parse::<LogLevel>().unwrap(), LogLevel::Trace);
/// ```
impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" | "all" => Ok(Self::Trace),
            _ => Err(ConfigError::InvalidValue {
                key: "log_level".to_owned(),
                value: s.to_owned(),
            }),
        }
    }
}

impl TryFrom<String> for LogLevel {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, ConfigError> {
        value.parse()
    }
}

impl From<LogLevel> for String {
    fn from(level: LogLevel) -> Self {
        level.as_str().to_owned()
    }
}

/// Where the active configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Parsed from this file.
    File(PathBuf),
    /// The file did not exist; built-in defaults are in effect.
    Defaults(PathBuf),
}

/// Every tunable of the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Default log level when `FOLLOWER_RELAY_LOG` is unset.
    #[serde(default, alias = "LogLevel", alias = "logLevel")]
    pub log_level: LogLevel,

    /// Port producers connect to.
    #[serde(default = "default_event_port", alias = "EventListenerPort", alias = "eventListenerPort")]
    pub event_port: u16,

    /// Port subscribers connect to.
    #[serde(
        default = "default_subscriber_port",
        alias = "ClientListenerPort",
        alias = "clientListenerPort"
    )]
    pub subscriber_port: u16,

    /// Interface both listeners bind to.
    #[serde(default = "default_bind_host")]
    pub bind_host: IpAddr,

    /// First sequence number the sequencer will release.
    #[serde(
        default = "default_initial_sequence",
        alias = "SequenceNumber",
        alias = "sequenceNumber"
    )]
    pub initial_sequence: u64,

    /// Frames queued per subscriber before the overflow policy applies.
    #[serde(default = "default_mailbox_capacity")]
    pub mailbox_capacity: usize,

    /// What to do when a subscriber queue is full.
    #[serde(default)]
    pub overflow_policy: OverflowPolicy,

    /// Commands queued for the sequencer before producers wait.
    #[serde(default = "default_command_capacity")]
    pub command_capacity: usize,

    /// Longest accepted input line, in bytes, without its terminator.
    #[serde(default = "default_max_line_length")]
    pub max_line_length: usize,

    /// How long a subscriber may take to send its registration line.
    #[serde(default = "default_registration_timeout_ms")]
    pub registration_timeout_ms: u64,

    /// How long shutdown waits for tasks before giving up on them.
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            event_port: default_event_port(),
            subscriber_port: default_subscriber_port(),
            bind_host: default_bind_host(),
            initial_sequence: default_initial_sequence(),
            mailbox_capacity: default_mailbox_capacity(),
            overflow_policy: OverflowPolicy::default(),
            command_capacity: default_command_capacity(),
            max_line_length: default_max_line_length(),
            registration_timeout_ms: default_registration_timeout_ms(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
        }
    }
}

fn default_event_port() -> u16 {
    9090
}

fn default_subscriber_port() -> u16 {
    9099
}

fn default_bind_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_initial_sequence() -> u64 {
    1
}

fn default_mailbox_capacity() -> usize {
    1024
}

fn default_command_capacity() -> usize {
    65536
}

fn default_max_line_length() -> usize {
    4096
}

fn default_registration_timeout_ms() -> u64 {
    10_000
}

fn default_shutdown_grace_ms() -> u64 {
    5_000
}

impl ServerConfig {
    /// Parses a JSON document. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the document is not valid.
    ///
    /// # Examples
    ///
    /// ```
    /// use follower_relay::{LogLevel, ServerConfig};
    ///
    /// let config = ServerConfig::from_json_str(r#"{"LogLevel": "DEBUG", "EventListenerPort": 7000}"#).unwrap();
    /// assert_eq!(config.log_level, LogLevel::Debug);
    /// assert_eq!(config.event_port, 7000);
    /// assert_eq!(config.subscriber_port, 9099);
    /// ```
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read and
    /// [`ConfigError::Parse`] if it is not valid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&contents)
    }

    /// Like [`load`](Self::load), but a missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Any error other than the file not existing.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<(Self, ConfigSource), ConfigError> {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(config) => Ok((config, ConfigSource::File(path.to_path_buf()))),
            Err(ConfigError::Io { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
                Ok((Self::default(), ConfigSource::Defaults(path.to_path_buf())))
            }
            Err(error) => Err(error),
        }
    }

    /// Applies one `key=value` override.
    ///
    /// Keys are matched ignoring case, `_` and `-`, so `logLevel`,
    /// `log_level` and `LOG-LEVEL` are the same key. On error the
    /// configuration is left unchanged.
    ///
    /// # Errors
    ///
    /// [`ConfigError::MalformedOverride`], [`ConfigError::UnknownKey`] or
    /// [`ConfigError::InvalidValue`].
    ///
    /// # Examples
    ///
    /// ```
    /// use follower_relay::ServerConfig;
    ///
    /// let mut config = ServerConfig::default();
    /// config.apply_override("clientListenerPort=9100").unwrap();
    /// assert_eq!(config.subscriber_port, 9100);
    /// assert!(config.apply_override("sequenceNumber=abc").is_err());
    /// assert_eq!(config.initial_sequence, 1);
    /// ```
    pub fn apply_override(&mut self, arg: &str) -> Result<(), ConfigError> {
        let (key, value) = arg
            .split_once('=')
            .ok_or_else(|| ConfigError::MalformedOverride(arg.to_owned()))?;
        let (key, value) = (key.trim(), value.trim());
        if key.is_empty() {
            return Err(ConfigError::MalformedOverride(arg.to_owned()));
        }

        let normalized: String = key
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .map(|c| c.to_ascii_lowercase())
            .collect();

        match normalized.as_str() {
            "loglevel" => self.log_level = parse_value(key, value)?,
            "eventlistenerport" | "eventport" => self.event_port = parse_value(key, value)?,
            "clientlistenerport" | "subscriberport" => {
                self.subscriber_port = parse_value(key, value)?;
            }
            "bindhost" => self.bind_host = parse_value(key, value)?,
            "sequencenumber" | "initialsequence" => {
                self.initial_sequence = parse_value(key, value)?;
            }
            "mailboxcapacity" => self.mailbox_capacity = parse_value(key, value)?,
            "overflowpolicy" => self.overflow_policy = parse_value(key, value)?,
            "commandcapacity" => self.command_capacity = parse_value(key, value)?,
            "maxlinelength" => self.max_line_length = parse_value(key, value)?,
            "registrationtimeoutms" => self.registration_timeout_ms = parse_value(key, value)?,
            "shutdowngracems" => self.shutdown_grace_ms = parse_value(key, value)?,
            _ => return Err(ConfigError::UnknownKey(key.to_owned())),
        }
        Ok(())
    }

    /// Applies every override in order, skipping the ones that fail.
    ///
    /// Returns the errors of the skipped overrides.
    pub fn apply_overrides<I, S>(&mut self, args: I) -> Vec<ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        args.into_iter()
            .filter_map(|arg| self.apply_override(arg.as_ref()).err())
            .collect()
    }

    /// Checks values that parse but cannot be used.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mailbox_capacity == 0 {
            return Err(ConfigError::Invalid("mailbox_capacity must be at least 1".into()));
        }
        if self.command_capacity == 0 {
            return Err(ConfigError::Invalid("command_capacity must be at least 1".into()));
        }
        if self.max_line_length == 0 {
            return Err(ConfigError::Invalid("max_line_length must be at least 1".into()));
        }
        if self.registration_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "registration_timeout_ms must be at least 1".into(),
            ));
        }
        if self.event_port != 0 && self.event_port == self.subscriber_port {
            return Err(ConfigError::Invalid(format!(
                "event_port and subscriber_port are both {}",
                self.event_port
            )));
        }
        Ok(())
    }

    /// Address of the producer listener.
    #[must_use]
    pub fn event_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_host, self.event_port)
    }

    /// Address of the subscriber listener.
    #[must_use]
    pub fn subscriber_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_host, self.subscriber_port)
    }

    /// How long a subscriber may take to send its user id.
    #[must_use]
    pub fn registration_timeout(&self) -> Duration {
        Duration::from_millis(self.registration_timeout_ms)
    }

    /// Upper bound on the whole shutdown sequence.
    #[must_use]
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    /// Queue sizing and overflow policy for subscriber mailboxes.
    #[must_use]
    pub fn mailbox_settings(&self) -> MailboxSettings {
        MailboxSettings {
            capacity: self.mailbox_capacity,
            policy: self.overflow_policy,
        }
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_owned(),
        value: value.to_owned(),
    })
}
