use follower_relay::config::ConfigSource;
use follower_relay::{ConfigError, LogLevel, OverflowPolicy, ServerConfig};
use std::io::Write;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_legacy_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"LogLevel": "DEBUG", "EventListenerPort": 9190, "ClientListenerPort": 9199, "SequenceNumber": 1}}"#
        )
        .unwrap();

        let config = ServerConfig::load(file.path()).unwrap();
        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.event_port, 9190);
        assert_eq!(config.subscriber_port, 9199);
        assert_eq!(config.initial_sequence, 1);
        assert_eq!(config.overflow_policy, OverflowPolicy::DropNewest);
    }

    #[test]
    fn test_shipped_config_matches_defaults() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/conf.json");
        assert_eq!(ServerConfig::load(path).unwrap(), ServerConfig::default());
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf.json");

        let (config, source) = ServerConfig::load_or_default(&path).unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(source, ConfigSource::Defaults(path));
    }

    #[test]
    fn test_present_file_reports_its_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{}}").unwrap();

        let (_, source) = ServerConfig::load_or_default(file.path()).unwrap();
        assert_eq!(source, ConfigSource::File(file.path().to_path_buf()));
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{\"event_port\": \"ninety\"}}").unwrap();

        let result = ServerConfig::load_or_default(file.path());
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_unreadable_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = ServerConfig::load_or_default(dir.path());
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_overrides_apply_after_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"event_port": 7000, "mailbox_capacity": 16}}"#).unwrap();

        let mut config = ServerConfig::load(file.path()).unwrap();
        let rejected = config.apply_overrides(["eventListenerPort=7100", "mailboxCapacity=oops"]);

        assert_eq!(rejected.len(), 1);
        assert_eq!(config.event_port, 7100);
        assert_eq!(config.mailbox_capacity, 16);
        assert!(config.validate().is_ok());
    }
}
