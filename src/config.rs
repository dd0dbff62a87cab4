//! Connection config (the single `host` field collected at setup) and
//! runtime tuning read from the environment.

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use crate::client::DEFAULT_TIMEOUT;
use crate::coordinator::{DEFAULT_REFRESH_DELAY, DEFAULT_UPDATE_INTERVAL};
use crate::logger::MessageLogMode;
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionConfig {
    host: String,
}

impl ConnectionConfig {
    /// Accepts `host` or `host:port`; no scheme, no path.
    pub fn new(host: impl AsRef<str>) -> Result<Self> {
        let host = host.as_ref().trim();
        if host.is_empty() {
            return Err(Error::InvalidConfig("host is required".to_string()));
        }
        if host.contains("://") {
            return Err(Error::InvalidConfig(format!(
                "host must not include a scheme: {host}"
            )));
        }
        if host.contains('/') || host.chars().any(char::is_whitespace) {
            return Err(Error::InvalidConfig(format!("invalid host: {host}")));
        }
        Ok(Self {
            host: host.to_string(),
        })
    }

    /// Read the stored config entry, `{"host": "..."}`.
    pub fn from_entry(entry: &Value) -> Result<Self> {
        let host = entry
            .get("host")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::InvalidConfig("missing required field: host".to_string()))?;
        Self::new(host)
    }

    pub fn from_env() -> Result<Self> {
        let host = std::env::var("XENIA_HOST")
            .map_err(|_| Error::InvalidConfig("XENIA_HOST is not set".to_string()))?;
        Self::new(host)
    }

    pub fn host(&self) -> &str {
        &self.host
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub update_interval: Duration,
    /// Wait between a control command and the refresh that follows it.
    pub refresh_delay: Duration,
    pub request_timeout: Duration,
    pub message_log: Option<(MessageLogMode, PathBuf)>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            update_interval: DEFAULT_UPDATE_INTERVAL,
            refresh_delay: DEFAULT_REFRESH_DELAY,
            request_timeout: DEFAULT_TIMEOUT,
            message_log: None,
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Unparseable values fall back to the defaults. The poll interval and
    /// request timeout must be non-zero; a zero falls back as well.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parse = |key: &str| lookup(key).and_then(|s| s.trim().parse::<u64>().ok());
        let secs = |key: &str, default: Duration| {
            parse(key).map(Duration::from_secs).unwrap_or(default)
        };
        let nonzero_secs = |key: &str, default: Duration| {
            parse(key)
                .filter(|s| *s > 0)
                .map(Duration::from_secs)
                .unwrap_or(default)
        };

        let message_log = lookup("XENIA_MESSAGE_LOG")
            .filter(|s| !s.trim().is_empty())
            .map(|path| {
                let mode = lookup("XENIA_MESSAGE_LOG_MODE")
                    .and_then(|m| MessageLogMode::from_name(&m))
                    .unwrap_or(MessageLogMode::Full);
                (mode, PathBuf::from(path.trim()))
            });

        Settings {
            update_interval: nonzero_secs("XENIA_UPDATE_INTERVAL_SECS", defaults.update_interval),
            refresh_delay: secs("XENIA_REFRESH_DELAY_SECS", defaults.refresh_delay),
            request_timeout: nonzero_secs("XENIA_REQUEST_TIMEOUT_SECS", defaults.request_timeout),
            message_log,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn host_is_trimmed() {
        let config = ConnectionConfig::new("  192.168.1.40:8080 ").unwrap();
        assert_eq!(config.host(), "192.168.1.40:8080");
    }

    #[test]
    fn rejects_empty_scheme_and_path() {
        for bad in ["", "   ", "http://xenia.local", "xenia.local/api", "xenia local"] {
            let err = ConnectionConfig::new(bad).unwrap_err();
            assert!(matches!(err, Error::InvalidConfig(_)), "{bad:?} gave {err:?}");
        }
    }

    #[test]
    fn reads_config_entry() {
        let config = ConnectionConfig::from_entry(&json!({"host": "xenia.local"})).unwrap();
        assert_eq!(config.host(), "xenia.local");

        let err = ConnectionConfig::from_entry(&json!({"hostname": "xenia.local"})).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn serializes_as_entry_shape() {
        let config = ConnectionConfig::new("xenia.local").unwrap();
        assert_eq!(serde_json::to_value(&config).unwrap(), json!({"host": "xenia.local"}));
    }

    #[test]
    fn settings_defaults() {
        let settings = Settings::from_lookup(|_| None);
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.update_interval, Duration::from_secs(30));
        assert_eq!(settings.refresh_delay, Duration::from_secs(5));
        assert_eq!(settings.request_timeout, Duration::from_secs(10));
    }

    #[test]
    fn settings_overrides_and_fallbacks() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("XENIA_UPDATE_INTERVAL_SECS", "60"),
            ("XENIA_REFRESH_DELAY_SECS", "soon"),
            ("XENIA_MESSAGE_LOG", "/tmp/xenia.ndjson"),
            ("XENIA_MESSAGE_LOG_MODE", "diffed"),
        ]);
        let settings = Settings::from_lookup(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(settings.update_interval, Duration::from_secs(60));
        assert_eq!(settings.refresh_delay, DEFAULT_REFRESH_DELAY);
        assert_eq!(
            settings.message_log,
            Some((MessageLogMode::Diffed, PathBuf::from("/tmp/xenia.ndjson")))
        );
    }

    #[test]
    fn zero_interval_and_timeout_fall_back() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("XENIA_UPDATE_INTERVAL_SECS", "0"),
            ("XENIA_REQUEST_TIMEOUT_SECS", " 0 "),
            ("XENIA_REFRESH_DELAY_SECS", "0"),
        ]);
        let settings = Settings::from_lookup(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(settings.update_interval, DEFAULT_UPDATE_INTERVAL);
        assert_eq!(settings.request_timeout, DEFAULT_TIMEOUT);
        assert_eq!(settings.refresh_delay, Duration::ZERO);
    }
}
