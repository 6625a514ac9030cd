//! Client configuration from environment variables.

use std::str::FromStr;
use std::time::Duration;

use url::Url;

/// Reconnect policy: a fixed delay between attempts and a retry ceiling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Maximum number of consecutive reconnect attempts before giving up
    pub max_attempts: u32,
    /// Delay before every attempt
    pub delay: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            delay: Duration::from_secs(5),
        }
    }
}

impl ReconnectConfig {
    /// Delay before the given attempt. The policy is flat: no backoff, no jitter.
    pub fn delay_for_attempt(&self, _attempt: u32) -> Duration {
        self.delay
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid {name}: {reason}")]
    InvalidUrl { name: &'static str, reason: String },
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// Settings for the notification session.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// WebSocket endpoint of the notification channel (no credentials in it)
    pub ws_url: String,
    /// Base URL of the REST API
    pub api_base_url: String,
    /// Interval between keep-alive pings once authenticated
    pub keepalive_interval: Duration,
    /// Upper bound for opening the socket
    pub connect_timeout: Duration,
    pub reconnect: ReconnectConfig,
    /// How many notifications `load_initial` fetches
    pub initial_limit: usize,
    /// How long toasts stay visible
    pub toast_duration: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            ws_url: "ws://localhost:8000/ws/notifications".to_string(),
            api_base_url: "http://localhost:8000".to_string(),
            keepalive_interval: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            reconnect: ReconnectConfig::default(),
            initial_limit: 20,
            toast_duration: Duration::from_secs(5),
        }
    }
}

impl ClientConfig {
    /// Build the configuration from environment variables.
    ///
    /// Environment variables:
    /// - `MFGDESK_WS_URL`: WebSocket endpoint (default: "ws://localhost:8000/ws/notifications")
    /// - `MFGDESK_API_URL`: REST base URL (default: "http://localhost:8000")
    /// - `MFGDESK_KEEPALIVE_SECS`: keep-alive interval (default: 30)
    /// - `MFGDESK_RECONNECT_DELAY_SECS`: delay between reconnects (default: 5)
    /// - `MFGDESK_RECONNECT_MAX_ATTEMPTS`: retry ceiling (default: 10)
    /// - `MFGDESK_CONNECT_TIMEOUT_SECS`: socket open timeout (default: 10)
    /// - `MFGDESK_NOTIFICATION_LIMIT`: initial fetch size (default: 20)
    /// - `MFGDESK_TOAST_SECS`: toast lifetime (default: 5)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ClientConfig::from_env`] with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let secs = |key: &str, default: Duration| {
            parse_or(&lookup, key, default.as_secs()).map_or(default, Duration::from_secs)
        };

        Self {
            ws_url: lookup("MFGDESK_WS_URL").unwrap_or(defaults.ws_url),
            api_base_url: lookup("MFGDESK_API_URL").unwrap_or(defaults.api_base_url),
            keepalive_interval: secs("MFGDESK_KEEPALIVE_SECS", defaults.keepalive_interval),
            connect_timeout: secs("MFGDESK_CONNECT_TIMEOUT_SECS", defaults.connect_timeout),
            reconnect: ReconnectConfig {
                max_attempts: parse_or(
                    &lookup,
                    "MFGDESK_RECONNECT_MAX_ATTEMPTS",
                    defaults.reconnect.max_attempts,
                )
                .unwrap_or(defaults.reconnect.max_attempts),
                delay: secs("MFGDESK_RECONNECT_DELAY_SECS", defaults.reconnect.delay),
            },
            initial_limit: parse_or(&lookup, "MFGDESK_NOTIFICATION_LIMIT", defaults.initial_limit)
                .unwrap_or(defaults.initial_limit),
            toast_duration: secs("MFGDESK_TOAST_SECS", defaults.toast_duration),
        }
    }

    pub fn with_ws_url(mut self, ws_url: impl Into<String>) -> Self {
        self.ws_url = ws_url.into();
        self
    }

    pub fn with_api_base_url(mut self, api_base_url: impl Into<String>) -> Self {
        self.api_base_url = api_base_url.into();
        self
    }

    pub fn with_keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = interval;
        self
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Check URLs and intervals.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_url("MFGDESK_WS_URL", &self.ws_url, &["ws", "wss"])?;
        check_url("MFGDESK_API_URL", &self.api_base_url, &["http", "https"])?;
        if self.keepalive_interval.is_zero() {
            return Err(ConfigError::Zero("keep-alive interval"));
        }
        if self.connect_timeout.is_zero() {
            return Err(ConfigError::Zero("connect timeout"));
        }
        if self.reconnect.delay.is_zero() {
            return Err(ConfigError::Zero("reconnect delay"));
        }
        if self.initial_limit == 0 {
            return Err(ConfigError::Zero("notification limit"));
        }
        Ok(())
    }
}

fn parse_or<T: FromStr + Copy>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            crate::log_warn!("Ignoring unparsable {}={:?}, using default", key, raw);
            Some(default)
        }
    }
}

fn check_url(name: &'static str, raw: &str, schemes: &[&str]) -> Result<(), ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::InvalidUrl {
        name,
        reason: e.to_string(),
    })?;
    if !schemes.contains(&url.scheme()) {
        return Err(ConfigError::InvalidUrl {
            name,
            reason: format!("unsupported scheme '{}'", url.scheme()),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_the_documented_policy() {
        let config = ClientConfig::from_lookup(lookup(&[]));
        assert_eq!(config.keepalive_interval, Duration::from_secs(30));
        assert_eq!(config.reconnect.delay, Duration::from_secs(5));
        assert_eq!(config.reconnect.max_attempts, 10);
        assert_eq!(config.initial_limit, 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn reads_overrides_and_ignores_garbage() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("MFGDESK_WS_URL", "wss://erp.example.com/ws/notifications"),
            ("MFGDESK_RECONNECT_MAX_ATTEMPTS", "3"),
            ("MFGDESK_KEEPALIVE_SECS", "soon"),
        ]));
        assert_eq!(config.ws_url, "wss://erp.example.com/ws/notifications");
        assert_eq!(config.reconnect.max_attempts, 3);
        assert_eq!(config.keepalive_interval, Duration::from_secs(30));
    }

    #[test]
    fn fixed_delay_does_not_grow() {
        let reconnect = ReconnectConfig::default();
        assert_eq!(reconnect.delay_for_attempt(1), reconnect.delay_for_attempt(9));
    }

    #[test]
    fn validate_rejects_wrong_schemes_and_zero_intervals() {
        let config = ClientConfig::default().with_ws_url("http://localhost/ws");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidUrl { name: "MFGDESK_WS_URL", .. })
        ));

        let config = ClientConfig::default().with_keepalive_interval(Duration::ZERO);
        assert_eq!(config.validate(), Err(ConfigError::Zero("keep-alive interval")));
    }
}
