use std::str::FromStr;
use std::time::Duration;

use datawatch_core::endpoints::{
    tracker_url, DEFAULT_IDENTITY_URL, DEFAULT_RENEW_URL, DEFAULT_TRACKER_BASE_URL,
};
use datawatch_core::refresh::{DEFAULT_POLL_INTERVAL, DEFAULT_RETRY_BACKOFF, DEFAULT_RETRY_BUDGET};

use crate::scheduler::SchedulerConfig;
use crate::transport::RetryPolicy;

const DEFAULT_DATABASE_URL: &str = "sqlite://datawatch.db?mode=rwc";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be {expected}, got {value:?}")]
    Invalid {
        var: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Agent configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// SQLite database URL.
    pub database_url: String,
    /// Session renewal endpoint.
    pub renew_url: String,
    /// Full tracker URL, data system codes included.
    pub tracker_url: String,
    /// Identity document endpoint.
    pub identity_url: String,
    pub poll_interval: Duration,
    pub retry_backoff: Duration,
    /// Renewal attempts granted to a fresh schedule.
    pub retry_budget: u32,
    /// Per-request HTTP timeout.
    pub http_timeout: Duration,
    pub http_retry: RetryPolicy,
    /// When set, notifications are POSTed here instead of logged.
    pub webhook_url: Option<String>,
    /// Session token handed over by a completed portal login.
    pub session_jwt: Option<String>,
}

impl AgentConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                                             |
    /// |-------------------------|-----------------------------------------------------|
    /// | `DATABASE_URL`          | `sqlite://datawatch.db?mode=rwc`                    |
    /// | `RENEW_URL`             | `https://www.eesti.ee/timur/jwt/extend-jwt-session` |
    /// | `TRACKER_BASE_URL`      | `https://www.eesti.ee/andmejalgija/api/v1/usages`   |
    /// | `IDENTITY_URL`          | `https://www.eesti.ee/api/xroad/v2/rr/kodanik/info` |
    /// | `POLL_INTERVAL_SECS`    | `300`                                               |
    /// | `RETRY_BACKOFF_SECS`    | `30`                                                |
    /// | `RETRY_BUDGET`          | `20`                                                |
    /// | `HTTP_TIMEOUT_SECS`     | `30`                                                |
    /// | `HTTP_RETRY_ATTEMPTS`   | `3`                                                 |
    /// | `HTTP_RETRY_DELAY_SECS` | `2`                                                 |
    /// | `NOTIFY_WEBHOOK_URL`    | unset                                               |
    /// | `SESSION_JWT`           | unset                                               |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let string = |key: &str, default: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        let optional = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let tracker_base = string("TRACKER_BASE_URL", DEFAULT_TRACKER_BASE_URL);
        let http_retry = RetryPolicy {
            attempts: positive(&lookup, "HTTP_RETRY_ATTEMPTS", 3)?,
            delay: Duration::from_secs(parse(
                &lookup,
                "HTTP_RETRY_DELAY_SECS",
                2u64,
                "a whole number",
            )?),
        };

        Ok(Self {
            database_url: string("DATABASE_URL", DEFAULT_DATABASE_URL),
            renew_url: string("RENEW_URL", DEFAULT_RENEW_URL),
            tracker_url: tracker_url(&tracker_base),
            identity_url: string("IDENTITY_URL", DEFAULT_IDENTITY_URL),
            poll_interval: secs(&lookup, "POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL)?,
            retry_backoff: secs(&lookup, "RETRY_BACKOFF_SECS", DEFAULT_RETRY_BACKOFF)?,
            retry_budget: positive(&lookup, "RETRY_BUDGET", DEFAULT_RETRY_BUDGET)?,
            http_timeout: secs(&lookup, "HTTP_TIMEOUT_SECS", Duration::from_secs(30))?,
            http_retry,
            webhook_url: optional("NOTIFY_WEBHOOK_URL"),
            session_jwt: optional("SESSION_JWT"),
        })
    }

    pub fn scheduler(&self) -> SchedulerConfig {
        SchedulerConfig {
            poll_interval: self.poll_interval,
            retry_backoff: self.retry_backoff,
            retry_budget: self.retry_budget,
        }
    }
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
    expected: &'static str,
) -> Result<T, ConfigError> {
    match lookup(var) {
        None => Ok(default),
        Some(value) if value.trim().is_empty() => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
            var,
            expected,
            value,
        }),
    }
}

fn positive(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: u32,
) -> Result<u32, ConfigError> {
    let value = parse(lookup, var, default, "a positive whole number")?;
    if value == 0 {
        return Err(ConfigError::Invalid {
            var,
            expected: "a positive whole number",
            value: "0".into(),
        });
    }
    Ok(value)
}

fn secs(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    let value = parse(lookup, var, default.as_secs(), "a positive number of seconds")?;
    if value == 0 {
        return Err(ConfigError::Invalid {
            var,
            expected: "a positive number of seconds",
            value: "0".into(),
        });
    }
    Ok(Duration::from_secs(value))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<AgentConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AgentConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = load(&[]).unwrap();

        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.renew_url, DEFAULT_RENEW_URL);
        assert!(config.tracker_url.starts_with(DEFAULT_TRACKER_BASE_URL));
        assert!(config.tracker_url.contains("dataSystemCodes="));
        assert_eq!(config.poll_interval, Duration::from_secs(300));
        assert_eq!(config.retry_backoff, Duration::from_secs(30));
        assert_eq!(config.retry_budget, 20);
        assert_eq!(config.http_retry, RetryPolicy::default());
        assert!(config.webhook_url.is_none());
        assert!(config.session_jwt.is_none());
    }

    #[test]
    fn overrides_are_read() {
        let config = load(&[
            ("POLL_INTERVAL_SECS", "60"),
            ("RETRY_BUDGET", "3"),
            ("NOTIFY_WEBHOOK_URL", "http://hooks.local/datawatch"),
            ("TRACKER_BASE_URL", "http://tracker.local/usages"),
        ])
        .unwrap();

        assert_eq!(config.poll_interval, Duration::from_secs(60));
        assert_eq!(config.retry_budget, 3);
        assert_eq!(config.webhook_url.as_deref(), Some("http://hooks.local/datawatch"));
        assert!(config.tracker_url.starts_with("http://tracker.local/usages?"));
        assert_eq!(config.scheduler().retry_budget, 3);
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let config = load(&[("RETRY_BUDGET", " "), ("SESSION_JWT", "")]).unwrap();
        assert_eq!(config.retry_budget, 20);
        assert!(config.session_jwt.is_none());
    }

    #[test]
    fn non_numeric_value_is_rejected() {
        let err = load(&[("POLL_INTERVAL_SECS", "five")]).unwrap_err();
        assert!(err.to_string().contains("POLL_INTERVAL_SECS"));
    }

    #[test]
    fn zero_budget_is_rejected() {
        assert!(load(&[("RETRY_BUDGET", "0")]).is_err());
    }
}
