#[cfg(feature = "config")]
use core_config::{ConfigError, FromEnv, env_first_or_default};

/// Broker address used when none of the broker variables is set.
pub const DEFAULT_REDIS_URL: &str = "redis://localhost:6379";

/// Redis connection settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RedisConfig {
    /// Redis connection URL, credentials and database number included
    pub url: String,
}

impl RedisConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self::new(DEFAULT_REDIS_URL)
    }
}

/// Load RedisConfig from environment variables
///
/// The first non-empty of `EVENT_BROKER_URL`, `REDIS_URL`, `REDIS_HOST` wins;
/// otherwise [`DEFAULT_REDIS_URL`].
#[cfg(feature = "config")]
impl FromEnv for RedisConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let url = env_first_or_default(
            &["EVENT_BROKER_URL", "REDIS_URL", "REDIS_HOST"],
            DEFAULT_REDIS_URL,
        );

        Ok(Self { url })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redis_config_default() {
        assert_eq!(RedisConfig::default().url(), "redis://localhost:6379");
    }

    #[cfg(feature = "config")]
    #[test]
    fn test_redis_config_prefers_event_broker_url() {
        temp_env::with_vars(
            [
                ("EVENT_BROKER_URL", Some("redis://broker:6379")),
                ("REDIS_URL", Some("redis://cache:6379")),
            ],
            || {
                let config = RedisConfig::from_env().unwrap();
                assert_eq!(config.url, "redis://broker:6379");
            },
        );
    }

    #[cfg(feature = "config")]
    #[test]
    fn test_redis_config_from_env_with_redis_host() {
        temp_env::with_vars(
            [
                ("EVENT_BROKER_URL", None::<&str>),
                ("REDIS_URL", None::<&str>),
                ("REDIS_HOST", Some("redis://prod:6379")),
            ],
            || {
                let config = RedisConfig::from_env().unwrap();
                assert_eq!(config.url, "redis://prod:6379");
            },
        );
    }

    #[cfg(feature = "config")]
    #[test]
    fn test_redis_config_from_env_falls_back_to_default() {
        temp_env::with_vars(
            [
                ("EVENT_BROKER_URL", None::<&str>),
                ("REDIS_URL", None::<&str>),
                ("REDIS_HOST", None::<&str>),
            ],
            || {
                let config = RedisConfig::from_env().unwrap();
                assert_eq!(config, RedisConfig::default());
            },
        );
    }
}
