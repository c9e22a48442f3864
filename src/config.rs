use std::{fmt::Display, str::FromStr};

use anyhow::Context;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_address: String,
    pub session_minutes: i64,
    pub feed_capacity: usize,
    pub feed_max_channels: usize,
    pub dev_login: bool,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        if let Err(e) = dotenv::dotenv() {
            info!("no .env file loaded: {e}");
        }

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        Ok(Self {
            database_url: try_load(&lookup, "DATABASE_URL", "sqlite://wemake.db?mode=rwc")?,
            bind_address: try_load(&lookup, "BIND_ADDRESS", "0.0.0.0:8080")?,
            session_minutes: try_load(&lookup, "SESSION_MINUTES", "60")?,
            feed_capacity: try_load(&lookup, "FEED_CAPACITY", "64")?,
            feed_max_channels: try_load(&lookup, "FEED_MAX_CHANNELS", "1024")?,
            dev_login: try_load(&lookup, "DEV_LOGIN", "true")?,
        })
    }
}

fn try_load<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> anyhow::Result<T>
where
    T::Err: Display,
{
    let raw = lookup(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    raw.trim()
        .parse()
        .map_err(|e| {
            warn!("Invalid {key} value: {e}");
            anyhow::anyhow!("{e}")
        })
        .with_context(|| format!("{key}={raw}"))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn defaults_apply_when_unset() {
        let config = Config::from_lookup(|_| None).unwrap();
        assert_eq!(config.bind_address, "0.0.0.0:8080");
        assert_eq!(config.feed_capacity, 64);
        assert!(config.dev_login);
    }

    #[test]
    fn values_override_defaults() {
        let vars = HashMap::from([("FEED_MAX_CHANNELS", "3"), ("DEV_LOGIN", "false")]);
        let config = Config::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap();
        assert_eq!(config.feed_max_channels, 3);
        assert!(!config.dev_login);
    }

    #[test]
    fn garbage_is_an_error() {
        let err = Config::from_lookup(|key| (key == "SESSION_MINUTES").then(|| "soon".to_owned())).unwrap_err();
        assert!(format!("{err:#}").contains("SESSION_MINUTES"));
    }
}
