//! Runtime configuration read from the environment.

use std::{env, fmt::Display, str::FromStr, time::Duration};

use secrecy::SecretString;
use thiserror::Error;
use tracing::{debug, warn};

const DEV_JWT_SECRET: &str = "dev-only-insecure-jwt-secret";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {key}='{value}': {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Where item documents are downloaded from.
#[derive(Debug, Clone)]
pub struct ItemSourceConfig {
    /// GitHub `owner/name`.
    pub repo: String,
    pub branch: String,
    pub region: String,
    /// Language whose labels identify info-block elements.
    pub lang: String,
    pub github_token: Option<SecretString>,
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub enabled: bool,
    pub interval: Duration,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub jwt_secret: SecretString,
    pub cors_origins: Vec<String>,
    pub cors_origin_suffixes: Vec<String>,
    pub sync: SyncConfig,
    pub items: ItemSourceConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let loader = Loader { lookup };

        let jwt_secret = match loader.get("JWT_SECRET") {
            Some(secret) => SecretString::from(secret),
            None => {
                warn!("JWT_SECRET not set, using an insecure development secret");
                SecretString::from(DEV_JWT_SECRET.to_string())
            }
        };

        let interval_secs: u64 = loader.parse("SYNC_INTERVAL_SECS", "86400")?;
        if interval_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "SYNC_INTERVAL_SECS",
                value: interval_secs.to_string(),
                reason: "must be greater than zero".into(),
            });
        }

        let repo = loader.string("ITEMS_REPO", "EXBO-Studio/stalcraft-database");
        if !is_owner_slash_name(&repo) {
            return Err(ConfigError::Invalid {
                key: "ITEMS_REPO",
                value: repo,
                reason: "expected owner/name".into(),
            });
        }

        Ok(Self {
            host: loader.string("HOST", "0.0.0.0"),
            port: loader.parse("PORT", "3000")?,
            database_url: loader.string("DATABASE_URL", "sqlite://loadouts.db"),
            jwt_secret,
            cors_origins: split_list(&loader.string("CORS_ORIGINS", "http://localhost:3001")),
            cors_origin_suffixes: split_list(&loader.string("CORS_ORIGIN_SUFFIXES", ".tunnel4.com")),
            sync: SyncConfig {
                enabled: loader.parse("SYNC_ENABLED", "true")?,
                interval: Duration::from_secs(interval_secs),
            },
            items: ItemSourceConfig {
                repo,
                branch: loader.string("ITEMS_BRANCH", "main"),
                region: loader.string("ITEMS_REGION", "ru"),
                lang: loader.string("ITEMS_LANG", "ru"),
                github_token: loader.get("GITHUB_TOKEN").map(SecretString::from),
            },
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

struct Loader<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> Loader<F> {
    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn string(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| {
            debug!("{key} not set, using default: {default}");
            default.to_string()
        })
    }

    fn parse<T>(&self, key: &'static str, default: &str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        let value = self.string(key, default);
        value.parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
            value,
        })
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn is_owner_slash_name(repo: &str) -> bool {
    matches!(repo.split_once('/'), Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/'))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn config_with(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = config_with(&[]).unwrap();
        assert_eq!(config.bind_addr(), "0.0.0.0:3000");
        assert_eq!(config.database_url, "sqlite://loadouts.db");
        assert_eq!(config.cors_origins, vec!["http://localhost:3001"]);
        assert_eq!(config.cors_origin_suffixes, vec![".tunnel4.com"]);
        assert!(config.sync.enabled);
        assert_eq!(config.sync.interval, Duration::from_secs(86400));
        assert_eq!(config.items.repo, "EXBO-Studio/stalcraft-database");
        assert_eq!(config.items.lang, "ru");
        assert!(config.items.github_token.is_none());
        assert_eq!(config.jwt_secret.expose_secret(), DEV_JWT_SECRET);
    }

    #[test]
    fn lists_are_split_and_trimmed() {
        let config = config_with(&[
            ("CORS_ORIGINS", "http://a.test, http://b.test ,,"),
            ("SYNC_ENABLED", "false"),
        ])
        .unwrap();
        assert_eq!(config.cors_origins, vec!["http://a.test", "http://b.test"]);
        assert!(!config.sync.enabled);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            config_with(&[("PORT", "http")]),
            Err(ConfigError::Invalid { key: "PORT", .. })
        ));
        assert!(matches!(
            config_with(&[("SYNC_INTERVAL_SECS", "0")]),
            Err(ConfigError::Invalid { key: "SYNC_INTERVAL_SECS", .. })
        ));
        assert!(matches!(
            config_with(&[("ITEMS_REPO", "just-a-name")]),
            Err(ConfigError::Invalid { key: "ITEMS_REPO", .. })
        ));
    }
}
