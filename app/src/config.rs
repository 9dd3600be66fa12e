//! Configuration management for the registry binary.
//!
//! Loads configuration from environment variables with sensible defaults.

use serde::{Deserialize, Serialize};
use std::env;
use std::net::SocketAddr;
use thiserror::Error;
use tokenmaster_core::Identity;
use tokenmaster_registry::RegistryConfig;
use tokenmaster_runtime::StoreConfig;

/// Errors from configuration loading
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable is set but its value is unusable
    #[error("Invalid value {value:?} for {variable}: {reason}")]
    Invalid {
        /// Environment variable name
        variable: &'static str,
        /// Raw value found
        value: String,
        /// What is wrong with it
        reason: String,
    },
}

impl ConfigError {
    fn invalid(variable: &'static str, value: &str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            variable,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// Registry identity settings
    pub registry: RegistrySettings,
    /// Store runtime settings
    pub store: StoreSettings,
    /// Prometheus exporter settings
    pub metrics: MetricsConfig,
}

/// Registry identity settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegistrySettings {
    /// Display name (`REGISTRY_NAME`)
    pub name: String,
    /// Display symbol (`REGISTRY_SYMBOL`)
    pub symbol: String,
    /// Issuer identity (`REGISTRY_ISSUER`)
    pub issuer: String,
}

/// Store runtime settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreSettings {
    /// Event broadcast capacity (`EVENT_BROADCAST_CAPACITY`)
    pub event_capacity: usize,
}

/// Prometheus exporter settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MetricsConfig {
    /// Install the recorder (`METRICS_ENABLED`)
    pub enabled: bool,
    /// Bind host (`METRICS_HOST`)
    pub host: String,
    /// Bind port (`METRICS_PORT`)
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            registry: RegistrySettings {
                name: "TokenMaster".to_string(),
                symbol: "TM".to_string(),
                issuer: "issuer".to_string(),
            },
            store: StoreSettings { event_capacity: 64 },
            metrics: MetricsConfig {
                enabled: false,
                host: "0.0.0.0".to_string(),
                port: 9090,
            },
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a variable is set to an unusable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// Unset variables fall back to [`Config::default`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a variable is set to an unusable value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let config = Self {
            registry: RegistrySettings {
                name: lookup("REGISTRY_NAME").unwrap_or(defaults.registry.name),
                symbol: lookup("REGISTRY_SYMBOL").unwrap_or(defaults.registry.symbol),
                issuer: lookup("REGISTRY_ISSUER").unwrap_or(defaults.registry.issuer),
            },
            store: StoreSettings {
                event_capacity: parse_var(
                    &lookup,
                    "EVENT_BROADCAST_CAPACITY",
                    defaults.store.event_capacity,
                )?,
            },
            metrics: MetricsConfig {
                enabled: parse_var(&lookup, "METRICS_ENABLED", defaults.metrics.enabled)?,
                host: lookup("METRICS_HOST").unwrap_or(defaults.metrics.host),
                port: parse_var(&lookup, "METRICS_PORT", defaults.metrics.port)?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.registry.issuer.trim().is_empty() {
            return Err(ConfigError::invalid(
                "REGISTRY_ISSUER",
                &self.registry.issuer,
                "issuer must not be blank",
            ));
        }
        if self.store.event_capacity == 0 {
            return Err(ConfigError::invalid(
                "EVENT_BROADCAST_CAPACITY",
                "0",
                "capacity must be at least 1",
            ));
        }
        self.metrics_addr().map(|_| ())
    }

    /// Registry construction settings
    #[must_use]
    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig::new(
            self.registry.name.clone(),
            self.registry.symbol.clone(),
            Identity::new(self.registry.issuer.clone()),
        )
    }

    /// Store runtime settings
    #[must_use]
    pub const fn store_config(&self) -> StoreConfig {
        StoreConfig::new(self.store.event_capacity)
    }

    /// Exporter socket address
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if host and port do not form a socket address.
    pub fn metrics_addr(&self) -> Result<SocketAddr, ConfigError> {
        let raw = format!("{}:{}", self.metrics.host, self.metrics.port);
        raw.parse()
            .map_err(|error: std::net::AddrParseError| {
                ConfigError::invalid("METRICS_HOST", &self.metrics.host, error.to_string())
            })
    }
}

fn parse_var<F, T>(lookup: &F, variable: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(variable) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|error: T::Err| ConfigError::invalid(variable, &raw, error.to_string())),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_nothing_is_set() {
        let config = Config::from_lookup(|_| None).unwrap();

        assert_eq!(config, Config::default());
        assert_eq!(config.registry_config(), RegistryConfig::default());
        assert_eq!(config.store_config().event_capacity, 64);
        assert_eq!(config.metrics_addr().unwrap().port(), 9090);
    }

    #[test]
    fn test_overrides_are_applied() {
        let config = Config::from_lookup(lookup_from(&[
            ("REGISTRY_NAME", "Concerts"),
            ("REGISTRY_SYMBOL", "CNC"),
            ("REGISTRY_ISSUER", "0xabc"),
            ("EVENT_BROADCAST_CAPACITY", "256"),
            ("METRICS_ENABLED", "true"),
            ("METRICS_HOST", "127.0.0.1"),
            ("METRICS_PORT", "9100"),
        ]))
        .unwrap();

        assert_eq!(config.registry.name, "Concerts");
        assert_eq!(config.registry_config().issuer, Identity::new("0xabc"));
        assert_eq!(config.store.event_capacity, 256);
        assert!(config.metrics.enabled);
        assert_eq!(config.metrics_addr().unwrap(), "127.0.0.1:9100".parse().unwrap());
    }

    #[test]
    fn test_unparsable_number_is_an_error() {
        let error = Config::from_lookup(lookup_from(&[("METRICS_PORT", "ninety")])).unwrap_err();

        assert!(matches!(
            error,
            ConfigError::Invalid { variable: "METRICS_PORT", .. }
        ));
    }

    #[test]
    fn test_zero_capacity_is_an_error() {
        let error =
            Config::from_lookup(lookup_from(&[("EVENT_BROADCAST_CAPACITY", "0")])).unwrap_err();

        assert!(matches!(
            error,
            ConfigError::Invalid { variable: "EVENT_BROADCAST_CAPACITY", .. }
        ));
    }

    #[test]
    fn test_blank_issuer_is_an_error() {
        let error = Config::from_lookup(lookup_from(&[("REGISTRY_ISSUER", "  ")])).unwrap_err();

        assert_eq!(
            error.to_string(),
            "Invalid value \"  \" for REGISTRY_ISSUER: issuer must not be blank"
        );
    }

    #[test]
    fn test_bad_metrics_host_is_an_error() {
        let error =
            Config::from_lookup(lookup_from(&[("METRICS_HOST", "not a host")])).unwrap_err();

        assert!(matches!(error, ConfigError::Invalid { variable: "METRICS_HOST", .. }));
    }
}
