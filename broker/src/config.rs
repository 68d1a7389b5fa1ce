//! Store configuration loaded via OrthoConfig.
//!
//! The bootstrapping collaborator loads this once at startup and hands it
//! to [`crate::outbound::persistence::DbPool`]. The engine itself never
//! reads the environment.

use ortho_config::OrthoConfig;
use serde::Deserialize;

const DEFAULT_DATABASE_URL: &str = "postgres://localhost/broker";
const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_CONNECTION_TIMEOUT_SECS: u64 = 30;

/// Configuration for the brokerage's PostgreSQL store.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "BROKER")]
pub struct StoreConfig {
    /// PostgreSQL connection URL.
    pub database_url: Option<String>,
    /// Maximum pooled connections.
    pub max_connections: Option<u32>,
    /// Pool checkout timeout in seconds.
    pub connection_timeout_secs: Option<u64>,
}

impl StoreConfig {
    /// Build a configuration for the given database URL, with defaults for
    /// everything else.
    pub fn for_url(database_url: impl Into<String>) -> Self {
        Self {
            database_url: Some(database_url.into()),
            max_connections: None,
            connection_timeout_secs: None,
        }
    }

    /// The configured database URL, falling back to a local default.
    pub fn database_url(&self) -> &str {
        self.database_url.as_deref().unwrap_or(DEFAULT_DATABASE_URL)
    }

    /// The configured pool size, falling back to the default.
    pub fn max_connections(&self) -> u32 {
        self.max_connections.unwrap_or(DEFAULT_MAX_CONNECTIONS)
    }

    /// The configured checkout timeout, falling back to the default.
    pub fn connection_timeout_secs(&self) -> u64 {
        self.connection_timeout_secs
            .unwrap_or(DEFAULT_CONNECTION_TIMEOUT_SECS)
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for store configuration parsing.

    use super::*;
    use std::ffi::OsString;

    use env_lock::lock_env;
    use rstest::rstest;

    fn load_from_empty_args() -> StoreConfig {
        StoreConfig::load_from_iter([OsString::from("broker")]).expect("config should load")
    }

    #[rstest]
    fn default_values_are_used_when_missing() {
        let _guard = lock_env([
            ("BROKER_DATABASE_URL", None::<String>),
            ("BROKER_MAX_CONNECTIONS", None::<String>),
            ("BROKER_CONNECTION_TIMEOUT_SECS", None::<String>),
        ]);

        let config = load_from_empty_args();
        assert_eq!(config.database_url(), DEFAULT_DATABASE_URL);
        assert_eq!(config.max_connections(), DEFAULT_MAX_CONNECTIONS);
        assert_eq!(
            config.connection_timeout_secs(),
            DEFAULT_CONNECTION_TIMEOUT_SECS
        );
    }

    #[rstest]
    fn environment_overrides_are_respected() {
        let _guard = lock_env([
            (
                "BROKER_DATABASE_URL",
                Some("postgres://db.internal/brokerage".to_owned()),
            ),
            ("BROKER_MAX_CONNECTIONS", Some("25".to_owned())),
            ("BROKER_CONNECTION_TIMEOUT_SECS", Some("5".to_owned())),
        ]);

        let config = load_from_empty_args();
        assert_eq!(config.database_url(), "postgres://db.internal/brokerage");
        assert_eq!(config.max_connections(), 25);
        assert_eq!(config.connection_timeout_secs(), 5);
    }

    #[rstest]
    fn for_url_pins_the_url_only() {
        let config = StoreConfig::for_url("postgres://localhost/test");

        assert_eq!(config.database_url(), "postgres://localhost/test");
        assert_eq!(config.max_connections(), DEFAULT_MAX_CONNECTIONS);
    }
}
