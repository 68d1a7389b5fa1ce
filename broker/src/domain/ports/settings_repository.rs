//! Port for settings persistence.

use async_trait::async_trait;

use crate::domain::SettingKey;

/// Errors raised by settings repository adapters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsRepositoryError {
    /// Repository connection could not be established.
    #[error("settings repository connection failed: {message}")]
    Connection { message: String },

    /// Query or mutation failed during execution.
    #[error("settings repository query failed: {message}")]
    Query { message: String },
}

impl SettingsRepositoryError {
    /// Create a connection error with the given message.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create a query error with the given message.
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
        }
    }
}

/// Port for the string key → string value settings relation.
///
/// Validation is not this port's concern: the typed accessors on
/// [`crate::domain::SettingsService`] reject malformed values before they
/// reach the store.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SettingsRepository: Send + Sync {
    /// Read a raw value; `None` when the key was never written.
    async fn get(&self, key: SettingKey) -> Result<Option<String>, SettingsRepositoryError>;

    /// Write a raw value, overwriting any previous one.
    async fn set(&self, key: SettingKey, value: &str) -> Result<(), SettingsRepositoryError>;
}

/// Fixture implementation that holds no settings.
///
/// Lookups always miss so typed accessors resolve to their documented
/// defaults. Use it in unit tests where settings are not under test.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureSettingsRepository;

#[async_trait]
impl SettingsRepository for FixtureSettingsRepository {
    async fn get(&self, _key: SettingKey) -> Result<Option<String>, SettingsRepositoryError> {
        Ok(None)
    }

    async fn set(&self, _key: SettingKey, _value: &str) -> Result<(), SettingsRepositoryError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fixture_repository_always_misses() {
        let repo = FixtureSettingsRepository;
        let value = repo
            .get(SettingKey::PricePerItem)
            .await
            .expect("fixture get should succeed");
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn fixture_repository_accepts_writes() {
        let repo = FixtureSettingsRepository;
        repo.set(SettingKey::RecoveryContact, "ops@example.com")
            .await
            .expect("fixture set should succeed");
    }
}
