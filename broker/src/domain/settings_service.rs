//! Typed access to the settings store.
//!
//! The repository holds raw strings; this service owns the parsing and the
//! validation. Malformed numeric input never reaches the store: it is
//! rejected here with an `InvalidRequest` error carrying the offending
//! input.

use std::sync::Arc;

use crate::domain::ports::{SettingsRepository, SettingsRepositoryError};
use crate::domain::settings::{defaults, SettingKey, SettingsSnapshot};
use crate::domain::{Amount, Error, NamePair};

/// Settings service.
pub struct SettingsService<S> {
    settings: Arc<S>,
}

impl<S> Clone for SettingsService<S> {
    fn clone(&self) -> Self {
        Self {
            settings: Arc::clone(&self.settings),
        }
    }
}

impl<S> SettingsService<S> {
    /// Create a new service over the settings port.
    pub fn new(settings: Arc<S>) -> Self {
        Self { settings }
    }
}

fn map_settings_error(error: SettingsRepositoryError) -> Error {
    match error {
        SettingsRepositoryError::Connection { message }
        | SettingsRepositoryError::Query { message } => Error::store_unavailable(message),
    }
}

impl<S> SettingsService<S>
where
    S: SettingsRepository,
{
    async fn amount_setting(&self, key: SettingKey, fallback: &str) -> Result<Amount, Error> {
        let raw = self
            .settings
            .get(key)
            .await
            .map_err(map_settings_error)?
            .unwrap_or_else(|| fallback.to_owned());

        Amount::parse(&raw).map_err(|err| {
            Error::internal(format!("stored {} is malformed: {err}", key.as_str()))
        })
    }

    async fn set_amount_setting(&self, key: SettingKey, input: &str) -> Result<Amount, Error> {
        let amount = Amount::parse(input).map_err(|err| {
            Error::invalid_request(err.to_string())
                .with_details(serde_json::json!({ "input": input }))
        })?;

        self.settings
            .set(key, &amount.to_string())
            .await
            .map_err(map_settings_error)?;

        tracing::info!(key = key.as_str(), value = %amount, "setting updated");
        Ok(amount)
    }

    /// Price credited per submitted item.
    pub async fn price(&self) -> Result<Amount, Error> {
        self.amount_setting(SettingKey::PricePerItem, defaults::PRICE_PER_ITEM)
            .await
    }

    /// Update the price, validating the input first.
    pub async fn set_price(&self, input: &str) -> Result<Amount, Error> {
        self.set_amount_setting(SettingKey::PricePerItem, input)
            .await
    }

    /// Referral bonus per approved referee item.
    pub async fn referral_bonus(&self) -> Result<Amount, Error> {
        self.amount_setting(SettingKey::ReferralBonus, defaults::REFERRAL_BONUS)
            .await
    }

    /// Update the referral bonus, validating the input first.
    pub async fn set_referral_bonus(&self, input: &str) -> Result<Amount, Error> {
        self.set_amount_setting(SettingKey::ReferralBonus, input)
            .await
    }

    /// Recovery contact, `"none"` when unset.
    pub async fn recovery_contact(&self) -> Result<String, Error> {
        Ok(self
            .settings
            .get(SettingKey::RecoveryContact)
            .await
            .map_err(map_settings_error)?
            .unwrap_or_else(|| defaults::RECOVERY_CONTACT.to_owned()))
    }

    /// Update the recovery contact.
    pub async fn set_recovery_contact(&self, contact: &str) -> Result<(), Error> {
        let trimmed = contact.trim();
        if trimmed.is_empty() {
            return Err(Error::invalid_request("recovery contact must not be blank"));
        }
        self.settings
            .set(SettingKey::RecoveryContact, trimmed)
            .await
            .map_err(map_settings_error)
    }

    /// Name pair applied to newly stocked items.
    pub async fn names(&self) -> Result<NamePair, Error> {
        let first = self
            .settings
            .get(SettingKey::FirstName)
            .await
            .map_err(map_settings_error)?;
        let last = self
            .settings
            .get(SettingKey::LastName)
            .await
            .map_err(map_settings_error)?;

        Ok(match (first, last) {
            (Some(first), Some(last)) => NamePair::new(first, last),
            (Some(first), None) => NamePair::new(first, crate::domain::item::WILDCARD_NAME),
            (None, Some(last)) => NamePair::new(crate::domain::item::WILDCARD_NAME, last),
            (None, None) => NamePair::wildcard(),
        })
    }

    /// Update the name pair.
    pub async fn set_names(&self, names: &NamePair) -> Result<(), Error> {
        self.settings
            .set(SettingKey::FirstName, &names.first)
            .await
            .map_err(map_settings_error)?;
        self.settings
            .set(SettingKey::LastName, &names.last)
            .await
            .map_err(map_settings_error)
    }

    /// Every setting resolved against defaults, read in one pass.
    pub async fn snapshot(&self) -> Result<SettingsSnapshot, Error> {
        Ok(SettingsSnapshot {
            price_per_item: self.price().await?,
            referral_bonus: self.referral_bonus().await?,
            recovery_contact: self.recovery_contact().await?,
            names: self.names().await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{FixtureSettingsRepository, MockSettingsRepository};
    use crate::domain::ErrorCode;

    #[tokio::test]
    async fn missing_keys_resolve_to_documented_defaults() {
        let service = SettingsService::new(Arc::new(FixtureSettingsRepository));

        let snapshot = service.snapshot().await.expect("snapshot");
        assert_eq!(snapshot.price_per_item, Amount::parse("0.20").expect("amount"));
        assert_eq!(
            snapshot.referral_bonus,
            Amount::parse("0.05").expect("amount")
        );
        assert_eq!(snapshot.recovery_contact, "none");
        assert!(snapshot.names.is_wildcard());
    }

    #[tokio::test]
    async fn set_price_rejects_negative_input() {
        let service = SettingsService::new(Arc::new(MockSettingsRepository::new()));

        let error = service.set_price("-0.10").await.expect_err("negative");
        assert_eq!(error.code(), ErrorCode::InvalidRequest);
    }

    #[tokio::test]
    async fn set_price_rejects_garbage_input() {
        let service = SettingsService::new(Arc::new(MockSettingsRepository::new()));

        let error = service.set_price("cheap").await.expect_err("garbage");
        assert_eq!(error.code(), ErrorCode::InvalidRequest);
    }

    #[tokio::test]
    async fn set_price_normalises_and_stores() {
        let mut repo = MockSettingsRepository::new();
        repo.expect_set()
            .withf(|key, value| *key == SettingKey::PricePerItem && value == "0.25")
            .times(1)
            .return_once(|_, _| Ok(()));

        let service = SettingsService::new(Arc::new(repo));
        let stored = service.set_price(" 0.25 ").await.expect("stores");

        assert_eq!(stored, Amount::parse("0.25").expect("amount"));
    }

    #[tokio::test]
    async fn malformed_stored_price_is_an_internal_error() {
        let mut repo = MockSettingsRepository::new();
        repo.expect_get()
            .times(1)
            .return_once(|_| Ok(Some("not-a-number".to_owned())));

        let service = SettingsService::new(Arc::new(repo));
        let error = service.price().await.expect_err("malformed");

        assert_eq!(error.code(), ErrorCode::InternalError);
    }

    #[tokio::test]
    async fn blank_recovery_contact_is_rejected() {
        let service = SettingsService::new(Arc::new(MockSettingsRepository::new()));

        let error = service
            .set_recovery_contact("   ")
            .await
            .expect_err("blank");
        assert_eq!(error.code(), ErrorCode::InvalidRequest);
    }
}
