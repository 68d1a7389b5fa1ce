//! Operator-tunable settings.
//!
//! Settings live in a string key → string value relation. This module owns
//! the key vocabulary and the documented defaults; typed parsing and
//! validation happen in [`crate::domain::SettingsService`] before anything
//! reaches the store.

use serde::{Deserialize, Serialize};

use super::item::NamePair;
use super::money::Amount;

/// Setting keys understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKey {
    /// Price credited per submitted item.
    PricePerItem,
    /// Bonus credited to the referrer when a referee's item is approved.
    ReferralBonus,
    /// Recovery contact applied to fulfilled items.
    RecoveryContact,
    /// First name of the assigned name pair.
    FirstName,
    /// Last name of the assigned name pair.
    LastName,
}

impl SettingKey {
    /// The store key string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PricePerItem => "price_per_item",
            Self::ReferralBonus => "referral_bonus",
            Self::RecoveryContact => "recovery_contact",
            Self::FirstName => "first_name",
            Self::LastName => "last_name",
        }
    }
}

/// Documented defaults, used when a key has never been written.
pub mod defaults {
    /// Default price per item.
    pub const PRICE_PER_ITEM: &str = "0.20";
    /// Default referral bonus.
    pub const REFERRAL_BONUS: &str = "0.05";
    /// Sentinel meaning no recovery contact is configured.
    pub const RECOVERY_CONTACT: &str = "none";
}

/// A read-only snapshot of every setting, resolved against defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsSnapshot {
    /// Price credited per submitted item.
    pub price_per_item: Amount,
    /// Referral bonus per approved referee item.
    pub referral_bonus: Amount,
    /// Recovery contact, `"none"` when unset.
    pub recovery_contact: String,
    /// Name pair applied to newly stocked items.
    pub names: NamePair,
}
