//! Users and their ledger state.
//!
//! A user record carries the two balances the engines move money between:
//! `available` (withdrawable) and `hold` (credited at submission, released
//! or reversed at resolution). Payment details are a free-form method → id
//! map merged key-by-key, never replaced wholesale.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::money::Amount;

/// Stable user identifier, assigned by the chat platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Mapping from payment-method name to account identifier.
pub type PaymentInfo = BTreeMap<String, String>;

/// Display name recorded for ledger rows repaired during submission.
pub const REPAIRED_DISPLAY_NAME: &str = "Unknown";

/// A user's ledger record.
///
/// ## Invariants
/// - `available` and `hold` are non-negative (enforced by [`Amount`]).
/// - `referred_by` is set once at enrollment and never equals `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAccount {
    /// Platform-assigned identifier.
    pub id: UserId,
    /// Display name captured at enrollment.
    pub display_name: String,
    /// Withdrawable balance.
    pub available: Amount,
    /// Balance credited for submitted items awaiting review.
    pub hold: Amount,
    /// Saved payment methods.
    pub payment_info: PaymentInfo,
    /// The user who referred this one, if any.
    pub referred_by: Option<UserId>,
    /// Enrollment timestamp.
    pub created_at: DateTime<Utc>,
}

/// Both balances of one user, read together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Balances {
    /// Withdrawable balance.
    pub available: Amount,
    /// Held balance awaiting review.
    pub hold: Amount,
}

/// Input to user enrollment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enrollment {
    /// Platform-assigned identifier.
    pub user_id: UserId,
    /// Display name as supplied by the platform.
    pub display_name: String,
    /// Referrer extracted from the invite link, if any.
    pub referred_by: Option<UserId>,
}

impl Enrollment {
    /// Build an enrollment request.
    pub fn new(user_id: UserId, display_name: impl Into<String>) -> Self {
        Self {
            user_id,
            display_name: display_name.into(),
            referred_by: None,
        }
    }

    /// Attach a referrer.
    pub fn with_referrer(mut self, referrer: UserId) -> Self {
        self.referred_by = Some(referrer);
        self
    }

    /// Drop a self-referral, returning `true` when one was present.
    ///
    /// Users cannot refer themselves; the link is scrubbed rather than the
    /// enrollment rejected, so the user still registers.
    pub fn scrub_self_referral(&mut self) -> bool {
        if self.referred_by == Some(self.user_id) {
            self.referred_by = None;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn self_referral_is_scrubbed() {
        let mut enrollment = Enrollment::new(UserId(5), "five").with_referrer(UserId(5));
        assert!(enrollment.scrub_self_referral());
        assert_eq!(enrollment.referred_by, None);
    }

    #[rstest]
    fn foreign_referral_is_kept() {
        let mut enrollment = Enrollment::new(UserId(5), "five").with_referrer(UserId(9));
        assert!(!enrollment.scrub_self_referral());
        assert_eq!(enrollment.referred_by, Some(UserId(9)));
    }

    #[rstest]
    fn balances_default_to_zero() {
        let balances = Balances::default();
        assert_eq!(balances.available, Amount::ZERO);
        assert_eq!(balances.hold, Amount::ZERO);
    }
}
