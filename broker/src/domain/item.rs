//! Inventory items and their lifecycle.
//!
//! An item is one unit of tradable stock: a credential pair loaded by the
//! operator, claimed by exactly one user at a time, and resolved by an
//! administrator. Lifecycle transitions are owned by the allocation and
//! approval services; this module only defines the shapes and the status
//! vocabulary.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::UserId;

/// Stable inventory item identifier, assigned by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub i64);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Lifecycle status of an inventory item.
///
/// Transitions: `available` → `pending` → `submitted` → `sold` or
/// `rejected`; `pending` may return to `available` when the user cancels.
/// `sold` and `rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// In the pool, claimable by any user.
    Available,
    /// Claimed by one user, not yet submitted.
    Pending,
    /// Submitted for review; hold balance credited.
    Submitted,
    /// Approved by an administrator. Terminal.
    Sold,
    /// Rejected by an administrator. Terminal.
    Rejected,
}

impl ItemStatus {
    /// Returns the database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Pending => "pending",
            Self::Submitted => "submitted",
            Self::Sold => "sold",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown status string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseItemStatusError {
    /// The unrecognised input value.
    pub input: String,
}

impl fmt::Display for ParseItemStatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown item status: {}", self.input)
    }
}

impl std::error::Error for ParseItemStatusError {}

impl std::str::FromStr for ItemStatus {
    type Err = ParseItemStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(Self::Available),
            "pending" => Ok(Self::Pending),
            "submitted" => Ok(Self::Submitted),
            "sold" => Ok(Self::Sold),
            "rejected" => Ok(Self::Rejected),
            _ => Err(ParseItemStatusError {
                input: s.to_owned(),
            }),
        }
    }
}

/// First/last name pair assigned to an item.
///
/// The wildcard pair (`Any`/`Any`) means any name is acceptable during
/// fulfilment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamePair {
    /// Assigned first name.
    pub first: String,
    /// Assigned last name.
    pub last: String,
}

/// The wildcard name value meaning "any name acceptable".
pub const WILDCARD_NAME: &str = "Any";

impl NamePair {
    /// Build a pair from explicit names.
    pub fn new(first: impl Into<String>, last: impl Into<String>) -> Self {
        Self {
            first: first.into(),
            last: last.into(),
        }
    }

    /// The wildcard pair.
    pub fn wildcard() -> Self {
        Self::new(WILDCARD_NAME, WILDCARD_NAME)
    }

    /// Whether this pair is the wildcard pair.
    pub fn is_wildcard(&self) -> bool {
        self.first == WILDCARD_NAME && self.last == WILDCARD_NAME
    }
}

impl Default for NamePair {
    fn default() -> Self {
        Self::wildcard()
    }
}

/// One unit of tradable inventory.
///
/// ## Invariants
/// - `assigned_to` is `Some` iff `status` is `pending`, `submitted`, `sold`,
///   or `rejected`.
/// - At most one item per user is `pending` at any time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    /// Store-assigned identifier.
    pub id: ItemId,
    /// Login credential (unique across the pool).
    pub login: String,
    /// Secret credential.
    pub secret: String,
    /// Name pair the fulfilling user must apply.
    pub names: NamePair,
    /// Current lifecycle status.
    pub status: ItemStatus,
    /// User currently bound to this item, if any.
    pub assigned_to: Option<UserId>,
    /// Creation timestamp; claims are served FIFO by this field.
    pub created_at: DateTime<Utc>,
}

/// A credential pair queued for intake, before the store assigns an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemDraft {
    /// Login credential.
    pub login: String,
    /// Secret credential.
    pub secret: String,
    /// Name pair; wildcard when the operator did not specify one.
    #[serde(default)]
    pub names: NamePair,
}

impl ItemDraft {
    /// Build a draft with the wildcard name pair.
    pub fn new(login: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            secret: secret.into(),
            names: NamePair::wildcard(),
        }
    }

    /// Attach an explicit name pair.
    pub fn with_names(mut self, names: NamePair) -> Self {
        self.names = names;
        self
    }
}

/// Outcome of a bulk intake: how many drafts landed and how many were
/// skipped as duplicates of an existing login.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntakeReport {
    /// Drafts inserted into the pool.
    pub added: usize,
    /// Drafts skipped because the login already exists.
    pub skipped: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ItemStatus::Available, "available")]
    #[case(ItemStatus::Pending, "pending")]
    #[case(ItemStatus::Submitted, "submitted")]
    #[case(ItemStatus::Sold, "sold")]
    #[case(ItemStatus::Rejected, "rejected")]
    fn status_round_trips_through_strings(#[case] status: ItemStatus, #[case] text: &str) {
        assert_eq!(status.as_str(), text);
        assert_eq!(text.parse::<ItemStatus>(), Ok(status));
    }

    #[rstest]
    fn status_parse_rejects_unknown_values() {
        let err = "done".parse::<ItemStatus>().expect_err("unknown status");
        assert_eq!(err.input, "done");
    }

    #[rstest]
    fn default_name_pair_is_wildcard() {
        let names = NamePair::default();
        assert!(names.is_wildcard());
        assert_eq!(names, NamePair::new("Any", "Any"));
    }

    #[rstest]
    fn explicit_name_pair_is_not_wildcard() {
        assert!(!NamePair::new("Jane", "Doe").is_wildcard());
    }
}
