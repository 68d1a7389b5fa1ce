//! Port for inventory persistence and lifecycle transitions.
//!
//! The [`InventoryRepository`] trait is the allocation and approval engines'
//! view of the `items` relation. Every multi-step operation on it (claim,
//! submit, approve, reject) is a single transaction in the adapter: the
//! read that selects a row and the write that transitions it commit
//! together or not at all.

use async_trait::async_trait;

use crate::domain::{Amount, Item, ItemDraft, ItemId, IntakeReport, UserId};

/// Errors raised by inventory repository adapters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InventoryRepositoryError {
    /// Repository connection could not be established.
    #[error("inventory repository connection failed: {message}")]
    Connection { message: String },

    /// Query or mutation failed during execution.
    #[error("inventory repository query failed: {message}")]
    Query { message: String },

    /// The item exists but is not in a state the operation accepts.
    #[error("item {item_id} is in state {status}, operation requires {required}")]
    StateConflict {
        item_id: ItemId,
        status: String,
        required: String,
    },
}

impl InventoryRepositoryError {
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

    /// Create a state conflict error.
    pub fn state_conflict(
        item_id: ItemId,
        status: impl Into<String>,
        required: impl Into<String>,
    ) -> Self {
        Self::StateConflict {
            item_id,
            status: status.into(),
            required: required.into(),
        }
    }
}

/// Result of a claim attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// The user already held a pending item; it is returned unchanged.
    AlreadyHeld(Item),
    /// A fresh item was bound to the user.
    Claimed(Item),
    /// The available pool is empty.
    NoneAvailable,
}

/// Record of a successful submission: the item moved to `submitted` and the
/// price credited to the user's hold balance, in one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRecord {
    /// The submitted item.
    pub item: Item,
    /// Price credited, read from settings inside the same transaction.
    pub price: Amount,
    /// Whether a missing user row had to be recreated to land the credit.
    pub ledger_repaired: bool,
}

/// Referral credit granted alongside an approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferralCredit {
    /// The referrer whose available balance was credited.
    pub referrer: UserId,
    /// The bonus amount.
    pub bonus: Amount,
}

/// Record of an administrator resolution (approve or reject).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemResolution {
    /// The item in its terminal state.
    pub item: Item,
    /// The user whose balances were adjusted.
    pub user_id: UserId,
    /// The price moved (approve) or reversed (reject), at the currently
    /// configured setting.
    pub price: Amount,
    /// Referral credit granted, if the user has a referrer and the bonus is
    /// non-zero. Always `None` for rejections.
    pub referral: Option<ReferralCredit>,
}

/// Pool counters for the operator dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolCounts {
    /// Items currently claimable.
    pub available: u64,
    /// Items sold to date.
    pub sold: u64,
}

/// Port for inventory storage and lifecycle transitions.
///
/// # Atomicity
///
/// `claim`, `submit_claim`, `approve`, and `reject` are transactional:
/// concurrent callers never observe a half-applied transition, and two
/// concurrent `claim` calls never acquire the same row.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InventoryRepository: Send + Sync {
    /// Insert a batch of drafts, skipping duplicates by login.
    async fn stock(&self, drafts: &[ItemDraft]) -> Result<IntakeReport, InventoryRepositoryError>;

    /// Fetch an item by id.
    async fn find(&self, item_id: ItemId) -> Result<Option<Item>, InventoryRepositoryError>;

    /// The user's current `pending` item, if any.
    async fn claimed_by(&self, user_id: UserId) -> Result<Option<Item>, InventoryRepositoryError>;

    /// Claim one item for the user.
    ///
    /// Returns the user's existing pending item when one exists (idempotent
    /// re-entry); otherwise binds the oldest available item to the user.
    /// Selection is FIFO by creation time.
    async fn claim(&self, user_id: UserId) -> Result<ClaimOutcome, InventoryRepositoryError>;

    /// Release the user's pending item back to the pool.
    ///
    /// Returns the released item, or `None` when the user held nothing. The
    /// ledger is never touched: no funds were credited for a mere claim.
    async fn release_claim(
        &self,
        user_id: UserId,
    ) -> Result<Option<Item>, InventoryRepositoryError>;

    /// Submit the user's pending item and credit the price to their hold
    /// balance, in one transaction.
    ///
    /// Returns `None` when the user holds no pending item. When the user row
    /// is missing, the adapter recreates it with zero balances before
    /// retrying the credit and reports `ledger_repaired` on the record.
    async fn submit_claim(
        &self,
        user_id: UserId,
    ) -> Result<Option<SubmissionRecord>, InventoryRepositoryError>;

    /// Approve a submitted item: mark it `sold`, move the configured price
    /// from hold to available, and credit the referrer's bonus when one
    /// applies.
    ///
    /// Returns `None` when the item does not exist.
    async fn approve(
        &self,
        item_id: ItemId,
    ) -> Result<Option<ItemResolution>, InventoryRepositoryError>;

    /// Reject a submitted item: mark it `rejected` and reverse the
    /// submission credit from the hold balance at the currently configured
    /// price.
    ///
    /// Returns `None` when the item does not exist.
    async fn reject(
        &self,
        item_id: ItemId,
    ) -> Result<Option<ItemResolution>, InventoryRepositoryError>;

    /// Submitted items awaiting review, oldest first.
    async fn pending_review(&self) -> Result<Vec<Item>, InventoryRepositoryError>;

    /// The user's submitted and sold items, most recent first, capped at
    /// `limit`.
    async fn history_for(
        &self,
        user_id: UserId,
        limit: i64,
    ) -> Result<Vec<Item>, InventoryRepositoryError>;

    /// Pool counters for the operator dashboard.
    async fn counts(&self) -> Result<PoolCounts, InventoryRepositoryError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn state_conflict_error_names_the_states() {
        let err = InventoryRepositoryError::state_conflict(ItemId(4), "sold", "submitted");
        let message = err.to_string();

        assert!(message.contains("item 4"));
        assert!(message.contains("sold"));
        assert!(message.contains("submitted"));
    }
}
