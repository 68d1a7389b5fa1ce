//! Ledger-facing service: enrollment, balances, payment details, and the
//! operator's reporting queries.
//!
//! Balance mutations are absent here; money only moves inside the
//! allocation, approval, and withdrawal engines' transactions.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::ports::{
    InventoryRepository, InventoryRepositoryError, LedgerRepository, LedgerRepositoryError,
};
use crate::domain::{Balances, Enrollment, Error, Item, PaymentInfo, UserAccount, UserId};

/// How many history rows a user is shown.
const HISTORY_LIMIT: i64 = 10;

/// Operator dashboard counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockStats {
    /// Items currently claimable.
    pub available: u64,
    /// Items sold to date.
    pub sold: u64,
    /// Enrolled users.
    pub users: u64,
}

/// Ledger service.
pub struct LedgerService<L, I> {
    ledger: Arc<L>,
    inventory: Arc<I>,
}

impl<L, I> Clone for LedgerService<L, I> {
    fn clone(&self) -> Self {
        Self {
            ledger: Arc::clone(&self.ledger),
            inventory: Arc::clone(&self.inventory),
        }
    }
}

impl<L, I> LedgerService<L, I> {
    /// Create a new service over the ledger and inventory ports.
    pub fn new(ledger: Arc<L>, inventory: Arc<I>) -> Self {
        Self { ledger, inventory }
    }
}

fn map_ledger_error(error: LedgerRepositoryError) -> Error {
    match error {
        LedgerRepositoryError::Connection { message }
        | LedgerRepositoryError::Query { message } => Error::store_unavailable(message),
        LedgerRepositoryError::UnknownUser { user_id } => {
            Error::not_found(format!("no user {user_id}"))
        }
        LedgerRepositoryError::Serialization { message } => Error::internal(message),
    }
}

fn map_inventory_error(error: InventoryRepositoryError) -> Error {
    match error {
        InventoryRepositoryError::Connection { message }
        | InventoryRepositoryError::Query { message } => Error::store_unavailable(message),
        InventoryRepositoryError::StateConflict { .. } => {
            Error::internal("unexpected state conflict in a read-only query")
        }
    }
}

impl<L, I> LedgerService<L, I>
where
    L: LedgerRepository,
    I: InventoryRepository,
{
    /// Enroll a user if absent; returns whether the user is new.
    ///
    /// A self-referral is scrubbed to no referrer rather than rejecting the
    /// enrollment, and logged.
    pub async fn enroll(&self, enrollment: Enrollment) -> Result<bool, Error> {
        let mut enrollment = enrollment;
        if enrollment.scrub_self_referral() {
            tracing::warn!(user = %enrollment.user_id, "self-referral scrubbed at enrollment");
        }

        let created = self
            .ledger
            .enroll(&enrollment)
            .await
            .map_err(map_ledger_error)?;

        if created {
            tracing::info!(
                user = %enrollment.user_id,
                referred_by = ?enrollment.referred_by,
                "user enrolled"
            );
        }
        Ok(created)
    }

    /// Fetch a full user record.
    pub async fn account(&self, user_id: UserId) -> Result<Option<UserAccount>, Error> {
        self.ledger.find(user_id).await.map_err(map_ledger_error)
    }

    /// Both balances of a user; the zero pair for unknown users.
    pub async fn balances(&self, user_id: UserId) -> Result<Balances, Error> {
        self.ledger
            .balances(user_id)
            .await
            .map_err(map_ledger_error)
    }

    /// Merge payment entries into the user's saved methods.
    ///
    /// New keys overwrite, keys not mentioned are preserved.
    pub async fn merge_payment_info(
        &self,
        user_id: UserId,
        entries: PaymentInfo,
    ) -> Result<(), Error> {
        if entries.is_empty() {
            return Err(Error::invalid_request("no payment entries supplied"));
        }
        self.ledger
            .merge_payment_info(user_id, &entries)
            .await
            .map_err(map_ledger_error)
    }

    /// The user's saved payment methods.
    pub async fn payment_info(&self, user_id: UserId) -> Result<PaymentInfo, Error> {
        self.ledger
            .payment_info(user_id)
            .await
            .map_err(map_ledger_error)
    }

    /// How many users this one has referred.
    pub async fn referral_count(&self, user_id: UserId) -> Result<u64, Error> {
        self.ledger
            .referral_count(user_id)
            .await
            .map_err(map_ledger_error)
    }

    /// The user's submitted and sold items, most recent first.
    pub async fn history(&self, user_id: UserId) -> Result<Vec<Item>, Error> {
        self.inventory
            .history_for(user_id, HISTORY_LIMIT)
            .await
            .map_err(map_inventory_error)
    }

    /// Operator dashboard counters.
    pub async fn stats(&self) -> Result<StockStats, Error> {
        let counts = self
            .inventory
            .counts()
            .await
            .map_err(map_inventory_error)?;
        let users = self.ledger.user_count().await.map_err(map_ledger_error)?;

        Ok(StockStats {
            available: counts.available,
            sold: counts.sold,
            users,
        })
    }

    /// Every enrolled user id, for broadcast fan-out by the messaging
    /// collaborator.
    pub async fn broadcast_roster(&self) -> Result<Vec<UserId>, Error> {
        self.ledger.all_user_ids().await.map_err(map_ledger_error)
    }
}
