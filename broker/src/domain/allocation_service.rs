//! Allocation engine: claim, cancel, submit, and operator intake.
//!
//! The service owns the policy around the inventory port: what counts as a
//! valid request, which port outcomes become which domain errors, and the
//! anomaly logging for the submit self-heal. The atomicity of each
//! transition itself is the adapter's contract.

use std::sync::Arc;

use crate::domain::ports::{
    ClaimOutcome, InventoryRepository, InventoryRepositoryError, SubmissionRecord,
};
use crate::domain::{Error, IntakeReport, Item, ItemDraft, UserId};

/// Allocation engine service.
pub struct AllocationService<I> {
    inventory: Arc<I>,
}

impl<I> Clone for AllocationService<I> {
    fn clone(&self) -> Self {
        Self {
            inventory: Arc::clone(&self.inventory),
        }
    }
}

impl<I> AllocationService<I> {
    /// Create a new service over the inventory port.
    pub fn new(inventory: Arc<I>) -> Self {
        Self { inventory }
    }
}

fn map_inventory_error(error: InventoryRepositoryError) -> Error {
    match error {
        InventoryRepositoryError::Connection { message }
        | InventoryRepositoryError::Query { message } => Error::store_unavailable(message),
        InventoryRepositoryError::StateConflict {
            item_id,
            status,
            required,
        } => Error::invalid_state(format!(
            "item {item_id} is {status}, expected {required}"
        )),
    }
}

impl<I> AllocationService<I>
where
    I: InventoryRepository,
{
    /// Claim one item for the user.
    ///
    /// Idempotent: a user already holding a pending item gets that item
    /// back. Returns [`ClaimOutcome::NoneAvailable`] when the pool is empty.
    pub async fn claim(&self, user_id: UserId) -> Result<ClaimOutcome, Error> {
        let outcome = self
            .inventory
            .claim(user_id)
            .await
            .map_err(map_inventory_error)?;

        match &outcome {
            ClaimOutcome::AlreadyHeld(item) => {
                tracing::debug!(user = %user_id, item = %item.id, "claim re-entry");
            }
            ClaimOutcome::Claimed(item) => {
                tracing::info!(user = %user_id, item = %item.id, "item claimed");
            }
            ClaimOutcome::NoneAvailable => {
                tracing::debug!(user = %user_id, "claim found empty pool");
            }
        }
        Ok(outcome)
    }

    /// Release the user's pending item back to the pool.
    ///
    /// Fails with `InvalidState` when the user holds no pending item; in
    /// particular, an already-submitted item can no longer be cancelled.
    /// The ledger is never touched: no funds were credited for a mere
    /// claim.
    pub async fn cancel(&self, user_id: UserId) -> Result<Item, Error> {
        let released = self
            .inventory
            .release_claim(user_id)
            .await
            .map_err(map_inventory_error)?
            .ok_or_else(|| Error::invalid_state("no pending item to cancel"))?;

        tracing::info!(user = %user_id, item = %released.id, "claim released");
        Ok(released)
    }

    /// Submit the user's pending item for review, crediting the configured
    /// price to their hold balance.
    ///
    /// Fails with `InvalidState` when the user holds no pending item. A
    /// submit that had to recreate a missing user row is a repaired
    /// anomaly and is logged at warn level, not surfaced as an error.
    pub async fn submit(&self, user_id: UserId) -> Result<SubmissionRecord, Error> {
        let record = self
            .inventory
            .submit_claim(user_id)
            .await
            .map_err(map_inventory_error)?
            .ok_or_else(|| Error::invalid_state("no pending item to submit"))?;

        if record.ledger_repaired {
            tracing::warn!(
                user = %user_id,
                item = %record.item.id,
                "missing ledger row recreated while crediting submission"
            );
        }
        tracing::info!(
            user = %user_id,
            item = %record.item.id,
            price = %record.price,
            "item submitted, hold credited"
        );
        Ok(record)
    }

    /// Bulk-load credential drafts into the pool.
    ///
    /// Drafts whose login already exists are skipped and counted, not
    /// errors. An empty batch or a draft with a blank credential is
    /// rejected before the store is touched.
    pub async fn stock(&self, drafts: &[ItemDraft]) -> Result<IntakeReport, Error> {
        if drafts.is_empty() {
            return Err(Error::invalid_request("intake batch is empty"));
        }
        if drafts
            .iter()
            .any(|d| d.login.trim().is_empty() || d.secret.trim().is_empty())
        {
            return Err(Error::invalid_request(
                "intake drafts must carry both credentials",
            ));
        }

        let report = self
            .inventory
            .stock(drafts)
            .await
            .map_err(map_inventory_error)?;

        tracing::info!(
            added = report.added,
            skipped = report.skipped,
            "intake batch processed"
        );
        Ok(report)
    }
}
