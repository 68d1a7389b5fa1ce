//! Port for withdrawal persistence.
//!
//! Reservation-at-request-time lives here: `reserve` debits the available
//! balance and inserts the pending record in one transaction, so the
//! displayed balance never includes funds already promised to a pending
//! withdrawal.

use async_trait::async_trait;

use crate::domain::{Amount, UserId, Withdrawal, WithdrawalId, WithdrawalOutcome};

/// Errors raised by withdrawal repository adapters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WithdrawalRepositoryError {
    /// Repository connection could not be established.
    #[error("withdrawal repository connection failed: {message}")]
    Connection { message: String },

    /// Query or mutation failed during execution.
    #[error("withdrawal repository query failed: {message}")]
    Query { message: String },

    /// The withdrawal was already resolved to a terminal state.
    #[error("withdrawal {withdrawal_id} already resolved to {status}")]
    AlreadyResolved {
        withdrawal_id: WithdrawalId,
        status: String,
    },
}

impl WithdrawalRepositoryError {
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

    /// Create an already-resolved error.
    pub fn already_resolved(withdrawal_id: WithdrawalId, status: impl Into<String>) -> Self {
        Self::AlreadyResolved {
            withdrawal_id,
            status: status.into(),
        }
    }
}

/// Result of a reservation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReservationOutcome {
    /// The amount was debited and the pending record created.
    Created(Withdrawal),
    /// The user's available balance does not cover the amount; nothing
    /// changed. Carries the balance observed in the same transaction.
    Insufficient {
        /// The user's current available balance.
        available: Amount,
    },
}

/// A withdrawal driven to its terminal state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedWithdrawal {
    /// The record after the transition.
    pub withdrawal: Withdrawal,
    /// Whether the reserved amount was refunded (rejections only).
    pub refunded: bool,
}

/// Port for withdrawal storage.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WithdrawalRepository: Send + Sync {
    /// Reserve `amount` from the user's available balance and record the
    /// pending request, in one transaction.
    async fn reserve(
        &self,
        user_id: UserId,
        amount: Amount,
        method: &str,
        details: &str,
    ) -> Result<ReservationOutcome, WithdrawalRepositoryError>;

    /// Pending withdrawals, oldest first.
    async fn pending(&self) -> Result<Vec<Withdrawal>, WithdrawalRepositoryError>;

    /// Drive a pending withdrawal to its terminal state.
    ///
    /// On [`WithdrawalOutcome::Rejected`] the reserved amount is refunded to
    /// the same user in the same transaction; on
    /// [`WithdrawalOutcome::Paid`] no balance changes. Returns `None` when
    /// the withdrawal does not exist and
    /// [`WithdrawalRepositoryError::AlreadyResolved`] when it is no longer
    /// pending.
    async fn resolve(
        &self,
        withdrawal_id: WithdrawalId,
        outcome: WithdrawalOutcome,
    ) -> Result<Option<ResolvedWithdrawal>, WithdrawalRepositoryError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn already_resolved_error_names_the_record() {
        let err = WithdrawalRepositoryError::already_resolved(WithdrawalId(9), "paid");
        let message = err.to_string();

        assert!(message.contains("withdrawal 9"));
        assert!(message.contains("paid"));
    }
}
