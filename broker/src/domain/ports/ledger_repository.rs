//! Port for user ledger persistence.
//!
//! The [`LedgerRepository`] trait covers enrollment, balance reads, and
//! payment-info maintenance. Balance *mutations* are deliberately absent
//! from this port: credits and debits only ever happen inside the
//! allocation, approval, and withdrawal adapters' transactions, so no
//! caller can move money outside an engine operation.

use async_trait::async_trait;

use crate::domain::{Balances, Enrollment, PaymentInfo, UserAccount, UserId};

/// Errors raised by ledger repository adapters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerRepositoryError {
    /// Repository connection could not be established.
    #[error("ledger repository connection failed: {message}")]
    Connection { message: String },

    /// Query or mutation failed during execution.
    #[error("ledger repository query failed: {message}")]
    Query { message: String },

    /// The referenced user has no ledger row.
    #[error("no ledger row for user {user_id}")]
    UnknownUser { user_id: i64 },

    /// Stored payment info could not be encoded or decoded.
    #[error("payment info serialization failed: {message}")]
    Serialization { message: String },
}

impl LedgerRepositoryError {
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

    /// Create an unknown-user error.
    pub fn unknown_user(user_id: UserId) -> Self {
        Self::UnknownUser { user_id: user_id.0 }
    }

    /// Create a serialization error with the given message.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }
}

/// Port for user ledger storage.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerRepository: Send + Sync {
    /// Insert a user if absent.
    ///
    /// Returns `true` when a new row was created, `false` when the user was
    /// already enrolled. The enrollment's referrer link is stored as given;
    /// self-referral scrubbing happens in the service before this call.
    async fn enroll(&self, enrollment: &Enrollment) -> Result<bool, LedgerRepositoryError>;

    /// Fetch a full user record.
    async fn find(&self, user_id: UserId) -> Result<Option<UserAccount>, LedgerRepositoryError>;

    /// Both balances of a user; the zero pair for unknown users.
    async fn balances(&self, user_id: UserId) -> Result<Balances, LedgerRepositoryError>;

    /// Merge payment entries into the user's saved methods.
    ///
    /// New keys overwrite, keys not mentioned are preserved. Fails with
    /// [`LedgerRepositoryError::UnknownUser`] when the user has no row.
    async fn merge_payment_info(
        &self,
        user_id: UserId,
        entries: &PaymentInfo,
    ) -> Result<(), LedgerRepositoryError>;

    /// The user's saved payment methods; empty for unknown users.
    async fn payment_info(&self, user_id: UserId) -> Result<PaymentInfo, LedgerRepositoryError>;

    /// How many users name this one as their referrer.
    async fn referral_count(&self, user_id: UserId) -> Result<u64, LedgerRepositoryError>;

    /// Total enrolled users.
    async fn user_count(&self) -> Result<u64, LedgerRepositoryError>;

    /// Every enrolled user id, for broadcast fan-out by the messaging
    /// collaborator.
    async fn all_user_ids(&self) -> Result<Vec<UserId>, LedgerRepositoryError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn unknown_user_error_names_the_user() {
        let err = LedgerRepositoryError::unknown_user(UserId(42));
        assert!(err.to_string().contains("42"));
    }
}
