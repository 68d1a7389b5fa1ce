//! Withdrawal engine: validated payout requests.

use std::sync::Arc;

use crate::domain::ports::{
    ReservationOutcome, WithdrawalRepository, WithdrawalRepositoryError,
};
use crate::domain::{Amount, Error, UserId, Withdrawal};

/// Withdrawal engine service.
pub struct WithdrawalService<W> {
    withdrawals: Arc<W>,
}

impl<W> Clone for WithdrawalService<W> {
    fn clone(&self) -> Self {
        Self {
            withdrawals: Arc::clone(&self.withdrawals),
        }
    }
}

impl<W> WithdrawalService<W> {
    /// Create a new service over the withdrawal port.
    pub fn new(withdrawals: Arc<W>) -> Self {
        Self { withdrawals }
    }
}

fn map_withdrawal_error(error: WithdrawalRepositoryError) -> Error {
    match error {
        WithdrawalRepositoryError::Connection { message }
        | WithdrawalRepositoryError::Query { message } => Error::store_unavailable(message),
        WithdrawalRepositoryError::AlreadyResolved {
            withdrawal_id,
            status,
        } => Error::invalid_state(format!(
            "withdrawal {withdrawal_id} already resolved to {status}"
        )),
    }
}

impl<W> WithdrawalService<W>
where
    W: WithdrawalRepository,
{
    /// Request a payout of `amount` via `method`.
    ///
    /// Requires a positive amount not exceeding the available balance. On
    /// success the amount is already debited: the returned record is
    /// `pending` and the user's displayed balance reflects the reservation
    /// immediately. An `InsufficientFunds` error carries the current
    /// available balance in its details.
    pub async fn request(
        &self,
        user_id: UserId,
        amount: Amount,
        method: &str,
        details: &str,
    ) -> Result<Withdrawal, Error> {
        if amount.is_zero() {
            return Err(Error::invalid_request(
                "withdrawal amount must be positive",
            ));
        }
        if method.trim().is_empty() {
            return Err(Error::invalid_request("withdrawal method is required"));
        }

        let outcome = self
            .withdrawals
            .reserve(user_id, amount, method, details)
            .await
            .map_err(map_withdrawal_error)?;

        match outcome {
            ReservationOutcome::Created(withdrawal) => {
                tracing::info!(
                    user = %user_id,
                    withdrawal = %withdrawal.id,
                    amount = %withdrawal.amount,
                    method,
                    "withdrawal reserved"
                );
                Ok(withdrawal)
            }
            ReservationOutcome::Insufficient { available } => {
                tracing::debug!(
                    user = %user_id,
                    requested = %amount,
                    available = %available,
                    "withdrawal refused, insufficient funds"
                );
                Err(Error::insufficient_funds(available))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::MockWithdrawalRepository;
    use crate::domain::{ErrorCode, WithdrawalId, WithdrawalStatus};
    use chrono::Utc;

    #[tokio::test]
    async fn zero_amount_is_rejected_before_the_store() {
        let repo = MockWithdrawalRepository::new();

        let service = WithdrawalService::new(Arc::new(repo));
        let error = service
            .request(UserId(7), Amount::ZERO, "paypal", "acct")
            .await
            .expect_err("zero amount");

        assert_eq!(error.code(), ErrorCode::InvalidRequest);
    }

    #[tokio::test]
    async fn insufficient_funds_carry_the_balance() {
        let mut repo = MockWithdrawalRepository::new();
        repo.expect_reserve().times(1).return_once(|_, _, _, _| {
            Ok(ReservationOutcome::Insufficient {
                available: Amount::parse("10.00").expect("amount"),
            })
        });

        let service = WithdrawalService::new(Arc::new(repo));
        let error = service
            .request(
                UserId(7),
                Amount::parse("15.00").expect("amount"),
                "paypal",
                "acct",
            )
            .await
            .expect_err("insufficient");

        assert_eq!(error.code(), ErrorCode::InsufficientFunds);
        let details = error.details().expect("details");
        assert_eq!(details["available"], serde_json::json!("10.00"));
    }

    #[tokio::test]
    async fn successful_reservation_returns_the_pending_record() {
        let withdrawal = Withdrawal {
            id: WithdrawalId(1),
            user_id: UserId(7),
            amount: Amount::parse("10.00").expect("amount"),
            method: "paypal".to_owned(),
            details: "acct".to_owned(),
            status: WithdrawalStatus::Pending,
            created_at: Utc::now(),
        };
        let expected = withdrawal.clone();
        let mut repo = MockWithdrawalRepository::new();
        repo.expect_reserve()
            .times(1)
            .return_once(move |_, _, _, _| Ok(ReservationOutcome::Created(withdrawal)));

        let service = WithdrawalService::new(Arc::new(repo));
        let created = service
            .request(
                UserId(7),
                Amount::parse("10.00").expect("amount"),
                "paypal",
                "acct",
            )
            .await
            .expect("reservation succeeds");

        assert_eq!(created, expected);
        assert_eq!(created.status, WithdrawalStatus::Pending);
    }
}
