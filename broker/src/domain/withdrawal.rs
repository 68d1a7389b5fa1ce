//! Withdrawal requests.
//!
//! A withdrawal reserves its amount at request time: the debit from the
//! available balance and the insertion of the `pending` record happen in one
//! transaction, so a user can never promise the same funds twice.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::money::Amount;
use super::user::UserId;

/// Stable withdrawal identifier, assigned by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WithdrawalId(pub i64);

impl fmt::Display for WithdrawalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Lifecycle status of a withdrawal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalStatus {
    /// Awaiting administrator resolution; amount already reserved.
    Pending,
    /// Paid out externally. Terminal.
    Paid,
    /// Rejected; reserved amount refunded. Terminal.
    Rejected,
}

impl WithdrawalStatus {
    /// Returns the database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown status string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseWithdrawalStatusError {
    /// The unrecognised input value.
    pub input: String,
}

impl fmt::Display for ParseWithdrawalStatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown withdrawal status: {}", self.input)
    }
}

impl std::error::Error for ParseWithdrawalStatusError {}

impl std::str::FromStr for WithdrawalStatus {
    type Err = ParseWithdrawalStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "rejected" => Ok(Self::Rejected),
            _ => Err(ParseWithdrawalStatusError {
                input: s.to_owned(),
            }),
        }
    }
}

/// Terminal outcome an administrator assigns to a pending withdrawal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalOutcome {
    /// The payout was made; no balance change.
    Paid,
    /// The request was declined; the reserved amount is refunded.
    Rejected,
}

impl WithdrawalOutcome {
    /// The terminal status this outcome maps to.
    pub fn status(self) -> WithdrawalStatus {
        match self {
            Self::Paid => WithdrawalStatus::Paid,
            Self::Rejected => WithdrawalStatus::Rejected,
        }
    }
}

/// A recorded withdrawal request.
///
/// ## Invariants
/// - `amount` was debited from the user's available balance when the record
///   was created.
/// - A `rejected` record has refunded exactly `amount` to the same user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Withdrawal {
    /// Store-assigned identifier.
    pub id: WithdrawalId,
    /// Requesting user.
    pub user_id: UserId,
    /// Reserved amount.
    pub amount: Amount,
    /// Payout method name (one of the user's saved payment methods).
    pub method: String,
    /// Opaque payout details captured from the user.
    pub details: String,
    /// Current lifecycle status.
    pub status: WithdrawalStatus,
    /// Request timestamp; the review queue is FIFO by this field.
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(WithdrawalStatus::Pending, "pending")]
    #[case(WithdrawalStatus::Paid, "paid")]
    #[case(WithdrawalStatus::Rejected, "rejected")]
    fn status_round_trips_through_strings(#[case] status: WithdrawalStatus, #[case] text: &str) {
        assert_eq!(status.as_str(), text);
        assert_eq!(text.parse::<WithdrawalStatus>(), Ok(status));
    }

    #[rstest]
    fn outcome_maps_to_terminal_status() {
        assert_eq!(WithdrawalOutcome::Paid.status(), WithdrawalStatus::Paid);
        assert_eq!(
            WithdrawalOutcome::Rejected.status(),
            WithdrawalStatus::Rejected
        );
    }
}
