//! Internal Diesel row structs for database operations.
//!
//! These types are implementation details of the persistence layer and must
//! never be exposed to the domain. Conversions into domain types live here
//! so every adapter maps rows the same way.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::{
    Amount, Balances, Item, ItemId, ItemStatus, NamePair, UserAccount, UserId, Withdrawal,
    WithdrawalId, WithdrawalStatus,
};

use super::schema::{admins, items, notifications, settings, users, withdrawals};

/// Conversion failures from stored rows to domain values.
///
/// These indicate out-of-band writes (an unknown status string, a negative
/// balance, a malformed payment map) rather than ordinary query errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("stored row is invalid: {message}")]
pub(crate) struct RowConversionError {
    pub message: String,
}

impl RowConversionError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Item models
// ---------------------------------------------------------------------------

/// Row struct for reading from the items table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = items)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct ItemRow {
    pub id: i64,
    pub login: String,
    pub secret: String,
    pub first_name: String,
    pub last_name: String,
    pub status: String,
    pub assigned_to: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Insertable struct for stocking new items.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = items)]
pub(crate) struct NewItemRow<'a> {
    pub login: &'a str,
    pub secret: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub status: &'a str,
}

/// Convert a database row into a validated domain item.
pub(crate) fn row_to_item(row: ItemRow) -> Result<Item, RowConversionError> {
    let ItemRow {
        id,
        login,
        secret,
        first_name,
        last_name,
        status,
        assigned_to,
        created_at,
    } = row;

    let status: ItemStatus = status
        .parse()
        .map_err(|err: crate::domain::ParseItemStatusError| {
            RowConversionError::new(err.to_string())
        })?;

    Ok(Item {
        id: ItemId(id),
        login,
        secret,
        names: NamePair::new(first_name, last_name),
        status,
        assigned_to: assigned_to.map(UserId),
        created_at,
    })
}

// ---------------------------------------------------------------------------
// User models
// ---------------------------------------------------------------------------

/// Row struct for reading from the users table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct UserRow {
    pub id: i64,
    pub display_name: String,
    pub available: Decimal,
    pub hold: Decimal,
    pub payment_info: serde_json::Value,
    pub referred_by: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Insertable struct for enrolling users.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = users)]
pub(crate) struct NewUserRow<'a> {
    pub id: i64,
    pub display_name: &'a str,
    pub available: Decimal,
    pub hold: Decimal,
    pub payment_info: serde_json::Value,
    pub referred_by: Option<i64>,
}

/// Convert a database row into a validated domain user account.
pub(crate) fn row_to_user(row: UserRow) -> Result<UserAccount, RowConversionError> {
    let UserRow {
        id,
        display_name,
        available,
        hold,
        payment_info,
        referred_by,
        created_at,
    } = row;

    let available = Amount::new(available)
        .map_err(|err| RowConversionError::new(format!("available balance: {err}")))?;
    let hold =
        Amount::new(hold).map_err(|err| RowConversionError::new(format!("hold balance: {err}")))?;
    let payment_info = serde_json::from_value(payment_info)
        .map_err(|err| RowConversionError::new(format!("payment info: {err}")))?;

    Ok(UserAccount {
        id: UserId(id),
        display_name,
        available,
        hold,
        payment_info,
        referred_by: referred_by.map(UserId),
        created_at,
    })
}

/// Convert a raw balance pair into validated domain balances.
pub(crate) fn decimals_to_balances(
    available: Decimal,
    hold: Decimal,
) -> Result<Balances, RowConversionError> {
    Ok(Balances {
        available: Amount::new(available)
            .map_err(|err| RowConversionError::new(format!("available balance: {err}")))?,
        hold: Amount::new(hold)
            .map_err(|err| RowConversionError::new(format!("hold balance: {err}")))?,
    })
}

// ---------------------------------------------------------------------------
// Withdrawal models
// ---------------------------------------------------------------------------

/// Row struct for reading from the withdrawals table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = withdrawals)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct WithdrawalRow {
    pub id: i64,
    pub user_id: i64,
    pub amount: Decimal,
    pub method: String,
    pub details: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Insertable struct for recording reservations.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = withdrawals)]
pub(crate) struct NewWithdrawalRow<'a> {
    pub user_id: i64,
    pub amount: Decimal,
    pub method: &'a str,
    pub details: &'a str,
    pub status: &'a str,
}

/// Convert a database row into a validated domain withdrawal.
pub(crate) fn row_to_withdrawal(row: WithdrawalRow) -> Result<Withdrawal, RowConversionError> {
    let WithdrawalRow {
        id,
        user_id,
        amount,
        method,
        details,
        status,
        created_at,
    } = row;

    let status: WithdrawalStatus =
        status
            .parse()
            .map_err(|err: crate::domain::ParseWithdrawalStatusError| {
                RowConversionError::new(err.to_string())
            })?;
    let amount =
        Amount::new(amount).map_err(|err| RowConversionError::new(format!("amount: {err}")))?;

    Ok(Withdrawal {
        id: WithdrawalId(id),
        user_id: UserId(user_id),
        amount,
        method,
        details,
        status,
        created_at,
    })
}

// ---------------------------------------------------------------------------
// Settings, admins, notifications
// ---------------------------------------------------------------------------

/// Row struct for the settings table.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = settings)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct SettingRow {
    pub key: String,
    pub value: String,
}

/// Insertable struct for the admin allowlist.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = admins)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct AdminRow {
    pub user_id: i64,
}

/// Insertable struct for the notification outbox.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = notifications)]
pub(crate) struct NewNotificationRow<'a> {
    pub id: Uuid,
    pub recipient: i64,
    pub payload: &'a serde_json::Value,
}

#[cfg(test)]
mod tests {
    //! Regression coverage for row conversion edge cases.

    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn valid_item_row() -> ItemRow {
        ItemRow {
            id: 1,
            login: "login@example.com".to_owned(),
            secret: "secret".to_owned(),
            first_name: "Any".to_owned(),
            last_name: "Any".to_owned(),
            status: "pending".to_owned(),
            assigned_to: Some(7),
            created_at: Utc::now(),
        }
    }

    #[fixture]
    fn valid_user_row() -> UserRow {
        UserRow {
            id: 7,
            display_name: "seven".to_owned(),
            available: Decimal::new(1000, 2),
            hold: Decimal::ZERO,
            payment_info: serde_json::json!({ "paypal": "acct" }),
            referred_by: None,
            created_at: Utc::now(),
        }
    }

    #[rstest]
    fn item_row_converts_with_status_and_assignment(valid_item_row: ItemRow) {
        let item = row_to_item(valid_item_row).expect("valid row");

        assert_eq!(item.status, ItemStatus::Pending);
        assert_eq!(item.assigned_to, Some(UserId(7)));
        assert!(item.names.is_wildcard());
    }

    #[rstest]
    fn item_row_rejects_unknown_status(mut valid_item_row: ItemRow) {
        valid_item_row.status = "done".to_owned();

        let error = row_to_item(valid_item_row).expect_err("unknown status");
        assert!(error.to_string().contains("done"));
    }

    #[rstest]
    fn user_row_converts_balances_and_payment_info(valid_user_row: UserRow) {
        let account = row_to_user(valid_user_row).expect("valid row");

        assert_eq!(account.available, Amount::parse("10.00").expect("amount"));
        assert_eq!(account.payment_info.get("paypal").map(String::as_str), Some("acct"));
    }

    #[rstest]
    fn user_row_rejects_negative_balances(mut valid_user_row: UserRow) {
        valid_user_row.hold = Decimal::new(-100, 2);

        let error = row_to_user(valid_user_row).expect_err("negative hold");
        assert!(error.to_string().contains("hold balance"));
    }

    #[rstest]
    fn user_row_rejects_malformed_payment_info(mut valid_user_row: UserRow) {
        valid_user_row.payment_info = serde_json::json!(["not", "a", "map"]);

        let error = row_to_user(valid_user_row).expect_err("malformed map");
        assert!(error.to_string().contains("payment info"));
    }
}
