//! Ledger primitives: single-row balance mutators.
//!
//! These helpers are the only code that moves money. They run exclusively
//! inside an engine adapter's transaction and are not reachable through any
//! port, so no caller can credit or debit a balance outside an atomic
//! engine operation. They hold no policy: which amounts move, and when, is
//! decided by the adapters that call them.

use diesel::QueryResult;
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use rust_decimal::Decimal;

use crate::domain::REPAIRED_DISPLAY_NAME;

use super::models::NewUserRow;
use super::schema::users;

/// `hold += amount`. Returns the number of rows touched (0 when the user
/// has no ledger row).
pub(super) async fn credit_hold(
    conn: &mut AsyncPgConnection,
    user_id: i64,
    amount: Decimal,
) -> QueryResult<usize> {
    diesel::update(users::table.find(user_id))
        .set(users::hold.eq(users::hold + amount))
        .execute(conn)
        .await
}

/// `hold -= amount`, unconditionally. Reversals deliberately tolerate a
/// drifted price setting; see the rejection path.
pub(super) async fn debit_hold(
    conn: &mut AsyncPgConnection,
    user_id: i64,
    amount: Decimal,
) -> QueryResult<usize> {
    diesel::update(users::table.find(user_id))
        .set(users::hold.eq(users::hold - amount))
        .execute(conn)
        .await
}

/// `available += amount`.
pub(super) async fn credit_available(
    conn: &mut AsyncPgConnection,
    user_id: i64,
    amount: Decimal,
) -> QueryResult<usize> {
    diesel::update(users::table.find(user_id))
        .set(users::available.eq(users::available + amount))
        .execute(conn)
        .await
}

/// `hold -= amount; available += amount` in one statement.
pub(super) async fn release_hold(
    conn: &mut AsyncPgConnection,
    user_id: i64,
    amount: Decimal,
) -> QueryResult<usize> {
    diesel::update(users::table.find(user_id))
        .set((
            users::hold.eq(users::hold - amount),
            users::available.eq(users::available + amount),
        ))
        .execute(conn)
        .await
}

/// `available -= amount`, only when the balance covers it.
///
/// Returns 0 rows when the user is missing *or* the balance is short; the
/// caller distinguishes the two by reading the balance afterwards.
pub(super) async fn reserve_available(
    conn: &mut AsyncPgConnection,
    user_id: i64,
    amount: Decimal,
) -> QueryResult<usize> {
    diesel::update(
        users::table
            .find(user_id)
            .filter(users::available.ge(amount)),
    )
    .set(users::available.eq(users::available - amount))
    .execute(conn)
    .await
}

/// Recreate a missing ledger row with zero balances.
///
/// Used by the submit self-heal: a credit that finds no user row inserts
/// this placeholder and retries, instead of silently losing the credit.
pub(super) async fn insert_repair_row(
    conn: &mut AsyncPgConnection,
    user_id: i64,
) -> QueryResult<usize> {
    diesel::insert_into(users::table)
        .values(NewUserRow {
            id: user_id,
            display_name: REPAIRED_DISPLAY_NAME,
            available: Decimal::ZERO,
            hold: Decimal::ZERO,
            payment_info: serde_json::json!({}),
            referred_by: None,
        })
        .on_conflict(users::id)
        .do_nothing()
        .execute(conn)
        .await
}
