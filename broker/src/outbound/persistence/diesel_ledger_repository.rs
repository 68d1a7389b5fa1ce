//! PostgreSQL-backed `LedgerRepository` implementation using Diesel.
//!
//! Read-mostly: balance mutations happen in the allocation, approval, and
//! withdrawal adapters' transactions through [`super::ledger_ops`]. The one
//! mutation here besides enrollment is the payment-info merge, which locks
//! the row so concurrent merges cannot drop each other's keys.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, RunQueryDsl};
use rust_decimal::Decimal;

use crate::domain::ports::{LedgerRepository, LedgerRepositoryError};
use crate::domain::{Balances, Enrollment, PaymentInfo, UserAccount, UserId};

use super::diesel_error_mapping::{map_basic_diesel_error, map_basic_pool_error};
use super::models::{NewUserRow, RowConversionError, UserRow, decimals_to_balances, row_to_user};
use super::pool::{DbPool, PoolError};
use super::schema::users;

/// Diesel-backed implementation of the ledger port.
#[derive(Clone)]
pub struct DieselLedgerRepository {
    pool: DbPool,
}

impl DieselLedgerRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> LedgerRepositoryError {
    map_basic_pool_error(error, LedgerRepositoryError::connection)
}

fn map_diesel_error(error: diesel::result::Error) -> LedgerRepositoryError {
    map_basic_diesel_error(
        error,
        LedgerRepositoryError::query,
        LedgerRepositoryError::connection,
    )
}

fn map_row_error(error: RowConversionError) -> LedgerRepositoryError {
    LedgerRepositoryError::query(error.to_string())
}

/// Merge transaction result.
enum MergeTx {
    Missing,
    Done,
}

#[async_trait]
impl LedgerRepository for DieselLedgerRepository {
    async fn enroll(&self, enrollment: &Enrollment) -> Result<bool, LedgerRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let row = NewUserRow {
            id: enrollment.user_id.0,
            display_name: &enrollment.display_name,
            available: Decimal::ZERO,
            hold: Decimal::ZERO,
            payment_info: serde_json::json!({}),
            referred_by: enrollment.referred_by.map(|id| id.0),
        };
        let inserted = diesel::insert_into(users::table)
            .values(&row)
            .on_conflict(users::id)
            .do_nothing()
            .execute(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        Ok(inserted > 0)
    }

    async fn find(&self, user_id: UserId) -> Result<Option<UserAccount>, LedgerRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let row = users::table
            .find(user_id.0)
            .select(UserRow::as_select())
            .first::<UserRow>(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;

        row.map(row_to_user).transpose().map_err(map_row_error)
    }

    async fn balances(&self, user_id: UserId) -> Result<Balances, LedgerRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let pair: Option<(Decimal, Decimal)> = users::table
            .find(user_id.0)
            .select((users::available, users::hold))
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;

        match pair {
            // Unknown users read as the zero pair, matching what a user who
            // has never earned anything would see.
            None => Ok(Balances::default()),
            Some((available, hold)) => {
                decimals_to_balances(available, hold).map_err(map_row_error)
            }
        }
    }

    async fn merge_payment_info(
        &self,
        user_id: UserId,
        entries: &PaymentInfo,
    ) -> Result<(), LedgerRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let uid = user_id.0;
        let incoming = entries.clone();

        let tx = conn
            .transaction::<MergeTx, diesel::result::Error, _>(|conn| {
                async move {
                    let stored: Option<serde_json::Value> = users::table
                        .find(uid)
                        .select(users::payment_info)
                        .for_update()
                        .first(conn)
                        .await
                        .optional()?;
                    let Some(stored) = stored else {
                        return Ok(MergeTx::Missing);
                    };

                    let mut merged: PaymentInfo =
                        serde_json::from_value(stored).map_err(|err| {
                            diesel::result::Error::DeserializationError(Box::new(
                                RowConversionError::new(format!("payment info: {err}")),
                            ))
                        })?;
                    merged.extend(incoming);

                    let merged = serde_json::to_value(&merged).map_err(|err| {
                        diesel::result::Error::SerializationError(Box::new(err))
                    })?;
                    diesel::update(users::table.find(uid))
                        .set(users::payment_info.eq(merged))
                        .execute(conn)
                        .await?;
                    Ok(MergeTx::Done)
                }
                .scope_boxed()
            })
            .await
            .map_err(map_diesel_error)?;

        match tx {
            MergeTx::Missing => Err(LedgerRepositoryError::unknown_user(user_id)),
            MergeTx::Done => Ok(()),
        }
    }

    async fn payment_info(&self, user_id: UserId) -> Result<PaymentInfo, LedgerRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let stored: Option<serde_json::Value> = users::table
            .find(user_id.0)
            .select(users::payment_info)
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;

        match stored {
            None => Ok(PaymentInfo::new()),
            Some(value) => serde_json::from_value(value)
                .map_err(|err| LedgerRepositoryError::serialization(err.to_string())),
        }
    }

    async fn referral_count(&self, user_id: UserId) -> Result<u64, LedgerRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let count: i64 = users::table
            .filter(users::referred_by.eq(user_id.0))
            .count()
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn user_count(&self) -> Result<u64, LedgerRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let count: i64 = users::table
            .count()
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn all_user_ids(&self) -> Result<Vec<UserId>, LedgerRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let ids: Vec<i64> = users::table
            .select(users::id)
            .order(users::id.asc())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        Ok(ids.into_iter().map(UserId).collect())
    }
}
