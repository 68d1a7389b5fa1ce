//! PostgreSQL-backed `WithdrawalRepository` implementation using Diesel.
//!
//! `reserve` is the double-spend guard: the debit carries an
//! `available >= amount` predicate, so two concurrent requests against the
//! same balance cannot both succeed, and the pending record only exists
//! when the debit landed.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, RunQueryDsl};
use rust_decimal::Decimal;

use crate::domain::ports::{
    ReservationOutcome, ResolvedWithdrawal, WithdrawalRepository, WithdrawalRepositoryError,
};
use crate::domain::{Amount, UserId, Withdrawal, WithdrawalId, WithdrawalOutcome, WithdrawalStatus};

use super::diesel_error_mapping::{map_basic_diesel_error, map_basic_pool_error};
use super::ledger_ops;
use super::models::{NewWithdrawalRow, RowConversionError, WithdrawalRow, row_to_withdrawal};
use super::pool::{DbPool, PoolError};
use super::schema::{users, withdrawals};

/// Diesel-backed implementation of the withdrawal port.
#[derive(Clone)]
pub struct DieselWithdrawalRepository {
    pool: DbPool,
}

impl DieselWithdrawalRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> WithdrawalRepositoryError {
    map_basic_pool_error(error, WithdrawalRepositoryError::connection)
}

fn map_diesel_error(error: diesel::result::Error) -> WithdrawalRepositoryError {
    map_basic_diesel_error(
        error,
        WithdrawalRepositoryError::query,
        WithdrawalRepositoryError::connection,
    )
}

fn map_row_error(error: RowConversionError) -> WithdrawalRepositoryError {
    WithdrawalRepositoryError::query(error.to_string())
}

/// Reservation transaction result, before row conversion.
enum ReserveTx {
    Created(WithdrawalRow),
    Insufficient(Decimal),
}

/// Resolution transaction result, before row conversion.
enum ResolveTx {
    Missing,
    AlreadyResolved(String),
    Done { row: WithdrawalRow, refunded: bool },
}

#[async_trait]
impl WithdrawalRepository for DieselWithdrawalRepository {
    async fn reserve(
        &self,
        user_id: UserId,
        amount: Amount,
        method: &str,
        details: &str,
    ) -> Result<ReservationOutcome, WithdrawalRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let uid = user_id.0;
        let requested = amount.as_decimal();

        let tx = conn
            .transaction::<ReserveTx, diesel::result::Error, _>(|conn| {
                async move {
                    let debited = ledger_ops::reserve_available(conn, uid, requested).await?;
                    if debited == 0 {
                        // Missing user or short balance; either way nothing
                        // changed. Read what the user actually holds for
                        // the error payload.
                        let available: Option<Decimal> = users::table
                            .find(uid)
                            .select(users::available)
                            .first(conn)
                            .await
                            .optional()?;
                        return Ok(ReserveTx::Insufficient(available.unwrap_or_default()));
                    }

                    let row = diesel::insert_into(withdrawals::table)
                        .values(NewWithdrawalRow {
                            user_id: uid,
                            amount: requested,
                            method,
                            details,
                            status: WithdrawalStatus::Pending.as_str(),
                        })
                        .returning(WithdrawalRow::as_returning())
                        .get_result::<WithdrawalRow>(conn)
                        .await?;
                    Ok(ReserveTx::Created(row))
                }
                .scope_boxed()
            })
            .await
            .map_err(map_diesel_error)?;

        match tx {
            ReserveTx::Created(row) => Ok(ReservationOutcome::Created(
                row_to_withdrawal(row).map_err(map_row_error)?,
            )),
            ReserveTx::Insufficient(available) => Ok(ReservationOutcome::Insufficient {
                available: Amount::new(available)
                    .map_err(|err| WithdrawalRepositoryError::query(err.to_string()))?,
            }),
        }
    }

    async fn pending(&self) -> Result<Vec<Withdrawal>, WithdrawalRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let rows: Vec<WithdrawalRow> = withdrawals::table
            .filter(withdrawals::status.eq(WithdrawalStatus::Pending.as_str()))
            .order((withdrawals::created_at.asc(), withdrawals::id.asc()))
            .select(WithdrawalRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        rows.into_iter()
            .map(|row| row_to_withdrawal(row).map_err(map_row_error))
            .collect()
    }

    async fn resolve(
        &self,
        withdrawal_id: WithdrawalId,
        outcome: WithdrawalOutcome,
    ) -> Result<Option<ResolvedWithdrawal>, WithdrawalRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let id = withdrawal_id.0;

        let tx = conn
            .transaction::<ResolveTx, diesel::result::Error, _>(|conn| {
                async move {
                    let row = withdrawals::table
                        .find(id)
                        .select(WithdrawalRow::as_select())
                        .for_update()
                        .first::<WithdrawalRow>(conn)
                        .await
                        .optional()?;
                    let Some(row) = row else {
                        return Ok(ResolveTx::Missing);
                    };
                    if row.status != WithdrawalStatus::Pending.as_str() {
                        return Ok(ResolveTx::AlreadyResolved(row.status));
                    }

                    let refunded = matches!(outcome, WithdrawalOutcome::Rejected);
                    if refunded {
                        ledger_ops::credit_available(conn, row.user_id, row.amount).await?;
                    }

                    let updated = diesel::update(withdrawals::table.find(id))
                        .set(withdrawals::status.eq(outcome.status().as_str()))
                        .returning(WithdrawalRow::as_returning())
                        .get_result::<WithdrawalRow>(conn)
                        .await?;
                    Ok(ResolveTx::Done {
                        row: updated,
                        refunded,
                    })
                }
                .scope_boxed()
            })
            .await
            .map_err(map_diesel_error)?;

        match tx {
            ResolveTx::Missing => Ok(None),
            ResolveTx::AlreadyResolved(status) => Err(
                WithdrawalRepositoryError::already_resolved(withdrawal_id, status),
            ),
            ResolveTx::Done { row, refunded } => Ok(Some(ResolvedWithdrawal {
                withdrawal: row_to_withdrawal(row).map_err(map_row_error)?,
                refunded,
            })),
        }
    }
}
