//! PostgreSQL-backed `InventoryRepository` implementation using Diesel.
//!
//! Every lifecycle transition here is one transaction. Claim selection uses
//! `FOR UPDATE SKIP LOCKED` so concurrent claimants never fight over the
//! same row, and the partial unique index on pending assignments turns a
//! same-user claim race into a unique violation this adapter resolves by
//! returning the winner's row.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, RunQueryDsl};
use rust_decimal::Decimal;

use crate::domain::ports::{
    ClaimOutcome, InventoryRepository, InventoryRepositoryError, ItemResolution, PoolCounts,
    ReferralCredit, SubmissionRecord,
};
use crate::domain::settings::defaults;
use crate::domain::{
    Amount, IntakeReport, Item, ItemDraft, ItemId, ItemStatus, SettingKey, UserId,
};

use super::diesel_error_mapping::{
    is_unique_violation, map_basic_diesel_error, map_basic_pool_error,
};
use super::ledger_ops;
use super::models::{ItemRow, NewItemRow, RowConversionError, row_to_item};
use super::pool::{DbPool, PoolError};
use super::schema::{items, users};

/// Diesel-backed implementation of the inventory port.
#[derive(Clone)]
pub struct DieselInventoryRepository {
    pool: DbPool,
}

impl DieselInventoryRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> InventoryRepositoryError {
    map_basic_pool_error(error, InventoryRepositoryError::connection)
}

fn map_diesel_error(error: diesel::result::Error) -> InventoryRepositoryError {
    map_basic_diesel_error(
        error,
        InventoryRepositoryError::query,
        InventoryRepositoryError::connection,
    )
}

fn map_row_error(error: RowConversionError) -> InventoryRepositoryError {
    InventoryRepositoryError::query(error.to_string())
}

fn amount_from(value: Decimal) -> Result<Amount, InventoryRepositoryError> {
    Amount::new(value).map_err(|err| InventoryRepositoryError::query(err.to_string()))
}

/// Claim transaction result, before row conversion.
enum ClaimTx {
    Existing(ItemRow),
    Fresh(ItemRow),
    Empty,
}

/// Submit transaction result, before row conversion.
struct SubmitTx {
    item: ItemRow,
    price: Decimal,
    repaired: bool,
}

/// Resolution transaction result, before row conversion.
enum ResolveTx {
    Missing,
    WrongState { status: String },
    Unassigned,
    Done(ResolvedTx),
}

struct ResolvedTx {
    item: ItemRow,
    user_id: i64,
    price: Decimal,
    referral: Option<(i64, Decimal)>,
}

impl DieselInventoryRepository {
    fn finish_resolution(
        &self,
        item_id: ItemId,
        tx: ResolveTx,
    ) -> Result<Option<ItemResolution>, InventoryRepositoryError> {
        match tx {
            ResolveTx::Missing => Ok(None),
            ResolveTx::WrongState { status } => Err(InventoryRepositoryError::state_conflict(
                item_id,
                status,
                ItemStatus::Submitted.as_str(),
            )),
            ResolveTx::Unassigned => Err(InventoryRepositoryError::query(format!(
                "submitted item {item_id} has no assignee"
            ))),
            ResolveTx::Done(done) => {
                let referral = match done.referral {
                    Some((referrer, bonus)) => Some(ReferralCredit {
                        referrer: UserId(referrer),
                        bonus: amount_from(bonus)?,
                    }),
                    None => None,
                };
                Ok(Some(ItemResolution {
                    item: row_to_item(done.item).map_err(map_row_error)?,
                    user_id: UserId(done.user_id),
                    price: amount_from(done.price)?,
                    referral,
                }))
            }
        }
    }
}

#[async_trait]
impl InventoryRepository for DieselInventoryRepository {
    async fn stock(&self, drafts: &[ItemDraft]) -> Result<IntakeReport, InventoryRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let mut report = IntakeReport::default();
        for draft in drafts {
            let row = NewItemRow {
                login: &draft.login,
                secret: &draft.secret,
                first_name: &draft.names.first,
                last_name: &draft.names.last,
                status: ItemStatus::Available.as_str(),
            };
            let inserted = diesel::insert_into(items::table)
                .values(&row)
                .on_conflict(items::login)
                .do_nothing()
                .execute(&mut conn)
                .await
                .map_err(map_diesel_error)?;

            if inserted == 0 {
                report.skipped += 1;
            } else {
                report.added += 1;
            }
        }
        Ok(report)
    }

    async fn find(&self, item_id: ItemId) -> Result<Option<Item>, InventoryRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let row = items::table
            .find(item_id.0)
            .select(ItemRow::as_select())
            .first::<ItemRow>(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;

        row.map(row_to_item).transpose().map_err(map_row_error)
    }

    async fn claimed_by(&self, user_id: UserId) -> Result<Option<Item>, InventoryRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let row = items::table
            .filter(items::assigned_to.eq(user_id.0))
            .filter(items::status.eq(ItemStatus::Pending.as_str()))
            .select(ItemRow::as_select())
            .first::<ItemRow>(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;

        row.map(row_to_item).transpose().map_err(map_row_error)
    }

    async fn claim(&self, user_id: UserId) -> Result<ClaimOutcome, InventoryRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let uid = user_id.0;

        let tx = conn
            .transaction::<ClaimTx, diesel::result::Error, _>(|conn| {
                async move {
                    let existing = items::table
                        .filter(items::assigned_to.eq(uid))
                        .filter(items::status.eq(ItemStatus::Pending.as_str()))
                        .select(ItemRow::as_select())
                        .first::<ItemRow>(conn)
                        .await
                        .optional()?;
                    if let Some(row) = existing {
                        return Ok(ClaimTx::Existing(row));
                    }

                    let picked = items::table
                        .filter(items::status.eq(ItemStatus::Available.as_str()))
                        .order((items::created_at.asc(), items::id.asc()))
                        .select(ItemRow::as_select())
                        .for_update()
                        .skip_locked()
                        .first::<ItemRow>(conn)
                        .await
                        .optional()?;
                    let Some(row) = picked else {
                        return Ok(ClaimTx::Empty);
                    };

                    let bound = diesel::update(items::table.find(row.id))
                        .set((
                            items::status.eq(ItemStatus::Pending.as_str()),
                            items::assigned_to.eq(Some(uid)),
                        ))
                        .returning(ItemRow::as_returning())
                        .get_result::<ItemRow>(conn)
                        .await?;
                    Ok(ClaimTx::Fresh(bound))
                }
                .scope_boxed()
            })
            .await;
        drop(conn);

        let tx = match tx {
            Ok(tx) => tx,
            // Lost the one-pending-per-user race: another call for the same
            // user bound a row first. Return the winner's row.
            Err(err) if is_unique_violation(&err) => {
                return match self.claimed_by(user_id).await? {
                    Some(item) => Ok(ClaimOutcome::AlreadyHeld(item)),
                    None => Err(InventoryRepositoryError::query(
                        "claim conflict without a pending row",
                    )),
                };
            }
            Err(err) => return Err(map_diesel_error(err)),
        };

        match tx {
            ClaimTx::Existing(row) => Ok(ClaimOutcome::AlreadyHeld(
                row_to_item(row).map_err(map_row_error)?,
            )),
            ClaimTx::Fresh(row) => Ok(ClaimOutcome::Claimed(
                row_to_item(row).map_err(map_row_error)?,
            )),
            ClaimTx::Empty => Ok(ClaimOutcome::NoneAvailable),
        }
    }

    async fn release_claim(
        &self,
        user_id: UserId,
    ) -> Result<Option<Item>, InventoryRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let released = diesel::update(
            items::table
                .filter(items::assigned_to.eq(user_id.0))
                .filter(items::status.eq(ItemStatus::Pending.as_str())),
        )
        .set((
            items::status.eq(ItemStatus::Available.as_str()),
            items::assigned_to.eq(None::<i64>),
        ))
        .returning(ItemRow::as_returning())
        .get_result::<ItemRow>(&mut conn)
        .await
        .optional()
        .map_err(map_diesel_error)?;

        released.map(row_to_item).transpose().map_err(map_row_error)
    }

    async fn submit_claim(
        &self,
        user_id: UserId,
    ) -> Result<Option<SubmissionRecord>, InventoryRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let uid = user_id.0;

        let tx = conn
            .transaction::<Option<SubmitTx>, diesel::result::Error, _>(|conn| {
                async move {
                    let pending = items::table
                        .filter(items::assigned_to.eq(uid))
                        .filter(items::status.eq(ItemStatus::Pending.as_str()))
                        .select(ItemRow::as_select())
                        .for_update()
                        .first::<ItemRow>(conn)
                        .await
                        .optional()?;
                    let Some(row) = pending else {
                        return Ok(None);
                    };

                    let price = super::diesel_settings_repository::read_amount_in_tx(
                        conn,
                        SettingKey::PricePerItem,
                        defaults::PRICE_PER_ITEM,
                    )
                    .await?;

                    let item = diesel::update(items::table.find(row.id))
                        .set(items::status.eq(ItemStatus::Submitted.as_str()))
                        .returning(ItemRow::as_returning())
                        .get_result::<ItemRow>(conn)
                        .await?;

                    let credited = ledger_ops::credit_hold(conn, uid, price).await?;
                    let repaired = credited == 0;
                    if repaired {
                        ledger_ops::insert_repair_row(conn, uid).await?;
                        ledger_ops::credit_hold(conn, uid, price).await?;
                    }

                    Ok(Some(SubmitTx {
                        item,
                        price,
                        repaired,
                    }))
                }
                .scope_boxed()
            })
            .await
            .map_err(map_diesel_error)?;

        match tx {
            None => Ok(None),
            Some(done) => Ok(Some(SubmissionRecord {
                item: row_to_item(done.item).map_err(map_row_error)?,
                price: amount_from(done.price)?,
                ledger_repaired: done.repaired,
            })),
        }
    }

    async fn approve(
        &self,
        item_id: ItemId,
    ) -> Result<Option<ItemResolution>, InventoryRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let id = item_id.0;

        let tx = conn
            .transaction::<ResolveTx, diesel::result::Error, _>(|conn| {
                async move {
                    let row = items::table
                        .find(id)
                        .select(ItemRow::as_select())
                        .for_update()
                        .first::<ItemRow>(conn)
                        .await
                        .optional()?;
                    let Some(row) = row else {
                        return Ok(ResolveTx::Missing);
                    };
                    if row.status != ItemStatus::Submitted.as_str() {
                        return Ok(ResolveTx::WrongState { status: row.status });
                    }
                    let Some(uid) = row.assigned_to else {
                        return Ok(ResolveTx::Unassigned);
                    };

                    let price = super::diesel_settings_repository::read_amount_in_tx(
                        conn,
                        SettingKey::PricePerItem,
                        defaults::PRICE_PER_ITEM,
                    )
                    .await?;

                    let item = diesel::update(items::table.find(id))
                        .set(items::status.eq(ItemStatus::Sold.as_str()))
                        .returning(ItemRow::as_returning())
                        .get_result::<ItemRow>(conn)
                        .await?;
                    ledger_ops::release_hold(conn, uid, price).await?;

                    let referred: Option<Option<i64>> = users::table
                        .find(uid)
                        .select(users::referred_by)
                        .first(conn)
                        .await
                        .optional()?;
                    let mut referral = None;
                    if let Some(referrer) = referred.flatten() {
                        let bonus = super::diesel_settings_repository::read_amount_in_tx(
                            conn,
                            SettingKey::ReferralBonus,
                            defaults::REFERRAL_BONUS,
                        )
                        .await?;
                        if bonus > Decimal::ZERO {
                            let touched =
                                ledger_ops::credit_available(conn, referrer, bonus).await?;
                            if touched > 0 {
                                referral = Some((referrer, bonus));
                            }
                        }
                    }

                    Ok(ResolveTx::Done(ResolvedTx {
                        item,
                        user_id: uid,
                        price,
                        referral,
                    }))
                }
                .scope_boxed()
            })
            .await
            .map_err(map_diesel_error)?;

        self.finish_resolution(item_id, tx)
    }

    async fn reject(
        &self,
        item_id: ItemId,
    ) -> Result<Option<ItemResolution>, InventoryRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let id = item_id.0;

        let tx = conn
            .transaction::<ResolveTx, diesel::result::Error, _>(|conn| {
                async move {
                    let row = items::table
                        .find(id)
                        .select(ItemRow::as_select())
                        .for_update()
                        .first::<ItemRow>(conn)
                        .await
                        .optional()?;
                    let Some(row) = row else {
                        return Ok(ResolveTx::Missing);
                    };
                    if row.status != ItemStatus::Submitted.as_str() {
                        return Ok(ResolveTx::WrongState { status: row.status });
                    }
                    let Some(uid) = row.assigned_to else {
                        return Ok(ResolveTx::Unassigned);
                    };

                    // Reversal at the *current* price: if the operator
                    // changed the price since submission, the amounts
                    // differ. Kept as the system has always behaved.
                    let price = super::diesel_settings_repository::read_amount_in_tx(
                        conn,
                        SettingKey::PricePerItem,
                        defaults::PRICE_PER_ITEM,
                    )
                    .await?;

                    let item = diesel::update(items::table.find(id))
                        .set(items::status.eq(ItemStatus::Rejected.as_str()))
                        .returning(ItemRow::as_returning())
                        .get_result::<ItemRow>(conn)
                        .await?;
                    ledger_ops::debit_hold(conn, uid, price).await?;

                    Ok(ResolveTx::Done(ResolvedTx {
                        item,
                        user_id: uid,
                        price,
                        referral: None,
                    }))
                }
                .scope_boxed()
            })
            .await
            .map_err(map_diesel_error)?;

        self.finish_resolution(item_id, tx)
    }

    async fn pending_review(&self) -> Result<Vec<Item>, InventoryRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let rows: Vec<ItemRow> = items::table
            .filter(items::status.eq(ItemStatus::Submitted.as_str()))
            .order((items::created_at.asc(), items::id.asc()))
            .select(ItemRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        rows.into_iter()
            .map(|row| row_to_item(row).map_err(map_row_error))
            .collect()
    }

    async fn history_for(
        &self,
        user_id: UserId,
        limit: i64,
    ) -> Result<Vec<Item>, InventoryRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let rows: Vec<ItemRow> = items::table
            .filter(items::assigned_to.eq(user_id.0))
            .filter(items::status.eq_any([
                ItemStatus::Submitted.as_str(),
                ItemStatus::Sold.as_str(),
            ]))
            .order((items::created_at.desc(), items::id.desc()))
            .limit(limit)
            .select(ItemRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        rows.into_iter()
            .map(|row| row_to_item(row).map_err(map_row_error))
            .collect()
    }

    async fn counts(&self) -> Result<PoolCounts, InventoryRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let available: i64 = items::table
            .filter(items::status.eq(ItemStatus::Available.as_str()))
            .count()
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        let sold: i64 = items::table
            .filter(items::status.eq(ItemStatus::Sold.as_str()))
            .count()
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        Ok(PoolCounts {
            available: u64::try_from(available).unwrap_or_default(),
            sold: u64::try_from(sold).unwrap_or_default(),
        })
    }
}
