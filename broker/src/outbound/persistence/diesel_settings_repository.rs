//! PostgreSQL-backed `SettingsRepository` implementation using Diesel.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use rust_decimal::Decimal;

use crate::domain::SettingKey;
use crate::domain::ports::{SettingsRepository, SettingsRepositoryError};

use super::diesel_error_mapping::{map_basic_diesel_error, map_basic_pool_error};
use super::models::{RowConversionError, SettingRow};
use super::pool::{DbPool, PoolError};
use super::schema::settings;

/// Diesel-backed implementation of the settings port.
#[derive(Clone)]
pub struct DieselSettingsRepository {
    pool: DbPool,
}

impl DieselSettingsRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> SettingsRepositoryError {
    map_basic_pool_error(error, SettingsRepositoryError::connection)
}

fn map_diesel_error(error: diesel::result::Error) -> SettingsRepositoryError {
    map_basic_diesel_error(
        error,
        SettingsRepositoryError::query,
        SettingsRepositoryError::connection,
    )
}

/// Read a decimal setting inside a caller-owned transaction.
///
/// The allocation and approval adapters call this so the price or bonus
/// they apply is read in the same transaction as the balance change it
/// drives. A missing key resolves to `fallback`; a stored value that fails
/// to parse aborts the transaction.
pub(super) async fn read_amount_in_tx(
    conn: &mut AsyncPgConnection,
    key: SettingKey,
    fallback: &str,
) -> Result<Decimal, diesel::result::Error> {
    let raw: Option<String> = settings::table
        .find(key.as_str())
        .select(settings::value)
        .first(conn)
        .await
        .optional()?;

    let text = raw.unwrap_or_else(|| fallback.to_owned());
    text.trim().parse::<Decimal>().map_err(|err| {
        diesel::result::Error::DeserializationError(Box::new(RowConversionError::new(format!(
            "setting {} is not a decimal: {err}",
            key.as_str()
        ))))
    })
}

#[async_trait]
impl SettingsRepository for DieselSettingsRepository {
    async fn get(&self, key: SettingKey) -> Result<Option<String>, SettingsRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        settings::table
            .find(key.as_str())
            .select(settings::value)
            .first::<String>(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)
    }

    async fn set(&self, key: SettingKey, value: &str) -> Result<(), SettingsRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let row = SettingRow {
            key: key.as_str().to_owned(),
            value: value.to_owned(),
        };
        diesel::insert_into(settings::table)
            .values(&row)
            .on_conflict(settings::key)
            .do_update()
            .set(settings::value.eq(&row.value))
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(map_diesel_error)
    }
}
