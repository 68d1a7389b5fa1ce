//! PostgreSQL-backed `AdminRoster` implementation using Diesel.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::domain::UserId;
use crate::domain::ports::{AdminRoster, AdminRosterError};

use super::diesel_error_mapping::{map_basic_diesel_error, map_basic_pool_error};
use super::models::AdminRow;
use super::pool::{DbPool, PoolError};
use super::schema::admins;

/// Diesel-backed implementation of the admin allowlist.
#[derive(Clone)]
pub struct DieselAdminRoster {
    pool: DbPool,
}

impl DieselAdminRoster {
    /// Create a new roster with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> AdminRosterError {
    map_basic_pool_error(error, AdminRosterError::connection)
}

fn map_diesel_error(error: diesel::result::Error) -> AdminRosterError {
    map_basic_diesel_error(error, AdminRosterError::query, AdminRosterError::connection)
}

#[async_trait]
impl AdminRoster for DieselAdminRoster {
    async fn add(&self, user_id: UserId) -> Result<bool, AdminRosterError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let inserted = diesel::insert_into(admins::table)
            .values(AdminRow { user_id: user_id.0 })
            .on_conflict(admins::user_id)
            .do_nothing()
            .execute(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        Ok(inserted > 0)
    }

    async fn contains(&self, user_id: UserId) -> Result<bool, AdminRosterError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let found: Option<i64> = admins::table
            .find(user_id.0)
            .select(admins::user_id)
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;

        Ok(found.is_some())
    }

    async fn list(&self) -> Result<Vec<UserId>, AdminRosterError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let ids: Vec<i64> = admins::table
            .select(admins::user_id)
            .order(admins::user_id.asc())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        Ok(ids.into_iter().map(UserId).collect())
    }
}
