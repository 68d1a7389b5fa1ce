//! Diesel adapters over PostgreSQL.
//!
//! One adapter per driven port, all sharing the [`DbPool`] store handle.
//! Multi-step state changes run inside `diesel-async` transactions with
//! commit-or-rollback on every exit path; see each adapter for its
//! locking strategy.

pub mod migrations;
pub mod pool;

mod diesel_admin_roster;
mod diesel_error_mapping;
mod diesel_inventory_repository;
mod diesel_ledger_repository;
mod diesel_settings_repository;
mod diesel_withdrawal_repository;
mod ledger_ops;
mod models;
mod schema;

pub use self::diesel_admin_roster::DieselAdminRoster;
pub use self::diesel_inventory_repository::DieselInventoryRepository;
pub use self::diesel_ledger_repository::DieselLedgerRepository;
pub use self::diesel_settings_repository::DieselSettingsRepository;
pub use self::diesel_withdrawal_repository::DieselWithdrawalRepository;
pub use self::migrations::{MigrationError, run_migrations};
pub use self::pool::{DbPool, PoolError};

pub(crate) use self::diesel_error_mapping::{map_basic_diesel_error, map_basic_pool_error};
pub(crate) use self::models::NewNotificationRow;
pub(crate) use self::schema::notifications;
