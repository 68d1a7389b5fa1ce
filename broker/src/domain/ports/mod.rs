//! Driven ports implemented by outbound adapters.
//!
//! Each port is an `async_trait` contract with a small error enum. The
//! Diesel adapters in [`crate::outbound::persistence`] provide the durable
//! implementations; `mockall` automocks and the fixtures defined alongside
//! some ports serve unit tests.

pub mod admin_roster;
pub mod inventory_repository;
pub mod ledger_repository;
pub mod notification_queue;
pub mod settings_repository;
pub mod withdrawal_repository;

pub use self::admin_roster::{AdminRoster, AdminRosterError};
pub use self::inventory_repository::{
    ClaimOutcome, InventoryRepository, InventoryRepositoryError, ItemResolution, PoolCounts,
    ReferralCredit, SubmissionRecord,
};
pub use self::ledger_repository::{LedgerRepository, LedgerRepositoryError};
pub use self::notification_queue::{
    FixtureNotificationQueue, NotificationQueue, NotificationQueueError,
};
pub use self::settings_repository::{
    FixtureSettingsRepository, SettingsRepository, SettingsRepositoryError,
};
pub use self::withdrawal_repository::{
    ReservationOutcome, ResolvedWithdrawal, WithdrawalRepository, WithdrawalRepositoryError,
};

#[cfg(test)]
pub use self::admin_roster::MockAdminRoster;
#[cfg(test)]
pub use self::inventory_repository::MockInventoryRepository;
#[cfg(test)]
pub use self::ledger_repository::MockLedgerRepository;
#[cfg(test)]
pub use self::notification_queue::MockNotificationQueue;
#[cfg(test)]
pub use self::settings_repository::MockSettingsRepository;
#[cfg(test)]
pub use self::withdrawal_repository::MockWithdrawalRepository;
