//! Domain types, ports, and engine services.
//!
//! Purpose: define the brokerage's strongly typed entities, the driven
//! ports the outbound adapters implement, and the engine services that are
//! the complete contract exposed to the conversational collaborator. Keep
//! types immutable and document invariants and serde contracts in each
//! type's Rustdoc.

pub mod allocation_service;
pub mod approval_service;
pub mod error;
pub mod item;
pub mod ledger_service;
pub mod money;
pub mod notification;
pub mod ports;
pub mod settings;
pub mod settings_service;
pub mod user;
pub mod withdrawal;
pub mod withdrawal_service;

pub use self::allocation_service::AllocationService;
pub use self::approval_service::ApprovalService;
pub use self::error::{Error, ErrorCode, ErrorValidationError};
pub use self::item::{
    IntakeReport, Item, ItemDraft, ItemId, ItemStatus, NamePair, ParseItemStatusError,
};
pub use self::ledger_service::{LedgerService, StockStats};
pub use self::money::{Amount, AmountValidationError, AMOUNT_SCALE};
pub use self::notification::{Notification, NotificationEvent};
pub use self::settings::{SettingKey, SettingsSnapshot};
pub use self::settings_service::SettingsService;
pub use self::user::{
    Balances, Enrollment, PaymentInfo, UserAccount, UserId, REPAIRED_DISPLAY_NAME,
};
pub use self::withdrawal::{
    ParseWithdrawalStatusError, Withdrawal, WithdrawalId, WithdrawalOutcome, WithdrawalStatus,
};
pub use self::withdrawal_service::WithdrawalService;

/// Convenient result alias for engine operations.
pub type EngineResult<T> = Result<T, Error>;
