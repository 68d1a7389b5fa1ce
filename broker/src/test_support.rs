//! Test utilities for the broker crate.
//!
//! Provides an in-memory implementation of every driven port, mirroring the
//! Diesel adapters' semantics closely enough to exercise the engines'
//! behaviour end-to-end without a database. One mutex guards the whole
//! state, so each port operation is atomic exactly like its transactional
//! counterpart.
//!
//! Shared by unit tests (in `src/`) and the behaviour tests (in `tests/`);
//! compiled only with the `test-support` feature or under `cfg(test)`.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;

use crate::domain::ports::{
    AdminRoster, AdminRosterError, ClaimOutcome, InventoryRepository, InventoryRepositoryError,
    ItemResolution, LedgerRepository, LedgerRepositoryError, NotificationQueue,
    NotificationQueueError, PoolCounts, ReferralCredit, ReservationOutcome, ResolvedWithdrawal,
    SettingsRepository, SettingsRepositoryError, SubmissionRecord, WithdrawalRepository,
    WithdrawalRepositoryError,
};
use crate::domain::settings::defaults;
use crate::domain::{
    Amount, Balances, Enrollment, IntakeReport, Item, ItemDraft, ItemId, ItemStatus, Notification,
    PaymentInfo, REPAIRED_DISPLAY_NAME, SettingKey, UserAccount, UserId, Withdrawal, WithdrawalId,
    WithdrawalOutcome, WithdrawalStatus,
};

#[derive(Debug, Default)]
struct State {
    items: BTreeMap<i64, Item>,
    users: BTreeMap<i64, UserAccount>,
    withdrawals: BTreeMap<i64, Withdrawal>,
    settings: BTreeMap<String, String>,
    admins: BTreeSet<i64>,
    outbox: Vec<Notification>,
    next_item_id: i64,
    next_withdrawal_id: i64,
}

/// In-memory implementation of all driven ports.
///
/// Wrap it in one `Arc` and hand clones of that `Arc` to every service; the
/// internal mutex makes each operation atomic, mirroring the per-operation
/// transactions of the Diesel adapters.
#[derive(Debug, Default)]
pub struct InMemoryBroker {
    state: Mutex<State>,
}

impl InMemoryBroker {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("state mutex poisoned")
    }

    /// Fetch an item snapshot directly, bypassing the ports.
    pub fn item_snapshot(&self, item_id: ItemId) -> Option<Item> {
        self.lock().items.get(&item_id.0).cloned()
    }

    /// Fetch a user snapshot directly, bypassing the ports.
    pub fn user_snapshot(&self, user_id: UserId) -> Option<UserAccount> {
        self.lock().users.get(&user_id.0).cloned()
    }

    /// Every notification enqueued so far, in order.
    pub fn outbox_snapshot(&self) -> Vec<Notification> {
        self.lock().outbox.clone()
    }

    /// Overwrite a setting without going through the port.
    pub fn put_setting(&self, key: SettingKey, value: &str) {
        self.lock()
            .settings
            .insert(key.as_str().to_owned(), value.to_owned());
    }

    fn amount_setting(state: &State, key: SettingKey, fallback: &str) -> Amount {
        let raw = state
            .settings
            .get(key.as_str())
            .cloned()
            .unwrap_or_else(|| fallback.to_owned());
        Amount::parse(&raw).unwrap_or(Amount::ZERO)
    }

    fn price(state: &State) -> Amount {
        Self::amount_setting(state, SettingKey::PricePerItem, defaults::PRICE_PER_ITEM)
    }

    fn bonus(state: &State) -> Amount {
        Self::amount_setting(state, SettingKey::ReferralBonus, defaults::REFERRAL_BONUS)
    }

    fn pending_item_of(state: &State, user_id: UserId) -> Option<Item> {
        state
            .items
            .values()
            .find(|item| {
                item.assigned_to == Some(user_id) && item.status == ItemStatus::Pending
            })
            .cloned()
    }
}

#[async_trait]
impl InventoryRepository for InMemoryBroker {
    async fn stock(&self, drafts: &[ItemDraft]) -> Result<IntakeReport, InventoryRepositoryError> {
        let mut state = self.lock();
        let mut report = IntakeReport::default();

        for draft in drafts {
            let duplicate = state.items.values().any(|item| item.login == draft.login);
            if duplicate {
                report.skipped += 1;
                continue;
            }
            state.next_item_id += 1;
            let id = state.next_item_id;
            state.items.insert(
                id,
                Item {
                    id: ItemId(id),
                    login: draft.login.clone(),
                    secret: draft.secret.clone(),
                    names: draft.names.clone(),
                    status: ItemStatus::Available,
                    assigned_to: None,
                    created_at: Utc::now(),
                },
            );
            report.added += 1;
        }
        Ok(report)
    }

    async fn find(&self, item_id: ItemId) -> Result<Option<Item>, InventoryRepositoryError> {
        Ok(self.lock().items.get(&item_id.0).cloned())
    }

    async fn claimed_by(&self, user_id: UserId) -> Result<Option<Item>, InventoryRepositoryError> {
        Ok(Self::pending_item_of(&self.lock(), user_id))
    }

    async fn claim(&self, user_id: UserId) -> Result<ClaimOutcome, InventoryRepositoryError> {
        let mut state = self.lock();

        if let Some(existing) = Self::pending_item_of(&state, user_id) {
            return Ok(ClaimOutcome::AlreadyHeld(existing));
        }

        // BTreeMap iteration is id order, which is insertion order here.
        let picked = state
            .items
            .values()
            .find(|item| item.status == ItemStatus::Available)
            .map(|item| item.id.0);
        let Some(id) = picked else {
            return Ok(ClaimOutcome::NoneAvailable);
        };

        let item = state
            .items
            .get_mut(&id)
            .expect("picked item exists under the same lock");
        item.status = ItemStatus::Pending;
        item.assigned_to = Some(user_id);
        Ok(ClaimOutcome::Claimed(item.clone()))
    }

    async fn release_claim(
        &self,
        user_id: UserId,
    ) -> Result<Option<Item>, InventoryRepositoryError> {
        let mut state = self.lock();

        let Some(pending) = Self::pending_item_of(&state, user_id) else {
            return Ok(None);
        };
        let item = state
            .items
            .get_mut(&pending.id.0)
            .expect("pending item exists under the same lock");
        item.status = ItemStatus::Available;
        item.assigned_to = None;
        Ok(Some(item.clone()))
    }

    async fn submit_claim(
        &self,
        user_id: UserId,
    ) -> Result<Option<SubmissionRecord>, InventoryRepositoryError> {
        let mut state = self.lock();

        let Some(pending) = Self::pending_item_of(&state, user_id) else {
            return Ok(None);
        };
        let price = Self::price(&state);

        let item = state
            .items
            .get_mut(&pending.id.0)
            .expect("pending item exists under the same lock");
        item.status = ItemStatus::Submitted;
        let item = item.clone();

        let repaired = !state.users.contains_key(&user_id.0);
        if repaired {
            state.users.insert(
                user_id.0,
                UserAccount {
                    id: user_id,
                    display_name: REPAIRED_DISPLAY_NAME.to_owned(),
                    available: Amount::ZERO,
                    hold: Amount::ZERO,
                    payment_info: PaymentInfo::new(),
                    referred_by: None,
                    created_at: Utc::now(),
                },
            );
        }
        let account = state
            .users
            .get_mut(&user_id.0)
            .expect("account inserted above when missing");
        account.hold = account.hold.saturating_add(price);

        Ok(Some(SubmissionRecord {
            item,
            price,
            ledger_repaired: repaired,
        }))
    }

    async fn approve(
        &self,
        item_id: ItemId,
    ) -> Result<Option<ItemResolution>, InventoryRepositoryError> {
        let mut state = self.lock();

        let Some(snapshot) = state.items.get(&item_id.0).cloned() else {
            return Ok(None);
        };
        if snapshot.status != ItemStatus::Submitted {
            return Err(InventoryRepositoryError::state_conflict(
                item_id,
                snapshot.status.as_str(),
                ItemStatus::Submitted.as_str(),
            ));
        }
        let Some(user_id) = snapshot.assigned_to else {
            return Err(InventoryRepositoryError::query(format!(
                "submitted item {item_id} has no assignee"
            )));
        };

        let price = Self::price(&state);
        let bonus = Self::bonus(&state);

        let item = state
            .items
            .get_mut(&item_id.0)
            .expect("item exists under the same lock");
        item.status = ItemStatus::Sold;
        let item = item.clone();

        if let Some(account) = state.users.get_mut(&user_id.0) {
            // The SQL schema carries no balance check constraints; clamp
            // here so drifted prices cannot panic the in-memory double.
            account.hold = account.hold.checked_sub(price).unwrap_or(Amount::ZERO);
            account.available = account.available.saturating_add(price);
        }

        let mut referral = None;
        let referrer = state
            .users
            .get(&user_id.0)
            .and_then(|account| account.referred_by);
        if let Some(referrer_id) = referrer {
            if !bonus.is_zero() {
                if let Some(account) = state.users.get_mut(&referrer_id.0) {
                    account.available = account.available.saturating_add(bonus);
                    referral = Some(ReferralCredit {
                        referrer: referrer_id,
                        bonus,
                    });
                }
            }
        }

        Ok(Some(ItemResolution {
            item,
            user_id,
            price,
            referral,
        }))
    }

    async fn reject(
        &self,
        item_id: ItemId,
    ) -> Result<Option<ItemResolution>, InventoryRepositoryError> {
        let mut state = self.lock();

        let Some(snapshot) = state.items.get(&item_id.0).cloned() else {
            return Ok(None);
        };
        if snapshot.status != ItemStatus::Submitted {
            return Err(InventoryRepositoryError::state_conflict(
                item_id,
                snapshot.status.as_str(),
                ItemStatus::Submitted.as_str(),
            ));
        }
        let Some(user_id) = snapshot.assigned_to else {
            return Err(InventoryRepositoryError::query(format!(
                "submitted item {item_id} has no assignee"
            )));
        };

        let price = Self::price(&state);

        let item = state
            .items
            .get_mut(&item_id.0)
            .expect("item exists under the same lock");
        item.status = ItemStatus::Rejected;
        let item = item.clone();

        if let Some(account) = state.users.get_mut(&user_id.0) {
            account.hold = account.hold.checked_sub(price).unwrap_or(Amount::ZERO);
        }

        Ok(Some(ItemResolution {
            item,
            user_id,
            price,
            referral: None,
        }))
    }

    async fn pending_review(&self) -> Result<Vec<Item>, InventoryRepositoryError> {
        Ok(self
            .lock()
            .items
            .values()
            .filter(|item| item.status == ItemStatus::Submitted)
            .cloned()
            .collect())
    }

    async fn history_for(
        &self,
        user_id: UserId,
        limit: i64,
    ) -> Result<Vec<Item>, InventoryRepositoryError> {
        let state = self.lock();
        let mut history: Vec<Item> = state
            .items
            .values()
            .filter(|item| {
                item.assigned_to == Some(user_id)
                    && matches!(item.status, ItemStatus::Submitted | ItemStatus::Sold)
            })
            .cloned()
            .collect();
        history.reverse();
        history.truncate(usize::try_from(limit).unwrap_or_default());
        Ok(history)
    }

    async fn counts(&self) -> Result<PoolCounts, InventoryRepositoryError> {
        let state = self.lock();
        let available = state
            .items
            .values()
            .filter(|item| item.status == ItemStatus::Available)
            .count() as u64;
        let sold = state
            .items
            .values()
            .filter(|item| item.status == ItemStatus::Sold)
            .count() as u64;
        Ok(PoolCounts { available, sold })
    }
}

#[async_trait]
impl LedgerRepository for InMemoryBroker {
    async fn enroll(&self, enrollment: &Enrollment) -> Result<bool, LedgerRepositoryError> {
        let mut state = self.lock();

        if state.users.contains_key(&enrollment.user_id.0) {
            return Ok(false);
        }
        state.users.insert(
            enrollment.user_id.0,
            UserAccount {
                id: enrollment.user_id,
                display_name: enrollment.display_name.clone(),
                available: Amount::ZERO,
                hold: Amount::ZERO,
                payment_info: PaymentInfo::new(),
                referred_by: enrollment.referred_by,
                created_at: Utc::now(),
            },
        );
        Ok(true)
    }

    async fn find(&self, user_id: UserId) -> Result<Option<UserAccount>, LedgerRepositoryError> {
        Ok(self.lock().users.get(&user_id.0).cloned())
    }

    async fn balances(&self, user_id: UserId) -> Result<Balances, LedgerRepositoryError> {
        Ok(self
            .lock()
            .users
            .get(&user_id.0)
            .map(|account| Balances {
                available: account.available,
                hold: account.hold,
            })
            .unwrap_or_default())
    }

    async fn merge_payment_info(
        &self,
        user_id: UserId,
        entries: &PaymentInfo,
    ) -> Result<(), LedgerRepositoryError> {
        let mut state = self.lock();
        let account = state
            .users
            .get_mut(&user_id.0)
            .ok_or_else(|| LedgerRepositoryError::unknown_user(user_id))?;
        account.payment_info.extend(entries.clone());
        Ok(())
    }

    async fn payment_info(&self, user_id: UserId) -> Result<PaymentInfo, LedgerRepositoryError> {
        Ok(self
            .lock()
            .users
            .get(&user_id.0)
            .map(|account| account.payment_info.clone())
            .unwrap_or_default())
    }

    async fn referral_count(&self, user_id: UserId) -> Result<u64, LedgerRepositoryError> {
        Ok(self
            .lock()
            .users
            .values()
            .filter(|account| account.referred_by == Some(user_id))
            .count() as u64)
    }

    async fn user_count(&self) -> Result<u64, LedgerRepositoryError> {
        Ok(self.lock().users.len() as u64)
    }

    async fn all_user_ids(&self) -> Result<Vec<UserId>, LedgerRepositoryError> {
        Ok(self.lock().users.keys().map(|id| UserId(*id)).collect())
    }
}

#[async_trait]
impl WithdrawalRepository for InMemoryBroker {
    async fn reserve(
        &self,
        user_id: UserId,
        amount: Amount,
        method: &str,
        details: &str,
    ) -> Result<ReservationOutcome, WithdrawalRepositoryError> {
        let mut state = self.lock();

        let Some(account) = state.users.get_mut(&user_id.0) else {
            return Ok(ReservationOutcome::Insufficient {
                available: Amount::ZERO,
            });
        };
        let Some(remaining) = account.available.checked_sub(amount) else {
            return Ok(ReservationOutcome::Insufficient {
                available: account.available,
            });
        };
        account.available = remaining;

        state.next_withdrawal_id += 1;
        let id = state.next_withdrawal_id;
        let withdrawal = Withdrawal {
            id: WithdrawalId(id),
            user_id,
            amount,
            method: method.to_owned(),
            details: details.to_owned(),
            status: WithdrawalStatus::Pending,
            created_at: Utc::now(),
        };
        state.withdrawals.insert(id, withdrawal.clone());
        Ok(ReservationOutcome::Created(withdrawal))
    }

    async fn pending(&self) -> Result<Vec<Withdrawal>, WithdrawalRepositoryError> {
        Ok(self
            .lock()
            .withdrawals
            .values()
            .filter(|w| w.status == WithdrawalStatus::Pending)
            .cloned()
            .collect())
    }

    async fn resolve(
        &self,
        withdrawal_id: WithdrawalId,
        outcome: WithdrawalOutcome,
    ) -> Result<Option<ResolvedWithdrawal>, WithdrawalRepositoryError> {
        let mut state = self.lock();

        let Some(snapshot) = state.withdrawals.get(&withdrawal_id.0).cloned() else {
            return Ok(None);
        };
        if snapshot.status != WithdrawalStatus::Pending {
            return Err(WithdrawalRepositoryError::already_resolved(
                withdrawal_id,
                snapshot.status.as_str(),
            ));
        }

        let refunded = matches!(outcome, WithdrawalOutcome::Rejected);
        if refunded {
            if let Some(account) = state.users.get_mut(&snapshot.user_id.0) {
                account.available = account.available.saturating_add(snapshot.amount);
            }
        }

        let withdrawal = state
            .withdrawals
            .get_mut(&withdrawal_id.0)
            .expect("withdrawal exists under the same lock");
        withdrawal.status = outcome.status();
        Ok(Some(ResolvedWithdrawal {
            withdrawal: withdrawal.clone(),
            refunded,
        }))
    }
}

#[async_trait]
impl SettingsRepository for InMemoryBroker {
    async fn get(&self, key: SettingKey) -> Result<Option<String>, SettingsRepositoryError> {
        Ok(self.lock().settings.get(key.as_str()).cloned())
    }

    async fn set(&self, key: SettingKey, value: &str) -> Result<(), SettingsRepositoryError> {
        self.lock()
            .settings
            .insert(key.as_str().to_owned(), value.to_owned());
        Ok(())
    }
}

#[async_trait]
impl AdminRoster for InMemoryBroker {
    async fn add(&self, user_id: UserId) -> Result<bool, AdminRosterError> {
        Ok(self.lock().admins.insert(user_id.0))
    }

    async fn contains(&self, user_id: UserId) -> Result<bool, AdminRosterError> {
        Ok(self.lock().admins.contains(&user_id.0))
    }

    async fn list(&self) -> Result<Vec<UserId>, AdminRosterError> {
        Ok(self.lock().admins.iter().map(|id| UserId(*id)).collect())
    }
}

#[async_trait]
impl NotificationQueue for InMemoryBroker {
    async fn enqueue(&self, notification: &Notification) -> Result<(), NotificationQueueError> {
        self.lock().outbox.push(notification.clone());
        Ok(())
    }
}

/// Build a decimal with two fractional digits from integer cents.
///
/// Convenience for assertions: `cents(1000)` is `10.00`.
pub fn cents(value: i64) -> Amount {
    Amount::new(Decimal::new(value, 2)).expect("non-negative cents")
}
