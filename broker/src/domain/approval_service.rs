//! Approval engine: administrator-facing resolution of submitted items and
//! pending withdrawals.
//!
//! Both queues are surfaced oldest-first and resolved one record at a time.
//! Every successful resolution enqueues a notification for the affected
//! user on the fire-and-forget queue; a failed enqueue is logged and
//! swallowed because the balance change has already committed.

use std::sync::Arc;

use crate::domain::ports::{
    AdminRoster, AdminRosterError, InventoryRepository, InventoryRepositoryError, ItemResolution,
    NotificationQueue, ResolvedWithdrawal, WithdrawalRepository, WithdrawalRepositoryError,
};
use crate::domain::{
    Error, Item, ItemId, Notification, NotificationEvent, UserId, Withdrawal, WithdrawalId,
    WithdrawalOutcome,
};

/// Approval engine service.
pub struct ApprovalService<I, W, R, Q> {
    inventory: Arc<I>,
    withdrawals: Arc<W>,
    roster: Arc<R>,
    notifications: Arc<Q>,
}

impl<I, W, R, Q> Clone for ApprovalService<I, W, R, Q> {
    fn clone(&self) -> Self {
        Self {
            inventory: Arc::clone(&self.inventory),
            withdrawals: Arc::clone(&self.withdrawals),
            roster: Arc::clone(&self.roster),
            notifications: Arc::clone(&self.notifications),
        }
    }
}

impl<I, W, R, Q> ApprovalService<I, W, R, Q> {
    /// Create a new service over the administrator-facing ports.
    pub fn new(
        inventory: Arc<I>,
        withdrawals: Arc<W>,
        roster: Arc<R>,
        notifications: Arc<Q>,
    ) -> Self {
        Self {
            inventory,
            withdrawals,
            roster,
            notifications,
        }
    }
}

fn map_inventory_error(error: InventoryRepositoryError) -> Error {
    match error {
        InventoryRepositoryError::Connection { message }
        | InventoryRepositoryError::Query { message } => Error::store_unavailable(message),
        InventoryRepositoryError::StateConflict {
            item_id,
            status,
            required,
        } => Error::invalid_state(format!(
            "item {item_id} is {status}, expected {required}"
        )),
    }
}

fn map_withdrawal_error(error: WithdrawalRepositoryError) -> Error {
    match error {
        WithdrawalRepositoryError::Connection { message }
        | WithdrawalRepositoryError::Query { message } => Error::store_unavailable(message),
        WithdrawalRepositoryError::AlreadyResolved {
            withdrawal_id,
            status,
        } => Error::invalid_state(format!(
            "withdrawal {withdrawal_id} already resolved to {status}"
        )),
    }
}

fn map_roster_error(error: AdminRosterError) -> Error {
    match error {
        AdminRosterError::Connection { message } | AdminRosterError::Query { message } => {
            Error::store_unavailable(message)
        }
    }
}

impl<I, W, R, Q> ApprovalService<I, W, R, Q>
where
    I: InventoryRepository,
    W: WithdrawalRepository,
    R: AdminRoster,
    Q: NotificationQueue,
{
    /// Submitted items awaiting review, oldest first.
    pub async fn pending_items(&self) -> Result<Vec<Item>, Error> {
        self.inventory
            .pending_review()
            .await
            .map_err(map_inventory_error)
    }

    /// Pending withdrawals awaiting resolution, oldest first.
    pub async fn pending_withdrawals(&self) -> Result<Vec<Withdrawal>, Error> {
        self.withdrawals
            .pending()
            .await
            .map_err(map_withdrawal_error)
    }

    /// Approve a submitted item.
    ///
    /// Marks it `sold`, moves the configured price from the user's hold to
    /// their available balance, and credits the referrer's bonus when one
    /// applies, all in one transaction. Returns the resolution so the
    /// caller knows which user to address.
    pub async fn approve_item(&self, item_id: ItemId) -> Result<ItemResolution, Error> {
        let resolution = self
            .inventory
            .approve(item_id)
            .await
            .map_err(map_inventory_error)?
            .ok_or_else(|| Error::not_found(format!("no item {item_id}")))?;

        tracing::info!(
            item = %item_id,
            user = %resolution.user_id,
            price = %resolution.price,
            "item approved, hold released"
        );

        self.notify(Notification::new(
            resolution.user_id,
            NotificationEvent::ItemApproved {
                item_id,
                price: resolution.price,
            },
        ))
        .await;
        if let Some(credit) = resolution.referral {
            self.notify(Notification::new(
                credit.referrer,
                NotificationEvent::ReferralBonusEarned {
                    bonus: credit.bonus,
                },
            ))
            .await;
        }

        Ok(resolution)
    }

    /// Reject a submitted item, reversing the submission credit.
    ///
    /// The reversal uses the currently configured price, which may differ
    /// from the price credited at submission if the operator changed it in
    /// between.
    pub async fn reject_item(&self, item_id: ItemId) -> Result<ItemResolution, Error> {
        let resolution = self
            .inventory
            .reject(item_id)
            .await
            .map_err(map_inventory_error)?
            .ok_or_else(|| Error::not_found(format!("no item {item_id}")))?;

        tracing::info!(
            item = %item_id,
            user = %resolution.user_id,
            price = %resolution.price,
            "item rejected, hold reversed"
        );

        self.notify(Notification::new(
            resolution.user_id,
            NotificationEvent::ItemRejected { item_id },
        ))
        .await;

        Ok(resolution)
    }

    /// Drive a pending withdrawal to its terminal state.
    ///
    /// Rejection refunds the reserved amount; payment changes no balance.
    pub async fn resolve_withdrawal(
        &self,
        withdrawal_id: WithdrawalId,
        outcome: WithdrawalOutcome,
    ) -> Result<ResolvedWithdrawal, Error> {
        let resolved = self
            .withdrawals
            .resolve(withdrawal_id, outcome)
            .await
            .map_err(map_withdrawal_error)?
            .ok_or_else(|| Error::not_found(format!("no withdrawal {withdrawal_id}")))?;

        tracing::info!(
            withdrawal = %withdrawal_id,
            user = %resolved.withdrawal.user_id,
            outcome = %resolved.withdrawal.status,
            refunded = resolved.refunded,
            "withdrawal resolved"
        );

        let event = match outcome {
            WithdrawalOutcome::Paid => NotificationEvent::WithdrawalPaid {
                withdrawal_id,
                amount: resolved.withdrawal.amount,
            },
            WithdrawalOutcome::Rejected => NotificationEvent::WithdrawalRejected {
                withdrawal_id,
                amount: resolved.withdrawal.amount,
            },
        };
        self.notify(Notification::new(resolved.withdrawal.user_id, event))
            .await;

        Ok(resolved)
    }

    /// Add a user to the administrator allowlist.
    pub async fn grant_admin(&self, user_id: UserId) -> Result<bool, Error> {
        self.roster.add(user_id).await.map_err(map_roster_error)
    }

    /// Whether the user is on the administrator allowlist.
    pub async fn is_admin(&self, user_id: UserId) -> Result<bool, Error> {
        self.roster
            .contains(user_id)
            .await
            .map_err(map_roster_error)
    }

    /// Every allowlisted administrator.
    pub async fn admins(&self) -> Result<Vec<UserId>, Error> {
        self.roster.list().await.map_err(map_roster_error)
    }

    /// Fire-and-forget enqueue; failures are logged and swallowed.
    async fn notify(&self, notification: Notification) {
        if let Err(error) = self.notifications.enqueue(&notification).await {
            tracing::warn!(
                recipient = %notification.recipient,
                %error,
                "notification enqueue failed after commit; dropping"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{
        FixtureNotificationQueue, MockAdminRoster, MockInventoryRepository,
        MockNotificationQueue, MockWithdrawalRepository, ReferralCredit,
    };
    use crate::domain::{Amount, ErrorCode, ItemStatus, NamePair, WithdrawalStatus};
    use chrono::Utc;

    fn resolution(referral: Option<ReferralCredit>) -> ItemResolution {
        ItemResolution {
            item: Item {
                id: ItemId(1),
                login: "login@example.com".to_owned(),
                secret: "secret".to_owned(),
                names: NamePair::wildcard(),
                status: ItemStatus::Sold,
                assigned_to: Some(UserId(7)),
                created_at: Utc::now(),
            },
            user_id: UserId(7),
            price: Amount::parse("0.20").expect("amount"),
            referral,
        }
    }

    fn service_with(
        inventory: MockInventoryRepository,
        withdrawals: MockWithdrawalRepository,
        notifications: MockNotificationQueue,
    ) -> ApprovalService<
        MockInventoryRepository,
        MockWithdrawalRepository,
        MockAdminRoster,
        MockNotificationQueue,
    > {
        ApprovalService::new(
            Arc::new(inventory),
            Arc::new(withdrawals),
            Arc::new(MockAdminRoster::new()),
            Arc::new(notifications),
        )
    }

    #[tokio::test]
    async fn approve_missing_item_is_not_found() {
        let mut inventory = MockInventoryRepository::new();
        inventory.expect_approve().times(1).return_once(|_| Ok(None));

        let service = ApprovalService::new(
            Arc::new(inventory),
            Arc::new(MockWithdrawalRepository::new()),
            Arc::new(MockAdminRoster::new()),
            Arc::new(FixtureNotificationQueue),
        );

        let error = service
            .approve_item(ItemId(99))
            .await
            .expect_err("missing item");
        assert_eq!(error.code(), ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn approve_notifies_user_and_referrer() {
        let mut inventory = MockInventoryRepository::new();
        let credit = ReferralCredit {
            referrer: UserId(3),
            bonus: Amount::parse("0.05").expect("amount"),
        };
        inventory
            .expect_approve()
            .times(1)
            .return_once(move |_| Ok(Some(resolution(Some(credit)))));

        let mut notifications = MockNotificationQueue::new();
        notifications
            .expect_enqueue()
            .withf(|n: &Notification| {
                n.recipient == UserId(7)
                    && matches!(n.event, NotificationEvent::ItemApproved { .. })
            })
            .times(1)
            .return_once(|_| Ok(()));
        notifications
            .expect_enqueue()
            .withf(|n: &Notification| {
                n.recipient == UserId(3)
                    && matches!(n.event, NotificationEvent::ReferralBonusEarned { .. })
            })
            .times(1)
            .return_once(|_| Ok(()));

        let service = service_with(inventory, MockWithdrawalRepository::new(), notifications);
        let resolved = service.approve_item(ItemId(1)).await.expect("approve");

        assert_eq!(resolved.user_id, UserId(7));
    }

    #[tokio::test]
    async fn enqueue_failure_does_not_fail_the_resolution() {
        let mut inventory = MockInventoryRepository::new();
        inventory
            .expect_reject()
            .times(1)
            .return_once(|_| Ok(Some(resolution(None))));

        let mut notifications = MockNotificationQueue::new();
        notifications
            .expect_enqueue()
            .times(1)
            .return_once(|_| Err(crate::domain::ports::NotificationQueueError::enqueue("down")));

        let service = service_with(inventory, MockWithdrawalRepository::new(), notifications);
        let resolved = service.reject_item(ItemId(1)).await;

        assert!(resolved.is_ok(), "commit already happened; enqueue failure is swallowed");
    }

    #[tokio::test]
    async fn rejected_withdrawal_reports_the_refund() {
        let withdrawal = Withdrawal {
            id: WithdrawalId(5),
            user_id: UserId(7),
            amount: Amount::parse("10.00").expect("amount"),
            method: "paypal".to_owned(),
            details: "user@example.com".to_owned(),
            status: WithdrawalStatus::Rejected,
            created_at: Utc::now(),
        };
        let mut withdrawals = MockWithdrawalRepository::new();
        withdrawals.expect_resolve().times(1).return_once(move |_, _| {
            Ok(Some(ResolvedWithdrawal {
                withdrawal,
                refunded: true,
            }))
        });

        let mut notifications = MockNotificationQueue::new();
        notifications
            .expect_enqueue()
            .withf(|n: &Notification| {
                matches!(n.event, NotificationEvent::WithdrawalRejected { .. })
            })
            .times(1)
            .return_once(|_| Ok(()));

        let service = service_with(MockInventoryRepository::new(), withdrawals, notifications);
        let resolved = service
            .resolve_withdrawal(WithdrawalId(5), WithdrawalOutcome::Rejected)
            .await
            .expect("resolve");

        assert!(resolved.refunded);
    }

    #[tokio::test]
    async fn double_resolution_is_invalid_state() {
        let mut withdrawals = MockWithdrawalRepository::new();
        withdrawals.expect_resolve().times(1).return_once(|_, _| {
            Err(WithdrawalRepositoryError::already_resolved(
                WithdrawalId(5),
                "paid",
            ))
        });

        let service = service_with(
            MockInventoryRepository::new(),
            withdrawals,
            MockNotificationQueue::new(),
        );
        let error = service
            .resolve_withdrawal(WithdrawalId(5), WithdrawalOutcome::Paid)
            .await
            .expect_err("already resolved");

        assert_eq!(error.code(), ErrorCode::InvalidState);
    }
}
