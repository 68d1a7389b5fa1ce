//! Notifications handed off to the messaging collaborator.
//!
//! The engines enqueue these after their transaction commits. Delivery is
//! fire-and-forget: the core never observes the outcome, and an enqueue
//! failure is logged and swallowed because the state change it describes has
//! already durably succeeded.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::item::ItemId;
use super::money::Amount;
use super::user::UserId;
use super::withdrawal::WithdrawalId;

/// The event a notification describes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotificationEvent {
    /// The user's submitted item was approved and the price released.
    ItemApproved {
        /// The resolved item.
        item_id: ItemId,
        /// Amount moved from hold to available.
        price: Amount,
    },
    /// The user's submitted item was rejected and the credit reversed.
    ItemRejected {
        /// The resolved item.
        item_id: ItemId,
    },
    /// The referee's approved item earned this user a bonus.
    ReferralBonusEarned {
        /// Amount credited to the referrer.
        bonus: Amount,
    },
    /// The user's withdrawal was paid out.
    WithdrawalPaid {
        /// The resolved withdrawal.
        withdrawal_id: WithdrawalId,
        /// Amount paid.
        amount: Amount,
    },
    /// The user's withdrawal was rejected and the amount refunded.
    WithdrawalRejected {
        /// The resolved withdrawal.
        withdrawal_id: WithdrawalId,
        /// Amount refunded to the available balance.
        amount: Amount,
    },
}

/// A queued notification for one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// Queue-unique message identifier.
    pub id: Uuid,
    /// The user to notify.
    pub recipient: UserId,
    /// What happened.
    pub event: NotificationEvent,
}

impl Notification {
    /// Build a notification with a fresh message id.
    pub fn new(recipient: UserId, event: NotificationEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            recipient,
            event,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn notifications_get_unique_ids() {
        let a = Notification::new(
            UserId(1),
            NotificationEvent::ItemRejected { item_id: ItemId(7) },
        );
        let b = Notification::new(
            UserId(1),
            NotificationEvent::ItemRejected { item_id: ItemId(7) },
        );
        assert_ne!(a.id, b.id);
    }

    #[rstest]
    fn event_serializes_with_kind_tag() {
        let event = NotificationEvent::WithdrawalPaid {
            withdrawal_id: WithdrawalId(3),
            amount: Amount::parse("5.00").expect("amount"),
        };
        let value = serde_json::to_value(&event).expect("serializes");
        assert_eq!(value["kind"], "withdrawal_paid");
        assert_eq!(value["amount"], "5.00");
    }
}
