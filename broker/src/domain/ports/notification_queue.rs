//! Port for the fire-and-forget notification queue.
//!
//! Engines enqueue after their transaction commits; the messaging
//! collaborator drains the queue and delivers. The core never observes
//! delivery outcome, and enqueue failures must not fail the operation that
//! produced them, because the state change already durably succeeded.

use async_trait::async_trait;

use crate::domain::Notification;

/// Errors raised by notification queue adapters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotificationQueueError {
    /// Queue connection could not be established.
    #[error("notification queue connection failed: {message}")]
    Connection { message: String },

    /// The message could not be recorded.
    #[error("notification enqueue failed: {message}")]
    Enqueue { message: String },
}

impl NotificationQueueError {
    /// Create a connection error with the given message.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create an enqueue error with the given message.
    pub fn enqueue(message: impl Into<String>) -> Self {
        Self::Enqueue {
            message: message.into(),
        }
    }
}

/// Port for handing notifications to the messaging collaborator.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationQueue: Send + Sync {
    /// Record a notification for later delivery.
    async fn enqueue(&self, notification: &Notification) -> Result<(), NotificationQueueError>;
}

/// Fixture implementation that discards every notification.
///
/// Use it in unit tests where notification fan-out is not under test.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureNotificationQueue;

#[async_trait]
impl NotificationQueue for FixtureNotificationQueue {
    async fn enqueue(&self, _notification: &Notification) -> Result<(), NotificationQueueError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ItemId, NotificationEvent, UserId};

    #[tokio::test]
    async fn fixture_queue_accepts_notifications() {
        let queue = FixtureNotificationQueue;
        let notification = Notification::new(
            UserId(1),
            NotificationEvent::ItemRejected { item_id: ItemId(2) },
        );

        queue
            .enqueue(&notification)
            .await
            .expect("fixture enqueue should succeed");
    }
}
