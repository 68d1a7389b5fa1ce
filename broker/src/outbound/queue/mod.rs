//! Notification outbox adapter.
//!
//! Implements the fire-and-forget queue as a PostgreSQL outbox table: the
//! engines insert one row per notification after their own transaction
//! commits, and the messaging collaborator drains the table on its own
//! schedule. The core never reads the table back.

use async_trait::async_trait;

use crate::domain::Notification;
use crate::domain::ports::{NotificationQueue, NotificationQueueError};
use crate::outbound::persistence::{
    DbPool, NewNotificationRow, PoolError, map_basic_diesel_error, map_basic_pool_error,
    notifications,
};

use diesel_async::RunQueryDsl;

/// Outbox-table implementation of the notification queue.
#[derive(Clone)]
pub struct DieselNotificationOutbox {
    pool: DbPool,
}

impl DieselNotificationOutbox {
    /// Create a new outbox with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> NotificationQueueError {
    map_basic_pool_error(error, NotificationQueueError::connection)
}

fn map_diesel_error(error: diesel::result::Error) -> NotificationQueueError {
    map_basic_diesel_error(
        error,
        NotificationQueueError::enqueue,
        NotificationQueueError::connection,
    )
}

#[async_trait]
impl NotificationQueue for DieselNotificationOutbox {
    async fn enqueue(&self, notification: &Notification) -> Result<(), NotificationQueueError> {
        let payload = serde_json::to_value(&notification.event)
            .map_err(|err| NotificationQueueError::enqueue(err.to_string()))?;

        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::insert_into(notifications::table)
            .values(NewNotificationRow {
                id: notification.id,
                recipient: notification.recipient.0,
                payload: &payload,
            })
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(map_diesel_error)
    }
}
