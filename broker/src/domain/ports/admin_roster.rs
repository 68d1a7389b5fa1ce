//! Port for the administrator allowlist.
//!
//! Administration is gated by a trusted-identifier allowlist and nothing
//! more; there is no password or session concept in the core.

use async_trait::async_trait;

use crate::domain::UserId;

/// Errors raised by admin roster adapters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdminRosterError {
    /// Roster connection could not be established.
    #[error("admin roster connection failed: {message}")]
    Connection { message: String },

    /// Query or mutation failed during execution.
    #[error("admin roster query failed: {message}")]
    Query { message: String },
}

impl AdminRosterError {
    /// Create a connection error with the given message.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create a query error with the given message.
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
        }
    }
}

/// Port for the persisted administrator allowlist.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AdminRoster: Send + Sync {
    /// Add a user to the roster; `false` when already present.
    async fn add(&self, user_id: UserId) -> Result<bool, AdminRosterError>;

    /// Whether the user is on the roster.
    async fn contains(&self, user_id: UserId) -> Result<bool, AdminRosterError>;

    /// Every roster member.
    async fn list(&self) -> Result<Vec<UserId>, AdminRosterError>;
}
