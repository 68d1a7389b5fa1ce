//! Shared Diesel error mapping for the brokerage adapters.

use tracing::debug;

use super::pool::PoolError;

/// Map pool errors into a port-specific connection error constructor.
pub(crate) fn map_basic_pool_error<E, C>(error: PoolError, connection: C) -> E
where
    C: FnOnce(String) -> E,
{
    let message = match error {
        PoolError::Checkout { message } | PoolError::Build { message } => message,
    };
    connection(message)
}

/// Map common Diesel error variants into query/connection constructors.
///
/// Connection loss maps to the connection constructor. Everything else,
/// including `NotFound` (which adapters normally absorb with `.optional()`
/// before reaching this helper), maps to the query constructor.
pub(crate) fn map_basic_diesel_error<E, Q, C>(
    error: diesel::result::Error,
    query: Q,
    connection: C,
) -> E
where
    Q: FnOnce(String) -> E,
    C: FnOnce(String) -> E,
{
    use diesel::result::{DatabaseErrorKind, Error as DieselError};

    match &error {
        DieselError::DatabaseError(kind, info) => {
            debug!(?kind, message = info.message(), "diesel operation failed");
        }
        other => debug!(
            error_type = %std::any::type_name_of_val(other),
            "diesel operation failed"
        ),
    }

    match error {
        DieselError::NotFound => query("record not found".to_owned()),
        DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, info) => {
            connection(info.message().to_owned())
        }
        DieselError::BrokenTransactionManager => {
            connection("transaction manager lost its connection".to_owned())
        }
        DieselError::DatabaseError(_, info) => query(info.message().to_owned()),
        other => query(other.to_string()),
    }
}

/// Whether the error is a unique-constraint violation.
///
/// The claim path relies on this: the partial unique index on pending
/// assignments turns a lost claim race into a unique violation the adapter
/// resolves by re-reading the winner's row.
pub(crate) fn is_unique_violation(error: &diesel::result::Error) -> bool {
    matches!(
        error,
        diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::UniqueViolation,
            _,
        )
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn not_found_maps_to_query_errors() {
        let mapped: String = map_basic_diesel_error(
            diesel::result::Error::NotFound,
            |m| format!("query: {m}"),
            |m| format!("connection: {m}"),
        );
        assert_eq!(mapped, "query: record not found");
    }

    #[rstest]
    fn broken_transaction_manager_maps_to_connection_errors() {
        let mapped: String = map_basic_diesel_error(
            diesel::result::Error::BrokenTransactionManager,
            |m| format!("query: {m}"),
            |m| format!("connection: {m}"),
        );
        assert!(mapped.starts_with("connection:"));
    }

    #[rstest]
    fn plain_errors_are_not_unique_violations() {
        assert!(!is_unique_violation(&diesel::result::Error::NotFound));
    }
}
