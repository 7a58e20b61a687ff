//! Diesel and pool error mapping for the recap store.

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use tracing::debug;

use crate::domain::ports::RecapStoreError;

use super::pool::PoolError;

/// Map pool errors to connection failures.
pub fn map_pool_error(error: PoolError) -> RecapStoreError {
    match error {
        PoolError::Checkout { message } | PoolError::Build { message } => {
            RecapStoreError::connection(message)
        }
    }
}

/// Map statement errors. Constraint violations keep the server message so
/// row errors name the offending constraint.
pub fn map_diesel_error(error: DieselError) -> RecapStoreError {
    match &error {
        DieselError::DatabaseError(kind, info) => {
            debug!(?kind, message = info.message(), "diesel operation failed");
        }
        _ => debug!(
            error_type = %std::any::type_name_of_val(&error),
            "diesel operation failed"
        ),
    }

    match error {
        DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, _) => {
            RecapStoreError::connection("database connection error")
        }
        DieselError::DatabaseError(
            DatabaseErrorKind::UniqueViolation
            | DatabaseErrorKind::ForeignKeyViolation
            | DatabaseErrorKind::NotNullViolation
            | DatabaseErrorKind::CheckViolation,
            info,
        ) => RecapStoreError::constraint(info.message()),
        DieselError::DatabaseError(_, info) => RecapStoreError::query(info.message()),
        other => RecapStoreError::query(other.to_string()),
    }
}

/// Map failures of BEGIN, SAVEPOINT, COMMIT and ROLLBACK.
pub fn map_transaction_error(error: DieselError, operation: &str) -> RecapStoreError {
    match error {
        DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, _) => {
            RecapStoreError::connection("database connection error")
        }
        other => {
            debug!(%operation, error = %other, "transaction control failed");
            RecapStoreError::transaction(format!("{operation}: {other}"))
        }
    }
}
