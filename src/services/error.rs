use thiserror::Error;

use crate::api::FieldErrors;
use crate::auth::AuthError;
use crate::types::Operation;

/// Outcomes the services report to the transport layer.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Missing, or owned by someone else. The two are never told apart.
    #[error("Not found")]
    NotFound,

    #[error("Validation failed on {} field(s)", .0.len())]
    Validation(FieldErrors),

    #[error("Username already registered: {0}")]
    DuplicateUsername(String),

    #[error("Incorrect username or password")]
    AuthenticationFailed,

    #[error("Storage failure during {operation}: {source}")]
    Storage {
        operation: Operation,
        #[source]
        source: sqlx::Error,
    },

    #[error("Credential failure during {operation}: {source}")]
    Credential {
        operation: Operation,
        #[source]
        source: AuthError,
    },
}

/// Tags a fallible storage call with the operation it belongs to.
pub trait StorageContext<T> {
    fn during(self, operation: Operation) -> Result<T, ServiceError>;
}

impl<T> StorageContext<T> for Result<T, sqlx::Error> {
    fn during(self, operation: Operation) -> Result<T, ServiceError> {
        self.map_err(|source| ServiceError::Storage { operation, source })
    }
}

impl<T> StorageContext<T> for Result<T, AuthError> {
    fn during(self, operation: Operation) -> Result<T, ServiceError> {
        self.map_err(|source| ServiceError::Credential { operation, source })
    }
}

impl ServiceError {
    /// Deadlock or serialization failure: the transaction was aborted by
    /// Postgres and may succeed when run again from the start.
    pub fn is_transient(&self) -> bool {
        matches!(self, ServiceError::Storage { source, .. } if is_transient_conflict(source))
    }
}

/// SQLSTATE 40P01 (deadlock_detected) or 40001 (serialization_failure).
pub fn is_transient_conflict(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => matches!(db.code().as_deref(), Some("40P01") | Some("40001")),
        _ => false,
    }
}

/// True when the error is a unique-constraint violation reported by Postgres.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}
