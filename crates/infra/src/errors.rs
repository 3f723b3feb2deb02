//! Conversions from external infrastructure errors into domain errors.

use loadout_domain::LoadoutError;
use rusqlite::Error as SqlError;
use tokio::task::JoinError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub LoadoutError);

impl From<InfraError> for LoadoutError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<LoadoutError> for InfraError {
    fn from(value: LoadoutError) -> Self {
        Self(value)
    }
}

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        use rusqlite::ffi::ErrorCode;

        let mapped = match value {
            SqlError::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match (err.code, err.extended_code) {
                    (ErrorCode::DatabaseBusy, _) => {
                        LoadoutError::Database("database is busy".into())
                    }
                    (ErrorCode::DatabaseLocked, _) => {
                        LoadoutError::Database("database is locked".into())
                    }
                    (ErrorCode::ConstraintViolation, 2067) => {
                        LoadoutError::Database("unique constraint violation".into())
                    }
                    (ErrorCode::ConstraintViolation, 787) => {
                        LoadoutError::Database("foreign key constraint violation".into())
                    }
                    _ => LoadoutError::Database(format!(
                        "sqlite failure {:?} (code {}): {}",
                        err.code, err.extended_code, message
                    )),
                }
            }
            SqlError::QueryReturnedNoRows => {
                LoadoutError::NotFound("no rows returned by query".into())
            }
            SqlError::FromSqlConversionFailure(_, _, cause) => {
                LoadoutError::Database(format!("failed to convert sqlite value: {cause}"))
            }
            SqlError::InvalidColumnType(_, _, ty) => {
                LoadoutError::Database(format!("invalid column type: {ty}"))
            }
            other => LoadoutError::Database(other.to_string()),
        };
        Self(mapped)
    }
}

impl From<r2d2::Error> for InfraError {
    fn from(value: r2d2::Error) -> Self {
        Self(LoadoutError::Database(format!("connection pool error: {value}")))
    }
}

impl From<serde_json::Error> for InfraError {
    fn from(value: serde_json::Error) -> Self {
        Self(LoadoutError::Database(format!("stored record corrupt: {value}")))
    }
}

impl From<JoinError> for InfraError {
    fn from(value: JoinError) -> Self {
        Self(LoadoutError::Internal(format!("blocking task failed: {value}")))
    }
}

/// Shorthand to map a blocking-task join error at the repository boundary.
pub(crate) fn map_join_error(err: JoinError) -> LoadoutError {
    InfraError::from(err).into()
}
