//! Domain error taxonomy shared by the auth guard, the services and storage.

use thiserror::Error;

use crate::db::RequestStatus;
use crate::validation::Violations;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Token is not valid")]
    MissingCredential,

    #[error("Token is invalid or has expired")]
    InvalidCredential,

    #[error("User not found")]
    UnknownUser,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error(transparent)]
    Validation(#[from] Violations),

    #[error("{0}")]
    DuplicateKey(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Cannot change status from {from} to {to}")]
    InvalidTransition {
        from: RequestStatus,
        to: RequestStatus,
    },

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(sqlx::Error),

    #[error("Stored record could not be decoded: {0}")]
    CorruptRecord(#[from] serde_json::Error),

    #[error("Failed to sign session token: {0}")]
    TokenSigning(jsonwebtoken::errors::Error),

    #[error("Failed to hash password: {0}")]
    PasswordHash(String),
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return Error::DuplicateKey(duplicate_key_message(db_err.message()));
            }
        }
        Error::StorageUnavailable(err)
    }
}

/// Turn SQLite's `UNIQUE constraint failed: table.column` into a message
/// naming the conflicting record field.
fn duplicate_key_message(storage_message: &str) -> String {
    let column = storage_message
        .rsplit(':')
        .next()
        .and_then(|cols| cols.trim().split(',').next())
        .and_then(|col| col.trim().rsplit('.').next())
        .unwrap_or("");

    let field = match column {
        "serial_number" => "serialNumber",
        "email" => "emailId",
        "" => "key",
        other => other,
    };

    format!("Duplicate key: {} already exists", field)
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_key_message_names_record_field() {
        assert_eq!(
            duplicate_key_message("UNIQUE constraint failed: inventory_items.serial_number"),
            "Duplicate key: serialNumber already exists"
        );
        assert_eq!(
            duplicate_key_message("UNIQUE constraint failed: users.email"),
            "Duplicate key: emailId already exists"
        );
        assert_eq!(
            duplicate_key_message("UNIQUE constraint failed: widgets.code"),
            "Duplicate key: code already exists"
        );
    }

    #[test]
    fn test_validation_error_displays_violations() {
        let mut v = Violations::new("PartRequest");
        v.add("partsRequested", "At least one part item is required");
        let err = Error::from(v);
        assert_eq!(
            err.to_string(),
            "PartRequest validation failed: partsRequested: At least one part item is required"
        );
    }

    #[test]
    fn test_other_storage_errors_are_unavailable() {
        let err = Error::from(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, Error::StorageUnavailable(_)));
    }
}
