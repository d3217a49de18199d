use crate::database::DatabaseError;
use sqlx::Error as SqlxError;
use thiserror::Error;
use uuid::Uuid;

/// Application-level error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database errors
    #[error("SQL error: {0}")]
    Sqlx(#[from] SqlxError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not found errors
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Caller is not allowed to perform the operation
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Operation not allowed in the aggregate's current state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("MVP voting is closed for tournament {0}")]
    VotingClosed(Uuid),

    #[error("Match {0} has already started")]
    MatchAlreadyStarted(String),

    #[error("Insufficient funds: available {available}, required {required}")]
    InsufficientFunds { available: i64, required: i64 },

    /// Clip URL from a host we cannot embed
    #[error("Unsupported media: {0}")]
    UnsupportedMedia(String),

    /// Bracket provider unreachable or returned an error
    #[error("External provider error: {0}")]
    ExternalProvider(String),

    /// Concurrent modification could not be reconciled
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Check if error is a database connection error
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            AppError::Database(DatabaseError::PoolCreation(_))
                | AppError::Database(DatabaseError::ConnectionTimeout)
        )
    }

    /// Check if error is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound(_))
    }

    /// Voting closed, match started and generic state violations
    pub fn is_invalid_state(&self) -> bool {
        matches!(
            self,
            AppError::InvalidState(_) | AppError::VotingClosed(_) | AppError::MatchAlreadyStarted(_)
        )
    }

    /// Errors worth retrying later without caller intervention
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::ExternalProvider(_) | AppError::Conflict(_)) || self.is_connection_error()
    }

    /// Get HTTP status code for the error
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::NotFound(_) => 404,
            AppError::Unauthorized(_) => 401,
            AppError::Validation(_) | AppError::UnsupportedMedia(_) => 400,
            AppError::InsufficientFunds { .. } => 402,
            AppError::InvalidState(_)
            | AppError::VotingClosed(_)
            | AppError::MatchAlreadyStarted(_)
            | AppError::Conflict(_) => 409,
            AppError::Config(_) => 500,
            AppError::Database(_) | AppError::Sqlx(_) => 500,
            AppError::ExternalProvider(_) => 502,
            _ => 500,
        }
    }
}

/// Repository-specific error types
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// Database query error
    #[error("Query error: {0}")]
    Query(SqlxError),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Duplicate record
    #[error("Duplicate record: {0}")]
    Duplicate(String),

    /// Constraint violation
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Posting would drive a ledger balance below zero
    #[error("Insufficient balance: available {available}, required {required}")]
    InsufficientFunds { available: i64, required: i64 },

    /// Stored aggregate version moved since it was loaded
    #[error("Version conflict on {entity}: expected version {expected}")]
    VersionConflict { entity: String, expected: i64 },

    /// Stored document could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(msg) => AppError::NotFound(msg),
            RepositoryError::Query(e) => AppError::Sqlx(e),
            RepositoryError::Duplicate(msg) => AppError::Conflict(format!("Duplicate: {}", msg)),
            RepositoryError::ConstraintViolation(msg) => AppError::Validation(msg),
            RepositoryError::InvalidInput(msg) => AppError::Validation(msg),
            RepositoryError::InsufficientFunds { available, required } => {
                AppError::InsufficientFunds { available, required }
            }
            RepositoryError::VersionConflict { entity, expected } => {
                AppError::Conflict(format!("{} was modified concurrently (version {})", entity, expected))
            }
            RepositoryError::Serialization(e) => AppError::Serialization(e),
        }
    }
}

impl From<SqlxError> for RepositoryError {
    fn from(err: SqlxError) -> Self {
        match &err {
            SqlxError::RowNotFound => RepositoryError::NotFound("Record not found".to_string()),
            SqlxError::Database(db_err) => {
                // Check for common PostgreSQL error codes
                let code = db_err.code().map(|c| c.to_string());
                if code.as_deref() == Some("23505") {
                    // Unique violation
                    RepositoryError::Duplicate(db_err.message().to_string())
                } else if code.as_deref() == Some("23503") {
                    // Foreign key violation
                    RepositoryError::ConstraintViolation(db_err.message().to_string())
                } else if code.as_deref() == Some("23514") {
                    // Check constraint violation
                    RepositoryError::ConstraintViolation(db_err.message().to_string())
                } else {
                    RepositoryError::Query(err)
                }
            }
            _ => RepositoryError::Query(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::NotFound("t".into()).status_code(), 404);
        assert_eq!(AppError::UnsupportedMedia("x".into()).status_code(), 400);
        assert_eq!(AppError::MatchAlreadyStarted("m1".into()).status_code(), 409);
        assert_eq!(
            AppError::InsufficientFunds { available: 1, required: 2 }.status_code(),
            402
        );
        assert_eq!(AppError::ExternalProvider("down".into()).status_code(), 502);
    }

    #[test]
    fn test_repository_error_mapping() {
        let err: AppError = RepositoryError::InsufficientFunds { available: 5, required: 10 }.into();
        assert!(matches!(err, AppError::InsufficientFunds { available: 5, required: 10 }));

        let err: AppError = RepositoryError::VersionConflict {
            entity: "tournament".into(),
            expected: 3,
        }
        .into();
        assert!(matches!(err, AppError::Conflict(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_invalid_state_family() {
        assert!(AppError::VotingClosed(Uuid::nil()).is_invalid_state());
        assert!(AppError::MatchAlreadyStarted("1".into()).is_invalid_state());
        assert!(!AppError::NotFound("x".into()).is_invalid_state());
    }
}
