use serde::Serialize;
use sqlx::error::ErrorKind;
use thiserror::Error;

/// Database errors
#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLx error: {0}")]
    Sqlx(sqlx::Error),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Database error: {0}")]
    Other(String),
}

impl From<sqlx::Error> for DbError {
    fn from(error: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &error {
            match db_err.kind() {
                ErrorKind::UniqueViolation
                | ErrorKind::ForeignKeyViolation
                | ErrorKind::NotNullViolation
                | ErrorKind::CheckViolation => {
                    return DbError::Constraint(db_err.message().to_string());
                }
                _ => {}
            }
        }
        DbError::Sqlx(error)
    }
}

/// Domain-level errors
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Entity not found: {0} with ID {1}")]
    EntityNotFound(String, String),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error("Validation failed: {}", .0.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "))]
    ValidationFailed(Vec<ValidationError>),

    #[error("Operation rejected: {0}")]
    Rejected(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ValidationError> for DomainError {
    fn from(error: ValidationError) -> Self {
        DomainError::ValidationFailed(vec![error])
    }
}

impl DomainError {
    /// Store-level constraint violations are reported as rejections rather than
    /// internal failures.
    pub fn into_rejection(self) -> Self {
        match self {
            DomainError::Database(DbError::Constraint(msg)) => DomainError::Rejected(msg),
            other => other,
        }
    }
}

/// Service-level errors (application specific)
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Session expired")]
    SessionExpired,

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<DbError> for ServiceError {
    fn from(error: DbError) -> Self {
        ServiceError::Domain(DomainError::Database(error))
    }
}

/// Validation errors
#[derive(Debug, Error, Clone, PartialEq, Serialize)]
pub enum ValidationError {
    #[error("Field '{field}' is required")]
    Required {
        field: String,
    },

    #[error("Field '{field}' cannot exceed {max} characters")]
    MaxLength {
        field: String,
        max: usize,
    },

    #[error("Field '{field}' contains invalid format: {reason}")]
    Format {
        field: String,
        reason: String,
    },

    #[error("Field '{field}' contains an invalid value: {reason}")]
    InvalidValue {
        field: String,
        reason: String,
    },
}

impl ValidationError {
    pub fn required(field: &str) -> Self {
        Self::Required {
            field: field.to_string(),
        }
    }

    pub fn max_length(field: &str, max: usize) -> Self {
        Self::MaxLength {
            field: field.to_string(),
            max,
        }
    }

    pub fn format(field: &str, reason: &str) -> Self {
        Self::Format {
            field: field.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn invalid_value(field: &str, reason: &str) -> Self {
        Self::InvalidValue {
            field: field.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Name of the offending field
    pub fn field(&self) -> &str {
        match self {
            Self::Required { field }
            | Self::MaxLength { field, .. }
            | Self::Format { field, .. }
            | Self::InvalidValue { field, .. } => field,
        }
    }

    /// Short machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            Self::Required { .. } => "required",
            Self::MaxLength { .. } => "too_long",
            Self::Format { .. } => "invalid_format",
            Self::InvalidValue { .. } => "invalid_value",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_accessors() {
        let err = ValidationError::format("emails[0].email", "must be a valid email address");
        assert_eq!(err.field(), "emails[0].email");
        assert_eq!(err.code(), "invalid_format");
        assert!(err.to_string().contains("emails[0].email"));
    }

    #[test]
    fn test_validation_failed_lists_every_error() {
        let err = DomainError::ValidationFailed(vec![
            ValidationError::required("date_of_birth.date"),
            ValidationError::max_length("name.first_name", 100),
        ]);
        let message = err.to_string();
        assert!(message.contains("date_of_birth.date"));
        assert!(message.contains("name.first_name"));
    }

    #[test]
    fn test_constraint_becomes_rejection() {
        let err = DomainError::Database(DbError::Constraint("FOREIGN KEY constraint failed".into()));
        assert!(matches!(err.into_rejection(), DomainError::Rejected(_)));

        let err = DomainError::InvalidFilter("participants.foo".into());
        assert!(matches!(err.into_rejection(), DomainError::InvalidFilter(_)));
    }
}
