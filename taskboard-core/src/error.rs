//! Error types for Taskboard operations

use thiserror::Error;
use uuid::Uuid;

use crate::EntityType;

/// Storage layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("{entity_type} not found with id {id}")]
    NotFound { entity_type: EntityType, id: Uuid },

    #[error("{entity_type} with {field} '{value}' already exists")]
    AlreadyExists {
        entity_type: EntityType,
        field: String,
        value: String,
    },

    #[error("{entity_type} with id {id} references missing {missing} {missing_id}")]
    DanglingReference {
        entity_type: EntityType,
        id: Uuid,
        missing: EntityType,
        missing_id: Uuid,
    },

    #[error("Storage unavailable: {reason}")]
    Unavailable { reason: String },
}

impl StorageError {
    pub fn not_found(entity_type: EntityType, id: impl Into<Uuid>) -> Self {
        StorageError::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }
}

/// Validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

impl ValidationError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn missing(field: impl Into<String>) -> Self {
        ValidationError::RequiredFieldMissing {
            field: field.into(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all Taskboard errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskboardError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for Taskboard operations.
pub type TaskboardResult<T> = Result<T, TaskboardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_display() {
        let id = Uuid::nil();
        let err = StorageError::not_found(EntityType::Task, id);
        assert_eq!(
            err.to_string(),
            "Task not found with id 00000000-0000-0000-0000-000000000000"
        );
        assert!(err.is_not_found());
    }

    #[test]
    fn test_already_exists_display() {
        let err = StorageError::AlreadyExists {
            entity_type: EntityType::User,
            field: "email".to_string(),
            value: "a@b.io".to_string(),
        };
        assert_eq!(err.to_string(), "User with email 'a@b.io' already exists");
    }

    #[test]
    fn test_from_conversions() {
        let err: TaskboardError = ValidationError::missing("title").into();
        assert!(matches!(err, TaskboardError::Validation(_)));
        assert_eq!(
            err.to_string(),
            "Validation error: Required field missing: title"
        );
    }
}
