use thiserror::Error;

use crate::db::DatabaseError;

/// Errors surfaced by the care core. Every failure is per-call and
/// recoverable by the caller correcting its input.
#[derive(Error, Debug)]
pub enum CareError {
    #[error("Invalid value for {field}: {value}")]
    InvalidArgument { field: String, value: String },

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Lock acquisition failed")]
    LockFailed,

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl CareError {
    pub fn invalid(field: &str, value: impl ToString) -> Self {
        Self::InvalidArgument {
            field: field.to_string(),
            value: value.to_string(),
        }
    }

    pub fn not_found(entity_type: &str, id: impl ToString) -> Self {
        Self::NotFound {
            entity_type: entity_type.to_string(),
            id: id.to_string(),
        }
    }
}
