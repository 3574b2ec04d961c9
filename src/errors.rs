use sea_orm::error::DbErr;
use serde::Serialize;
use uuid::Uuid;

/// Unified error type for every service operation in the crate.
///
/// The variants split along the retry boundary callers care about:
/// `ValidationError`, `NotFound`, `Conflict` and `InvalidOperation` are
/// terminal for the request that produced them, while `DatabaseError`,
/// `EventError` and `ExternalServiceError` describe infrastructure that may
/// recover on retry.
#[derive(Debug, thiserror::Error, Serialize)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(
        #[from]
        #[serde(skip)]
        DbErr,
    ),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Event error: {0}")]
    EventError(String),

    #[error("External service error: {0}")]
    ExternalServiceError(String),

    #[error("Concurrent modification: {0}")]
    ConcurrentModification(Uuid),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl ServiceError {
    /// Convenience constructor for `NotFound` with a formatted entity/id pair.
    pub fn not_found(entity: &str, id: impl std::fmt::Display) -> Self {
        ServiceError::NotFound(format!("{} {} not found", entity, id))
    }

    /// Whether the failure is infrastructure-side and worth retrying.
    /// Validation and state-machine outcomes are terminal by definition.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ServiceError::DatabaseError(_)
                | ServiceError::EventError(_)
                | ServiceError::ExternalServiceError(_)
                | ServiceError::ConcurrentModification(_)
        )
    }
}
