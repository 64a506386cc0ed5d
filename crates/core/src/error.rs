//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Rejections decided before any write: bad input, a record in the wrong
/// state, a record owned by another company. Missing rows and backend
/// failures are the infra layer's `StoreError`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. a non-positive transfer quantity).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An identifier could not be parsed.
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// The record is not in a state that allows the operation.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The caller's company does not own the record.
    #[error("tenant mismatch")]
    TenantMismatch,
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_the_reason() {
        let err = DomainError::validation("quantity must be positive");
        assert_eq!(err.to_string(), "validation failed: quantity must be positive");
        assert_eq!(
            DomainError::conflict("transfer already completed").to_string(),
            "conflict: transfer already completed"
        );
        assert_eq!(DomainError::TenantMismatch.to_string(), "tenant mismatch");
    }
}
