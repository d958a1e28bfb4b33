// Error taxonomy for the core operations
// Every core operation is total over (entity, actor, input): it either applies
// cleanly or returns one of these rejections with prior state untouched.

use serde::Serialize;
use std::fmt;

// ============================================================================
// FIELD ERROR
// ============================================================================

/// A single form-level complaint, addressed to one input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        FieldError {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for FieldError {}

// ============================================================================
// CORE ERROR
// ============================================================================

#[derive(Debug)]
pub enum CoreError {
    /// Input fails a form-level constraint; nothing was mutated.
    Validation(Vec<FieldError>),

    /// Actor lacks the role/capability the action requires.
    Authorization(String),

    /// Referenced entity id does not exist.
    NotFound { entity: &'static str, id: i64 },

    /// The entity's current state forbids the operation.
    StateConflict(String),

    /// Underlying storage failure (transaction rolled back).
    Storage(rusqlite::Error),
}

impl CoreError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        CoreError::Validation(vec![FieldError::new(field, message)])
    }

    pub fn authorization(message: impl Into<String>) -> Self {
        CoreError::Authorization(message.into())
    }

    pub fn not_found(entity: &'static str, id: i64) -> Self {
        CoreError::NotFound { entity, id }
    }

    pub fn state_conflict(message: impl Into<String>) -> Self {
        CoreError::StateConflict(message.into())
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::Validation(errors) => {
                write!(f, "validation failed: ")?;
                for (i, e) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, "; ")?;
                    }
                    write!(f, "{}", e)?;
                }
                Ok(())
            }
            CoreError::Authorization(msg) => write!(f, "not authorized: {}", msg),
            CoreError::NotFound { entity, id } => write!(f, "{} {} not found", entity, id),
            CoreError::StateConflict(msg) => write!(f, "state conflict: {}", msg),
            CoreError::Storage(e) => write!(f, "storage error: {}", e),
        }
    }
}

impl std::error::Error for CoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CoreError::Storage(e) => Some(e),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(e: rusqlite::Error) -> Self {
        CoreError::Storage(e)
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_variants() {
        let e = CoreError::validation("title", "too short");
        assert_eq!(e.to_string(), "validation failed: title: too short");

        let e = CoreError::not_found("auction", 42);
        assert_eq!(e.to_string(), "auction 42 not found");

        let e = CoreError::authorization("auctioneer role required");
        assert_eq!(e.to_string(), "not authorized: auctioneer role required");

        let e = CoreError::state_conflict("auction is not active");
        assert_eq!(e.to_string(), "state conflict: auction is not active");
    }

    #[test]
    fn test_multiple_field_errors() {
        let e = CoreError::Validation(vec![
            FieldError::new("title", "required"),
            FieldError::new("start_price", "must be positive"),
        ]);
        assert_eq!(
            e.to_string(),
            "validation failed: title: required; start_price: must be positive"
        );
    }
}
