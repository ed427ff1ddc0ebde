use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum FundAdminError {
    #[error("Not found: {entity} '{id}'")]
    NotFound { entity: String, id: String },

    #[error("Invalid input: {field} — {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Invariant violation: {}", errors.join("; "))]
    InvariantViolation { errors: Vec<String> },

    #[error("State conflict on calculation {id}: expected {expected}, found {actual}")]
    StateConflict {
        id: u64,
        expected: String,
        actual: String,
    },

    #[error("Division by zero in {context}")]
    DivisionByZero { context: String },

    #[error("Convergence failure: {function} did not converge after {iterations} iterations (delta: {last_delta})")]
    ConvergenceFailure {
        function: String,
        iterations: u32,
        last_delta: Decimal,
    },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl FundAdminError {
    pub(crate) fn invalid(field: &str, reason: impl Into<String>) -> Self {
        FundAdminError::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn not_found(entity: &str, id: impl ToString) -> Self {
        FundAdminError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }
}

impl From<serde_json::Error> for FundAdminError {
    fn from(e: serde_json::Error) -> Self {
        FundAdminError::SerializationError(e.to_string())
    }
}
