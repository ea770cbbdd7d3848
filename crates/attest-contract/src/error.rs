//! Evaluation failure kinds
//!
//! These are data, not control flow: a predicate converts them into
//! invalid results with the failure attached as the cause, so they can
//! be journaled and compared rather than unwound.

use thiserror::Error;

/// Failure raised while evaluating a predicate against a value
#[derive(Debug, Clone, Error)]
pub enum EvalError {
    #[error("type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    #[error("path not found: {0}")]
    PathNotFound(String),

    #[error("index {0} out of bounds")]
    IndexOutOfBounds(usize),

    #[error("malformed input: {0}")]
    MalformedInput(String),
}

impl EvalError {
    /// Compare failure kinds, ignoring payload
    ///
    /// Two distinct instances of the same kind with different payloads
    /// compare equal; this backs cause equality on predicate results.
    pub fn kind_eq(&self, other: &EvalError) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_eq_ignores_payload() {
        let first = EvalError::PathNotFound("a.b".to_string());
        let second = EvalError::PathNotFound("x.y".to_string());
        assert!(first.kind_eq(&second));
    }

    #[test]
    fn test_kind_eq_distinguishes_kinds() {
        let missing = EvalError::PathNotFound("a".to_string());
        let mismatch = EvalError::TypeMismatch {
            expected: "object".to_string(),
            got: "number".to_string(),
        };
        assert!(!missing.kind_eq(&mismatch));
    }
}
