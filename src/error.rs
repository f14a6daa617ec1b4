//! Error types for the rule engine core

use pyo3::exceptions::{PyKeyError, PyValueError};
use pyo3::PyErr;
use thiserror::Error;

/// Main error type for the rule engine
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuleError {
    #[error("Lex error at position {position}: {reason} '{token}'")]
    Lex {
        token: String,
        position: usize,
        reason: &'static str,
    },

    #[error("Parse error at position {position}: {message}")]
    Parse { message: String, position: usize },

    #[error("Empty input: {0}")]
    EmptyInput(String),

    #[error("Too many conditions: {count} exceeds the limit of {limit}")]
    TooManyConditions { count: usize, limit: usize },

    #[error("Evaluation error: {0}")]
    Evaluation(#[from] EvaluationError),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl RuleError {
    pub(crate) fn parse(message: impl Into<String>, position: usize) -> Self {
        RuleError::Parse {
            message: message.into(),
            position,
        }
    }
}

/// Failures raised while walking an AST against an attribute record
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluationError {
    #[error("missing field '{0}'")]
    MissingField(String),

    #[error("non-numeric comparison: {field} {operator} requires integer operands")]
    NonNumericComparison { field: String, operator: String },

    #[error("type mismatch on '{field}': literal is {expected}, attribute is {actual}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("malformed AST: {0}")]
    MalformedAst(String),

    #[error("invalid attributes: {0}")]
    InvalidAttributes(String),
}

impl From<RuleError> for PyErr {
    fn from(err: RuleError) -> PyErr {
        match err {
            RuleError::Evaluation(EvaluationError::MissingField(field)) => {
                PyKeyError::new_err(format!("Evaluation error: missing field '{}'", field))
            }
            other => PyValueError::new_err(other.to_string()),
        }
    }
}

/// Result type alias for the rule engine
pub type Result<T> = std::result::Result<T, RuleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lex_error_message() {
        let err = RuleError::Lex {
            token: "age>30".to_string(),
            position: 4,
            reason: "unrecognized token",
        };
        assert_eq!(
            err.to_string(),
            "Lex error at position 4: unrecognized token 'age>30'"
        );
    }

    #[test]
    fn test_evaluation_error_wraps() {
        let err: RuleError = EvaluationError::MissingField("age".to_string()).into();
        assert_eq!(err.to_string(), "Evaluation error: missing field 'age'");
    }
}
