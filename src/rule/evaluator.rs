//! Rule evaluator

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::config::EngineConfig;
use crate::error::{EvaluationError, Result};
use crate::rule::ast::{AstNode, Comparator, Condition, LogicalOperator, Value};
use crate::rule::lexer::is_expressible;

/// Evaluate an AST against an attribute record
///
/// `AND` stops at the first false left operand and `OR` at the first true
/// one; the right operand is never visited in those cases, so errors it
/// would raise do not surface.
pub fn evaluate(ast: &AstNode, attrs: &AttributeRecord) -> std::result::Result<bool, EvaluationError> {
    match ast {
        AstNode::Condition(cond) => check_condition(cond, attrs),
        AstNode::Logical {
            op: LogicalOperator::And,
            left,
            right,
        } => {
            if !evaluate(left, attrs)? {
                return Ok(false);
            }
            evaluate(right, attrs)
        }
        AstNode::Logical {
            op: LogicalOperator::Or,
            left,
            right,
        } => {
            if evaluate(left, attrs)? {
                return Ok(true);
            }
            evaluate(right, attrs)
        }
    }
}

/// Deserialize an AST from its JSON form and evaluate it
pub fn evaluate_json(ast_json: &str, attrs: &AttributeRecord) -> Result<bool> {
    let ast = ast_from_json(ast_json)?;
    Ok(evaluate(&ast, attrs)?)
}

/// Deserialize an AST with default limits
pub fn ast_from_json(ast_json: &str) -> std::result::Result<AstNode, EvaluationError> {
    ast_from_json_with_config(ast_json, &EngineConfig::default())
}

/// Deserialize an AST; unknown tags, comparators, or missing children are malformed
///
/// A tree of `n` conditions nests at most `n` objects deep, so input nested
/// deeper than `max_conditions` is rejected before decoding. Conditions that
/// rule text cannot express are rejected as well.
pub fn ast_from_json_with_config(
    ast_json: &str,
    config: &EngineConfig,
) -> std::result::Result<AstNode, EvaluationError> {
    if nesting_exceeds(ast_json, config.max_conditions) {
        return Err(EvaluationError::MalformedAst(format!(
            "nested deeper than {} levels",
            config.max_conditions
        )));
    }

    // serde_json's own recursion limit (128) is below any useful chain length
    let mut de = serde_json::Deserializer::from_str(ast_json);
    de.disable_recursion_limit();
    let ast = AstNode::deserialize(&mut de).map_err(malformed)?;
    de.end().map_err(malformed)?;

    if let Some(cond) = ast.conditions().into_iter().find(|c| !is_expressible(c)) {
        return Err(EvaluationError::MalformedAst(format!(
            "condition '{}' cannot be written as rule text",
            cond
        )));
    }

    Ok(ast)
}

fn malformed(err: serde_json::Error) -> EvaluationError {
    EvaluationError::MalformedAst(err.to_string())
}

/// Whether JSON objects and arrays nest deeper than `limit`
fn nesting_exceeds(json: &str, limit: usize) -> bool {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for byte in json.bytes() {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' | b'[' => {
                depth += 1;
                if depth > limit {
                    return true;
                }
            }
            b'}' | b']' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }

    false
}

fn check_condition(cond: &Condition, attrs: &AttributeRecord) -> std::result::Result<bool, EvaluationError> {
    let actual = attrs
        .get(&cond.field)
        .ok_or_else(|| EvaluationError::MissingField(cond.field.clone()))?;

    let result = match (actual, &cond.value) {
        (Value::Integer(actual), Value::Integer(expected)) => {
            compare_integers(cond.operator, *actual, *expected)
        }
        (Value::String(actual), Value::String(expected)) => match cond.operator {
            Comparator::Equal => actual == expected,
            Comparator::NotEqual => actual != expected,
            _ => return Err(non_numeric(cond)),
        },
        _ if cond.operator.is_ordering() => return Err(non_numeric(cond)),
        (actual, expected) => {
            return Err(EvaluationError::TypeMismatch {
                field: cond.field.clone(),
                expected: expected.type_name(),
                actual: actual.type_name(),
            })
        }
    };

    trace!(field = %cond.field, operator = %cond.operator, result, "condition evaluated");
    Ok(result)
}

#[inline]
fn compare_integers(operator: Comparator, actual: i64, expected: i64) -> bool {
    match operator {
        Comparator::Greater => actual > expected,
        Comparator::Less => actual < expected,
        Comparator::GreaterEqual => actual >= expected,
        Comparator::LessEqual => actual <= expected,
        Comparator::Equal => actual == expected,
        Comparator::NotEqual => actual != expected,
    }
}

fn non_numeric(cond: &Condition) -> EvaluationError {
    EvaluationError::NonNumericComparison {
        field: cond.field.clone(),
        operator: cond.operator.to_string(),
    }
}

/// Attribute values supplied at evaluation time
///
/// A field is absent when it has no entry or when its entry is `None`
/// (JSON `null`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeRecord {
    values: HashMap<String, Option<Value>>,
}

impl AttributeRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            values: HashMap::with_capacity(capacity),
        }
    }

    /// Parse a JSON object of `field -> integer | string | null`
    pub fn from_json(json: &str) -> std::result::Result<Self, EvaluationError> {
        serde_json::from_str(json).map_err(|e| EvaluationError::InvalidAttributes(e.to_string()))
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(field.into(), Some(value.into()));
    }

    /// Record a field as explicitly absent
    pub fn insert_absent(&mut self, field: impl Into<String>) {
        self.values.insert(field.into(), None);
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field).and_then(Option::as_ref)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for AttributeRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = AttributeRecord::new();
        for (field, value) in iter {
            record.insert(field, value);
        }
        record
    }
}
