//! Abstract Syntax Tree for rule expressions

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// AST node for rule expressions
///
/// Serializes to the plain structural encoding used at the host boundary:
/// `{"type":"condition","field":..,"operator":..,"value":..}` for leaves and
/// `{"type":"operator","value":"AND"|"OR","left":..,"right":..}` for
/// connectives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AstNode {
    /// Single condition like "age > 30"
    Condition(Arc<Condition>),
    /// AND / OR over two sub-expressions
    #[serde(rename = "operator")]
    Logical {
        #[serde(rename = "value")]
        op: LogicalOperator,
        left: Box<AstNode>,
        right: Box<AstNode>,
    },
}

impl AstNode {
    pub fn condition(field: impl Into<String>, operator: Comparator, value: impl Into<Value>) -> Self {
        AstNode::Condition(Arc::new(Condition {
            field: field.into(),
            operator,
            value: value.into(),
        }))
    }

    pub fn logical(op: LogicalOperator, left: AstNode, right: AstNode) -> Self {
        AstNode::Logical {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn and(left: AstNode, right: AstNode) -> Self {
        Self::logical(LogicalOperator::And, left, right)
    }

    pub fn or(left: AstNode, right: AstNode) -> Self {
        Self::logical(LogicalOperator::Or, left, right)
    }

    /// Condition leaves in left-to-right order
    pub fn conditions(&self) -> Vec<&Arc<Condition>> {
        let mut leaves = Vec::new();
        let mut stack: SmallVec<[&AstNode; 16]> = SmallVec::new();
        stack.push(self);

        while let Some(node) = stack.pop() {
            match node {
                AstNode::Condition(cond) => leaves.push(cond),
                AstNode::Logical { left, right, .. } => {
                    // right first so left is visited first
                    stack.push(right);
                    stack.push(left);
                }
            }
        }

        leaves
    }
}

/// Renders the node back to rule text
///
/// Chains fold to the left, so only a right operand that is itself a
/// connective needs parentheses. The left spine is walked iteratively.
impl fmt::Display for AstNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut spine: SmallVec<[(LogicalOperator, &AstNode); 16]> = SmallVec::new();
        let mut node = self;
        let leftmost = loop {
            match node {
                AstNode::Condition(cond) => break cond,
                AstNode::Logical { op, left, right } => {
                    spine.push((*op, right.as_ref()));
                    node = left.as_ref();
                }
            }
        };

        write!(f, "{}", leftmost)?;
        for &(op, right) in spine.iter().rev() {
            match right {
                AstNode::Condition(cond) => write!(f, " {} {}", op, cond)?,
                AstNode::Logical { .. } => write!(f, " {} ({})", op, right)?,
            }
        }
        Ok(())
    }
}

/// Single condition expression
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub operator: Comparator,
    pub value: Value,
}

impl Condition {
    /// `(field, operator, value)` key used for de-duplication.
    ///
    /// Compares the triple itself, so `age = 30` and `age = '30'` never
    /// collide, and neither do conditions whose rendered text happens to match.
    pub fn canonical_key(&self) -> (&str, Comparator, &Value) {
        (&self.field, self.operator, &self.value)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.field, self.operator, self.value)
    }
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Comparator {
    /// Greater than (>)
    #[serde(rename = ">")]
    Greater,
    /// Less than (<)
    #[serde(rename = "<")]
    Less,
    /// Greater than or equal (>=)
    #[serde(rename = ">=")]
    GreaterEqual,
    /// Less than or equal (<=)
    #[serde(rename = "<=")]
    LessEqual,
    /// Equal (=)
    #[serde(rename = "=")]
    Equal,
    /// Not equal (!=)
    #[serde(rename = "!=")]
    NotEqual,
}

impl Comparator {
    pub const ALL: [Comparator; 6] = [
        Comparator::Greater,
        Comparator::Less,
        Comparator::GreaterEqual,
        Comparator::LessEqual,
        Comparator::Equal,
        Comparator::NotEqual,
    ];

    pub fn symbol(self) -> &'static str {
        match self {
            Comparator::Greater => ">",
            Comparator::Less => "<",
            Comparator::GreaterEqual => ">=",
            Comparator::LessEqual => "<=",
            Comparator::Equal => "=",
            Comparator::NotEqual => "!=",
        }
    }

    /// Whether the comparator orders values and therefore needs integers
    pub fn is_ordering(self) -> bool {
        !matches!(self, Comparator::Equal | Comparator::NotEqual)
    }

    pub fn from_symbol(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.symbol() == s)
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Binary logical connectives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicalOperator {
    #[default]
    And,
    Or,
}

impl LogicalOperator {
    pub fn as_str(self) -> &'static str {
        match self {
            LogicalOperator::And => "AND",
            LogicalOperator::Or => "OR",
        }
    }
}

impl fmt::Display for LogicalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogicalOperator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("AND") {
            Ok(LogicalOperator::And)
        } else if s.eq_ignore_ascii_case("OR") {
            Ok(LogicalOperator::Or)
        } else {
            Err(format!("unknown logical operator '{}', expected AND or OR", s))
        }
    }
}

/// Integer or string value, used for literals and attribute values alike
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Integer(i64),
    String(String),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "integer",
            Value::String(_) => "string",
        }
    }
}

/// Literal form: integers bare, strings single-quoted
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(i) => write!(f, "{}", i),
            Value::String(s) => write!(f, "'{}'", s),
        }
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i64::from(i))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_condition() {
        let ast = AstNode::condition("age", Comparator::Greater, 30);
        let json = serde_json::to_value(&ast).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "condition", "field": "age", "operator": ">", "value": 30})
        );
    }

    #[test]
    fn test_serialize_operator() {
        let ast = AstNode::or(
            AstNode::condition("age", Comparator::Greater, 30),
            AstNode::condition("department", Comparator::Equal, "Sales"),
        );
        let json = serde_json::to_value(&ast).unwrap();
        assert_eq!(json["type"], "operator");
        assert_eq!(json["value"], "OR");
        assert_eq!(json["left"]["field"], "age");
        assert_eq!(json["right"]["value"], "Sales");
    }

    #[test]
    fn test_deserialize_string_and_integer_values() {
        let ast: AstNode = serde_json::from_str(
            r#"{"type":"operator","value":"AND",
                "left":{"type":"condition","field":"salary","operator":">=","value":50000},
                "right":{"type":"condition","field":"department","operator":"!=","value":"50000"}}"#,
        )
        .unwrap();
        assert_eq!(
            ast,
            AstNode::and(
                AstNode::condition("salary", Comparator::GreaterEqual, 50000),
                AstNode::condition("department", Comparator::NotEqual, "50000"),
            )
        );
    }

    #[test]
    fn test_deserialize_rejects_unknown_tag() {
        let result: std::result::Result<AstNode, _> =
            serde_json::from_str(r#"{"type":"function","field":"age"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_deserialize_rejects_unknown_comparator() {
        let result: std::result::Result<AstNode, _> = serde_json::from_str(
            r#"{"type":"condition","field":"age","operator":"=~","value":1}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_deserialize_rejects_missing_child() {
        let result: std::result::Result<AstNode, _> = serde_json::from_str(
            r#"{"type":"operator","value":"AND","left":{"type":"condition","field":"a","operator":">","value":1}}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_display_parenthesizes_right_operands_only() {
        let ast = AstNode::and(
            AstNode::or(
                AstNode::condition("age", Comparator::Greater, 30),
                AstNode::condition("department", Comparator::Equal, "Sales"),
            ),
            AstNode::condition("experience", Comparator::LessEqual, 5),
        );
        assert_eq!(
            ast.to_string(),
            "age > 30 OR department = 'Sales' AND experience <= 5"
        );

        let ast = AstNode::or(
            AstNode::condition("age", Comparator::Greater, 30),
            AstNode::and(
                AstNode::condition("department", Comparator::Equal, "Sales"),
                AstNode::and(
                    AstNode::condition("salary", Comparator::Greater, 10),
                    AstNode::condition("experience", Comparator::LessEqual, 5),
                ),
            ),
        );
        assert_eq!(
            ast.to_string(),
            "age > 30 OR (department = 'Sales' AND (salary > 10 AND experience <= 5))"
        );
    }

    #[test]
    fn test_canonical_key_distinguishes_types() {
        let int = Condition {
            field: "age".to_string(),
            operator: Comparator::Equal,
            value: Value::Integer(30),
        };
        let string = Condition {
            value: Value::String("30".to_string()),
            ..int.clone()
        };
        assert_ne!(int.canonical_key(), string.canonical_key());
    }

    #[test]
    fn test_canonical_key_ignores_rendered_text() {
        let quoted_value = Condition {
            field: "x".to_string(),
            operator: Comparator::Equal,
            value: Value::String("1' AND y = '2".to_string()),
        };
        let spaced_field = Condition {
            field: "x = '1' AND y".to_string(),
            operator: Comparator::Equal,
            value: Value::String("2".to_string()),
        };
        assert_eq!(quoted_value.to_string(), spaced_field.to_string());
        assert_ne!(quoted_value.canonical_key(), spaced_field.canonical_key());
    }

    #[test]
    fn test_conditions_in_order() {
        let ast = AstNode::or(
            AstNode::and(
                AstNode::condition("a", Comparator::Greater, 1),
                AstNode::condition("b", Comparator::Greater, 2),
            ),
            AstNode::condition("c", Comparator::Greater, 3),
        );
        let fields: Vec<&str> = ast.conditions().iter().map(|c| c.field.as_str()).collect();
        assert_eq!(fields, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_logical_operator_from_str() {
        assert_eq!("and".parse::<LogicalOperator>(), Ok(LogicalOperator::And));
        assert_eq!("OR".parse::<LogicalOperator>(), Ok(LogicalOperator::Or));
        assert!("XOR".parse::<LogicalOperator>().is_err());
    }
}
