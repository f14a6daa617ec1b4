//! Multi-rule combination
//!
//! Parses several rules, collects their condition leaves, drops duplicates
//! by canonical key (first occurrence wins) and left-folds what remains with
//! one connective. De-duplicated leaves are shared with the input ASTs, not
//! copied.

use std::sync::Arc;

use ahash::AHashSet;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::error::{Result, RuleError};
use crate::rule::ast::{AstNode, Comparator, Condition, LogicalOperator, Value};
use crate::rule::parser::parse_with_config;

/// A rule that failed to parse and was left out of a combination
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedRule {
    /// Position of the rule in the input
    pub index: usize,
    pub rule: String,
    pub error: RuleError,
}

/// Result of combining rule strings
#[derive(Debug, Clone, PartialEq)]
pub struct Combination {
    pub ast: AstNode,
    pub rejected: Vec<RejectedRule>,
}

/// Combine rule strings with default limits
pub fn combine<S: AsRef<str>>(rules: &[S], op: LogicalOperator) -> Result<Combination> {
    combine_with_config(rules, op, &EngineConfig::default())
}

/// Combine rule strings; unparseable rules are recorded and skipped
pub fn combine_with_config<S: AsRef<str>>(
    rules: &[S],
    op: LogicalOperator,
    config: &EngineConfig,
) -> Result<Combination> {
    if rules.is_empty() {
        return Err(RuleError::EmptyInput("no rules supplied".to_string()));
    }

    let mut parsed = Vec::with_capacity(rules.len());
    let mut rejected = Vec::new();

    for (index, rule) in rules.iter().enumerate() {
        let rule = rule.as_ref();
        match parse_with_config(rule, config) {
            Ok(ast) => parsed.push(ast),
            Err(error) => {
                warn!(index, rule, %error, "discarding unparseable rule");
                rejected.push(RejectedRule {
                    index,
                    rule: rule.to_string(),
                    error,
                });
            }
        }
    }

    if parsed.is_empty() {
        return Err(RuleError::EmptyInput(format!(
            "all {} rules failed to parse",
            rules.len()
        )));
    }

    let ast = combine_asts_with_config(&parsed, op, config)?;
    debug!(
        accepted = parsed.len(),
        rejected = rejected.len(),
        %op,
        "rules combined"
    );

    Ok(Combination { ast, rejected })
}

/// Combine already-parsed ASTs with default limits
pub fn combine_asts(asts: &[AstNode], op: LogicalOperator) -> Result<AstNode> {
    combine_asts_with_config(asts, op, &EngineConfig::default())
}

/// Combine already-parsed ASTs; more unique conditions than `max_conditions` is an error
pub fn combine_asts_with_config(
    asts: &[AstNode],
    op: LogicalOperator,
    config: &EngineConfig,
) -> Result<AstNode> {
    if asts.is_empty() {
        return Err(RuleError::EmptyInput("no rules supplied".to_string()));
    }

    let unique = unique_conditions(asts);
    let total: usize = asts.iter().map(|ast| ast.conditions().len()).sum();
    debug!(total, unique = unique.len(), "conditions de-duplicated");

    if unique.len() > config.max_conditions {
        return Err(RuleError::TooManyConditions {
            count: unique.len(),
            limit: config.max_conditions,
        });
    }

    fold_conditions(unique, op)
        .ok_or_else(|| RuleError::EmptyInput("no conditions to combine".to_string()))
}

/// Condition leaves across all ASTs in encounter order, first occurrence of each key kept
fn unique_conditions(asts: &[AstNode]) -> Vec<Arc<Condition>> {
    let mut seen: AHashSet<(&str, Comparator, &Value)> = AHashSet::new();
    let mut unique = Vec::new();

    for ast in asts {
        for cond in ast.conditions() {
            if seen.insert(cond.canonical_key()) {
                unique.push(Arc::clone(cond));
            }
        }
    }

    unique
}

/// `((c1 op c2) op c3) ...`; a single condition is returned unwrapped
fn fold_conditions(conditions: Vec<Arc<Condition>>, op: LogicalOperator) -> Option<AstNode> {
    let mut nodes = conditions.into_iter().map(AstNode::Condition);
    let first = nodes.next()?;
    Some(nodes.fold(first, |acc, next| AstNode::logical(op, acc, next)))
}
