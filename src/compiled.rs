//! CompiledRule - parsed rule held in Rust memory for the Python side
//!
//! Lets Python parse once and evaluate many times without re-serializing
//! the AST across the boundary on every call.

use pyo3::exceptions::PyTypeError;
use pyo3::prelude::*;
use pyo3::types::{PyBool, PyDict};
use std::sync::Arc;

use crate::error::RuleError;
use crate::rule::{evaluate, AstNode, AttributeRecord, RejectedRule};

// ============================================================================
// Helper Functions
// ============================================================================

/// Convert a Python dict of `str -> int | str | None` into an attribute record
pub fn attributes_from_dict(dict: &Bound<'_, PyDict>) -> PyResult<AttributeRecord> {
    let mut record = AttributeRecord::with_capacity(dict.len());

    for (key, value) in dict.iter() {
        let field: String = key.extract()?;

        if value.is_none() {
            record.insert_absent(field);
        } else if value.is_instance_of::<PyBool>() {
            return Err(PyTypeError::new_err(format!(
                "attribute '{}' must be int, str or None, not bool",
                field
            )));
        } else if let Ok(i) = value.extract::<i64>() {
            record.insert(field, i);
        } else if let Ok(s) = value.extract::<String>() {
            record.insert(field, s);
        } else {
            return Err(PyTypeError::new_err(format!(
                "attribute '{}' must be int, str or None",
                field
            )));
        }
    }

    Ok(record)
}

/// Serialize an AST to its JSON wire form
pub fn ast_to_json(ast: &AstNode) -> Result<String, RuleError> {
    serde_json::to_string(ast).map_err(|e| RuleError::Serialization(e.to_string()))
}

// ============================================================================
// CompiledRule PyClass
// ============================================================================

/// A parsed (or combined) rule ready for repeated evaluation
#[pyclass]
pub struct CompiledRule {
    ast: Arc<AstNode>,
    /// Rules left out when this was built by combination
    rejected: Vec<RejectedRule>,
}

impl CompiledRule {
    pub fn new(ast: AstNode, rejected: Vec<RejectedRule>) -> Self {
        Self {
            ast: Arc::new(ast),
            rejected,
        }
    }

    pub fn ast(&self) -> &AstNode {
        &self.ast
    }
}

#[pymethods]
impl CompiledRule {
    /// Number of condition leaves
    #[getter]
    fn condition_count(&self) -> usize {
        self.ast.conditions().len()
    }

    /// Rejected rules as `(index, rule, error)` tuples
    #[getter]
    fn rejected(&self) -> Vec<(usize, String, String)> {
        self.rejected
            .iter()
            .map(|r| (r.index, r.rule.clone(), r.error.to_string()))
            .collect()
    }

    /// Evaluate against a dict of attributes
    ///
    /// # Raises
    /// KeyError for a missing attribute, ValueError for a type mismatch
    fn evaluate(&self, attributes: &Bound<'_, PyDict>) -> PyResult<bool> {
        let record = attributes_from_dict(attributes)?;
        let verdict = evaluate(&self.ast, &record).map_err(RuleError::from)?;
        Ok(verdict)
    }

    /// Serialized AST
    fn to_json(&self) -> PyResult<String> {
        Ok(ast_to_json(&self.ast)?)
    }

    /// Rule text that parses back to this AST
    ///
    /// Holds for every rule built by `compile_rule` / `compile_rules`, since
    /// their conditions came through the lexer.
    fn to_rule_string(&self) -> String {
        self.ast.to_string()
    }

    fn __repr__(&self) -> String {
        format!("CompiledRule({:?})", self.ast.to_string())
    }
}
