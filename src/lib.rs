//! Rule Engine Core - eligibility rules as boolean condition strings
//!
//! This crate parses rule strings such as `age > 30 AND department = 'Sales'`
//! into an AST, combines several rules into one expression, and evaluates
//! ASTs against attribute records. Python bindings are provided via PyO3.

use pyo3::prelude::*;

pub mod compiled;
pub mod config;
pub mod error;
pub mod rule;

use crate::compiled::{ast_to_json, attributes_from_dict, CompiledRule};
use crate::config::{deserialize_config, EngineConfig};
use crate::error::{EvaluationError, RuleError};
use crate::rule::{
    ast_from_json_with_config, combine_with_config, evaluate, parse_with_config, Combination,
    LogicalOperator,
};
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use pyo3::types::PyDict;
use std::sync::Arc;
use tracing::debug;

// ============================================================================
// Cached Configuration
// ============================================================================

/// Global engine configuration installed by `init_config`
static ENGINE_CONFIG: OnceCell<Arc<RwLock<EngineConfig>>> = OnceCell::new();

/// Installed config, or defaults when `init_config` was never called
fn current_config() -> EngineConfig {
    ENGINE_CONFIG
        .get()
        .map(|config| config.read().clone())
        .unwrap_or_default()
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Resolve the combiner connective from an optional "AND" / "OR" string
fn resolve_connective(op: Option<&str>, config: &EngineConfig) -> Result<LogicalOperator, RuleError> {
    match op {
        Some(name) => name.parse::<LogicalOperator>().map_err(|message| RuleError::Parse {
            message,
            position: 0,
        }),
        None => Ok(config.default_connective),
    }
}

fn combine_rule_strings(rules: &[String], op: Option<&str>) -> Result<Combination, RuleError> {
    let config = current_config();
    let op = resolve_connective(op, &config)?;
    combine_with_config(rules, op, &config)
}

// ============================================================================
// Python Functions
// ============================================================================

/// Install the engine configuration (call once at startup)
///
/// # Arguments
/// * `config` - Optional dict with `default_connective` ("AND" / "OR"),
///   `max_nesting_depth`, `max_rule_length` and `max_conditions`; missing
///   keys keep defaults
#[pyfunction]
#[pyo3(signature = (config=None))]
fn init_config(config: Option<&Bound<'_, PyDict>>) -> PyResult<()> {
    let engine_config = match config {
        Some(dict) => deserialize_config(dict)?,
        None => EngineConfig::default(),
    };
    debug!(?engine_config, "installing engine config");

    // If already initialized, update the config
    if let Some(existing) = ENGINE_CONFIG.get() {
        *existing.write() = engine_config;
    } else {
        let _ = ENGINE_CONFIG.set(Arc::new(RwLock::new(engine_config)));
    }

    Ok(())
}

/// Check if config is initialized
#[pyfunction]
fn is_config_initialized() -> bool {
    ENGINE_CONFIG.get().is_some()
}

/// Parse a rule string into a serialized AST
///
/// # Raises
/// ValueError with the lex/parse error and its position
#[pyfunction]
fn parse_rule(rule: &str) -> PyResult<String> {
    let ast = parse_with_config(rule, &current_config())?;
    Ok(ast_to_json(&ast)?)
}

/// Combine rule strings into one serialized AST
///
/// Unparseable rules are skipped; if none remain, or the combination exceeds
/// `max_conditions`, a ValueError is raised.
///
/// # Arguments
/// * `rules` - Rule strings in order
/// * `op` - "AND" or "OR"; defaults to the configured connective
#[pyfunction]
#[pyo3(signature = (rules, op=None))]
fn combine_rules(rules: Vec<String>, op: Option<&str>) -> PyResult<String> {
    let combination = combine_rule_strings(&rules, op)?;
    Ok(ast_to_json(&combination.ast)?)
}

/// Evaluate a serialized AST against a dict of attributes
///
/// # Raises
/// KeyError for a missing attribute, ValueError for a malformed AST or a
/// type-mismatched comparison, TypeError for unsupported attribute values
#[pyfunction]
fn evaluate_rule(ast: &str, attributes: &Bound<'_, PyDict>) -> PyResult<bool> {
    let ast = ast_from_json_with_config(ast, &current_config()).map_err(RuleError::from)?;
    let record = attributes_from_dict(attributes)?;
    let verdict = evaluate(&ast, &record).map_err(RuleError::from)?;
    Ok(verdict)
}

/// Evaluate one serialized AST against many attribute dicts asynchronously
///
/// The batch runs on Tokio's blocking pool so Python's asyncio event loop
/// stays responsive. Fails on the first record that raises.
///
/// # Example (Python)
/// ```python
/// verdicts = await evaluate_batch_async(ast, [{"age": 35}, {"age": 20}])
/// ```
#[pyfunction]
fn evaluate_batch_async<'py>(
    py: Python<'py>,
    ast: &str,
    records: Vec<Bound<'py, PyDict>>,
) -> PyResult<Bound<'py, PyAny>> {
    // Convert everything while we still hold the GIL
    let ast = ast_from_json_with_config(ast, &current_config()).map_err(RuleError::from)?;
    let records = records
        .iter()
        .map(attributes_from_dict)
        .collect::<PyResult<Vec<_>>>()?;

    pyo3_async_runtimes::tokio::future_into_py(py, async move {
        let verdicts = tokio::task::spawn_blocking(move || {
            records
                .iter()
                .map(|record| evaluate(&ast, record))
                .collect::<Result<Vec<bool>, EvaluationError>>()
                .map_err(|e| PyErr::from(RuleError::from(e)))
        })
        .await
        .map_err(|e| {
            PyErr::new::<pyo3::exceptions::PyRuntimeError, _>(format!(
                "Evaluation task panicked: {}",
                e
            ))
        })??;

        Ok(verdicts)
    })
}

/// Parse a rule string into a CompiledRule
#[pyfunction]
fn compile_rule(rule: &str) -> PyResult<CompiledRule> {
    let ast = parse_with_config(rule, &current_config())?;
    Ok(CompiledRule::new(ast, Vec::new()))
}

/// Combine rule strings into a CompiledRule that also reports skipped rules
#[pyfunction]
#[pyo3(signature = (rules, op=None))]
fn compile_rules(rules: Vec<String>, op: Option<&str>) -> PyResult<CompiledRule> {
    let combination = combine_rule_strings(&rules, op)?;
    Ok(CompiledRule::new(combination.ast, combination.rejected))
}

// ============================================================================
// Python Module Definition
// ============================================================================

/// Python module definition
#[pymodule]
fn rule_engine_core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(init_config, m)?)?;
    m.add_function(wrap_pyfunction!(is_config_initialized, m)?)?;
    m.add_function(wrap_pyfunction!(parse_rule, m)?)?;
    m.add_function(wrap_pyfunction!(combine_rules, m)?)?;
    m.add_function(wrap_pyfunction!(evaluate_rule, m)?)?;
    m.add_function(wrap_pyfunction!(evaluate_batch_async, m)?)?;
    m.add_function(wrap_pyfunction!(compile_rule, m)?)?;
    m.add_function(wrap_pyfunction!(compile_rules, m)?)?;
    m.add_class::<CompiledRule>()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_connective() {
        let config = EngineConfig::default();
        assert_eq!(resolve_connective(None, &config), Ok(LogicalOperator::And));
        assert_eq!(resolve_connective(Some("or"), &config), Ok(LogicalOperator::Or));
        assert!(matches!(
            resolve_connective(Some("NAND"), &config),
            Err(RuleError::Parse { .. })
        ));
    }

    #[test]
    fn test_resolve_connective_uses_configured_default() {
        let config = EngineConfig {
            default_connective: LogicalOperator::Or,
            ..EngineConfig::default()
        };
        assert_eq!(resolve_connective(None, &config), Ok(LogicalOperator::Or));
    }
}
