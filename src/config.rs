//! Engine configuration
//!
//! Limits and defaults shared by the parser and the combiner. Loadable from
//! JSON or from a Python dict passed to `init_config`.

use pyo3::types::{PyAnyMethods, PyDict, PyDictMethods};
use pyo3::Bound;
use serde::{Deserialize, Serialize};

use crate::error::{Result, RuleError};
use crate::rule::LogicalOperator;

pub const DEFAULT_MAX_NESTING_DEPTH: usize = 64;
pub const DEFAULT_MAX_RULE_LENGTH: usize = 64 * 1024;
pub const DEFAULT_MAX_CONDITIONS: usize = 1024;
/// Upper bound for `max_conditions`; tree depth follows the condition count
pub const MAX_CONDITIONS_CEILING: usize = 16 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Connective used by the combiner when the caller names none
    pub default_connective: LogicalOperator,
    /// Maximum parenthesis nesting accepted by the parser
    pub max_nesting_depth: usize,
    /// Maximum rule length in bytes
    pub max_rule_length: usize,
    /// Maximum condition leaves per rule or combination; also bounds decoded AST nesting
    pub max_conditions: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_connective: LogicalOperator::And,
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
            max_rule_length: DEFAULT_MAX_RULE_LENGTH,
            max_conditions: DEFAULT_MAX_CONDITIONS,
        }
    }
}

impl EngineConfig {
    /// Load and validate a config from JSON; missing keys take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| RuleError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_nesting_depth == 0 {
            return Err(RuleError::InvalidConfig(
                "max_nesting_depth must be at least 1".to_string(),
            ));
        }
        if self.max_rule_length == 0 {
            return Err(RuleError::InvalidConfig(
                "max_rule_length must be at least 1".to_string(),
            ));
        }
        if !(1..=MAX_CONDITIONS_CEILING).contains(&self.max_conditions) {
            return Err(RuleError::InvalidConfig(format!(
                "max_conditions must be between 1 and {}",
                MAX_CONDITIONS_CEILING
            )));
        }
        Ok(())
    }
}

/// Deserialize engine config from a Python dict
/// Expected format: {"default_connective": "AND", "max_nesting_depth": 64, "max_rule_length": 65536, "max_conditions": 1024}
pub fn deserialize_config(dict: &Bound<'_, PyDict>) -> pyo3::PyResult<EngineConfig> {
    let mut config = EngineConfig::default();

    if let Some(value) = dict.get_item("default_connective")? {
        if !value.is_none() {
            let name: String = value.extract()?;
            config.default_connective = name
                .parse()
                .map_err(RuleError::InvalidConfig)?;
        }
    }
    if let Some(value) = dict.get_item("max_nesting_depth")? {
        if !value.is_none() {
            config.max_nesting_depth = value.extract()?;
        }
    }
    if let Some(value) = dict.get_item("max_rule_length")? {
        if !value.is_none() {
            config.max_rule_length = value.extract()?;
        }
    }
    if let Some(value) = dict.get_item("max_conditions")? {
        if !value.is_none() {
            config.max_conditions = value.extract()?;
        }
    }

    config.validate()?;
    Ok(config)
}
