//! ProductFilter - listener-side product acceptance rules
//!
//! Type suffixes/prefixes mark non-production products:
//! `-test`, `-scenario`, `-devel` and `internal-`. Anything without a marker
//! is an "actual" product.

use serde::{Deserialize, Serialize};

use crate::ProductId;

/// Product acceptance rules
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductFilter {
    /// Only these types (empty = all)
    pub include_types: Vec<String>,
    /// Never these types
    pub exclude_types: Vec<String>,
    /// Only these sources (empty = all)
    pub include_sources: Vec<String>,
    /// Never these sources
    pub exclude_sources: Vec<String>,
    pub include_tests: bool,
    pub include_scenarios: bool,
    pub include_actuals: bool,
    pub include_internals: bool,
    pub include_developments: bool,
}

impl Default for ProductFilter {
    fn default() -> Self {
        Self {
            include_types: Vec::new(),
            exclude_types: Vec::new(),
            include_sources: Vec::new(),
            exclude_sources: Vec::new(),
            include_tests: false,
            include_scenarios: false,
            include_actuals: true,
            include_internals: false,
            include_developments: false,
        }
    }
}

impl ProductFilter {
    /// Whether a product passes every rule
    pub fn accept(&self, id: &ProductId) -> bool {
        let product_type = id.product_type.as_str();
        let source = id.source.as_str();

        if self.exclude_types.iter().any(|t| t == product_type) {
            return false;
        }
        if !self.include_types.is_empty() && !self.include_types.iter().any(|t| t == product_type) {
            return false;
        }
        if self.exclude_sources.iter().any(|s| s == source) {
            return false;
        }
        if !self.include_sources.is_empty() && !self.include_sources.iter().any(|s| s == source) {
            return false;
        }

        let is_test = product_type.ends_with("-test");
        let is_scenario = product_type.ends_with("-scenario");
        let is_internal = product_type.starts_with("internal-");
        let is_devel = product_type.ends_with("-devel");

        if is_test && !self.include_tests {
            return false;
        }
        if is_scenario && !self.include_scenarios {
            return false;
        }
        if !self.include_actuals && !is_scenario && !is_internal && !is_devel {
            return false;
        }
        if is_internal && !self.include_internals {
            return false;
        }
        if is_devel && !self.include_developments {
            return false;
        }
        true
    }
}
