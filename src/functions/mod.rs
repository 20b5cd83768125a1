//! Function dispatch contract and the built-in functions
//!
//! Every function implements [`Function`]. A function module exposes
//! `new(&EngineConfig) -> Result<Vec<FunctionMetadata>, ConfigError>`, which
//! lists the names it answers to; [`registry::FunctionRegistry`] collects
//! them into a name-keyed table.
//!
//! # Modules
//!
//! - Aggregates: `aggregate`, `percentile`, `count_values`
//! - Selection: `highest_lowest`, `sort_by`
//! - Windowed statistics: `stdev`, `pearson`, `ewma`
//! - Transforms: `transform`, `alias`, `fallback_series`
//! - Structural: `time_shift_by_metric`, `holt_winters`, `heat_map`
//! - Backend-driven: `alias_by_redis`

pub mod description;
pub mod registry;

pub mod aggregate;
pub mod alias;
pub mod alias_by_redis;
pub mod count_values;
pub mod ewma;
pub mod fallback_series;
pub mod heat_map;
pub mod highest_lowest;
pub mod holt_winters;
pub mod pearson;
pub mod percentile;
pub mod sort_by;
pub mod stdev;
pub mod time_shift_by_metric;
pub mod transform;

pub use description::{FunctionDescription, FunctionParam, FunctionType};
pub use registry::{FunctionRegistry, RegistryBuilder};

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::error::{ConfigError, Result};
use crate::expr::{EvalContext, Evaluator, Expr};
use crate::types::{FetchedValues, MetricData};

/// Registration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Order {
    /// Registered in the first pass
    #[default]
    Any,
    /// Registered after every `Any` entry, winning name collisions
    Last,
}

/// A query function
#[async_trait]
pub trait Function: Send + Sync {
    /// Registration order
    fn order(&self) -> Order {
        Order::Any
    }

    /// Descriptions keyed by every name this implementation answers to
    fn description(&self) -> HashMap<String, FunctionDescription>;

    /// Evaluate the call node `expr` over `[from, until)`
    async fn call(
        &self,
        ctx: &EvalContext,
        eval: &dyn Evaluator,
        expr: &Expr,
        from: i64,
        until: i64,
        values: &FetchedValues,
    ) -> Result<Vec<MetricData>>;
}

/// A name bound to an implementation
#[derive(Clone)]
pub struct FunctionMetadata {
    /// Registered name
    pub name: String,
    /// Implementation
    pub function: Arc<dyn Function>,
}

impl FunctionMetadata {
    /// Bind `name` to `function`
    pub fn new(name: impl Into<String>, function: Arc<dyn Function>) -> Self {
        Self {
            name: name.into(),
            function,
        }
    }
}

impl std::fmt::Debug for FunctionMetadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionMetadata")
            .field("name", &self.name)
            .field("order", &self.function.order())
            .finish()
    }
}

/// Bind every name in `names` to one shared implementation
pub fn bind_all(names: &[&str], function: Arc<dyn Function>) -> Vec<FunctionMetadata> {
    names
        .iter()
        .map(|n| FunctionMetadata::new(*n, function.clone()))
        .collect()
}

/// Module constructor signature
pub type Constructor = fn(&EngineConfig) -> std::result::Result<Vec<FunctionMetadata>, ConfigError>;

/// Built-in modules in registration order
pub const MODULES: &[(&str, Constructor)] = &[
    ("aggregate", aggregate::new),
    ("alias", alias::new),
    ("aliasByRedis", alias_by_redis::new),
    ("countValues", count_values::new),
    ("ewma", ewma::new),
    ("fallbackSeries", fallback_series::new),
    ("heatMap", heat_map::new),
    ("highestLowest", highest_lowest::new),
    ("holtWinters", holt_winters::new),
    ("pearson", pearson::new),
    ("percentile", percentile::new),
    ("sortBy", sort_by::new),
    ("stdev", stdev::new),
    ("timeShiftByMetric", time_shift_by_metric::new),
    ("transform", transform::new),
];

/// First metric path inside a possibly wrapped series name
///
/// `sumSeries(a.b.c)` gives `a.b.c`; `scale(a.b,2)` gives `a.b`.
pub fn extract_metric(name: &str) -> &str {
    let mut start = 0;
    for (i, c) in name.char_indices() {
        match c {
            '(' => start = i + 1,
            ',' | ')' => {
                let candidate = name[start..i].trim();
                if !candidate.is_empty() {
                    return candidate;
                }
                start = i + 1;
            },
            _ => {},
        }
    }
    name[start..].trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_metric() {
        assert_eq!(extract_metric("a.b.c"), "a.b.c");
        assert_eq!(extract_metric("sumSeries(a.b.c)"), "a.b.c");
        assert_eq!(extract_metric("scale(a.b,2)"), "a.b");
        assert_eq!(extract_metric("alias(scale(x.y,2),'z')"), "x.y");
    }

    #[test]
    fn test_modules_unique() {
        let mut names: Vec<&str> = MODULES.iter().map(|(n, _)| *n).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), MODULES.len());
    }
}
