//! Kuba Graphite - Graphite-compatible query functions for the Kuba TSDB
//!
//! This library provides the function stage of a Graphite render pipeline:
//! - A registry of pluggable query functions with a stable metadata document
//! - The series data model with absence masks, alignment and consolidation
//! - Aggregation, selection, windowed statistics and seasonal forecasting
//! - JSON, raw and CSV output formats
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use kuba_graphite::config::EngineConfig;
//! use kuba_graphite::expr::{Engine, EvalContext, Expr, InMemoryFetcher};
//! use kuba_graphite::functions::FunctionRegistry;
//! use kuba_graphite::types::MetricData;
//!
//! # #[tokio::main]
//! # async fn main() -> kuba_graphite::Result<()> {
//! let config = EngineConfig::default();
//! let registry = Arc::new(FunctionRegistry::with_defaults(&config));
//! let fetcher = Arc::new(InMemoryFetcher::new(vec![
//!     MetricData::new("web.a.requests", vec![1.0, f64::NAN], 60, 0),
//!     MetricData::new("web.b.requests", vec![2.0, 3.0], 60, 0),
//! ]));
//! let engine = Engine::new(registry, fetcher, config);
//!
//! let expr = Expr::func("sumSeries", vec![Expr::name("web.*.requests")]);
//! let out = engine.render(&EvalContext::new(), &expr, 0, 120, 0).await?;
//! assert_eq!(out[0].values, vec![3.0, 3.0]);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod types;

/// Configuration management with TOML support
pub mod config;

/// Display consolidation (bucketing raw samples down to maxDataPoints)
pub mod consolidation;

/// Order statistics, heaps and rolling windows shared by the functions
pub mod stats;

/// Cross-series alignment and aggregation
pub mod aggregation;

/// Expression tree, argument extraction and evaluation
pub mod expr;

/// Function contract, registry and built-in functions
pub mod functions;

/// Redis pool used by backend-driven functions
pub mod redis;

/// Output formats for result series
pub mod render;

// Re-export main types
pub use config::EngineConfig;
pub use error::{ConfigError, Error, Result};
pub use expr::{Engine, EvalContext, Expr};
pub use functions::{Function, FunctionRegistry};
pub use types::{MetricData, MetricRequest};
