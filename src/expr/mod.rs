//! Parsed expression tree consumed by the evaluator
//!
//! The grammar lives elsewhere; this module only defines the already-parsed
//! value and the typed argument accessors functions use to read it.
//!
//! # Example
//!
//! ```rust
//! use kuba_graphite::expr::Expr;
//!
//! // sumSeries(a.*.cpu, scale(b.cpu, 2))
//! let expr = Expr::func(
//!     "sumSeries",
//!     vec![
//!         Expr::name("a.*.cpu"),
//!         Expr::func("scale", vec![Expr::name("b.cpu"), Expr::Const(2.0)]),
//!     ],
//! );
//! assert_eq!(expr.to_string(), "sumSeries(a.*.cpu,scale(b.cpu,2))");
//! assert_eq!(expr.metrics(0, 60).len(), 2);
//! ```

pub mod eval;
pub mod interval;

pub use eval::{
    get_series_arg, get_series_args_skip_missing, get_single_series_arg, Engine, EvalContext,
    Evaluator, InMemoryFetcher, MetricFetcher,
};
pub use interval::parse_interval;

use std::fmt;

use crate::error::{Error, Result};
use crate::types::MetricRequest;

/// Default Holt-Winters bootstrap window
pub const DEFAULT_BOOTSTRAP_INTERVAL: &str = "7d";

/// Node of a parsed expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Metric name or glob pattern (a leaf)
    Name(String),
    /// Numeric literal
    Const(f64),
    /// Quoted string literal
    String(String),
    /// Boolean literal
    Bool(bool),
    /// Function call with positional and named arguments
    Func {
        /// Function name as written
        name: String,
        /// Positional arguments
        args: Vec<Expr>,
        /// Named arguments in source order
        named_args: Vec<(String, Expr)>,
    },
}

/// `aliasByNode`-style argument: a node index or a tag name
#[derive(Debug, Clone, PartialEq)]
pub enum NodeOrTag {
    /// Dot-separated node index, negative counts from the end
    Node(i64),
    /// Tag key
    Tag(String),
}

impl Expr {
    /// Leaf node
    pub fn name(pattern: impl Into<String>) -> Self {
        Expr::Name(pattern.into())
    }

    /// Call node without named arguments
    pub fn func(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Func {
            name: name.into(),
            args,
            named_args: Vec::new(),
        }
    }

    /// Add a named argument to a call node; no-op on other nodes
    pub fn with_named(mut self, key: impl Into<String>, value: Expr) -> Self {
        if let Expr::Func { named_args, .. } = &mut self {
            named_args.push((key.into(), value));
        }
        self
    }

    /// Function name for calls, pattern for leaves, literal text otherwise
    pub fn target(&self) -> &str {
        match self {
            Expr::Name(n) | Expr::String(n) => n,
            Expr::Func { name, .. } => name,
            Expr::Const(_) => "const",
            Expr::Bool(_) => "bool",
        }
    }

    /// True for leaves
    pub fn is_name(&self) -> bool {
        matches!(self, Expr::Name(_))
    }

    /// True for call nodes
    pub fn is_func(&self) -> bool {
        matches!(self, Expr::Func { .. })
    }

    /// Positional arguments (empty for non-calls)
    pub fn args(&self) -> &[Expr] {
        match self {
            Expr::Func { args, .. } => args,
            _ => &[],
        }
    }

    /// Positional argument `index`
    pub fn arg(&self, index: usize) -> Option<&Expr> {
        self.args().get(index)
    }

    /// Named argument `key`
    pub fn named_arg(&self, key: &str) -> Option<&Expr> {
        match self {
            Expr::Func { named_args, .. } => {
                named_args.iter().find(|(k, _)| k == key).map(|(_, v)| v)
            },
            _ => None,
        }
    }

    /// Positional argument, falling back to the named one
    pub fn lookup(&self, index: usize, key: &str) -> Option<&Expr> {
        self.arg(index).or_else(|| self.named_arg(key))
    }

    /// Arguments re-serialized as written (`a.b,2,func='sum'`)
    pub fn raw_args(&self) -> String {
        match self {
            Expr::Func {
                args, named_args, ..
            } => {
                let mut parts: Vec<String> = args.iter().map(|a| a.to_string()).collect();
                parts.extend(named_args.iter().map(|(k, v)| format!("{}={}", k, v)));
                parts.join(",")
            },
            _ => String::new(),
        }
    }

    // ========================================================================
    // Typed argument accessors
    // ========================================================================

    /// Required integer argument
    pub fn get_int_arg(&self, index: usize, key: &str) -> Result<i64> {
        match self.lookup(index, key) {
            Some(Expr::Const(v)) if v.fract() == 0.0 => Ok(*v as i64),
            Some(_) => Err(Error::bad_argument(self.target(), key, "integer")),
            None => Err(Error::missing_argument(self.target(), key)),
        }
    }

    /// Optional integer argument
    pub fn get_int_arg_default(&self, index: usize, key: &str, default: i64) -> Result<i64> {
        match self.lookup(index, key) {
            None => Ok(default),
            Some(_) => self.get_int_arg(index, key),
        }
    }

    /// Required float argument
    pub fn get_float_arg(&self, index: usize, key: &str) -> Result<f64> {
        match self.lookup(index, key) {
            Some(Expr::Const(v)) => Ok(*v),
            Some(_) => Err(Error::bad_argument(self.target(), key, "float")),
            None => Err(Error::missing_argument(self.target(), key)),
        }
    }

    /// Optional float argument
    pub fn get_float_arg_default(&self, index: usize, key: &str, default: f64) -> Result<f64> {
        match self.lookup(index, key) {
            None => Ok(default),
            Some(_) => self.get_float_arg(index, key),
        }
    }

    /// Required string argument
    pub fn get_string_arg(&self, index: usize, key: &str) -> Result<String> {
        match self.lookup(index, key) {
            Some(Expr::String(s)) => Ok(s.clone()),
            Some(_) => Err(Error::bad_argument(self.target(), key, "string")),
            None => Err(Error::missing_argument(self.target(), key)),
        }
    }

    /// Optional string argument
    pub fn get_string_arg_default(&self, index: usize, key: &str, default: &str) -> Result<String> {
        match self.lookup(index, key) {
            None => Ok(default.to_string()),
            Some(_) => self.get_string_arg(index, key),
        }
    }

    /// Optional boolean; accepts `true`/`false` literals, quoted or not, and numbers
    pub fn get_bool_arg_default(&self, index: usize, key: &str, default: bool) -> Result<bool> {
        match self.lookup(index, key) {
            None => Ok(default),
            Some(Expr::Bool(b)) => Ok(*b),
            Some(Expr::Const(v)) => Ok(*v != 0.0),
            Some(Expr::String(s)) | Some(Expr::Name(s)) => match s.to_ascii_lowercase().as_str() {
                "true" => Ok(true),
                "false" => Ok(false),
                _ => Err(Error::bad_argument(self.target(), key, "boolean")),
            },
            Some(_) => Err(Error::bad_argument(self.target(), key, "boolean")),
        }
    }

    /// Required interval argument in seconds; numbers are taken as seconds
    pub fn get_interval_arg(&self, index: usize, key: &str, default_sign: i64) -> Result<i64> {
        match self.lookup(index, key) {
            Some(Expr::String(s)) => parse_interval(s, default_sign),
            Some(Expr::Const(v)) if v.fract() == 0.0 => Ok(*v as i64),
            Some(_) => Err(Error::bad_argument(self.target(), key, "interval")),
            None => Err(Error::missing_argument(self.target(), key)),
        }
    }

    /// Optional interval argument
    pub fn get_interval_arg_default(
        &self,
        index: usize,
        key: &str,
        default: &str,
        default_sign: i64,
    ) -> Result<i64> {
        match self.lookup(index, key) {
            None => parse_interval(default, default_sign),
            Some(_) => self.get_interval_arg(index, key, default_sign),
        }
    }

    /// All positional arguments from `start` on, as node indices or tag names
    pub fn get_node_or_tag_args(&self, start: usize) -> Result<Vec<NodeOrTag>> {
        self.args()
            .iter()
            .enumerate()
            .skip(start)
            .map(|(i, a)| match a {
                Expr::Const(v) if v.fract() == 0.0 => Ok(NodeOrTag::Node(*v as i64)),
                Expr::String(s) => Ok(NodeOrTag::Tag(s.clone())),
                _ => Err(Error::bad_argument(self.target(), i, "nodeOrTag")),
            })
            .collect()
    }

    // ========================================================================
    // Fetch planning
    // ========================================================================

    /// Fetch requests needed to evaluate this expression over `[from, until)`
    ///
    /// Holt-Winters calls widen the window of their subtree by the bootstrap
    /// interval. Duplicates are removed; order follows the tree.
    pub fn metrics(&self, from: i64, until: i64) -> Vec<MetricRequest> {
        let mut out = Vec::new();
        self.collect_metrics(from, until, &mut out);
        out
    }

    fn collect_metrics(&self, from: i64, until: i64, out: &mut Vec<MetricRequest>) {
        match self {
            Expr::Name(pattern) => {
                let req = MetricRequest::new(pattern.clone(), from, until);
                if !out.contains(&req) {
                    out.push(req);
                }
            },
            Expr::Func {
                args, named_args, ..
            } => {
                let from = from - self.bootstrap_interval().unwrap_or(0);
                for a in args {
                    a.collect_metrics(from, until, out);
                }
                for (_, a) in named_args {
                    a.collect_metrics(from, until, out);
                }
            },
            _ => {},
        }
    }

    /// Bootstrap window in seconds for Holt-Winters calls, `None` otherwise
    pub fn bootstrap_interval(&self) -> Option<i64> {
        let index = match self.target() {
            "holtWintersForecast" => 1,
            "holtWintersConfidenceBands" | "holtWintersConfidenceArea" | "holtWintersAberration" => 2,
            _ => return None,
        };
        if !self.is_func() {
            return None;
        }
        self.get_interval_arg_default(index, "bootstrapInterval", DEFAULT_BOOTSTRAP_INTERVAL, 1)
            .ok()
            .map(i64::abs)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Name(n) => f.write_str(n),
            Expr::Const(v) => write!(f, "{}", v),
            Expr::String(s) => write!(f, "'{}'", s),
            Expr::Bool(b) => write!(f, "{}", b),
            Expr::Func { name, .. } => write!(f, "{}({})", name, self.raw_args()),
        }
    }
}
