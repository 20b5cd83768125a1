//! Expression evaluation
//!
//! The evaluator walks the tree: leaves are looked up in the binding map
//! produced by [`Evaluator::fetch`], call nodes are dispatched through the
//! [`FunctionRegistry`]. Functions receive the evaluator back so they can
//! evaluate their own arguments, possibly over a different window.

use async_trait::async_trait;
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::functions::registry::FunctionRegistry;
use crate::types::{is_wildcard, FetchedValues, MetricData, MetricRequest};

use super::Expr;

// ============================================================================
// Evaluation context
// ============================================================================

/// Per-request state shared by every node of one evaluation
#[derive(Debug, Clone, Default)]
pub struct EvalContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl EvalContext {
    /// Context without deadline
    pub fn new() -> Self {
        Self::default()
    }

    /// Use the caller's cancellation token
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Fail evaluation once `timeout` has elapsed from now
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    /// Token observed by long-running operations
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Time left before the deadline
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Error out when cancelled or past the deadline
    pub fn check(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled("evaluation cancelled".to_string()));
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(Error::Timeout("evaluation deadline exceeded".to_string()));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Traits
// ============================================================================

/// Resolves one fetch request to raw series
#[async_trait]
pub trait MetricFetcher: Send + Sync {
    /// Fetch every series matching `request.pattern` within the window
    async fn fetch(&self, ctx: &EvalContext, request: &MetricRequest) -> Result<Vec<MetricData>>;
}

/// Evaluates expressions against a binding map
#[async_trait]
pub trait Evaluator: Send + Sync {
    /// Evaluate `expr` over `[from, until)`
    async fn eval(
        &self,
        ctx: &EvalContext,
        expr: &Expr,
        from: i64,
        until: i64,
        values: &FetchedValues,
    ) -> Result<Vec<MetricData>>;

    /// Fetch every request `expr` needs
    async fn fetch(
        &self,
        ctx: &EvalContext,
        expr: &Expr,
        from: i64,
        until: i64,
    ) -> Result<FetchedValues>;
}

// ============================================================================
// Argument helpers
// ============================================================================

/// Evaluate a series argument; an empty result is `MissingTimeSeries`
pub async fn get_series_arg(
    ctx: &EvalContext,
    eval: &dyn Evaluator,
    arg: &Expr,
    from: i64,
    until: i64,
    values: &FetchedValues,
) -> Result<Vec<MetricData>> {
    if !arg.is_name() && !arg.is_func() {
        return Err(Error::MissingTimeSeries(arg.to_string()));
    }
    let series = eval.eval(ctx, arg, from, until, values).await?;
    if series.is_empty() {
        return Err(Error::MissingTimeSeries(arg.to_string()));
    }
    Ok(series)
}

/// Evaluate an argument that must resolve to exactly one series
pub async fn get_single_series_arg(
    ctx: &EvalContext,
    eval: &dyn Evaluator,
    expr: &Expr,
    index: usize,
    from: i64,
    until: i64,
    values: &FetchedValues,
) -> Result<MetricData> {
    let arg = expr
        .arg(index)
        .ok_or_else(|| Error::missing_argument(expr.target(), index))?;
    let mut series = get_series_arg(ctx, eval, arg, from, until, values).await?;
    if series.len() != 1 {
        return Err(Error::WildcardNotAllowed {
            function: expr.target().to_string(),
            index,
            count: series.len(),
        });
    }
    Ok(series.remove(0))
}

/// Evaluate every positional argument, dropping the ones that match nothing
///
/// Returns the arguments that produced series alongside the concatenated
/// series, so callers can rebuild their display name from what was found.
pub async fn get_series_args_skip_missing(
    ctx: &EvalContext,
    eval: &dyn Evaluator,
    args: &[Expr],
    from: i64,
    until: i64,
    values: &FetchedValues,
) -> Result<(Vec<Expr>, Vec<MetricData>)> {
    let mut found = Vec::with_capacity(args.len());
    let mut series = Vec::new();
    for arg in args {
        match get_series_arg(ctx, eval, arg, from, until, values).await {
            Ok(s) => {
                found.push(arg.clone());
                series.extend(s);
            },
            Err(e) if e.is_missing_series() => {
                debug!(arg = %arg, "dropping missing argument");
            },
            Err(e) => return Err(e),
        }
    }
    Ok((found, series))
}

// ============================================================================
// Engine
// ============================================================================

/// Registry-backed evaluator
pub struct Engine {
    registry: Arc<FunctionRegistry>,
    fetcher: Arc<dyn MetricFetcher>,
    config: EngineConfig,
}

impl Engine {
    /// Create an engine over a built registry
    pub fn new(
        registry: Arc<FunctionRegistry>,
        fetcher: Arc<dyn MetricFetcher>,
        config: EngineConfig,
    ) -> Self {
        Self {
            registry,
            fetcher,
            config,
        }
    }

    /// Function registry
    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    /// Engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Fetch, evaluate and consolidate `expr` for display
    ///
    /// `max_data_points == 0` disables consolidation.
    pub async fn render(
        &self,
        ctx: &EvalContext,
        expr: &Expr,
        from: i64,
        until: i64,
        max_data_points: usize,
    ) -> Result<Vec<MetricData>> {
        let values = self.fetch(ctx, expr, from, until).await?;
        let mut series = self.eval(ctx, expr, from, until, &values).await?;
        let policy = self.config.consolidation.policy();
        for s in series.iter_mut() {
            s.consolidate(max_data_points, policy);
        }
        Ok(series)
    }
}

#[async_trait]
impl Evaluator for Engine {
    async fn eval(
        &self,
        ctx: &EvalContext,
        expr: &Expr,
        from: i64,
        until: i64,
        values: &FetchedValues,
    ) -> Result<Vec<MetricData>> {
        ctx.check()?;
        match expr {
            Expr::Name(pattern) => {
                let req = MetricRequest::new(pattern.clone(), from, until);
                values
                    .get(&req)
                    .cloned()
                    .ok_or_else(|| Error::SeriesDoesNotExist(pattern.clone()))
            },
            Expr::Func { name, .. } => {
                let function = self
                    .registry
                    .get(name)
                    .ok_or_else(|| Error::UnknownFunction(name.clone()))?;
                debug!(function = %name, from, until, "evaluating");
                function.call(ctx, self, expr, from, until, values).await
            },
            other => Err(Error::bad_argument(other.target(), 0, "seriesList")),
        }
    }

    async fn fetch(
        &self,
        ctx: &EvalContext,
        expr: &Expr,
        from: i64,
        until: i64,
    ) -> Result<FetchedValues> {
        let mut values = FetchedValues::new();
        for req in expr.metrics(from, until) {
            ctx.check()?;
            let series = self.fetcher.fetch(ctx, &req).await?;
            if series.is_empty() {
                debug!(pattern = %req.pattern, "no series matched");
            }
            values.insert(req, series);
        }
        Ok(values)
    }
}

// ============================================================================
// In-memory fetcher
// ============================================================================

/// Fetcher over a fixed set of series, used by tests and tools
///
/// Patterns support Graphite globs (`*`, `?`, `[...]`, `{a,b}`) matched per
/// dot-separated node. Each match is trimmed to the requested window.
#[derive(Debug, Clone, Default)]
pub struct InMemoryFetcher {
    series: Vec<MetricData>,
}

impl InMemoryFetcher {
    /// Create a fetcher over `series`
    pub fn new(series: Vec<MetricData>) -> Self {
        Self { series }
    }

    /// Add a series
    pub fn insert(&mut self, series: MetricData) {
        self.series.push(series);
    }
}

#[async_trait]
impl MetricFetcher for InMemoryFetcher {
    async fn fetch(&self, ctx: &EvalContext, request: &MetricRequest) -> Result<Vec<MetricData>> {
        ctx.check()?;
        let re = if is_wildcard(&request.pattern) {
            Some(glob_to_regex(&request.pattern)?)
        } else {
            None
        };
        Ok(self
            .series
            .iter()
            .filter(|s| {
                let metric = s.name.split(';').next().unwrap_or_default();
                match &re {
                    Some(re) => re.is_match(metric),
                    None => metric == request.pattern,
                }
            })
            .filter_map(|s| slice_window(s, request.from, request.until))
            .collect())
    }
}

/// Translate a Graphite glob into an anchored regex
pub fn glob_to_regex(pattern: &str) -> Result<Regex> {
    let mut re = String::with_capacity(pattern.len() * 2 + 2);
    re.push('^');
    let mut in_brace = false;
    let mut in_class = false;
    for c in pattern.chars() {
        match c {
            '*' if !in_class => re.push_str("[^.]*"),
            '?' if !in_class => re.push_str("[^.]"),
            '[' => {
                in_class = true;
                re.push('[');
            },
            ']' => {
                in_class = false;
                re.push(']');
            },
            '{' if !in_class => {
                in_brace = true;
                re.push_str("(?:");
            },
            '}' if in_brace => {
                in_brace = false;
                re.push(')');
            },
            ',' if in_brace => re.push('|'),
            c if in_class => re.push(c),
            c => re.push_str(&regex::escape(&c.to_string())),
        }
    }
    re.push('$');
    Regex::new(&re).map_err(|e| {
        warn!(pattern, error = %e, "invalid glob pattern");
        Error::InvalidArgument(format!("invalid pattern {}: {}", pattern, e))
    })
}

/// Cut `series` down to the samples inside `[from, until)`
fn slice_window(series: &MetricData, from: i64, until: i64) -> Option<MetricData> {
    let step = series.step_time;
    let first = ((from - series.start_time).max(0) + step - 1) / step;
    let last = (((until - series.start_time).max(0) + step - 1) / step).min(series.len() as i64);
    if first >= last {
        return None;
    }
    let (first, last) = (first as usize, last as usize);

    let mut r = series.derive(
        series.name.clone(),
        series.values[first..last].to_vec(),
        series.is_absent[first..last].to_vec(),
    );
    r.start_time = series.start_time + first as i64 * step;
    r.stop_time = r.start_time + (last - first) as i64 * step;
    Some(r)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob() {
        let re = glob_to_regex("a.*.c").unwrap();
        assert!(re.is_match("a.b.c"));
        assert!(!re.is_match("a.b.d.c"));

        let re = glob_to_regex("a.{x,y}.c").unwrap();
        assert!(re.is_match("a.x.c"));
        assert!(re.is_match("a.y.c"));
        assert!(!re.is_match("a.z.c"));

        let re = glob_to_regex("host[12].cpu").unwrap();
        assert!(re.is_match("host1.cpu"));
        assert!(!re.is_match("host3.cpu"));
    }

    #[test]
    fn test_slice_window() {
        let s = MetricData::new("a", (0..10).map(|v| v as f64).collect(), 10, 0);
        let r = slice_window(&s, 25, 60).unwrap();
        assert_eq!(r.start_time, 30);
        assert_eq!(r.values, vec![3.0, 4.0, 5.0]);
        assert_eq!(r.stop_time, 60);
        assert!(slice_window(&s, 200, 300).is_none());
    }

    #[test]
    fn test_context_cancel() {
        let token = CancellationToken::new();
        let ctx = EvalContext::new().with_cancellation(token.clone());
        assert!(ctx.check().is_ok());
        token.cancel();
        assert!(matches!(ctx.check(), Err(Error::Cancelled(_))));
    }

    #[tokio::test]
    async fn test_context_deadline() {
        let ctx = EvalContext::new().with_timeout(Duration::from_millis(0));
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(matches!(ctx.check(), Err(Error::Timeout(_))));
    }

    #[tokio::test]
    async fn test_in_memory_fetch() {
        let fetcher = InMemoryFetcher::new(vec![
            MetricData::new("a.b.c", vec![1.0, 2.0], 60, 0),
            MetricData::new("a.x.c;dc=east", vec![3.0, 4.0], 60, 0),
            MetricData::new("z.b.c", vec![5.0, 6.0], 60, 0),
        ]);
        let got = fetcher
            .fetch(&EvalContext::new(), &MetricRequest::new("a.*.c", 0, 120))
            .await
            .unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(got[1].tags["dc"], "east");
    }
}
