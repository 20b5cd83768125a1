//! End-to-end tests for the built-in functions
//!
//! Every test builds a default registry, an in-memory fetcher and an
//! `Engine`, then renders an expression the way a render endpoint would.

use std::sync::Arc;
use std::time::Duration;

use kuba_graphite::config::EngineConfig;
use kuba_graphite::error::Error;
use kuba_graphite::expr::{Engine, EvalContext, Expr, InMemoryFetcher};
use kuba_graphite::functions::FunctionRegistry;
use kuba_graphite::types::MetricData;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Helper Functions
// ============================================================================

fn engine(series: Vec<MetricData>) -> Engine {
    let config = EngineConfig::default();
    let registry = Arc::new(FunctionRegistry::with_defaults(&config));
    Engine::new(registry, Arc::new(InMemoryFetcher::new(series)), config)
}

fn series(name: &str, values: &[f64]) -> MetricData {
    MetricData::new(name, values.to_vec(), 60, 0)
}

async fn render(engine: &Engine, expr: &Expr) -> kuba_graphite::Result<Vec<MetricData>> {
    engine.render(&EvalContext::new(), expr, 0, 600, 0).await
}

fn assert_values(actual: &MetricData, expected: &[Option<f64>]) {
    let got: Vec<Option<f64>> = (0..actual.len()).map(|i| actual.value_at(i)).collect();
    assert_eq!(got.len(), expected.len(), "length of {}", actual.name);
    for (i, (g, e)) in got.iter().zip(expected).enumerate() {
        match (g, e) {
            (Some(g), Some(e)) => assert!((g - e).abs() < 1e-9, "{}[{}]: {} != {}", actual.name, i, g, e),
            (None, None) => {},
            _ => panic!("{}[{}]: {:?} != {:?}", actual.name, i, g, e),
        }
    }
}

// ============================================================================
// Aggregates
// ============================================================================

#[tokio::test]
async fn test_sum_excludes_absent() {
    let e = engine(vec![
        series("a.x", &[f64::NAN, 1.0]),
        series("a.y", &[2.0, f64::NAN]),
    ]);
    let out = render(&e, &Expr::func("sumSeries", vec![Expr::name("a.*")]))
        .await
        .unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].name, "sumSeries(a.*)");
    assert_values(&out[0], &[Some(2.0), Some(1.0)]);
}

#[tokio::test]
async fn test_all_absent_index_stays_absent() {
    let e = engine(vec![
        series("a.x", &[f64::NAN, 1.0]),
        series("a.y", &[f64::NAN, 3.0]),
    ]);
    let out = render(&e, &Expr::func("averageSeries", vec![Expr::name("a.*")]))
        .await
        .unwrap();
    assert_values(&out[0], &[None, Some(2.0)]);
}

#[tokio::test]
async fn test_aggregate_by_name() {
    let e = engine(vec![series("a.x", &[1.0, 5.0]), series("a.y", &[3.0, 2.0])]);
    let expr = Expr::func("aggregate", vec![Expr::name("a.*"), Expr::String("max".into())]);
    let out = render(&e, &expr).await.unwrap();
    assert_eq!(out[0].name, "maxSeries(a.*)");
    assert_values(&out[0], &[Some(3.0), Some(5.0)]);
}

#[tokio::test]
async fn test_aggregate_skips_missing_arguments() {
    let e = engine(vec![series("a.x", &[1.0, 2.0])]);
    let expr = Expr::func("sumSeries", vec![Expr::name("nothing.*"), Expr::name("a.x")]);
    let out = render(&e, &expr).await.unwrap();
    assert_eq!(out[0].name, "sumSeries(a.x)");
    assert_values(&out[0], &[Some(1.0), Some(2.0)]);

    let only_missing = Expr::func("sumSeries", vec![Expr::name("nothing.*")]);
    assert!(render(&e, &only_missing).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_diff_absent_follows_minuend() {
    let e = engine(vec![
        series("a", &[10.0, f64::NAN, 7.0]),
        series("b", &[1.0, 1.0, f64::NAN]),
    ]);
    let expr = Expr::func("diffSeries", vec![Expr::name("a"), Expr::name("b")]);
    let out = render(&e, &expr).await.unwrap();
    assert_values(&out[0], &[Some(9.0), None, Some(7.0)]);
}

#[tokio::test]
async fn test_percentile_of_series() {
    let e = engine(
        (1..=5)
            .map(|v| series(&format!("p.s{}", v), &[v as f64]))
            .collect(),
    );
    let expr = Expr::func(
        "percentileOfSeries",
        vec![Expr::name("p.*"), Expr::Const(50.0), Expr::Bool(true)],
    );
    let out = render(&e, &expr).await.unwrap();
    assert_eq!(out[0].name, "percentileOfSeries(p.*,50,true)");
    assert_values(&out[0], &[Some(3.0)]);
}

#[tokio::test]
async fn test_percentile_out_of_range() {
    let e = engine(vec![series("a", &[1.0])]);
    let expr = Expr::func("percentileOfSeries", vec![Expr::name("a"), Expr::Const(101.0)]);
    assert!(matches!(render(&e, &expr).await, Err(Error::InvalidArgument(_))));
}

#[tokio::test]
async fn test_count_values_sentinel() {
    let e = engine(vec![series("c.a", &[1.0, 2.0]), series("c.b", &[3.0, 4.0])]);
    let expr = Expr::func("countValues", vec![Expr::name("c.*"), Expr::Const(2.0)]);
    let out = render(&e, &expr).await.unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].name, "countValues(c.*,2) valuesLimitReached");
    assert!(out[0].is_absent.iter().all(|a| *a));
}

// ============================================================================
// Selection
// ============================================================================

#[tokio::test]
async fn test_lowest_current_fewer_than_n_returns_all() {
    let e = engine(vec![
        series("h.b", &[1.0, 9.0]),
        series("h.a", &[1.0, 3.0]),
    ]);
    let expr = Expr::func("lowestCurrent", vec![Expr::name("h.*"), Expr::Const(5.0)]);
    let out = render(&e, &expr).await.unwrap();
    let names: Vec<&str> = out.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["h.b", "h.a"]);
}

#[tokio::test]
async fn test_highest_average_picks_top() {
    let e = engine(vec![
        series("h.low", &[1.0, 1.0]),
        series("h.mid", &[5.0, 5.0]),
        series("h.top", &[9.0, f64::NAN]),
    ]);
    let expr = Expr::func("highestAverage", vec![Expr::name("h.*"), Expr::Const(2.0)]);
    let out = render(&e, &expr).await.unwrap();
    let names: Vec<&str> = out.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["h.top", "h.mid"]);
}

#[tokio::test]
async fn test_sort_by_minima() {
    let e = engine(vec![
        series("s.a", &[4.0, 2.0]),
        series("s.b", &[3.0, 1.0]),
        series("s.c", &[5.0, 6.0]),
    ]);
    let out = render(&e, &Expr::func("sortByMinima", vec![Expr::name("s.*")]))
        .await
        .unwrap();
    let names: Vec<&str> = out.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["s.b", "s.a", "s.c"]);
}

// ============================================================================
// Windowed and transforms
// ============================================================================

#[tokio::test]
async fn test_pearson_rejects_wildcards() {
    let e = engine(vec![
        series("w.a", &[1.0, 2.0, 3.0]),
        series("w.b", &[1.0, 2.0, 3.0]),
        series("x", &[3.0, 2.0, 1.0]),
    ]);
    let expr = Expr::func(
        "pearson",
        vec![Expr::name("w.*"), Expr::name("x"), Expr::Const(2.0)],
    );
    assert!(matches!(
        render(&e, &expr).await,
        Err(Error::WildcardNotAllowed { index: 0, count: 2, .. })
    ));
}

#[tokio::test]
async fn test_pearson_anticorrelated() {
    let e = engine(vec![series("a", &[1.0, 2.0, 3.0]), series("b", &[3.0, 2.0, 1.0])]);
    let expr = Expr::func("pearson", vec![Expr::name("a"), Expr::name("b"), Expr::Const(3.0)]);
    let out = render(&e, &expr).await.unwrap();
    assert_eq!(out[0].name, "pearson(a,b,3)");
    assert_values(&out[0], &[None, None, Some(-1.0)]);
}

#[tokio::test]
async fn test_stdev_window() {
    let e = engine(vec![series("a", &[1.0, 3.0, 1.0, 3.0])]);
    let expr = Expr::func("stdev", vec![Expr::name("a"), Expr::Const(2.0)]);
    let out = render(&e, &expr).await.unwrap();
    assert_eq!(out[0].name, "stdev(a,2)");
    assert_values(&out[0], &[Some(0.0), Some(1.0), Some(1.0), Some(1.0)]);
}

#[tokio::test]
async fn test_transform_chain() {
    let e = engine(vec![series("a.b.c", &[1.0, f64::NAN])]);
    let expr = Expr::func(
        "aliasByNode",
        vec![
            Expr::func(
                "scale",
                vec![
                    Expr::func("transformNull", vec![Expr::name("a.b.c"), Expr::Const(4.0)]),
                    Expr::Const(2.0),
                ],
            ),
            Expr::Const(1.0),
        ],
    );
    let out = render(&e, &expr).await.unwrap();
    assert_eq!(out[0].name, "b");
    assert_values(&out[0], &[Some(2.0), Some(8.0)]);
}

#[tokio::test]
async fn test_fallback_series() {
    let e = engine(vec![series("backup", &[7.0])]);
    let expr = Expr::func("fallbackSeries", vec![Expr::name("primary.*"), Expr::name("backup")]);
    let out = render(&e, &expr).await.unwrap();
    assert_eq!(out[0].name, "backup");

    let e = engine(vec![series("primary.a", &[1.0]), series("backup", &[7.0])]);
    let out = render(&e, &expr).await.unwrap();
    assert_eq!(out[0].name, "primary.a");
}

// ============================================================================
// Evaluator
// ============================================================================

#[tokio::test]
async fn test_unknown_function() {
    let e = engine(vec![series("a", &[1.0])]);
    let expr = Expr::func("noSuchFunction", vec![Expr::name("a")]);
    assert!(matches!(render(&e, &expr).await, Err(Error::UnknownFunction(_))));
}

#[tokio::test]
async fn test_alias_by_redis_not_registered_by_default() {
    let e = engine(vec![series("a", &[1.0])]);
    let expr = Expr::func("aliasByRedis", vec![Expr::name("a"), Expr::String("h".into())]);
    assert!(matches!(render(&e, &expr).await, Err(Error::UnknownFunction(_))));
}

#[tokio::test]
async fn test_cancelled_context() {
    let e = engine(vec![series("a", &[1.0])]);
    let token = CancellationToken::new();
    token.cancel();
    let ctx = EvalContext::new().with_cancellation(token);
    let expr = Expr::func("sumSeries", vec![Expr::name("a")]);
    assert!(matches!(
        e.render(&ctx, &expr, 0, 60, 0).await,
        Err(Error::Cancelled(_))
    ));
}

#[tokio::test]
async fn test_expired_deadline() {
    let e = engine(vec![series("a", &[1.0])]);
    let ctx = EvalContext::new().with_timeout(Duration::ZERO);
    tokio::time::sleep(Duration::from_millis(1)).await;
    let expr = Expr::func("sumSeries", vec![Expr::name("a")]);
    assert!(matches!(
        e.render(&ctx, &expr, 0, 60, 0).await,
        Err(Error::Timeout(_))
    ));
}
