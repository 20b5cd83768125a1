//! Integration tests for the structural functions and display consolidation
//!
//! Covers version-aware time shifting, the heat-map reorder, Holt-Winters
//! window handling and nudge stability under sliding windows.

use std::sync::Arc;

use kuba_graphite::config::EngineConfig;
use kuba_graphite::error::Error;
use kuba_graphite::expr::{Engine, EvalContext, Expr, InMemoryFetcher};
use kuba_graphite::functions::FunctionRegistry;
use kuba_graphite::types::MetricData;

// ============================================================================
// Helper Functions
// ============================================================================

fn engine_with(config: EngineConfig, series: Vec<MetricData>) -> Engine {
    let registry = Arc::new(FunctionRegistry::with_defaults(&config));
    Engine::new(registry, Arc::new(InMemoryFetcher::new(series)), config)
}

fn engine(series: Vec<MetricData>) -> Engine {
    engine_with(EngineConfig::default(), series)
}

/// Mark present from index 0 up to and including `last`
fn mark(name: &str, last: usize, len: usize) -> MetricData {
    let values = (0..len)
        .map(|i| if i <= last { 1.0 } else { f64::NAN })
        .collect();
    MetricData::new(name, values, 1, 0)
}

// ============================================================================
// timeShiftByMetric
// ============================================================================

#[tokio::test]
async fn test_time_shift_worked_example() {
    let len = 10;
    let mut series = Vec::new();
    // 1_0..1_3 released at 0..3, 2_0..2_2 at 4..6, 3_0..3_1 at 7..8
    for minor in 0..=3 {
        series.push(mark(&format!("marks.1_{}", minor), minor, len));
    }
    for minor in 0..=2 {
        series.push(mark(&format!("marks.2_{}", minor), 4 + minor, len));
    }
    for minor in 0..=1 {
        series.push(mark(&format!("marks.3_{}", minor), 7 + minor, len));
    }
    for version in ["1_3", "2_2", "3_1"] {
        series.push(MetricData::new(
            format!("apps.{}.requests", version),
            vec![1.0; len],
            1,
            0,
        ));
    }

    let e = engine(series);
    let expr = Expr::func(
        "timeShiftByMetric",
        vec![Expr::name("apps.*.requests"), Expr::name("marks.*"), Expr::Const(1.0)],
    );
    let out = e
        .render(&EvalContext::new(), &expr, 0, len as i64, 0)
        .await
        .unwrap();

    let shifts: Vec<(String, i64)> = out.iter().map(|s| (s.name.clone(), s.start_time)).collect();
    assert_eq!(
        shifts,
        vec![
            ("timeShiftByMetric(apps.1_3.requests)".to_string(), 5),
            ("timeShiftByMetric(apps.2_2.requests)".to_string(), 2),
            ("timeShiftByMetric(apps.3_1.requests)".to_string(), 0),
        ]
    );
    assert_eq!(out[0].stop_time, 15);
}

#[tokio::test]
async fn test_time_shift_drops_unversioned() {
    let len = 4;
    let series = vec![
        mark("marks.1_0", 1, len),
        mark("marks.2_0", 3, len),
        MetricData::new("apps.1_0.x", vec![1.0; len], 1, 0),
        MetricData::new("apps.latest.x", vec![1.0; len], 1, 0),
    ];
    let e = engine(series);
    let expr = Expr::func(
        "timeShiftByMetric",
        vec![Expr::name("apps.*.x"), Expr::name("marks.*"), Expr::Const(1.0)],
    );
    let out = e.render(&EvalContext::new(), &expr, 0, 4, 0).await.unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].start_time, 2);
}

#[tokio::test]
async fn test_time_shift_needs_two_marks() {
    let series = vec![
        mark("marks.1_0", 1, 4),
        MetricData::new("apps.1_0.x", vec![1.0; 4], 1, 0),
        MetricData::new("apps.2_0.x", vec![1.0; 4], 1, 0),
    ];
    let e = engine(series);
    let expr = Expr::func(
        "timeShiftByMetric",
        vec![Expr::name("apps.*.x"), Expr::name("marks.*"), Expr::Const(1.0)],
    );
    assert!(matches!(
        e.render(&EvalContext::new(), &expr, 0, 4, 0).await,
        Err(Error::TooFewDatasets { got: 1, .. })
    ));
}

// ============================================================================
// heatMap
// ============================================================================

#[tokio::test]
async fn test_heat_map_scenario() {
    let series = vec![
        MetricData::new("a3", vec![30.0, 30.0, 30.0, 30.0, 30.0, 31.0], 1, 0),
        MetricData::new("a1", vec![1.0, 1.0, 1.0, 1.0, 1.0, f64::NAN], 1, 0),
        MetricData::new("a2", vec![10.0, 12.0, 10.0, 10.0, 10.0, 10.0], 1, 0),
    ];
    let e = engine(series);
    let expr = Expr::func("heatMap", vec![Expr::name("a*")]);
    let out = e.render(&EvalContext::new(), &expr, 0, 6, 0).await.unwrap();

    assert_eq!(out.len(), 2);
    assert_eq!(out[0].name, "heatMap(a2,a1)");
    assert_eq!(out[1].name, "heatMap(a3,a2)");
    assert_eq!(out[0].value_at(1), Some(11.0));
    assert_eq!(out[0].value_at(5), None);
    assert_eq!(out[1].value_at(1), Some(18.0));
    assert_eq!(out[1].value_at(5), Some(21.0));
}

#[tokio::test]
async fn test_heat_map_shape_mismatch() {
    let series = vec![
        MetricData::new("a1", vec![1.0, 2.0], 1, 0),
        MetricData::new("a2", vec![1.0, 2.0, 3.0], 1, 0),
    ];
    let e = engine(series);
    let expr = Expr::func("heatMap", vec![Expr::name("a*")]);
    let err = e.render(&EvalContext::new(), &expr, 0, 3, 0).await.unwrap_err();
    assert_eq!(err.to_string(), "StopTime differs: 2 != 3");
}

// ============================================================================
// Holt-Winters
// ============================================================================

const HOUR: i64 = 3600;
const DAY: i64 = 24 * HOUR;

fn daily_wave(days: i64) -> MetricData {
    let values = (0..days * 24)
        .map(|i| 10.0 + (i % 24) as f64)
        .collect();
    MetricData::new("web.requests", values, HOUR, 0)
}

#[tokio::test]
async fn test_forecast_trims_bootstrap() {
    let e = engine(vec![daily_wave(4)]);
    let expr = Expr::func(
        "holtWintersForecast",
        vec![Expr::name("web.requests"), Expr::String("1d".into())],
    );
    let out = e
        .render(&EvalContext::new(), &expr, 2 * DAY, 4 * DAY, 0)
        .await
        .unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].name, "holtWintersForecast(web.requests)");
    assert_eq!(out[0].start_time, 2 * DAY);
    assert_eq!(out[0].len(), 48);
    assert_eq!(out[0].stop_time, 4 * DAY);
}

#[tokio::test]
async fn test_confidence_bands_are_stacked() {
    let e = engine(vec![daily_wave(4)]);
    let expr = Expr::func(
        "holtWintersConfidenceBands",
        vec![
            Expr::name("web.requests"),
            Expr::Const(3.0),
            Expr::String("1d".into()),
        ],
    );
    let out = e
        .render(&EvalContext::new(), &expr, 2 * DAY, 4 * DAY, 0)
        .await
        .unwrap();
    assert_eq!(out.len(), 2);
    assert_eq!(out[0].name, "holtWintersConfidenceLower(web.requests)");
    assert_eq!(out[1].name, "holtWintersConfidenceUpper(web.requests)");
    for s in &out {
        assert!(s.graph_options.stacked);
        assert_eq!(s.graph_options.stack_name, "holtWintersConfidenceBands(web.requests)");
        assert_eq!(s.start_time, 2 * DAY);
    }
    for i in 0..out[0].len() {
        if let (Some(l), Some(u)) = (out[0].value_at(i), out[1].value_at(i)) {
            assert!(l <= u);
        }
    }
}

#[tokio::test]
async fn test_confidence_area_unsupported() {
    let e = engine(vec![daily_wave(2)]);
    let expr = Expr::func("holtWintersConfidenceArea", vec![Expr::name("web.requests")]);
    assert!(matches!(
        e.render(&EvalContext::new(), &expr, DAY, 2 * DAY, 0).await,
        Err(Error::UnsupportedBuild(_))
    ));
}

// ============================================================================
// Consolidation
// ============================================================================

#[tokio::test]
async fn test_nudge_stable_across_sliding_windows() {
    let mut config = EngineConfig::default();
    config.consolidation.nudge_start_time_on_aggregation = true;
    let values = (0..200).map(|i| i as f64).collect();
    let e = engine_with(config, vec![MetricData::new("m", values, 10, 0)]);

    // 30 samples per window, 10 points requested: buckets are 30s wide
    for k in 0..40 {
        let from = k * 10;
        let until = from + 300;
        let mut out = e
            .render(&EvalContext::new(), &Expr::name("m"), from, until, 10)
            .await
            .unwrap();
        let s = &mut out[0];
        assert_eq!(s.aggregated_time_step(), 30);

        for (ts, v) in s.aggregated_points() {
            assert_eq!(ts % 30, 0, "window starting at {}", from);
            if ts + 30 <= until {
                assert_eq!(v, Some((ts / 10 + 1) as f64), "bucket {} of window {}", ts, from);
            }
        }
    }
}

#[tokio::test]
async fn test_consolidation_without_nudge_follows_window() {
    let values = (0..60).map(|i| i as f64).collect();
    let e = engine(vec![MetricData::new("m", values, 10, 0)]);
    let mut out = e
        .render(&EvalContext::new(), &Expr::name("m"), 10, 310, 10)
        .await
        .unwrap();
    assert_eq!(out[0].aggregated_start_time(), 10);
    assert_eq!(out[0].aggregated_values()[0], 2.0);
}
