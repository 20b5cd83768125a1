use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;

use kuba_graphite::aggregation::{aggregate_series, AggregateFunc};
use kuba_graphite::config::{AlignmentConfig, EngineConfig};
use kuba_graphite::consolidation::ConsolidationPolicy;
use kuba_graphite::expr::{Engine, EvalContext, Expr, InMemoryFetcher};
use kuba_graphite::functions::FunctionRegistry;
use kuba_graphite::stats::percentile;
use kuba_graphite::types::MetricData;

fn create_series(count: usize, points: usize) -> Vec<MetricData> {
    (0..count)
        .map(|s| {
            let values = (0..points)
                .map(|i| {
                    if (i + s) % 17 == 0 {
                        f64::NAN
                    } else {
                        100.0 + ((i * 31 + s * 7) % 97) as f64 * 0.5
                    }
                })
                .collect();
            MetricData::new(format!("bench.host{}.cpu", s), values, 60, 0)
        })
        .collect()
}

fn bench_aggregate(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregate_series");

    for count in [10, 100, 1000].iter() {
        let series = create_series(*count, 1440);

        group.bench_with_input(BenchmarkId::new("sum", count), count, |b, _| {
            b.iter(|| {
                black_box(aggregate_series(
                    "sumSeries(bench.*.cpu)",
                    &series,
                    AggregateFunc::Sum,
                    AlignmentConfig::default(),
                ))
            });
        });
        group.bench_with_input(BenchmarkId::new("p95", count), count, |b, _| {
            b.iter(|| {
                black_box(aggregate_series(
                    "p95Series(bench.*.cpu)",
                    &series,
                    AggregateFunc::Percentile(95.0),
                    AlignmentConfig::default(),
                ))
            });
        });
    }

    group.finish();
}

fn bench_consolidation(c: &mut Criterion) {
    let mut group = c.benchmark_group("consolidation");
    let policy = ConsolidationPolicy {
        nudge_start_time: true,
        highest_timestamp: false,
    };

    for points in [1_000, 10_000, 100_000].iter() {
        let series = create_series(1, *points).remove(0);

        group.bench_with_input(BenchmarkId::from_parameter(points), points, |b, _| {
            b.iter(|| {
                let mut s = series.clone();
                s.consolidate(800, policy);
                black_box(s.aggregated_values().len())
            });
        });
    }

    group.finish();
}

fn bench_percentile(c: &mut Criterion) {
    let mut group = c.benchmark_group("percentile");

    for size in [100, 10_000].iter() {
        let data: Vec<f64> = (0..*size).map(|i| ((i * 7919) % 1009) as f64).collect();

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                let mut buf = data.clone();
                black_box(percentile(&mut buf, 99.0, true))
            });
        });
    }

    group.finish();
}

fn bench_engine(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let config = EngineConfig::default();
    let registry = Arc::new(FunctionRegistry::with_defaults(&config));
    let fetcher = Arc::new(InMemoryFetcher::new(create_series(50, 1440)));
    let engine = Engine::new(registry, fetcher, config);

    let expr = Expr::func(
        "highestAverage",
        vec![
            Expr::func("scale", vec![Expr::name("bench.*.cpu"), Expr::Const(2.0)]),
            Expr::Const(5.0),
        ],
    );

    c.bench_function("engine_render_highest_average", |b| {
        b.iter(|| {
            rt.block_on(async {
                black_box(
                    engine
                        .render(&EvalContext::new(), &expr, 0, 1440 * 60, 800)
                        .await
                        .unwrap(),
                )
            })
        });
    });
}

criterion_group!(
    benches,
    bench_aggregate,
    bench_consolidation,
    bench_percentile,
    bench_engine
);
criterion_main!(benches);
