//! Property tests for alignment, absence propagation and output formats
//!
//! Uses property-based testing (proptest) over random series with random
//! absence masks.

use proptest::prelude::*;

use kuba_graphite::aggregation::{aggregate_series, align_series, AggregateFunc};
use kuba_graphite::config::AlignmentConfig;
use kuba_graphite::consolidation::{consolidate_values, ConsolidationFunc, ConsolidationPolicy};
use kuba_graphite::render::{marshal, unmarshal, Format};
use kuba_graphite::types::MetricData;

// =============================================================================
// Test Data Strategies
// =============================================================================

/// Finite values, some absent
fn sample() -> impl Strategy<Value = Option<f64>> {
    prop_oneof![
        1 => Just(None),
        3 => (-1e9..1e9f64).prop_map(Some),
        1 => (-1000i32..1000).prop_map(|i| Some(i as f64)),
        1 => (0i32..10000).prop_map(|i| Some(i as f64 / 100.0)),
    ]
}

fn build(name: String, samples: &[Option<f64>], step: i64, start: i64) -> MetricData {
    let values = samples.iter().map(|v| v.unwrap_or(f64::NAN)).collect();
    let absent = samples.iter().map(|v| v.is_none()).collect();
    MetricData::with_absent(name, values, absent, step, start)
}

/// One series on a 10s/20s/30s grid
fn series(max_len: usize) -> impl Strategy<Value = MetricData> {
    (
        prop::sample::select(vec![10i64, 20, 30]),
        0i64..50,
        prop::collection::vec(sample(), 1..max_len),
        "[a-z]{1,8}(\\.[a-z]{1,8}){0,2}",
    )
        .prop_map(|(step, slot, samples, name)| build(name, &samples, step, slot * 60))
}

/// Several series sharing step and start
fn aligned_set() -> impl Strategy<Value = Vec<MetricData>> {
    (1usize..6, 1usize..40).prop_flat_map(|(count, len)| {
        prop::collection::vec(prop::collection::vec(sample(), len), count).prop_map(|sets| {
            sets.iter()
                .enumerate()
                .map(|(i, s)| build(format!("s.{}", i), s, 60, 600))
                .collect()
        })
    })
}

fn same_payload(a: &MetricData, b: &MetricData) -> bool {
    a.start_time == b.start_time
        && a.stop_time == b.stop_time
        && a.step_time == b.step_time
        && a.len() == b.len()
        && (0..a.len()).all(|i| a.value_at(i).map(f64::to_bits) == b.value_at(i).map(f64::to_bits))
}

// =============================================================================
// Alignment
// =============================================================================

proptest! {
    #[test]
    fn prop_alignment_idempotent(set in prop::collection::vec(series(30), 1..5), extrapolate in any::<bool>()) {
        let config = AlignmentConfig { extrapolate_points: extrapolate };
        let once = align_series(&set, config);
        let twice = align_series(&once, config);

        prop_assert_eq!(once.len(), set.len());
        for (a, b) in once.iter().zip(twice.iter()) {
            prop_assert!(same_payload(a, b), "{} changed on second alignment", a.name);
        }
        let steps: Vec<i64> = once.iter().map(|s| s.step_time).collect();
        prop_assert!(steps.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn prop_alignment_keeps_order_and_inputs(set in prop::collection::vec(series(20), 1..5)) {
        let before = set.clone();
        let aligned = align_series(&set, AlignmentConfig::default());
        for ((a, s), b) in aligned.iter().zip(set.iter()).zip(before.iter()) {
            prop_assert_eq!(&a.name, &s.name);
            prop_assert!(same_payload(s, b));
        }
    }
}

// =============================================================================
// Absence propagation
// =============================================================================

proptest! {
    #[test]
    fn prop_aggregate_absent_iff_all_absent(set in aligned_set()) {
        for func in [AggregateFunc::Sum, AggregateFunc::Avg, AggregateFunc::Max, AggregateFunc::Count] {
            let out = aggregate_series("agg", &set, func, AlignmentConfig::default());
            prop_assert_eq!(out.len(), 1);
            let out = &out[0];
            for i in 0..out.len() {
                let all_absent = set.iter().all(|s| s.value_at(i).is_none());
                prop_assert_eq!(out.is_absent[i], all_absent, "{} at {}", func, i);
            }
        }
    }

    #[test]
    fn prop_sum_matches_present_values(set in aligned_set()) {
        let out = aggregate_series("sum", &set, AggregateFunc::Sum, AlignmentConfig::default());
        for i in 0..out[0].len() {
            let present: Vec<f64> = set.iter().filter_map(|s| s.value_at(i)).collect();
            if let Some(v) = out[0].value_at(i) {
                let expected: f64 = present.iter().sum();
                prop_assert!((v - expected).abs() <= 1e-6 * expected.abs().max(1.0));
            }
        }
    }

    #[test]
    fn prop_consolidation_bucket_absent_iff_empty(
        samples in prop::collection::vec(sample(), 1..100),
        vpp in 1usize..8,
    ) {
        let s = build("c".to_string(), &samples, 10, 0);
        for func in [ConsolidationFunc::Avg, ConsolidationFunc::Sum, ConsolidationFunc::Last] {
            let c = consolidate_values(&s.values, &s.is_absent, 0, 10, vpp, func, ConsolidationPolicy::default());
            prop_assert_eq!(c.values.len(), samples.len().div_ceil(vpp));
            for (b, chunk) in samples.chunks(vpp).enumerate() {
                prop_assert_eq!(c.is_absent[b], chunk.iter().all(Option::is_none));
            }
        }
    }
}

// =============================================================================
// Output formats
// =============================================================================

proptest! {
    #[test]
    fn prop_render_round_trip(
        set in prop::collection::vec(
            (prop::collection::vec(sample(), 2..40), 1i64..3600, 0i64..2_000_000_000),
            1..4,
        ),
    ) {
        let originals: Vec<MetricData> = set
            .iter()
            .enumerate()
            .map(|(i, (samples, step, start))| build(format!("metric.{}", i), samples, *step, *start))
            .collect();

        for format in [Format::Json, Format::Raw, Format::Csv] {
            let mut series = originals.clone();
            let bytes = marshal(format, &mut series).unwrap();
            let back = unmarshal(format, &bytes).unwrap();

            prop_assert_eq!(back.len(), originals.len(), "{}", format);
            for (a, b) in originals.iter().zip(back.iter()) {
                prop_assert_eq!(&a.name, &b.name);
                prop_assert!(same_payload(a, b), "{} round trip of {}", format, a.name);
            }
        }
    }
}
