//! Series alignment
//!
//! Before any multi-series arithmetic the inputs are brought onto one
//! timeline:
//!
//! 1. Differing steps are reconciled, either by linear extrapolation to the
//!    finest step (opt-in) or by consolidating every series to the least
//!    common multiple of the steps.
//! 2. Series starting after the earliest start are left-padded with absent
//!    samples; series stopping before the latest stop are right-padded.
//!
//! Inputs are never modified and never reordered; aligning an already aligned
//! set returns identical buffers.

use crate::config::AlignmentConfig;
use crate::consolidation::{consolidate_values, ConsolidationPolicy};
use crate::types::MetricData;

/// Align `series` onto a common start, stop and step
pub fn align_series(series: &[MetricData], config: AlignmentConfig) -> Vec<MetricData> {
    if series.is_empty() {
        return Vec::new();
    }

    let min_step = series.iter().map(|s| s.step_time).min().unwrap_or(1);
    let steps_differ = series.iter().any(|s| s.step_time != min_step);

    let mut aligned: Vec<MetricData> = if !steps_differ {
        series.to_vec()
    } else if config.extrapolate_points {
        series
            .iter()
            .map(|s| {
                if s.step_time > min_step {
                    extrapolate(s, min_step)
                } else {
                    s.clone()
                }
            })
            .collect()
    } else {
        scale_to_common_step(series)
    };

    pad_to_common_range(&mut aligned);
    aligned
}

/// Left/right pad every series with absent samples to the widest range
fn pad_to_common_range(series: &mut [MetricData]) {
    let min_start = series.iter().map(|s| s.start_time).min().unwrap_or(0);
    let max_stop = series.iter().map(|s| s.stop_time).max().unwrap_or(0);

    for s in series.iter_mut() {
        if s.start_time > min_start {
            let count = ((s.start_time - min_start) / s.step_time) as usize;
            let mut values = vec![f64::NAN; count];
            values.extend_from_slice(&s.values);
            let mut absent = vec![true; count];
            absent.extend_from_slice(&s.is_absent);
            s.values = values;
            s.is_absent = absent;
            s.start_time = min_start;
        }
        if s.stop_time < max_stop {
            let count = ((max_stop - s.stop_time) / s.step_time) as usize;
            s.values.extend(std::iter::repeat(f64::NAN).take(count));
            s.is_absent.extend(std::iter::repeat(true).take(count));
            s.stop_time = max_stop;
        }
    }
}

/// Resample a coarse series to `step` by linear interpolation
///
/// Each synthesized sample lies on the line between the two surrounding
/// coarse samples. When the following coarse sample is absent or missing, the
/// preceding value is held.
pub fn extrapolate(series: &MetricData, step: i64) -> MetricData {
    let span = series.stop_time - series.start_time;
    let count = ((span + step - 1) / step).max(0) as usize;

    let mut values = Vec::with_capacity(count);
    let mut absent = Vec::with_capacity(count);

    for j in 0..count {
        let offset = j as i64 * step;
        let idx = (offset / series.step_time) as usize;
        let frac = (offset % series.step_time) as f64 / series.step_time as f64;

        match (series.value_at(idx), series.value_at(idx + 1)) {
            (Some(v0), Some(v1)) => {
                values.push(v0 + (v1 - v0) * frac);
                absent.push(false);
            },
            (Some(v0), None) => {
                values.push(v0);
                absent.push(false);
            },
            (None, _) => {
                values.push(f64::NAN);
                absent.push(true);
            },
        }
    }

    let mut r = series.derive(series.name.clone(), values, absent);
    r.step_time = step;
    r.stop_time = series.stop_time;
    r
}

/// Consolidate every series to the least common multiple of their steps
///
/// Starts are first moved back to a multiple of the common step (padding with
/// absent samples) so every consolidation bucket lines up.
pub fn scale_to_common_step(series: &[MetricData]) -> Vec<MetricData> {
    let common = series.iter().fold(1i64, |acc, s| lcm(acc, s.step_time));

    series
        .iter()
        .map(|s| {
            let new_start = s.start_time - s.start_time.rem_euclid(common);
            let pad = ((s.start_time - new_start) / s.step_time) as usize;

            let mut values = vec![f64::NAN; pad];
            values.extend_from_slice(&s.values);
            let mut absent = vec![true; pad];
            absent.extend_from_slice(&s.is_absent);

            let vpp = (common / s.step_time) as usize;
            let c = consolidate_values(
                &values,
                &absent,
                new_start,
                s.step_time,
                vpp,
                s.consolidation_func,
                ConsolidationPolicy::default(),
            );

            let mut r = s.derive(s.name.clone(), c.values, c.is_absent);
            r.start_time = new_start;
            r.step_time = common;
            r.stop_time = new_start + r.values.len() as i64 * common;
            r
        })
        .collect()
}

fn gcd(a: i64, b: i64) -> i64 {
    if b == 0 {
        a.abs()
    } else {
        gcd(b, a % b)
    }
}

fn lcm(a: i64, b: i64) -> i64 {
    if a == 0 || b == 0 {
        return a.max(b);
    }
    (a / gcd(a, b)) * b
}
