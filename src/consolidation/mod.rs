//! Display consolidation - reducing one series' resolution
//!
//! When a series carries more samples than the caller can draw, consecutive
//! samples are grouped into buckets of `values_per_point` samples and each
//! bucket is reduced with the series' [`ConsolidationFunc`].
//!
//! Two independent policy flags control bucket placement:
//!
//! - **nudge**: the first bucket starts at the first epoch multiple of the
//!   bucket width at or after the series start. Samples before that boundary
//!   are dropped, never merged into the next bucket. Re-querying a sliding
//!   window therefore yields the same bucket boundaries every time.
//! - **highest timestamp**: each consolidated point is labelled with the last
//!   timestamp of its bucket instead of the first.
//!
//! Every reducer skips NaN and absent samples; a bucket without a
//! contributing sample is absent.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

// ============================================================================
// Consolidation Function
// ============================================================================

/// Reducer applied to each consolidation bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsolidationFunc {
    /// Sum of present samples
    Sum,
    /// Arithmetic mean of present samples
    #[default]
    #[serde(alias = "average")]
    Avg,
    /// Largest present sample
    Max,
    /// Smallest present sample
    Min,
    /// First present sample
    First,
    /// Last present sample
    Last,
}

impl ConsolidationFunc {
    /// Reduce one bucket
    pub fn reduce(&self, values: &[f64], absent: &[bool]) -> Option<f64> {
        match self {
            ConsolidationFunc::Sum => agg_sum(values, absent),
            ConsolidationFunc::Avg => agg_mean(values, absent),
            ConsolidationFunc::Max => agg_max(values, absent),
            ConsolidationFunc::Min => agg_min(values, absent),
            ConsolidationFunc::First => agg_first(values, absent),
            ConsolidationFunc::Last => agg_last(values, absent),
        }
    }

    /// Name used in function arguments and series names
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsolidationFunc::Sum => "sum",
            ConsolidationFunc::Avg => "avg",
            ConsolidationFunc::Max => "max",
            ConsolidationFunc::Min => "min",
            ConsolidationFunc::First => "first",
            ConsolidationFunc::Last => "last",
        }
    }
}

impl fmt::Display for ConsolidationFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConsolidationFunc {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sum" => Ok(ConsolidationFunc::Sum),
            "avg" | "average" => Ok(ConsolidationFunc::Avg),
            "max" => Ok(ConsolidationFunc::Max),
            "min" => Ok(ConsolidationFunc::Min),
            "first" => Ok(ConsolidationFunc::First),
            "last" => Ok(ConsolidationFunc::Last),
            other => Err(Error::InvalidArgument(format!(
                "unknown consolidation function '{}'",
                other
            ))),
        }
    }
}

// ============================================================================
// Bucket Reducers
// ============================================================================

/// Samples that take part in a reduction
fn present<'a>(values: &'a [f64], absent: &'a [bool]) -> impl Iterator<Item = f64> + 'a {
    values
        .iter()
        .zip(absent.iter())
        .filter(|(v, a)| !**a && !v.is_nan())
        .map(|(v, _)| *v)
}

/// Mean of present samples
pub fn agg_mean(values: &[f64], absent: &[bool]) -> Option<f64> {
    let (sum, count) = present(values, absent).fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

/// Sum of present samples
pub fn agg_sum(values: &[f64], absent: &[bool]) -> Option<f64> {
    present(values, absent).fold(None, |acc, v| Some(acc.unwrap_or(0.0) + v))
}

/// Maximum of present samples
pub fn agg_max(values: &[f64], absent: &[bool]) -> Option<f64> {
    present(values, absent).fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |m| m.max(v))))
}

/// Minimum of present samples
pub fn agg_min(values: &[f64], absent: &[bool]) -> Option<f64> {
    present(values, absent).fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |m| m.min(v))))
}

/// First present sample
pub fn agg_first(values: &[f64], absent: &[bool]) -> Option<f64> {
    present(values, absent).next()
}

/// Last present sample
pub fn agg_last(values: &[f64], absent: &[bool]) -> Option<f64> {
    present(values, absent).last()
}

// ============================================================================
// Bucketing
// ============================================================================

/// Bucket placement flags, captured from the engine configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConsolidationPolicy {
    /// Align the first bucket to an epoch multiple of the bucket width
    pub nudge_start_time: bool,
    /// Label each bucket with its last timestamp
    pub highest_timestamp: bool,
}

/// Output of a consolidation pass
#[derive(Debug, Clone, PartialEq)]
pub struct Consolidated {
    /// One value per bucket
    pub values: Vec<f64>,
    /// Absence per bucket
    pub is_absent: Vec<bool>,
    /// Timestamp of the first consolidated point
    pub start_time: i64,
    /// Distance between consolidated points
    pub step_time: i64,
}

/// Number of leading samples dropped so the first bucket starts on an epoch
/// multiple of the bucket width
pub fn nudge_points_count(
    start_time: i64,
    step_time: i64,
    samples: usize,
    values_per_point: usize,
    policy: ConsolidationPolicy,
) -> usize {
    if !policy.nudge_start_time || values_per_point <= 1 || step_time <= 0 {
        return 0;
    }
    // At most two buckets' worth of samples
    if samples <= 2 * values_per_point {
        return 0;
    }

    let bucket = step_time * values_per_point as i64;
    let offset = start_time.rem_euclid(bucket);
    if offset == 0 {
        return 0;
    }
    let gap = bucket - offset;
    let skip = (gap + step_time - 1) / step_time;
    (skip as usize).min(samples)
}

/// Group samples into `values_per_point`-wide buckets and reduce each one
pub fn consolidate_values(
    values: &[f64],
    is_absent: &[bool],
    start_time: i64,
    step_time: i64,
    values_per_point: usize,
    func: ConsolidationFunc,
    policy: ConsolidationPolicy,
) -> Consolidated {
    debug_assert_eq!(values.len(), is_absent.len());

    if values_per_point <= 1 {
        return Consolidated {
            values: values.to_vec(),
            is_absent: is_absent.to_vec(),
            start_time,
            step_time,
        };
    }

    let skip = nudge_points_count(start_time, step_time, values.len(), values_per_point, policy);
    let values = &values[skip..];
    let is_absent = &is_absent[skip..];

    let n_buckets = values.len().div_ceil(values_per_point);
    let mut out_values = Vec::with_capacity(n_buckets);
    let mut out_absent = Vec::with_capacity(n_buckets);

    for (chunk, chunk_absent) in values
        .chunks(values_per_point)
        .zip(is_absent.chunks(values_per_point))
    {
        match func.reduce(chunk, chunk_absent) {
            Some(v) => {
                out_values.push(v);
                out_absent.push(false);
            },
            None => {
                out_values.push(f64::NAN);
                out_absent.push(true);
            },
        }
    }

    let mut first_ts = start_time + skip as i64 * step_time;
    if policy.highest_timestamp {
        first_ts += (values_per_point as i64 - 1) * step_time;
    }

    Consolidated {
        values: out_values,
        is_absent: out_absent,
        start_time: first_ts,
        step_time: step_time * values_per_point as i64,
    }
}

/// Bucket width (in samples) needed to fit `samples` into `max_data_points`
pub fn values_per_point_for(samples: usize, max_data_points: usize) -> usize {
    if max_data_points == 0 || samples <= max_data_points {
        1
    } else {
        samples.div_ceil(max_data_points)
    }
}
