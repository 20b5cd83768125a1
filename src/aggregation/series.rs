//! Cross-series aggregation
//!
//! Reduces many aligned series to one. At each time index only the present
//! samples take part; an index with no present sample is absent in the
//! result.

use std::fmt;
use std::str::FromStr;

use crate::config::AlignmentConfig;
use crate::error::Error;
use crate::stats::percentile;
use crate::types::{MetricData, Tags};

use super::align::align_series;

/// Reducer applied across series at each time index
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AggregateFunc {
    /// Sum
    Sum,
    /// Arithmetic mean
    Avg,
    /// Maximum
    Max,
    /// Minimum
    Min,
    /// Population standard deviation (two-pass)
    Stddev,
    /// Median (interpolated 50th percentile)
    Median,
    /// Product
    Multiply,
    /// First value minus the sum of the others
    Diff,
    /// Max minus min
    Range,
    /// Number of present values
    Count,
    /// First present value
    First,
    /// Last present value
    Last,
    /// Percentile `pN`, not interpolated
    Percentile(f64),
}

impl AggregateFunc {
    /// Reduce the present values at one index (never called with an empty slice)
    pub fn apply(&self, values: &mut [f64]) -> f64 {
        debug_assert!(!values.is_empty());
        let n = values.len() as f64;
        match self {
            AggregateFunc::Sum => values.iter().sum(),
            AggregateFunc::Avg => values.iter().sum::<f64>() / n,
            AggregateFunc::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            AggregateFunc::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            AggregateFunc::Stddev => {
                let mean = values.iter().sum::<f64>() / n;
                let variance = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
                variance.sqrt()
            },
            AggregateFunc::Median => percentile(values, 50.0, true),
            AggregateFunc::Multiply => values.iter().product(),
            AggregateFunc::Diff => values[0] - values[1..].iter().sum::<f64>(),
            AggregateFunc::Range => {
                let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let min = values.iter().copied().fold(f64::INFINITY, f64::min);
                max - min
            },
            AggregateFunc::Count => n,
            AggregateFunc::First => values[0],
            AggregateFunc::Last => values[values.len() - 1],
            AggregateFunc::Percentile(p) => percentile(values, *p, false),
        }
    }
}

impl FromStr for AggregateFunc {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let func = match s {
            "sum" | "total" => AggregateFunc::Sum,
            "avg" | "average" => AggregateFunc::Avg,
            "max" => AggregateFunc::Max,
            "min" => AggregateFunc::Min,
            "stddev" => AggregateFunc::Stddev,
            "median" => AggregateFunc::Median,
            "multiply" => AggregateFunc::Multiply,
            "diff" => AggregateFunc::Diff,
            "range" | "rangeOf" => AggregateFunc::Range,
            "count" => AggregateFunc::Count,
            "first" => AggregateFunc::First,
            "last" | "current" => AggregateFunc::Last,
            other => {
                let p = other
                    .strip_prefix('p')
                    .and_then(|p| p.parse::<f64>().ok())
                    .filter(|p| (0.0..=100.0).contains(p))
                    .ok_or_else(|| {
                        Error::InvalidArgument(format!("unsupported aggregation function: {}", other))
                    })?;
                AggregateFunc::Percentile(p)
            },
        };
        Ok(func)
    }
}

impl fmt::Display for AggregateFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregateFunc::Sum => f.write_str("sum"),
            AggregateFunc::Avg => f.write_str("average"),
            AggregateFunc::Max => f.write_str("max"),
            AggregateFunc::Min => f.write_str("min"),
            AggregateFunc::Stddev => f.write_str("stddev"),
            AggregateFunc::Median => f.write_str("median"),
            AggregateFunc::Multiply => f.write_str("multiply"),
            AggregateFunc::Diff => f.write_str("diff"),
            AggregateFunc::Range => f.write_str("range"),
            AggregateFunc::Count => f.write_str("count"),
            AggregateFunc::First => f.write_str("first"),
            AggregateFunc::Last => f.write_str("last"),
            AggregateFunc::Percentile(p) => write!(f, "p{}", p),
        }
    }
}

/// Aggregate `series` into a single series called `name`
///
/// Returns an empty vector for empty input.
pub fn aggregate_series(
    name: impl Into<String>,
    series: &[MetricData],
    func: AggregateFunc,
    config: AlignmentConfig,
) -> Vec<MetricData> {
    if series.is_empty() {
        return Vec::new();
    }
    let aligned = align_series(series, config);
    aggregate_aligned(name, &aligned, |buf| Some(func.apply(buf)))
}

/// Aggregate already aligned series with a custom reducer over present values
///
/// The reducer returns `None` to mark an index absent.
pub fn aggregate_aligned<F>(name: impl Into<String>, aligned: &[MetricData], mut reduce: F) -> Vec<MetricData>
where
    F: FnMut(&mut [f64]) -> Option<f64>,
{
    let Some(first) = aligned.first() else {
        return Vec::new();
    };
    let len = aligned.iter().map(|s| s.len()).max().unwrap_or(0);

    let mut values = Vec::with_capacity(len);
    let mut absent = Vec::with_capacity(len);
    let mut buf = Vec::with_capacity(aligned.len());

    for i in 0..len {
        buf.clear();
        buf.extend(aligned.iter().filter_map(|s| s.value_at(i)));
        let reduced = if buf.is_empty() { None } else { reduce(&mut buf) };
        match reduced {
            Some(v) => {
                values.push(v);
                absent.push(false);
            },
            None => {
                values.push(f64::NAN);
                absent.push(true);
            },
        }
    }

    let name = name.into();
    let mut r = first.derive(name.clone(), values, absent);
    r.tags = common_tags(aligned);
    r.tags.insert("name".to_string(), name);
    vec![r]
}

/// Tags shared with identical values by every series
pub fn common_tags(series: &[MetricData]) -> Tags {
    let Some(first) = series.first() else {
        return Tags::new();
    };
    first
        .tags
        .iter()
        .filter(|(k, v)| series[1..].iter().all(|s| s.tags.get(*k) == Some(*v)))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}
