//! Core data types used throughout the function engine
//!
//! # Key Types
//!
//! - **`MetricData`**: one time series (name, tags, timeline, values, absence mask)
//! - **`MetricRequest`**: key identifying one fetch (`pattern`, `from`, `until`)
//! - **`FetchedValues`**: the binding map from requests to fetched series
//! - **`Tags`**: tag set of a series, always carrying a `name` entry
//!
//! # Example
//!
//! ```rust
//! use kuba_graphite::types::MetricData;
//!
//! let series = MetricData::new("cpu.load", vec![1.0, f64::NAN, 3.0], 60, 0);
//! assert_eq!(series.stop_time, 180);
//! assert!(series.is_absent[1]);
//! assert_eq!(series.tags["name"], "cpu.load");
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::consolidation::{
    consolidate_values, values_per_point_for, Consolidated, ConsolidationFunc,
    ConsolidationPolicy,
};

/// Tag set of a series
pub type Tags = BTreeMap<String, String>;

/// Binding map from fetch requests to the series they produced
pub type FetchedValues = HashMap<MetricRequest, Vec<MetricData>>;

/// Key identifying a single fetch of a metric pattern over a time window
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MetricRequest {
    /// Metric name or glob pattern
    pub pattern: String,
    /// Window start, epoch seconds (inclusive)
    pub from: i64,
    /// Window end, epoch seconds (exclusive)
    pub until: i64,
}

impl MetricRequest {
    /// Create a new request key
    pub fn new(pattern: impl Into<String>, from: i64, until: i64) -> Self {
        Self {
            pattern: pattern.into(),
            from,
            until,
        }
    }
}

/// Rendering hints carried alongside a series
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphOptions {
    /// Draw this series stacked on the others sharing `stack_name`
    pub stacked: bool,
    /// Stack group name
    pub stack_name: String,
}

/// A single time series
///
/// `values` and `is_absent` are parallel: an absent sample is "no data" even
/// when the stored float is a regular number. Functions never modify a series
/// they received; they build a new one with [`MetricData::derive`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricData {
    /// Display name
    pub name: String,
    /// Tags, always containing `name`
    pub tags: Tags,
    /// First timestamp, epoch seconds
    pub start_time: i64,
    /// End of the half-open window, epoch seconds
    pub stop_time: i64,
    /// Seconds per sample
    pub step_time: i64,
    /// Samples
    pub values: Vec<f64>,
    /// Absence mask, parallel to `values`
    pub is_absent: Vec<bool>,
    /// Reducer used by display consolidation
    pub consolidation_func: ConsolidationFunc,
    /// Samples per consolidated point (1 = no consolidation)
    pub values_per_point: usize,
    /// Rendering hints
    #[serde(default)]
    pub graph_options: GraphOptions,
    /// Bucket placement captured when consolidation was requested
    #[serde(skip)]
    policy: ConsolidationPolicy,
    /// Lazily computed consolidation result
    #[serde(skip)]
    aggregated: Option<Consolidated>,
}

impl MetricData {
    /// Build a series from raw values; NaN samples are marked absent
    pub fn new(name: impl Into<String>, values: Vec<f64>, step_time: i64, start_time: i64) -> Self {
        let is_absent = values.iter().map(|v| v.is_nan()).collect();
        Self::with_absent(name, values, is_absent, step_time, start_time)
    }

    /// Build a series with an explicit absence mask
    pub fn with_absent(
        name: impl Into<String>,
        values: Vec<f64>,
        is_absent: Vec<bool>,
        step_time: i64,
        start_time: i64,
    ) -> Self {
        debug_assert_eq!(values.len(), is_absent.len());
        debug_assert!(step_time > 0);
        let name = name.into();
        let stop_time = start_time + values.len() as i64 * step_time;
        Self {
            tags: extract_tags(&name),
            name,
            start_time,
            stop_time,
            step_time,
            values,
            is_absent,
            consolidation_func: ConsolidationFunc::default(),
            values_per_point: 1,
            graph_options: GraphOptions::default(),
            policy: ConsolidationPolicy::default(),
            aggregated: None,
        }
    }

    /// Derive a new series from this one: tags, timeline and consolidation
    /// settings are copied, name and payload replaced
    pub fn derive(&self, name: impl Into<String>, values: Vec<f64>, is_absent: Vec<bool>) -> Self {
        debug_assert_eq!(values.len(), is_absent.len());
        Self {
            name: name.into(),
            tags: self.tags.clone(),
            start_time: self.start_time,
            stop_time: self.start_time + values.len() as i64 * self.step_time,
            step_time: self.step_time,
            values,
            is_absent,
            consolidation_func: self.consolidation_func,
            values_per_point: 1,
            graph_options: GraphOptions::default(),
            policy: ConsolidationPolicy::default(),
            aggregated: None,
        }
    }

    /// Copy of this series under another name, sharing nothing mutable
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        let mut r = self.clone();
        r.name = name.into();
        r
    }

    /// Number of samples
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when the series holds no samples
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Sample value, `None` when absent or out of range
    #[inline]
    pub fn value_at(&self, index: usize) -> Option<f64> {
        match (self.values.get(index), self.is_absent.get(index)) {
            (Some(v), Some(false)) => Some(*v),
            _ => None,
        }
    }

    /// Present samples in order
    pub fn present_values(&self) -> impl Iterator<Item = f64> + '_ {
        (0..self.len()).filter_map(move |i| self.value_at(i))
    }

    /// Set the consolidation factor, invalidating cached aggregated values
    pub fn set_values_per_point(&mut self, values_per_point: usize, policy: ConsolidationPolicy) {
        self.values_per_point = values_per_point.max(1);
        self.policy = policy;
        self.aggregated = None;
    }

    /// Request display consolidation down to at most `max_data_points`
    pub fn consolidate(&mut self, max_data_points: usize, policy: ConsolidationPolicy) {
        let vpp = values_per_point_for(self.len(), max_data_points);
        self.set_values_per_point(vpp, policy);
    }

    fn ensure_aggregated(&mut self) -> &Consolidated {
        let Self {
            values,
            is_absent,
            start_time,
            step_time,
            values_per_point,
            consolidation_func,
            policy,
            aggregated,
            ..
        } = self;
        aggregated.get_or_insert_with(|| {
            consolidate_values(
                values,
                is_absent,
                *start_time,
                *step_time,
                *values_per_point,
                *consolidation_func,
                *policy,
            )
        })
    }

    /// Consolidated values (computed once per consolidation factor)
    pub fn aggregated_values(&mut self) -> &[f64] {
        &self.ensure_aggregated().values
    }

    /// Consolidated absence mask
    pub fn aggregated_absent(&mut self) -> &[bool] {
        &self.ensure_aggregated().is_absent
    }

    /// Timestamp of the first consolidated point
    pub fn aggregated_start_time(&mut self) -> i64 {
        self.ensure_aggregated().start_time
    }

    /// Distance between consolidated points
    pub fn aggregated_time_step(&self) -> i64 {
        self.step_time * self.values_per_point.max(1) as i64
    }

    /// Consolidated points as `(timestamp, Option<value>)`
    pub fn aggregated_points(&mut self) -> Vec<(i64, Option<f64>)> {
        let c = self.ensure_aggregated();
        c.values
            .iter()
            .zip(c.is_absent.iter())
            .enumerate()
            .map(|(i, (v, a))| {
                let ts = c.start_time + i as i64 * c.step_time;
                (ts, if *a { None } else { Some(*v) })
            })
            .collect()
    }
}

/// Split a Graphite tagged name (`a.b;k=v;k2=v2`) into its tag set
///
/// The returned map always carries `name`.
pub fn extract_tags(name: &str) -> Tags {
    let mut tags = Tags::new();
    let mut parts = name.split(';');
    let metric = parts.next().unwrap_or_default();
    for part in parts {
        if let Some((k, v)) = part.split_once('=') {
            if !k.is_empty() {
                tags.insert(k.to_string(), v.to_string());
            }
        }
    }
    tags.insert("name".to_string(), metric.to_string());
    tags
}

/// Graphite glob characters that make a pattern match several series
pub fn is_wildcard(pattern: &str) -> bool {
    pattern.contains(['*', '?', '[', '{'])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_marks_nan_absent() {
        let s = MetricData::new("a", vec![1.0, f64::NAN, 2.0], 10, 100);
        assert_eq!(s.is_absent, vec![false, true, false]);
        assert_eq!(s.stop_time, 130);
        assert_eq!(s.value_at(1), None);
        assert_eq!(s.value_at(2), Some(2.0));
        assert_eq!(s.value_at(3), None);
    }

    #[test]
    fn test_absent_independent_of_value() {
        let s = MetricData::with_absent("a", vec![0.0, 5.0], vec![true, false], 1, 0);
        assert_eq!(s.present_values().collect::<Vec<_>>(), vec![5.0]);
    }

    #[test]
    fn test_derive_copies_metadata() {
        let mut src = MetricData::new("cpu;host=a", vec![1.0, 2.0], 60, 0);
        src.consolidation_func = ConsolidationFunc::Max;
        let d = src.derive("scale(cpu,2)", vec![2.0, 4.0], vec![false, false]);
        assert_eq!(d.tags["host"], "a");
        assert_eq!(d.tags["name"], "cpu");
        assert_eq!(d.consolidation_func, ConsolidationFunc::Max);
        assert_eq!(d.stop_time, 120);
        // source untouched
        assert_eq!(src.values, vec![1.0, 2.0]);
    }

    #[test]
    fn test_extract_tags() {
        let tags = extract_tags("disk.used;dc=east;rack=a1");
        assert_eq!(tags.len(), 3);
        assert_eq!(tags["name"], "disk.used");
        assert_eq!(tags["dc"], "east");

        let tags = extract_tags("plain.metric");
        assert_eq!(tags.len(), 1);
    }

    #[test]
    fn test_is_wildcard() {
        assert!(is_wildcard("a.*.c"));
        assert!(is_wildcard("a.{b,c}"));
        assert!(!is_wildcard("a.b.c"));
    }

    #[test]
    fn test_request_equality_is_structural() {
        let mut map = FetchedValues::new();
        map.insert(MetricRequest::new("a.b", 0, 60), vec![]);
        assert!(map.contains_key(&MetricRequest::new("a.b".to_string(), 0, 60)));
        assert!(!map.contains_key(&MetricRequest::new("a.b", 0, 61)));
    }

    #[test]
    fn test_consolidate_lazily() {
        let mut s = MetricData::new("a", (0..10).map(|v| v as f64).collect(), 10, 0);
        s.consolidate(5, ConsolidationPolicy::default());
        assert_eq!(s.values_per_point, 2);
        assert_eq!(s.aggregated_values(), &[0.5, 2.5, 4.5, 6.5, 8.5]);
        assert_eq!(s.aggregated_time_step(), 20);

        s.consolidate(0, ConsolidationPolicy::default());
        assert_eq!(s.aggregated_values().len(), 10);
    }
}
