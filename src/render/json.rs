//! Graphite JSON: `[{"target": name, "datapoints": [[value, ts], ...], "tags": {...}}]`
//!
//! Absent points are written as `null`. Values go through `serde_json`, which
//! prints the shortest representation that parses back to the same `f64`.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{MetricData, Tags};

use super::from_points;

#[derive(Debug, Serialize, Deserialize)]
struct JsonSeries {
    target: String,
    datapoints: Vec<(Option<f64>, i64)>,
    #[serde(default, skip_serializing_if = "Tags::is_empty")]
    tags: Tags,
}

/// Serialize consolidated series to JSON
pub fn marshal(series: &mut [MetricData]) -> Result<Vec<u8>> {
    let out: Vec<JsonSeries> = series
        .iter_mut()
        .map(|s| JsonSeries {
            target: s.name.clone(),
            tags: s.tags.clone(),
            datapoints: s
                .aggregated_points()
                .into_iter()
                .map(|(ts, v)| (v.filter(|v| v.is_finite()), ts))
                .collect(),
        })
        .collect();
    serde_json::to_vec(&out).map_err(|e| Error::Decode {
        format: "json",
        message: e.to_string(),
    })
}

/// Parse Graphite JSON
pub fn unmarshal(input: &[u8]) -> Result<Vec<MetricData>> {
    let parsed: Vec<JsonSeries> = serde_json::from_slice(input).map_err(|e| Error::Decode {
        format: "json",
        message: e.to_string(),
    })?;

    parsed
        .into_iter()
        .map(|js| {
            let points: Vec<(i64, Option<f64>)> =
                js.datapoints.into_iter().map(|(v, ts)| (ts, v)).collect();
            let mut s = from_points("json", &js.target, &points, 1)?;
            if !js.tags.is_empty() {
                s.tags = js.tags;
            }
            Ok(s)
        })
        .collect()
}
