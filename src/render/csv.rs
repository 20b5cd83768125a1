//! CSV: one line per point, `name,YYYY-MM-DD HH:MM:SS,value`
//!
//! Timestamps are UTC. Absent points have an empty value column. Consecutive
//! lines with the same name belong to one series.

use chrono::{DateTime, NaiveDateTime};
use std::fmt::Write;

use crate::error::{Error, Result};
use crate::types::MetricData;

use super::from_points;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn malformed(line: usize, message: impl Into<String>) -> Error {
    Error::Decode {
        format: "csv",
        message: format!("line {}: {}", line + 1, message.into()),
    }
}

/// Serialize consolidated series to CSV
pub fn marshal(series: &mut [MetricData]) -> String {
    let mut out = String::new();
    for s in series.iter_mut() {
        for (ts, v) in s.aggregated_points() {
            let Some(when) = DateTime::from_timestamp(ts, 0) else {
                continue;
            };
            let _ = write!(out, "{},{},", s.name, when.format(TIME_FORMAT));
            if let Some(v) = v {
                let _ = write!(out, "{}", v);
            }
            out.push('\n');
        }
    }
    out
}

/// Parse CSV written by [`marshal`]
///
/// A series with a single point gets a one second step.
pub fn unmarshal(input: &str) -> Result<Vec<MetricData>> {
    let mut groups: Vec<(String, Vec<(i64, Option<f64>)>)> = Vec::new();

    for (lineno, line) in input.lines().enumerate() {
        if line.is_empty() {
            continue;
        }
        let mut fields = line.rsplitn(3, ',');
        let value = fields.next().unwrap_or_default();
        let (Some(time), Some(name)) = (fields.next(), fields.next()) else {
            return Err(malformed(lineno, "expected name,time,value"));
        };

        let ts = NaiveDateTime::parse_from_str(time, TIME_FORMAT)
            .map_err(|e| malformed(lineno, format!("time {:?}: {}", time, e)))?
            .and_utc()
            .timestamp();
        let value = if value.is_empty() {
            None
        } else {
            Some(
                value
                    .parse::<f64>()
                    .map_err(|e| malformed(lineno, format!("value {:?}: {}", value, e)))?,
            )
        };

        match groups.last_mut() {
            Some((last, points)) if last == name => points.push((ts, value)),
            _ => groups.push((name.to_string(), vec![(ts, value)])),
        }
    }

    groups
        .iter()
        .map(|(name, points)| from_points("csv", name, points, 1))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marshal_lines() {
        let mut series = vec![MetricData::new("a", vec![1.5, f64::NAN], 60, 1_700_000_000)];
        assert_eq!(
            marshal(&mut series),
            "a,2023-11-14 22:13:20,1.5\na,2023-11-14 22:14:20,\n"
        );
    }

    #[test]
    fn test_groups_by_name() {
        let input = "a,1970-01-01 00:00:00,1\na,1970-01-01 00:00:10,\nb,1970-01-01 00:00:00,7\n";
        let series = unmarshal(input).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].step_time, 10);
        assert_eq!(series[0].is_absent, vec![false, true]);
        assert_eq!(series[1].name, "b");
        assert_eq!(series[1].step_time, 1);
    }

    #[test]
    fn test_bad_time() {
        assert!(unmarshal("a,yesterday,1\n").is_err());
        assert!(unmarshal("justonefield\n").is_err());
    }
}
