//! `timeShiftByMetric(seriesList, markSource, versionRankIndex)`
//!
//! Shifts each metric so that the releases of different major versions line
//! up. Every mark series carries a `MAJOR_MINOR` token in its name and is
//! present up to the moment that version shipped. For every major the
//! highest-minor mark is kept (the leading mark); its last present index is
//! the release position. A metric belonging to a major is shifted forward by
//! the distance between its release and the latest release.

use async_trait::async_trait;
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

use crate::config::EngineConfig;
use crate::error::{ConfigError, Error, Result};
use crate::expr::{get_series_arg, EvalContext, Evaluator, Expr};
use crate::types::{FetchedValues, MetricData};

use super::description::{describe_all, FunctionDescription, FunctionParam, FunctionType};
use super::{Function, FunctionMetadata};

/// Register `timeShiftByMetric`
pub fn new(_config: &EngineConfig) -> std::result::Result<Vec<FunctionMetadata>, ConfigError> {
    let version = Regex::new(r"(\d+)_(\d+)")
        .map_err(|e| ConfigError::Invalid(format!("version pattern: {}", e)))?;
    Ok(vec![FunctionMetadata::new(
        "timeShiftByMetric",
        Arc::new(TimeShiftByMetric { version }),
    )])
}

/// Version-aware time shift
pub struct TimeShiftByMetric {
    version: Regex,
}

/// Release position of the leading mark of one major version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionMark {
    /// Minor version of the leading mark
    pub minor: u64,
    /// Last present index
    pub position: usize,
}

/// Reject inputs the shift cannot be computed for; returns the common step
pub fn validate(marks: &[MetricData], metrics: &[MetricData]) -> Result<i64> {
    let mut points: Option<usize> = None;
    let mut step: Option<i64> = None;

    for (dataset, list) in [("marks", marks), ("metrics", metrics)] {
        if list.len() < 2 {
            return Err(Error::TooFewDatasets {
                dataset: dataset.to_string(),
                got: list.len(),
            });
        }
        for s in list {
            match points {
                None if s.is_empty() => return Err(Error::EmptySeries(s.name.clone())),
                None => points = Some(s.len()),
                Some(expected) if expected != s.len() => {
                    return Err(Error::MismatchedSeriesLength {
                        name: s.name.clone(),
                        got: s.len(),
                        expected,
                    })
                },
                Some(_) => {},
            }
            match step {
                None => step = Some(s.step_time),
                Some(expected) if expected != s.step_time => {
                    return Err(Error::MismatchedStep {
                        name: s.name.clone(),
                        got: s.step_time,
                        expected,
                    })
                },
                Some(_) => {},
            }
        }
    }
    Ok(step.unwrap_or(1))
}

impl TimeShiftByMetric {
    /// Leading mark per major version
    pub fn leading_marks(&self, marks: &[MetricData]) -> Result<BTreeMap<u64, VersionMark>> {
        let mut by_major: BTreeMap<u64, VersionMark> = BTreeMap::new();

        for mark in marks {
            let Some(caps) = self.version.captures(&mark.name) else {
                debug!(mark = %mark.name, "mark has no version token");
                continue;
            };
            let (Ok(major), Ok(minor)) = (caps[1].parse::<u64>(), caps[2].parse::<u64>()) else {
                continue;
            };
            let Some(position) = (0..mark.len()).rev().find(|&i| mark.value_at(i).is_some()) else {
                debug!(mark = %mark.name, "mark has no present sample");
                continue;
            };

            let candidate = VersionMark { minor, position };
            by_major
                .entry(major)
                .and_modify(|m| {
                    if minor > m.minor {
                        *m = candidate;
                    }
                })
                .or_insert(candidate);
        }

        if by_major.len() < 2 {
            return Err(Error::TooFewVersionMarks(by_major.len()));
        }
        Ok(by_major)
    }
}

/// Seconds each major version has to move forward
pub fn offsets(marks: &BTreeMap<u64, VersionMark>, step: i64) -> BTreeMap<String, i64> {
    let top = marks.values().map(|m| m.position).max().unwrap_or(0);
    marks
        .iter()
        .map(|(major, m)| (major.to_string(), (top - m.position) as i64 * step))
        .collect()
}

/// Offset for a version token: exact major first, then the longest major
/// that prefixes the token and is followed by a non-digit
pub fn offset_for(token: &str, offsets: &BTreeMap<String, i64>) -> Option<i64> {
    if let Some(o) = offsets.get(token) {
        return Some(*o);
    }
    offsets
        .iter()
        .filter(|(major, _)| {
            token.starts_with(major.as_str())
                && token[major.len()..]
                    .chars()
                    .next()
                    .map_or(false, |c| !c.is_ascii_digit())
        })
        .max_by_key(|(major, _)| major.len())
        .map(|(_, o)| *o)
}

#[async_trait]
impl Function for TimeShiftByMetric {
    fn description(&self) -> HashMap<String, FunctionDescription> {
        describe_all(
            &["timeShiftByMetric"],
            FunctionDescription::new(
                "timeShiftByMetric",
                "timeShiftByMetric(seriesList, markSource, versionRankIndex)",
                "Transform",
                "Takes a seriesList, a list of version marks and the index of the version node in metric names, and shifts every metric so that releases of different major versions line up.",
            )
            .param(FunctionParam::new("seriesList", FunctionType::SeriesList).required())
            .param(FunctionParam::new("markSource", FunctionType::SeriesList).required())
            .param(FunctionParam::new("versionRankIndex", FunctionType::Integer).required())
            .series_change()
            .name_change(),
        )
    }

    async fn call(
        &self,
        ctx: &EvalContext,
        eval: &dyn Evaluator,
        expr: &Expr,
        from: i64,
        until: i64,
        values: &FetchedValues,
    ) -> Result<Vec<MetricData>> {
        let metrics_arg = expr
            .arg(0)
            .ok_or_else(|| Error::missing_argument(expr.target(), "seriesList"))?;
        let marks_arg = expr
            .arg(1)
            .ok_or_else(|| Error::missing_argument(expr.target(), "markSource"))?;
        let metrics = get_series_arg(ctx, eval, metrics_arg, from, until, values).await?;
        let marks = get_series_arg(ctx, eval, marks_arg, from, until, values).await?;
        let rank = expr.get_int_arg(2, "versionRankIndex")?;
        if rank < 0 {
            return Err(Error::InvalidArgument(format!(
                "timeShiftByMetric: versionRankIndex must be non-negative, got {}",
                rank
            )));
        }

        let step = validate(&marks, &metrics)?;
        let leading = self.leading_marks(&marks)?;
        let offsets = offsets(&leading, step);

        Ok(metrics
            .iter()
            .filter_map(|m| {
                let token = m.name.split('.').nth(rank as usize)?;
                let Some(offset) = offset_for(token, &offsets) else {
                    debug!(metric = %m.name, token, "no version mark for metric");
                    return None;
                };
                let mut r = m.renamed(format!("timeShiftByMetric({})", m.name));
                r.start_time += offset;
                r.stop_time += offset;
                Some(r)
            })
            .collect())
    }
}
