//! `heatMap(seriesList)`
//!
//! Orders series by weight and returns the difference between each pair of
//! neighbours, which renders as a heat map of how samples move between
//! buckets.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::error::{ConfigError, Error, Result};
use crate::expr::{get_series_arg, EvalContext, Evaluator, Expr};
use crate::types::{FetchedValues, MetricData};

use super::description::{describe_all, FunctionDescription, FunctionParam, FunctionType};
use super::{Function, FunctionMetadata};

/// Number of jointly present samples summed into a series weight
const WEIGHT_POINTS: usize = 5;

/// Register `heatMap`
pub fn new(_config: &EngineConfig) -> std::result::Result<Vec<FunctionMetadata>, ConfigError> {
    Ok(vec![FunctionMetadata::new("heatMap", Arc::new(HeatMap))])
}

/// Neighbour difference over weight-sorted series
pub struct HeatMap;

/// All series must share one timeline
pub fn validate_shapes(series: &[MetricData]) -> Result<()> {
    let Some(first) = series.first() else {
        return Ok(());
    };
    for s in &series[1..] {
        let checks = [
            ("StartTime", first.start_time, s.start_time),
            ("StopTime", first.stop_time, s.stop_time),
            ("StepTime", first.step_time, s.step_time),
            ("len(Values)", first.len() as i64, s.len() as i64),
        ];
        for (field, left, right) in checks {
            if left != right {
                return Err(Error::SeriesShapeMismatch { field, left, right });
            }
        }
    }
    Ok(())
}

/// Stable ascending sort by the sum of the first jointly present samples
pub fn sort_by_weight(series: &[MetricData]) -> Vec<&MetricData> {
    let len = series.iter().map(|s| s.len()).min().unwrap_or(0);
    let mut weights = vec![0.0; series.len()];
    let mut taken = 0;

    for i in 0..len {
        if taken == WEIGHT_POINTS {
            break;
        }
        let row: Option<Vec<f64>> = series.iter().map(|s| s.value_at(i)).collect();
        if let Some(row) = row {
            for (w, v) in weights.iter_mut().zip(row) {
                *w += v;
            }
            taken += 1;
        }
    }

    let mut order: Vec<usize> = (0..series.len()).collect();
    order.sort_by(|&a, &b| weights[a].total_cmp(&weights[b]));
    order.into_iter().map(|i| &series[i]).collect()
}

#[async_trait]
impl Function for HeatMap {
    fn description(&self) -> HashMap<String, FunctionDescription> {
        describe_all(
            &["heatMap"],
            FunctionDescription::new(
                "heatMap",
                "heatMap(seriesList)",
                "Transform",
                "Compute heat-map like result based on a values of a metric. All metrics are assumed to be sorted by weight, the difference between each consecutive pair is returned.",
            )
            .param(FunctionParam::new("seriesList", FunctionType::SeriesList).required())
            .series_change()
            .name_change()
            .values_change(),
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
        let arg = expr
            .arg(0)
            .ok_or_else(|| Error::missing_argument(expr.target(), "seriesList"))?;
        let series = get_series_arg(ctx, eval, arg, from, until, values).await?;
        validate_shapes(&series)?;

        let sorted = sort_by_weight(&series);
        Ok(sorted
            .windows(2)
            .map(|pair| {
                let (prev, curr) = (pair[0], pair[1]);
                let mut diff = Vec::with_capacity(curr.len());
                let mut absent = Vec::with_capacity(curr.len());
                for i in 0..curr.len() {
                    match (curr.value_at(i), prev.value_at(i)) {
                        (Some(c), Some(p)) => {
                            diff.push(c - p);
                            absent.push(false);
                        },
                        _ => {
                            diff.push(f64::NAN);
                            absent.push(true);
                        },
                    }
                }
                curr.derive(format!("heatMap({},{})", curr.name, prev.name), diff, absent)
            })
            .collect())
    }
}
