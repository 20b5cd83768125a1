//! Moving standard deviation: `stdev(seriesList, points, windowTolerance=0.1)`

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::error::{ConfigError, Error, Result};
use crate::expr::{get_series_arg, EvalContext, Evaluator, Expr};
use crate::stats::Windowed;
use crate::types::{FetchedValues, MetricData};

use super::description::{describe_all, FunctionDescription, FunctionParam, FunctionType};
use super::{bind_all, Function, FunctionMetadata};

/// Register `stdev`
pub fn new(_config: &EngineConfig) -> std::result::Result<Vec<FunctionMetadata>, ConfigError> {
    Ok(bind_all(&["stdev", "stddev"], Arc::new(Stdev)))
}

/// Windowed population standard deviation
pub struct Stdev;

/// Moving stdev over `points` samples
///
/// A point is present when the window holds at least one present sample and
/// the present fraction reaches `tolerance`.
pub fn moving_stdev(series: &MetricData, points: usize, tolerance: f64) -> (Vec<f64>, Vec<bool>) {
    let mut window = Windowed::new(points);
    let mut values = Vec::with_capacity(series.len());
    let mut absent = Vec::with_capacity(series.len());

    for i in 0..series.len() {
        window.push(series.value_at(i).unwrap_or(f64::NAN));
        let valid = window.len();
        if valid > 0 && valid as f64 / points as f64 >= tolerance {
            values.push(window.stdev());
            absent.push(false);
        } else {
            values.push(f64::NAN);
            absent.push(true);
        }
    }
    (values, absent)
}

#[async_trait]
impl Function for Stdev {
    fn description(&self) -> HashMap<String, FunctionDescription> {
        describe_all(
            &["stdev", "stddev"],
            FunctionDescription::new(
                "stdev",
                "stdev(seriesList, points, windowTolerance=0.1)",
                "Calculate",
                "Takes one metric or a wildcard seriesList followed by an integer N. Draw the Standard Deviation of all metrics passed for the past N datapoints. If the ratio of null points in the window is greater than windowTolerance, skip the calculation.",
            )
            .param(FunctionParam::new("seriesList", FunctionType::SeriesList).required())
            .param(FunctionParam::new("points", FunctionType::Integer).required())
            .param(FunctionParam::new("windowTolerance", FunctionType::Float).default_value(0.1))
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
        let points = expr.get_int_arg(1, "points")?;
        if points <= 0 {
            return Err(Error::InvalidArgument(format!(
                "stdev: points must be positive, got {}",
                points
            )));
        }
        let tolerance = expr.get_float_arg_default(2, "windowTolerance", 0.1)?;

        Ok(series
            .iter()
            .map(|s| {
                let (v, a) = moving_stdev(s, points as usize, tolerance);
                s.derive(format!("stdev({},{})", s.name, points), v, a)
            })
            .collect())
    }
}
