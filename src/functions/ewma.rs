//! Exponentially weighted moving average

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::error::{ConfigError, Error, Result};
use crate::expr::{get_series_arg, EvalContext, Evaluator, Expr};
use crate::stats::ExpWeightedMean;
use crate::types::{FetchedValues, MetricData};

use super::description::{describe_all, FunctionDescription, FunctionParam, FunctionType};
use super::{bind_all, Function, FunctionMetadata};

const NAMES: &[&str] = &["ewma", "exponentialWeightedMovingAverage"];

/// Register `ewma` and its long alias
pub fn new(_config: &EngineConfig) -> std::result::Result<Vec<FunctionMetadata>, ConfigError> {
    Ok(bind_all(NAMES, Arc::new(Ewma)))
}

/// EWMA; absent samples stay absent and do not move the mean
pub struct Ewma;

#[async_trait]
impl Function for Ewma {
    fn description(&self) -> HashMap<String, FunctionDescription> {
        describe_all(
            NAMES,
            FunctionDescription::new(
                "ewma",
                "ewma(seriesList, alpha)",
                "Calculate",
                "Takes a series and a smoothing factor alpha and returns the exponentially weighted moving average.",
            )
            .param(FunctionParam::new("seriesList", FunctionType::SeriesList).required())
            .param(FunctionParam::new("alpha", FunctionType::Float).required())
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
        let alpha = expr.get_float_arg(1, "alpha")?;
        if !(0.0..=1.0).contains(&alpha) {
            return Err(Error::InvalidArgument(format!(
                "{}: alpha must be within [0, 1], got {}",
                expr.target(),
                alpha
            )));
        }

        Ok(series
            .iter()
            .map(|s| {
                let mut mean = ExpWeightedMean::new(alpha);
                let mut out = Vec::with_capacity(s.len());
                for i in 0..s.len() {
                    match s.value_at(i) {
                        Some(v) => {
                            mean.push(v);
                            out.push(mean.mean());
                        },
                        None => out.push(f64::NAN),
                    }
                }
                let name = format!("{}({},{})", expr.target(), s.name, alpha);
                s.derive(name, out, s.is_absent.clone())
            })
            .collect())
    }
}
