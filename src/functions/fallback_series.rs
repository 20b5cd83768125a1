//! `fallbackSeries(seriesList, fallback)`

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::error::{ConfigError, Error, Result};
use crate::expr::{get_series_arg, EvalContext, Evaluator, Expr};
use crate::types::{FetchedValues, MetricData};

use super::description::{describe_all, FunctionDescription, FunctionParam, FunctionType};
use super::{Function, FunctionMetadata};

/// Register `fallbackSeries`
pub fn new(_config: &EngineConfig) -> std::result::Result<Vec<FunctionMetadata>, ConfigError> {
    Ok(vec![FunctionMetadata::new(
        "fallbackSeries",
        Arc::new(FallbackSeries),
    )])
}

/// Evaluate the fallback when the primary list is missing or empty
pub struct FallbackSeries;

#[async_trait]
impl Function for FallbackSeries {
    fn description(&self) -> HashMap<String, FunctionDescription> {
        describe_all(
            &["fallbackSeries"],
            FunctionDescription::new(
                "fallbackSeries",
                "fallbackSeries(seriesList, fallback)",
                "Special",
                "Takes a wildcard seriesList, and a second fallback metric. If the wildcard does not match any series, draws the fallback metric.",
            )
            .param(FunctionParam::new("seriesList", FunctionType::SeriesList).required())
            .param(FunctionParam::new("fallback", FunctionType::SeriesList).required())
            .series_change(),
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
        let primary = expr
            .arg(0)
            .ok_or_else(|| Error::missing_argument(expr.target(), "seriesList"))?;
        let fallback = expr
            .lookup(1, "fallback")
            .ok_or_else(|| Error::missing_argument(expr.target(), "fallback"))?;

        match get_series_arg(ctx, eval, primary, from, until, values).await {
            Ok(series) => Ok(series),
            Err(e) if e.is_missing_series() => {
                get_series_arg(ctx, eval, fallback, from, until, values).await
            },
            Err(e) => Err(e),
        }
    }
}
