//! `sortByTotal`, `sortByMaxima`, `sortByMinima`

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::error::{ConfigError, Error, Result};
use crate::expr::{get_series_arg, EvalContext, Evaluator, Expr};
use crate::stats::{select_n, Direction, Summary};
use crate::types::{FetchedValues, MetricData};

use super::description::{FunctionDescription, FunctionParam, FunctionType};
use super::{bind_all, Function, FunctionMetadata};

/// Register the sort family
pub fn new(_config: &EngineConfig) -> std::result::Result<Vec<FunctionMetadata>, ConfigError> {
    Ok(bind_all(
        &["sortByTotal", "sortByMaxima", "sortByMinima"],
        Arc::new(SortBy),
    ))
}

/// Reorder series by a summary statistic; ties keep input order
pub struct SortBy;

fn ordering(name: &str) -> Option<(Direction, Summary, &'static str)> {
    let r = match name {
        "sortByTotal" => (
            Direction::Highest,
            Summary::Total,
            "Sorts the list of metrics in descending order by the sum of values across the time period specified.",
        ),
        "sortByMaxima" => (
            Direction::Highest,
            Summary::Max,
            "Sorts the list of metrics in descending order by the maximum value across the time period specified.",
        ),
        "sortByMinima" => (
            Direction::Lowest,
            Summary::Min,
            "Sorts the list of metrics by the lowest value across the time period specified.",
        ),
        _ => return None,
    };
    Some(r)
}

#[async_trait]
impl Function for SortBy {
    fn description(&self) -> HashMap<String, FunctionDescription> {
        ["sortByTotal", "sortByMaxima", "sortByMinima"]
            .iter()
            .filter_map(|name| {
                let (_, _, text) = ordering(name)?;
                let d = FunctionDescription::new(
                    *name,
                    format!("{}(seriesList)", name),
                    "Sorting",
                    text,
                )
                .param(FunctionParam::new("seriesList", FunctionType::SeriesList).required());
                Some((name.to_string(), d))
            })
            .collect()
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
        let (direction, summary, _) =
            ordering(expr.target()).ok_or_else(|| Error::UnknownFunction(expr.target().to_string()))?;
        let arg = expr
            .arg(0)
            .ok_or_else(|| Error::missing_argument(expr.target(), "seriesList"))?;
        let series = get_series_arg(ctx, eval, arg, from, until, values).await?;

        let order = select_n(&series, series.len(), direction, |s| summary.of(s.present_values()));
        Ok(order.into_iter().map(|i| series[i].clone()).collect())
    }
}
