//! Top/bottom-N selection: `highestAverage`, `highestCurrent`, `highestMax`,
//! `lowestAverage`, `lowestCurrent`

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

const NAMES: &[&str] = &[
    "highestAverage",
    "highestCurrent",
    "highestMax",
    "lowestAverage",
    "lowestCurrent",
];

/// Register the selection family
pub fn new(_config: &EngineConfig) -> std::result::Result<Vec<FunctionMetadata>, ConfigError> {
    Ok(bind_all(NAMES, Arc::new(HighestLowest)))
}

fn ranking(name: &str) -> Option<(Direction, Summary)> {
    let r = match name {
        "highestAverage" => (Direction::Highest, Summary::Average),
        "highestCurrent" => (Direction::Highest, Summary::Current),
        "highestMax" => (Direction::Highest, Summary::Max),
        "lowestAverage" => (Direction::Lowest, Summary::Average),
        "lowestCurrent" => (Direction::Lowest, Summary::Current),
        _ => return None,
    };
    Some(r)
}

/// Keep the `n` series ranked first by a summary statistic
pub struct HighestLowest;

#[async_trait]
impl Function for HighestLowest {
    fn description(&self) -> HashMap<String, FunctionDescription> {
        NAMES
            .iter()
            .filter_map(|name| {
                let (direction, summary) = ranking(name)?;
                let which = match direction {
                    Direction::Highest => "highest",
                    Direction::Lowest => "lowest",
                };
                let stat = match summary {
                    Summary::Average => "average",
                    Summary::Current => "last",
                    Summary::Max => "maximum",
                    Summary::Min => "minimum",
                    Summary::Total => "total",
                };
                let d = FunctionDescription::new(
                    *name,
                    format!("{}(seriesList, n=1)", name),
                    "Filter Series",
                    format!(
                        "Takes one metric or a wildcard seriesList followed by an integer N. Out of all metrics passed, draws only the N metrics with the {} {} value.",
                        which, stat
                    ),
                )
                .param(FunctionParam::new("seriesList", FunctionType::SeriesList).required())
                .param(FunctionParam::new("n", FunctionType::Integer).default_value(1))
                .series_change();
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
        let (direction, summary) =
            ranking(expr.target()).ok_or_else(|| Error::UnknownFunction(expr.target().to_string()))?;
        let arg = expr
            .arg(0)
            .ok_or_else(|| Error::missing_argument(expr.target(), "seriesList"))?;
        let series = get_series_arg(ctx, eval, arg, from, until, values).await?;
        let n = expr.get_int_arg_default(1, "n", 1)?;
        if n < 0 {
            return Err(Error::InvalidArgument(format!(
                "{}: n must be non-negative, got {}",
                expr.target(),
                n
            )));
        }

        let picked = select_n(&series, n as usize, direction, |s| summary.of(s.present_values()));
        Ok(picked.into_iter().map(|i| series[i].clone()).collect())
    }
}
