//! Cross-series aggregates: `sumSeries`, `averageSeries`, `diffSeries`,
//! `aggregate` and friends
//!
//! Arguments that match nothing are dropped and the output name lists only
//! the arguments that were found. When nothing is found the result is empty.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::aggregation::{aggregate_series, align_series, common_tags, AggregateFunc};
use crate::config::{AlignmentConfig, EngineConfig};
use crate::error::{ConfigError, Error, Result};
use crate::expr::{get_series_args_skip_missing, EvalContext, Evaluator, Expr};
use crate::types::{FetchedValues, MetricData};

use super::description::{describe_all, FunctionDescription, FunctionParam, FunctionType};
use super::{bind_all, Function, FunctionMetadata};

const AGG_FUNCS: &[&str] = &[
    "average", "avg", "count", "diff", "first", "last", "max", "median", "min", "multiply",
    "range", "stddev", "sum",
];

/// Register the aggregate family
pub fn new(config: &EngineConfig) -> std::result::Result<Vec<FunctionMetadata>, ConfigError> {
    let f = Arc::new(Aggregate {
        alignment: config.alignment,
    });
    Ok(bind_all(
        &[
            "sumSeries",
            "sum",
            "averageSeries",
            "avg",
            "maxSeries",
            "max",
            "minSeries",
            "min",
            "stddevSeries",
            "multiplySeries",
            "rangeSeries",
            "countSeries",
            "diffSeries",
            "aggregate",
        ],
        f,
    ))
}

/// Aggregate implementation shared by every name
pub struct Aggregate {
    alignment: AlignmentConfig,
}

fn func_for_name(name: &str) -> Option<AggregateFunc> {
    let func = match name {
        "sumSeries" | "sum" => AggregateFunc::Sum,
        "averageSeries" | "avg" => AggregateFunc::Avg,
        "maxSeries" | "max" => AggregateFunc::Max,
        "minSeries" | "min" => AggregateFunc::Min,
        "stddevSeries" => AggregateFunc::Stddev,
        "multiplySeries" => AggregateFunc::Multiply,
        "rangeSeries" => AggregateFunc::Range,
        "countSeries" => AggregateFunc::Count,
        "diffSeries" => AggregateFunc::Diff,
        _ => return None,
    };
    Some(func)
}

fn join_args(args: &[Expr]) -> String {
    args.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(",")
}

impl Aggregate {
    /// Minuend minus the present subtrahends; absent exactly where the
    /// minuend is absent
    fn diff(&self, name: String, series: &[MetricData]) -> Vec<MetricData> {
        let aligned = align_series(series, self.alignment);
        let Some(minuend) = aligned.first() else {
            return Vec::new();
        };
        let rest = &aligned[1..];

        let mut values = Vec::with_capacity(minuend.len());
        let mut absent = Vec::with_capacity(minuend.len());
        for i in 0..minuend.len() {
            match minuend.value_at(i) {
                Some(v) => {
                    let sub: f64 = rest.iter().filter_map(|s| s.value_at(i)).sum();
                    values.push(v - sub);
                    absent.push(false);
                },
                None => {
                    values.push(f64::NAN);
                    absent.push(true);
                },
            }
        }

        let mut r = minuend.derive(name.clone(), values, absent);
        r.tags = common_tags(&aligned);
        r.tags.insert("name".to_string(), name);
        vec![r]
    }
}

#[async_trait]
impl Function for Aggregate {
    fn description(&self) -> HashMap<String, FunctionDescription> {
        let series_lists = || {
            FunctionParam::new("seriesLists", FunctionType::SeriesLists)
                .required()
                .multiple()
        };
        let combine = |name: &str, text: &str| {
            FunctionDescription::new(name, format!("{}(*seriesLists)", name), "Combine", text)
                .param(series_lists())
                .series_change()
                .name_change()
                .tags_change()
                .values_change()
        };

        let mut m = HashMap::new();
        m.extend(describe_all(
            &["sumSeries", "sum"],
            combine("sumSeries", "Adds metrics together and returns the sum at each datapoint."),
        ));
        m.extend(describe_all(
            &["averageSeries", "avg"],
            combine("averageSeries", "Takes one metric or a wildcard seriesList and returns the average of present values at each datapoint."),
        ));
        m.extend(describe_all(
            &["maxSeries", "max"],
            combine("maxSeries", "Returns the maximum present value at each datapoint."),
        ));
        m.extend(describe_all(
            &["minSeries", "min"],
            combine("minSeries", "Returns the minimum present value at each datapoint."),
        ));
        m.extend(describe_all(
            &["stddevSeries"],
            combine("stddevSeries", "Returns the population standard deviation of present values at each datapoint."),
        ));
        m.extend(describe_all(
            &["multiplySeries"],
            combine("multiplySeries", "Multiplies metrics together at each datapoint."),
        ));
        m.extend(describe_all(
            &["rangeSeries"],
            combine("rangeSeries", "Returns max minus min of present values at each datapoint."),
        ));
        m.extend(describe_all(
            &["countSeries"],
            combine("countSeries", "Counts present values at each datapoint."),
        ));
        m.extend(describe_all(
            &["diffSeries"],
            combine("diffSeries", "Subtracts every other series from the first one. The result is absent wherever the first series is absent."),
        ));
        m.extend(describe_all(
            &["aggregate"],
            FunctionDescription::new(
                "aggregate",
                "aggregate(seriesList, func)",
                "Combine",
                "Aggregate series using the specified function.",
            )
            .param(FunctionParam::new("seriesList", FunctionType::SeriesList).required())
            .param(
                FunctionParam::new("func", FunctionType::AggFunc)
                    .required()
                    .options(AGG_FUNCS.iter().copied()),
            )
            .series_change()
            .name_change()
            .tags_change()
            .values_change(),
        ));
        m
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
        let target = expr.target();

        let (func, inputs, display) = if target == "aggregate" {
            let func: AggregateFunc = expr.get_string_arg(1, "func")?.parse()?;
            let first = expr.args().get(..1).unwrap_or_default();
            (func, first, format!("{}Series", func))
        } else {
            let func = func_for_name(target)
                .ok_or_else(|| Error::UnknownFunction(target.to_string()))?;
            (func, expr.args(), target.to_string())
        };

        let (found, series) =
            get_series_args_skip_missing(ctx, eval, inputs, from, until, values).await?;
        if series.is_empty() {
            return Ok(Vec::new());
        }

        let name = format!("{}({})", display, join_args(&found));
        if func == AggregateFunc::Diff {
            return Ok(self.diff(name, &series));
        }
        Ok(aggregate_series(name, &series, func, self.alignment))
    }
}
