//! Elementwise transforms: `scale`, `offset`, `transformNull`, `consolidateBy`

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::consolidation::ConsolidationFunc;
use crate::error::{ConfigError, Error, Result};
use crate::expr::{get_series_arg, EvalContext, Evaluator, Expr};
use crate::types::{FetchedValues, MetricData};

use super::description::{FunctionDescription, FunctionParam, FunctionType};
use super::{Function, FunctionMetadata};

/// Register the transforms
pub fn new(_config: &EngineConfig) -> std::result::Result<Vec<FunctionMetadata>, ConfigError> {
    Ok(vec![
        FunctionMetadata::new("scale", Arc::new(Transform::Scale)),
        FunctionMetadata::new("offset", Arc::new(Transform::Offset)),
        FunctionMetadata::new("transformNull", Arc::new(Transform::TransformNull)),
        FunctionMetadata::new("consolidateBy", Arc::new(Transform::ConsolidateBy)),
    ])
}

/// One elementwise transform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    /// Multiply present values
    Scale,
    /// Add to present values
    Offset,
    /// Replace absent samples with a constant
    TransformNull,
    /// Change the display consolidation function
    ConsolidateBy,
}

impl Transform {
    fn name(&self) -> &'static str {
        match self {
            Transform::Scale => "scale",
            Transform::Offset => "offset",
            Transform::TransformNull => "transformNull",
            Transform::ConsolidateBy => "consolidateBy",
        }
    }

    fn apply(&self, expr: &Expr, series: &[MetricData]) -> Result<Vec<MetricData>> {
        let out = match self {
            Transform::Scale => {
                let factor = expr.get_float_arg(1, "factor")?;
                map_present(series, |v| v * factor, |n| format!("scale({},{})", n, factor))
            },
            Transform::Offset => {
                let amount = expr.get_float_arg(1, "amount")?;
                map_present(series, |v| v + amount, |n| format!("offset({},{})", n, amount))
            },
            Transform::TransformNull => {
                let default = expr.get_float_arg_default(1, "default", 0.0)?;
                series
                    .iter()
                    .map(|s| {
                        let values = (0..s.len())
                            .map(|i| s.value_at(i).unwrap_or(default))
                            .collect();
                        s.derive(
                            format!("transformNull({},{})", s.name, default),
                            values,
                            vec![false; s.len()],
                        )
                    })
                    .collect()
            },
            Transform::ConsolidateBy => {
                let func: ConsolidationFunc = expr.get_string_arg(1, "consolidationFunc")?.parse()?;
                series
                    .iter()
                    .map(|s| {
                        let mut r = s.renamed(format!("consolidateBy({},\"{}\")", s.name, func));
                        r.consolidation_func = func;
                        r.set_values_per_point(s.values_per_point, Default::default());
                        r
                    })
                    .collect()
            },
        };
        Ok(out)
    }
}

fn map_present<F, N>(series: &[MetricData], f: F, name: N) -> Vec<MetricData>
where
    F: Fn(f64) -> f64,
    N: Fn(&str) -> String,
{
    series
        .iter()
        .map(|s| {
            let values = s
                .values
                .iter()
                .zip(&s.is_absent)
                .map(|(v, absent)| if *absent { f64::NAN } else { f(*v) })
                .collect();
            s.derive(name(&s.name), values, s.is_absent.clone())
        })
        .collect()
}

#[async_trait]
impl Function for Transform {
    fn description(&self) -> HashMap<String, FunctionDescription> {
        let series = FunctionParam::new("seriesList", FunctionType::SeriesList).required();
        let d = match self {
            Transform::Scale => FunctionDescription::new(
                "scale",
                "scale(seriesList, factor)",
                "Transform",
                "Takes one metric or a wildcard seriesList followed by a constant, and multiplies the datapoint by the constant provided at each point.",
            )
            .param(series)
            .param(FunctionParam::new("factor", FunctionType::Float).required())
            .name_change()
            .values_change(),
            Transform::Offset => FunctionDescription::new(
                "offset",
                "offset(seriesList, amount)",
                "Transform",
                "Takes one metric or a wildcard seriesList followed by a constant, and adds the constant to each datapoint.",
            )
            .param(series)
            .param(FunctionParam::new("amount", FunctionType::Float).required())
            .name_change()
            .values_change(),
            Transform::TransformNull => FunctionDescription::new(
                "transformNull",
                "transformNull(seriesList, default=0)",
                "Transform",
                "Takes a metric or wildcard seriesList and replaces null values with the value specified by default.",
            )
            .param(series)
            .param(FunctionParam::new("default", FunctionType::Float).default_value(0))
            .name_change()
            .values_change(),
            Transform::ConsolidateBy => FunctionDescription::new(
                "consolidateBy",
                "consolidateBy(seriesList, consolidationFunc)",
                "Special",
                "Takes one metric or a wildcard seriesList and a consolidation function name.",
            )
            .param(series)
            .param(
                FunctionParam::new("consolidationFunc", FunctionType::String)
                    .required()
                    .options(["sum", "average", "avg", "min", "max", "first", "last"]),
            )
            .name_change(),
        };
        let mut m = HashMap::new();
        m.insert(self.name().to_string(), d);
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
        let arg = expr
            .arg(0)
            .ok_or_else(|| Error::missing_argument(expr.target(), "seriesList"))?;
        let series = get_series_arg(ctx, eval, arg, from, until, values).await?;
        self.apply(expr, &series)
    }
}
