//! `percentileOfSeries` and `nPercentile`

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::aggregation::{aggregate_aligned, align_series};
use crate::config::{AlignmentConfig, EngineConfig};
use crate::error::{ConfigError, Error, Result};
use crate::expr::{get_series_arg, EvalContext, Evaluator, Expr};
use crate::stats::{percentile, percentile_of};
use crate::types::{FetchedValues, MetricData};

use super::description::{describe_all, FunctionDescription, FunctionParam, FunctionType};
use super::{Function, FunctionMetadata};

/// Register both percentile functions
pub fn new(config: &EngineConfig) -> std::result::Result<Vec<FunctionMetadata>, ConfigError> {
    Ok(vec![
        FunctionMetadata::new(
            "percentileOfSeries",
            Arc::new(PercentileOfSeries {
                alignment: config.alignment,
            }),
        ),
        FunctionMetadata::new("nPercentile", Arc::new(NPercentile)),
    ])
}

fn check_percent(function: &str, n: f64) -> Result<f64> {
    if (0.0..=100.0).contains(&n) {
        Ok(n)
    } else {
        Err(Error::InvalidArgument(format!(
            "{}: percentile must be within [0, 100], got {}",
            function, n
        )))
    }
}

/// Percentile across series at each index
pub struct PercentileOfSeries {
    alignment: AlignmentConfig,
}

#[async_trait]
impl Function for PercentileOfSeries {
    fn description(&self) -> HashMap<String, FunctionDescription> {
        describe_all(
            &["percentileOfSeries"],
            FunctionDescription::new(
                "percentileOfSeries",
                "percentileOfSeries(seriesList, n, interpolate=False)",
                "Combine",
                "Returns a single series composed of the n-percentile values taken across the list of series at each point.",
            )
            .param(FunctionParam::new("seriesList", FunctionType::SeriesList).required())
            .param(FunctionParam::new("n", FunctionType::Float).required())
            .param(FunctionParam::new("interpolate", FunctionType::Boolean).default_value(false))
            .series_change()
            .name_change()
            .tags_change()
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
        let n = check_percent(expr.target(), expr.get_float_arg(1, "n")?)?;
        let interpolate = expr.get_bool_arg_default(2, "interpolate", false)?;

        let aligned = align_series(&series, self.alignment);
        let name = format!("percentileOfSeries({})", expr.raw_args());
        Ok(aggregate_aligned(name, &aligned, |buf| {
            let p = percentile(buf, n, interpolate);
            (!p.is_nan()).then_some(p)
        }))
    }
}

/// Flat line at the n-th percentile of each series
pub struct NPercentile;

#[async_trait]
impl Function for NPercentile {
    fn description(&self) -> HashMap<String, FunctionDescription> {
        describe_all(
            &["nPercentile"],
            FunctionDescription::new(
                "nPercentile",
                "nPercentile(seriesList, n)",
                "Calculate",
                "Returns n-percent of each series in the seriesList as a flat line.",
            )
            .param(FunctionParam::new("seriesList", FunctionType::SeriesList).required())
            .param(FunctionParam::new("n", FunctionType::Float).required())
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
        let n = check_percent(expr.target(), expr.get_float_arg(1, "n")?)?;

        Ok(series
            .iter()
            .map(|s| {
                let p = percentile_of(s.present_values(), n, true);
                let absent = p.is_nan();
                s.derive(
                    format!("nPercentile({},{})", s.name, n),
                    vec![p; s.len()],
                    vec![absent; s.len()],
                )
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{Engine, InMemoryFetcher};
    use crate::functions::FunctionRegistry;

    #[test]
    fn test_n_percentile_accepts_float() {
        let docs = NPercentile.description();
        assert_eq!(docs["nPercentile"].params[1].kind, FunctionType::Float);
    }

    #[tokio::test]
    async fn test_n_percentile_fractional_n() {
        let config = EngineConfig::default();
        let registry = Arc::new(FunctionRegistry::with_defaults(&config));
        let fetcher = Arc::new(InMemoryFetcher::new(vec![MetricData::new(
            "a",
            vec![1.0, 2.0, 3.0, 4.0, 5.0],
            60,
            0,
        )]));
        let engine = Engine::new(registry, fetcher, config);
        let expr = Expr::func("nPercentile", vec![Expr::name("a"), Expr::Const(62.5)]);
        let out = engine
            .render(&EvalContext::new(), &expr, 0, 300, 0)
            .await
            .unwrap();

        assert_eq!(out[0].name, "nPercentile(a,62.5)");
        // k = 4 * 0.625 = 2.5, halfway between 3 and 4
        assert_eq!(out[0].value_at(0), Some(3.5));
    }
}
