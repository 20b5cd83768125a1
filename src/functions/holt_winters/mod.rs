//! Holt-Winters seasonal forecasting
//!
//! - `holtWintersForecast(seriesList, bootstrapInterval='7d', seasonality='1d')`
//! - `holtWintersConfidenceBands(seriesList, delta=3, bootstrapInterval='7d', seasonality='1d')`
//! - `holtWintersAberration(seriesList, delta=3, bootstrapInterval='7d', seasonality='1d')`
//! - `holtWintersConfidenceArea(...)`: needs a graphing backend, always fails
//!
//! Inputs are evaluated from `from - bootstrapInterval` so the model is warm
//! by the start of the requested window; the bootstrap prefix is trimmed from
//! every output.

pub mod analysis;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::error::{ConfigError, Error, Result};
use crate::expr::{get_series_arg, EvalContext, Evaluator, Expr, DEFAULT_BOOTSTRAP_INTERVAL};
use crate::types::{FetchedValues, GraphOptions, MetricData};

use super::description::{describe_all, FunctionDescription, FunctionParam, FunctionType};
use super::{Function, FunctionMetadata};

use analysis::{analyze, confidence_bands, trim_bootstrap};

const DEFAULT_SEASONALITY: &str = "1d";
const DEFAULT_DELTA: f64 = 3.0;

/// Register the Holt-Winters family
pub fn new(_config: &EngineConfig) -> std::result::Result<Vec<FunctionMetadata>, ConfigError> {
    Ok(vec![
        FunctionMetadata::new("holtWintersForecast", Arc::new(HoltWinters::Forecast)),
        FunctionMetadata::new(
            "holtWintersConfidenceBands",
            Arc::new(HoltWinters::ConfidenceBands),
        ),
        FunctionMetadata::new("holtWintersAberration", Arc::new(HoltWinters::Aberration)),
        FunctionMetadata::new(
            "holtWintersConfidenceArea",
            Arc::new(HoltWinters::ConfidenceArea),
        ),
    ])
}

/// Holt-Winters output kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoltWinters {
    /// Predictions
    Forecast,
    /// Lower and upper band series
    ConfidenceBands,
    /// Distance of actual values outside the bands
    Aberration,
    /// Filled band area, unsupported without a renderer
    ConfidenceArea,
}

#[derive(Debug, Clone, Copy)]
struct Params {
    delta: f64,
    bootstrap: i64,
    seasonality: i64,
}

impl HoltWinters {
    fn name(&self) -> &'static str {
        match self {
            HoltWinters::Forecast => "holtWintersForecast",
            HoltWinters::ConfidenceBands => "holtWintersConfidenceBands",
            HoltWinters::Aberration => "holtWintersAberration",
            HoltWinters::ConfidenceArea => "holtWintersConfidenceArea",
        }
    }

    fn params(&self, expr: &Expr) -> Result<Params> {
        // forecast has no delta, so its interval arguments sit one slot earlier
        let (delta, base) = match self {
            HoltWinters::Forecast => (DEFAULT_DELTA, 1),
            _ => (expr.get_float_arg_default(1, "delta", DEFAULT_DELTA)?, 2),
        };
        let bootstrap = expr
            .get_interval_arg_default(base, "bootstrapInterval", DEFAULT_BOOTSTRAP_INTERVAL, 1)?
            .abs();
        let seasonality = expr
            .get_interval_arg_default(base + 1, "seasonality", DEFAULT_SEASONALITY, 1)?
            .abs();
        if seasonality == 0 {
            return Err(Error::InvalidArgument(format!(
                "{}: seasonality must be positive",
                self.name()
            )));
        }
        Ok(Params {
            delta,
            bootstrap,
            seasonality,
        })
    }
}

/// Samples as NaN-for-absent
fn raw(series: &MetricData) -> Vec<f64> {
    (0..series.len())
        .map(|i| series.value_at(i).unwrap_or(f64::NAN))
        .collect()
}

/// Build an output series on the requested window
fn windowed(source: &MetricData, name: String, values: Vec<f64>, bootstrap_points: usize) -> MetricData {
    let absent = values.iter().map(|v| v.is_nan()).collect();
    let skipped = if source.len() < bootstrap_points { 0 } else { bootstrap_points };
    let mut r = source.derive(name.clone(), values, absent);
    r.start_time = source.start_time + skipped as i64 * source.step_time;
    r.stop_time = r.start_time + r.len() as i64 * r.step_time;
    r.tags.insert("name".to_string(), name);
    r
}

impl HoltWinters {
    fn forecast(&self, s: &MetricData, p: Params) -> Vec<MetricData> {
        let points = (p.bootstrap / s.step_time) as usize;
        let analysis = analyze(&raw(s), s.step_time, p.seasonality);
        let predictions = trim_bootstrap(&analysis.predictions, points);
        vec![windowed(
            s,
            format!("holtWintersForecast({})", s.name),
            predictions,
            points,
        )]
    }

    fn bands(&self, s: &MetricData, p: Params) -> Vec<MetricData> {
        let points = (p.bootstrap / s.step_time) as usize;
        let (lower, upper) =
            confidence_bands(&raw(s), s.step_time, p.delta, p.bootstrap, p.seasonality);

        let stack = GraphOptions {
            stacked: true,
            stack_name: format!("holtWintersConfidenceBands({})", s.name),
        };
        let mut lower = windowed(s, format!("holtWintersConfidenceLower({})", s.name), lower, points);
        let mut upper = windowed(s, format!("holtWintersConfidenceUpper({})", s.name), upper, points);
        lower.graph_options = stack.clone();
        upper.graph_options = stack;
        vec![lower, upper]
    }

    fn aberration(&self, s: &MetricData, p: Params) -> Vec<MetricData> {
        let points = (p.bootstrap / s.step_time) as usize;
        let (lower, upper) =
            confidence_bands(&raw(s), s.step_time, p.delta, p.bootstrap, p.seasonality);
        let actual = trim_bootstrap(&raw(s), points);

        let values = actual
            .iter()
            .zip(lower.iter().zip(upper.iter()))
            .map(|(a, (l, u))| {
                if a.is_nan() {
                    0.0
                } else if !u.is_nan() && a > u {
                    a - u
                } else if !l.is_nan() && a < l {
                    a - l
                } else {
                    0.0
                }
            })
            .collect();
        vec![windowed(
            s,
            format!("holtWintersAberration({})", s.name),
            values,
            points,
        )]
    }
}

#[async_trait]
impl Function for HoltWinters {
    fn description(&self) -> HashMap<String, FunctionDescription> {
        let series = FunctionParam::new("seriesList", FunctionType::SeriesList).required();
        let delta = FunctionParam::new("delta", FunctionType::Integer).default_value(3);
        let bootstrap = FunctionParam::new("bootstrapInterval", FunctionType::Interval)
            .default_value(DEFAULT_BOOTSTRAP_INTERVAL)
            .suggestions(["7d", "30d"]);
        let seasonality = FunctionParam::new("seasonality", FunctionType::Interval)
            .default_value(DEFAULT_SEASONALITY)
            .suggestions(["1d", "7d"]);

        let d = match self {
            HoltWinters::Forecast => FunctionDescription::new(
                self.name(),
                "holtWintersForecast(seriesList, bootstrapInterval='7d', seasonality='1d')",
                "Calculate",
                "Performs a Holt-Winters forecast using the series as input data. Data from bootstrapInterval (one week by default) previous to the series is used to bootstrap the initial forecast.",
            )
            .param(series)
            .param(bootstrap)
            .param(seasonality),
            HoltWinters::ConfidenceBands => FunctionDescription::new(
                self.name(),
                "holtWintersConfidenceBands(seriesList, delta=3, bootstrapInterval='7d', seasonality='1d')",
                "Calculate",
                "Performs a Holt-Winters forecast using the series as input data and plots upper and lower bands with the predicted forecast deviations.",
            )
            .param(series)
            .param(delta)
            .param(bootstrap)
            .param(seasonality)
            .series_change(),
            HoltWinters::Aberration => FunctionDescription::new(
                self.name(),
                "holtWintersAberration(seriesList, delta=3, bootstrapInterval='7d', seasonality='1d')",
                "Calculate",
                "Performs a Holt-Winters forecast using the series as input data and plots the positive or negative deviation of the series data from the forecast.",
            )
            .param(series)
            .param(delta)
            .param(bootstrap)
            .param(seasonality),
            HoltWinters::ConfidenceArea => FunctionDescription::new(
                self.name(),
                "holtWintersConfidenceArea(seriesList, delta=3, bootstrapInterval='7d', seasonality='1d')",
                "Calculate",
                "Performs a Holt-Winters forecast using the series as input data and plots the area between the upper and lower bands of the predicted forecast deviations.",
            )
            .param(series)
            .param(delta)
            .param(bootstrap)
            .param(seasonality)
            .series_change(),
        };

        let d = d.name_change().values_change();
        describe_all(&[self.name()], d)
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
        if *self == HoltWinters::ConfidenceArea {
            return Err(Error::UnsupportedBuild(self.name().to_string()));
        }

        let p = self.params(expr)?;
        let arg = expr
            .arg(0)
            .ok_or_else(|| Error::missing_argument(expr.target(), "seriesList"))?;
        let series = get_series_arg(ctx, eval, arg, from - p.bootstrap, until, values).await?;

        let mut out = Vec::with_capacity(series.len() * 2);
        for s in &series {
            ctx.check()?;
            out.extend(match self {
                HoltWinters::Forecast => self.forecast(s, p),
                HoltWinters::ConfidenceBands => self.bands(s, p),
                HoltWinters::Aberration => self.aberration(s, p),
                HoltWinters::ConfidenceArea => Vec::new(),
            });
        }
        Ok(out)
    }
}
