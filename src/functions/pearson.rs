//! Rolling Pearson correlation of two series: `pearson(seriesA, seriesB, windowSize)`

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::aggregation::align_series;
use crate::config::{AlignmentConfig, EngineConfig};
use crate::error::{ConfigError, Error, Result};
use crate::expr::{get_single_series_arg, EvalContext, Evaluator, Expr};
use crate::stats::{pearson, Windowed};
use crate::types::{FetchedValues, MetricData};

use super::description::{describe_all, FunctionDescription, FunctionParam, FunctionType};
use super::{Function, FunctionMetadata};

/// Register `pearson`
pub fn new(config: &EngineConfig) -> std::result::Result<Vec<FunctionMetadata>, ConfigError> {
    Ok(vec![FunctionMetadata::new(
        "pearson",
        Arc::new(Pearson {
            alignment: config.alignment,
        }),
    )])
}

/// Rolling correlation
pub struct Pearson {
    alignment: AlignmentConfig,
}

/// Correlation of the last `window` samples at every index
///
/// An index missing on either side is left out of every window covering it.
/// The first `window - 1` points, and windows with zero variance, are absent.
pub fn rolling_pearson(a: &MetricData, b: &MetricData, window: usize) -> (Vec<f64>, Vec<bool>) {
    let len = a.len().min(b.len());
    let mut wa = Windowed::new(window);
    let mut wb = Windowed::new(window);
    let mut values = Vec::with_capacity(len);
    let mut absent = Vec::with_capacity(len);

    for i in 0..len {
        match (a.value_at(i), b.value_at(i)) {
            (Some(x), Some(y)) => {
                wa.push(x);
                wb.push(y);
            },
            _ => {
                wa.push(f64::NAN);
                wb.push(f64::NAN);
            },
        }

        let r = if i + 1 >= window {
            pearson(wa.data(), wb.data())
        } else {
            f64::NAN
        };
        values.push(r);
        absent.push(r.is_nan());
    }
    (values, absent)
}

#[async_trait]
impl Function for Pearson {
    fn description(&self) -> HashMap<String, FunctionDescription> {
        describe_all(
            &["pearson"],
            FunctionDescription::new(
                "pearson",
                "pearson(seriesA, seriesB, windowSize)",
                "Calculate",
                "Implementation of Pearson product-moment correlation coefficient (PMCC) function. Each argument must resolve to exactly one series.",
            )
            .param(FunctionParam::new("seriesA", FunctionType::SeriesList).required())
            .param(FunctionParam::new("seriesB", FunctionType::SeriesList).required())
            .param(FunctionParam::new("windowSize", FunctionType::Integer).required())
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
        let a = get_single_series_arg(ctx, eval, expr, 0, from, until, values).await?;
        let b = get_single_series_arg(ctx, eval, expr, 1, from, until, values).await?;
        let window = expr.get_int_arg(2, "windowSize")?;
        if window <= 0 {
            return Err(Error::InvalidArgument(format!(
                "pearson: windowSize must be positive, got {}",
                window
            )));
        }

        let aligned = align_series(&[a, b], self.alignment);
        let (v, m) = rolling_pearson(&aligned[0], &aligned[1], window as usize);
        let name = format!("pearson({},{},{})", aligned[0].name, aligned[1].name, window);
        let mut r = aligned[0].derive(name.clone(), v, m);
        r.tags.insert("name".to_string(), name);
        Ok(vec![r])
    }
}
