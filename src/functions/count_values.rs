//! `countValues(seriesList, valuesLimit=32)`
//!
//! For every distinct integer value seen across the inputs, emits a series
//! counting how many inputs held that value at each index.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

use crate::aggregation::align_series;
use crate::config::{AlignmentConfig, EngineConfig};
use crate::error::{ConfigError, Error, Result};
use crate::expr::{get_series_arg, EvalContext, Evaluator, Expr};
use crate::types::{FetchedValues, MetricData, Tags};

use super::description::{describe_all, FunctionDescription, FunctionParam, FunctionType};
use super::{Function, FunctionMetadata};

/// Default cap on distinct values
pub const DEFAULT_VALUES_LIMIT: i64 = 32;

/// Register `countValues`
pub fn new(config: &EngineConfig) -> std::result::Result<Vec<FunctionMetadata>, ConfigError> {
    Ok(vec![FunctionMetadata::new(
        "countValues",
        Arc::new(CountValues {
            alignment: config.alignment,
        }),
    )])
}

/// Value histogram over time
pub struct CountValues {
    alignment: AlignmentConfig,
}

/// Outcome of counting
#[derive(Debug, Clone, PartialEq)]
pub enum Counted {
    /// Per-value counts, sorted by value
    Buckets(BTreeMap<i64, Vec<u32>>),
    /// More distinct values than allowed
    LimitReached,
}

/// Count truncated values per index across aligned series
pub fn count_values(aligned: &[MetricData], limit: usize) -> Counted {
    let len = aligned.iter().map(|s| s.len()).max().unwrap_or(0);
    let mut buckets: BTreeMap<i64, Vec<u32>> = BTreeMap::new();

    for s in aligned {
        for i in 0..s.len() {
            let Some(v) = s.value_at(i) else {
                continue;
            };
            if !v.is_finite() {
                continue;
            }
            let key = v.trunc() as i64;
            if !buckets.contains_key(&key) && buckets.len() == limit {
                return Counted::LimitReached;
            }
            buckets.entry(key).or_insert_with(|| vec![0; len])[i] += 1;
        }
    }
    Counted::Buckets(buckets)
}

#[async_trait]
impl Function for CountValues {
    fn description(&self) -> HashMap<String, FunctionDescription> {
        describe_all(
            &["countValues"],
            FunctionDescription::new(
                "countValues",
                "countValues(seriesList, valuesLimit=32)",
                "Transform",
                "Draws a separate graph for each distinct value of the input series, counting how many series held that value at each point. If more than valuesLimit distinct values are found, a single series ending in valuesLimitReached is returned instead.",
            )
            .param(FunctionParam::new("seriesList", FunctionType::SeriesList).required())
            .param(FunctionParam::new("valuesLimit", FunctionType::Integer).default_value(DEFAULT_VALUES_LIMIT))
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
        let limit = expr.get_int_arg_default(1, "valuesLimit", DEFAULT_VALUES_LIMIT)?;
        if limit < 0 {
            return Err(Error::InvalidArgument(format!(
                "countValues: valuesLimit must be non-negative, got {}",
                limit
            )));
        }

        let aligned = align_series(&series, self.alignment);
        let template = &aligned[0];

        match count_values(&aligned, limit as usize) {
            Counted::LimitReached => {
                let name = format!("countValues({}) valuesLimitReached", expr.raw_args());
                debug!(limit, "countValues limit reached");
                let mut r = template.derive(
                    name.clone(),
                    vec![f64::NAN; template.len()],
                    vec![true; template.len()],
                );
                r.tags = Tags::from([("name".to_string(), name)]);
                Ok(vec![r])
            },
            Counted::Buckets(buckets) => Ok(buckets
                .into_iter()
                .map(|(key, counts)| {
                    let name = key.to_string();
                    let absent: Vec<bool> = counts.iter().map(|c| *c == 0).collect();
                    let values = counts
                        .iter()
                        .map(|c| if *c == 0 { f64::NAN } else { *c as f64 })
                        .collect();
                    let mut r = template.derive(name.clone(), values, absent);
                    r.tags = Tags::from([("name".to_string(), name)]);
                    r
                })
                .collect()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_truncated_values() {
        let a = MetricData::new("a", vec![1.2, 2.0, f64::NAN], 1, 0);
        let b = MetricData::new("b", vec![1.9, 3.0, 3.5], 1, 0);

        let Counted::Buckets(b) = count_values(&[a, b], 32) else {
            panic!("limit reached");
        };
        assert_eq!(b.keys().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(b[&1], vec![2, 0, 0]);
        assert_eq!(b[&2], vec![0, 1, 0]);
        assert_eq!(b[&3], vec![0, 1, 1]);
    }

    #[test]
    fn test_limit() {
        let a = MetricData::new("a", vec![1.0, 2.0, 3.0], 1, 0);
        assert_eq!(count_values(&[a.clone()], 2), Counted::LimitReached);
        assert!(matches!(count_values(&[a], 3), Counted::Buckets(_)));
    }

    #[test]
    fn test_negative_truncates_toward_zero() {
        let a = MetricData::new("a", vec![-1.7], 1, 0);
        let Counted::Buckets(b) = count_values(&[a], 32) else {
            panic!("limit reached");
        };
        assert!(b.contains_key(&-1));
    }
}
