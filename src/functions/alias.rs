//! `alias` and `aliasByNode`

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::error::{ConfigError, Error, Result};
use crate::expr::{get_series_arg, EvalContext, Evaluator, Expr, NodeOrTag};
use crate::types::{FetchedValues, MetricData};

use super::description::{describe_all, FunctionDescription, FunctionParam, FunctionType};
use super::{extract_metric, Function, FunctionMetadata};

/// Register the alias functions
pub fn new(_config: &EngineConfig) -> std::result::Result<Vec<FunctionMetadata>, ConfigError> {
    Ok(vec![
        FunctionMetadata::new("alias", Arc::new(Alias)),
        FunctionMetadata::new("aliasByNode", Arc::new(AliasByNode)),
    ])
}

/// Rename every series to a fixed string
pub struct Alias;

#[async_trait]
impl Function for Alias {
    fn description(&self) -> HashMap<String, FunctionDescription> {
        describe_all(
            &["alias"],
            FunctionDescription::new(
                "alias",
                "alias(seriesList, newName)",
                "Alias",
                "Takes one metric or a wildcard seriesList and a string in quotes. Prints the string instead of the metric name in the legend.",
            )
            .param(FunctionParam::new("seriesList", FunctionType::SeriesList).required())
            .param(FunctionParam::new("newName", FunctionType::String).required())
            .name_change(),
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
        let new_name = expr.get_string_arg(1, "newName")?;
        Ok(series.iter().map(|s| s.renamed(new_name.clone())).collect())
    }
}

/// Rename by selected name nodes or tag values
pub struct AliasByNode;

/// Join the selected nodes/tags of `series` with dots
///
/// Out-of-range node indices and unknown tags contribute nothing.
pub fn alias_by_nodes(series: &MetricData, nodes: &[NodeOrTag]) -> String {
    let metric = extract_metric(&series.name);
    let metric = metric.split(';').next().unwrap_or(metric);
    let parts: Vec<&str> = metric.split('.').collect();
    let len = parts.len() as i64;

    nodes
        .iter()
        .filter_map(|n| match n {
            NodeOrTag::Node(i) => {
                let idx = if *i < 0 { len + i } else { *i };
                (0..len).contains(&idx).then(|| parts[idx as usize])
            },
            NodeOrTag::Tag(t) => series.tags.get(t).map(String::as_str),
        })
        .collect::<Vec<_>>()
        .join(".")
}

#[async_trait]
impl Function for AliasByNode {
    fn description(&self) -> HashMap<String, FunctionDescription> {
        describe_all(
            &["aliasByNode"],
            FunctionDescription::new(
                "aliasByNode",
                "aliasByNode(seriesList, *nodes)",
                "Alias",
                "Takes a seriesList and applies an alias derived from one or more node portions or tags of the target name.",
            )
            .param(FunctionParam::new("seriesList", FunctionType::SeriesList).required())
            .param(
                FunctionParam::new("nodes", FunctionType::NodeOrTag)
                    .required()
                    .multiple(),
            )
            .name_change(),
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
        let nodes = expr.get_node_or_tag_args(1)?;
        if nodes.is_empty() {
            return Err(Error::missing_argument(expr.target(), "nodes"));
        }
        Ok(series
            .iter()
            .map(|s| s.renamed(alias_by_nodes(s, &nodes)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alias_by_nodes() {
        let s = MetricData::new("servers.web01.cpu;dc=east", vec![1.0], 1, 0);
        assert_eq!(alias_by_nodes(&s, &[NodeOrTag::Node(1)]), "web01");
        assert_eq!(
            alias_by_nodes(&s, &[NodeOrTag::Node(-1), NodeOrTag::Tag("dc".into())]),
            "cpu.east"
        );
        assert_eq!(alias_by_nodes(&s, &[NodeOrTag::Node(9)]), "");

        let wrapped = s.renamed("sumSeries(servers.web01.cpu)");
        assert_eq!(alias_by_nodes(&wrapped, &[NodeOrTag::Node(0)]), "servers");
    }
}
