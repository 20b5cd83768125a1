//! `aliasByRedis(seriesList, hashName)`
//!
//! Looks every series name up as a field of the Redis hash `hashName` and
//! renames the series to the stored value. Series without a mapping keep
//! their name.
//!
//! Only registered when `functions.alias_by_redis` points at a config file:
//!
//! ```toml
//! enabled = true
//!
//! [redis]
//! url = "redis://cache:6379/0"
//! pool_size = 8
//! command_timeout_ms = 250
//! ```

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::config::{load_toml, EngineConfig};
use crate::error::{ConfigError, Error, Result};
use crate::expr::{get_series_arg, EvalContext, Evaluator, Expr};
use crate::redis::{RedisConfig, RedisPool};
use crate::types::{FetchedValues, MetricData};

use super::description::{describe_all, FunctionDescription, FunctionParam, FunctionType};
use super::{Function, FunctionMetadata};

/// Contents of the aliasByRedis config file
#[derive(Debug, Clone, Deserialize)]
pub struct AliasByRedisConfig {
    /// Register the function at all
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Connection settings
    #[serde(default)]
    pub redis: RedisConfig,
}

fn default_enabled() -> bool {
    true
}

/// Register `aliasByRedis` if configured
pub fn new(config: &EngineConfig) -> std::result::Result<Vec<FunctionMetadata>, ConfigError> {
    let Some(path) = &config.functions.alias_by_redis else {
        return Err(ConfigError::Disabled(
            "aliasByRedis: no config file set".to_string(),
        ));
    };
    let cfg: AliasByRedisConfig = load_toml(path)?;
    if !cfg.enabled {
        return Err(ConfigError::Disabled(format!(
            "aliasByRedis: disabled in {}",
            path.display()
        )));
    }

    let pool = RedisPool::new(cfg.redis).map_err(|e| ConfigError::Invalid(e.to_string()))?;
    Ok(vec![FunctionMetadata::new(
        "aliasByRedis",
        Arc::new(AliasByRedis {
            pool: Arc::new(pool),
        }),
    )])
}

/// Rename series through a Redis hash
pub struct AliasByRedis {
    pool: Arc<RedisPool>,
}

#[async_trait]
impl Function for AliasByRedis {
    fn description(&self) -> HashMap<String, FunctionDescription> {
        describe_all(
            &["aliasByRedis"],
            FunctionDescription::new(
                "aliasByRedis",
                "aliasByRedis(seriesList, hashName)",
                "Alias",
                "Takes a seriesList and looks up each series name as a field of the Redis hash hashName, using the stored value as the new name. Series without a mapping keep their name.",
            )
            .param(FunctionParam::new("seriesList", FunctionType::SeriesList).required())
            .param(FunctionParam::new("hashName", FunctionType::String).required())
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
        let hash = expr.get_string_arg(1, "hashName")?;

        let names: Vec<String> = series.iter().map(|s| s.name.clone()).collect();
        let aliases: Vec<Option<String>> = self
            .pool
            .execute(ctx, |mut conn| {
                let mut pipe = redis::pipe();
                for name in &names {
                    pipe.hget(&hash, name);
                }
                async move { pipe.query_async(&mut conn).await }
            })
            .await?;

        debug!(
            hash = %hash,
            series = names.len(),
            mapped = aliases.iter().filter(|a| a.is_some()).count(),
            "aliasByRedis lookup"
        );

        Ok(series
            .iter()
            .zip(aliases)
            .map(|(s, alias)| match alias {
                Some(name) => s.renamed(name),
                None => s.clone(),
            })
            .collect())
    }
}
