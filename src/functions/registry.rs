//! Name-keyed function table
//!
//! Built once with [`FunctionRegistry::builder`] and shared read-only
//! afterwards. Entries with [`Order::Last`] are inserted after every
//! [`Order::Any`] entry, so they win name collisions regardless of the order
//! modules were registered in.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{Function, FunctionDescription, FunctionMetadata, Order, MODULES};
use crate::config::EngineConfig;
use crate::error::ConfigError;

/// Function table
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, Arc<dyn Function>>,
}

impl FunctionRegistry {
    /// Start an empty builder
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Registry holding every built-in module enabled by `config`
    pub fn with_defaults(config: &EngineConfig) -> Self {
        let mut builder = Self::builder();
        for (module, constructor) in MODULES {
            builder = builder.register_module(module, constructor(config));
        }
        builder.build()
    }

    /// Look up a function by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Function>> {
        self.functions.get(name).cloned()
    }

    /// True when `name` is registered
    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Number of registered names
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// True when nothing is registered
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Metadata document for every registered name, sorted by name
    pub fn descriptions(&self) -> BTreeMap<String, FunctionDescription> {
        self.functions
            .iter()
            .filter_map(|(name, f)| {
                f.description()
                    .remove(name)
                    .map(|d| (name.clone(), d))
            })
            .collect()
    }
}

impl std::fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.names())
            .finish()
    }
}

/// Collects registrations before building a [`FunctionRegistry`]
#[derive(Default)]
pub struct RegistryBuilder {
    any: Vec<FunctionMetadata>,
    last: Vec<FunctionMetadata>,
}

impl RegistryBuilder {
    /// Queue one registration
    pub fn register(mut self, metadata: FunctionMetadata) -> Self {
        match metadata.function.order() {
            Order::Any => self.any.push(metadata),
            Order::Last => self.last.push(metadata),
        }
        self
    }

    /// Queue several registrations
    pub fn register_all(self, metadata: impl IntoIterator<Item = FunctionMetadata>) -> Self {
        metadata.into_iter().fold(self, Self::register)
    }

    /// Queue a module's registrations; disabled or failing modules are logged
    /// and skipped
    pub fn register_module(
        self,
        module: &str,
        result: Result<Vec<FunctionMetadata>, ConfigError>,
    ) -> Self {
        match result {
            Ok(metadata) => {
                debug!(module, count = metadata.len(), "registering module");
                self.register_all(metadata)
            },
            Err(ConfigError::Disabled(reason)) => {
                info!(module, %reason, "module disabled");
                self
            },
            Err(e) => {
                warn!(module, error = %e, "module failed to initialise, skipping");
                self
            },
        }
    }

    /// Build the table
    pub fn build(self) -> FunctionRegistry {
        let mut functions: HashMap<String, Arc<dyn Function>> = HashMap::new();
        for metadata in self.any.into_iter().chain(self.last) {
            if functions
                .insert(metadata.name.clone(), metadata.function)
                .is_some()
            {
                warn!(name = %metadata.name, "function registered twice, keeping the later one");
            }
        }
        debug!(count = functions.len(), "function registry built");
        FunctionRegistry { functions }
    }
}
