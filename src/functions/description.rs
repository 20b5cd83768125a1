//! Function metadata document
//!
//! Serialized as the Graphite `/functions` JSON: one object per function name
//! with its signature, group and typed parameters.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Default module reported for every function
pub const DEFAULT_MODULE: &str = "graphite.render.functions";

/// Parameter type, serialized with Graphite's names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FunctionType {
    /// One or more series
    #[serde(rename = "seriesList")]
    SeriesList,
    /// Integer
    #[serde(rename = "integer")]
    Integer,
    /// Float
    #[serde(rename = "float")]
    Float,
    /// Boolean
    #[serde(rename = "boolean")]
    Boolean,
    /// Name node index
    #[serde(rename = "node")]
    Node,
    /// Name node index or tag key
    #[serde(rename = "nodeOrTag")]
    NodeOrTag,
    /// Tag key
    #[serde(rename = "tag")]
    Tag,
    /// Interval string (`1h`, `7d`)
    #[serde(rename = "interval")]
    Interval,
    /// Integer or interval string
    #[serde(rename = "intOrInterval")]
    IntOrInterval,
    /// String
    #[serde(rename = "string")]
    String,
    /// Date
    #[serde(rename = "date")]
    Date,
    /// Aggregation function name
    #[serde(rename = "aggFunc")]
    AggFunc,
    /// Anything
    #[serde(rename = "any")]
    Any,
    /// Several series lists
    #[serde(rename = "seriesLists")]
    SeriesLists,
}

/// One parameter of a function signature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionParam {
    /// Parameter name
    pub name: String,
    /// Repeatable
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub multiple: bool,
    /// Must be supplied
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,
    /// Parameter type
    #[serde(rename = "type")]
    pub kind: FunctionType,
    /// Closed set of accepted values
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    /// Suggested values
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<Value>,
    /// Default value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl FunctionParam {
    /// Optional single-valued parameter
    pub fn new(name: impl Into<String>, kind: FunctionType) -> Self {
        Self {
            name: name.into(),
            multiple: false,
            required: false,
            kind,
            options: Vec::new(),
            suggestions: Vec::new(),
            default: None,
        }
    }

    /// Mark as required
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Mark as repeatable
    pub fn multiple(mut self) -> Self {
        self.multiple = true;
        self
    }

    /// Set the default value
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Set accepted options
    pub fn options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }

    /// Set suggested values
    pub fn suggestions<I, V>(mut self, suggestions: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.suggestions = suggestions.into_iter().map(Into::into).collect();
        self
    }
}

/// Static description of one function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDescription {
    /// Human readable description
    pub description: String,
    /// Signature, e.g. `sumSeries(*seriesLists)`
    pub function: String,
    /// Group (Combine, Transform, Filter Series, ...)
    pub group: String,
    /// Module path
    pub module: String,
    /// Registered name
    pub name: String,
    /// Ordered parameters
    pub params: Vec<FunctionParam>,
    /// Served by a proxied backend
    #[serde(default)]
    pub proxied: bool,
    /// Output series set may differ from the input set
    #[serde(rename = "SeriesChange", default, skip_serializing_if = "std::ops::Not::not")]
    pub series_change: bool,
    /// Output names differ from input names
    #[serde(rename = "NameChange", default, skip_serializing_if = "std::ops::Not::not")]
    pub name_change: bool,
    /// Output tags differ from input tags
    #[serde(rename = "TagsChange", default, skip_serializing_if = "std::ops::Not::not")]
    pub tags_change: bool,
    /// Output values differ from input values
    #[serde(rename = "ValuesChange", default, skip_serializing_if = "std::ops::Not::not")]
    pub values_change: bool,
}

impl FunctionDescription {
    /// Start a description
    pub fn new(
        name: impl Into<String>,
        signature: impl Into<String>,
        group: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            description: description.into(),
            function: signature.into(),
            group: group.into(),
            module: DEFAULT_MODULE.to_string(),
            name: name.into(),
            params: Vec::new(),
            proxied: false,
            series_change: false,
            name_change: false,
            tags_change: false,
            values_change: false,
        }
    }

    /// Append a parameter
    pub fn param(mut self, param: FunctionParam) -> Self {
        self.params.push(param);
        self
    }

    /// Mark the output series set as changed
    pub fn series_change(mut self) -> Self {
        self.series_change = true;
        self
    }

    /// Mark names as changed
    pub fn name_change(mut self) -> Self {
        self.name_change = true;
        self
    }

    /// Mark tags as changed
    pub fn tags_change(mut self) -> Self {
        self.tags_change = true;
        self
    }

    /// Mark values as changed
    pub fn values_change(mut self) -> Self {
        self.values_change = true;
        self
    }

    /// Copy under another registered name, rewriting the signature prefix
    pub fn aliased(&self, name: &str) -> Self {
        let mut d = self.clone();
        if let Some(rest) = d.function.strip_prefix(self.name.as_str()) {
            d.function = format!("{}{}", name, rest);
        }
        d.name = name.to_string();
        d
    }
}

/// Map of `name -> description` for a function and its aliases
pub fn describe_all(names: &[&str], base: FunctionDescription) -> HashMap<String, FunctionDescription> {
    names
        .iter()
        .map(|n| (n.to_string(), base.aliased(n)))
        .collect()
}
