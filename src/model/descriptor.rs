//! Raw application descriptor
//!
//! The serde shape of a descriptor document before compilation. Descriptors
//! arrive as JSON or YAML; `compile` turns one into a validated `AppVersion`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

use super::{ActivityKind, Gate};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppDescriptor {
    pub app: AppBlock,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppBlock {
    pub id: String,
    pub version: String,
    #[serde(default)]
    pub graphs: Vec<GraphDescriptor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphDescriptor {
    pub subscribes: String,
    #[serde(default)]
    pub input: IoBlock,
    #[serde(default)]
    pub output: IoBlock,
    #[serde(default)]
    pub activities: BTreeMap<String, ActivityDescriptor>,
    #[serde(default)]
    pub transitions: BTreeMap<String, Vec<EdgeDescriptor>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IoBlock {
    #[serde(default)]
    pub schema: Option<JsonValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityDescriptor {
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub input: ActivityIoBlock,
    #[serde(default)]
    pub output: ActivityIoBlock,
    #[serde(default)]
    pub job: JobBlock,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActivityIoBlock {
    #[serde(default)]
    pub schema: Option<JsonValue>,
    #[serde(default)]
    pub maps: Option<JsonValue>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobBlock {
    #[serde(default)]
    pub maps: Option<JsonValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeDescriptor {
    pub to: String,
    #[serde(default)]
    pub conditions: Option<ConditionsDescriptor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionsDescriptor {
    /// Defaults to `and` when omitted.
    #[serde(default)]
    pub gate: Option<Gate>,
    #[serde(rename = "match")]
    pub match_rules: Vec<MatchRuleDescriptor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRuleDescriptor {
    pub expected: bool,
    pub actual: JsonValue,
}

/// Parse a descriptor from an already-loaded JSON value.
pub fn from_json(value: JsonValue) -> Result<AppDescriptor> {
    serde_json::from_value(value).context("Failed to parse app descriptor")
}

/// Parse a descriptor from a YAML document.
pub fn from_yaml(source: &str) -> Result<AppDescriptor> {
    serde_yaml::from_str(source).context("Failed to parse app descriptor YAML")
}
