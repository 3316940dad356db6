//! Compiled application model
//!
//! An `AppVersion` is the validated, immutable form of one deployed
//! descriptor: a set of topic-subscribed graphs whose activities and
//! transitions have been cross-checked by the compiler. Engines share it via
//! `Arc`; jobs pin the `Arc` they started under.

pub mod compiler;
pub mod descriptor;
pub mod schema;

pub use compiler::compile;
pub use descriptor::AppDescriptor;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    /// Sole entry point of a graph; echoes its validated payload.
    Trigger,
    /// No-op pass-through.
    Hook,
    /// Dispatches its input to an externally registered worker by topic.
    Worker,
    /// Publishes its input as a sub-job against another graph's topic and
    /// adopts that job's terminal output.
    Await,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gate {
    And,
    Or,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRule {
    pub expected: bool,
    /// A pipe expression; its resolved value must equal `expected` to match.
    pub actual: JsonValue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conditions {
    pub gate: Gate,
    pub match_rules: Vec<MatchRule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub to: String,
    /// An edge with no conditions always fires.
    pub conditions: Option<Conditions>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    pub id: String,
    pub kind: ActivityKind,
    pub topic: Option<String>,
    pub input_schema: Option<JsonValue>,
    pub output_schema: Option<JsonValue>,
    /// Template producing this activity's input payload.
    pub input_maps: Option<JsonValue>,
    /// Template merged into the job's accumulated data on completion,
    /// evaluated with `$self` bound to this activity.
    pub job_maps: Option<JsonValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Graph {
    pub subscribes: String,
    pub input_schema: Option<JsonValue>,
    pub output_schema: Option<JsonValue>,
    pub activities: BTreeMap<String, Activity>,
    pub transitions: BTreeMap<String, Vec<Edge>>,
    /// The single trigger activity id, precomputed by the compiler.
    pub trigger: String,
    /// Incoming edge count per activity, precomputed for collation.
    pub incoming: BTreeMap<String, usize>,
}

impl Graph {
    pub fn activity(&self, id: &str) -> Option<&Activity> {
        self.activities.get(id)
    }

    pub fn outgoing(&self, id: &str) -> &[Edge] {
        self.transitions.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn incoming_count(&self, id: &str) -> usize {
        self.incoming.get(id).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppVersion {
    pub id: String,
    pub version: String,
    pub graphs: Vec<Graph>,
}

impl AppVersion {
    pub fn graph_for_topic(&self, topic: &str) -> Option<&Graph> {
        self.graphs.iter().find(|g| g.subscribes == topic)
    }
}
