//! Descriptor compiler
//!
//! Pure transformation of a raw `AppDescriptor` into a validated
//! `AppVersion`. Fails with a structured `EngineError::Compile` naming the
//! offending graph, activity and field. Persistence and fleet activation of
//! the result are the deployment collaborator's concern.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value as JsonValue;

use crate::error::{EngineError, EngineResult};
use crate::pipe::resolver::{classify, Cell};

use super::descriptor::{AppDescriptor, GraphDescriptor};
use super::schema;
use super::{Activity, ActivityKind, AppVersion, Conditions, Edge, Gate, Graph, MatchRule};

pub fn compile(descriptor: AppDescriptor) -> EngineResult<AppVersion> {
    let app = descriptor.app;

    if app.id.is_empty() {
        return Err(EngineError::compile("", "", "app.id", "must not be empty"));
    }
    if app.version.is_empty() {
        return Err(EngineError::compile("", "", "app.version", "must not be empty"));
    }
    if app.graphs.is_empty() {
        return Err(EngineError::compile("", "", "app.graphs", "at least one graph is required"));
    }

    let mut topics = BTreeSet::new();
    let mut graphs = Vec::with_capacity(app.graphs.len());
    for graph in app.graphs {
        if !topics.insert(graph.subscribes.clone()) {
            return Err(EngineError::compile(
                &graph.subscribes,
                "",
                "subscribes",
                "duplicate subscribe topic within one app version",
            ));
        }
        graphs.push(compile_graph(graph)?);
    }

    Ok(AppVersion {
        id: app.id,
        version: app.version,
        graphs,
    })
}

fn compile_graph(graph: GraphDescriptor) -> EngineResult<Graph> {
    let topic = graph.subscribes.clone();
    if topic.is_empty() {
        return Err(EngineError::compile("", "", "subscribes", "must not be empty"));
    }
    if graph.activities.is_empty() {
        return Err(EngineError::compile(&topic, "", "activities", "must not be empty"));
    }

    // Exactly one trigger
    let triggers: Vec<&String> = graph
        .activities
        .iter()
        .filter(|(_, a)| a.kind == ActivityKind::Trigger)
        .map(|(id, _)| id)
        .collect();
    let trigger = match triggers.as_slice() {
        [only] => (*only).clone(),
        [] => {
            return Err(EngineError::compile(&topic, "", "activities", "graph has no trigger activity"))
        }
        _ => {
            return Err(EngineError::compile(
                &topic,
                triggers[1],
                "type",
                "graph has more than one trigger activity",
            ))
        }
    };

    for schema_field in [&graph.input.schema, &graph.output.schema] {
        if let Some(s) = schema_field {
            schema::check_schema(s)
                .map_err(|e| EngineError::compile(&topic, "", "schema", e))?;
        }
    }

    let mut activities = BTreeMap::new();
    for (id, activity) in &graph.activities {
        if matches!(activity.kind, ActivityKind::Worker | ActivityKind::Await)
            && activity.topic.as_deref().unwrap_or("").is_empty()
        {
            return Err(EngineError::compile(
                &topic,
                id,
                "topic",
                "worker and await activities require a topic",
            ));
        }

        for (field, schema_doc) in [
            ("input.schema", &activity.input.schema),
            ("output.schema", &activity.output.schema),
        ] {
            if let Some(s) = schema_doc {
                schema::check_schema(s)
                    .map_err(|e| EngineError::compile(&topic, id, field, e))?;
            }
        }

        for (field, maps) in [
            ("input.maps", &activity.input.maps),
            ("job.maps", &activity.job.maps),
        ] {
            if let Some(maps) = maps {
                check_references(&topic, id, field, maps, &graph)?;
            }
        }

        activities.insert(
            id.clone(),
            Activity {
                id: id.clone(),
                kind: activity.kind,
                topic: activity.topic.clone(),
                input_schema: activity.input.schema.clone(),
                output_schema: activity.output.schema.clone(),
                input_maps: activity.input.maps.clone(),
                job_maps: activity.job.maps.clone(),
            },
        );
    }

    // Transitions: sources and targets must be declared; no edge may enter
    // the trigger.
    let mut transitions: BTreeMap<String, Vec<Edge>> = BTreeMap::new();
    let mut incoming: BTreeMap<String, usize> =
        activities.keys().map(|id| (id.clone(), 0)).collect();

    for (from, edges) in &graph.transitions {
        if !activities.contains_key(from) {
            return Err(EngineError::compile(
                &topic,
                from,
                "transitions",
                "transition source is not a declared activity",
            ));
        }
        let mut compiled_edges = Vec::with_capacity(edges.len());
        for edge in edges {
            if !activities.contains_key(&edge.to) {
                return Err(EngineError::compile(
                    &topic,
                    from,
                    "transitions.to",
                    format!("edge target '{}' is not a declared activity", edge.to),
                ));
            }
            if edge.to == trigger {
                return Err(EngineError::compile(
                    &topic,
                    from,
                    "transitions.to",
                    "the trigger activity cannot be an edge target",
                ));
            }

            let conditions = match &edge.conditions {
                None => None,
                Some(c) => {
                    for (i, rule) in c.match_rules.iter().enumerate() {
                        check_references(
                            &topic,
                            from,
                            &format!("conditions.match[{}].actual", i),
                            &rule.actual,
                            &graph,
                        )?;
                    }
                    Some(Conditions {
                        // Omitted gate defaults to and
                        gate: c.gate.unwrap_or(Gate::And),
                        match_rules: c
                            .match_rules
                            .iter()
                            .map(|r| MatchRule {
                                expected: r.expected,
                                actual: r.actual.clone(),
                            })
                            .collect(),
                    })
                }
            };

            *incoming.entry(edge.to.clone()).or_insert(0) += 1;
            compiled_edges.push(Edge {
                to: edge.to.clone(),
                conditions,
            });
        }
        transitions.insert(from.clone(), compiled_edges);
    }

    if incoming.get(&trigger).copied().unwrap_or(0) != 0 {
        return Err(EngineError::compile(
            &topic,
            &trigger,
            "transitions",
            "the trigger activity must have no incoming edges",
        ));
    }

    Ok(Graph {
        subscribes: topic,
        input_schema: graph.input.schema,
        output_schema: graph.output.schema,
        activities,
        transitions,
        trigger,
        incoming,
    })
}

/// Walk a mapping/condition template and verify every `{path}` reference
/// resolves to a declared activity (or the `$job`/`$self` bindings).
fn check_references(
    topic: &str,
    activity: &str,
    field: &str,
    template: &JsonValue,
    graph: &GraphDescriptor,
) -> EngineResult<()> {
    match template {
        JsonValue::String(_) => {
            if let Cell::DynamicRef(path) = classify(template) {
                let root = path.split('.').next().unwrap_or("");
                let known = root.starts_with('$') || graph.activities.contains_key(root);
                if !known {
                    return Err(EngineError::compile(
                        topic,
                        activity,
                        field,
                        format!("reference '{{{}}}' does not resolve to a declared activity", path),
                    ));
                }
            }
            Ok(())
        }
        JsonValue::Array(items) => {
            for item in items {
                check_references(topic, activity, field, item, graph)?;
            }
            Ok(())
        }
        JsonValue::Object(obj) => {
            for value in obj.values() {
                check_references(topic, activity, field, value, graph)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
#[path = "compiler_tests.rs"]
mod tests;
