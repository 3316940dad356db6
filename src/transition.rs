//! Transition evaluation
//!
//! Given a terminal activity and its owning graph, decide which outgoing
//! edges fire. Condition `actual` expressions run through the pipe
//! interpreter; a rule matches only when the resolved value equals the
//! `expected` boolean (non-boolean and undefined values never match), and the
//! per-edge results are combined with the gate (`and` requires all matches,
//! `or` at least one). Edges of FAILED and SKIPPED activities never fire;
//! downstream policy on failure is expressed by graph authors through
//! conditions on data.

use serde_json::Value as JsonValue;
use tracing::debug;

use crate::error::{EngineError, EngineResult};
use crate::functions::FunctionRegistry;
use crate::model::{Conditions, Gate, Graph};
use crate::pipe::{Interpreter, SymbolTable};
use crate::types::ActivityStatus;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeOutcome {
    pub to: String,
    /// False means the edge is pruned: it still resolves the target's
    /// collation slot but never triggers dispatch.
    pub fired: bool,
}

/// Evaluate every outgoing edge of `from`, which has just reached
/// `source_status`.
pub fn evaluate_transitions(
    graph: &Graph,
    from: &str,
    source_status: ActivityStatus,
    symbols: &SymbolTable,
    functions: &FunctionRegistry,
) -> EngineResult<Vec<EdgeOutcome>> {
    let edges = graph.outgoing(from);
    let mut outcomes = Vec::with_capacity(edges.len());

    for edge in edges {
        let fired = if source_status != ActivityStatus::Completed {
            false
        } else {
            match &edge.conditions {
                None => true,
                Some(conditions) => evaluate_conditions(conditions, symbols, functions)?,
            }
        };

        if !fired {
            debug!(from, to = %edge.to, "edge pruned");
        }
        outcomes.push(EdgeOutcome {
            to: edge.to.clone(),
            fired,
        });
    }

    Ok(outcomes)
}

fn evaluate_conditions(
    conditions: &Conditions,
    symbols: &SymbolTable,
    functions: &FunctionRegistry,
) -> EngineResult<bool> {
    if conditions.match_rules.is_empty() {
        return Err(EngineError::invalid_pipe(
            "conditions present but match list is empty",
        ));
    }

    let interpreter = Interpreter::new(symbols, functions);
    let mut all = true;
    let mut any = false;

    for rule in &conditions.match_rules {
        let actual = interpreter.eval(&rule.actual)?;
        // Equality against the expected boolean; a non-boolean or undefined
        // value never matches, whatever `expected` is
        let matched = actual.as_json() == Some(&JsonValue::Bool(rule.expected));
        all &= matched;
        any |= matched;

        // Short-circuit per gate
        match conditions.gate {
            Gate::And if !matched => return Ok(false),
            Gate::Or if matched => return Ok(true),
            _ => {}
        }
    }

    Ok(match conditions.gate {
        Gate::And => all,
        Gate::Or => any,
    })
}
