//! Per-activity dispatch
//!
//! One dispatch claims the activity (PENDING -> RUNNING compare-and-set),
//! resolves its input maps, executes its kind (trigger/hook echo, worker
//! hand-off, sub-job await), records the terminal status with the job-data
//! merge, then evaluates outgoing transitions and resolves the targets'
//! collation slots. Returns the activity ids that became eligible.
//!
//! Dispatch futures are boxed: an `await` activity recurses into a full
//! sub-job run, and the box keeps the future type finite.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::{json, Value as JsonValue};
use tracing::{debug, warn};

use crate::backend::{CollationOutcome, StartOutcome};
use crate::error::{EngineError, EngineResult};
use crate::model::{Activity, ActivityKind, AppVersion, Graph};
use crate::pipe::{Interpreter, SymbolTable};
use crate::transition;
use crate::types::{ActivityStatus, Job, JobStatus};

use super::{job_metadata, Engine};

type DispatchFuture = Pin<Box<dyn Future<Output = EngineResult<Vec<String>>> + Send>>;

impl Engine {
    /// Dispatch one activity of one job. `seed` is the job's initiating
    /// payload, present only for the trigger.
    pub(crate) fn dispatch_activity(
        self: &Arc<Self>,
        app: Arc<AppVersion>,
        job_id: String,
        activity_id: String,
        seed: Option<JsonValue>,
    ) -> DispatchFuture {
        let engine = self.clone();
        Box::pin(async move {
            let (job, mut symbols) = engine.build_symbols(&job_id).await?;
            let graph = engine.graph_of(&app, &job.topic)?;
            let activity = graph.activity(&activity_id).ok_or_else(|| {
                EngineError::Internal(format!("dispatched unknown activity '{}'", activity_id))
            })?;

            // Resolve the input payload before claiming the activity: a
            // mapping failure marks it FAILED without ever starting it.
            let input = match engine.resolve_input(graph, activity, &symbols, seed) {
                Ok(input) => input,
                Err(e) => {
                    engine.fail(&job_id, &activity_id, &e).await?;
                    return engine.settle(&app, &job_id, &activity_id, ActivityStatus::Failed).await;
                }
            };

            match engine
                .backend
                .try_start_activity(&job_id, &activity_id, input.clone())
                .await?
            {
                StartOutcome::Started => {}
                StartOutcome::AlreadyRunning => {
                    debug!(%job_id, %activity_id, "activity already running, dropping delivery");
                    return Ok(Vec::new());
                }
                StartOutcome::AlreadyTerminal(status) => {
                    // Redelivery of a terminal activity is absorbed
                    let absorbed = EngineError::ReentrantDispatch {
                        job_id: job_id.clone(),
                        activity_id: activity_id.clone(),
                    };
                    debug!(?status, "{}", absorbed);
                    return Ok(Vec::new());
                }
            }
            debug!(%job_id, %activity_id, kind = ?activity.kind, "activity dispatched");

            let outcome = match activity.kind {
                ActivityKind::Trigger | ActivityKind::Hook => Ok(input.clone()),
                ActivityKind::Worker => {
                    let topic = activity.topic.as_deref().unwrap_or_default();
                    engine.run_worker(&job, topic, &input).await
                }
                ActivityKind::Await => {
                    let topic = activity.topic.as_deref().unwrap_or_default();
                    engine.run_sub_job(topic, input.clone()).await
                }
            };

            let status = match outcome {
                Ok(output) => {
                    match engine
                        .record_completion(&job_id, activity, &mut symbols, &input, output)
                        .await?
                    {
                        Ok(()) => ActivityStatus::Completed,
                        Err(e) => {
                            engine.fail(&job_id, &activity_id, &e).await?;
                            ActivityStatus::Failed
                        }
                    }
                }
                Err(e) => {
                    engine.fail(&job_id, &activity_id, &e).await?;
                    ActivityStatus::Failed
                }
            };

            engine.settle(&app, &job_id, &activity_id, status).await
        })
    }

    /// Symbol table over every completed activity plus the job accumulator.
    async fn build_symbols(&self, job_id: &str) -> EngineResult<(Job, SymbolTable)> {
        let job = self
            .backend
            .get_job(job_id)
            .await?
            .ok_or_else(|| EngineError::JobNotFound {
                job_id: job_id.to_string(),
            })?;

        let mut symbols = SymbolTable::new();
        for execution in self.backend.list_activities(job_id).await? {
            if execution.status == ActivityStatus::Completed {
                let metadata = activity_metadata(&execution.activity_id, execution.status);
                symbols.set_activity(
                    &execution.activity_id,
                    execution.input.as_ref(),
                    execution.output.as_ref(),
                    &metadata,
                );
            }
        }
        let job_meta = serde_json::to_value(job_metadata(&job))
            .map_err(|e| EngineError::Internal(e.to_string()))?;
        symbols.set_job(&job.data, &job_meta);
        Ok((job, symbols))
    }

    /// Input payload for an activity: the validated initiating payload for a
    /// trigger, the resolved `input.maps` template for everything else.
    fn resolve_input(
        &self,
        graph: &Graph,
        activity: &Activity,
        symbols: &SymbolTable,
        seed: Option<JsonValue>,
    ) -> EngineResult<JsonValue> {
        let input = match activity.kind {
            ActivityKind::Trigger => {
                let payload = seed.unwrap_or_else(|| json!({}));
                if let Some(schema) = &graph.input_schema {
                    crate::model::schema::validate(schema, &payload).map_err(|e| {
                        EngineError::SchemaValidation {
                            activity: activity.id.clone(),
                            message: e,
                        }
                    })?;
                }
                payload
            }
            _ => {
                let template = activity.input_maps.clone().unwrap_or_else(|| json!({}));
                let functions = self.functions.read().expect("function registry lock poisoned");
                Interpreter::new(symbols, &functions)
                    .eval(&template)?
                    .into_json()
            }
        };

        if let Some(schema) = &activity.input_schema {
            crate::model::schema::validate(schema, &input).map_err(|e| {
                EngineError::SchemaValidation {
                    activity: activity.id.clone(),
                    message: e,
                }
            })?;
        }
        Ok(input)
    }

    /// Validate the output, resolve `job.maps` with `$self` bound, and
    /// complete the activity with the job-data merge applied atomically.
    /// The inner error marks the activity FAILED, not the engine call.
    async fn record_completion(
        &self,
        job_id: &str,
        activity: &Activity,
        symbols: &mut SymbolTable,
        input: &JsonValue,
        output: JsonValue,
    ) -> EngineResult<Result<(), EngineError>> {
        if let Some(schema) = &activity.output_schema {
            if let Err(e) = crate::model::schema::validate(schema, &output) {
                return Ok(Err(EngineError::SchemaValidation {
                    activity: activity.id.clone(),
                    message: e,
                }));
            }
        }

        let patch = match &activity.job_maps {
            None => None,
            Some(maps) => {
                symbols.bind_self(json!({
                    "input": input,
                    "output": {
                        "data": output,
                        "metadata": activity_metadata(&activity.id, ActivityStatus::Completed),
                    },
                }));
                let resolved = {
                    let functions =
                        self.functions.read().expect("function registry lock poisoned");
                    Interpreter::new(symbols, &functions).eval(maps)
                };
                match resolved {
                    Ok(val) => Some(val.into_json()),
                    Err(e) => return Ok(Err(e)),
                }
            }
        };

        self.backend
            .complete_activity(job_id, &activity.id, output, patch)
            .await?;
        Ok(Ok(()))
    }

    /// Hand the input to the registered worker, retrying failures up to the
    /// configured bound.
    async fn run_worker(
        &self,
        job: &Job,
        topic: &str,
        input: &JsonValue,
    ) -> Result<JsonValue, EngineError> {
        let handler = self
            .workers
            .get(topic)
            .ok_or_else(|| EngineError::WorkerMissing {
                topic: topic.to_string(),
            })?;

        let attempts = 1 + self.config.max_dispatch_retries;
        let mut last_error = None;
        for attempt in 1..=attempts {
            let payload = crate::types::WorkerPayload {
                metadata: job_metadata(job),
                data: input.clone(),
            };
            match handler(payload).await {
                Ok(result) => return Ok(result.data),
                Err(e) => {
                    warn!(topic, attempt, error = %e, "worker dispatch failed");
                    last_error = Some(e);
                }
            }
        }

        Err(EngineError::Dispatch {
            topic: topic.to_string(),
            attempts,
            source: last_error.unwrap_or_else(|| anyhow::anyhow!("worker never invoked")),
        })
    }

    /// Publish the input as a new job on the composed topic and adopt its
    /// terminal data as this activity's output.
    async fn run_sub_job(
        self: &Arc<Self>,
        topic: &str,
        input: JsonValue,
    ) -> Result<JsonValue, EngineError> {
        let (app, job) = self.start_job(topic).await?;
        let sub_job_id = job.job_id.clone();
        let result = self.clone().run_to_completion(app, job, input).await?;

        if result.metadata.status == JobStatus::Failed {
            return Err(EngineError::Dispatch {
                topic: topic.to_string(),
                attempts: 1,
                source: anyhow::anyhow!(
                    "sub-job {} failed: {}",
                    sub_job_id,
                    result
                        .metadata
                        .error
                        .map(|e| e.to_string())
                        .unwrap_or_else(|| "unknown error".to_string())
                ),
            });
        }
        Ok(result.data.unwrap_or_else(|| json!({})))
    }

    async fn fail(&self, job_id: &str, activity_id: &str, error: &EngineError) -> EngineResult<()> {
        warn!(job_id, activity_id, error = %error, "activity failed");
        self.backend
            .fail_activity(job_id, activity_id, error_json(error))
            .await
    }

    /// Evaluate the terminal activity's outgoing edges, resolve target
    /// collation slots, and transitively skip fully pruned targets.
    async fn settle(
        &self,
        app: &AppVersion,
        job_id: &str,
        activity_id: &str,
        status: ActivityStatus,
    ) -> EngineResult<Vec<String>> {
        let (job, symbols) = self.build_symbols(job_id).await?;
        let graph = self.graph_of(app, &job.topic)?;

        let outcomes = {
            let functions = self.functions.read().expect("function registry lock poisoned");
            transition::evaluate_transitions(graph, activity_id, status, &symbols, &functions)
        };
        let outcomes = match outcomes {
            Ok(outcomes) => outcomes,
            Err(e) => {
                // A malformed condition marks the source FAILED, offending
                // expression recorded, and prunes every outgoing edge
                self.fail(job_id, activity_id, &e).await?;
                graph
                    .outgoing(activity_id)
                    .iter()
                    .map(|edge| transition::EdgeOutcome {
                        to: edge.to.clone(),
                        fired: false,
                    })
                    .collect()
            }
        };

        let mut eligible = Vec::new();
        let mut pruned = Vec::new();
        for outcome in outcomes {
            let required = graph.incoming_count(&outcome.to);
            match self
                .backend
                .resolve_incoming_edge(job_id, &outcome.to, outcome.fired, required)
                .await?
            {
                CollationOutcome::Eligible => eligible.push(outcome.to),
                CollationOutcome::AllPruned => pruned.push(outcome.to),
                CollationOutcome::NotReady => {}
            }
        }

        // Transitive pruning: a skipped activity resolves all of its own
        // outgoing edges as pruned, which may settle further targets.
        while let Some(target) = pruned.pop() {
            if !self.backend.skip_activity(job_id, &target).await? {
                continue;
            }
            debug!(job_id, activity = %target, "activity skipped");
            for edge in graph.outgoing(&target) {
                let required = graph.incoming_count(&edge.to);
                match self
                    .backend
                    .resolve_incoming_edge(job_id, &edge.to, false, required)
                    .await?
                {
                    CollationOutcome::Eligible => eligible.push(edge.to.clone()),
                    CollationOutcome::AllPruned => pruned.push(edge.to.clone()),
                    CollationOutcome::NotReady => {}
                }
            }
        }

        Ok(eligible)
    }
}

fn activity_metadata(activity_id: &str, status: ActivityStatus) -> JsonValue {
    json!({ "activity_id": activity_id, "status": status })
}

fn error_json(error: &EngineError) -> JsonValue {
    let kind = match error {
        EngineError::Compile { .. } => "CompileError",
        EngineError::SchemaValidation { .. } => "SchemaValidationError",
        EngineError::InvalidPipeExpression { .. } => "InvalidPipeExpression",
        EngineError::ArityMismatch { .. } => "ArityMismatch",
        EngineError::Dispatch { .. } => "DispatchError",
        EngineError::ReentrantDispatch { .. } => "ReentrantDispatchError",
        EngineError::NoActiveVersion { .. } => "NoActiveVersion",
        EngineError::UnknownTopic { .. } => "UnknownTopic",
        EngineError::JobNotFound { .. } => "JobNotFound",
        EngineError::WorkerMissing { .. } => "WorkerMissing",
        EngineError::RequestTimeout { .. } => "RequestTimeout",
        EngineError::Internal(_) => "InternalError",
    };
    json!({ "message": error.to_string(), "type": kind })
}
