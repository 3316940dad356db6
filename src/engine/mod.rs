//! Execution engine
//!
//! Drives jobs through their compiled graphs. Each job runs as an explicit
//! work queue of eligible activities: the trigger seeds the queue, every
//! drained wave is dispatched concurrently, and the activities each dispatch
//! makes newly eligible (via transition evaluation and backend collation)
//! are pushed for the next wave. The queue keeps stack depth bounded and
//! lets worker and sub-job dispatches suspend without holding a call stack.
//!
//! All per-job state lives in the backend; the engine itself is stateless
//! and any number of engine instances can share one backend.

mod dispatch;

use std::collections::VecDeque;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde_json::Value as JsonValue;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::backend::Backend;
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::functions::{FnResult, FunctionRegistry};
use crate::model::{AppVersion, Graph};
use crate::pipe::Val;
use crate::registry::WorkerRegistry;
use crate::types::{CreateJobParams, Job, JobMetadata, JobResult, JobStatus, WorkerPayload};

pub struct Engine {
    backend: Arc<dyn Backend>,
    workers: WorkerRegistry,
    functions: RwLock<FunctionRegistry>,
    config: EngineConfig,
}

impl Engine {
    pub fn new(backend: Arc<dyn Backend>, config: EngineConfig) -> Arc<Self> {
        Arc::new(Self {
            backend,
            workers: WorkerRegistry::new(),
            functions: RwLock::new(FunctionRegistry::with_builtins()),
            config,
        })
    }

    /// Store a compiled app version. Does not activate it.
    pub async fn deploy(&self, version: AppVersion) -> EngineResult<()> {
        self.backend.deploy(version).await
    }

    /// Switch the app's active version. New jobs use it; in-flight jobs stay
    /// pinned to the version they started under.
    pub async fn activate(&self, app_id: &str, version: &str) -> EngineResult<()> {
        info!(app_id, version, "activating version");
        self.backend.activate(app_id, version).await
    }

    pub async fn active_version(&self, app_id: &str) -> EngineResult<Option<Arc<AppVersion>>> {
        self.backend.active_version(app_id).await
    }

    /// Register an async worker handler for a topic.
    pub fn register_worker<F, Fut>(&self, topic: &str, handler: F)
    where
        F: Fn(WorkerPayload) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = anyhow::Result<WorkerPayload>> + Send + 'static,
    {
        self.workers.register(topic, handler);
    }

    /// Extend the function catalog without touching the interpreter.
    pub fn register_function<F>(&self, name: &str, min_args: usize, max_args: Option<usize>, f: F)
    where
        F: Fn(&[Val]) -> FnResult + Send + Sync + 'static,
    {
        self.functions
            .write()
            .expect("function registry lock poisoned")
            .register(name, min_args, max_args, f);
    }

    /// Fire-and-forget job invocation: create the job against the topic's
    /// active version and run it in the background.
    pub async fn publish(self: &Arc<Self>, topic: &str, payload: JsonValue) -> EngineResult<String> {
        let (app, job) = self.start_job(topic).await?;
        let job_id = job.job_id.clone();
        let engine = self.clone();
        tokio::spawn(async move {
            if let Err(e) = engine.run_to_completion(app, job, payload).await {
                warn!(error = %e, "background job run failed");
            }
        });
        Ok(job_id)
    }

    /// Invoke a job and await its terminal result.
    pub async fn request(self: &Arc<Self>, topic: &str, payload: JsonValue) -> EngineResult<JobResult> {
        let (app, job) = self.start_job(topic).await?;
        let engine = self.clone();
        let seconds = self.config.request_timeout_secs;
        tokio::time::timeout(
            Duration::from_secs(seconds),
            engine.run_to_completion(app, job, payload),
        )
        .await
        .map_err(|_| EngineError::RequestTimeout {
            topic: topic.to_string(),
            seconds,
        })?
    }

    /// Snapshot of a job's externally visible result.
    pub async fn job_result(&self, job_id: &str) -> EngineResult<JobResult> {
        let job = self
            .backend
            .get_job(job_id)
            .await?
            .ok_or_else(|| EngineError::JobNotFound {
                job_id: job_id.to_string(),
            })?;
        Ok(job_result(&job))
    }

    /// Resolve the topic to its active version and create the pinned job.
    async fn start_job(&self, topic: &str) -> EngineResult<(Arc<AppVersion>, Job)> {
        let app = self
            .backend
            .version_for_topic(topic)
            .await?
            .ok_or_else(|| EngineError::UnknownTopic {
                topic: topic.to_string(),
            })?;

        let job = self
            .backend
            .create_job(CreateJobParams {
                job_id: None,
                app_id: app.id.clone(),
                version: app.version.clone(),
                topic: topic.to_string(),
            })
            .await?;
        debug!(job_id = %job.job_id, topic, version = %job.version, "job created");
        Ok((app, job))
    }

    /// Run one job's work queue to exhaustion, then finalize it.
    async fn run_to_completion(
        self: Arc<Self>,
        app: Arc<AppVersion>,
        job: Job,
        payload: JsonValue,
    ) -> EngineResult<JobResult> {
        let graph = app
            .graph_for_topic(&job.topic)
            .ok_or_else(|| EngineError::Internal(format!(
                "pinned version {} has no graph for topic {}",
                job.version, job.topic
            )))?;
        let trigger = graph.trigger.clone();
        let job_id = job.job_id.clone();

        let mut queue: VecDeque<String> = VecDeque::new();
        queue.push_back(trigger);
        let mut seed = Some(payload);

        while !queue.is_empty() {
            let wave: Vec<String> = queue.drain(..).collect();
            let mut set: JoinSet<EngineResult<Vec<String>>> = JoinSet::new();

            for activity_id in wave {
                let engine = self.clone();
                let app = app.clone();
                let job_id = job_id.clone();
                let seed = seed.take();
                set.spawn(async move {
                    engine.dispatch_activity(app, job_id, activity_id, seed).await
                });
            }

            while let Some(joined) = set.join_next().await {
                let eligible = joined
                    .map_err(|e| EngineError::Internal(format!("dispatch task panicked: {}", e)))??;
                queue.extend(eligible);
            }
        }

        // No activity is pending or running and no further edge can fire
        let job = self.backend.get_job(&job_id).await?.ok_or_else(|| {
            EngineError::JobNotFound {
                job_id: job_id.clone(),
            }
        })?;
        let status = if job.error.is_some() {
            JobStatus::Failed
        } else {
            JobStatus::Completed
        };
        let job = self.backend.finalize_job(&job_id, status).await?;
        info!(job_id = %job.job_id, status = ?job.status, "job finalized");
        Ok(job_result(&job))
    }

    fn graph_of<'a>(&self, app: &'a AppVersion, topic: &str) -> EngineResult<&'a Graph> {
        app.graph_for_topic(topic)
            .ok_or_else(|| EngineError::Internal(format!("no graph for topic {}", topic)))
    }
}

pub(crate) fn job_metadata(job: &Job) -> JobMetadata {
    JobMetadata {
        job_id: job.job_id.clone(),
        app_id: job.app_id.clone(),
        version: job.version.clone(),
        status: job.status,
        created_at: job.created_at,
        completed_at: job.completed_at,
        error: job.error.clone(),
    }
}

pub(crate) fn job_result(job: &Job) -> JobResult {
    let data = match &job.data {
        JsonValue::Object(map) if map.is_empty() => None,
        other => Some(other.clone()),
    };
    JobResult {
        metadata: job_metadata(job),
        data,
    }
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
