//! In-memory backend
//!
//! Reference implementation of the `Backend` trait. A single RwLock guards
//! all state, which makes every trait method's read-modify-write atomic and
//! gives the CAS semantics the engine depends on without per-record locks.
//! Suitable for tests and single-process deployments.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value as JsonValue};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::model::AppVersion;
use crate::types::{ActivityExecution, ActivityStatus, CreateJobParams, Job, JobStatus};

use super::{Backend, CollationOutcome, StartOutcome};

#[derive(Debug, Default)]
struct Collation {
    resolved: usize,
    fired: usize,
    /// Set once Eligible/AllPruned has been handed out.
    settled: bool,
}

#[derive(Debug)]
struct JobRecord {
    job: Job,
    activities: HashMap<String, ActivityExecution>,
    collation: HashMap<String, Collation>,
}

#[derive(Default)]
struct State {
    versions: HashMap<(String, String), Arc<AppVersion>>,
    active: HashMap<String, String>,
    jobs: HashMap<String, JobRecord>,
}

#[derive(Default)]
pub struct InMemoryBackend {
    state: RwLock<State>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

fn job_not_found(job_id: &str) -> EngineError {
    EngineError::JobNotFound {
        job_id: job_id.to_string(),
    }
}

#[async_trait]
impl Backend for InMemoryBackend {
    async fn deploy(&self, version: AppVersion) -> EngineResult<()> {
        let mut state = self.state.write().await;
        let key = (version.id.clone(), version.version.clone());
        if state.versions.contains_key(&key) {
            return Err(EngineError::Internal(format!(
                "version {}/{} is already deployed",
                key.0, key.1
            )));
        }
        debug!(app_id = %key.0, version = %key.1, "version deployed");
        state.versions.insert(key, Arc::new(version));
        Ok(())
    }

    async fn activate(&self, app_id: &str, version: &str) -> EngineResult<()> {
        let mut state = self.state.write().await;
        let key = (app_id.to_string(), version.to_string());
        if !state.versions.contains_key(&key) {
            return Err(EngineError::Internal(format!(
                "cannot activate unknown version {}/{}",
                app_id, version
            )));
        }
        debug!(app_id, version, "version activated");
        state.active.insert(app_id.to_string(), version.to_string());
        Ok(())
    }

    async fn active_version(&self, app_id: &str) -> EngineResult<Option<Arc<AppVersion>>> {
        let state = self.state.read().await;
        Ok(state
            .active
            .get(app_id)
            .and_then(|v| state.versions.get(&(app_id.to_string(), v.clone())))
            .cloned())
    }

    async fn get_version(
        &self,
        app_id: &str,
        version: &str,
    ) -> EngineResult<Option<Arc<AppVersion>>> {
        let state = self.state.read().await;
        Ok(state
            .versions
            .get(&(app_id.to_string(), version.to_string()))
            .cloned())
    }

    async fn version_for_topic(&self, topic: &str) -> EngineResult<Option<Arc<AppVersion>>> {
        let state = self.state.read().await;
        for (app_id, version) in &state.active {
            if let Some(app) = state.versions.get(&(app_id.clone(), version.clone())) {
                if app.graph_for_topic(topic).is_some() {
                    return Ok(Some(app.clone()));
                }
            }
        }
        Ok(None)
    }

    async fn create_job(&self, params: CreateJobParams) -> EngineResult<Job> {
        let mut state = self.state.write().await;
        let job_id = params.job_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let job = Job {
            job_id: job_id.clone(),
            app_id: params.app_id,
            version: params.version,
            topic: params.topic,
            status: JobStatus::Running,
            data: JsonValue::Object(Map::new()),
            error: None,
            created_at: Utc::now(),
            completed_at: None,
        };
        state.jobs.insert(
            job_id,
            JobRecord {
                job: job.clone(),
                activities: HashMap::new(),
                collation: HashMap::new(),
            },
        );
        Ok(job)
    }

    async fn get_job(&self, job_id: &str) -> EngineResult<Option<Job>> {
        let state = self.state.read().await;
        Ok(state.jobs.get(job_id).map(|r| r.job.clone()))
    }

    async fn finalize_job(&self, job_id: &str, status: JobStatus) -> EngineResult<Job> {
        let mut state = self.state.write().await;
        let record = state.jobs.get_mut(job_id).ok_or_else(|| job_not_found(job_id))?;
        if record.job.status == JobStatus::Running {
            record.job.status = status;
            record.job.completed_at = Some(Utc::now());
        }
        Ok(record.job.clone())
    }

    async fn try_start_activity(
        &self,
        job_id: &str,
        activity_id: &str,
        input: JsonValue,
    ) -> EngineResult<StartOutcome> {
        let mut state = self.state.write().await;
        let record = state.jobs.get_mut(job_id).ok_or_else(|| job_not_found(job_id))?;
        let execution = record
            .activities
            .entry(activity_id.to_string())
            .or_insert_with(|| ActivityExecution::new(activity_id));

        match execution.status {
            ActivityStatus::Pending => {
                execution.status = ActivityStatus::Running;
                execution.input = Some(input);
                Ok(StartOutcome::Started)
            }
            ActivityStatus::Running => Ok(StartOutcome::AlreadyRunning),
            terminal => Ok(StartOutcome::AlreadyTerminal(terminal)),
        }
    }

    async fn complete_activity(
        &self,
        job_id: &str,
        activity_id: &str,
        output: JsonValue,
        job_patch: Option<JsonValue>,
    ) -> EngineResult<()> {
        let mut state = self.state.write().await;
        let record = state.jobs.get_mut(job_id).ok_or_else(|| job_not_found(job_id))?;
        let execution = record
            .activities
            .get_mut(activity_id)
            .ok_or_else(|| EngineError::Internal(format!(
                "completing unknown activity '{}'",
                activity_id
            )))?;

        if execution.status != ActivityStatus::Running {
            // Redelivered completion; the merge below already happened once
            return Ok(());
        }

        execution.status = ActivityStatus::Completed;
        execution.output = Some(output);

        if let Some(JsonValue::Object(patch)) = job_patch {
            if let JsonValue::Object(data) = &mut record.job.data {
                for (key, value) in patch {
                    data.insert(key, value);
                }
            }
        }
        Ok(())
    }

    async fn fail_activity(
        &self,
        job_id: &str,
        activity_id: &str,
        error: JsonValue,
    ) -> EngineResult<()> {
        let mut state = self.state.write().await;
        let record = state.jobs.get_mut(job_id).ok_or_else(|| job_not_found(job_id))?;
        let execution = record
            .activities
            .entry(activity_id.to_string())
            .or_insert_with(|| ActivityExecution::new(activity_id));

        // COMPLETED may still fail: a malformed outgoing condition is only
        // discovered after the activity completed
        if !matches!(
            execution.status,
            ActivityStatus::Failed | ActivityStatus::Skipped
        ) {
            execution.status = ActivityStatus::Failed;
            execution.error = Some(error.clone());
            if record.job.error.is_none() {
                record.job.error = Some(error);
            }
        }
        Ok(())
    }

    async fn skip_activity(&self, job_id: &str, activity_id: &str) -> EngineResult<bool> {
        let mut state = self.state.write().await;
        let record = state.jobs.get_mut(job_id).ok_or_else(|| job_not_found(job_id))?;
        let execution = record
            .activities
            .entry(activity_id.to_string())
            .or_insert_with(|| ActivityExecution::new(activity_id));

        if execution.status == ActivityStatus::Pending {
            execution.status = ActivityStatus::Skipped;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn get_activity(
        &self,
        job_id: &str,
        activity_id: &str,
    ) -> EngineResult<Option<ActivityExecution>> {
        let state = self.state.read().await;
        Ok(state
            .jobs
            .get(job_id)
            .and_then(|r| r.activities.get(activity_id))
            .cloned())
    }

    async fn list_activities(&self, job_id: &str) -> EngineResult<Vec<ActivityExecution>> {
        let state = self.state.read().await;
        Ok(state
            .jobs
            .get(job_id)
            .map(|r| r.activities.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn resolve_incoming_edge(
        &self,
        job_id: &str,
        target: &str,
        fired: bool,
        required: usize,
    ) -> EngineResult<CollationOutcome> {
        let mut state = self.state.write().await;
        let record = state.jobs.get_mut(job_id).ok_or_else(|| job_not_found(job_id))?;
        let collation = record.collation.entry(target.to_string()).or_default();

        collation.resolved += 1;
        if fired {
            collation.fired += 1;
        }

        if collation.settled || collation.resolved < required {
            return Ok(CollationOutcome::NotReady);
        }

        collation.settled = true;
        if collation.fired > 0 {
            Ok(CollationOutcome::Eligible)
        } else {
            Ok(CollationOutcome::AllPruned)
        }
    }
}
