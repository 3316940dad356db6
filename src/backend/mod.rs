//! Durable backend interface
//!
//! The engine is stateless; everything that must survive process loss
//! (deployed versions, the active-version pointer, jobs, per-activity
//! execution records and collation counters) lives behind this trait. The
//! engine operates exclusively through it, so backends are pluggable
//! (in-memory here, a shared durable store in production). Connection and
//! stream mechanics of a real store are outside the engine's scope.
//!
//! Two operations carry the engine's idempotence guarantees:
//! `try_start_activity` is the at-most-once PENDING -> RUNNING gate, and
//! `resolve_incoming_edge` is the collation counter that yields `Eligible`
//! or `AllPruned` exactly once per (job, target).

pub mod memory;

pub use memory::InMemoryBackend;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::error::EngineResult;
use crate::model::AppVersion;
use crate::types::{ActivityExecution, ActivityStatus, CreateJobParams, Job, JobStatus};

/// Result of the PENDING -> RUNNING compare-and-set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// This caller won the transition and owns the dispatch.
    Started,
    /// Another delivery is already processing the activity.
    AlreadyRunning,
    /// The activity is already terminal; redelivery must be a no-op.
    AlreadyTerminal(ActivityStatus),
}

/// Result of resolving one incoming edge of a target activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollationOutcome {
    /// More incoming edges still unresolved.
    NotReady,
    /// All edges resolved and at least one fired: dispatch the target.
    /// Returned exactly once per (job, target).
    Eligible,
    /// All edges resolved, none fired: skip the target. Returned exactly
    /// once per (job, target).
    AllPruned,
}

#[async_trait]
pub trait Backend: Send + Sync {
    // App versions

    /// Store a compiled version. Deploying the same (id, version) twice is
    /// an error; versions are immutable.
    async fn deploy(&self, version: AppVersion) -> EngineResult<()>;

    /// Point the app's active-version marker at a deployed version. The
    /// fleet-consistency protocol around this switch is external; here it is
    /// an atomic pointer swap.
    async fn activate(&self, app_id: &str, version: &str) -> EngineResult<()>;

    async fn active_version(&self, app_id: &str) -> EngineResult<Option<Arc<AppVersion>>>;

    /// Fetch a specific deployed version (used to honor per-job pinning).
    async fn get_version(&self, app_id: &str, version: &str)
        -> EngineResult<Option<Arc<AppVersion>>>;

    /// The active version owning a graph that subscribes to `topic`.
    async fn version_for_topic(&self, topic: &str) -> EngineResult<Option<Arc<AppVersion>>>;

    // Jobs

    async fn create_job(&self, params: CreateJobParams) -> EngineResult<Job>;

    async fn get_job(&self, job_id: &str) -> EngineResult<Option<Job>>;

    /// Mark the job terminal. Idempotent; the first caller wins.
    async fn finalize_job(&self, job_id: &str, status: JobStatus) -> EngineResult<Job>;

    // Activity executions

    /// Lazily create the execution record and attempt PENDING -> RUNNING.
    async fn try_start_activity(
        &self,
        job_id: &str,
        activity_id: &str,
        input: JsonValue,
    ) -> EngineResult<StartOutcome>;

    /// Mark RUNNING -> COMPLETED and, atomically with it, merge `job_patch`
    /// into the job's accumulated data (so a redelivered completion can
    /// never double-apply the merge).
    async fn complete_activity(
        &self,
        job_id: &str,
        activity_id: &str,
        output: JsonValue,
        job_patch: Option<JsonValue>,
    ) -> EngineResult<()>;

    /// Mark the activity FAILED and record the job's first error. A
    /// COMPLETED activity may still fail here: its outgoing conditions are
    /// evaluated after completion, and a malformed one is charged to it.
    async fn fail_activity(
        &self,
        job_id: &str,
        activity_id: &str,
        error: JsonValue,
    ) -> EngineResult<()>;

    /// PENDING -> SKIPPED. Returns false if the activity was already
    /// terminal (skip raced with nothing; it is simply absorbed).
    async fn skip_activity(&self, job_id: &str, activity_id: &str) -> EngineResult<bool>;

    async fn get_activity(
        &self,
        job_id: &str,
        activity_id: &str,
    ) -> EngineResult<Option<ActivityExecution>>;

    async fn list_activities(&self, job_id: &str) -> EngineResult<Vec<ActivityExecution>>;

    // Collation

    /// Resolve one incoming edge of `target` (fired or pruned). `required`
    /// is the target's total incoming edge count from the compiled graph.
    async fn resolve_incoming_edge(
        &self,
        job_id: &str,
        target: &str,
        fired: bool,
        required: usize,
    ) -> EngineResult<CollationOutcome>;
}
