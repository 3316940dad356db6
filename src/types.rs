use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ActivityStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl ActivityStatus {
    /// Completed, Failed and Skipped are terminal; a terminal activity
    /// never transitions again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ActivityStatus::Completed | ActivityStatus::Failed | ActivityStatus::Skipped
        )
    }
}

/// One workflow invocation. `version` is pinned at creation from the app's
/// active version and never changes, even if a newer version is activated
/// while the job is in flight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub job_id: String,
    pub app_id: String,
    pub version: String,
    pub topic: String,
    pub status: JobStatus,

    /// Job-scoped output accumulator, written by `job.maps` merges.
    pub data: JsonValue,

    /// First activity-level error observed, surfaced in result metadata.
    pub error: Option<JsonValue>,

    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Per-job, per-activity execution record. Created lazily the first time an
/// activity becomes eligible.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityExecution {
    pub activity_id: String,
    pub status: ActivityStatus,
    pub input: Option<JsonValue>,
    pub output: Option<JsonValue>,
    pub error: Option<JsonValue>,
}

impl ActivityExecution {
    pub fn new(activity_id: &str) -> Self {
        Self {
            activity_id: activity_id.to_string(),
            status: ActivityStatus::Pending,
            input: None,
            output: None,
            error: None,
        }
    }
}

/// Metadata block surfaced with every job result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobMetadata {
    pub job_id: String,
    pub app_id: String,
    pub version: String,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Set when any activity failed; the job's `data` may be partial.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonValue>,
}

/// Externally visible terminal result of a job: accumulated `data` plus
/// metadata. `data` is None when no job.maps produced any field (e.g. a
/// trigger-only graph, or a fully pruned graph).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResult {
    pub metadata: JobMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<JsonValue>,
}

/// Payload handed to a registered worker, and the shape the worker returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerPayload {
    pub metadata: JobMetadata,
    pub data: JsonValue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateJobParams {
    pub job_id: Option<String>,
    pub app_id: String,
    pub version: String,
    pub topic: String,
}
