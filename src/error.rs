use anyhow::Error as AnyhowError;
use thiserror::Error;

/// Engine error taxonomy.
///
/// Compile-time errors are fatal to the deploy operation only. Runtime errors
/// are scoped to the owning activity execution and never take down the engine
/// or other concurrent jobs.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("compile error in graph '{graph}', activity '{activity}', field '{field}': {message}")]
    Compile {
        graph: String,
        activity: String,
        field: String,
        message: String,
    },

    #[error("schema validation failed for activity '{activity}': {message}")]
    SchemaValidation { activity: String, message: String },

    #[error("invalid pipe expression: {detail}")]
    InvalidPipeExpression { detail: String },

    #[error("arity mismatch calling '{function}': expected {expected}, got {actual}")]
    ArityMismatch {
        function: String,
        expected: String,
        actual: usize,
    },

    #[error("dispatch to topic '{topic}' failed after {attempts} attempt(s): {source}")]
    Dispatch {
        topic: String,
        attempts: u32,
        #[source]
        source: AnyhowError,
    },

    /// Duplicate delivery of an already-terminal activity. Absorbed by the
    /// engine as a no-op; callers never observe it.
    #[error("reentrant dispatch for job '{job_id}', activity '{activity_id}'")]
    ReentrantDispatch { job_id: String, activity_id: String },

    #[error("no active version for app '{app_id}'")]
    NoActiveVersion { app_id: String },

    #[error("no graph subscribes to topic '{topic}'")]
    UnknownTopic { topic: String },

    #[error("job not found: {job_id}")]
    JobNotFound { job_id: String },

    #[error("no worker registered for topic '{topic}'")]
    WorkerMissing { topic: String },

    #[error("request on topic '{topic}' timed out after {seconds}s")]
    RequestTimeout { topic: String, seconds: u64 },

    #[error("internal engine error: {0}")]
    Internal(String),
}

impl EngineError {
    pub fn compile(graph: &str, activity: &str, field: &str, message: impl Into<String>) -> Self {
        EngineError::Compile {
            graph: graph.to_string(),
            activity: activity.to_string(),
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn invalid_pipe(detail: impl Into<String>) -> Self {
        EngineError::InvalidPipeExpression {
            detail: detail.into(),
        }
    }
}

pub type EngineResult<T, E = EngineError> = std::result::Result<T, E>;
