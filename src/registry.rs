//! Worker registration
//!
//! External callers register one async handler per topic. The engine invokes
//! the handler with `{metadata, data}` and expects `{metadata, data}` back;
//! an `Err` is a dispatch failure subject to the engine's bounded retry.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};

use anyhow::Result;

use crate::types::WorkerPayload;

pub type WorkerFuture = Pin<Box<dyn Future<Output = Result<WorkerPayload>> + Send>>;
pub type WorkerHandler = Arc<dyn Fn(WorkerPayload) -> WorkerFuture + Send + Sync>;

#[derive(Default)]
pub struct WorkerRegistry {
    handlers: RwLock<HashMap<String, WorkerHandler>>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for `topic`, replacing any previous registration.
    pub fn register<F, Fut>(&self, topic: &str, handler: F)
    where
        F: Fn(WorkerPayload) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<WorkerPayload>> + Send + 'static,
    {
        let handler: WorkerHandler = Arc::new(move |payload| Box::pin(handler(payload)));
        self.handlers
            .write()
            .expect("worker registry lock poisoned")
            .insert(topic.to_string(), handler);
    }

    pub fn get(&self, topic: &str) -> Option<WorkerHandler> {
        self.handlers
            .read()
            .expect("worker registry lock poisoned")
            .get(topic)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::types::{JobMetadata, JobStatus};

    fn payload() -> WorkerPayload {
        WorkerPayload {
            metadata: JobMetadata {
                job_id: "j1".to_string(),
                app_id: "app".to_string(),
                version: "1".to_string(),
                status: JobStatus::Running,
                created_at: chrono::Utc::now(),
                completed_at: None,
                error: None,
            },
            data: json!({"a": "hello"}),
        }
    }

    #[tokio::test]
    async fn registered_handler_is_invoked() {
        let registry = WorkerRegistry::new();
        registry.register("work.do", |mut payload: WorkerPayload| async move {
            payload.data = json!({"b": "done"});
            Ok(payload)
        });

        let handler = registry.get("work.do").unwrap();
        let result = handler(payload()).await.unwrap();
        assert_eq!(result.data, json!({"b": "done"}));
        assert!(registry.get("work.other").is_none());
    }
}
