use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use maplit::hashmap;
use serde_json::json;

use super::*;
use crate::backend::InMemoryBackend;
use crate::model::{compile, descriptor};
use crate::types::{ActivityStatus, WorkerPayload};

/// The sandbox app: one version, many graphs, exercising every activity
/// kind and transition shape.
fn sandbox_descriptor() -> serde_json::Value {
    json!({
        "app": {
            "id": "sandbox",
            "version": "1",
            "graphs": [
                {
                    "subscribes": "sandbox.none",
                    "activities": {
                        "t1": {"type": "trigger"}
                    }
                },
                {
                    "subscribes": "sandbox.work",
                    "activities": {
                        "t1": {"type": "trigger"},
                        "a1": {
                            "type": "worker",
                            "topic": "work.append",
                            "input": {"maps": {"x": "{t1.output.data.a}"}},
                            "job": {"maps": {"b": "{$self.output.data.y}"}}
                        },
                        "a2": {
                            "type": "worker",
                            "topic": "work.append",
                            "input": {"maps": {"x": "{a1.output.data.y}"}},
                            "job": {"maps": {"c": "{$self.output.data.y}"}}
                        }
                    },
                    "transitions": {
                        "t1": [{
                            "to": "a1",
                            "conditions": {
                                "gate": "and",
                                "match": [
                                    {"expected": false, "actual": {"@pipe": [
                                        ["{t1.output.data.a}", "goodbye"],
                                        ["{@conditional.equality}"]
                                    ]}},
                                    {"expected": false, "actual": {"@pipe": [
                                        ["{t1.output.data.a}", "bye"],
                                        ["{@conditional.equality}"]
                                    ]}}
                                ]
                            }
                        }],
                        "a1": [{
                            "to": "a2",
                            "conditions": {
                                "match": [
                                    {"expected": true, "actual": {"@pipe": [
                                        ["{a1.output.data.y}", "hello world"],
                                        ["{@conditional.equality}"]
                                    ]}}
                                ]
                            }
                        }]
                    }
                },
                {
                    "subscribes": "sandbox.initials",
                    "activities": {
                        "t1": {
                            "type": "trigger",
                            "job": {"maps": {"initials": {"@pipe": [
                                ["{$self.output.data.full_name}", " "],
                                ["{@string.split}"],
                                {"@pipe": [["{@array.get}", 0], ["{@string.char_at}", 0]]},
                                {"@pipe": [["{@array.get}", 1], ["{@string.char_at}", 0]]},
                                ["{@string.concat}"]
                            ]}}}
                        }
                    }
                },
                {
                    "subscribes": "sandbox.chain",
                    "activities": {
                        "t1": {"type": "trigger"},
                        "h1": {"type": "hook"},
                        "h2": {"type": "hook"},
                        "h3": {"type": "hook"}
                    },
                    "transitions": {
                        "t1": [{
                            "to": "h1",
                            "conditions": {
                                "match": [{"expected": true, "actual": "{t1.output.data.go}"}]
                            }
                        }],
                        "h1": [{"to": "h2"}],
                        "h2": [{"to": "h3"}]
                    }
                },
                {
                    "subscribes": "sandbox.diamond",
                    "activities": {
                        "t1": {"type": "trigger"},
                        "h1": {"type": "hook"},
                        "h2": {"type": "hook"},
                        "join": {
                            "type": "worker",
                            "topic": "work.count",
                            "job": {"maps": {"joined": true}}
                        }
                    },
                    "transitions": {
                        "t1": [{"to": "h1"}, {"to": "h2"}],
                        "h1": [{"to": "join"}],
                        "h2": [{
                            "to": "join",
                            "conditions": {
                                "match": [{"expected": true, "actual": "{t1.output.data.both}"}]
                            }
                        }]
                    }
                },
                {
                    "subscribes": "parent.flow",
                    "activities": {
                        "t1": {"type": "trigger"},
                        "sub": {
                            "type": "await",
                            "topic": "sandbox.work",
                            "input": {"maps": {"a": "{t1.output.data.a}"}},
                            "job": {"maps": {"sub_b": "{$self.output.data.b}"}}
                        }
                    },
                    "transitions": {
                        "t1": [{"to": "sub"}]
                    }
                },
                {
                    "subscribes": "sandbox.flaky",
                    "activities": {
                        "t1": {"type": "trigger"},
                        "w1": {
                            "type": "worker",
                            "topic": "work.flaky",
                            "input": {"maps": {"x": 1}}
                        }
                    },
                    "transitions": {
                        "t1": [{"to": "w1"}]
                    }
                },
                {
                    "subscribes": "sandbox.schema",
                    "input": {"schema": {
                        "type": "object",
                        "properties": {"a": {"type": "string"}},
                        "required": ["a"]
                    }},
                    "activities": {
                        "t1": {
                            "type": "trigger",
                            "job": {"maps": {"echo": "{$self.output.data.a}"}}
                        }
                    }
                },
                {
                    "subscribes": "sandbox.custom",
                    "activities": {
                        "t1": {
                            "type": "trigger",
                            "job": {"maps": {"loud": {"@pipe": [
                                ["{$self.output.data.word}"],
                                ["{@custom.shout}"]
                            ]}}}
                        }
                    }
                },
                {
                    "subscribes": "sandbox.brittle",
                    "activities": {
                        "t1": {"type": "trigger"},
                        "h1": {"type": "hook"}
                    },
                    "transitions": {
                        "t1": [{
                            "to": "h1",
                            "conditions": {
                                "match": [{"expected": true, "actual": {"@pipe": [
                                    ["{t1.output.data.a}"],
                                    ["oops"]
                                ]}}]
                            }
                        }]
                    }
                },
                {
                    "subscribes": "sandbox.slow",
                    "activities": {
                        "t1": {"type": "trigger"},
                        "w1": {"type": "worker", "topic": "work.slow"}
                    },
                    "transitions": {
                        "t1": [{"to": "w1"}]
                    }
                }
            ]
        }
    })
}

struct TestHarness {
    engine: Arc<Engine>,
    append_calls: Arc<AtomicUsize>,
    count_calls: Arc<AtomicUsize>,
    flaky_calls: Arc<AtomicUsize>,
}

async fn harness() -> TestHarness {
    let engine = Engine::new(Arc::new(InMemoryBackend::new()), EngineConfig::default());

    let append_calls = Arc::new(AtomicUsize::new(0));
    let counter = append_calls.clone();
    engine.register_worker("work.append", move |payload: WorkerPayload| {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            let x = payload.data["x"].as_str().unwrap_or_default().to_string();
            Ok(WorkerPayload {
                metadata: payload.metadata,
                data: json!({"y": format!("{} world", x)}),
            })
        }
    });

    let count_calls = Arc::new(AtomicUsize::new(0));
    let counter = count_calls.clone();
    engine.register_worker("work.count", move |payload: WorkerPayload| {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(WorkerPayload {
                metadata: payload.metadata,
                data: json!({}),
            })
        }
    });

    let flaky_calls = Arc::new(AtomicUsize::new(0));
    let counter = flaky_calls.clone();
    engine.register_worker("work.flaky", move |_payload: WorkerPayload| {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("worker unreachable")
        }
    });

    engine.register_worker("work.slow", move |payload: WorkerPayload| async move {
        tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        Ok(payload)
    });

    engine.register_function("custom.shout", 1, Some(1), |args| {
        let s = args[0]
            .as_json()
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        Ok(crate::pipe::Val::Defined(json!(format!("{}!", s.to_uppercase()))))
    });

    let version = compile(descriptor::from_json(sandbox_descriptor()).unwrap()).unwrap();
    engine.deploy(version).await.unwrap();
    engine.activate("sandbox", "1").await.unwrap();

    TestHarness {
        engine,
        append_calls,
        count_calls,
        flaky_calls,
    }
}

#[tokio::test]
async fn trigger_only_graph_returns_metadata_without_data() {
    let h = harness().await;

    let result = h.engine.request("sandbox.none", json!({})).await.unwrap();
    assert_eq!(result.metadata.status, JobStatus::Completed);
    assert_eq!(result.metadata.app_id, "sandbox");
    assert_eq!(result.metadata.version, "1");
    assert!(result.metadata.completed_at.is_some());
    assert!(result.data.is_none());
}

#[tokio::test]
async fn sequential_workers_append_twice() {
    let h = harness().await;

    let result = h
        .engine
        .request("sandbox.work", json!({"a": "hello"}))
        .await
        .unwrap();
    assert_eq!(result.metadata.status, JobStatus::Completed);
    assert_eq!(
        result.data.unwrap(),
        json!({"b": "hello world", "c": "hello world world"})
    );
    assert_eq!(h.append_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn goodbye_prunes_everything() {
    let h = harness().await;

    let result = h
        .engine
        .request("sandbox.work", json!({"a": "goodbye"}))
        .await
        .unwrap();
    assert_eq!(result.metadata.status, JobStatus::Completed);
    assert!(result.data.is_none());
    assert_eq!(h.append_calls.load(Ordering::SeqCst), 0);

    // Both workers were pruned, not failed
    let job_id = result.metadata.job_id;
    for activity in ["a1", "a2"] {
        let execution = h
            .engine
            .backend
            .get_activity(&job_id, activity)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(execution.status, ActivityStatus::Skipped);
    }
}

#[tokio::test]
async fn help_runs_first_worker_only() {
    let h = harness().await;

    let result = h
        .engine
        .request("sandbox.work", json!({"a": "help"}))
        .await
        .unwrap();
    assert_eq!(result.data.unwrap(), json!({"b": "help world"}));
    assert_eq!(h.append_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn initials_pipe_fans_out_and_back_in() {
    let h = harness().await;

    let result = h
        .engine
        .request("sandbox.initials", json!({"full_name": "John Doe"}))
        .await
        .unwrap();
    assert_eq!(result.data.unwrap(), json!({"initials": "JD"}));
}

#[tokio::test]
async fn pruning_propagates_transitively() {
    let h = harness().await;

    let result = h
        .engine
        .request("sandbox.chain", json!({"go": false}))
        .await
        .unwrap();
    assert_eq!(result.metadata.status, JobStatus::Completed);
    assert!(result.data.is_none());

    let expected = hashmap! {
        "h1" => ActivityStatus::Skipped,
        "h2" => ActivityStatus::Skipped,
        "h3" => ActivityStatus::Skipped,
    };
    for (activity, status) in expected {
        let execution = h
            .engine
            .backend
            .get_activity(&result.metadata.job_id, activity)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(execution.status, status, "activity {}", activity);
    }
}

#[tokio::test]
async fn chain_runs_when_condition_holds() {
    let h = harness().await;

    let result = h
        .engine
        .request("sandbox.chain", json!({"go": true}))
        .await
        .unwrap();
    let execution = h
        .engine
        .backend
        .get_activity(&result.metadata.job_id, "h3")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(execution.status, ActivityStatus::Completed);
}

#[tokio::test]
async fn fan_in_dispatches_exactly_once_when_both_edges_fire() {
    let h = harness().await;

    let result = h
        .engine
        .request("sandbox.diamond", json!({"both": true}))
        .await
        .unwrap();
    assert_eq!(result.data.unwrap(), json!({"joined": true}));
    assert_eq!(h.count_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn fan_in_dispatches_exactly_once_with_one_edge_pruned() {
    let h = harness().await;

    let result = h
        .engine
        .request("sandbox.diamond", json!({"both": false}))
        .await
        .unwrap();
    assert_eq!(result.data.unwrap(), json!({"joined": true}));
    assert_eq!(h.count_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn await_activity_adopts_sub_job_output() {
    let h = harness().await;

    let result = h
        .engine
        .request("parent.flow", json!({"a": "hello"}))
        .await
        .unwrap();
    assert_eq!(result.metadata.status, JobStatus::Completed);
    assert_eq!(result.data.unwrap(), json!({"sub_b": "hello world"}));
    // The sub-job ran both of its workers
    assert_eq!(h.append_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn worker_failure_is_retried_then_fails_the_job() {
    let h = harness().await;

    let result = h.engine.request("sandbox.flaky", json!({})).await.unwrap();
    assert_eq!(result.metadata.status, JobStatus::Failed);
    assert!(result.metadata.error.is_some());
    assert!(result.data.is_none());
    // One initial attempt plus the configured retries
    let expected = 1 + EngineConfig::default().max_dispatch_retries as usize;
    assert_eq!(h.flaky_calls.load(Ordering::SeqCst), expected);
}

#[tokio::test]
async fn failing_input_schema_fails_the_trigger() {
    let h = harness().await;

    let result = h
        .engine
        .request("sandbox.schema", json!({"a": 42}))
        .await
        .unwrap();
    assert_eq!(result.metadata.status, JobStatus::Failed);
    let error = result.metadata.error.unwrap();
    assert_eq!(error["type"], json!("SchemaValidationError"));
    assert!(result.data.is_none());

    let ok = h
        .engine
        .request("sandbox.schema", json!({"a": "fine"}))
        .await
        .unwrap();
    assert_eq!(ok.metadata.status, JobStatus::Completed);
    assert_eq!(ok.data.unwrap(), json!({"echo": "fine"}));
}

#[tokio::test]
async fn malformed_condition_fails_the_source_activity() {
    let h = harness().await;

    let result = h
        .engine
        .request("sandbox.brittle", json!({"a": "x"}))
        .await
        .unwrap();
    assert_eq!(result.metadata.status, JobStatus::Failed);
    let error = result.metadata.error.unwrap();
    assert_eq!(error["type"], json!("InvalidPipeExpression"));

    let job_id = result.metadata.job_id;
    let source = h
        .engine
        .backend
        .get_activity(&job_id, "t1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(source.status, ActivityStatus::Failed);
    assert!(source.error.is_some());

    let target = h
        .engine
        .backend
        .get_activity(&job_id, "h1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(target.status, ActivityStatus::Skipped);
}

#[tokio::test]
async fn registered_functions_are_available_to_mappings() {
    let h = harness().await;

    let result = h
        .engine
        .request("sandbox.custom", json!({"word": "quiet"}))
        .await
        .unwrap();
    assert_eq!(result.data.unwrap(), json!({"loud": "QUIET!"}));
}

#[tokio::test(start_paused = true)]
async fn request_times_out_on_a_stuck_worker() {
    let h = harness().await;

    let err = h.engine.request("sandbox.slow", json!({})).await.unwrap_err();
    assert!(matches!(err, EngineError::RequestTimeout { .. }));
}

#[tokio::test]
async fn unknown_topic_is_rejected() {
    let h = harness().await;

    let err = h.engine.request("sandbox.ghost", json!({})).await.unwrap_err();
    assert!(matches!(err, EngineError::UnknownTopic { .. }));
}

#[tokio::test]
async fn publish_returns_job_id_and_runs_in_background() {
    let h = harness().await;

    let job_id = h
        .engine
        .publish("sandbox.work", json!({"a": "hello"}))
        .await
        .unwrap();

    let mut result = h.engine.job_result(&job_id).await.unwrap();
    for _ in 0..200 {
        if result.metadata.status != JobStatus::Running {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        result = h.engine.job_result(&job_id).await.unwrap();
    }
    assert_eq!(result.metadata.status, JobStatus::Completed);
    assert_eq!(
        result.data.unwrap(),
        json!({"b": "hello world", "c": "hello world world"})
    );
}

#[tokio::test]
async fn redelivered_dispatch_of_terminal_activity_is_a_no_op() {
    let h = harness().await;

    let result = h
        .engine
        .request("sandbox.work", json!({"a": "hello"}))
        .await
        .unwrap();
    let job_id = result.metadata.job_id;
    assert_eq!(h.append_calls.load(Ordering::SeqCst), 2);

    // Simulate at-least-once redelivery of a1's dispatch event
    let app = h
        .engine
        .backend
        .get_version("sandbox", "1")
        .await
        .unwrap()
        .unwrap();
    let eligible = h
        .engine
        .dispatch_activity(app, job_id.clone(), "a1".to_string(), None)
        .await
        .unwrap();

    assert!(eligible.is_empty());
    assert_eq!(h.append_calls.load(Ordering::SeqCst), 2);
    let job = h.engine.backend.get_job(&job_id).await.unwrap().unwrap();
    assert_eq!(job.data, json!({"b": "hello world", "c": "hello world world"}));
}

#[tokio::test]
async fn new_jobs_use_the_newly_activated_version() {
    let h = harness().await;

    let mut v2 = sandbox_descriptor();
    v2["app"]["version"] = json!("2");
    let version = compile(descriptor::from_json(v2).unwrap()).unwrap();
    h.engine.deploy(version).await.unwrap();

    let before = h.engine.request("sandbox.none", json!({})).await.unwrap();
    assert_eq!(before.metadata.version, "1");

    h.engine.activate("sandbox", "2").await.unwrap();
    let after = h.engine.request("sandbox.none", json!({})).await.unwrap();
    assert_eq!(after.metadata.version, "2");
}
