//! Integration tests for workflow orchestration across scheduling modes
//!
//! These tests run real workflows against a skill registry and verify
//! ordering, failure propagation, timeouts, cancellation and pool limits.

#![cfg(test)]
#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    clippy::panic,
    clippy::tests_outside_test_module,
    reason = "Test code is allowed to use expect/unwrap and doesn't need panic docs"
)]

mod common;

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use common::{Recorder, registry, request};
use serde_json::{Value, json};
use skillflow_coordination::{
    CancellationHandle, CoordinationError, DependencyEdge, PIPELINE_DATA_KEY, SkillTask,
    TaskStatus, Workflow, WorkflowOrchestrator, WorkflowStatus,
};
use skillflow_core::{ExecutionConfig, Parameters, SkillRegistry, WorkflowMode};

fn orchestrator(recorder: &Recorder) -> WorkflowOrchestrator {
    WorkflowOrchestrator::new(Arc::new(registry(recorder)))
}

fn status_of(workflow: &Workflow, task_id: &str) -> Option<TaskStatus> {
    workflow.task(task_id).map(SkillTask::status)
}

#[tokio::test]
async fn test_parallel_fan_out_runs_in_two_waves() {
    let recorder = Recorder::default();
    let orchestrator = orchestrator(&recorder);
    let mut workflow = orchestrator
        .build_workflow(
            "fan-out",
            vec![
                request("echo", "a"),
                request("echo", "b"),
                request("echo", "c"),
            ],
            &[DependencyEdge::new("b", "a"), DependencyEdge::new("c", "a")],
            WorkflowMode::Parallel,
        )
        .unwrap();

    let results = orchestrator.execute(&mut workflow).await.unwrap();

    assert_eq!(workflow.status(), WorkflowStatus::Completed);
    assert_eq!(results.len(), 3);
    let calls = recorder.calls();
    assert_eq!(calls.first().map(String::as_str), Some("a"));
    assert_eq!(calls.len(), 3);
    for task in workflow.tasks() {
        assert_eq!(task.status(), TaskStatus::Completed);
        assert!(task.started_at().is_some());
        assert!(task.finished_at().is_some());
    }
}

#[tokio::test]
async fn test_adaptive_chain_becomes_pipeline() {
    let recorder = Recorder::default();
    let orchestrator = orchestrator(&recorder);
    let ids = ["a", "b", "c", "d", "e"];
    let requests = ids.iter().map(|id| request("echo", id)).collect();
    let edges: Vec<DependencyEdge> = ids
        .windows(2)
        .map(|pair| DependencyEdge::new(pair[1], pair[0]))
        .collect();
    let mut workflow = orchestrator
        .build_workflow("chain", requests, &edges, WorkflowMode::Adaptive)
        .unwrap();

    assert_eq!(orchestrator.classify(&workflow), WorkflowMode::Pipeline);
    let results = orchestrator.execute(&mut workflow).await.unwrap();

    assert_eq!(recorder.calls(), vec!["a", "b", "c", "d", "e"]);
    assert_eq!(workflow.status(), WorkflowStatus::Completed);

    let first_pipeline = results["a"][PIPELINE_DATA_KEY].as_object().unwrap();
    assert!(first_pipeline.is_empty());

    let last_pipeline = results["e"][PIPELINE_DATA_KEY].as_object().unwrap();
    let mut seen: Vec<&str> = last_pipeline.keys().map(String::as_str).collect();
    seen.sort_unstable();
    assert_eq!(seen, vec!["a", "b", "c", "d"]);
    assert_eq!(last_pipeline["d"]["label"], json!("d"));
}

#[test]
fn test_adaptive_fan_out_becomes_parallel() {
    let recorder = Recorder::default();
    let orchestrator = orchestrator(&recorder);
    let workflow = orchestrator
        .build_workflow(
            "wide",
            vec![
                request("echo", "root"),
                request("echo", "x"),
                request("echo", "y"),
                request("echo", "z"),
            ],
            &[
                DependencyEdge::new("x", "root"),
                DependencyEdge::new("y", "root"),
                DependencyEdge::new("z", "root"),
            ],
            WorkflowMode::Adaptive,
        )
        .unwrap();

    assert_eq!(orchestrator.classify(&workflow), WorkflowMode::Parallel);
    assert_eq!(orchestrator.classify(&workflow), WorkflowMode::Parallel);
}

#[tokio::test]
async fn test_sequential_timeout_halts_workflow() {
    let recorder = Recorder::default();
    let orchestrator = orchestrator(&recorder).with_task_timeout(Duration::from_millis(50));
    let mut workflow = orchestrator
        .build_workflow(
            "timeout",
            vec![
                request("slow", "slow").with_parameter("millis", json!(1_000)),
                request("echo", "after"),
            ],
            &[],
            WorkflowMode::Sequential,
        )
        .unwrap();

    let results = orchestrator.execute(&mut workflow).await.unwrap();

    assert_eq!(workflow.status(), WorkflowStatus::Failed);
    assert!(results.is_empty());
    let slow = workflow.task("slow").unwrap();
    assert_eq!(slow.status(), TaskStatus::Failed);
    assert!(slow.failure_detail().unwrap().starts_with("timed out after"));
    assert_eq!(status_of(&workflow, "after"), Some(TaskStatus::Skipped));
    assert_eq!(recorder.calls(), vec!["slow"]);
}

#[tokio::test]
async fn test_pipeline_halts_on_failure() {
    let recorder = Recorder::default();
    let orchestrator = orchestrator(&recorder);
    let mut workflow = orchestrator
        .build_workflow(
            "pipeline",
            vec![
                request("echo", "first"),
                request("fail", "second"),
                request("echo", "third"),
            ],
            &[],
            WorkflowMode::Pipeline,
        )
        .unwrap();

    let results = orchestrator.execute(&mut workflow).await.unwrap();

    assert_eq!(workflow.status(), WorkflowStatus::Failed);
    assert!(results.contains_key("first"));
    assert!(!results.contains_key("third"));
    assert_eq!(status_of(&workflow, "third"), Some(TaskStatus::Skipped));
    assert_eq!(recorder.calls(), vec!["first", "second"]);
}

#[tokio::test]
async fn test_sequential_skips_tasks_with_unmet_dependencies() {
    let recorder = Recorder::default();
    let orchestrator = orchestrator(&recorder);
    let mut workflow = orchestrator
        .build_workflow(
            "out-of-order",
            vec![request("echo", "early"), request("echo", "late")],
            &[DependencyEdge::new("early", "late")],
            WorkflowMode::Sequential,
        )
        .unwrap();

    orchestrator.execute(&mut workflow).await.unwrap();

    assert_eq!(status_of(&workflow, "early"), Some(TaskStatus::Skipped));
    assert_eq!(status_of(&workflow, "late"), Some(TaskStatus::Completed));
    assert_eq!(workflow.status(), WorkflowStatus::Completed);
}

#[tokio::test]
async fn test_parallel_failure_skips_dependents_only() {
    let recorder = Recorder::default();
    let orchestrator = orchestrator(&recorder);
    let mut workflow = orchestrator
        .build_workflow(
            "partial",
            vec![
                request("fail", "broken"),
                request("echo", "child"),
                request("echo", "grandchild"),
                request("echo", "sibling"),
            ],
            &[
                DependencyEdge::new("child", "broken"),
                DependencyEdge::new("grandchild", "child"),
            ],
            WorkflowMode::Parallel,
        )
        .unwrap();

    let results = orchestrator.execute(&mut workflow).await.unwrap();

    assert_eq!(workflow.status(), WorkflowStatus::PartiallyCompleted);
    assert_eq!(status_of(&workflow, "broken"), Some(TaskStatus::Failed));
    assert_eq!(status_of(&workflow, "child"), Some(TaskStatus::Skipped));
    assert_eq!(status_of(&workflow, "grandchild"), Some(TaskStatus::Skipped));
    assert_eq!(status_of(&workflow, "sibling"), Some(TaskStatus::Completed));
    assert_eq!(results.keys().collect::<Vec<_>>(), vec!["sibling"]);

    let summary = workflow.summary();
    assert_eq!(summary.failed_tasks, 1);
    assert_eq!(summary.skipped_tasks, 2);
    assert_eq!(summary.completed_tasks, 1);
    assert!(summary.completed_at.is_some());
}

#[tokio::test]
async fn test_parallel_respects_worker_limit() {
    let recorder = Recorder::default();
    let orchestrator = orchestrator(&recorder).with_max_workers(2);
    let requests = (0..6)
        .map(|index| request("tracked", &format!("t{index}")))
        .collect();
    let mut workflow = orchestrator
        .build_workflow("bounded", requests, &[], WorkflowMode::Parallel)
        .unwrap();

    orchestrator.execute(&mut workflow).await.unwrap();

    assert_eq!(workflow.status(), WorkflowStatus::Completed);
    assert_eq!(recorder.calls().len(), 6);
    assert!(recorder.peak() <= 2, "peak concurrency was {}", recorder.peak());
    assert!(recorder.peak() >= 1);
}

#[tokio::test]
async fn test_parallel_timeout_fails_only_the_slow_branch() {
    let recorder = Recorder::default();
    let orchestrator = orchestrator(&recorder).with_task_timeout(Duration::from_millis(50));
    let mut workflow = orchestrator
        .build_workflow(
            "parallel-timeout",
            vec![
                request("slow", "slow").with_parameter("millis", json!(1_000)),
                request("echo", "sibling"),
                request("echo", "dependent"),
            ],
            &[DependencyEdge::new("dependent", "slow")],
            WorkflowMode::Parallel,
        )
        .unwrap();

    let results = orchestrator.execute(&mut workflow).await.unwrap();

    assert_eq!(workflow.status(), WorkflowStatus::PartiallyCompleted);
    assert_eq!(status_of(&workflow, "sibling"), Some(TaskStatus::Completed));
    let slow = workflow.task("slow").unwrap();
    assert_eq!(slow.status(), TaskStatus::Failed);
    assert!(slow.failure_detail().unwrap().starts_with("timed out after"));
    assert_eq!(status_of(&workflow, "dependent"), Some(TaskStatus::Skipped));
    assert_eq!(results.keys().collect::<Vec<_>>(), vec!["sibling"]);
    assert!(!recorder.calls().contains(&"dependent".to_owned()));
}

#[tokio::test]
async fn test_parallel_panic_is_internal_error() {
    let recorder = Recorder::default();
    let orchestrator = orchestrator(&recorder);
    let mut workflow = orchestrator
        .build_workflow(
            "panics",
            vec![
                request("panic", "boom"),
                request("slow", "sibling").with_parameter("millis", json!(1_000)),
                request("echo", "later"),
            ],
            &[DependencyEdge::new("later", "sibling")],
            WorkflowMode::Parallel,
        )
        .unwrap();

    let result = orchestrator.execute(&mut workflow).await;

    assert!(matches!(result, Err(CoordinationError::Internal(_))));
    assert_eq!(workflow.status(), WorkflowStatus::Failed);
    let boom = workflow.task("boom").unwrap();
    assert_eq!(boom.status(), TaskStatus::Failed);
    assert!(boom.failure_detail().unwrap().starts_with("task panicked"));
    let sibling = workflow.task("sibling").unwrap();
    assert_eq!(sibling.status(), TaskStatus::Failed);
    assert_eq!(sibling.failure_detail(), Some("aborted after sibling panic"));
    assert_eq!(status_of(&workflow, "later"), Some(TaskStatus::Skipped));
    assert!(workflow.tasks().iter().all(|task| task.status().is_terminal()));
}

/// Registry whose `cancel` skill cancels whichever workflow is placed in the slot.
fn cancelling_registry(slot: &Arc<OnceLock<CancellationHandle>>) -> SkillRegistry {
    let trigger = Arc::clone(slot);
    SkillRegistry::new()
        .with_fn("cancel", move |params: Parameters| {
            if let Some(handle) = trigger.get() {
                handle.cancel();
            }
            async move { Ok(Value::Object(params)) }
        })
        .with_fn("echo", |params: Parameters| async move {
            Ok(Value::Object(params))
        })
}

#[tokio::test]
async fn test_cancellation_between_waves() {
    let slot = Arc::new(OnceLock::new());
    let orchestrator = WorkflowOrchestrator::new(Arc::new(cancelling_registry(&slot)));
    let mut workflow = orchestrator
        .build_workflow(
            "cancelled",
            vec![request("cancel", "first"), request("echo", "second")],
            &[DependencyEdge::new("second", "first")],
            WorkflowMode::Parallel,
        )
        .unwrap();
    slot.set(workflow.cancellation_handle()).unwrap();

    let results = orchestrator.execute(&mut workflow).await.unwrap();

    assert!(workflow.is_cancelled());
    assert_eq!(workflow.status(), WorkflowStatus::Cancelled);
    assert_eq!(status_of(&workflow, "first"), Some(TaskStatus::Completed));
    assert_eq!(status_of(&workflow, "second"), Some(TaskStatus::Skipped));
    assert!(results.contains_key("first"));
}

#[tokio::test]
async fn test_cancel_does_not_carry_over_to_next_workflow() {
    let slot = Arc::new(OnceLock::new());
    let orchestrator = WorkflowOrchestrator::new(Arc::new(cancelling_registry(&slot)));
    let edges = [DependencyEdge::new("second", "first")];
    let mut cancelled = orchestrator
        .build_workflow(
            "cancelled",
            vec![request("cancel", "first"), request("echo", "second")],
            &edges,
            WorkflowMode::Sequential,
        )
        .unwrap();
    slot.set(cancelled.cancellation_handle()).unwrap();
    orchestrator.execute(&mut cancelled).await.unwrap();
    assert_eq!(cancelled.status(), WorkflowStatus::Cancelled);

    let mut next = orchestrator
        .build_workflow(
            "next",
            vec![request("echo", "first"), request("echo", "second")],
            &edges,
            WorkflowMode::Sequential,
        )
        .unwrap();
    let results = orchestrator.execute(&mut next).await.unwrap();

    assert!(!next.is_cancelled());
    assert_eq!(next.status(), WorkflowStatus::Completed);
    assert_eq!(results.len(), 2);
}

#[test]
fn test_from_config_rejects_empty_worker_pool() {
    let recorder = Recorder::default();
    let config = ExecutionConfig {
        max_workers: 0,
        ..ExecutionConfig::default()
    };

    let result = WorkflowOrchestrator::from_config(Arc::new(registry(&recorder)), &config);

    let error = result.err().expect("an empty pool should be rejected");
    assert!(matches!(error, CoordinationError::Configuration(_)));
    assert!(error.to_string().contains("max_workers"));
}

#[test]
fn test_from_config_applies_execution_settings() {
    let recorder = Recorder::default();
    let config = ExecutionConfig {
        max_workers: 2,
        task_timeout_seconds: 7,
        ..ExecutionConfig::default()
    };

    let orchestrator =
        WorkflowOrchestrator::from_config(Arc::new(registry(&recorder)), &config).unwrap();

    assert_eq!(orchestrator.max_workers(), 2);
    assert_eq!(orchestrator.task_timeout(), Duration::from_secs(7));
}

#[test]
fn test_cyclic_workflow_is_rejected() {
    let recorder = Recorder::default();
    let orchestrator = orchestrator(&recorder);
    let result = orchestrator.build_workflow(
        "cycle",
        vec![request("echo", "a"), request("echo", "b")],
        &[DependencyEdge::new("a", "b"), DependencyEdge::new("b", "a")],
        WorkflowMode::Parallel,
    );

    let error = result.err().expect("cycle should be rejected");
    assert!(error.is_structural());
    assert!(matches!(error, CoordinationError::CyclicDependency { .. }));
    assert!(recorder.calls().is_empty());
}

#[test]
fn test_every_acyclic_shape_builds() {
    let recorder = Recorder::default();
    let orchestrator = orchestrator(&recorder);
    let shapes: Vec<Vec<DependencyEdge>> = vec![
        Vec::new(),
        vec![DependencyEdge::new("b", "a")],
        vec![DependencyEdge::new("c", "a"), DependencyEdge::new("c", "b")],
        vec![
            DependencyEdge::new("b", "a"),
            DependencyEdge::new("c", "b"),
            DependencyEdge::new("d", "a"),
        ],
    ];

    for edges in shapes {
        let requests = ["a", "b", "c", "d"]
            .iter()
            .map(|id| request("echo", id))
            .collect();
        let built = orchestrator.build_workflow("shape", requests, &edges, WorkflowMode::Adaptive);
        if let Err(err) = built {
            panic!("edges {edges:?} should build: {err}");
        }
    }
}
