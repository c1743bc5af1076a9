//! Shared fixtures for coordination integration tests

#![allow(
    dead_code,
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    reason = "Each test binary uses a different subset of the fixtures"
)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Value, json};
use skillflow_core::{Error as CoreError, MemoryProbe, Parameters, SkillRegistry, SkillRequest};
use tokio::time::sleep;

/// Records which skills ran and how many ran at once
#[derive(Clone, Default)]
pub struct Recorder {
    calls: Arc<Mutex<Vec<String>>>,
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl Recorder {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn record(&self, params: &Parameters) {
        let label = params
            .get("label")
            .and_then(Value::as_str)
            .unwrap_or("unlabeled")
            .to_owned();
        self.calls.lock().unwrap().push(label);
    }
}

/// Registry with a handful of well-behaved and misbehaving skills.
///
/// - `echo` returns its parameters
/// - `fail` always errors
/// - `slow` sleeps for `millis` then returns its parameters
/// - `tracked` sleeps briefly while counting concurrent invocations
/// - `panic` panics
pub fn registry(recorder: &Recorder) -> SkillRegistry {
    let echo_recorder = recorder.clone();
    let fail_recorder = recorder.clone();
    let slow_recorder = recorder.clone();
    let tracked_recorder = recorder.clone();

    SkillRegistry::new()
        .with_fn("echo", move |params: Parameters| {
            echo_recorder.record(&params);
            async move { Ok(Value::Object(params)) }
        })
        .with_fn("fail", move |params: Parameters| {
            fail_recorder.record(&params);
            async move { Err(CoreError::invocation("fail", "deliberate failure")) }
        })
        .with_fn("slow", move |params: Parameters| {
            slow_recorder.record(&params);
            async move {
                let millis = params.get("millis").and_then(Value::as_u64).unwrap_or(100);
                sleep(Duration::from_millis(millis)).await;
                Ok(Value::Object(params))
            }
        })
        .with_fn("tracked", move |params: Parameters| {
            tracked_recorder.record(&params);
            let active = Arc::clone(&tracked_recorder.active);
            let peak = Arc::clone(&tracked_recorder.peak);
            async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                sleep(Duration::from_millis(30)).await;
                active.fetch_sub(1, Ordering::SeqCst);
                Ok(json!({ "tracked": true }))
            }
        })
        .with_fn("panic", |_params: Parameters| async move { explode() })
}

fn explode() -> skillflow_core::Result<Value> {
    panic!("skill exploded")
}

/// Request for `skill` placed under `task_id`, labeled with the task id.
pub fn request(skill: &str, task_id: &str) -> SkillRequest {
    SkillRequest::new(skill)
        .unwrap()
        .with_task_id(task_id)
        .with_parameter("label", json!(task_id))
}

/// Probe for a project with a manifest and a coordination directory.
pub fn configured_probe() -> Arc<MemoryProbe> {
    Arc::new(
        MemoryProbe::new()
            .with_path("PROJECT_CONSTITUTION.md")
            .with_path(".skillflow"),
    )
}
