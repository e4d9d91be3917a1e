//! Activities and helpers shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use hataori::prelude::*;
use hataori::StoreError;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Completes with the outcomes listed in its `outcomes` property.
#[derive(Debug, Default)]
pub struct Emit;

impl Emit {
    fn configured(activity: &ActivityContext) -> Vec<String> {
        activity
            .configuration()
            .get::<Vec<String>>("outcomes")
            .unwrap_or_default()
    }
}

#[async_trait]
impl Activity for Emit {
    fn name(&self) -> &str {
        "Emit"
    }

    fn possible_outcomes(&self, _: &WorkflowContext, activity: &ActivityContext) -> Vec<Outcome> {
        outcomes(Self::configured(activity))
    }

    async fn execute(
        &self,
        _workflow: &mut WorkflowContext,
        activity: &mut ActivityContext,
    ) -> Result<ActivityOutput, ActivityError> {
        Ok(ActivityOutput::outcomes(Self::configured(activity)))
    }
}

/// Event that halts until the workflow property named by its `flag`
/// property (default `approved`) is `true`. Counts its attempts in its own
/// state and publishes the count as `attempts:<id>` when it proceeds.
#[derive(Debug, Default)]
pub struct WaitFor;

#[async_trait]
impl Activity for WaitFor {
    fn name(&self) -> &str {
        "WaitFor"
    }

    fn kind(&self) -> ActivityKind {
        ActivityKind::Event
    }

    fn possible_outcomes(&self, _: &WorkflowContext, _: &ActivityContext) -> Vec<Outcome> {
        outcomes(["Done"])
    }

    async fn execute(
        &self,
        workflow: &mut WorkflowContext,
        activity: &mut ActivityContext,
    ) -> Result<ActivityOutput, ActivityError> {
        let attempts = activity.state.get::<u32>("attempts").unwrap_or(0) + 1;
        activity.state.insert("attempts", attempts);

        let flag = activity
            .configuration()
            .get::<String>("flag")
            .unwrap_or_else(|| "approved".to_string());
        if workflow.properties.get::<bool>(&flag) != Some(true) {
            return Ok(ActivityOutput::halt());
        }

        workflow
            .properties
            .insert(format!("attempts:{}", activity.activity_id()), attempts);
        Ok(ActivityOutput::outcome("Done"))
    }
}

/// Bumps the `count` workflow property and answers `Again` until it
/// reaches the `limit` property, then `Enough`.
#[derive(Debug, Default)]
pub struct Counter;

#[async_trait]
impl Activity for Counter {
    fn name(&self) -> &str {
        "Counter"
    }

    fn possible_outcomes(&self, _: &WorkflowContext, _: &ActivityContext) -> Vec<Outcome> {
        outcomes(["Again", "Enough"])
    }

    async fn execute(
        &self,
        workflow: &mut WorkflowContext,
        activity: &mut ActivityContext,
    ) -> Result<ActivityOutput, ActivityError> {
        let count = workflow.properties.get::<u32>("count").unwrap_or(0) + 1;
        workflow.properties.insert("count", count);
        let limit = activity.configuration().get::<u32>("limit").unwrap_or(1);
        if count < limit {
            Ok(ActivityOutput::outcome("Again"))
        } else {
            Ok(ActivityOutput::outcome("Enough"))
        }
    }
}

/// Always fails.
#[derive(Debug, Default)]
pub struct Fail;

#[async_trait]
impl Activity for Fail {
    fn name(&self) -> &str {
        "Fail"
    }

    fn possible_outcomes(&self, _: &WorkflowContext, _: &ActivityContext) -> Vec<Outcome> {
        outcomes(["Done"])
    }

    async fn execute(
        &self,
        _workflow: &mut WorkflowContext,
        _activity: &mut ActivityContext,
    ) -> Result<ActivityOutput, ActivityError> {
        Err(ActivityError::failed("boom"))
    }
}

/// A task that tries to halt.
#[derive(Debug, Default)]
pub struct HaltingTask;

#[async_trait]
impl Activity for HaltingTask {
    fn name(&self) -> &str {
        "HaltingTask"
    }

    fn possible_outcomes(&self, _: &WorkflowContext, _: &ActivityContext) -> Vec<Outcome> {
        outcomes(["Done"])
    }

    async fn execute(
        &self,
        _workflow: &mut WorkflowContext,
        _activity: &mut ActivityContext,
    ) -> Result<ActivityOutput, ActivityError> {
        Ok(ActivityOutput::halt())
    }
}

/// Gated activity that only runs while the `open` property is `true`.
#[derive(Debug)]
pub struct Gated {
    kind: ActivityKind,
}

impl Gated {
    pub fn event() -> Self {
        Self {
            kind: ActivityKind::Event,
        }
    }

    pub fn task() -> Self {
        Self {
            kind: ActivityKind::Task,
        }
    }
}

#[async_trait]
impl Activity for Gated {
    fn name(&self) -> &str {
        match self.kind {
            ActivityKind::Event => "GatedEvent",
            ActivityKind::Task => "GatedTask",
        }
    }

    fn kind(&self) -> ActivityKind {
        self.kind
    }

    fn possible_outcomes(&self, _: &WorkflowContext, _: &ActivityContext) -> Vec<Outcome> {
        outcomes(["Done"])
    }

    async fn can_execute(
        &self,
        workflow: &WorkflowContext,
        _activity: &ActivityContext,
    ) -> Result<bool, ActivityError> {
        Ok(workflow.properties.get::<bool>("open") == Some(true))
    }

    async fn execute(
        &self,
        _workflow: &mut WorkflowContext,
        _activity: &mut ActivityContext,
    ) -> Result<ActivityOutput, ActivityError> {
        Ok(ActivityOutput::outcome("Done"))
    }
}

pub type Calls = Arc<Mutex<Vec<String>>>;

/// Records every hook it receives.
#[derive(Debug)]
pub struct Recorder {
    pub calls: Calls,
}

impl Recorder {
    fn record(&self, entry: String) -> Result<(), ActivityError> {
        self.calls.lock().push(entry);
        Ok(())
    }
}

#[async_trait]
impl Activity for Recorder {
    fn name(&self) -> &str {
        "Recorder"
    }

    fn possible_outcomes(&self, _: &WorkflowContext, _: &ActivityContext) -> Vec<Outcome> {
        outcomes(["Done"])
    }

    async fn execute(
        &self,
        _workflow: &mut WorkflowContext,
        _activity: &mut ActivityContext,
    ) -> Result<ActivityOutput, ActivityError> {
        Ok(ActivityOutput::outcome("Done"))
    }

    async fn on_workflow_starting(
        &self,
        _workflow: &mut WorkflowContext,
        _cancel: &CancellationToken,
    ) -> Result<(), ActivityError> {
        self.record(HookKind::WorkflowStarting.to_string())
    }

    async fn on_workflow_started(
        &self,
        _workflow: &mut WorkflowContext,
    ) -> Result<(), ActivityError> {
        self.record(HookKind::WorkflowStarted.to_string())
    }

    async fn on_workflow_resuming(
        &self,
        _workflow: &mut WorkflowContext,
        _cancel: &CancellationToken,
    ) -> Result<(), ActivityError> {
        self.record(HookKind::WorkflowResuming.to_string())
    }

    async fn on_workflow_resumed(
        &self,
        _workflow: &mut WorkflowContext,
    ) -> Result<(), ActivityError> {
        self.record(HookKind::WorkflowResumed.to_string())
    }

    async fn on_activity_executing(
        &self,
        _workflow: &mut WorkflowContext,
        activity: &ActivityContext,
        _cancel: &CancellationToken,
    ) -> Result<(), ActivityError> {
        self.record(format!("{}:{}", HookKind::ActivityExecuting, activity.activity_id()))
    }

    async fn on_activity_executed(
        &self,
        _workflow: &mut WorkflowContext,
        activity: &ActivityContext,
    ) -> Result<(), ActivityError> {
        self.record(format!("{}:{}", HookKind::ActivityExecuted, activity.activity_id()))
    }
}

/// Refuses to let any workflow start.
#[derive(Debug, Default)]
pub struct Grumpy;

#[async_trait]
impl Activity for Grumpy {
    fn name(&self) -> &str {
        "Grumpy"
    }

    fn possible_outcomes(&self, _: &WorkflowContext, _: &ActivityContext) -> Vec<Outcome> {
        outcomes(["Done"])
    }

    async fn execute(
        &self,
        _workflow: &mut WorkflowContext,
        _activity: &mut ActivityContext,
    ) -> Result<ActivityOutput, ActivityError> {
        Ok(ActivityOutput::outcome("Done"))
    }

    async fn on_workflow_started(
        &self,
        _workflow: &mut WorkflowContext,
    ) -> Result<(), ActivityError> {
        Err(ActivityError::failed("not today"))
    }
}

/// Cancels the token it was built with, then completes.
#[derive(Debug)]
pub struct Canceller {
    pub token: CancellationToken,
}

#[async_trait]
impl Activity for Canceller {
    fn name(&self) -> &str {
        "Canceller"
    }

    fn possible_outcomes(&self, _: &WorkflowContext, _: &ActivityContext) -> Vec<Outcome> {
        outcomes(["Done"])
    }

    async fn execute(
        &self,
        _workflow: &mut WorkflowContext,
        _activity: &mut ActivityContext,
    ) -> Result<ActivityOutput, ActivityError> {
        self.token.cancel();
        Ok(ActivityOutput::outcome("Done"))
    }
}

/// Event that parks until notified, then completes.
#[derive(Debug)]
pub struct Blocker {
    pub release: Arc<tokio::sync::Notify>,
}

#[async_trait]
impl Activity for Blocker {
    fn name(&self) -> &str {
        "Blocker"
    }

    fn kind(&self) -> ActivityKind {
        ActivityKind::Event
    }

    fn possible_outcomes(&self, _: &WorkflowContext, _: &ActivityContext) -> Vec<Outcome> {
        outcomes(["Done"])
    }

    async fn execute(
        &self,
        workflow: &mut WorkflowContext,
        _activity: &mut ActivityContext,
    ) -> Result<ActivityOutput, ActivityError> {
        if !workflow.is_resuming() {
            return Ok(ActivityOutput::halt());
        }
        self.release.notified().await;
        Ok(ActivityOutput::outcome("Done"))
    }
}

/// Store whose writes can be made to fail.
#[derive(Debug, Default)]
pub struct FlakyStore {
    pub inner: InMemoryWorkflowStore,
    pub fail_saves: AtomicBool,
}

impl FlakyStore {
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl WorkflowStore for FlakyStore {
    async fn load(&self, instance_id: Uuid) -> Result<Option<WorkflowInstance>, StoreError> {
        self.inner.load(instance_id).await
    }

    async fn claim(
        &self,
        instance_id: Uuid,
        revision: u64,
    ) -> Result<WorkflowInstance, StoreError> {
        self.inner.claim(instance_id, revision).await
    }

    async fn release(&self, instance_id: Uuid, revision: u64) -> Result<(), StoreError> {
        self.inner.release(instance_id, revision).await
    }

    async fn save(&self, instance: &WorkflowInstance) -> Result<u64, StoreError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("disk on fire".to_string()));
        }
        self.inner.save(instance).await
    }

    async fn find_by_correlation(
        &self,
        correlation_key: &str,
    ) -> Result<Vec<WorkflowInstance>, StoreError> {
        self.inner.find_by_correlation(correlation_key).await
    }
}

/// Registry with every plain test activity.
pub fn registry() -> ActivityRegistry {
    ActivityRegistry::new()
        .register(Emit::default)
        .register(WaitFor::default)
        .register(Fail::default)
        .register(Counter::default)
        .register(HaltingTask::default)
        .register(Gated::event)
        .register(Gated::task)
        .register(Grumpy::default)
}

pub fn engine_with(registry: ActivityRegistry, store: Arc<dyn WorkflowStore>) -> WorkflowEngine {
    WorkflowEngine::builder()
        .registry(registry)
        .store(store)
        .build()
        .expect("valid engine")
}

/// Engine over the default registry and a fresh in-memory store.
pub fn engine() -> (WorkflowEngine, Arc<InMemoryWorkflowStore>) {
    let store = Arc::new(InMemoryWorkflowStore::new());
    (engine_with(registry(), store.clone()), store)
}

pub fn emit(id: &str, outcomes: &[&str]) -> ActivityRecord {
    ActivityRecord::new(id, "Emit").with_property("outcomes", outcomes.to_vec())
}

pub fn props(entries: &[(&str, bool)]) -> PropertyBag {
    entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

/// The execution log as `(activity id, outcome)` pairs.
pub fn trail(instance: &WorkflowInstance) -> Vec<(String, Option<String>)> {
    instance
        .log
        .iter()
        .map(|e| (e.activity_id.to_string(), e.outcome.clone()))
        .collect()
}

pub fn step(id: &str, outcome: Option<&str>) -> (String, Option<String>) {
    (id.to_string(), outcome.map(str::to_string))
}
