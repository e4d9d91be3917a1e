//! Workflow engine: publishes definitions, starts and resumes instances.

use crate::config::EngineConfig;
use crate::definition::WorkflowDefinition;
use crate::dispatcher::{BoundActivity, Hook, HookFailure, LifecycleDispatcher};
use crate::error::{ValidationError, WorkflowError};
use crate::instance::{
    BlockingActivity, ExecutionLogEntry, FaultInfo, RunReport, WorkflowInstance, WorkflowStatus,
};
use crate::registry::{ActivityRegistry, ResolveError};
use crate::store::WorkflowStore;
use chrono::Utc;
use hataori_core::{
    ActivityContext, ActivityError, ActivityId, ActivityOutput, CancellationToken, PropertyBag,
    WorkflowContext,
};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A frontier entry: an activity waiting to be offered in the current pass.
#[derive(Debug)]
struct Pending {
    activity_id: ActivityId,
    /// Saved state when re-entering a halted activity.
    resumed: Option<PropertyBag>,
}

impl Pending {
    fn fresh(activity_id: ActivityId) -> Self {
        Self {
            activity_id,
            resumed: None,
        }
    }

    fn resumed(blocking: BlockingActivity) -> Self {
        Self {
            activity_id: blocking.activity_id,
            resumed: Some(blocking.state),
        }
    }
}

/// Input of one pass.
#[derive(Debug)]
struct Pass {
    frontier: VecDeque<Pending>,
    /// Blocking activities not offered to this pass.
    waiting: Vec<BlockingActivity>,
    resuming: bool,
}

impl Pass {
    fn start(definition: &WorkflowDefinition) -> Self {
        Self {
            frontier: definition
                .start_activities()
                .map(|record| Pending::fresh(record.id.clone()))
                .collect(),
            waiting: Vec::new(),
            resuming: false,
        }
    }

    fn resume(offered: Vec<BlockingActivity>, waiting: Vec<BlockingActivity>) -> Self {
        Self {
            frontier: offered.into_iter().map(Pending::resumed).collect(),
            waiting,
            resuming: true,
        }
    }
}

/// Why a pass stopped early.
enum PassError {
    Cancelled,
    Fault(FaultInfo),
}

impl PassError {
    fn activity(activity_id: &ActivityId, error: &ActivityError) -> Self {
        PassError::Fault(FaultInfo {
            activity_id: Some(activity_id.clone()),
            hook: None,
            error: error.to_string(),
            occurred_at: Utc::now(),
        })
    }
}

impl From<HookFailure> for PassError {
    fn from(failure: HookFailure) -> Self {
        PassError::Fault(FaultInfo {
            activity_id: Some(failure.activity_id),
            hook: Some(failure.hook),
            error: failure.error.to_string(),
            occurred_at: Utc::now(),
        })
    }
}

/// Drives workflow instances through their definitions.
///
/// Each call to [`start`](Self::start) or [`resume`](Self::resume) runs one
/// pass: activities execute one at a time in frontier order until the
/// frontier drains (`Finished`), only blocking activities remain
/// (`Halted`), or something fails (`Faulted`). The resulting snapshot is
/// saved exactly once.
///
/// # Examples
///
/// ```
/// use hataori::prelude::*;
/// use async_trait::async_trait;
/// use std::sync::Arc;
///
/// #[derive(Debug, Default)]
/// struct Greet;
///
/// #[async_trait]
/// impl Activity for Greet {
///     fn name(&self) -> &str {
///         "Greet"
///     }
///
///     fn possible_outcomes(&self, _: &WorkflowContext, _: &ActivityContext) -> Vec<Outcome> {
///         outcomes(["Done"])
///     }
///
///     async fn execute(
///         &self,
///         workflow: &mut WorkflowContext,
///         _activity: &mut ActivityContext,
///     ) -> Result<ActivityOutput, ActivityError> {
///         workflow.properties.insert("greeting", "hello");
///         Ok(ActivityOutput::outcome("Done"))
///     }
/// }
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), WorkflowError> {
/// let store = Arc::new(InMemoryWorkflowStore::new());
/// let engine = WorkflowEngine::builder()
///     .registry(ActivityRegistry::new().register(Greet::default))
///     .store(store.clone())
///     .build()?;
///
/// engine.publish(
///     WorkflowDefinition::builder("greeting", 1)
///         .activity(ActivityRecord::new("greet", "Greet").as_start())
///         .build(),
/// )?;
///
/// let report = engine.start("greeting", PropertyBag::new(), None).await?;
/// assert_eq!(report.status, WorkflowStatus::Finished);
/// # Ok(())
/// # }
/// ```
pub struct WorkflowEngine {
    registry: Arc<ActivityRegistry>,
    store: Arc<dyn WorkflowStore>,
    config: EngineConfig,
    definitions: RwLock<HashMap<String, BTreeMap<u32, Arc<WorkflowDefinition>>>>,
}

impl fmt::Debug for WorkflowEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowEngine")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .field(
                "definitions",
                &self.definitions.read().keys().cloned().collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl WorkflowEngine {
    /// Creates a new engine builder.
    pub fn builder() -> WorkflowEngineBuilder {
        WorkflowEngineBuilder::new()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &ActivityRegistry {
        &self.registry
    }

    /// Checks a definition against the registry.
    ///
    /// Rejects definitions with no start activity, duplicate ids, activity
    /// names the registry cannot resolve, transitions touching unknown
    /// activities, and transitions on outcomes their source never declares.
    pub fn validate(&self, definition: &WorkflowDefinition) -> Result<(), ValidationError> {
        if definition.start_activities().next().is_none() {
            return Err(ValidationError::NoStartActivity {
                definition_id: definition.id.clone(),
            });
        }

        let mut seen = HashSet::new();
        for record in &definition.activities {
            if !seen.insert(record.id.as_str()) {
                return Err(ValidationError::DuplicateActivity(record.id.clone()));
            }
        }

        let dispatcher = self.materialize(definition)?;
        let scratch = WorkflowContext::new(
            Uuid::nil(),
            definition.id.clone(),
            definition.version,
            None,
            PropertyBag::new(),
        );

        for transition in &definition.transitions {
            let source = dispatcher
                .get(transition.source.as_str())
                .ok_or_else(|| ValidationError::UnknownSource(transition.source.clone()))?;
            if dispatcher.get(transition.destination.as_str()).is_none() {
                return Err(ValidationError::UnknownDestination(
                    transition.destination.clone(),
                ));
            }

            let context = ActivityContext::new(source.record.clone());
            let declared = source
                .activity
                .possible_outcomes(&scratch, &context)
                .iter()
                .any(|o| o.name() == transition.outcome);
            if !declared {
                return Err(ValidationError::UndeclaredOutcome {
                    activity_id: transition.source.clone(),
                    outcome: transition.outcome.clone(),
                });
            }
        }

        Ok(())
    }

    /// Validates and publishes a definition version.
    ///
    /// Published versions are immutable; publishing the same id and version
    /// twice is rejected.
    pub fn publish(
        &self,
        definition: WorkflowDefinition,
    ) -> Result<Arc<WorkflowDefinition>, WorkflowError> {
        self.validate(&definition)?;

        let mut definitions = self.definitions.write();
        let versions = definitions.entry(definition.id.clone()).or_default();
        if versions.contains_key(&definition.version) {
            return Err(ValidationError::AlreadyPublished {
                definition_id: definition.id,
                version: definition.version,
            }
            .into());
        }

        info!(
            definition_id = %definition.id,
            version = definition.version,
            activities = definition.activities.len(),
            "Workflow definition published"
        );
        let definition = Arc::new(definition);
        versions.insert(definition.version, definition.clone());
        Ok(definition)
    }

    /// Returns a published definition; the latest version when `version`
    /// is `None`.
    pub fn definition(
        &self,
        definition_id: &str,
        version: Option<u32>,
    ) -> Option<Arc<WorkflowDefinition>> {
        let definitions = self.definitions.read();
        let versions = definitions.get(definition_id)?;
        match version {
            Some(v) => versions.get(&v).cloned(),
            None => versions.values().next_back().cloned(),
        }
    }

    /// Loads an instance snapshot from the store.
    pub async fn instance(&self, instance_id: Uuid) -> Result<WorkflowInstance, WorkflowError> {
        self.store
            .load(instance_id)
            .await?
            .ok_or(WorkflowError::InstanceNotFound(instance_id))
    }

    /// Starts a new instance of the latest version of `definition_id`.
    pub async fn start(
        &self,
        definition_id: &str,
        properties: PropertyBag,
        correlation_key: Option<String>,
    ) -> Result<RunReport, WorkflowError> {
        self.start_with_cancellation(
            definition_id,
            properties,
            correlation_key,
            &CancellationToken::new(),
        )
        .await
    }

    /// Like [`start`](Self::start), observing `cancel`.
    ///
    /// A cancelled start persists nothing and returns
    /// [`WorkflowError::Cancelled`].
    pub async fn start_with_cancellation(
        &self,
        definition_id: &str,
        properties: PropertyBag,
        correlation_key: Option<String>,
        cancel: &CancellationToken,
    ) -> Result<RunReport, WorkflowError> {
        let definition =
            self.definition(definition_id, None)
                .ok_or_else(|| WorkflowError::DefinitionNotFound {
                    definition_id: definition_id.to_string(),
                    version: None,
                })?;
        let dispatcher = self.materialize(&definition)?;

        let mut instance = WorkflowInstance::new(
            definition.id.clone(),
            definition.version,
            correlation_key,
            properties,
        );
        instance.status = WorkflowStatus::Executing;

        info!(
            instance_id = %instance.id,
            definition_id = %definition.id,
            version = definition.version,
            "Starting workflow"
        );

        let executed = match self
            .run_pass(&definition, &dispatcher, &mut instance, Pass::start(&definition), cancel)
            .await
        {
            Some(executed) => executed,
            None => {
                info!(instance_id = %instance.id, "Workflow start cancelled");
                return Err(WorkflowError::Cancelled);
            }
        };

        if let Err(e) = self.store.save(&instance).await {
            warn!(
                instance_id = %instance.id,
                error = %e,
                "Failed to persist new workflow instance"
            );
            return Err(e.into());
        }
        Ok(RunReport::from_instance(&instance, executed))
    }

    /// Resumes a halted instance.
    ///
    /// `resuming` limits which blocking activities are offered; the others
    /// stay blocking. `properties` are merged into the instance's property
    /// bag before the pass.
    pub async fn resume(
        &self,
        instance_id: Uuid,
        resuming: Option<&[ActivityId]>,
        properties: PropertyBag,
    ) -> Result<RunReport, WorkflowError> {
        self.resume_with_cancellation(instance_id, resuming, properties, &CancellationToken::new())
            .await
    }

    /// Like [`resume`](Self::resume), observing `cancel`.
    ///
    /// A cancelled resume releases the instance back to its last saved
    /// halted state and returns [`WorkflowError::Cancelled`].
    pub async fn resume_with_cancellation(
        &self,
        instance_id: Uuid,
        resuming: Option<&[ActivityId]>,
        properties: PropertyBag,
        cancel: &CancellationToken,
    ) -> Result<RunReport, WorkflowError> {
        let snapshot = self.instance(instance_id).await?;
        match snapshot.status {
            WorkflowStatus::Halted => {}
            WorkflowStatus::Executing => {
                warn!(%instance_id, "Resume rejected: instance is already executing");
                return Err(WorkflowError::ConcurrencyConflict { instance_id });
            }
            status => return Err(WorkflowError::InvalidState { instance_id, status }),
        }

        let mut instance = match self.store.claim(instance_id, snapshot.revision).await {
            Ok(instance) => instance,
            Err(e) => {
                warn!(%instance_id, error = %e, "Resume rejected: claim failed");
                return Err(e.into());
            }
        };
        let claimed = instance.revision;

        let Some(definition) =
            self.definition(&instance.definition_id, Some(instance.definition_version))
        else {
            self.release(instance_id, claimed).await;
            return Err(WorkflowError::DefinitionNotFound {
                definition_id: instance.definition_id,
                version: Some(instance.definition_version),
            });
        };

        let (offered, kept) = split_blocking(
            std::mem::take(&mut instance.blocking_activities),
            resuming,
            instance_id,
        );
        if offered.is_empty() {
            debug!(%instance_id, "No blocking activity matched the resume request");
            self.release(instance_id, claimed).await;
            let current = self.instance(instance_id).await?;
            return Ok(RunReport::from_instance(&current, 0));
        }

        instance.properties.merge(properties);

        info!(
            %instance_id,
            definition_id = %definition.id,
            resuming = ?offered.iter().map(|b| b.activity_id.as_str()).collect::<Vec<_>>(),
            "Resuming workflow"
        );

        let executed = match self.materialize(&definition) {
            Ok(dispatcher) => {
                let pass = Pass::resume(offered, kept);
                match self
                    .run_pass(&definition, &dispatcher, &mut instance, pass, cancel)
                    .await
                {
                    Some(executed) => executed,
                    None => {
                        info!(%instance_id, "Workflow resume cancelled");
                        self.release(instance_id, claimed).await;
                        return Err(WorkflowError::Cancelled);
                    }
                }
            }
            Err(e) => {
                warn!(%instance_id, error = %e, "Activities could not be materialized");
                fault(
                    &mut instance,
                    FaultInfo {
                        activity_id: None,
                        hook: None,
                        error: e.to_string(),
                        occurred_at: Utc::now(),
                    },
                );
                0
            }
        };

        if let Err(e) = self.store.save(&instance).await {
            warn!(%instance_id, error = %e, "Failed to persist resumed workflow instance");
            self.release(instance_id, claimed).await;
            return Err(e.into());
        }
        Ok(RunReport::from_instance(&instance, executed))
    }

    /// Resolves every record of `definition` to a fresh activity.
    fn materialize(
        &self,
        definition: &WorkflowDefinition,
    ) -> Result<LifecycleDispatcher, ValidationError> {
        definition
            .activities
            .iter()
            .map(|record| {
                let activity = self.registry.resolve(&record.name).map_err(|e| match e {
                    ResolveError::Unknown => ValidationError::UnknownActivity {
                        activity_id: record.id.clone(),
                        name: record.name.clone(),
                    },
                    ResolveError::FeatureDisabled { feature_id } => {
                        ValidationError::FeatureDisabled {
                            activity_id: record.id.clone(),
                            name: record.name.clone(),
                            feature_id,
                        }
                    }
                })?;
                Ok(BoundActivity {
                    record: record.clone(),
                    activity,
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(LifecycleDispatcher::new)
    }

    /// Runs one pass and records its result on `instance`.
    ///
    /// Blocking activities not offered to the pass stay blocking ahead of
    /// anything the pass halts on. Returns the number of executed
    /// activities, or `None` if the pass was cancelled, in which case
    /// `instance` must be discarded.
    async fn run_pass(
        &self,
        definition: &WorkflowDefinition,
        dispatcher: &LifecycleDispatcher,
        instance: &mut WorkflowInstance,
        pass: Pass,
        cancel: &CancellationToken,
    ) -> Option<usize> {
        let Pass {
            frontier,
            mut waiting,
            resuming,
        } = pass;
        let mut workflow = WorkflowContext::new(
            instance.id,
            instance.definition_id.clone(),
            instance.definition_version,
            instance.correlation_key.clone(),
            std::mem::take(&mut instance.properties),
        )
        .with_resuming(resuming);

        let mut executed = 0;
        let result = self
            .drive(
                definition,
                dispatcher,
                &mut workflow,
                &mut instance.log,
                frontier,
                cancel,
                &mut executed,
            )
            .await;
        instance.properties = workflow.properties;

        match result {
            Ok(blocking) => {
                waiting.extend(blocking);
                if waiting.is_empty() {
                    instance.status = WorkflowStatus::Finished;
                    info!(instance_id = %instance.id, executed, "Workflow finished");
                } else {
                    info!(
                        instance_id = %instance.id,
                        executed,
                        blocking = ?waiting
                            .iter()
                            .map(|b| b.activity_id.as_str())
                            .collect::<Vec<_>>(),
                        "Workflow halted"
                    );
                    instance.status = WorkflowStatus::Halted;
                }
                instance.blocking_activities = waiting;
            }
            Err(PassError::Fault(info)) => {
                warn!(instance_id = %instance.id, fault = %info, "Workflow faulted");
                fault(instance, info);
            }
            Err(PassError::Cancelled) => return None,
        }
        Some(executed)
    }

    #[allow(clippy::too_many_arguments)]
    async fn drive(
        &self,
        definition: &WorkflowDefinition,
        dispatcher: &LifecycleDispatcher,
        workflow: &mut WorkflowContext,
        log: &mut Vec<ExecutionLogEntry>,
        mut frontier: VecDeque<Pending>,
        cancel: &CancellationToken,
        executed: &mut usize,
    ) -> Result<Vec<BlockingActivity>, PassError> {
        let (before, after) = if workflow.is_resuming() {
            (Hook::WorkflowResuming(cancel), Hook::WorkflowResumed)
        } else {
            (Hook::WorkflowStarting(cancel), Hook::WorkflowStarted)
        };
        checked(dispatcher.dispatch(before, workflow).await, cancel)?;
        if cancel.is_cancelled() {
            return Err(PassError::Cancelled);
        }
        checked(dispatcher.dispatch(after, workflow).await, cancel)?;

        let mut blocking = Vec::new();
        let mut visited: HashSet<ActivityId> = HashSet::new();
        while let Some(pending) = frontier.pop_front() {
            if cancel.is_cancelled() {
                return Err(PassError::Cancelled);
            }

            let Some(bound) = dispatcher.get(pending.activity_id.as_str()) else {
                return Err(PassError::activity(
                    &pending.activity_id,
                    &ActivityError::failed("activity is not part of the definition"),
                ));
            };
            let id = &bound.record.id;
            visited.insert(id.clone());
            let kind = bound.activity.kind();
            let mut context = match pending.resumed {
                Some(state) => ActivityContext::resumed(bound.record.clone(), state),
                None => ActivityContext::new(bound.record.clone()),
            };

            let ready = bound
                .activity
                .can_execute(workflow, &context)
                .await
                .map_err(|e| activity_failure(id, &e, cancel))?;
            if !ready {
                if kind.can_halt() {
                    debug!(activity_id = %id, "Gate closed; activity stays pending");
                    blocking.push(BlockingActivity {
                        activity_id: id.clone(),
                        state: context.into_state(),
                    });
                } else {
                    debug!(activity_id = %id, "Gate closed; branch ends");
                }
                continue;
            }

            if let Some(max) = self.config.max_steps_per_pass {
                if *executed >= max {
                    return Err(PassError::activity(
                        id,
                        &ActivityError::failed(format!(
                            "step limit of {} activities per pass exceeded",
                            max
                        )),
                    ));
                }
            }

            checked(
                dispatcher
                    .dispatch(Hook::ActivityExecuting(&context, cancel), workflow)
                    .await,
                cancel,
            )?;
            let output = bound
                .activity
                .execute(workflow, &mut context)
                .await
                .map_err(|e| activity_failure(id, &e, cancel))?;
            *executed += 1;
            checked(
                dispatcher
                    .dispatch(Hook::ActivityExecuted(&context), workflow)
                    .await,
                cancel,
            )?;

            match output {
                ActivityOutput::Halt => {
                    if !kind.can_halt() {
                        return Err(PassError::activity(
                            id,
                            &ActivityError::failed("task activities cannot halt"),
                        ));
                    }
                    debug!(activity_id = %id, "Activity halted");
                    blocking.push(BlockingActivity {
                        activity_id: id.clone(),
                        state: context.into_state(),
                    });
                }
                ActivityOutput::Outcomes(names) => {
                    debug!(activity_id = %id, outcomes = ?names, "Activity executed");
                    if names.is_empty() {
                        log.push(log_entry(id, None));
                    }
                    for name in names {
                        for destination in definition.destinations(id.as_str(), &name) {
                            if frontier.iter().any(|p| p.activity_id == *destination) {
                                debug!(
                                    activity_id = %destination,
                                    "Already pending; arrivals joined"
                                );
                                continue;
                            }
                            // Only a transition closing a cycle re-enters a visited activity.
                            if visited.contains(destination)
                                && !definition.reaches(destination.as_str(), id.as_str())
                            {
                                debug!(
                                    activity_id = %destination,
                                    "Already visited this pass; arrivals joined"
                                );
                                continue;
                            }
                            frontier.push_back(Pending::fresh(destination.clone()));
                        }
                        log.push(log_entry(id, Some(name)));
                    }
                }
            }
        }

        Ok(blocking)
    }

    async fn release(&self, instance_id: Uuid, revision: u64) {
        if let Err(e) = self.store.release(instance_id, revision).await {
            warn!(%instance_id, error = %e, "Failed to release workflow instance claim");
        }
    }
}

/// Maps a hook failure, treating any failure after cancellation as the
/// cancellation itself.
fn checked(result: Result<(), HookFailure>, cancel: &CancellationToken) -> Result<(), PassError> {
    match result {
        Ok(()) => Ok(()),
        Err(_) if cancel.is_cancelled() => Err(PassError::Cancelled),
        Err(hook_failure) => Err(hook_failure.into()),
    }
}

fn activity_failure(
    id: &ActivityId,
    error: &ActivityError,
    cancel: &CancellationToken,
) -> PassError {
    if cancel.is_cancelled() {
        PassError::Cancelled
    } else {
        PassError::activity(id, error)
    }
}

fn fault(instance: &mut WorkflowInstance, info: FaultInfo) {
    instance.status = WorkflowStatus::Faulted;
    instance.blocking_activities.clear();
    instance.fault = Some(info);
}

fn log_entry(activity_id: &ActivityId, outcome: Option<String>) -> ExecutionLogEntry {
    ExecutionLogEntry {
        activity_id: activity_id.clone(),
        outcome,
        timestamp: Utc::now(),
    }
}

/// Splits blocking activities into those offered to this pass and those
/// left waiting.
fn split_blocking(
    blocking: Vec<BlockingActivity>,
    resuming: Option<&[ActivityId]>,
    instance_id: Uuid,
) -> (Vec<BlockingActivity>, Vec<BlockingActivity>) {
    let Some(ids) = resuming else {
        return (blocking, Vec::new());
    };
    for id in ids {
        if !blocking.iter().any(|b| b.activity_id == *id) {
            warn!(%instance_id, activity_id = %id, "Ignoring resume of a non-blocking activity");
        }
    }
    blocking.into_iter().partition(|b| ids.contains(&b.activity_id))
}

/// Builder for constructing [`WorkflowEngine`] instances.
#[derive(Default)]
pub struct WorkflowEngineBuilder {
    registry: Option<ActivityRegistry>,
    store: Option<Arc<dyn WorkflowStore>>,
    config: EngineConfig,
}

impl WorkflowEngineBuilder {
    /// Creates a new empty engine builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the activity registry.
    pub fn registry(mut self, registry: ActivityRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Sets the instance store.
    pub fn store(mut self, store: Arc<dyn WorkflowStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Sets the configuration.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Builds the engine.
    pub fn build(self) -> Result<WorkflowEngine, WorkflowError> {
        let registry = self.registry.ok_or_else(|| {
            WorkflowError::Configuration("Activity registry must be specified".to_string())
        })?;
        let store = self.store.ok_or_else(|| {
            WorkflowError::Configuration("Workflow store must be specified".to_string())
        })?;

        Ok(WorkflowEngine {
            registry: Arc::new(registry),
            store,
            config: self.config,
            definitions: RwLock::new(HashMap::new()),
        })
    }
}
