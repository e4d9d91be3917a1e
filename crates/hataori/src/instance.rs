//! Workflow instance state: status, blocking activities and the execution log.

use chrono::{DateTime, Utc};
use hataori_core::{ActivityId, HookKind, PropertyBag};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Execution status of a workflow instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    /// Created but no pass has run yet.
    Idle,
    /// A pass is running.
    Executing,
    /// Waiting on one or more blocking activities.
    Halted,
    /// No reachable activity remains.
    Finished,
    /// An activity or hook failed.
    Faulted,
}

impl WorkflowStatus {
    /// Returns `true` for states no pass can leave.
    pub fn is_terminal(self) -> bool {
        matches!(self, WorkflowStatus::Finished | WorkflowStatus::Faulted)
    }
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Executing => write!(f, "executing"),
            Self::Halted => write!(f, "halted"),
            Self::Finished => write!(f, "finished"),
            Self::Faulted => write!(f, "faulted"),
        }
    }
}

/// An activity the instance is suspended on, with its saved state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockingActivity {
    pub activity_id: ActivityId,
    #[serde(default)]
    pub state: PropertyBag,
}

/// One executed activity and one of the outcomes it produced.
///
/// An activity that completes without an outcome logs a single entry with
/// `outcome: None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionLogEntry {
    pub activity_id: ActivityId,
    pub outcome: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Where and why an instance faulted.
///
/// This is the log's record of the failure. The failing activity gets no
/// [`ExecutionLogEntry`], so the log of a faulted instance stays a prefix
/// of what a successful pass would have logged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultInfo {
    /// The failing activity, or the activity whose hook failed.
    pub activity_id: Option<ActivityId>,
    /// Set when the failure came from a lifecycle hook.
    pub hook: Option<HookKind>,
    pub error: String,
    pub occurred_at: DateTime<Utc>,
}

impl std::fmt::Display for FaultInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.activity_id, self.hook) {
            (Some(id), Some(hook)) => write!(f, "hook '{}' of '{}': {}", hook, id, self.error),
            (Some(id), None) => write!(f, "activity '{}': {}", id, self.error),
            (None, _) => write!(f, "{}", self.error),
        }
    }
}

/// One run of a workflow definition.
///
/// Mutated only by the engine during a pass and snapshotted to the store at
/// every halt, finish or fault. `revision` is owned by the store and guards
/// concurrent writers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowInstance {
    pub id: Uuid,
    pub definition_id: String,
    pub definition_version: u32,
    pub correlation_key: Option<String>,
    pub status: WorkflowStatus,
    pub properties: PropertyBag,
    pub blocking_activities: Vec<BlockingActivity>,
    pub log: Vec<ExecutionLogEntry>,
    pub fault: Option<FaultInfo>,
    pub revision: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowInstance {
    /// Creates an idle instance with a fresh v7 id.
    pub fn new(
        definition_id: impl Into<String>,
        definition_version: u32,
        correlation_key: Option<String>,
        properties: PropertyBag,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            definition_id: definition_id.into(),
            definition_version,
            correlation_key,
            status: WorkflowStatus::Idle,
            properties,
            blocking_activities: Vec::new(),
            log: Vec::new(),
            fault: None,
            revision: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Ids of the activities the instance is waiting on.
    pub fn blocking_ids(&self) -> Vec<ActivityId> {
        self.blocking_activities
            .iter()
            .map(|b| b.activity_id.clone())
            .collect()
    }

    /// Returns `true` if the instance is halted on `activity_id`.
    pub fn is_blocked_on(&self, activity_id: &str) -> bool {
        self.blocking_activities
            .iter()
            .any(|b| b.activity_id == *activity_id)
    }
}

/// What a trigger reports back to its caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub instance_id: Uuid,
    pub status: WorkflowStatus,
    pub blocking: Vec<ActivityId>,
    pub fault: Option<FaultInfo>,
    /// Activities executed during the pass.
    pub executed: usize,
}

impl RunReport {
    pub(crate) fn from_instance(instance: &WorkflowInstance, executed: usize) -> Self {
        Self {
            instance_id: instance.id,
            status: instance.status,
            blocking: instance.blocking_ids(),
            fault: instance.fault.clone(),
            executed,
        }
    }
}
