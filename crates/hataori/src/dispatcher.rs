//! Lifecycle dispatcher: fans hook calls out to every activity of a pass.

use hataori_core::{
    Activity, ActivityContext, ActivityError, ActivityId, ActivityRecord, CancellationToken,
    HookKind, WorkflowContext,
};
use std::fmt;
use tracing::debug;

/// An activity record paired with the activity instance materialized for it.
pub struct BoundActivity {
    pub record: ActivityRecord,
    pub activity: Box<dyn Activity>,
}

impl fmt::Debug for BoundActivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundActivity")
            .field("id", &self.record.id)
            .field("name", &self.record.name)
            .finish()
    }
}

/// A hook invocation and its arguments.
#[derive(Debug, Clone, Copy)]
pub enum Hook<'a> {
    WorkflowStarting(&'a CancellationToken),
    WorkflowStarted,
    WorkflowResuming(&'a CancellationToken),
    WorkflowResumed,
    ActivityExecuting(&'a ActivityContext, &'a CancellationToken),
    ActivityExecuted(&'a ActivityContext),
}

impl Hook<'_> {
    pub fn kind(&self) -> HookKind {
        match self {
            Hook::WorkflowStarting(_) => HookKind::WorkflowStarting,
            Hook::WorkflowStarted => HookKind::WorkflowStarted,
            Hook::WorkflowResuming(_) => HookKind::WorkflowResuming,
            Hook::WorkflowResumed => HookKind::WorkflowResumed,
            Hook::ActivityExecuting(..) => HookKind::ActivityExecuting,
            Hook::ActivityExecuted(_) => HookKind::ActivityExecuted,
        }
    }
}

/// A hook that returned an error, and whose hook it was.
#[derive(Debug)]
pub struct HookFailure {
    pub activity_id: ActivityId,
    pub hook: HookKind,
    pub error: ActivityError,
}

/// The materialized activities of one pass, in definition order.
///
/// Every hook is delivered to every activity regardless of whether it lies
/// on the path being executed. The first failing hook stops the fan-out.
#[derive(Debug, Default)]
pub struct LifecycleDispatcher {
    activities: Vec<BoundActivity>,
}

impl LifecycleDispatcher {
    pub fn new(activities: Vec<BoundActivity>) -> Self {
        Self { activities }
    }

    /// Returns the bound activity for `id`.
    pub fn get(&self, id: &str) -> Option<&BoundActivity> {
        self.activities.iter().find(|a| a.record.id == *id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &BoundActivity> {
        self.activities.iter()
    }

    pub fn len(&self) -> usize {
        self.activities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.activities.is_empty()
    }

    /// Invokes `hook` on every activity in definition order.
    pub async fn dispatch(
        &self,
        hook: Hook<'_>,
        workflow: &mut WorkflowContext,
    ) -> Result<(), HookFailure> {
        debug!(
            instance_id = %workflow.instance_id(),
            hook = %hook.kind(),
            receivers = self.activities.len(),
            "Dispatching lifecycle hook"
        );

        for bound in &self.activities {
            let activity = bound.activity.as_ref();
            let result = match hook {
                Hook::WorkflowStarting(cancel) => {
                    activity.on_workflow_starting(workflow, cancel).await
                }
                Hook::WorkflowStarted => activity.on_workflow_started(workflow).await,
                Hook::WorkflowResuming(cancel) => {
                    activity.on_workflow_resuming(workflow, cancel).await
                }
                Hook::WorkflowResumed => activity.on_workflow_resumed(workflow).await,
                Hook::ActivityExecuting(context, cancel) => {
                    activity
                        .on_activity_executing(workflow, context, cancel)
                        .await
                }
                Hook::ActivityExecuted(context) => {
                    activity.on_activity_executed(workflow, context).await
                }
            };

            result.map_err(|error| HookFailure {
                activity_id: bound.record.id.clone(),
                hook: hook.kind(),
                error,
            })?;
        }
        Ok(())
    }
}
