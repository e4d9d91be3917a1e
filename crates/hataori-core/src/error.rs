//! Activity error types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The lifecycle hook being dispatched.
///
/// Carried in fault reports so a failure can be traced back to the hook
/// that raised it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookKind {
    /// A fresh run is about to start.
    WorkflowStarting,
    /// A fresh run has started.
    WorkflowStarted,
    /// A halted run is about to resume.
    WorkflowResuming,
    /// A halted run has resumed.
    WorkflowResumed,
    /// An activity is about to execute.
    ActivityExecuting,
    /// An activity has executed.
    ActivityExecuted,
}

impl std::fmt::Display for HookKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HookKind::WorkflowStarting => write!(f, "on_workflow_starting"),
            HookKind::WorkflowStarted => write!(f, "on_workflow_started"),
            HookKind::WorkflowResuming => write!(f, "on_workflow_resuming"),
            HookKind::WorkflowResumed => write!(f, "on_workflow_resumed"),
            HookKind::ActivityExecuting => write!(f, "on_activity_executing"),
            HookKind::ActivityExecuted => write!(f, "on_activity_executed"),
        }
    }
}

/// Errors raised by activities and their lifecycle hooks.
///
/// Any of these, returned from `can_execute`, `execute` or a hook, faults
/// the workflow instance.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ActivityError {
    /// The activity could not complete its work.
    #[error("Activity failed: {details}")]
    Failed {
        /// Details about the failure.
        details: String,
    },

    /// The activity observed cancellation and unwound.
    #[error("Activity cancelled")]
    Cancelled,

    /// Reading or writing a property failed.
    #[error("Property serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ActivityError {
    /// Creates an [`ActivityError::Failed`] with the given details.
    pub fn failed(details: impl Into<String>) -> Self {
        Self::Failed {
            details: details.into(),
        }
    }
}
