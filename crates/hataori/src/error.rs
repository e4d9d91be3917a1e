//! Engine error types.

use crate::instance::WorkflowStatus;
use crate::store::StoreError;
use hataori_core::ActivityId;
use thiserror::Error;
use uuid::Uuid;

/// A malformed workflow definition, rejected before any instance exists.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ValidationError {
    /// The definition has no start activity.
    #[error("Definition '{definition_id}' has no start activity")]
    NoStartActivity { definition_id: String },

    /// Two records share an id.
    #[error("Duplicate activity id: {0}")]
    DuplicateActivity(ActivityId),

    /// A record names an activity type the registry cannot resolve.
    #[error("Activity '{activity_id}' uses unknown activity type '{name}'")]
    UnknownActivity { activity_id: ActivityId, name: String },

    /// A record names an activity type whose feature is not enabled.
    #[error("Activity '{activity_id}' uses '{name}' from disabled feature '{feature_id}'")]
    FeatureDisabled {
        activity_id: ActivityId,
        name: String,
        feature_id: String,
    },

    /// A transition leaves an activity that does not exist.
    #[error("Transition source not found: {0}")]
    UnknownSource(ActivityId),

    /// A transition enters an activity that does not exist.
    #[error("Transition destination not found: {0}")]
    UnknownDestination(ActivityId),

    /// A transition uses an outcome the source activity never declares.
    #[error("Activity '{activity_id}' does not declare outcome '{outcome}'")]
    UndeclaredOutcome { activity_id: ActivityId, outcome: String },

    /// The same (id, version) was published twice.
    #[error("Definition '{definition_id}' version {version} is already published")]
    AlreadyPublished { definition_id: String, version: u32 },
}

/// Errors returned by workflow triggers.
///
/// An activity failure is not an error here: the trigger succeeds with a
/// [`RunReport`](crate::RunReport) whose status is `Faulted`.
///
/// # Non-Exhaustive
///
/// Always include a wildcard arm when matching:
///
/// ```
/// use hataori::WorkflowError;
///
/// fn describe(error: &WorkflowError) -> String {
///     match error {
///         WorkflowError::ConcurrencyConflict { instance_id } => {
///             format!("{} is already running", instance_id)
///         }
///         WorkflowError::Validation(e) => format!("bad definition: {}", e),
///         _ => error.to_string(),
///     }
/// }
/// ```
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum WorkflowError {
    /// The definition failed validation.
    #[error("Invalid workflow definition: {0}")]
    Validation(#[from] ValidationError),

    /// No published definition has this id (and version).
    #[error("Workflow definition not found: {definition_id}")]
    DefinitionNotFound {
        definition_id: String,
        version: Option<u32>,
    },

    /// The store has no instance with this id.
    #[error("Workflow instance not found: {0}")]
    InstanceNotFound(Uuid),

    /// The instance is not in a resumable state.
    #[error("Workflow instance {instance_id} cannot be resumed while {status}")]
    InvalidState {
        instance_id: Uuid,
        status: WorkflowStatus,
    },

    /// Another trigger is already running this instance.
    #[error("Workflow instance {instance_id} is already being executed")]
    ConcurrencyConflict { instance_id: Uuid },

    /// Loading or saving the instance failed.
    #[error("Persistence failed: {0}")]
    Persistence(#[source] StoreError),

    /// The pass was cancelled; nothing was persisted.
    #[error("Workflow pass cancelled")]
    Cancelled,

    /// The engine configuration is invalid.
    #[error("Invalid engine configuration: {0}")]
    Configuration(String),
}

impl From<StoreError> for WorkflowError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::ConcurrencyConflict { instance_id } => {
                WorkflowError::ConcurrencyConflict { instance_id }
            }
            StoreError::NotFound(id) => WorkflowError::InstanceNotFound(id),
            other => WorkflowError::Persistence(other),
        }
    }
}
