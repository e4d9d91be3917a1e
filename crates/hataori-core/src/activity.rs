//! Activity contract and related types.

use crate::context::{ActivityContext, PropertyBag, WorkflowContext};
use crate::error::ActivityError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{self, Debug};
use tokio_util::sync::CancellationToken;

/// Type-safe activity identifier, unique within a workflow definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActivityId(String);

impl ActivityId {
    /// Creates a new ActivityId.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActivityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ActivityId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ActivityId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for ActivityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for ActivityId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for ActivityId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for ActivityId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// A named result an activity can produce.
///
/// Outcomes carry no payload; they only select the outgoing transitions.
/// Two outcomes are equal when their names are equal.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
pub struct Outcome {
    name: String,
    label: String,
}

impl Outcome {
    /// Creates an outcome whose label is its name.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            label: name.clone(),
            name,
        }
    }

    /// Creates an outcome with a distinct display label.
    pub fn labeled(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl PartialEq for Outcome {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl std::hash::Hash for Outcome {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

/// Builds a declared outcome set from names.
///
/// ```
/// use hataori_core::outcomes;
///
/// let declared = outcomes(["Published", "Failed"]);
/// assert_eq!(declared[0].name(), "Published");
/// assert_eq!(declared[1].label(), "Failed");
/// ```
pub fn outcomes<I, S>(names: I) -> Vec<Outcome>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    names.into_iter().map(Outcome::new).collect()
}

/// Output from an activity execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityOutput {
    /// The activity completed with these outcome names. An empty list
    /// completes the activity without following any transition.
    Outcomes(Vec<String>),
    /// The activity waits for an external event; the instance halts here.
    Halt,
}

impl ActivityOutput {
    /// Completes with a single outcome.
    pub fn outcome(name: impl Into<String>) -> Self {
        Self::Outcomes(vec![name.into()])
    }

    /// Completes with several outcomes, followed in the given order.
    pub fn outcomes<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Outcomes(names.into_iter().map(Into::into).collect())
    }

    /// Completes without an outcome, ending this branch.
    pub fn done() -> Self {
        Self::Outcomes(Vec::new())
    }

    /// Suspends the instance at this activity.
    pub fn halt() -> Self {
        Self::Halt
    }

    pub fn is_halt(&self) -> bool {
        matches!(self, Self::Halt)
    }
}

/// Declared capability of an activity type.
///
/// The engine branches on this instead of inspecting concrete types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    /// Runs to completion. A task whose gate is closed ends its branch.
    #[default]
    Task,
    /// May halt waiting for an external event. An event whose gate is
    /// closed stays pending and is re-offered on the next resume.
    Event,
}

impl ActivityKind {
    /// Returns `true` if activities of this kind may halt.
    pub fn can_halt(self) -> bool {
        matches!(self, ActivityKind::Event)
    }
}

/// An activity node as authored in a workflow definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    /// Unique id within the definition.
    pub id: ActivityId,
    /// Registered activity type name.
    pub name: String,
    /// Opaque configuration document.
    #[serde(default)]
    pub properties: PropertyBag,
    /// Whether the activity is a start node.
    #[serde(default)]
    pub start: bool,
}

impl ActivityRecord {
    /// Creates a non-start record with no configuration.
    pub fn new(id: impl Into<ActivityId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            properties: PropertyBag::new(),
            start: false,
        }
    }

    /// Marks the record as a start node.
    pub fn as_start(mut self) -> Self {
        self.start = true;
        self
    }

    /// Adds a configuration property.
    pub fn with_property(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(key, value);
        self
    }
}

/// A unit of work in a workflow graph.
///
/// Only [`name`](Activity::name), [`possible_outcomes`](Activity::possible_outcomes)
/// and [`execute`](Activity::execute) are required. The lifecycle hooks are
/// no-ops by default and are invoked on every activity of the definition,
/// not only on the one executing.
///
/// # Examples
///
/// ```
/// use hataori_core::{
///     outcomes, Activity, ActivityContext, ActivityError, ActivityOutput, Outcome,
///     WorkflowContext,
/// };
/// use async_trait::async_trait;
///
/// #[derive(Debug)]
/// struct ApproveOrder;
///
/// #[async_trait]
/// impl Activity for ApproveOrder {
///     fn name(&self) -> &str {
///         "ApproveOrder"
///     }
///
///     fn possible_outcomes(&self, _: &WorkflowContext, _: &ActivityContext) -> Vec<Outcome> {
///         outcomes(["Approved", "Rejected"])
///     }
///
///     async fn execute(
///         &self,
///         workflow: &mut WorkflowContext,
///         _activity: &mut ActivityContext,
///     ) -> Result<ActivityOutput, ActivityError> {
///         let total = workflow.properties.get::<f64>("total").unwrap_or_default();
///         if total < 1000.0 {
///             Ok(ActivityOutput::outcome("Approved"))
///         } else {
///             Ok(ActivityOutput::outcome("Rejected"))
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait Activity: Send + Sync + Debug {
    /// Registered type name.
    fn name(&self) -> &str;

    /// Display category for catalogs and editors.
    fn category(&self) -> &str {
        "General"
    }

    /// Display description for catalogs and editors.
    fn description(&self) -> &str {
        ""
    }

    /// Declared capability. Defaults to [`ActivityKind::Task`].
    fn kind(&self) -> ActivityKind {
        ActivityKind::Task
    }

    /// Outcomes this activity can produce. Must not mutate state; it is
    /// also used for definition validation.
    fn possible_outcomes(
        &self,
        workflow: &WorkflowContext,
        activity: &ActivityContext,
    ) -> Vec<Outcome>;

    /// Gate evaluated before execution. Defaults to `true`.
    async fn can_execute(
        &self,
        _workflow: &WorkflowContext,
        _activity: &ActivityContext,
    ) -> Result<bool, ActivityError> {
        Ok(true)
    }

    /// Executes the activity.
    ///
    /// # Returns
    ///
    /// - `Ok(ActivityOutput::Outcomes(names))` - follow transitions for each name
    /// - `Ok(ActivityOutput::Halt)` - suspend the instance here
    /// - `Err(error)` - fault the instance
    async fn execute(
        &self,
        workflow: &mut WorkflowContext,
        activity: &mut ActivityContext,
    ) -> Result<ActivityOutput, ActivityError>;

    /// Called on each activity when a fresh run is about to start.
    async fn on_workflow_starting(
        &self,
        _workflow: &mut WorkflowContext,
        _cancel: &CancellationToken,
    ) -> Result<(), ActivityError> {
        Ok(())
    }

    /// Called on each activity when a fresh run has started.
    async fn on_workflow_started(
        &self,
        _workflow: &mut WorkflowContext,
    ) -> Result<(), ActivityError> {
        Ok(())
    }

    /// Called on each activity when a halted run is about to resume.
    async fn on_workflow_resuming(
        &self,
        _workflow: &mut WorkflowContext,
        _cancel: &CancellationToken,
    ) -> Result<(), ActivityError> {
        Ok(())
    }

    /// Called on each activity when a halted run has resumed.
    async fn on_workflow_resumed(
        &self,
        _workflow: &mut WorkflowContext,
    ) -> Result<(), ActivityError> {
        Ok(())
    }

    /// Called on each activity before any activity executes.
    async fn on_activity_executing(
        &self,
        _workflow: &mut WorkflowContext,
        _activity: &ActivityContext,
        _cancel: &CancellationToken,
    ) -> Result<(), ActivityError> {
        Ok(())
    }

    /// Called on each activity after any activity has executed.
    async fn on_activity_executed(
        &self,
        _workflow: &mut WorkflowContext,
        _activity: &ActivityContext,
    ) -> Result<(), ActivityError> {
        Ok(())
    }
}
