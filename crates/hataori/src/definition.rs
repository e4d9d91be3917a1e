//! Workflow definitions: activity records and the transitions between them.

use hataori_core::{ActivityId, ActivityRecord};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};

/// A directed edge: when `source` produces `outcome`, run `destination`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub source: ActivityId,
    pub outcome: String,
    pub destination: ActivityId,
}

impl Transition {
    pub fn new(
        source: impl Into<ActivityId>,
        outcome: impl Into<String>,
        destination: impl Into<ActivityId>,
    ) -> Self {
        Self {
            source: source.into(),
            outcome: outcome.into(),
            destination: destination.into(),
        }
    }
}

/// An activity graph.
///
/// Once published to an engine a definition is shared behind an `Arc` and
/// never mutated; edits produce a new version.
///
/// # Examples
///
/// ```
/// use hataori::{ActivityRecord, WorkflowDefinition};
///
/// let definition = WorkflowDefinition::builder("review", 1)
///     .activity(ActivityRecord::new("submit", "Submit").as_start())
///     .activity(ActivityRecord::new("publish", "PublishContent"))
///     .transition("submit", "Approved", "publish")
///     .build();
///
/// assert_eq!(definition.start_activities().count(), 1);
/// assert_eq!(definition.destinations("submit", "Approved").count(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub id: String,
    pub version: u32,
    pub activities: Vec<ActivityRecord>,
    #[serde(default)]
    pub transitions: Vec<Transition>,
}

impl WorkflowDefinition {
    /// Creates a new definition builder.
    pub fn builder(id: impl Into<String>, version: u32) -> WorkflowDefinitionBuilder {
        WorkflowDefinitionBuilder::new(id, version)
    }

    /// Returns the record with the given id.
    pub fn activity(&self, id: &str) -> Option<&ActivityRecord> {
        self.activities.iter().find(|a| a.id == *id)
    }

    /// Start records, in definition order.
    pub fn start_activities(&self) -> impl Iterator<Item = &ActivityRecord> {
        self.activities.iter().filter(|a| a.start)
    }

    /// Destinations reached from `source` via `outcome`, in declaration order.
    pub fn destinations<'a>(
        &'a self,
        source: &'a str,
        outcome: &'a str,
    ) -> impl Iterator<Item = &'a ActivityId> + 'a {
        self.transitions
            .iter()
            .filter(move |t| t.source == *source && t.outcome == outcome)
            .map(|t| &t.destination)
    }

    /// All transitions leaving `source`.
    pub fn transitions_from<'a>(&'a self, source: &'a str) -> impl Iterator<Item = &'a Transition> {
        self.transitions.iter().filter(move |t| t.source == *source)
    }

    /// Whether `to` can be reached from `from` by following transitions.
    /// An activity reaches itself only through a cycle.
    pub fn reaches(&self, from: &str, to: &str) -> bool {
        let mut seen = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::from([from]);
        while let Some(current) = queue.pop_front() {
            for transition in self.transitions_from(current) {
                let next = transition.destination.as_str();
                if next == to {
                    return true;
                }
                if seen.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        false
    }
}

/// Builder for constructing [`WorkflowDefinition`] values.
#[derive(Debug)]
pub struct WorkflowDefinitionBuilder {
    id: String,
    version: u32,
    activities: Vec<ActivityRecord>,
    transitions: Vec<Transition>,
}

impl WorkflowDefinitionBuilder {
    pub fn new(id: impl Into<String>, version: u32) -> Self {
        Self {
            id: id.into(),
            version,
            activities: Vec::new(),
            transitions: Vec::new(),
        }
    }

    /// Adds an activity record.
    pub fn activity(mut self, record: ActivityRecord) -> Self {
        self.activities.push(record);
        self
    }

    /// Adds a transition. Order of calls is the fan-out order.
    pub fn transition(
        mut self,
        source: impl Into<ActivityId>,
        outcome: impl Into<String>,
        destination: impl Into<ActivityId>,
    ) -> Self {
        self.transitions
            .push(Transition::new(source, outcome, destination));
        self
    }

    /// Builds the definition. Structural checks happen when it is published.
    pub fn build(self) -> WorkflowDefinition {
        WorkflowDefinition {
            id: self.id,
            version: self.version,
            activities: self.activities,
            transitions: self.transitions,
        }
    }
}
