//! Execution contexts shared with activities.

use crate::activity::{ActivityId, ActivityRecord};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// JSON property bag.
///
/// Values are stored as [`serde_json::Value`] so the bag can be persisted
/// together with the workflow instance that owns it. Typed access goes
/// through serde.
///
/// # Examples
///
/// ```
/// use hataori_core::PropertyBag;
///
/// let mut bag = PropertyBag::new();
///
/// bag.insert("user_id", 123u64);
/// bag.insert("name", "Alice");
/// bag.insert("active", true);
///
/// assert_eq!(bag.get::<u64>("user_id"), Some(123));
/// assert_eq!(bag.get::<String>("name"), Some("Alice".to_string()));
/// assert_eq!(bag.get::<bool>("active"), Some(true));
///
/// // Wrong type returns None
/// assert_eq!(bag.get::<String>("user_id"), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyBag {
    data: Map<String, Value>,
}

impl PropertyBag {
    /// Creates a new empty bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a value with the given key.
    ///
    /// If the key already exists, the previous value is replaced.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.data.insert(key.into(), value.into());
    }

    /// Serializes `value` and inserts it under `key`.
    pub fn insert_serialized<T: Serialize>(
        &mut self,
        key: impl Into<String>,
        value: &T,
    ) -> Result<(), serde_json::Error> {
        let value = serde_json::to_value(value)?;
        self.data.insert(key.into(), value);
        Ok(())
    }

    /// Returns the value for the given key, deserialized as `T`.
    ///
    /// Returns `None` if the key doesn't exist or the value doesn't fit `T`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.data
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Returns the raw JSON value for the given key.
    pub fn get_value(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Returns a mutable reference to the raw JSON value for the given key.
    pub fn get_value_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.data.get_mut(key)
    }

    /// Removes a value by key and returns it.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }

    /// Returns `true` if the bag contains a value for the given key.
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Returns an iterator over all keys in the bag.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.data.keys()
    }

    /// Copies every entry of `other` into this bag, overwriting existing keys.
    pub fn merge(&mut self, other: PropertyBag) {
        self.data.extend(other.data);
    }

    /// Returns the number of entries in the bag.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the bag contains no entries.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Removes all entries from the bag.
    pub fn clear(&mut self) {
        self.data.clear();
    }
}

impl From<Map<String, Value>> for PropertyBag {
    fn from(data: Map<String, Value>) -> Self {
        Self { data }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for PropertyBag {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            data: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Run-scoped state visible to every activity of a workflow instance.
///
/// The engine builds one per pass and hands it to every activity call
/// explicitly; there is no ambient access.
#[derive(Debug, Clone)]
pub struct WorkflowContext {
    instance_id: Uuid,
    definition_id: String,
    definition_version: u32,
    correlation_key: Option<String>,
    resuming: bool,
    /// Shared property bag of the instance.
    pub properties: PropertyBag,
}

impl WorkflowContext {
    /// Creates a context for one pass over an instance.
    pub fn new(
        instance_id: Uuid,
        definition_id: impl Into<String>,
        definition_version: u32,
        correlation_key: Option<String>,
        properties: PropertyBag,
    ) -> Self {
        Self {
            instance_id,
            definition_id: definition_id.into(),
            definition_version,
            correlation_key,
            resuming: false,
            properties,
        }
    }

    /// Marks the pass as a resumption of a halted instance.
    pub fn with_resuming(mut self, resuming: bool) -> Self {
        self.resuming = resuming;
        self
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    pub fn definition_id(&self) -> &str {
        &self.definition_id
    }

    pub fn definition_version(&self) -> u32 {
        self.definition_version
    }

    pub fn correlation_key(&self) -> Option<&str> {
        self.correlation_key.as_deref()
    }

    /// Returns `true` when the current pass resumes a halted instance.
    pub fn is_resuming(&self) -> bool {
        self.resuming
    }
}

/// Per-invocation context of a single activity.
///
/// Created fresh for every activity call. `state` is the activity's own
/// bag: it is persisted as the resumption state when the activity halts
/// and handed back when it is resumed.
#[derive(Debug, Clone)]
pub struct ActivityContext {
    record: ActivityRecord,
    resuming: bool,
    /// The activity's own state.
    pub state: PropertyBag,
}

impl ActivityContext {
    /// Creates a context for a fresh execution of `record`.
    pub fn new(record: ActivityRecord) -> Self {
        Self {
            record,
            resuming: false,
            state: PropertyBag::new(),
        }
    }

    /// Creates a context that re-enters a halted activity with its saved state.
    pub fn resumed(record: ActivityRecord, state: PropertyBag) -> Self {
        Self {
            record,
            resuming: true,
            state,
        }
    }

    pub fn activity_id(&self) -> &ActivityId {
        &self.record.id
    }

    pub fn record(&self) -> &ActivityRecord {
        &self.record
    }

    /// Configuration properties authored on the activity record.
    pub fn configuration(&self) -> &PropertyBag {
        &self.record.properties
    }

    /// Returns `true` if this activity halted on a previous pass and is
    /// now being re-entered.
    pub fn is_resuming(&self) -> bool {
        self.resuming
    }

    /// Consumes the context, returning the activity's own state.
    pub fn into_state(self) -> PropertyBag {
        self.state
    }
}
