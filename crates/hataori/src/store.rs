//! Persistence contract for workflow instances, plus an in-memory store.

use crate::instance::{WorkflowInstance, WorkflowStatus};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

/// Error type for store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Instance not found.
    #[error("instance not found: {0}")]
    NotFound(Uuid),

    /// The stored revision or status did not match what the caller expected.
    #[error("concurrency conflict on instance {instance_id}")]
    ConcurrencyConflict { instance_id: Uuid },

    /// Backend failure.
    #[error("store backend error: {0}")]
    Backend(String),

    /// Serialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Durable storage for workflow instances.
///
/// Every write is a compare-and-swap on the instance `revision`, keyed by
/// instance id. A successful write bumps the stored revision by one.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Returns the latest snapshot, or `None` if the id is unknown.
    async fn load(&self, instance_id: Uuid) -> Result<Option<WorkflowInstance>, StoreError>;

    /// Moves a `Halted` instance at `revision` to `Executing` and returns
    /// the claimed snapshot. Any other stored state is a
    /// [`StoreError::ConcurrencyConflict`].
    async fn claim(&self, instance_id: Uuid, revision: u64)
        -> Result<WorkflowInstance, StoreError>;

    /// Reverts a claim at `revision` back to `Halted`, leaving everything
    /// else as it was before the claim.
    async fn release(&self, instance_id: Uuid, revision: u64) -> Result<(), StoreError>;

    /// Stores the result of a pass and returns the new revision.
    ///
    /// Inserts unknown ids. For known ids the stored snapshot must be
    /// `Executing` at the same revision as `instance`.
    async fn save(&self, instance: &WorkflowInstance) -> Result<u64, StoreError>;

    /// Instances started with the given correlation key.
    async fn find_by_correlation(
        &self,
        correlation_key: &str,
    ) -> Result<Vec<WorkflowInstance>, StoreError>;
}

/// In-memory implementation of [`WorkflowStore`].
///
/// Mostly for tests and embedding. Provides the same compare-and-swap
/// semantics a database-backed store must.
///
/// # Example
///
/// ```
/// use hataori::InMemoryWorkflowStore;
///
/// let store = InMemoryWorkflowStore::new();
/// assert!(store.is_empty());
/// ```
#[derive(Debug, Default)]
pub struct InMemoryWorkflowStore {
    instances: RwLock<HashMap<Uuid, WorkflowInstance>>,
}

impl InMemoryWorkflowStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored instances
    pub fn len(&self) -> usize {
        self.instances.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.read().is_empty()
    }

    /// Clear all data (for testing)
    pub fn clear(&self) {
        self.instances.write().clear();
    }
}

#[async_trait]
impl WorkflowStore for InMemoryWorkflowStore {
    async fn load(&self, instance_id: Uuid) -> Result<Option<WorkflowInstance>, StoreError> {
        Ok(self.instances.read().get(&instance_id).cloned())
    }

    async fn claim(
        &self,
        instance_id: Uuid,
        revision: u64,
    ) -> Result<WorkflowInstance, StoreError> {
        let mut instances = self.instances.write();
        let stored = instances
            .get_mut(&instance_id)
            .ok_or(StoreError::NotFound(instance_id))?;

        if stored.status != WorkflowStatus::Halted || stored.revision != revision {
            return Err(StoreError::ConcurrencyConflict { instance_id });
        }

        stored.status = WorkflowStatus::Executing;
        stored.revision += 1;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn release(&self, instance_id: Uuid, revision: u64) -> Result<(), StoreError> {
        let mut instances = self.instances.write();
        let stored = instances
            .get_mut(&instance_id)
            .ok_or(StoreError::NotFound(instance_id))?;

        if stored.status != WorkflowStatus::Executing || stored.revision != revision {
            return Err(StoreError::ConcurrencyConflict { instance_id });
        }

        stored.status = WorkflowStatus::Halted;
        stored.revision += 1;
        stored.updated_at = Utc::now();
        Ok(())
    }

    async fn save(&self, instance: &WorkflowInstance) -> Result<u64, StoreError> {
        let mut instances = self.instances.write();
        if let Some(stored) = instances.get(&instance.id) {
            if stored.status != WorkflowStatus::Executing || stored.revision != instance.revision
            {
                return Err(StoreError::ConcurrencyConflict {
                    instance_id: instance.id,
                });
            }
        }

        let mut snapshot = instance.clone();
        snapshot.revision = instance.revision + 1;
        snapshot.updated_at = Utc::now();
        let revision = snapshot.revision;
        instances.insert(instance.id, snapshot);
        Ok(revision)
    }

    async fn find_by_correlation(
        &self,
        correlation_key: &str,
    ) -> Result<Vec<WorkflowInstance>, StoreError> {
        let mut found: Vec<_> = self
            .instances
            .read()
            .values()
            .filter(|i| i.correlation_key.as_deref() == Some(correlation_key))
            .cloned()
            .collect();
        found.sort_by_key(|i| i.created_at);
        Ok(found)
    }
}
