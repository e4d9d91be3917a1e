//! A small durable workflow engine for Rust.
//!
//! Workflows are graphs of [`Activity`] records joined by outcome-labelled
//! [`Transition`]s. An engine pass runs activities until the graph drains,
//! halts on event activities waiting for outside input, or faults. Every
//! pass ends with exactly one snapshot written to a [`WorkflowStore`].
//!
//! # Example
//!
//! ```
//! use hataori::prelude::*;
//! use async_trait::async_trait;
//! use std::sync::Arc;
//!
//! #[derive(Debug, Default)]
//! struct AwaitApproval;
//!
//! #[async_trait]
//! impl Activity for AwaitApproval {
//!     fn name(&self) -> &str {
//!         "AwaitApproval"
//!     }
//!
//!     fn kind(&self) -> ActivityKind {
//!         ActivityKind::Event
//!     }
//!
//!     fn possible_outcomes(&self, _: &WorkflowContext, _: &ActivityContext) -> Vec<Outcome> {
//!         outcomes(["Approved"])
//!     }
//!
//!     async fn execute(
//!         &self,
//!         workflow: &mut WorkflowContext,
//!         _activity: &mut ActivityContext,
//!     ) -> Result<ActivityOutput, ActivityError> {
//!         match workflow.properties.get::<bool>("approved") {
//!             Some(true) => Ok(ActivityOutput::outcome("Approved")),
//!             _ => Ok(ActivityOutput::halt()),
//!         }
//!     }
//! }
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), WorkflowError> {
//! let engine = WorkflowEngine::builder()
//!     .registry(ActivityRegistry::new().register(AwaitApproval::default))
//!     .store(Arc::new(InMemoryWorkflowStore::new()))
//!     .build()?;
//!
//! engine.publish(
//!     WorkflowDefinition::builder("approval", 1)
//!         .activity(ActivityRecord::new("wait", "AwaitApproval").as_start())
//!         .build(),
//! )?;
//!
//! let report = engine.start("approval", PropertyBag::new(), None).await?;
//! assert_eq!(report.status, WorkflowStatus::Halted);
//!
//! let mut input = PropertyBag::new();
//! input.insert("approved", true);
//! let report = engine.resume(report.instance_id, None, input).await?;
//! assert_eq!(report.status, WorkflowStatus::Finished);
//! # Ok(())
//! # }
//! ```

mod config;
mod definition;
mod dispatcher;
mod engine;
mod error;
mod features;
mod instance;
mod registry;
mod store;

// Re-export the activity contract
pub use hataori_core::*;

pub use config::{EngineConfig, MAX_STEPS_ENV};
pub use definition::{Transition, WorkflowDefinition, WorkflowDefinitionBuilder};
pub use dispatcher::{BoundActivity, Hook, HookFailure, LifecycleDispatcher};
pub use engine::{WorkflowEngine, WorkflowEngineBuilder};
pub use error::{ValidationError, WorkflowError};
pub use features::{
    features_from_manifest, FeatureBuilderEvents, FeatureBuildingContext, FeatureDescriptor,
    FeatureManifest, FeaturesProvider, ModuleManifest,
};
pub use instance::{
    BlockingActivity, ExecutionLogEntry, FaultInfo, RunReport, WorkflowInstance, WorkflowStatus,
};
pub use registry::{ActivityDescriptor, ActivityFactory, ActivityRegistry, ResolveError};
pub use store::{InMemoryWorkflowStore, StoreError, WorkflowStore};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        outcomes, Activity, ActivityContext, ActivityError, ActivityId, ActivityKind,
        ActivityOutput, ActivityRecord, ActivityRegistry, CancellationToken, EngineConfig,
        HookKind, InMemoryWorkflowStore, Outcome, PropertyBag, RunReport, Transition,
        ValidationError, WorkflowContext, WorkflowDefinition, WorkflowEngine, WorkflowError,
        WorkflowInstance, WorkflowStatus, WorkflowStore,
    };
}
