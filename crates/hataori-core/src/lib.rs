//! Activity contract for the hataori workflow engine.
//!
//! This crate has no engine logic. Authors of concrete activities depend
//! on it to implement [`Activity`].
//!
//! # Core Types
//!
//! - [`Activity`] - The unit of work, with lifecycle hooks
//! - [`ActivityOutput`] - Outcome names produced by an execution, or a halt
//! - [`Outcome`] - A named, labeled branch an activity may take
//! - [`WorkflowContext`] / [`ActivityContext`] - State handed to every call
//! - [`PropertyBag`] - Serializable key/value storage
//! - [`ActivityError`] - Failures raised by activities and hooks

mod activity;
mod context;
mod error;

pub use activity::{
    outcomes, Activity, ActivityId, ActivityKind, ActivityOutput, ActivityRecord, Outcome,
};
pub use context::{ActivityContext, PropertyBag, WorkflowContext};
pub use error::{ActivityError, HookKind};

// Lifecycle hooks take a cancellation token.
pub use tokio_util::sync::CancellationToken;
