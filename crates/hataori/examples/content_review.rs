//! Content review workflow that halts for an editor's decision.
//!
//! Demonstrates:
//! - Task and event activities
//! - Halting and resuming with new input
//! - Feature-gated activities enabled from a module manifest
//! - A lifecycle hook observing every executed activity

use async_trait::async_trait;
use hataori::prelude::*;
use hataori::{features_from_manifest, ModuleManifest};
use std::sync::Arc;

#[derive(Debug, Default)]
struct SubmitForReview;

#[async_trait]
impl Activity for SubmitForReview {
    fn name(&self) -> &str {
        "SubmitForReview"
    }

    fn category(&self) -> &str {
        "Content"
    }

    fn possible_outcomes(&self, _: &WorkflowContext, _: &ActivityContext) -> Vec<Outcome> {
        vec![Outcome::labeled("Submitted", "Submitted for review")]
    }

    async fn execute(
        &self,
        workflow: &mut WorkflowContext,
        _activity: &mut ActivityContext,
    ) -> Result<ActivityOutput, ActivityError> {
        let title = workflow
            .properties
            .get::<String>("title")
            .ok_or_else(|| ActivityError::failed("no content title"))?;
        println!("Submitted '{}' for review", title);
        Ok(ActivityOutput::outcome("Submitted"))
    }
}

/// Waits for `decision` to be set to `approved` or `rejected`.
#[derive(Debug, Default)]
struct AwaitDecision;

#[async_trait]
impl Activity for AwaitDecision {
    fn name(&self) -> &str {
        "AwaitDecision"
    }

    fn category(&self) -> &str {
        "Review"
    }

    fn kind(&self) -> ActivityKind {
        ActivityKind::Event
    }

    fn possible_outcomes(&self, _: &WorkflowContext, _: &ActivityContext) -> Vec<Outcome> {
        outcomes(["Approved", "Rejected"])
    }

    async fn execute(
        &self,
        workflow: &mut WorkflowContext,
        _activity: &mut ActivityContext,
    ) -> Result<ActivityOutput, ActivityError> {
        match workflow.properties.get::<String>("decision").as_deref() {
            Some("approved") => Ok(ActivityOutput::outcome("Approved")),
            Some("rejected") => Ok(ActivityOutput::outcome("Rejected")),
            _ => {
                println!("Waiting for an editor...");
                Ok(ActivityOutput::halt())
            }
        }
    }
}

#[derive(Debug, Default)]
struct PublishContent;

#[async_trait]
impl Activity for PublishContent {
    fn name(&self) -> &str {
        "PublishContent"
    }

    fn category(&self) -> &str {
        "Content"
    }

    fn description(&self) -> &str {
        "Publish the content item."
    }

    fn possible_outcomes(&self, _: &WorkflowContext, _: &ActivityContext) -> Vec<Outcome> {
        outcomes(["Published"])
    }

    async fn execute(
        &self,
        workflow: &mut WorkflowContext,
        activity: &mut ActivityContext,
    ) -> Result<ActivityOutput, ActivityError> {
        let channel = activity
            .configuration()
            .get::<String>("channel")
            .unwrap_or_else(|| "web".to_string());
        workflow.properties.insert("published_to", channel.as_str());
        println!("Published to {}", channel);
        Ok(ActivityOutput::outcome("Published"))
    }
}

/// Counts executed activities through a lifecycle hook.
#[derive(Debug, Default)]
struct AuditTrail;

#[async_trait]
impl Activity for AuditTrail {
    fn name(&self) -> &str {
        "AuditTrail"
    }

    fn possible_outcomes(&self, _: &WorkflowContext, _: &ActivityContext) -> Vec<Outcome> {
        Vec::new()
    }

    async fn execute(
        &self,
        _workflow: &mut WorkflowContext,
        _activity: &mut ActivityContext,
    ) -> Result<ActivityOutput, ActivityError> {
        Ok(ActivityOutput::done())
    }

    async fn on_activity_executed(
        &self,
        workflow: &mut WorkflowContext,
        activity: &ActivityContext,
    ) -> Result<(), ActivityError> {
        let seen = workflow.properties.get::<u32>("audited").unwrap_or(0);
        workflow.properties.insert("audited", seen + 1);
        println!("  audit: {} executed", activity.activity_id());
        Ok(())
    }
}

fn definition() -> WorkflowDefinition {
    WorkflowDefinition::builder("content-review", 1)
        .activity(ActivityRecord::new("submit", "SubmitForReview").as_start())
        .activity(ActivityRecord::new("decide", "AwaitDecision"))
        .activity(
            ActivityRecord::new("publish", "PublishContent").with_property("channel", "newsletter"),
        )
        .activity(ActivityRecord::new("audit", "AuditTrail"))
        .transition("submit", "Submitted", "decide")
        .transition("decide", "Approved", "publish")
        .build()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let manifest = ModuleManifest {
        id: "Cms.Contents".to_string(),
        name: "Contents".to_string(),
        ..Default::default()
    };

    let registry = ActivityRegistry::new()
        .register(SubmitForReview::default)
        .register(AwaitDecision::default)
        .register(AuditTrail::default)
        .register_for_feature("Cms.Contents", PublishContent::default)
        .enable_features(&features_from_manifest(&manifest));

    for descriptor in registry.descriptors() {
        println!("[{}] {} ({:?})", descriptor.category, descriptor.name, descriptor.kind);
    }

    let store = Arc::new(InMemoryWorkflowStore::new());
    let engine = WorkflowEngine::builder()
        .registry(registry)
        .store(store)
        .config(EngineConfig::from_env()?)
        .build()?;
    engine.publish(definition())?;

    let mut input = PropertyBag::new();
    input.insert("title", "Release notes");
    let report = engine
        .start("content-review", input, Some("article-42".to_string()))
        .await?;
    println!("After start: {} (blocking on {:?})", report.status, report.blocking);

    let mut decision = PropertyBag::new();
    decision.insert("decision", "approved");
    let report = engine.resume(report.instance_id, None, decision).await?;
    println!("After resume: {}", report.status);

    let instance = engine.instance(report.instance_id).await?;
    for entry in &instance.log {
        println!(
            "  {} -> {}",
            entry.activity_id,
            entry.outcome.as_deref().unwrap_or("-")
        );
    }
    println!(
        "Published to {:?}, {} activities audited",
        instance.properties.get::<String>("published_to"),
        instance.properties.get::<u32>("audited").unwrap_or(0)
    );

    Ok(())
}
