//! Loads a workflow definition from a JSON document and reports validation
//! errors before anything runs.

use async_trait::async_trait;
use hataori::prelude::*;
use std::sync::Arc;

#[derive(Debug, Default)]
struct Log;

#[async_trait]
impl Activity for Log {
    fn name(&self) -> &str {
        "Log"
    }

    fn possible_outcomes(&self, _: &WorkflowContext, _: &ActivityContext) -> Vec<Outcome> {
        outcomes(["Done"])
    }

    async fn execute(
        &self,
        _workflow: &mut WorkflowContext,
        activity: &mut ActivityContext,
    ) -> Result<ActivityOutput, ActivityError> {
        let message = activity
            .configuration()
            .get::<String>("message")
            .unwrap_or_default();
        println!("{}: {}", activity.activity_id(), message);
        Ok(ActivityOutput::outcome("Done"))
    }
}

const DOCUMENT: &str = r#"{
    "id": "hello",
    "version": 1,
    "activities": [
        { "id": "greet", "name": "Log", "start": true, "properties": { "message": "hello" } },
        { "id": "part", "name": "Log", "properties": { "message": "goodbye" } }
    ],
    "transitions": [
        { "source": "greet", "outcome": "Done", "destination": "part" }
    ]
}"#;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let engine = WorkflowEngine::builder()
        .registry(ActivityRegistry::new().register(Log::default))
        .store(Arc::new(InMemoryWorkflowStore::new()))
        .build()?;

    let mut definition: WorkflowDefinition = serde_json::from_str(DOCUMENT)?;
    engine.publish(definition.clone())?;

    // A typo in an outcome name is caught at publish time.
    definition.version = 2;
    definition.transitions[0].outcome = "Dnoe".to_string();
    match engine.publish(definition) {
        Err(WorkflowError::Validation(e)) => println!("Rejected version 2: {}", e),
        other => println!("Unexpected: {:?}", other.map(|d| d.version)),
    }

    let report = engine.start("hello", PropertyBag::new(), None).await?;
    println!("{} after {} activities", report.status, report.executed);

    Ok(())
}
