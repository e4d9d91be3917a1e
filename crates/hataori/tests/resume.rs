mod common;

use common::*;
use hataori::prelude::*;
use std::sync::Arc;
use tokio_test::assert_ok;

fn approval() -> WorkflowDefinition {
    WorkflowDefinition::builder("approval", 1)
        .activity(emit("submit", &["Submitted"]).as_start())
        .activity(ActivityRecord::new("wait", "WaitFor"))
        .activity(emit("publish", &[]))
        .transition("submit", "Submitted", "wait")
        .transition("wait", "Done", "publish")
        .build()
}

#[tokio::test]
async fn test_halt_and_resume() {
    let (engine, _store) = engine();
    assert_ok!(engine.publish(approval()));

    let report = engine
        .start("approval", PropertyBag::new(), None)
        .await
        .expect("start succeeds");
    assert_eq!(report.status, WorkflowStatus::Halted);
    assert_eq!(report.blocking, vec![ActivityId::new("wait")]);
    assert_eq!(report.executed, 2);

    let halted = engine.instance(report.instance_id).await.expect("stored");
    assert_eq!(trail(&halted), vec![step("submit", Some("Submitted"))]);

    // Nothing changed: halts again, log untouched.
    let report = engine
        .resume(report.instance_id, None, PropertyBag::new())
        .await
        .expect("resume succeeds");
    assert_eq!(report.status, WorkflowStatus::Halted);
    assert_eq!(report.blocking, vec![ActivityId::new("wait")]);
    let still_halted = engine.instance(report.instance_id).await.expect("stored");
    assert_eq!(still_halted.log, halted.log);

    let report = engine
        .resume(report.instance_id, None, props(&[("approved", true)]))
        .await
        .expect("resume succeeds");
    assert_eq!(report.status, WorkflowStatus::Finished);
    assert!(report.blocking.is_empty());

    let finished = engine.instance(report.instance_id).await.expect("stored");
    assert_eq!(
        trail(&finished),
        vec![
            step("submit", Some("Submitted")),
            step("wait", Some("Done")),
            step("publish", None),
        ]
    );
    // Activity state survived both halts.
    assert_eq!(finished.properties.get::<u32>("attempts:wait"), Some(3));
}

#[tokio::test]
async fn test_resume_terminal_instance_is_invalid() {
    let (engine, _store) = engine();
    assert_ok!(engine.publish(approval()));

    let report = engine
        .start("approval", props(&[("approved", true)]), None)
        .await
        .expect("start succeeds");
    assert_eq!(report.status, WorkflowStatus::Finished);

    let result = engine
        .resume(report.instance_id, None, PropertyBag::new())
        .await;
    assert!(matches!(
        result,
        Err(WorkflowError::InvalidState {
            status: WorkflowStatus::Finished,
            ..
        })
    ));
}

#[tokio::test]
async fn test_resume_unknown_instance() {
    let (engine, _store) = engine();
    let id = uuid::Uuid::now_v7();
    let result = engine.resume(id, None, PropertyBag::new()).await;
    assert!(matches!(result, Err(WorkflowError::InstanceNotFound(missing)) if missing == id));
}

#[tokio::test]
async fn test_resume_subset_of_blocking_activities() {
    let (engine, _store) = engine();
    assert_ok!(engine.publish(
        WorkflowDefinition::builder("two-waits", 1)
            .activity(emit("split", &["Go"]).as_start())
            .activity(ActivityRecord::new("w1", "WaitFor").with_property("flag", "w1_ok"))
            .activity(ActivityRecord::new("w2", "WaitFor").with_property("flag", "w2_ok"))
            .transition("split", "Go", "w1")
            .transition("split", "Go", "w2")
            .build(),
    ));

    let report = engine
        .start("two-waits", PropertyBag::new(), None)
        .await
        .expect("start succeeds");
    assert_eq!(
        report.blocking,
        vec![ActivityId::new("w1"), ActivityId::new("w2")]
    );

    // Both flags are set, but only w2 is offered; the unknown id is ignored.
    let only = [ActivityId::new("w2"), ActivityId::new("ghost")];
    let report = engine
        .resume(
            report.instance_id,
            Some(&only),
            props(&[("w1_ok", true), ("w2_ok", true)]),
        )
        .await
        .expect("resume succeeds");
    assert_eq!(report.status, WorkflowStatus::Halted);
    assert_eq!(report.blocking, vec![ActivityId::new("w1")]);
    assert_eq!(report.executed, 1);

    let report = engine
        .resume(report.instance_id, None, PropertyBag::new())
        .await
        .expect("resume succeeds");
    assert_eq!(report.status, WorkflowStatus::Finished);
}

#[tokio::test]
async fn test_resume_with_no_matching_ids_changes_nothing() {
    let (engine, _store) = engine();
    assert_ok!(engine.publish(approval()));

    let report = engine
        .start("approval", PropertyBag::new(), None)
        .await
        .expect("start succeeds");
    let before = engine.instance(report.instance_id).await.expect("stored");

    let ghost = [ActivityId::new("ghost")];
    let report = engine
        .resume(report.instance_id, Some(&ghost), props(&[("approved", true)]))
        .await
        .expect("resume succeeds");
    assert_eq!(report.status, WorkflowStatus::Halted);
    assert_eq!(report.executed, 0);

    let after = engine.instance(report.instance_id).await.expect("stored");
    assert_eq!(after.status, WorkflowStatus::Halted);
    assert_eq!(after.blocking_activities, before.blocking_activities);
    assert_eq!(after.properties.get::<bool>("approved"), None);
}

#[tokio::test]
async fn test_instances_stay_on_their_version() {
    let (engine, _store) = engine();
    assert_ok!(engine.publish(approval()));

    let pinned = engine
        .start("approval", PropertyBag::new(), None)
        .await
        .expect("start succeeds");

    let mut v2 = WorkflowDefinition::builder("approval", 2)
        .activity(emit("submit", &["Submitted"]).as_start())
        .activity(ActivityRecord::new("wait", "WaitFor"))
        .activity(emit("archive", &[]))
        .transition("submit", "Submitted", "wait")
        .transition("wait", "Done", "archive")
        .build();
    assert_ok!(engine.publish(v2.clone()));

    v2.transitions.clear();
    assert!(matches!(
        engine.publish(v2),
        Err(WorkflowError::Validation(ValidationError::AlreadyPublished { version: 2, .. }))
    ));

    let report = engine
        .resume(pinned.instance_id, None, props(&[("approved", true)]))
        .await
        .expect("resume succeeds");
    let instance = engine.instance(report.instance_id).await.expect("stored");
    assert_eq!(instance.definition_version, 1);
    assert_eq!(instance.log.last().map(|e| e.activity_id.as_str()), Some("publish"));

    let fresh = engine
        .start("approval", props(&[("approved", true)]), None)
        .await
        .expect("start succeeds");
    let instance = engine.instance(fresh.instance_id).await.expect("stored");
    assert_eq!(instance.definition_version, 2);
    assert_eq!(instance.log.last().map(|e| e.activity_id.as_str()), Some("archive"));
}

#[tokio::test]
async fn test_resume_of_claimed_instance_conflicts() {
    let (engine, store) = engine();
    assert_ok!(engine.publish(approval()));

    let report = engine
        .start("approval", PropertyBag::new(), None)
        .await
        .expect("start succeeds");
    let halted = engine.instance(report.instance_id).await.expect("stored");

    // Someone else holds the instance.
    let claimed = store
        .claim(halted.id, halted.revision)
        .await
        .expect("claim succeeds");

    let result = engine
        .resume(report.instance_id, None, props(&[("approved", true)]))
        .await;
    assert!(matches!(
        result,
        Err(WorkflowError::ConcurrencyConflict { instance_id }) if instance_id == halted.id
    ));

    assert_ok!(store.release(halted.id, claimed.revision).await);
    let report = engine
        .resume(report.instance_id, None, props(&[("approved", true)]))
        .await
        .expect("resume succeeds");
    assert_eq!(report.status, WorkflowStatus::Finished);
}

#[tokio::test]
async fn test_concurrent_resumes_admit_one() {
    let release = Arc::new(tokio::sync::Notify::new());
    let blocker_release = release.clone();
    let store = Arc::new(InMemoryWorkflowStore::new());
    let engine = engine_with(
        registry().register(move || Blocker {
            release: blocker_release.clone(),
        }),
        store.clone(),
    );
    assert_ok!(engine.publish(
        WorkflowDefinition::builder("blocking", 1)
            .activity(ActivityRecord::new("b", "Blocker").as_start())
            .build(),
    ));

    let report = engine
        .start("blocking", PropertyBag::new(), None)
        .await
        .expect("start succeeds");
    let id = report.instance_id;
    assert_eq!(report.status, WorkflowStatus::Halted);

    let unblock = async {
        loop {
            let status = store.load(id).await.ok().flatten().map(|i| i.status);
            if status == Some(WorkflowStatus::Executing) {
                break;
            }
            tokio::task::yield_now().await;
        }
        release.notify_one();
    };

    let (first, second, ()) = tokio::join!(
        engine.resume(id, None, PropertyBag::new()),
        engine.resume(id, None, PropertyBag::new()),
        unblock,
    );

    let results = [first, second];
    let finished = results
        .iter()
        .filter(|r| matches!(r, Ok(report) if report.status == WorkflowStatus::Finished))
        .count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(WorkflowError::ConcurrencyConflict { .. })))
        .count();
    assert_eq!(finished, 1);
    assert_eq!(conflicts, 1);

    let instance = engine.instance(id).await.expect("stored");
    assert_eq!(instance.status, WorkflowStatus::Finished);
    assert_eq!(trail(&instance), vec![step("b", Some("Done"))]);
}
