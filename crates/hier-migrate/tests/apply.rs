//! Migration runs against the in-memory store

use hier_migrate::{ErrorKind, JobMode, JobStatus, MigrationError, WorkItemRepository};
use hier_model::{WorkItem, WorkItemId, WorkItemType::*};
use hier_scan::Confidence;
use hier_test_utils::*;
use pretty_assertions::assert_eq;

/// Two products. Under p2 a story and a task hang off the product directly,
/// each with exactly one legal parent in the same product. Under p1 a story
/// has two candidate epics.
fn two_products() -> Vec<WorkItem> {
    tree(&[
        ("p1", Product, None),
        ("e1", Epic, Some("p1")),
        ("e2", Epic, Some("p1")),
        ("s2", Story, Some("p1")),
        ("p2", Product, None),
        ("e3", Epic, Some("p2")),
        ("s1", Story, Some("p2")),
        ("t1", Task, Some("p2")),
    ])
}

async fn fetch(store: &hier_migrate::MemoryStore, id: &str) -> WorkItem {
    store
        .get_item(&tenant(), &WorkItemId::from(id))
        .await
        .unwrap()
        .unwrap()
}

fn ids(item: &WorkItem) -> Vec<&str> {
    item.children_ids.iter().map(WorkItemId::as_str).collect()
}

#[tokio::test]
async fn dry_run_persists_report_without_mutation() {
    let store = seeded_store(two_products());
    let before = items_of(&store);

    let outcome = service(&store)
        .migrate(&tenant(), "agile", JobMode::DryRun, &agile_preset_json(), &admin())
        .await
        .unwrap();

    assert_eq!(outcome.status, JobStatus::Completed);
    assert_eq!(outcome.summary.moved_items, 0);
    assert_eq!(outcome.summary.flagged_for_review, 1);
    assert_eq!(outcome.summary.invalid_items, 3);
    assert_eq!(items_of(&store), before);

    let report = service(&store)
        .report(&tenant(), outcome.job_id, &admin())
        .await
        .unwrap();
    assert_eq!(report.mode, JobMode::DryRun);
    assert_eq!(report.recommended_moves.len(), 2);
    assert_eq!(report.review_queue[0].item_id.as_str(), "s2");
    assert!(report.moved_items.is_empty());
}

#[tokio::test]
async fn apply_keeps_both_sides_of_every_move_in_sync() {
    let store = seeded_store(two_products());

    let outcome = service(&store)
        .migrate(&tenant(), "agile", JobMode::Apply, &agile_preset_json(), &admin())
        .await
        .unwrap();

    assert_eq!(outcome.status, JobStatus::Completed);
    assert_eq!(outcome.summary.moved_items, 2);

    let s1 = fetch(&store, "s1").await;
    let t1 = fetch(&store, "t1").await;
    assert_eq!(s1.parent_id, Some(WorkItemId::from("e3")));
    assert_eq!(t1.parent_id, Some(WorkItemId::from("s1")));
    assert_eq!(ids(&fetch(&store, "p2").await), vec!["e3"]);
    assert_eq!(ids(&fetch(&store, "e3").await), vec!["s1"]);
    assert_eq!(ids(&s1), vec!["t1"]);

    // the ambiguous story is left alone
    assert_eq!(fetch(&store, "s2").await.parent_id, Some(WorkItemId::from("p1")));

    let moves = service(&store)
        .moves(&tenant(), outcome.job_id, &admin())
        .await
        .unwrap();
    let moved: Vec<&str> = moves.iter().map(|m| m.item_id.as_str()).collect();
    assert_eq!(moved, vec!["s1", "t1"]);
    assert!(moves.windows(2).all(|w| w[0].seq < w[1].seq));
    assert!(moves.iter().all(|m| m.actor_id == admin()));

    let job = service(&store)
        .job(&tenant(), outcome.job_id, &admin())
        .await
        .unwrap();
    assert_eq!(job.progress.planned_moves, 2);
    assert_eq!(job.progress.applied_moves, 2);
    assert_eq!(job.progress.skipped_moves, 0);
}

#[tokio::test]
async fn low_confidence_moves_are_reported_not_applied() {
    // p2 has no epic of its own; e1 under p1 is the only epic tenant-wide
    let store = seeded_store(tree(&[
        ("p1", Product, None),
        ("e1", Epic, Some("p1")),
        ("p2", Product, None),
        ("s5", Story, Some("p2")),
    ]));

    let outcome = service(&store)
        .migrate(&tenant(), "agile", JobMode::Apply, &agile_preset_json(), &admin())
        .await
        .unwrap();

    assert_eq!(outcome.summary.moved_items, 0);
    assert_eq!(fetch(&store, "s5").await.parent_id, Some(WorkItemId::from("p2")));

    let report = service(&store)
        .report(&tenant(), outcome.job_id, &admin())
        .await
        .unwrap();
    assert_eq!(report.recommended_moves.len(), 1);
    assert_eq!(report.recommended_moves[0].confidence, Confidence::Low);
    assert_eq!(report.recommended_moves[0].to_parent_id.as_str(), "e1");
}

#[tokio::test]
async fn second_apply_converges() {
    let store = seeded_store(two_products());
    let svc = service(&store);

    let first = svc
        .migrate(&tenant(), "agile", JobMode::Apply, &agile_preset_json(), &admin())
        .await
        .unwrap();
    let after_first = items_of(&store);

    let second = svc
        .migrate(&tenant(), "agile", JobMode::Apply, &agile_preset_json(), &admin())
        .await
        .unwrap();

    assert_eq!(first.summary.moved_items, 2);
    assert_eq!(second.summary.moved_items, 0);
    assert_eq!(second.summary.flagged_for_review, 1);
    assert_eq!(items_of(&store), after_first);

    let preview = svc
        .scan_preview(&tenant(), &agile_preset_json(), &admin())
        .await
        .unwrap();
    assert_eq!(preview.high_confidence_moves().count(), 0);
}

#[tokio::test]
async fn apply_switches_active_preset() {
    let store = seeded_store(two_products());
    use hier_migrate::TenantDirectory;
    store.set_active_preset_key(&tenant(), "classic").await.unwrap();

    let outcome = service(&store)
        .migrate(&tenant(), "agile", JobMode::Apply, &agile_preset_json(), &admin())
        .await
        .unwrap();

    let job = service(&store)
        .job(&tenant(), outcome.job_id, &admin())
        .await
        .unwrap();
    assert_eq!(job.from_preset_key.as_deref(), Some("classic"));
    assert_eq!(
        store.active_preset_key(&tenant()).await.unwrap().as_deref(),
        Some("agile")
    );
}

#[tokio::test]
async fn failure_mid_job_marks_failed_and_keeps_committed_moves() {
    let store = seeded_store(two_products());

    let err = flaky_service(&store, 1)
        .migrate(&tenant(), "agile", JobMode::Apply, &agile_preset_json(), &admin())
        .await
        .unwrap_err();

    let MigrationError::Execution { job_id, message } = &err else {
        panic!("expected execution error, got {err:?}");
    };
    assert_eq!(err.kind(), ErrorKind::Execution);
    assert!(message.contains("connection reset"));

    let job = service(&store).job(&tenant(), *job_id, &admin()).await.unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error.as_deref(), Some(message.as_str()));
    assert_eq!(job.progress.applied_moves, 1);
    assert!(job.finished_at.is_some());

    // the first move stays, the second never happened
    assert_eq!(fetch(&store, "s1").await.parent_id, Some(WorkItemId::from("e3")));
    assert_eq!(fetch(&store, "t1").await.parent_id, Some(WorkItemId::from("p2")));

    // a failed run never switches the preset or leaves a report
    use hier_migrate::TenantDirectory;
    assert!(store.active_preset_key(&tenant()).await.unwrap().is_none());
    assert!(service(&store)
        .report(&tenant(), *job_id, &admin())
        .await
        .is_err());
}

#[tokio::test]
async fn rerun_after_failure_applies_only_remaining_moves() {
    let store = seeded_store(two_products());
    flaky_service(&store, 1)
        .migrate(&tenant(), "agile", JobMode::Apply, &agile_preset_json(), &admin())
        .await
        .unwrap_err();

    let outcome = service(&store)
        .migrate(&tenant(), "agile", JobMode::Apply, &agile_preset_json(), &admin())
        .await
        .unwrap();

    assert_eq!(outcome.status, JobStatus::Completed);
    assert_eq!(outcome.summary.moved_items, 1);
    assert_eq!(fetch(&store, "t1").await.parent_id, Some(WorkItemId::from("s1")));
}

#[tokio::test]
async fn jobs_are_listed_newest_first() {
    let store = seeded_store(two_products());
    let svc = service(&store);

    let first = svc
        .migrate(&tenant(), "agile", JobMode::DryRun, &agile_preset_json(), &admin())
        .await
        .unwrap();
    let second = svc
        .migrate(&tenant(), "agile", JobMode::DryRun, &agile_preset_json(), &admin())
        .await
        .unwrap();

    let listed: Vec<_> = svc
        .jobs(&tenant(), &admin())
        .await
        .unwrap()
        .into_iter()
        .map(|job| job.id)
        .collect();
    assert_eq!(listed, vec![second.job_id, first.job_id]);
}

#[tokio::test]
async fn move_under_own_descendant_is_skipped() {
    // the task's only legal parent in p1 is the story hanging below it
    let store = seeded_store(tree(&[
        ("p1", Product, None),
        ("t1", Task, Some("p1")),
        ("s1", Story, Some("t1")),
    ]));
    let before = items_of(&store);

    let outcome = service(&store)
        .migrate(&tenant(), "agile", JobMode::Apply, &agile_preset_json(), &admin())
        .await
        .unwrap();

    assert_eq!(outcome.status, JobStatus::Completed);
    assert_eq!(outcome.summary.moved_items, 0);
    assert_eq!(items_of(&store), before);
    assert_eq!(fetch(&store, "t1").await.parent_id, Some(WorkItemId::from("p1")));
    assert_eq!(fetch(&store, "s1").await.parent_id, Some(WorkItemId::from("t1")));

    let job = service(&store)
        .job(&tenant(), outcome.job_id, &admin())
        .await
        .unwrap();
    assert_eq!(job.progress.planned_moves, 1);
    assert_eq!(job.progress.applied_moves, 0);
    assert_eq!(job.progress.skipped_moves, 1);
    assert!(service(&store)
        .moves(&tenant(), outcome.job_id, &admin())
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn item_deleted_between_scan_and_apply_is_skipped() {
    let store = seeded_store(two_products());

    let outcome = vanishing_service(&store, "t1")
        .migrate(&tenant(), "agile", JobMode::Apply, &agile_preset_json(), &admin())
        .await
        .unwrap();

    assert_eq!(outcome.status, JobStatus::Completed);
    assert_eq!(outcome.summary.moved_items, 1);
    assert_eq!(fetch(&store, "s1").await.parent_id, Some(WorkItemId::from("e3")));

    let job = service(&store)
        .job(&tenant(), outcome.job_id, &admin())
        .await
        .unwrap();
    assert_eq!(job.progress.planned_moves, 2);
    assert_eq!(job.progress.applied_moves, 1);
    assert_eq!(job.progress.skipped_moves, 1);

    let moves = service(&store)
        .moves(&tenant(), outcome.job_id, &admin())
        .await
        .unwrap();
    let moved: Vec<&str> = moves.iter().map(|m| m.item_id.as_str()).collect();
    assert_eq!(moved, vec!["s1"]);
}
