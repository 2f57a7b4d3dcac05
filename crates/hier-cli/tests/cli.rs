//! End-to-end runs of the `hiermig` commands against temporary files

use hier_migrate::{JobStatus, JobStore, WorkItemRepository};
use hier_model::{WorkItemId, WorkItemType::*};
use hier_test_utils::*;
use pretty_assertions::assert_eq;
use std::path::Path;
use tempfile::TempDir;

async fn hiermig(args: &[&str]) -> anyhow::Result<String> {
    let matches = hier_cli::command().try_get_matches_from(
        std::iter::once("hiermig").chain(args.iter().copied()),
    )?;
    let mut out = Vec::new();
    hier_cli::run(&matches, &mut out).await?;
    Ok(String::from_utf8(out)?)
}

fn write(dir: &TempDir, name: &str, contents: &str) -> String {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).unwrap();
    path.to_string_lossy().into_owned()
}

/// State file with one HIGH-confidence fix: s1 hangs off p1 next to e1
fn seed_state(dir: &TempDir) -> String {
    let store = seeded_store(tree(&[
        ("p1", Product, None),
        ("e1", Epic, Some("p1")),
        ("s1", Story, Some("p1")),
    ]));
    let path = dir.path().join("state.json");
    hier_cli::save_state(&path, &store).unwrap();
    path.to_string_lossy().into_owned()
}

fn preset_file(dir: &TempDir) -> String {
    write(dir, "preset.json", &agile_preset_json().to_string())
}

#[tokio::test]
async fn scan_reports_features_without_candidates() {
    let dir = TempDir::new().unwrap();
    let items = write(
        &dir,
        "items.json",
        r#"[
            {"id": "p1", "tenantId": "acme", "type": "product"},
            {"id": "e1", "tenantId": "acme", "type": "epic", "parentId": "p1"},
            {"id": "f1", "tenantId": "acme", "type": "feature", "parentId": "e1"}
        ]"#,
    );
    let preset = write(
        &dir,
        "preset.json",
        r#"{"enabledTypes": ["product", "epic", "story"], "hierarchy": {"product": ["epic"], "epic": ["story"]}}"#,
    );

    let out = hiermig(&["scan", "--items", &items, "--preset", &preset])
        .await
        .unwrap();

    assert!(out.starts_with("3 items scanned: 1 errors, 1 warnings, 0 moves, 1 for review"));
    assert!(out.contains("REVIEW f1: no candidate new parents (0 candidates)"));
}

#[tokio::test]
async fn scan_json_output_is_machine_readable() {
    let dir = TempDir::new().unwrap();
    let items = write(
        &dir,
        "items.json",
        r#"[{"id": "p1", "tenantId": "acme", "type": "product"}]"#,
    );

    let out = hiermig(&["scan", "--items", &items, "--preset", &preset_file(&dir), "--json"])
        .await
        .unwrap();

    let value: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(value["issues"], serde_json::json!([]));
    assert_eq!(value["recommendedMoves"], serde_json::json!([]));
}

#[tokio::test]
async fn dry_run_leaves_items_untouched_but_records_job() {
    let dir = TempDir::new().unwrap();
    let state = seed_state(&dir);
    let preset = preset_file(&dir);

    hiermig(&[
        "migrate", "--state", &state, "--tenant", TENANT, "--to", "agile", "--preset", &preset,
        "--actor", ADMIN,
    ])
    .await
    .unwrap();

    let store = hier_cli::load_state(Path::new(&state)).unwrap();
    let s1 = store.get_item(&tenant(), &WorkItemId::from("s1")).await.unwrap().unwrap();
    assert_eq!(s1.parent_id, Some(WorkItemId::from("p1")));
    assert_eq!(store.list_jobs(&tenant()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn apply_then_rollback_round_trips_the_state_file() {
    let dir = TempDir::new().unwrap();
    let state = seed_state(&dir);
    let preset = preset_file(&dir);
    let before = items_of(&hier_cli::load_state(Path::new(&state)).unwrap());

    let out = hiermig(&[
        "migrate", "--state", &state, "--tenant", TENANT, "--to", "agile", "--preset", &preset,
        "--actor", ADMIN, "--apply",
    ])
    .await
    .unwrap();
    let outcome: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(outcome["status"], "COMPLETED");
    assert_eq!(outcome["summary"]["movedItems"], 1);
    let job_id = outcome["jobId"].as_str().unwrap().to_string();

    let migrated = hier_cli::load_state(Path::new(&state)).unwrap();
    let s1 = migrated.get_item(&tenant(), &WorkItemId::from("s1")).await.unwrap().unwrap();
    assert_eq!(s1.parent_id, Some(WorkItemId::from("e1")));

    let listing = hiermig(&["jobs", "--state", &state, "--tenant", TENANT]).await.unwrap();
    assert!(listing.contains(&job_id));
    assert!(listing.contains("COMPLETED"));

    hiermig(&[
        "rollback", "--state", &state, "--tenant", TENANT, "--job", &job_id, "--actor", ADMIN,
    ])
    .await
    .unwrap();

    let restored = hier_cli::load_state(Path::new(&state)).unwrap();
    assert_eq!(items_of(&restored), before);
    let jobs = restored.list_jobs(&tenant()).await.unwrap();
    assert_eq!(jobs[0].status, JobStatus::RolledBack);
}

#[tokio::test]
async fn non_admin_is_rejected_and_nothing_is_recorded() {
    let dir = TempDir::new().unwrap();
    let state = seed_state(&dir);
    let preset = preset_file(&dir);

    let err = hiermig(&[
        "migrate", "--state", &state, "--tenant", TENANT, "--to", "agile", "--preset", &preset,
        "--actor", "mallory", "--apply",
    ])
    .await
    .unwrap_err();

    assert!(format!("{err:#}").contains("not an administrator"));
    let store = hier_cli::load_state(Path::new(&state)).unwrap();
    assert!(store.list_jobs(&tenant()).await.unwrap().is_empty());
}

#[tokio::test]
async fn malformed_job_id_is_rejected() {
    let dir = TempDir::new().unwrap();
    let state = seed_state(&dir);

    let err = hiermig(&[
        "rollback", "--state", &state, "--tenant", TENANT, "--job", "not-a-ulid", "--actor", ADMIN,
    ])
    .await
    .unwrap_err();

    assert!(err.to_string().contains("not a job id"));
}

#[tokio::test]
async fn config_file_is_honoured() {
    let dir = TempDir::new().unwrap();
    let items = write(
        &dir,
        "items.json",
        r#"[{"id": "p1", "tenantId": "acme", "type": "product"}]"#,
    );
    let bad = write(&dir, "bad.toml", "anchor_type = \"portfolio\"\n");

    let err = hiermig(&[
        "scan", "--items", &items, "--preset", &preset_file(&dir), "--config", &bad,
    ])
    .await
    .unwrap_err();
    assert!(err.to_string().contains("loading config"));

    let good = write(&dir, "good.toml", "anchor_type = \"company\"\n");
    hiermig(&["scan", "--items", &items, "--preset", &preset_file(&dir), "--config", &good])
        .await
        .unwrap();
}
