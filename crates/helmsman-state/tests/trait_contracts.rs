//! Trait contract tests for RunStore and OutcomeStore.
//!
//! Each contract is written once against `&dyn RunStore` / `&dyn OutcomeStore`
//! and exercised with the in-memory fakes and the in-memory SurrealDB
//! backend. Any conforming implementation must pass these.

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use helmsman_state::fakes::{MemoryOutcomeStore, MemoryRunStore};
use helmsman_state::storage_traits::*;
use helmsman_state::{StorageError, SurrealHandle, SurrealOutcomeStore, SurrealRunStore};

fn envelope(run_id: &str, repo: &str, active: bool, minute: i64) -> RunEnvelope {
    let t = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap() + Duration::minutes(minute);
    RunEnvelope {
        run_id: RunId(run_id.to_string()),
        repo_path: repo.to_string(),
        state: if active { "planned" } else { "published" }.to_string(),
        active,
        revision: 0,
        created_at: t,
        updated_at: t,
        payload: serde_json::json!({ "run_id": run_id, "note": "payload survives" }),
    }
}

fn outcome(id: &str, repo: &str, minute: i64) -> OutcomeEnvelope {
    OutcomeEnvelope {
        outcome_id: id.to_string(),
        repository: repo.to_string(),
        recorded_at: Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap() + Duration::minutes(minute),
        payload: serde_json::json!({ "outcome": "success", "id": id }),
    }
}

async fn surreal_stores() -> (SurrealRunStore, SurrealOutcomeStore) {
    let handle = Arc::new(SurrealHandle::in_memory().await.unwrap());
    (
        SurrealRunStore::new(handle.clone()),
        SurrealOutcomeStore::new(handle),
    )
}

// ===========================================================================
// RunStore contracts
// ===========================================================================

async fn contract_insert_then_load(store: &dyn RunStore) {
    let saved = store.save(envelope("r1", "/repo", true, 0), None).await.unwrap();
    assert_eq!(saved.revision, 1);

    let loaded = store.load(&RunId::from("r1")).await.unwrap();
    assert_eq!(loaded, saved);
    assert_eq!(loaded.payload["note"], "payload survives");
}

async fn contract_load_missing(store: &dyn RunStore) {
    let err = store.load(&RunId::from("missing")).await.unwrap_err();
    assert!(matches!(err, StorageError::RunNotFound { .. }));
}

async fn contract_duplicate_insert_rejected(store: &dyn RunStore) {
    store.save(envelope("r1", "/repo", false, 0), None).await.unwrap();
    let err = store
        .save(envelope("r1", "/repo", false, 1), None)
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::AlreadyExists { .. }));
}

async fn contract_second_active_run_rejected(store: &dyn RunStore) {
    store.save(envelope("r1", "/repo", true, 0), None).await.unwrap();
    let err = store
        .save(envelope("r2", "/repo", true, 1), None)
        .await
        .unwrap_err();
    match err {
        StorageError::ActiveRunExists { repo_path, run_id } => {
            assert_eq!(repo_path, "/repo");
            assert_eq!(run_id, "r1");
        }
        other => panic!("expected ActiveRunExists, got {other:?}"),
    }

    // Another repository is independent.
    store.save(envelope("r3", "/other", true, 2), None).await.unwrap();
}

async fn contract_compare_and_swap(store: &dyn RunStore) {
    let first = store.save(envelope("r1", "/repo", true, 0), None).await.unwrap();

    let mut next = first.clone();
    next.state = "versioned".to_string();
    let second = store.save(next, Some(first.revision)).await.unwrap();
    assert_eq!(second.revision, 2);

    // A writer still holding revision 1 loses.
    let mut stale = first.clone();
    stale.state = "canceled".to_string();
    let err = store.save(stale, Some(first.revision)).await.unwrap_err();
    match err {
        StorageError::ConcurrentModification {
            expected, actual, ..
        } => {
            assert_eq!(expected, 1);
            assert_eq!(actual, 2);
        }
        other => panic!("expected ConcurrentModification, got {other:?}"),
    }

    let loaded = store.load(&RunId::from("r1")).await.unwrap();
    assert_eq!(loaded.state, "versioned");
}

async fn contract_update_missing_run(store: &dyn RunStore) {
    let err = store
        .save(envelope("ghost", "/repo", true, 0), Some(1))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::RunNotFound { .. }));
}

async fn contract_closing_run_frees_slot(store: &dyn RunStore) {
    let first = store.save(envelope("r1", "/repo", true, 0), None).await.unwrap();
    let mut closed = first.clone();
    closed.active = false;
    closed.state = "canceled".to_string();
    store.save(closed, Some(first.revision)).await.unwrap();

    assert!(store.find_active("/repo").await.unwrap().is_none());
    store.save(envelope("r2", "/repo", true, 1), None).await.unwrap();
    let active = store.find_active("/repo").await.unwrap().unwrap();
    assert_eq!(active.run_id.as_str(), "r2");
}

async fn contract_find_latest(store: &dyn RunStore) {
    assert!(store.find_latest("/repo").await.unwrap().is_none());
    store.save(envelope("old", "/repo", false, 0), None).await.unwrap();
    store.save(envelope("new", "/repo", false, 5), None).await.unwrap();
    store.save(envelope("elsewhere", "/other", false, 9), None).await.unwrap();

    let latest = store.find_latest("/repo").await.unwrap().unwrap();
    assert_eq!(latest.run_id.as_str(), "new");
}

async fn contract_delete(store: &dyn RunStore) {
    store.save(envelope("r1", "/repo", false, 0), None).await.unwrap();
    store.delete(&RunId::from("r1")).await.unwrap();
    assert!(matches!(
        store.load(&RunId::from("r1")).await.unwrap_err(),
        StorageError::RunNotFound { .. }
    ));
    // Deleting again is a no-op.
    store.delete(&RunId::from("r1")).await.unwrap();
}

macro_rules! run_store_contracts {
    ($($name:ident),* $(,)?) => {
        mod memory_run_store {
            use super::*;
            $(
                #[tokio::test]
                async fn $name() {
                    let store = MemoryRunStore::new();
                    super::$name(&store).await;
                }
            )*
        }

        mod surreal_run_store {
            use super::*;
            $(
                #[tokio::test]
                async fn $name() {
                    let (store, _) = surreal_stores().await;
                    super::$name(&store).await;
                }
            )*
        }
    };
}

run_store_contracts!(
    contract_insert_then_load,
    contract_load_missing,
    contract_duplicate_insert_rejected,
    contract_second_active_run_rejected,
    contract_compare_and_swap,
    contract_update_missing_run,
    contract_closing_run_frees_slot,
    contract_find_latest,
    contract_delete,
);

// ===========================================================================
// OutcomeStore contracts
// ===========================================================================

async fn contract_recent_newest_first(store: &dyn OutcomeStore) {
    store.append(outcome("o1", "/repo", 0)).await.unwrap();
    store.append(outcome("o2", "/repo", 1)).await.unwrap();
    store.append(outcome("o3", "/repo", 2)).await.unwrap();
    store.append(outcome("x1", "/other", 3)).await.unwrap();

    let recent = store.recent("/repo", 10).await.unwrap();
    let ids: Vec<&str> = recent.iter().map(|o| o.outcome_id.as_str()).collect();
    assert_eq!(ids, vec!["o3", "o2", "o1"]);

    let bounded = store.recent("/repo", 2).await.unwrap();
    assert_eq!(bounded.len(), 2);
    assert_eq!(bounded[0].outcome_id, "o3");
}

async fn contract_recent_empty(store: &dyn OutcomeStore) {
    assert!(store.recent("/nothing", 10).await.unwrap().is_empty());
    store.append(outcome("o1", "/repo", 0)).await.unwrap();
    assert!(store.recent("/repo", 0).await.unwrap().is_empty());
}

async fn contract_duplicate_outcome_rejected(store: &dyn OutcomeStore) {
    store.append(outcome("o1", "/repo", 0)).await.unwrap();
    let err = store.append(outcome("o1", "/repo", 1)).await.unwrap_err();
    assert!(matches!(err, StorageError::AlreadyExists { .. }));
    assert_eq!(store.recent("/repo", 10).await.unwrap().len(), 1);
}

async fn contract_payload_preserved(store: &dyn OutcomeStore) {
    let original = outcome("o1", "/repo", 0);
    store.append(original.clone()).await.unwrap();
    let back = store.recent("/repo", 1).await.unwrap();
    assert_eq!(back[0], original);
}

macro_rules! outcome_store_contracts {
    ($($name:ident),* $(,)?) => {
        mod memory_outcome_store {
            use super::*;
            $(
                #[tokio::test]
                async fn $name() {
                    let store = MemoryOutcomeStore::new();
                    super::$name(&store).await;
                }
            )*
        }

        mod surreal_outcome_store {
            use super::*;
            $(
                #[tokio::test]
                async fn $name() {
                    let (_, store) = surreal_stores().await;
                    super::$name(&store).await;
                }
            )*
        }
    };
}

outcome_store_contracts!(
    contract_recent_newest_first,
    contract_recent_empty,
    contract_duplicate_outcome_rejected,
    contract_payload_preserved,
);

// ===========================================================================
// Fake-only behaviour
// ===========================================================================

#[tokio::test]
async fn memory_run_store_injected_failure_leaves_record_untouched() {
    let store = MemoryRunStore::new();
    let first = store.save(envelope("r1", "/repo", true, 0), None).await.unwrap();

    store.fail_next_save();
    let mut next = first.clone();
    next.state = "versioned".to_string();
    let err = store.save(next.clone(), Some(1)).await.unwrap_err();
    assert!(matches!(err, StorageError::Backend(_)));
    assert_eq!(store.load(&RunId::from("r1")).await.unwrap(), first);

    // Only the next save fails.
    store.save(next, Some(1)).await.unwrap();
}

#[tokio::test]
async fn unavailable_outcome_store_fails_every_call() {
    let store = MemoryOutcomeStore::unavailable();
    assert!(store.append(outcome("o1", "/repo", 0)).await.is_err());
    assert!(store.recent("/repo", 1).await.is_err());
}
