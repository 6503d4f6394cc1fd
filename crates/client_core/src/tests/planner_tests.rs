use std::{
    sync::{atomic::Ordering, Arc},
    time::Duration,
};

use super::*;
use crate::{
    reorder::ReorderKey,
    retry::RetryPolicy,
    store::OrderingMode,
    test_support::{day, fields, hm, MemoryStore},
};

fn session(store: &Arc<MemoryStore>, ordering: OrderingMode) -> PlannerSession<Arc<MemoryStore>> {
    let client = ActivityStoreClient::new(Arc::clone(store))
        .with_retry(RetryPolicy {
            max_attempts: 2,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
        })
        .with_ordering(ordering);
    PlannerSession::new(client)
}

fn activity(id: i64, date: NaiveDate, title: &str, hour: u32) -> Activity {
    Activity {
        id: ActivityId(id),
        date,
        fields: fields(title, hm(hour, 0)),
        rank: None,
    }
}

#[test]
fn newer_ticket_supersedes_older_one() {
    let mut state = PlannerState::new();
    let first = state.select_date(day(1));
    let second = state.select_date(day(2));
    assert!(state.is_loading());

    assert!(!state.apply_fetch(first, vec![activity(1, day(1), "A", 9)]));
    assert!(state.activities().is_empty());
    assert!(state.is_loading());

    assert!(state.apply_fetch(second, vec![activity(2, day(2), "B", 9)]));
    assert_eq!(state.activity_ids(), vec![ActivityId(2)]);
    assert!(!state.is_loading());
    assert_eq!(state.selected_date(), Some(day(2)));
}

#[test]
fn refresh_on_same_date_invalidates_earlier_fetch() {
    let mut state = PlannerState::new();
    assert_eq!(state.refresh_ticket(), None);

    let initial = state.select_date(day(5));
    let refresh = state.refresh_ticket().expect("date selected");
    assert_eq!(refresh.date, day(5));
    assert!(refresh.generation > initial.generation);
    assert!(!state.is_current(initial));
    assert!(state.apply_fetch(refresh, Vec::new()));
}

#[test]
fn selecting_a_date_cancels_an_active_reorder() {
    let mut state = PlannerState::new();
    let ticket = state.select_date(day(1));
    state.apply_fetch(ticket, vec![activity(1, day(1), "A", 9), activity(2, day(1), "B", 10)]);

    let order = state.activity_ids();
    state
        .reorder_mut()
        .key(&order, ActivityId(1), ReorderKey::Pickup);
    assert!(!state.reorder().is_idle());

    state.select_date(day(2));
    assert!(state.reorder().is_idle());
}

#[test]
fn editor_opens_prefilled_and_closes() {
    let mut state = PlannerState::new();
    let ticket = state.select_date(day(1));
    state.apply_fetch(ticket, vec![activity(4, day(1), "Temple", 9)]);

    assert!(!state.open_edit(ActivityId(99)));
    assert_eq!(state.editor(), &Editor::Closed);
    assert!(state.editor_fields_mut().is_none());

    assert!(state.open_edit(ActivityId(4)));
    match state.editor() {
        Editor::Editing { id, fields } => {
            assert_eq!(*id, ActivityId(4));
            assert_eq!(fields.title, "Temple");
        }
        other => panic!("unexpected editor {other:?}"),
    }

    state.close_editor();
    state.open_create();
    assert_eq!(state.editor(), &Editor::Creating(ActivityFields::default()));
}

#[test]
fn delete_needs_an_existing_row_and_is_cancellable() {
    let mut state = PlannerState::new();
    let ticket = state.select_date(day(1));
    state.apply_fetch(ticket, vec![activity(4, day(1), "Temple", 9)]);

    assert!(!state.request_delete(ActivityId(99)));
    assert!(state.request_delete(ActivityId(4)));
    state.cancel_delete();
    assert_eq!(state.pending_delete(), None);

    assert!(state.request_delete(ActivityId(4)));
    let refresh = state.refresh_ticket().expect("ticket");
    state.apply_fetch(refresh, Vec::new());
    assert_eq!(state.pending_delete(), None);
}

#[tokio::test]
async fn stale_fetch_for_previous_date_is_discarded() {
    let store = Arc::new(MemoryStore::new());
    store.seed(day(1), fields("Day one", hm(9, 0)));
    let day_two = store.seed(day(2), fields("Day two", hm(9, 0)));
    let session = session(&store, OrderingMode::StartTime);

    let (started, release) = store.gate(day(1));
    let slow = session.clone();
    let fast = session.clone();
    let (first, second) = tokio::join!(
        async move { slow.select_date(day(1)).await },
        async move {
            started.await.expect("day one fetch started");
            let applied = fast.select_date(day(2)).await;
            release.send(()).expect("release day one");
            applied
        }
    );

    assert!(!first);
    assert!(second);
    let state = session.snapshot().await;
    assert_eq!(state.selected_date(), Some(day(2)));
    assert_eq!(state.activity_ids(), vec![day_two]);
}

#[tokio::test]
async fn save_without_title_or_date_sends_nothing() {
    let store = Arc::new(MemoryStore::new());
    let session = session(&store, OrderingMode::StartTime);

    session
        .update_state(|state| {
            state.open_create();
            if let Some(fields) = state.editor_fields_mut() {
                fields.title = "Museum".into();
            }
        })
        .await;
    assert_eq!(session.save_editor().await.expect("save"), SaveOutcome::Invalid);

    session.select_date(day(3)).await;
    session
        .update_state(|state| {
            if let Some(fields) = state.editor_fields_mut() {
                fields.title = "   ".into();
            }
        })
        .await;
    assert_eq!(session.save_editor().await.expect("save"), SaveOutcome::Invalid);
    assert_eq!(store.inserts.load(Ordering::SeqCst), 0);
    assert!(matches!(session.snapshot().await.editor(), Editor::Creating(_)));

    session.update_state(PlannerState::close_editor).await;
    assert_eq!(
        session.save_editor().await.expect("save"),
        SaveOutcome::NothingToSave
    );
}

#[tokio::test]
async fn created_activity_shows_up_after_save() {
    let store = Arc::new(MemoryStore::new());
    store.seed(day(3), fields("Lunch", hm(12, 0)));
    let session = session(&store, OrderingMode::StartTime);
    session.select_date(day(3)).await;

    session
        .update_state(|state| {
            state.open_create();
            if let Some(fields) = state.editor_fields_mut() {
                fields.title = "Breakfast".into();
                fields.start_time = hm(8, 0);
                fields.end_time = hm(9, 0);
            }
        })
        .await;
    let SaveOutcome::Created(id) = session.save_editor().await.expect("save") else {
        panic!("expected a created activity");
    };

    let state = session.snapshot().await;
    assert_eq!(state.editor(), &Editor::Closed);
    assert_eq!(state.activities()[0].id, id);
    assert_eq!(state.activities()[0].date, day(3));
    assert_eq!(state.activities().len(), 2);
}

#[tokio::test]
async fn edit_replaces_fields_and_reloads() {
    let store = Arc::new(MemoryStore::new());
    let id = store.seed(day(3), fields("Temple", hm(9, 0)));
    let session = session(&store, OrderingMode::StartTime);
    session.select_date(day(3)).await;

    session
        .update_state(|state| {
            assert!(state.open_edit(id));
            if let Some(fields) = state.editor_fields_mut() {
                fields.title = "Shrine".into();
            }
        })
        .await;
    assert_eq!(
        session.save_editor().await.expect("save"),
        SaveOutcome::Updated(id)
    );
    assert_eq!(session.snapshot().await.activities()[0].title(), "Shrine");
}

#[tokio::test]
async fn failed_write_keeps_editor_open_and_reports_kind() {
    let store = Arc::new(MemoryStore::new());
    let session = session(&store, OrderingMode::StartTime);
    session.select_date(day(3)).await;
    session
        .update_state(|state| {
            state.open_create();
            if let Some(fields) = state.editor_fields_mut() {
                fields.title = "Museum".into();
            }
        })
        .await;

    store.fail_next_write(StoreError::new(StoreErrorKind::Transport, "connection reset"));
    let err = session.save_editor().await.expect_err("write fails");
    assert_eq!(err.kind(), StoreErrorKind::Transport);
    assert_eq!(err.action(), WriteAction::Create);
    assert!(err.alert_message().contains("connection reset"));
    assert!(matches!(session.snapshot().await.editor(), Editor::Creating(_)));

    let created = session.save_editor().await.expect("retry by user");
    assert!(matches!(created, SaveOutcome::Created(_)));
}

#[tokio::test]
async fn confirmed_delete_removes_row() {
    let store = Arc::new(MemoryStore::new());
    let keep = store.seed(day(3), fields("Keep", hm(9, 0)));
    let gone = store.seed(day(3), fields("Gone", hm(10, 0)));
    let session = session(&store, OrderingMode::StartTime);
    session.select_date(day(3)).await;

    assert_eq!(session.confirm_delete().await.expect("noop"), None);
    assert!(session.update_state(|state| state.request_delete(gone)).await);
    assert_eq!(session.confirm_delete().await.expect("delete"), Some(gone));
    assert_eq!(session.snapshot().await.activity_ids(), vec![keep]);
    assert_eq!(store.deletes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failed_delete_surfaces_not_found() {
    let store = Arc::new(MemoryStore::new());
    let id = store.seed(day(3), fields("Temple", hm(9, 0)));
    let session = session(&store, OrderingMode::StartTime);
    session.select_date(day(3)).await;

    session.update_state(|state| state.request_delete(id)).await;
    store.fail_next_write(StoreError::not_found("already removed"));
    let err = session.confirm_delete().await.expect_err("delete fails");
    assert_eq!(err.kind(), StoreErrorKind::NotFound);
    assert_eq!(err.action(), WriteAction::Delete);
}

#[tokio::test]
async fn drop_is_local_until_next_fetch_by_default() {
    let store = Arc::new(MemoryStore::new());
    let a = store.seed(day(3), fields("A", hm(9, 0)));
    let b = store.seed(day(3), fields("B", hm(10, 0)));
    let c = store.seed(day(3), fields("C", hm(11, 0)));
    let session = session(&store, OrderingMode::StartTime);
    session.select_date(day(3)).await;

    let outcome = session
        .update_state(|state| {
            let order = state.activity_ids();
            let reorder = state.reorder_mut();
            reorder.key(&order, c, ReorderKey::Pickup);
            reorder.key(&order, c, ReorderKey::Up);
            reorder.key(&order, c, ReorderKey::Up);
            reorder.key(&order, c, ReorderKey::Pickup)
        })
        .await
        .expect("drop outcome");
    assert!(session.handle_drop(outcome).await.expect("drop"));
    assert_eq!(session.snapshot().await.activity_ids(), vec![c, a, b]);
    assert_eq!(store.rank_updates.load(Ordering::SeqCst), 0);

    session.refresh().await;
    assert_eq!(session.snapshot().await.activity_ids(), vec![a, b, c]);
}

#[tokio::test]
async fn drop_persists_in_rank_mode() {
    let store = Arc::new(MemoryStore::new());
    let a = store.seed(day(3), fields("A", hm(9, 0)));
    let b = store.seed(day(3), fields("B", hm(10, 0)));
    let c = store.seed(day(3), fields("C", hm(11, 0)));
    let session = session(&store, OrderingMode::PersistedRank);
    session.select_date(day(3)).await;

    let outcome = DropOutcome {
        active: c,
        from: 2,
        to: 0,
    };
    assert!(session.handle_drop(outcome).await.expect("drop"));
    assert_eq!(store.rank_updates.load(Ordering::SeqCst), 3);

    session.refresh().await;
    assert_eq!(session.snapshot().await.activity_ids(), vec![c, a, b]);
    let ranks: Vec<Option<i64>> = store.rows().iter().map(|row| row.rank).collect();
    assert_eq!(ranks, vec![Some(1), Some(2), Some(0)]);
}

#[tokio::test]
async fn drop_against_outdated_list_is_ignored() {
    let store = Arc::new(MemoryStore::new());
    let a = store.seed(day(3), fields("A", hm(9, 0)));
    store.seed(day(3), fields("B", hm(10, 0)));
    let session = session(&store, OrderingMode::PersistedRank);
    session.select_date(day(3)).await;

    let outcome = DropOutcome {
        active: a,
        from: 1,
        to: 0,
    };
    assert!(!session.handle_drop(outcome).await.expect("drop"));
    assert_eq!(store.rank_updates.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn failed_rank_write_is_reported_as_reorder() {
    let store = Arc::new(MemoryStore::new());
    store.seed(day(3), fields("A", hm(9, 0)));
    let b = store.seed(day(3), fields("B", hm(10, 0)));
    let session = session(&store, OrderingMode::PersistedRank);
    session.select_date(day(3)).await;

    store.fail_next_write(StoreError::rejected(503, "unavailable"));
    let err = session
        .handle_drop(DropOutcome {
            active: b,
            from: 1,
            to: 0,
        })
        .await
        .expect_err("rank write fails");
    assert_eq!(err.action(), WriteAction::Reorder);
    assert_eq!(err.kind(), StoreErrorKind::Rejected);
}

#[tokio::test]
async fn partially_stored_order_is_reloaded_after_failure() {
    let store = Arc::new(MemoryStore::new());
    let a = store.seed(day(3), fields("A", hm(9, 0)));
    let b = store.seed(day(3), fields("B", hm(10, 0)));
    let c = store.seed(day(3), fields("C", hm(11, 0)));
    let session = session(&store, OrderingMode::PersistedRank);
    session.select_date(day(3)).await;

    store.fail_write_after(1, StoreError::new(StoreErrorKind::Transport, "connection reset"));
    let err = session
        .handle_drop(DropOutcome {
            active: a,
            from: 0,
            to: 2,
        })
        .await
        .expect_err("second rank write fails");
    assert_eq!(err.action(), WriteAction::Reorder);
    assert_eq!(store.rank_updates.load(Ordering::SeqCst), 2);

    // Only `b` got its rank, so the store order is b, then the unranked rows.
    let state = session.snapshot().await;
    assert_eq!(state.activity_ids(), vec![b, a, c]);
    assert!(!state.is_loading());
}
