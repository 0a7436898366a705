use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use calllog_core::{CallEvent, CallType, ContactRef, Direction, GroupingMode};
use calllog_query::PipelineConfig;
use calllog_settings::QueryMode;
use calllog_store::sqlite::{
    ConnectionConfig, SqliteContactResolver, SqliteEventStore, new_in_memory,
};
use calllog_store::{EventStore, QueryDescriptor, StoreError, materialize_event};
use calllog_tree::{Parent, TreeChange, TreeError};
use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::TryRecvError;
use tokio_util::sync::CancellationToken;

use super::*;
use crate::errors::ControllerError;

const ALICE: &str = "+15550001111";
const BOB: &str = "+15550002222";
const CAROL: &str = "+15550003333";

#[derive(Clone, Copy)]
enum Kind {
    Missed,
    Received,
    Dialed,
}

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

fn call(remote: &str, kind: Kind, secs: i64) -> CallEvent {
    let direction = match kind {
        Kind::Dialed => Direction::Outbound,
        Kind::Missed | Kind::Received => Direction::Inbound,
    };
    CallEvent::new(0, "ring/tel/ring", remote, direction, at(secs))
        .missed(matches!(kind, Kind::Missed))
}

struct Fixture {
    controller: CallHistoryController,
    store: Arc<SqliteEventStore>,
    resolver: Arc<SqliteContactResolver>,
}

fn options(mode: GroupingMode) -> ViewOptions {
    ViewOptions {
        mode,
        call_type: CallType::All,
        reference_time: None,
        match_digits: 7,
        limit: None,
        extra_columns: Vec::new(),
        resolve_on_insert: true,
    }
}

fn fixture_with(options: ViewOptions, config: PipelineConfig) -> Fixture {
    let pool = new_in_memory(&ConnectionConfig::default()).unwrap();
    let store = Arc::new(SqliteEventStore::new(pool.clone(), 7).unwrap());
    let resolver = Arc::new(SqliteContactResolver::new(pool, 7));
    let controller = CallHistoryController::with_options(
        store.clone(),
        resolver.clone(),
        options,
        config,
        64,
    );
    Fixture {
        controller,
        store,
        resolver,
    }
}

fn fixture(mode: GroupingMode) -> Fixture {
    fixture_with(options(mode), PipelineConfig::default())
}

fn streamed(first: usize, chunk: usize) -> PipelineConfig {
    PipelineConfig {
        mode: QueryMode::StreamedAsync,
        first_chunk_size: first,
        chunk_size: chunk,
        ..PipelineConfig::default()
    }
}

async fn stored(store: &SqliteEventStore) -> Vec<CallEvent> {
    let d = QueryDescriptor::events(GroupingMode::ByTime).build().unwrap();
    let mut cursor = store.execute_query(&d).await.unwrap();
    let mut out = Vec::new();
    while let Some(row) = cursor.next_row().await {
        out.push(materialize_event(&row.unwrap(), d.fields()).unwrap());
    }
    out
}

fn drain(rx: &mut broadcast::Receiver<ViewNotification>) -> Vec<ViewNotification> {
    let mut out = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(n) => out.push(n),
            Err(TryRecvError::Empty | TryRecvError::Closed) => return out,
            Err(TryRecvError::Lagged(_)) => {}
        }
    }
}

/// Alice missed twice, then Bob dialed.
async fn seed(store: &SqliteEventStore) {
    let _ = store
        .insert_calls(&[
            call(ALICE, Kind::Missed, 10),
            call(ALICE, Kind::Missed, 20),
            call(BOB, Kind::Dialed, 30),
        ])
        .await
        .unwrap();
}

// ── fetching ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn get_events_groups_by_contact() {
    let mut f = fixture(GroupingMode::ByContact);
    seed(&f.store).await;
    let mut rx = f.controller.subscribe();

    f.controller.get_events().await.unwrap();

    let tree = f.controller.tree();
    assert_eq!(tree.row_count(), 2);
    assert_eq!(tree.representative(0).unwrap().remote_uid, BOB);
    let alice = tree.representative(1).unwrap();
    assert_eq!(alice.id, 2);
    assert_eq!(alice.event_count, 2);
    assert_eq!(tree.group(1).unwrap().len(), 2);
    assert!(!f.controller.is_loading());

    assert_eq!(
        drain(&mut rx),
        vec![
            ViewNotification::Tree(TreeChange::Reset),
            ViewNotification::Tree(TreeChange::Insert {
                parent: Parent::Root,
                start: 0,
                end: 1
            }),
            ViewNotification::FetchFinished { rows: 3 },
        ]
    );
}

#[tokio::test]
async fn streamed_fetch_waits_for_fetch_more() {
    let mut f = fixture_with(options(GroupingMode::ByContact), streamed(2, 2));
    let calls: Vec<CallEvent> = (0..5)
        .map(|i| call(&format!("+1555000{i:04}"), Kind::Received, i64::from(i)))
        .collect();
    let _ = f.store.insert_calls(&calls).await.unwrap();
    let mut rx = f.controller.subscribe();

    f.controller.get_events().await.unwrap();
    assert_eq!(f.controller.tree().row_count(), 2);
    assert!(f.controller.is_loading());
    assert!(f.controller.can_fetch_more());
    assert!(drain(&mut rx).contains(&ViewNotification::CanFetchMore(true)));

    assert!(f.controller.fetch_more().await.unwrap());
    assert_eq!(f.controller.tree().row_count(), 4);
    assert!(f.controller.can_fetch_more());

    assert!(f.controller.fetch_more().await.unwrap());
    assert_eq!(f.controller.tree().row_count(), 5);
    assert!(!f.controller.is_loading());
    assert!(!f.controller.can_fetch_more());
    assert!(drain(&mut rx).contains(&ViewNotification::FetchFinished { rows: 5 }));

    assert!(!f.controller.fetch_more().await.unwrap());
}

#[tokio::test]
async fn sync_mode_loads_everything_at_once() {
    let config = PipelineConfig {
        mode: QueryMode::Sync,
        ..streamed(1, 1)
    };
    let mut f = fixture_with(options(GroupingMode::ByTime), config);
    seed(&f.store).await;

    f.controller.get_events().await.unwrap();
    assert_eq!(f.controller.tree().row_count(), 2);
    assert_eq!(f.controller.tree().representative(1).unwrap().event_count, 2);
    assert!(!f.controller.is_loading());
}

#[tokio::test]
async fn extra_columns_are_forwarded() {
    let mut f = fixture(GroupingMode::ByContact);
    seed(&f.store).await;
    f.controller
        .set_extra_columns(vec![calllog_store::ExtraColumn::ChannelTotal]);
    let mut rx = f.controller.subscribe();

    f.controller.get_events().await.unwrap();
    let extras = drain(&mut rx)
        .into_iter()
        .find(|n| matches!(n, ViewNotification::Extras { .. }));
    assert_matches!(
        extras,
        Some(ViewNotification::Extras { start: 0, end: 2, ref columns, ref values })
            if columns.len() == 1 && values.len() == 3
    );
}

#[tokio::test]
async fn set_filter_refetches_once_fetched() {
    let mut f = fixture(GroupingMode::ByContact);
    seed(&f.store).await;

    // Nothing is fetched before the first get_events.
    f.controller
        .set_filter(GroupingMode::ByContact, CallType::All, None)
        .await
        .unwrap();
    assert_eq!(f.controller.tree().row_count(), 0);

    f.controller.get_events().await.unwrap();
    f.controller
        .set_filter(GroupingMode::ByTime, CallType::Missed, None)
        .await
        .unwrap();
    let tree = f.controller.tree();
    assert_eq!(tree.row_count(), 1);
    assert_eq!(tree.representative(0).unwrap().remote_uid, ALICE);
    assert_eq!(tree.representative(0).unwrap().event_count, 2);
}

#[tokio::test]
async fn unsupported_mode_is_rejected() {
    let mut f = fixture(GroupingMode::ByContact);
    seed(&f.store).await;
    f.controller.get_events().await.unwrap();

    let err = f
        .controller
        .set_filter(GroupingMode::ByType, CallType::All, None)
        .await
        .unwrap_err();
    assert_matches!(err, ControllerError::Tree(TreeError::UnsupportedMode(GroupingMode::ByType)));
    assert_eq!(f.controller.options().mode, GroupingMode::ByContact);
    assert_eq!(f.controller.tree().row_count(), 2);

    let mut g = fixture(GroupingMode::ByService);
    assert_matches!(
        g.controller.delete_at(0).await,
        Err(ControllerError::Tree(TreeError::UnsupportedMode(GroupingMode::ByService)))
    );
}

// ── mutations ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn delete_at_removes_hidden_members_in_contact_mode() {
    let mut f = fixture(GroupingMode::ByContact);
    seed(&f.store).await;
    f.controller
        .set_filter(GroupingMode::ByContact, CallType::All, Some(at(15)))
        .await
        .unwrap();
    f.controller.get_events().await.unwrap();
    // Alice's call at 10 is older than the reference time.
    assert_eq!(f.controller.tree().group(1).unwrap().len(), 1);
    let mut rx = f.controller.subscribe();

    assert_eq!(f.controller.delete_at(1).await.unwrap(), 2);

    assert_eq!(f.controller.tree().row_count(), 1);
    let remaining = stored(&f.store).await;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].remote_uid, BOB);
    assert_eq!(
        drain(&mut rx),
        vec![ViewNotification::Tree(TreeChange::Remove {
            parent: Parent::Root,
            start: 1,
            end: 1
        })]
    );
}

#[tokio::test]
async fn delete_at_merges_time_neighbours() {
    let mut f = fixture(GroupingMode::ByTime);
    let _ = f
        .store
        .insert_calls(&[
            call(ALICE, Kind::Missed, 10),
            call(BOB, Kind::Missed, 20),
            call(ALICE, Kind::Missed, 30),
        ])
        .await
        .unwrap();
    f.controller.get_events().await.unwrap();
    assert_eq!(f.controller.tree().row_count(), 3);
    let mut rx = f.controller.subscribe();

    assert_eq!(f.controller.delete_at(1).await.unwrap(), 1);

    let tree = f.controller.tree();
    assert_eq!(tree.row_count(), 1);
    assert_eq!(tree.representative(0).unwrap().event_count, 2);
    assert_eq!(
        drain(&mut rx),
        vec![
            ViewNotification::Tree(TreeChange::Remove {
                parent: Parent::Root,
                start: 1,
                end: 2
            }),
            ViewNotification::Tree(TreeChange::Update {
                parent: Parent::Root,
                row: 0
            }),
        ]
    );

    // The broadcast copy of our own commit changes nothing.
    assert_eq!(f.controller.sync_pending().await.unwrap(), 1);
    assert!(drain(&mut rx).is_empty());
    assert_eq!(f.controller.tree().row_count(), 1);
}

#[tokio::test]
async fn delete_at_out_of_range() {
    let mut f = fixture(GroupingMode::ByContact);
    seed(&f.store).await;
    f.controller.get_events().await.unwrap();

    assert_matches!(
        f.controller.delete_at(5).await,
        Err(ControllerError::RowOutOfRange { row: 5, len: 2 })
    );
    assert_eq!(stored(&f.store).await.len(), 3);
}

#[tokio::test]
async fn failed_mutation_rolls_back() {
    let mut f = fixture(GroupingMode::ByContact);
    seed(&f.store).await;
    f.controller.get_events().await.unwrap();
    let mut rx = f.controller.subscribe();

    let err = f.controller.delete_event(999).await.unwrap_err();
    assert_matches!(
        err,
        ControllerError::Consistency {
            operation: "delete_event",
            source: StoreError::EventNotFound(999)
        }
    );
    assert!(drain(&mut rx).is_empty());
    assert_eq!(f.controller.sync_pending().await.unwrap(), 0);
    assert_eq!(stored(&f.store).await.len(), 3);
}

#[tokio::test]
async fn set_group_read_touches_unread_occurrences() {
    let mut f = fixture(GroupingMode::ByContact);
    seed(&f.store).await;
    f.controller.get_events().await.unwrap();

    assert_eq!(f.controller.set_group_read(1, true).await.unwrap(), 2);
    let group = f.controller.tree().group(1).unwrap();
    assert!(group.occurrences().all(|e| e.is_read));
    // Already read: no transaction.
    assert_eq!(f.controller.set_group_read(1, true).await.unwrap(), 0);

    let read: Vec<_> = stored(&f.store).await.into_iter().filter(|e| e.is_read).collect();
    assert_eq!(read.len(), 2);
    assert!(read.iter().all(|e| e.remote_uid == ALICE));
}

#[tokio::test]
async fn mark_all_read_then_delete_all() {
    let mut f = fixture(GroupingMode::ByTime);
    seed(&f.store).await;
    f.controller.get_events().await.unwrap();

    f.controller.mark_all_read().await.unwrap();
    assert!(
        f.controller
            .tree()
            .groups()
            .all(|g| g.occurrences().all(|e| e.is_read))
    );

    let mut rx = f.controller.subscribe();
    f.controller.delete_all().await.unwrap();
    assert_eq!(f.controller.tree().row_count(), 0);
    assert!(stored(&f.store).await.is_empty());
    assert_eq!(drain(&mut rx), vec![ViewNotification::Tree(TreeChange::Reset)]);
}

// ── external changes ────────────────────────────────────────────────────────

#[tokio::test]
async fn external_insert_is_applied() {
    let mut f = fixture(GroupingMode::ByContact);
    seed(&f.store).await;
    f.controller.get_events().await.unwrap();
    let mut rx = f.controller.subscribe();

    let _ = f
        .store
        .insert_calls(&[call(CAROL, Kind::Received, 40)])
        .await
        .unwrap();
    assert_eq!(f.controller.sync_pending().await.unwrap(), 1);
    assert_eq!(f.controller.tree().row_count(), 3);
    assert_eq!(f.controller.tree().representative(0).unwrap().remote_uid, CAROL);
    assert_eq!(
        drain(&mut rx),
        vec![ViewNotification::Tree(TreeChange::Insert {
            parent: Parent::Root,
            start: 0,
            end: 0
        })]
    );

    // A third missed call from Alice lifts her to the top and extends the streak.
    let _ = f
        .store
        .insert_calls(&[call(ALICE, Kind::Missed, 50)])
        .await
        .unwrap();
    let _ = f.controller.sync_pending().await.unwrap();
    let top = f.controller.tree().representative(0).unwrap();
    assert_eq!(top.remote_uid, ALICE);
    assert_eq!(top.event_count, 3);
}

#[tokio::test]
async fn changes_before_first_fetch_are_ignored() {
    let mut f = fixture(GroupingMode::ByContact);
    seed(&f.store).await;
    assert_eq!(f.controller.sync_pending().await.unwrap(), 1);
    assert_eq!(f.controller.tree().row_count(), 0);
}

#[tokio::test]
async fn changes_queued_before_fetch_are_not_replayed() {
    let mut f = fixture(GroupingMode::ByContact);
    seed(&f.store).await;
    let mut tx = f.store.begin().await.unwrap();
    tx.delete_all().await.unwrap();
    let _ = tx.commit().await.unwrap();
    let _ = f
        .store
        .insert_calls(&[call(CAROL, Kind::Received, 40)])
        .await
        .unwrap();

    f.controller.get_events().await.unwrap();
    assert_eq!(f.controller.tree().row_count(), 1);
    let mut rx = f.controller.subscribe();

    assert_eq!(f.controller.sync_pending().await.unwrap(), 0);
    assert!(drain(&mut rx).is_empty());
    assert_eq!(f.controller.tree().row_count(), 1);
    assert_eq!(f.controller.tree().representative(0).unwrap().remote_uid, CAROL);
}

#[tokio::test]
async fn refetch_drops_queued_changes() {
    let mut f = fixture(GroupingMode::ByContact);
    seed(&f.store).await;
    f.controller.get_events().await.unwrap();

    let _ = f
        .store
        .insert_calls(&[call(CAROL, Kind::Received, 40)])
        .await
        .unwrap();
    // The filter change fetches again and already sees Carol.
    f.controller
        .set_filter(GroupingMode::ByContact, CallType::All, None)
        .await
        .unwrap();
    assert_eq!(f.controller.tree().row_count(), 3);
    assert_eq!(f.controller.sync_pending().await.unwrap(), 0);
    assert_eq!(f.controller.tree().row_count(), 3);
}

#[tokio::test]
async fn type_change_reconciles_groups() {
    let mut f = fixture(GroupingMode::ByContactAndType);
    let _ = f
        .store
        .insert_calls(&[call(ALICE, Kind::Missed, 10), call(ALICE, Kind::Missed, 20)])
        .await
        .unwrap();
    f.controller.get_events().await.unwrap();
    assert_eq!(f.controller.tree().row_count(), 1);
    assert_eq!(f.controller.tree().representative(0).unwrap().event_count, 2);

    // Someone else marks the newest call answered.
    let mut answered = f.controller.tree().representative(0).unwrap().clone();
    answered.is_missed_call = false;
    let mut tx = f.store.begin().await.unwrap();
    tx.modify_event(&answered).await.unwrap();
    let _ = tx.commit().await.unwrap();

    assert_eq!(f.controller.sync_pending().await.unwrap(), 1);
    let tree = f.controller.tree();
    assert_eq!(tree.row_count(), 2);
    let received = tree.representative(0).unwrap();
    assert_eq!(received.id, 2);
    assert!(!received.is_missed_call);
    let missed = tree.representative(1).unwrap();
    assert_eq!(missed.id, 1);
    assert_eq!(missed.event_count, 1);
}

#[tokio::test]
async fn contact_change_refreshes_matching_groups() {
    let mut f = fixture(GroupingMode::ByContact);
    seed(&f.store).await;
    f.controller.get_events().await.unwrap();
    assert!(f.controller.tree().representative(1).unwrap().contacts.is_empty());

    f.resolver
        .upsert_contact(1, "Alice", vec!["+1 555 000 1111".into()])
        .await
        .unwrap();
    assert_eq!(f.controller.sync_pending().await.unwrap(), 1);

    let alice = ContactRef {
        id: 1,
        name: "Alice".into(),
    };
    let tree = f.controller.tree();
    assert_eq!(tree.representative(1).unwrap().contacts, vec![alice]);
    assert!(tree.representative(0).unwrap().contacts.is_empty());
}

#[tokio::test]
async fn new_calls_pick_up_known_contacts() {
    let mut f = fixture(GroupingMode::ByContact);
    f.controller.get_events().await.unwrap();
    f.resolver
        .upsert_contact(7, "Carol", vec![CAROL.into()])
        .await
        .unwrap();
    let _ = f.controller.sync_pending().await.unwrap();

    let _ = f
        .store
        .insert_calls(&[call(CAROL, Kind::Received, 40)])
        .await
        .unwrap();
    let _ = f.controller.sync_pending().await.unwrap();
    let carol = f.controller.tree().representative(0).unwrap();
    assert_eq!(carol.contacts.len(), 1);
    assert_eq!(carol.contacts[0].name, "Carol");
}

// ── run loop ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn run_loop_applies_changes_until_cancelled() {
    let mut f = fixture(GroupingMode::ByContact);
    seed(&f.store).await;
    f.controller.get_events().await.unwrap();
    let mut rx = f.controller.subscribe();

    let cancel = CancellationToken::new();
    let stopper = cancel.clone();
    let store = Arc::clone(&f.store);
    let writer = async move {
        let _ = store
            .insert_calls(&[call(CAROL, Kind::Received, 40)])
            .await
            .unwrap();
        loop {
            if let ViewNotification::Tree(TreeChange::Insert {
                parent: Parent::Root,
                ..
            }) = rx.recv().await.unwrap()
            {
                break;
            }
        }
        stopper.cancel();
    };

    let ((), ()) = tokio::time::timeout(
        Duration::from_secs(10),
        async { tokio::join!(writer, f.controller.run(cancel)) },
    )
    .await
    .unwrap();
    assert_eq!(f.controller.tree().row_count(), 3);
    assert_eq!(f.controller.tree().representative(0).unwrap().remote_uid, CAROL);
}

#[tokio::test]
async fn handle_drives_running_loop() {
    let mut f = fixture_with(options(GroupingMode::ByContact), streamed(2, 2));
    let calls: Vec<CallEvent> = (0..5)
        .map(|i| call(&format!("+1555000{i:04}"), Kind::Received, i64::from(i)))
        .collect();
    let _ = f.store.insert_calls(&calls).await.unwrap();
    let handle = f.controller.handle();

    let cancel = CancellationToken::new();
    let stopper = cancel.clone();
    let client = async move {
        handle.get_events().await.unwrap();
        assert!(handle.fetch_more().await.unwrap());
        assert!(handle.fetch_more().await.unwrap());
        assert!(!handle.fetch_more().await.unwrap());

        assert_eq!(handle.delete_at(0).await.unwrap(), 1);
        assert_matches!(
            handle.delete_at(9).await,
            Err(ControllerError::RowOutOfRange { row: 9, len: 4 })
        );
        assert_eq!(handle.set_group_read(0, true).await.unwrap(), 1);
        stopper.cancel();
    };

    let ((), ()) = tokio::time::timeout(
        Duration::from_secs(10),
        async { tokio::join!(client, f.controller.run(cancel)) },
    )
    .await
    .unwrap();
    assert_eq!(f.controller.tree().row_count(), 4);
    assert!(f.controller.tree().representative(0).unwrap().is_read);
    assert_eq!(stored(&f.store).await.len(), 4);
}

#[tokio::test]
async fn handle_reports_dropped_controller() {
    let f = fixture(GroupingMode::ByContact);
    let handle = f.controller.handle();
    drop(f);
    assert_matches!(handle.mark_all_read().await, Err(ControllerError::Stopped));
}
