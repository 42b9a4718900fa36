//! Integration tests for the main-process/widget exchange
//!
//! These tests drive a [`Tracker`] and a [`Widget`] against the same shared
//! store the way the two binaries do, with fixed clocks.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use hydrate_core::grid::GridGeometry;
use hydrate_core::sync::bridge::{KEY_TODAY_AMOUNT, KEY_WIDGET_UPDATE};
use hydrate_core::sync::{
    FileRefreshTrigger, FileSharedStore, MemorySharedStore, NoopRefresh, ReconcileOutcome,
    RefreshWatcher, SharedStore, SyncBridge, APP_REFRESH_MARKER, WIDGET_REFRESH_MARKER,
};
use hydrate_core::{BeverageKind, Database, EventOrigin, Tracker, Widget};
use serde_json::json;
use tempfile::TempDir;

const GOAL_ML: i64 = 2000;

fn tz() -> FixedOffset {
    FixedOffset::west_opt(5 * 3600).unwrap()
}

fn local(hour: u32, minute: u32) -> DateTime<Utc> {
    local_on(14, hour, minute)
}

fn local_on(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    tz().with_ymd_and_hms(2025, 3, day, hour, minute, 0)
        .unwrap()
        .with_timezone(&Utc)
}

fn memory_tracker() -> (
    Tracker<Arc<MemorySharedStore>, NoopRefresh, FixedOffset>,
    Arc<MemorySharedStore>,
) {
    let db = Database::open_in_memory().unwrap();
    db.migrate().unwrap();
    let store = Arc::new(MemorySharedStore::new());
    let bridge = SyncBridge::new(Arc::clone(&store), NoopRefresh);
    (Tracker::new(db, bridge, GOAL_ML, tz()), store)
}

fn memory_widget(
    store: &Arc<MemorySharedStore>,
) -> Widget<Arc<MemorySharedStore>, NoopRefresh, FixedOffset> {
    Widget::new(
        SyncBridge::new(Arc::clone(store), NoopRefresh),
        GridGeometry::new(10, 10),
        None,
        GOAL_ML,
        tz(),
    )
}

// ============================================
// Reconciliation
// ============================================

#[test]
fn test_widget_quick_add_is_absorbed_exactly_once() {
    let (tracker, store) = memory_tracker();

    tracker
        .log_drink_at(local(9, 0), 500, BeverageKind::Water, EventOrigin::ManualEntry)
        .unwrap();
    assert_eq!(tracker.today_total_at(local(9, 1)).unwrap(), 500);

    // Widget adds 300 ml on its own schedule
    store.set(KEY_TODAY_AMOUNT, json!(800)).unwrap();
    store.set(KEY_WIDGET_UPDATE, json!(true)).unwrap();

    let outcome = tracker.reconcile_at(local(9, 30)).unwrap();
    match outcome {
        ReconcileOutcome::Corrected {
            event,
            flag_cleared,
        } => {
            assert_eq!(event.volume_ml, 300);
            assert_eq!(event.origin, EventOrigin::SyncCorrection);
            assert_eq!(event.beverage_kind, BeverageKind::Water);
            assert!(flag_cleared);
        }
        other => panic!("expected a correction, got {:?}", other),
    }

    assert_eq!(tracker.today_total_at(local(9, 31)).unwrap(), 800);
    let shared = tracker.bridge().read_state().unwrap().unwrap();
    assert!(!shared.originated_from_widget);

    // Same shared value observed again
    assert_eq!(
        tracker.reconcile_at(local(9, 45)).unwrap(),
        ReconcileOutcome::InSync
    );
    assert_eq!(tracker.database().count_events().unwrap(), 2);
}

#[test]
fn test_replayed_observation_with_flag_still_set_is_idempotent() {
    let (tracker, store) = memory_tracker();
    tracker
        .log_drink_at(local(9, 0), 500, BeverageKind::Water, EventOrigin::ManualEntry)
        .unwrap();

    store.set(KEY_TODAY_AMOUNT, json!(800)).unwrap();
    store.set(KEY_WIDGET_UPDATE, json!(true)).unwrap();
    tracker.reconcile_at(local(9, 30)).unwrap();

    // At-least-once delivery: the flag comes back with the same total
    store.set(KEY_WIDGET_UPDATE, json!(true)).unwrap();
    assert_eq!(
        tracker.reconcile_at(local(9, 31)).unwrap(),
        ReconcileOutcome::InSync
    );
    assert_eq!(tracker.today_total_at(local(9, 32)).unwrap(), 800);
}

#[test]
fn test_unavailable_store_skips_the_tick() {
    let (tracker, store) = memory_tracker();
    tracker
        .log_drink_at(local(9, 0), 500, BeverageKind::Water, EventOrigin::ManualEntry)
        .unwrap();

    store.set_available(false);
    assert_eq!(
        tracker.reconcile_at(local(9, 30)).unwrap(),
        ReconcileOutcome::Skipped
    );

    // Logging still works; the publish is retried on a later tick
    tracker
        .log_drink_at(local(10, 0), 250, BeverageKind::Tea, EventOrigin::QuickAdd)
        .unwrap();
    assert_eq!(tracker.today_total_at(local(10, 1)).unwrap(), 750);

    store.set_available(true);
    assert_eq!(
        tracker.reconcile_at(local(10, 30)).unwrap(),
        ReconcileOutcome::Republished {
            today_volume_ml: 750
        }
    );
}

#[test]
fn test_flag_clear_failure_is_reported_degraded() {
    let (tracker, store) = memory_tracker();
    tracker
        .log_drink_at(local(9, 0), 500, BeverageKind::Water, EventOrigin::ManualEntry)
        .unwrap();

    store.set(KEY_TODAY_AMOUNT, json!(800)).unwrap();
    store.set(KEY_WIDGET_UPDATE, json!(true)).unwrap();
    store.fail_writes_to(KEY_WIDGET_UPDATE, true);

    match tracker.reconcile_at(local(9, 30)).unwrap() {
        ReconcileOutcome::Corrected { flag_cleared, .. } => assert!(!flag_cleared),
        other => panic!("expected a correction, got {:?}", other),
    }

    // The correction is stored, so the still-set flag finds nothing to do
    assert_eq!(
        tracker.reconcile_at(local(9, 31)).unwrap(),
        ReconcileOutcome::InSync
    );
    assert_eq!(tracker.today_total_at(local(9, 32)).unwrap(), 800);
}

#[test]
fn test_widget_total_landing_before_its_flag_is_not_overwritten() {
    let (tracker, store) = memory_tracker();
    tracker
        .log_drink_at(local(9, 0), 500, BeverageKind::Water, EventOrigin::ManualEntry)
        .unwrap();

    // Tick lands between the widget's total write and its flag write
    store.set(KEY_TODAY_AMOUNT, json!(800)).unwrap();
    assert_eq!(
        tracker.reconcile_at(local(9, 5)).unwrap(),
        ReconcileOutcome::Deferred
    );
    assert_eq!(store.get(KEY_TODAY_AMOUNT).unwrap(), Some(json!(800)));

    store.set(KEY_WIDGET_UPDATE, json!(true)).unwrap();
    match tracker.reconcile_at(local(9, 6)).unwrap() {
        ReconcileOutcome::Corrected { event, .. } => assert_eq!(event.volume_ml, 300),
        other => panic!("expected a correction, got {:?}", other),
    }
    assert_eq!(tracker.today_total_at(local(9, 7)).unwrap(), 800);
}

#[test]
fn test_unabsorbed_quick_add_survives_midnight() {
    let (tracker, store) = memory_tracker();
    let widget = memory_widget(&store);

    tracker
        .log_drink_at(local(9, 0), 500, BeverageKind::Water, EventOrigin::ManualEntry)
        .unwrap();
    widget
        .quick_add(local(22, 0), 900, BeverageKind::Water)
        .unwrap();

    // Main process does not tick again until the next morning
    let morning = widget
        .quick_add(local_on(15, 8, 0), 250, BeverageKind::Water)
        .unwrap();
    assert_eq!(morning.today_volume_ml, 250);

    match tracker.reconcile_at(local_on(15, 9, 0)).unwrap() {
        ReconcileOutcome::Corrected {
            event,
            flag_cleared,
        } => {
            assert_eq!(event.volume_ml, 250);
            assert!(flag_cleared);
        }
        other => panic!("expected a correction, got {:?}", other),
    }

    assert_eq!(tracker.today_total_at(local(23, 0)).unwrap(), 1400);
    assert_eq!(tracker.today_total_at(local_on(15, 10, 0)).unwrap(), 250);
    assert!(tracker.bridge().read_carried().unwrap().is_empty());
    assert_eq!(
        tracker.reconcile_at(local_on(15, 9, 30)).unwrap(),
        ReconcileOutcome::InSync
    );
    assert_eq!(tracker.database().count_events().unwrap(), 3);
}

// ============================================
// Two processes over the file store
// ============================================

#[test]
fn test_file_store_round_trip_between_processes() {
    let shared = TempDir::new().unwrap();
    let data = TempDir::new().unwrap();

    let db = Database::open(&data.path().join("data.db")).unwrap();
    db.migrate().unwrap();
    let tracker = Tracker::new(
        db,
        SyncBridge::new(
            FileSharedStore::open(shared.path()).unwrap(),
            FileRefreshTrigger::new(shared.path(), WIDGET_REFRESH_MARKER),
        ),
        GOAL_ML,
        tz(),
    );
    let widget = Widget::new(
        SyncBridge::new(
            FileSharedStore::open(shared.path()).unwrap(),
            FileRefreshTrigger::new(shared.path(), APP_REFRESH_MARKER),
        ),
        GridGeometry::new(10, 10),
        None,
        GOAL_ML,
        tz(),
    );
    let mut app_wakeups = RefreshWatcher::new(shared.path(), APP_REFRESH_MARKER);
    let mut widget_wakeups = RefreshWatcher::new(shared.path(), WIDGET_REFRESH_MARKER);

    tracker
        .log_drink_at(local(9, 0), 500, BeverageKind::Water, EventOrigin::ManualEntry)
        .unwrap();
    assert!(widget_wakeups.poll());

    let seen = widget.timeline_tick(local(9, 5), 0.0).unwrap();
    assert_eq!(seen.today_volume_ml, 500);
    assert_eq!(seen.grid.filled_count(), 25);

    let after_tap = widget
        .quick_add(local(9, 10), 300, BeverageKind::Water)
        .unwrap();
    assert_eq!(after_tap.today_volume_ml, 800);
    assert!(after_tap.pending_sync);
    assert!(app_wakeups.poll());

    // Widget never touches the event store
    assert_eq!(tracker.database().count_events().unwrap(), 1);

    assert!(matches!(
        tracker.reconcile_at(local(9, 15)).unwrap(),
        ReconcileOutcome::Corrected {
            flag_cleared: true,
            ..
        }
    ));
    assert_eq!(tracker.today_total_at(local(9, 16)).unwrap(), 800);

    let settled = widget.timeline_tick(local(9, 20), 0.0).unwrap();
    assert_eq!(settled.today_volume_ml, 800);
    assert!(!settled.pending_sync);
    assert_eq!(settled.left_ml, 1200);
    assert_eq!(settled.grid.filled_count(), 40);
}

#[test]
fn test_goal_rate_over_a_week_of_tracked_days() {
    let (tracker, _store) = memory_tracker();
    let day = |offset: i64, hour: u32| local(hour, 0) - chrono::Duration::days(offset);

    tracker
        .log_drink_at(day(0, 8), 2000, BeverageKind::Water, EventOrigin::ManualEntry)
        .unwrap();
    tracker
        .log_drink_at(day(2, 8), 1500, BeverageKind::Water, EventOrigin::ManualEntry)
        .unwrap();
    tracker
        .log_drink_at(day(2, 18), 600, BeverageKind::Coffee, EventOrigin::ManualEntry)
        .unwrap();
    tracker
        .log_drink_at(day(5, 12), 2400, BeverageKind::Water, EventOrigin::ManualEntry)
        .unwrap();

    let summary = tracker
        .summary_at(local(20, 0), hydrate_core::analytics::StatsPeriod::Week)
        .unwrap();
    assert_eq!(summary.goal_rate, 43);
    assert_eq!(summary.current_streak, 1);
    assert_eq!(summary.best_day_ml, Some(2400));
}
