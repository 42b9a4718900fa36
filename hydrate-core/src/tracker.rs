//! Main-process service: the single write lane over the event store.
//!
//! Every append, whether it comes from a user tap, a quick-add or a
//! reconciliation tick, goes through [`Tracker`]'s lane so writes are
//! serialized within the process. Reads copy a snapshot under the lane and
//! aggregate outside it.
//!
//! ```text
//! user action ──► log_drink ──┐
//!                             ├──► lane ──► Database ──► publish ──► shared store
//! watch tick ──► reconcile ───┘                                        ▲   │
//!                                                                      │   ▼
//!                                                         widget quick_add / tick
//! ```

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};

use crate::analytics::{daily_totals, ProgressSummary, StatsPeriod};
use crate::calendar::{daily_window, day_range, DayWindow};
use crate::db::Database;
use crate::error::Result;
use crate::grid::{FillStrategy, Grid, GridGeometry};
use crate::sync::{
    decide, ReconcileDecision, ReconcileOutcome, RefreshTrigger, SharedProgressState,
    SharedStore, SyncBridge, SyncPhase,
};
use crate::types::{BeverageKind, DrinkEvent, EventOrigin, TimeRange};

/// What the lane remembers about the shared store between ticks.
#[derive(Debug, Default)]
struct LaneState {
    /// Last state this process wrote
    published: Option<SharedProgressState>,
    /// Unflagged foreign state seen once and left alone
    unconfirmed: Option<SharedProgressState>,
}

/// Owns the event store and the main-process side of the sync bridge.
pub struct Tracker<S, R, Tz: TimeZone> {
    db: Database,
    bridge: SyncBridge<S, R>,
    lane: Mutex<LaneState>,
    goal_ml: i64,
    tz: Tz,
}

impl<S, R, Tz> Tracker<S, R, Tz>
where
    S: SharedStore,
    R: RefreshTrigger,
    Tz: TimeZone,
{
    /// Create a tracker. `db` must already be migrated.
    pub fn new(db: Database, bridge: SyncBridge<S, R>, goal_ml: i64, tz: Tz) -> Self {
        Self {
            db,
            bridge,
            lane: Mutex::new(LaneState::default()),
            goal_ml,
            tz,
        }
    }

    pub fn goal_ml(&self) -> i64 {
        self.goal_ml
    }

    pub fn bridge(&self) -> &SyncBridge<S, R> {
        &self.bridge
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    fn lock_lane(&self) -> MutexGuard<'_, LaneState> {
        self.lane.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn local(&self, now: DateTime<Utc>) -> DateTime<Tz> {
        now.with_timezone(&self.tz)
    }

    fn total_in(&self, range: &TimeRange) -> Result<i64> {
        Ok(self
            .db
            .query_events(range)?
            .iter()
            .map(|e| e.volume_ml)
            .sum())
    }

    // ============================================
    // Writes
    // ============================================

    /// Log a drink now.
    pub fn log_drink(
        &self,
        volume_ml: i64,
        kind: BeverageKind,
        origin: EventOrigin,
    ) -> Result<DrinkEvent> {
        self.log_drink_at(Utc::now(), volume_ml, kind, origin)
    }

    /// Log a drink at `now`.
    ///
    /// A pending widget change is absorbed first, so the publish that
    /// follows the append never overwrites a widget total the event store
    /// has not seen.
    pub fn log_drink_at(
        &self,
        now: DateTime<Utc>,
        volume_ml: i64,
        kind: BeverageKind,
        origin: EventOrigin,
    ) -> Result<DrinkEvent> {
        let event = DrinkEvent::new(now, volume_ml, kind, origin)?;

        let mut lane = self.lock_lane();
        self.reconcile_locked(&mut lane, now)?;
        self.db.append_event(&event)?;
        tracing::info!(
            volume_ml,
            kind = %kind,
            origin = %origin,
            "Logged drink"
        );

        if let Err(e) = self.publish_locked(&mut lane, now) {
            tracing::warn!(error = %e, "Publish after append failed; next tick will retry");
        }
        Ok(event)
    }

    /// Run one reconciliation tick now.
    pub fn reconcile(&self) -> Result<ReconcileOutcome> {
        self.reconcile_at(Utc::now())
    }

    /// Run one reconciliation tick at `now`.
    pub fn reconcile_at(&self, now: DateTime<Utc>) -> Result<ReconcileOutcome> {
        let mut lane = self.lock_lane();
        self.reconcile_locked(&mut lane, now)
    }

    fn reconcile_locked(
        &self,
        lane: &mut LaneState,
        now: DateTime<Utc>,
    ) -> Result<ReconcileOutcome> {
        let Some(observed) = self.bridge.observe() else {
            return Ok(ReconcileOutcome::Skipped);
        };
        let Some(shared) = observed else {
            // Nothing published yet; seed the store with our total
            return self.republish(lane, now);
        };

        self.bridge.set_phase(SyncPhase::Reconciling);
        let outcome = self
            .absorb_carried(now)
            .and_then(|()| self.apply(lane, now, &shared));
        self.bridge.set_phase(SyncPhase::Idle);
        outcome
    }

    /// Absorb widget totals the widget carried past their day's end.
    fn absorb_carried(&self, now: DateTime<Utc>) -> Result<()> {
        let carried = match self.bridge.read_carried() {
            Ok(carried) => carried,
            Err(e) => {
                tracing::warn!(error = %e, "Carried widget totals unreadable; retrying next tick");
                return Ok(());
            }
        };
        if carried.is_empty() {
            return Ok(());
        }

        for (&day, &shared_ml) in &carried {
            let range = day_range(day, &self.tz);
            let local_ml = self.total_in(&range)?;
            let delta_ml = shared_ml - local_ml;
            if delta_ml <= 0 {
                continue;
            }
            let event = DrinkEvent::sync_correction(Self::within(now, &range), delta_ml)?;
            self.db.append_event(&event)?;
            tracing::info!(
                delta_ml,
                shared_ml,
                local_ml,
                %day,
                "Absorbed carried widget quick-add"
            );
        }

        let days: Vec<NaiveDate> = carried.keys().copied().collect();
        if let Err(e) = self.bridge.drop_carried(&days) {
            tracing::warn!(error = %e, "Failed to drop carried totals; they will be re-checked");
        }
        Ok(())
    }

    /// `now`, or the last instant of `range` if `now` is past it.
    fn within(now: DateTime<Utc>, range: &TimeRange) -> DateTime<Utc> {
        now.min(range.end - Duration::milliseconds(1))
    }

    fn apply(
        &self,
        lane: &mut LaneState,
        now: DateTime<Utc>,
        shared: &SharedProgressState,
    ) -> Result<ReconcileOutcome> {
        let today = self.local(now).date_naive();
        let day = shared.day_or(today);
        let stale = day < today;
        let range = day_range(day, &self.tz);
        let local_total = self.total_in(&range)?;

        match decide(shared, local_total) {
            ReconcileDecision::InSync if stale => self.replace_unflagged(lane, now, shared),
            ReconcileDecision::InSync => {
                lane.unconfirmed = None;
                Ok(ReconcileOutcome::InSync)
            }
            ReconcileDecision::AbsorbWidgetDelta { delta_ml } => {
                // Keep the correction inside the day the widget counted
                let event = DrinkEvent::sync_correction(Self::within(now, &range), delta_ml)?;
                self.db.append_event(&event)?;
                tracing::info!(
                    delta_ml,
                    shared_ml = shared.today_volume_ml,
                    local_ml = local_total,
                    %day,
                    "Absorbed widget quick-add"
                );

                let flag_cleared = if stale {
                    matches!(
                        self.republish(lane, now)?,
                        ReconcileOutcome::Republished { .. }
                    )
                } else {
                    self.clear_flag(lane, shared)
                };
                Ok(ReconcileOutcome::Corrected {
                    event,
                    flag_cleared,
                })
            }
            ReconcileDecision::WidgetBehindLocal { delta_ml } => {
                tracing::warn!(
                    delta_ml,
                    shared_ml = shared.today_volume_ml,
                    local_ml = local_total,
                    "Widget total below event store; republishing local total"
                );
                self.republish(lane, now)
            }
            ReconcileDecision::RepublishLocal => self.replace_unflagged(lane, now, shared),
        }
    }

    /// Overwrite an unflagged shared state with the local total once it is
    /// known to be complete: this process wrote it, or the previous tick saw
    /// it unchanged. Otherwise it may be a widget publish whose flag has not
    /// landed yet.
    fn replace_unflagged(
        &self,
        lane: &mut LaneState,
        now: DateTime<Utc>,
        shared: &SharedProgressState,
    ) -> Result<ReconcileOutcome> {
        let settled =
            lane.published.as_ref() == Some(shared) || lane.unconfirmed.as_ref() == Some(shared);
        if !settled {
            tracing::debug!(
                shared_ml = shared.today_volume_ml,
                "Unflagged shared change; waiting a tick before overwriting"
            );
            lane.unconfirmed = Some(*shared);
            return Ok(ReconcileOutcome::Deferred);
        }
        self.republish(lane, now)
    }

    fn clear_flag(&self, lane: &mut LaneState, shared: &SharedProgressState) -> bool {
        match self.bridge.clear_widget_flag() {
            Ok(()) => {
                lane.published = Some(SharedProgressState {
                    originated_from_widget: false,
                    ..*shared
                });
                lane.unconfirmed = None;
                true
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Failed to clear widget flag; the next tick may reconcile again"
                );
                false
            }
        }
    }

    /// Publish today's total, turning a shared-store failure into a skipped
    /// tick.
    fn republish(&self, lane: &mut LaneState, now: DateTime<Utc>) -> Result<ReconcileOutcome> {
        let state = self.today_state(now)?;
        match self.publish_state(lane, state) {
            Ok(()) => Ok(ReconcileOutcome::Republished {
                today_volume_ml: state.today_volume_ml,
            }),
            Err(e) => {
                tracing::warn!(error = %e, "Shared store unavailable, skipping tick");
                Ok(ReconcileOutcome::Skipped)
            }
        }
    }

    /// Publish today's total now. Returns the published volume.
    pub fn publish(&self) -> Result<i64> {
        let mut lane = self.lock_lane();
        self.publish_locked(&mut lane, Utc::now())
    }

    fn publish_locked(&self, lane: &mut LaneState, now: DateTime<Utc>) -> Result<i64> {
        let state = self.today_state(now)?;
        self.publish_state(lane, state)?;
        Ok(state.today_volume_ml)
    }

    fn publish_state(&self, lane: &mut LaneState, state: SharedProgressState) -> Result<()> {
        self.bridge.publish(&state)?;
        lane.published = Some(state);
        lane.unconfirmed = None;
        Ok(())
    }

    fn today_state(&self, now: DateTime<Utc>) -> Result<SharedProgressState> {
        let local = self.local(now);
        Ok(SharedProgressState {
            today_volume_ml: self.total_in(&daily_window(&local))?,
            daily_goal_ml: self.goal_ml,
            originated_from_widget: false,
            progress_day: Some(local.date_naive()),
        })
    }

    /// Delete every event and publish the empty day. Returns the number of
    /// deleted events.
    pub fn reset(&self) -> Result<usize> {
        let mut lane = self.lock_lane();
        let deleted = self.db.delete_all_events()?;
        tracing::info!(deleted, "Deleted all drink events");
        if let Err(e) = self.publish_locked(&mut lane, Utc::now()) {
            tracing::warn!(error = %e, "Publish after reset failed");
        }
        Ok(deleted)
    }

    // ============================================
    // Snapshots
    // ============================================

    /// Copy of the full history.
    pub fn snapshot(&self) -> Result<Vec<DrinkEvent>> {
        let _lane = self.lock_lane();
        self.db.all_events()
    }

    /// Copy of the events in the DailyWindow containing `now`.
    pub fn today_events_at(&self, now: DateTime<Utc>) -> Result<Vec<DrinkEvent>> {
        let _lane = self.lock_lane();
        self.db.query_events(&daily_window(&self.local(now)))
    }

    pub fn today_total_at(&self, now: DateTime<Utc>) -> Result<i64> {
        Ok(self
            .today_events_at(now)?
            .iter()
            .map(|e| e.volume_ml)
            .sum())
    }

    pub fn summary_at(&self, now: DateTime<Utc>, period: StatsPeriod) -> Result<ProgressSummary> {
        let events = self.snapshot()?;
        Ok(ProgressSummary::compute(
            &events,
            &self.local(now),
            self.goal_ml,
            period,
        ))
    }

    /// Per-day totals for the `days` days ending on `now`'s day.
    pub fn history_at(&self, now: DateTime<Utc>, days: u32) -> Result<Vec<(NaiveDate, i64)>> {
        let window = DayWindow::ending_on(self.local(now).date_naive(), days);
        let range = window.time_range(&self.tz);
        let events = {
            let _lane = self.lock_lane();
            self.db.query_events(&range)?
        };
        Ok(daily_totals(&events, &window, &self.tz))
    }

    /// Today's grid, replayed from the day's events.
    pub fn grid_at(
        &self,
        now: DateTime<Utc>,
        geometry: GridGeometry,
        strategy: FillStrategy,
    ) -> Result<Grid> {
        let events = self.today_events_at(now)?;
        Ok(Grid::replay(geometry, &events, self.goal_ml, strategy))
    }
}
