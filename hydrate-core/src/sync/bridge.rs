//! Typed publish/observe protocol over the shared store.
//!
//! Both processes exchange exactly one message, [`SharedProgressState`].
//! The `originated_from_widget` flag is the only coordination primitive:
//! the widget sets it when it publishes a quick-add, and the main process
//! clears it after absorbing the change into the event store.
//!
//! Reconciliation is at-least-once. It stays idempotent because the main
//! process appends `shared - local` rather than the widget's volume: once
//! the correction is stored, a second observation of the same shared value
//! sees a zero difference.
//!
//! A widget total still flagged when its day ends is moved into
//! [`KEY_CARRIED_DAYS`] before the widget starts the new day, so the main
//! process can absorb it into the day it belongs to.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use chrono::NaiveDate;
use serde_json::{json, Value};

use crate::config::DEFAULT_DAILY_GOAL_ML;
use crate::error::{Error, Result};
use crate::types::DrinkEvent;

use super::refresh::RefreshTrigger;
use super::store::SharedStore;

/// Today's total in milliliters (integer)
pub const KEY_TODAY_AMOUNT: &str = "todayWaterAmount";
/// Daily goal in milliliters (integer)
pub const KEY_DAILY_GOAL: &str = "dailyGoal";
/// Set by the widget on quick-add, cleared by the main process (boolean)
pub const KEY_WIDGET_UPDATE: &str = "isWidgetUpdate";
/// Local calendar date the total refers to (`YYYY-MM-DD`, optional)
pub const KEY_PROGRESS_DAY: &str = "progressDay";
/// Widget totals of earlier days not yet absorbed (`{"YYYY-MM-DD": ml}`)
pub const KEY_CARRIED_DAYS: &str = "carriedWidgetDays";

const DAY_FORMAT: &str = "%Y-%m-%d";

/// The one message exchanged between the two processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SharedProgressState {
    pub today_volume_ml: i64,
    pub daily_goal_ml: i64,
    pub originated_from_widget: bool,
    /// Day the total belongs to; `None` when the writer did not say
    pub progress_day: Option<NaiveDate>,
}

impl SharedProgressState {
    /// Day this state describes, assuming `today` when unspecified. A day
    /// in the future (clock skew) is treated as `today`.
    pub fn day_or(&self, today: NaiveDate) -> NaiveDate {
        match self.progress_day {
            Some(day) if day <= today => day,
            _ => today,
        }
    }

    /// True when the state was published for an earlier day.
    pub fn is_stale(&self, today: NaiveDate) -> bool {
        self.day_or(today) < today
    }
}

/// Per-process protocol phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncPhase {
    #[default]
    Idle,
    Publishing,
    Reconciling,
}

/// What the main process should do with an observed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileDecision {
    /// Shared and local totals agree
    InSync,
    /// Widget added volume the event store has not seen yet
    AbsorbWidgetDelta { delta_ml: i64 },
    /// Widget-flagged total is below the local one; the widget worked from
    /// a stale base. Never removes volume: republish the local total.
    WidgetBehindLocal { delta_ml: i64 },
    /// Totals differ without the widget flag; the main process is
    /// authoritative and republishes
    RepublishLocal,
}

/// Decide how the main process reconciles `shared` against the total its
/// own event store holds for the same day.
pub fn decide(shared: &SharedProgressState, local_total_ml: i64) -> ReconcileDecision {
    let delta_ml = shared.today_volume_ml - local_total_ml;
    match (delta_ml, shared.originated_from_widget) {
        (0, _) => ReconcileDecision::InSync,
        (d, true) if d > 0 => ReconcileDecision::AbsorbWidgetDelta { delta_ml: d },
        (d, true) => ReconcileDecision::WidgetBehindLocal { delta_ml: d },
        (_, false) => ReconcileDecision::RepublishLocal,
    }
}

/// Result of one reconciliation tick in the main process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Shared store unreadable; retried on the next natural tick
    Skipped,
    /// Nothing to do
    InSync,
    /// An unflagged shared total this process did not write was seen for
    /// the first time. It may be half of a widget publish, so it is only
    /// overwritten if the next tick sees it unchanged.
    Deferred,
    /// One corrective event was appended.
    ///
    /// `flag_cleared == false` is the degraded mode: the flag write failed
    /// and the next observation may reconcile again.
    Corrected {
        event: DrinkEvent,
        flag_cleared: bool,
    },
    /// The local total was written to the shared store
    Republished { today_volume_ml: i64 },
}

/// Publish/observe interface over a [`SharedStore`].
pub struct SyncBridge<S, R> {
    store: S,
    refresh: R,
    phase: Mutex<SyncPhase>,
}

impl<S: SharedStore, R: RefreshTrigger> SyncBridge<S, R> {
    pub fn new(store: S, refresh: R) -> Self {
        Self {
            store,
            refresh,
            phase: Mutex::new(SyncPhase::Idle),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn phase(&self) -> SyncPhase {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set_phase(&self, next: SyncPhase) {
        let mut phase = self.phase.lock().unwrap_or_else(PoisonError::into_inner);
        if *phase != next {
            tracing::trace!(from = ?*phase, to = ?next, "Sync phase transition");
            *phase = next;
        }
    }

    /// Read the shared state. `Ok(None)` when nothing was ever published.
    pub fn read_state(&self) -> Result<Option<SharedProgressState>> {
        let Some(amount) = self.store.get(KEY_TODAY_AMOUNT)? else {
            return Ok(None);
        };
        let today_volume_ml = as_i64(KEY_TODAY_AMOUNT, &amount)?;
        let daily_goal_ml = match self.store.get(KEY_DAILY_GOAL)? {
            Some(v) => as_i64(KEY_DAILY_GOAL, &v)?,
            None => DEFAULT_DAILY_GOAL_ML,
        };
        let originated_from_widget = match self.store.get(KEY_WIDGET_UPDATE)? {
            Some(v) => v.as_bool().ok_or_else(|| bad_value(KEY_WIDGET_UPDATE, &v))?,
            None => false,
        };
        let progress_day = match self.store.get(KEY_PROGRESS_DAY)? {
            Some(v) => Some(
                v.as_str()
                    .and_then(parse_day)
                    .ok_or_else(|| bad_value(KEY_PROGRESS_DAY, &v))?,
            ),
            None => None,
        };

        Ok(Some(SharedProgressState {
            today_volume_ml,
            daily_goal_ml,
            originated_from_widget,
            progress_day,
        }))
    }

    /// Widget totals carried over from earlier days, keyed by day.
    pub fn read_carried(&self) -> Result<BTreeMap<NaiveDate, i64>> {
        let Some(value) = self.store.get(KEY_CARRIED_DAYS)? else {
            return Ok(BTreeMap::new());
        };
        let entries = value
            .as_object()
            .ok_or_else(|| bad_value(KEY_CARRIED_DAYS, &value))?;
        entries
            .iter()
            .map(|(day, ml)| -> Result<(NaiveDate, i64)> {
                let day = parse_day(day).ok_or_else(|| bad_value(KEY_CARRIED_DAYS, &value))?;
                Ok((day, as_i64(KEY_CARRIED_DAYS, ml)?))
            })
            .collect()
    }

    /// Record `total_ml` as the unabsorbed widget total of `day`.
    pub fn carry_forward(&self, day: NaiveDate, total_ml: i64) -> Result<()> {
        let mut carried = self.read_carried()?;
        carried.insert(day, total_ml);
        self.write_carried(&carried)?;
        tracing::info!(%day, total_ml, "Carried unabsorbed widget total past day end");
        Ok(())
    }

    /// Forget carried totals for `days` once they are absorbed.
    pub fn drop_carried(&self, days: &[NaiveDate]) -> Result<()> {
        let mut carried = self.read_carried()?;
        let before = carried.len();
        carried.retain(|day, _| !days.contains(day));
        if carried.len() == before {
            return Ok(());
        }
        self.write_carried(&carried)
    }

    fn write_carried(&self, carried: &BTreeMap<NaiveDate, i64>) -> Result<()> {
        let entries: serde_json::Map<String, Value> = carried
            .iter()
            .map(|(day, ml)| (day.format(DAY_FORMAT).to_string(), json!(ml)))
            .collect();
        self.store.set(KEY_CARRIED_DAYS, Value::Object(entries))
    }

    /// Non-blocking poll. An unreadable store yields `None` and the caller
    /// skips this tick.
    pub fn observe(&self) -> Option<Option<SharedProgressState>> {
        match self.read_state() {
            Ok(state) => Some(state),
            Err(e) => {
                tracing::warn!(error = %e, "Shared store unavailable, skipping tick");
                None
            }
        }
    }

    /// Write `state` and ask the counterpart to refresh.
    ///
    /// Keys are written one at a time, flag last, so a reader that sees the
    /// flag set also sees the total it refers to. A reader can still see the
    /// new total next to the old flag; the main process waits for such an
    /// unflagged change to settle before overwriting it.
    pub fn publish(&self, state: &SharedProgressState) -> Result<()> {
        self.set_phase(SyncPhase::Publishing);
        let result = self.write_state(state);
        self.set_phase(SyncPhase::Idle);
        result?;

        tracing::debug!(
            today_volume_ml = state.today_volume_ml,
            daily_goal_ml = state.daily_goal_ml,
            originated_from_widget = state.originated_from_widget,
            "Published shared progress"
        );

        if let Err(e) = self.refresh.request_refresh() {
            tracing::warn!(error = %e, "Counterpart refresh request failed; it will poll");
        }
        Ok(())
    }

    fn write_state(&self, state: &SharedProgressState) -> Result<()> {
        if let Some(day) = state.progress_day {
            self.store
                .set(KEY_PROGRESS_DAY, json!(day.format(DAY_FORMAT).to_string()))?;
        }
        self.store
            .set(KEY_TODAY_AMOUNT, json!(state.today_volume_ml))?;
        self.store.set(KEY_DAILY_GOAL, json!(state.daily_goal_ml))?;
        self.store
            .set(KEY_WIDGET_UPDATE, json!(state.originated_from_widget))
    }

    /// Clear the widget flag after reconciling.
    pub fn clear_widget_flag(&self) -> Result<()> {
        self.store.set(KEY_WIDGET_UPDATE, json!(false))
    }
}

fn parse_day(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, DAY_FORMAT).ok()
}

fn as_i64(key: &str, value: &Value) -> Result<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f.round() as i64))
        .ok_or_else(|| bad_value(key, value))
}

fn bad_value(key: &str, value: &Value) -> Error {
    Error::SharedStore(format!("unexpected value for {}: {}", key, value))
}
