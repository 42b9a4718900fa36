//! Widget-process service
//!
//! The widget has no event store. It renders whatever the shared store holds
//! and, on quick-add, bumps the shared total with the widget flag set so the
//! main process absorbs the change on its next tick. Nothing here ever
//! creates a [`DrinkEvent`](crate::types::DrinkEvent).

use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use crate::analytics::{goal_percentage, left_goal};
use crate::error::{Error, Result};
use crate::grid::{Grid, GridGeometry, WaveParams};
use crate::sync::{RefreshTrigger, SharedProgressState, SharedStore, SyncBridge};
use crate::types::BeverageKind;

/// What one widget render shows.
#[derive(Debug, Clone, PartialEq)]
pub struct WidgetSnapshot {
    pub day: NaiveDate,
    pub today_volume_ml: i64,
    pub daily_goal_ml: i64,
    pub left_ml: i64,
    pub percentage: f64,
    /// A quick-add the main process has not absorbed yet
    pub pending_sync: bool,
    pub grid: Grid,
}

pub struct Widget<S, R, Tz> {
    bridge: SyncBridge<S, R>,
    geometry: GridGeometry,
    wave: Option<WaveParams>,
    fallback_goal_ml: i64,
    tz: Tz,
}

impl<S, R, Tz> Widget<S, R, Tz>
where
    S: SharedStore,
    R: RefreshTrigger,
    Tz: TimeZone,
{
    /// `fallback_goal_ml` is shown until the main process publishes a goal.
    pub fn new(
        bridge: SyncBridge<S, R>,
        geometry: GridGeometry,
        wave: Option<WaveParams>,
        fallback_goal_ml: i64,
        tz: Tz,
    ) -> Self {
        Self {
            bridge,
            geometry,
            wave,
            fallback_goal_ml,
            tz,
        }
    }

    pub fn bridge(&self) -> &SyncBridge<S, R> {
        &self.bridge
    }

    fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.tz).date_naive()
    }

    /// Volume and goal to show for `today`. A total published for an
    /// earlier day counts as zero.
    fn effective(&self, state: Option<&SharedProgressState>, today: NaiveDate) -> (i64, i64, bool) {
        match state {
            Some(s) if s.is_stale(today) => (0, s.daily_goal_ml, false),
            Some(s) => (s.today_volume_ml, s.daily_goal_ml, s.originated_from_widget),
            None => (0, self.fallback_goal_ml, false),
        }
    }

    fn render(
        &self,
        today: NaiveDate,
        volume_ml: i64,
        goal_ml: i64,
        pending_sync: bool,
        phase: f64,
    ) -> WidgetSnapshot {
        let percentage = goal_percentage(volume_ml, goal_ml);
        let wave = self.wave.as_ref().map(|w| (w, phase));
        WidgetSnapshot {
            day: today,
            today_volume_ml: volume_ml,
            daily_goal_ml: goal_ml,
            left_ml: left_goal(volume_ml, goal_ml),
            percentage,
            pending_sync,
            grid: Grid::from_percentage(self.geometry, percentage, wave, BeverageKind::Water),
        }
    }

    /// One timeline tick. `None` when the shared store is unreadable; the
    /// previous render stays on screen.
    pub fn timeline_tick(&self, now: DateTime<Utc>, phase: f64) -> Option<WidgetSnapshot> {
        let state = self.bridge.observe()?;
        let today = self.today(now);
        let (volume, goal, pending) = self.effective(state.as_ref(), today);
        Some(self.render(today, volume, goal, pending, phase))
    }

    /// Add `volume_ml` to the shared total and flag it for the main process.
    ///
    /// If the shared total is a flagged one from an earlier day, it is
    /// carried over for the main process before today's total starts from
    /// zero.
    pub fn quick_add(
        &self,
        now: DateTime<Utc>,
        volume_ml: i64,
        kind: BeverageKind,
    ) -> Result<WidgetSnapshot> {
        if volume_ml <= 0 {
            return Err(Error::InvalidEvent(format!(
                "volume must be positive, got {} ml",
                volume_ml
            )));
        }

        let today = self.today(now);
        let current = self.bridge.read_state()?;
        if let Some(prev) = current
            .as_ref()
            .filter(|s| s.originated_from_widget && s.is_stale(today))
        {
            self.bridge
                .carry_forward(prev.day_or(today), prev.today_volume_ml)?;
            // The old flag must not pair with the new day's total
            self.bridge.clear_widget_flag()?;
        }
        let (base, goal, _) = self.effective(current.as_ref(), today);

        let next = SharedProgressState {
            today_volume_ml: base + volume_ml,
            daily_goal_ml: goal,
            originated_from_widget: true,
            progress_day: Some(today),
        };
        self.bridge.publish(&next)?;
        tracing::info!(
            volume_ml,
            kind = %kind,
            today_volume_ml = next.today_volume_ml,
            "Widget quick-add published"
        );

        Ok(self.render(today, next.today_volume_ml, goal, true, 0.0))
    }
}
