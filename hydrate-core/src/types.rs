//! Core domain types for hydrate
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **DrinkEvent** | One logged drink; immutable once stored |
//! | **BeverageKind** | What was drunk (water, coffee, tea, soda) |
//! | **EventOrigin** | Which path created the event (manual, quick-add, widget, sync) |
//! | **Quick-add** | One-tap logging of a preset volume/beverage pair |
//! | **Reconciliation** | The main process absorbing a widget-originated change |
//!
//! Volumes are always stored in milliliters. [`VolumeUnit`] only affects display.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ============================================
// Beverage
// ============================================

/// Closed set of beverages the tracker knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BeverageKind {
    #[default]
    Water,
    Coffee,
    Tea,
    Soda,
}

impl BeverageKind {
    pub const ALL: [BeverageKind; 4] = [
        BeverageKind::Water,
        BeverageKind::Coffee,
        BeverageKind::Tea,
        BeverageKind::Soda,
    ];

    /// Returns the identifier used in database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            BeverageKind::Water => "water",
            BeverageKind::Coffee => "coffee",
            BeverageKind::Tea => "tea",
            BeverageKind::Soda => "soda",
        }
    }

    /// Returns the display name for this beverage
    pub fn display_name(&self) -> &'static str {
        match self {
            BeverageKind::Water => "Water",
            BeverageKind::Coffee => "Coffee",
            BeverageKind::Tea => "Tea",
            BeverageKind::Soda => "Soda",
        }
    }

    /// Single character used by the text grid renderer
    pub fn glyph(&self) -> char {
        match self {
            BeverageKind::Water => 'W',
            BeverageKind::Coffee => 'C',
            BeverageKind::Tea => 'T',
            BeverageKind::Soda => 'S',
        }
    }
}

impl std::fmt::Display for BeverageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for BeverageKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "water" => Ok(BeverageKind::Water),
            "coffee" => Ok(BeverageKind::Coffee),
            "tea" => Ok(BeverageKind::Tea),
            "soda" => Ok(BeverageKind::Soda),
            _ => Err(format!("unknown beverage kind: {}", s)),
        }
    }
}

// ============================================
// Origin
// ============================================

/// Which path created an event.
///
/// `SyncCorrection` events are written only by reconciliation and are what
/// keeps a widget-originated change from being applied twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventOrigin {
    ManualEntry,
    QuickAdd,
    WidgetQuickAdd,
    SyncCorrection,
}

impl EventOrigin {
    /// Returns the identifier used in database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            EventOrigin::ManualEntry => "manual_entry",
            EventOrigin::QuickAdd => "quick_add",
            EventOrigin::WidgetQuickAdd => "widget_quick_add",
            EventOrigin::SyncCorrection => "sync_correction",
        }
    }
}

impl std::fmt::Display for EventOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for EventOrigin {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "manual_entry" => Ok(EventOrigin::ManualEntry),
            "quick_add" => Ok(EventOrigin::QuickAdd),
            "widget_quick_add" => Ok(EventOrigin::WidgetQuickAdd),
            "sync_correction" => Ok(EventOrigin::SyncCorrection),
            _ => Err(format!("unknown event origin: {}", s)),
        }
    }
}

// ============================================
// DrinkEvent
// ============================================

/// A single logged drink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrinkEvent {
    /// Unique identifier, assigned at creation
    pub id: String,
    /// When the drink was logged
    pub timestamp: DateTime<Utc>,
    /// Amount in milliliters, always positive
    pub volume_ml: i64,
    /// What was drunk
    pub beverage_kind: BeverageKind,
    /// Which path created the event
    pub origin: EventOrigin,
}

impl DrinkEvent {
    /// Create a new user event, rejecting non-positive volumes.
    pub fn new(
        timestamp: DateTime<Utc>,
        volume_ml: i64,
        beverage_kind: BeverageKind,
        origin: EventOrigin,
    ) -> Result<Self> {
        if volume_ml <= 0 {
            return Err(Error::InvalidEvent(format!(
                "volume must be positive, got {} ml",
                volume_ml
            )));
        }
        Ok(Self::with_fresh_id(timestamp, volume_ml, beverage_kind, origin))
    }

    /// Corrective event produced by reconciliation.
    ///
    /// Widget quick-adds arrive as unlabeled deltas, so corrections are
    /// always water.
    pub fn sync_correction(timestamp: DateTime<Utc>, delta_ml: i64) -> Result<Self> {
        Self::new(
            timestamp,
            delta_ml,
            BeverageKind::Water,
            EventOrigin::SyncCorrection,
        )
    }

    fn with_fresh_id(
        timestamp: DateTime<Utc>,
        volume_ml: i64,
        beverage_kind: BeverageKind,
        origin: EventOrigin,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp,
            volume_ml,
            beverage_kind,
            origin,
        }
    }

    /// Validate an event that is about to be persisted.
    pub fn validate(&self) -> Result<()> {
        if self.volume_ml > 0 {
            return Ok(());
        }
        Err(Error::InvalidEvent(format!(
            "{} event {} has volume {} ml",
            self.origin, self.id, self.volume_ml
        )))
    }
}

// ============================================
// Time ranges
// ============================================

/// Half-open instant range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts < self.end
    }
}

// ============================================
// Units
// ============================================

/// Display unit preference. Storage is always milliliters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VolumeUnit {
    #[default]
    Ml,
    Oz,
}

/// Milliliters per US fluid ounce
const ML_PER_OZ: f64 = 29.5735;

impl VolumeUnit {
    /// Format a milliliter amount in this unit (e.g., "1250 ml", "42.3 oz").
    pub fn format(&self, volume_ml: i64) -> String {
        match self {
            VolumeUnit::Ml => format!("{} ml", volume_ml),
            VolumeUnit::Oz => format!("{:.1} oz", volume_ml as f64 / ML_PER_OZ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_beverage_kind_round_trips_through_storage_name() {
        for kind in BeverageKind::ALL {
            assert_eq!(BeverageKind::from_str(kind.as_str()).unwrap(), kind);
        }
        assert!(BeverageKind::from_str("juice").is_err());
    }

    #[test]
    fn test_new_event_rejects_non_positive_volume() {
        let now = Utc::now();
        assert!(DrinkEvent::new(now, 0, BeverageKind::Water, EventOrigin::ManualEntry).is_err());
        assert!(DrinkEvent::new(now, -5, BeverageKind::Tea, EventOrigin::QuickAdd).is_err());

        let event = DrinkEvent::new(now, 250, BeverageKind::Tea, EventOrigin::QuickAdd).unwrap();
        assert_eq!(event.volume_ml, 250);
        assert!(!event.id.is_empty());
    }

    #[test]
    fn test_sync_correction_is_positive_water() {
        let event = DrinkEvent::sync_correction(Utc::now(), 300).unwrap();
        assert_eq!(event.origin, EventOrigin::SyncCorrection);
        assert_eq!(event.beverage_kind, BeverageKind::Water);
        assert!(event.validate().is_ok());
        assert!(DrinkEvent::sync_correction(Utc::now(), 0).is_err());
        assert!(DrinkEvent::sync_correction(Utc::now(), -200).is_err());
    }

    #[test]
    fn test_time_range_is_half_open() {
        let start = Utc::now();
        let end = start + chrono::Duration::hours(1);
        let range = TimeRange::new(start, end);
        assert!(range.contains(start));
        assert!(!range.contains(end));
    }

    #[test]
    fn test_volume_unit_format() {
        assert_eq!(VolumeUnit::Ml.format(1250), "1250 ml");
        assert_eq!(VolumeUnit::Oz.format(1000), "33.8 oz");
    }
}
