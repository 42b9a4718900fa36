//! Grid fill allocation
//!
//! Progress is drawn as `rows * columns` discrete cells. Cells are indexed
//! row-major from the top-left (`index = row * columns + column`) and fill
//! from the bottom row upward, left to right within a row. The position of
//! a cell in that fill order is its *rank*.
//!
//! Two modes exist:
//! - **percentage mode** re-renders from scratch given a fill percentage,
//!   optionally with a sinusoidal wave perturbing the boundary;
//! - **incremental mode** fills a run of cells for one newly logged drink,
//!   tagged with its beverage kind.
//!
//! The grid is a derived view; totals always come from the event store.

use serde::Deserialize;

use crate::types::{BeverageKind, DrinkEvent};

/// Fixed-per-liter capacity used by [`FillStrategy::PerLiter`]
pub const PER_LITER_CAPACITY_ML: i64 = 1000;

/// Grid dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridGeometry {
    pub rows: usize,
    pub columns: usize,
}

impl GridGeometry {
    pub fn new(rows: usize, columns: usize) -> Self {
        Self { rows, columns }
    }

    /// Total number of cells, `N`
    pub fn cell_count(&self) -> usize {
        self.rows * self.columns
    }

    /// Position in fill order of the cell at `(row, column)`.
    pub fn rank(&self, row: usize, column: usize) -> usize {
        (self.rows - 1 - row) * self.columns + column
    }

    /// Inverse of [`rank`](Self::rank): the cell index filled at `rank`.
    pub fn index_at_rank(&self, rank: usize) -> usize {
        let row = self.rows - 1 - rank / self.columns;
        row * self.columns + rank % self.columns
    }

    fn row_col(&self, index: usize) -> (usize, usize) {
        (index / self.columns, index % self.columns)
    }
}

/// How many cells a newly logged volume fills.
///
/// The two legacy behaviors disagree unless the goal is exactly one liter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FillStrategy {
    /// `round(N * volume / goal)`: the full grid represents the daily goal
    #[default]
    GoalRelative,
    /// `round(N * volume / 1000)`: the full grid represents one liter
    PerLiter,
}

impl FillStrategy {
    /// Number of cells for `volume_ml`. Never negative; 0 when the goal is
    /// not positive under [`FillStrategy::GoalRelative`].
    pub fn cells_for(&self, volume_ml: i64, goal_ml: i64, cell_count: usize) -> usize {
        let capacity = match self {
            FillStrategy::GoalRelative => goal_ml,
            FillStrategy::PerLiter => PER_LITER_CAPACITY_ML,
        };
        if capacity <= 0 || volume_ml <= 0 {
            return 0;
        }
        (cell_count as f64 * volume_ml as f64 / capacity as f64).round() as usize
    }
}

/// Sine-wave perturbation of the fill boundary. Purely cosmetic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaveParams {
    /// Amplitude, in rows
    pub height: f64,
    /// Radians per column
    pub frequency: f64,
    /// Radians per unit of phase
    pub speed: f64,
}

/// Row at which the flat waterline sits for `percentage`.
pub fn baseline_row(rows: usize, percentage: f64) -> f64 {
    rows as f64 * (1.0 - percentage / 100.0)
}

/// Wave-adjusted boundary for one cell:
/// `baseline_row(p) + height * sin(frequency * column + phase * speed)`.
pub fn adjusted_boundary(
    geometry: &GridGeometry,
    percentage: f64,
    column: usize,
    wave: &WaveParams,
    phase: f64,
) -> f64 {
    baseline_row(geometry.rows, percentage)
        + wave.height * (wave.frequency * column as f64 + phase * wave.speed).sin()
}

/// Percentage-mode fill mask, indexed like the cells.
///
/// Without a wave a cell is filled iff `rank < N * p / 100`. With a wave a
/// cell is filled iff `row >= adjusted_boundary`. At 0% nothing is filled
/// and at 100% everything is, whatever the wave does.
pub fn percentage_mask(
    geometry: &GridGeometry,
    percentage: f64,
    wave: Option<(&WaveParams, f64)>,
) -> Vec<bool> {
    let n = geometry.cell_count();
    let p = if percentage.is_nan() {
        0.0
    } else {
        percentage.clamp(0.0, 100.0)
    };
    if p <= 0.0 {
        return vec![false; n];
    }
    if p >= 100.0 {
        return vec![true; n];
    }

    let threshold = n as f64 * p / 100.0;
    (0..n)
        .map(|index| {
            let (row, column) = geometry.row_col(index);
            match wave {
                Some((params, phase)) => {
                    row as f64 >= adjusted_boundary(geometry, p, column, params, phase)
                }
                None => (geometry.rank(row, column) as f64) < threshold,
            }
        })
        .collect()
}

/// One visual cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridCell {
    /// Row-major position, `0..N`
    pub index: usize,
    /// Beverage shown in this cell, `None` when empty
    pub fill: Option<BeverageKind>,
}

impl GridCell {
    pub fn is_filled(&self) -> bool {
        self.fill.is_some()
    }
}

/// Cached grid state for render continuity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    geometry: GridGeometry,
    cells: Vec<GridCell>,
}

impl Grid {
    /// An empty grid
    pub fn new(geometry: GridGeometry) -> Self {
        let cells = (0..geometry.cell_count())
            .map(|index| GridCell { index, fill: None })
            .collect();
        Self { geometry, cells }
    }

    /// Percentage-mode render, every filled cell tagged with `kind`.
    pub fn from_percentage(
        geometry: GridGeometry,
        percentage: f64,
        wave: Option<(&WaveParams, f64)>,
        kind: BeverageKind,
    ) -> Self {
        let mut grid = Self::new(geometry);
        for (cell, filled) in grid
            .cells
            .iter_mut()
            .zip(percentage_mask(&geometry, percentage, wave))
        {
            if filled {
                cell.fill = Some(kind);
            }
        }
        grid
    }

    /// Rebuild the grid by replaying events in timestamp order.
    pub fn replay(
        geometry: GridGeometry,
        events: &[DrinkEvent],
        goal_ml: i64,
        strategy: FillStrategy,
    ) -> Self {
        let mut ordered: Vec<&DrinkEvent> = events.iter().collect();
        ordered.sort_by_key(|e| e.timestamp);

        let mut grid = Self::new(geometry);
        for event in ordered {
            grid.fill_volume(event.volume_ml, goal_ml, strategy, event.beverage_kind);
        }
        grid
    }

    pub fn geometry(&self) -> GridGeometry {
        self.geometry
    }

    pub fn cells(&self) -> &[GridCell] {
        &self.cells
    }

    pub fn filled_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_filled()).count()
    }

    pub fn is_full(&self) -> bool {
        self.filled_count() == self.cells.len()
    }

    /// Share of filled cells, `0.0..=100.0`
    pub fn percentage_filled(&self) -> f64 {
        if self.cells.is_empty() {
            return 0.0;
        }
        100.0 * self.filled_count() as f64 / self.cells.len() as f64
    }

    /// Rank of the first unfilled cell in fill order, if any.
    fn first_unfilled_rank(&self) -> Option<usize> {
        (0..self.cells.len()).find(|&rank| {
            let index = self.geometry.index_at_rank(rank);
            !self.cells[index].is_filled()
        })
    }

    /// Incremental mode: fill up to `count` contiguous cells starting at the
    /// first unfilled one. Cells past the end are dropped; returns how many
    /// were actually filled.
    pub fn fill_next(&mut self, count: usize, kind: BeverageKind) -> usize {
        let Some(start) = self.first_unfilled_rank() else {
            return 0;
        };
        let end = start.saturating_add(count).min(self.cells.len());
        for rank in start..end {
            let index = self.geometry.index_at_rank(rank);
            self.cells[index].fill = Some(kind);
        }
        end - start
    }

    /// Incremental fill for one logged volume.
    pub fn fill_volume(
        &mut self,
        volume_ml: i64,
        goal_ml: i64,
        strategy: FillStrategy,
        kind: BeverageKind,
    ) -> usize {
        let count = strategy.cells_for(volume_ml, goal_ml, self.cells.len());
        self.fill_next(count, kind)
    }

    /// Text rendering: one line per row, `.` for empty cells, the beverage
    /// glyph for filled ones.
    pub fn render_text(&self) -> String {
        let mut out = String::with_capacity(self.cells.len() + self.geometry.rows);
        for row in self.cells.chunks(self.geometry.columns.max(1)) {
            out.extend(row.iter().map(|c| c.fill.map_or('.', |k| k.glyph())));
            out.push('\n');
        }
        out
    }
}
