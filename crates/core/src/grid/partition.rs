//! Row-band partition of the global grid, with a one-row halo margin
//!
//! Each worker exclusively owns one contiguous band of rows. The band is
//! stored twice: the interior (`rows x cols`) that the worker mutates, and a
//! halo buffer (`(rows + 2) x cols`) whose middle rows always mirror the
//! interior and whose edge rows hold the most recently received boundary
//! rows of the up/down neighbors. At the global domain edge the halo row
//! stays all-`Fuel` forever, which acts as a closed no-fire-entry boundary.
//!
//! The column count is fixed for the simulation's lifetime; the row count
//! changes only through row migration, and every such change rebuilds the
//! halo buffer from scratch.

use crate::core_types::CellState;
use rayon::prelude::*;

/// Which halo edge row to write after an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaloEdge {
    /// Halo row 0, mirroring the up-neighbor's bottom row.
    Top,
    /// Halo row `rows + 1`, mirroring the down-neighbor's top row.
    Bottom,
}

/// The local row band plus halo margin owned by one worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    rows: usize,
    cols: usize,
    cells: Vec<CellState>,
    halo: Vec<CellState>,
}

impl Partition {
    /// Create an all-`Fuel` partition of the given shape.
    #[must_use]
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            cells: vec![CellState::Fuel; rows * cols],
            halo: vec![CellState::Fuel; (rows + 2) * cols],
        }
    }

    /// Build a partition from explicit interior cells (row-major).
    ///
    /// # Panics
    ///
    /// Panics if `cells.len() != rows * cols`.
    #[must_use]
    pub fn from_cells(rows: usize, cols: usize, cells: Vec<CellState>) -> Self {
        assert_eq!(cells.len(), rows * cols, "interior shape mismatch");
        let mut partition = Self {
            rows,
            cols,
            cells,
            halo: vec![CellState::Fuel; (rows + 2) * cols],
        };
        partition.mirror_interior();
        partition
    }

    /// Current row count (mutable over the run via migration).
    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Column count (fixed for the run).
    #[must_use]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Interior cell state at local coordinates.
    ///
    /// # Panics
    ///
    /// Panics if the coordinates are out of bounds.
    #[must_use]
    pub fn get(&self, r: usize, c: usize) -> CellState {
        assert!(r < self.rows && c < self.cols, "cell out of bounds");
        self.cells[r * self.cols + c]
    }

    /// Cell state in halo coordinates, where row 0 and row `rows + 1` are
    /// the ghost rows and rows `1..=rows` mirror the interior.
    ///
    /// Ghost rows are only meaningful after a completed halo exchange for
    /// the current step (or at the global domain edge, where they stay
    /// `Fuel`).
    #[must_use]
    pub fn halo_at(&self, halo_r: usize, c: usize) -> CellState {
        self.halo[halo_r * self.cols + c]
    }

    /// Ignite one cell. Out-of-bounds coordinates are a silent no-op.
    ///
    /// Writes both the interior and the mirrored halo row so a subsequent
    /// stencil step sees the fire without an intervening commit.
    pub fn set_fire(&mut self, r: usize, c: usize) {
        if r < self.rows && c < self.cols {
            self.cells[r * self.cols + c] = CellState::Burning;
            self.halo[(r + 1) * self.cols + c] = CellState::Burning;
        }
    }

    /// Replace the interior with the next step's state and refresh the halo
    /// interior mirror. Halo edge rows are left untouched (stale) until the
    /// next exchange.
    ///
    /// # Panics
    ///
    /// Panics if `next.len() != rows * cols`.
    pub fn commit(&mut self, next: Vec<CellState>) {
        assert_eq!(next.len(), self.rows * self.cols, "commit shape mismatch");
        self.cells = next;
        self.mirror_interior();
    }

    /// Write one received ghost row into the halo buffer.
    ///
    /// # Panics
    ///
    /// Panics if `row.len() != cols`.
    pub fn set_halo_edge(&mut self, edge: HaloEdge, row: &[CellState]) {
        assert_eq!(row.len(), self.cols, "ghost row width mismatch");
        let halo_r = match edge {
            HaloEdge::Top => 0,
            HaloEdge::Bottom => self.rows + 1,
        };
        self.halo[halo_r * self.cols..(halo_r + 1) * self.cols].copy_from_slice(row);
    }

    /// Copy of the topmost interior row, for sending to the up-neighbor.
    #[must_use]
    pub fn top_row(&self) -> Vec<CellState> {
        self.cells[..self.cols].to_vec()
    }

    /// Copy of the bottom interior row, for sending to the down-neighbor.
    #[must_use]
    pub fn bottom_row(&self) -> Vec<CellState> {
        self.cells[(self.rows - 1) * self.cols..].to_vec()
    }

    /// Remove and return the top row, shrinking the partition by one row.
    ///
    /// Rebuilds the halo buffer from scratch; all ghost rows reset to
    /// `Fuel` and must be re-populated by the next exchange.
    ///
    /// # Panics
    ///
    /// Panics if the partition is down to a single row.
    pub fn take_top_row(&mut self) -> Vec<CellState> {
        assert!(self.rows > 1, "cannot empty a partition");
        let row: Vec<CellState> = self.cells.drain(..self.cols).collect();
        self.rows -= 1;
        self.rebuild_halo();
        row
    }

    /// Remove and return the bottom row, shrinking the partition by one row.
    ///
    /// # Panics
    ///
    /// Panics if the partition is down to a single row.
    pub fn take_bottom_row(&mut self) -> Vec<CellState> {
        assert!(self.rows > 1, "cannot empty a partition");
        let row = self.cells.split_off((self.rows - 1) * self.cols);
        self.rows -= 1;
        self.rebuild_halo();
        row
    }

    /// Append a migrated row above the current top row.
    ///
    /// # Panics
    ///
    /// Panics if `row.len() != cols`.
    pub fn push_top_row(&mut self, row: Vec<CellState>) {
        assert_eq!(row.len(), self.cols, "migrated row width mismatch");
        let mut cells = row;
        cells.extend_from_slice(&self.cells);
        self.cells = cells;
        self.rows += 1;
        self.rebuild_halo();
    }

    /// Append a migrated row below the current bottom row.
    ///
    /// # Panics
    ///
    /// Panics if `row.len() != cols`.
    pub fn push_bottom_row(&mut self, row: Vec<CellState>) {
        assert_eq!(row.len(), self.cols, "migrated row width mismatch");
        self.cells.extend_from_slice(&row);
        self.rows += 1;
        self.rebuild_halo();
    }

    /// Count of burning cells, the per-partition load metric.
    ///
    /// Always a fresh scan, never cached; the balancer must see the state
    /// at its synchronized measurement point.
    #[must_use]
    pub fn burning_count(&self) -> u64 {
        self.cells.par_iter().filter(|cell| cell.is_burning()).count() as u64
    }

    /// Interior encoded as snapshot codes (row-major), for gathers.
    #[must_use]
    pub fn interior_codes(&self) -> Vec<u8> {
        self.cells.iter().map(|cell| cell.code()).collect()
    }

    /// Reallocate the halo buffer for the current row count and mirror the
    /// interior into it. Ghost rows come back as `Fuel`.
    fn rebuild_halo(&mut self) {
        self.halo = vec![CellState::Fuel; (self.rows + 2) * self.cols];
        self.mirror_interior();
    }

    fn mirror_interior(&mut self) {
        self.halo[self.cols..(self.rows + 1) * self.cols].copy_from_slice(&self.cells);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn halo_interior(partition: &Partition) -> Vec<CellState> {
        let cols = partition.cols();
        (0..partition.rows())
            .flat_map(|r| (0..cols).map(move |c| partition.halo_at(r + 1, c)))
            .collect()
    }

    fn interior(partition: &Partition) -> Vec<CellState> {
        let cols = partition.cols();
        (0..partition.rows())
            .flat_map(|r| (0..cols).map(move |c| partition.get(r, c)))
            .collect()
    }

    #[test]
    fn new_partition_is_all_fuel() {
        let partition = Partition::new(4, 3);
        assert!(interior(&partition)
            .iter()
            .all(|&cell| cell == CellState::Fuel));
        assert_eq!(partition.burning_count(), 0);
    }

    #[test]
    fn set_fire_writes_interior_and_halo_mirror() {
        let mut partition = Partition::new(5, 5);
        partition.set_fire(2, 3);
        assert_eq!(partition.get(2, 3), CellState::Burning);
        assert_eq!(partition.halo_at(3, 3), CellState::Burning);
        assert_eq!(partition.burning_count(), 1);
    }

    #[test]
    fn set_fire_out_of_bounds_is_a_no_op() {
        let mut partition = Partition::new(5, 5);
        partition.set_fire(5, 0);
        partition.set_fire(0, 5);
        partition.set_fire(100, 100);
        assert_eq!(partition.burning_count(), 0);
    }

    #[test]
    fn commit_refreshes_halo_interior_but_not_edges() {
        let mut partition = Partition::new(2, 2);
        let ghost = vec![CellState::Burning; 2];
        partition.set_halo_edge(HaloEdge::Top, &ghost);

        partition.commit(vec![
            CellState::Burnt,
            CellState::Fuel,
            CellState::Burning,
            CellState::Fuel,
        ]);

        assert_eq!(halo_interior(&partition), interior(&partition));
        // Edge ghost row is stale, not cleared
        assert_eq!(partition.halo_at(0, 0), CellState::Burning);
    }

    #[test]
    #[should_panic(expected = "commit shape mismatch")]
    fn commit_rejects_wrong_shape() {
        let mut partition = Partition::new(2, 2);
        partition.commit(vec![CellState::Fuel; 3]);
    }

    #[test]
    fn take_bottom_row_shrinks_and_resets_halo() {
        let mut partition = Partition::new(3, 2);
        partition.set_fire(2, 1);
        partition.set_halo_edge(HaloEdge::Bottom, &[CellState::Burning; 2]);

        let row = partition.take_bottom_row();
        assert_eq!(row, vec![CellState::Fuel, CellState::Burning]);
        assert_eq!(partition.rows(), 2);
        // Halo reshaped to (rows + 2) x cols with ghost rows back to Fuel
        assert_eq!(partition.halo_at(0, 0), CellState::Fuel);
        assert_eq!(partition.halo_at(3, 1), CellState::Fuel);
        assert_eq!(halo_interior(&partition), interior(&partition));
    }

    #[test]
    fn take_top_row_returns_first_row() {
        let mut partition = Partition::new(3, 2);
        partition.set_fire(0, 0);
        let row = partition.take_top_row();
        assert_eq!(row, vec![CellState::Burning, CellState::Fuel]);
        assert_eq!(partition.rows(), 2);
        assert_eq!(partition.get(0, 0), CellState::Fuel);
    }

    #[test]
    fn push_rows_grow_at_the_right_edge() {
        let mut partition = Partition::new(2, 2);
        partition.push_top_row(vec![CellState::Burning, CellState::Burnt]);
        assert_eq!(partition.rows(), 3);
        assert_eq!(partition.get(0, 0), CellState::Burning);
        assert_eq!(partition.get(0, 1), CellState::Burnt);

        partition.push_bottom_row(vec![CellState::Burnt, CellState::Burning]);
        assert_eq!(partition.rows(), 4);
        assert_eq!(partition.get(3, 0), CellState::Burnt);
        assert_eq!(partition.get(3, 1), CellState::Burning);
        assert_eq!(halo_interior(&partition), interior(&partition));
    }

    #[test]
    fn migration_round_trip_conserves_rows() {
        let mut upper = Partition::new(4, 3);
        let mut lower = Partition::new(4, 3);
        upper.set_fire(3, 1);

        let row = upper.take_bottom_row();
        lower.push_top_row(row);

        assert_eq!(upper.rows() + lower.rows(), 8);
        assert_eq!(lower.get(0, 1), CellState::Burning);
    }

    #[test]
    fn interior_codes_match_states() {
        let mut partition = Partition::new(2, 2);
        partition.set_fire(0, 1);
        partition.commit(vec![
            CellState::Fuel,
            CellState::Burnt,
            CellState::Burning,
            CellState::Fuel,
        ]);
        assert_eq!(partition.interior_codes(), vec![0, 2, 1, 0]);
    }
}
