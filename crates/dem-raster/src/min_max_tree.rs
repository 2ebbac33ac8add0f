//! Tile with min/max kd-trees over its cells.
//!
//! Ray-marching algorithms use these trees to skip whole groups of cells
//! whose maximum elevation is below the line of sight. The trees are built
//! once, when the tile update is completed:
//!
//! - stage 0 holds, for each cell, the extremum over its four corners;
//! - each following stage merges pairs of sub-tiles, alternately along
//!   columns and rows (an axis already reduced to one element is skipped);
//! - the last stage is the single root.
//!
//! Only stages 1 and above are stored. Levels are numbered from the root
//! (level 0) down to the finest stored stage (`levels() - 1`).

use crate::simple_tile::SimpleTile;
use crate::tile::{Tile, TileState, UpdatableTile};
use crate::{DemError, Result};
use tracing::trace;

/// Layout of one stored stage inside the flat trees.
#[derive(Debug, Clone, Copy)]
struct Stage {
    start: usize,
    rows: usize,
    columns: usize,
    row_shift: u32,
    column_shift: u32,
    column_merging: bool,
}

/// A dense tile augmented with min/max kd-trees.
#[derive(Debug, Clone, Default)]
pub struct MinMaxTreeTile {
    tile: SimpleTile,
    /// Stored stages, finest first.
    stages: Vec<Stage>,
    min_tree: Vec<f64>,
    max_tree: Vec<f64>,
}

impl MinMaxTreeTile {
    /// Create an empty, uninitialized tile.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of levels in the trees (zero for a single-cell tile).
    pub fn levels(&self) -> usize {
        self.stages.len()
    }

    /// Minimum elevation of the sub-tile containing cell `(row, column)` at `level`.
    pub fn min_elevation_at(&self, row: usize, column: usize, level: usize) -> Result<f64> {
        let index = self.tree_index(row, column, level)?;
        Ok(self.min_tree[index])
    }

    /// Maximum elevation of the sub-tile containing cell `(row, column)` at `level`.
    pub fn max_elevation_at(&self, row: usize, column: usize, level: usize) -> Result<f64> {
        let index = self.tree_index(row, column, level)?;
        Ok(self.max_tree[index])
    }

    /// Check if the sub-tiles at `level` were obtained by merging columns of
    /// the sub-tiles at `level + 1` (rows otherwise).
    pub fn is_column_merging(&self, level: usize) -> Result<bool> {
        Ok(self.stage(level)?.column_merging)
    }

    /// Finest level at which both cells belong to the same sub-tile.
    ///
    /// Returns `None` only when the tile has no levels at all.
    pub fn merge_level(&self, row1: usize, column1: usize, row2: usize, column2: usize) -> Option<usize> {
        let mut largest = None;
        for (level, stage) in self.stages.iter().rev().enumerate() {
            let same_row = row1 >> stage.row_shift == row2 >> stage.row_shift;
            let same_column = column1 >> stage.column_shift == column2 >> stage.column_shift;
            if !(same_row && same_column) {
                break;
            }
            largest = Some(level);
        }
        largest
    }

    /// Rows starting a new sub-tile at `level` when travelling from `row1` to `row2`.
    ///
    /// The rows are given in travel order.
    pub fn crossed_boundary_rows(&self, row1: usize, row2: usize, level: usize) -> Result<Vec<usize>> {
        Ok(crossings(row1, row2, 1 << self.stage(level)?.row_shift))
    }

    /// Columns starting a new sub-tile at `level` when travelling from `column1` to `column2`.
    ///
    /// The columns are given in travel order.
    pub fn crossed_boundary_columns(&self, column1: usize, column2: usize, level: usize) -> Result<Vec<usize>> {
        Ok(crossings(column1, column2, 1 << self.stage(level)?.column_shift))
    }

    fn stage(&self, level: usize) -> Result<&Stage> {
        let levels = self.stages.len();
        if level >= levels {
            return Err(DemError::InvalidLevel { level, levels });
        }
        Ok(&self.stages[levels - 1 - level])
    }

    fn tree_index(&self, row: usize, column: usize, level: usize) -> Result<usize> {
        let rows = self.tile.latitude_rows();
        let columns = self.tile.longitude_columns();
        if row >= rows || column >= columns {
            return Err(DemError::OutOfTileIndices {
                row,
                column,
                rows,
                columns,
            });
        }
        let stage = self.stage(level)?;
        Ok(stage.start + (row >> stage.row_shift) * stage.columns + (column >> stage.column_shift))
    }

    fn build_trees(&mut self) {
        let rows = self.tile.latitude_rows();
        let columns = self.tile.longitude_columns();
        let elevations = self.tile.elevations();

        self.stages.clear();
        self.min_tree.clear();
        self.max_tree.clear();

        let mut min_values = cell_extrema(elevations, rows, columns, f64::min);
        let mut max_values = cell_extrema(elevations, rows, columns, f64::max);
        let (mut stage_rows, mut stage_columns) = (rows, columns);
        let (mut row_shift, mut column_shift) = (0, 0);
        let mut merge_columns_next = true;

        while stage_rows > 1 || stage_columns > 1 {
            let column_merging = if stage_columns == 1 {
                false
            } else if stage_rows == 1 {
                true
            } else {
                merge_columns_next
            };

            min_values = merge(&min_values, stage_rows, stage_columns, column_merging, f64::min);
            max_values = merge(&max_values, stage_rows, stage_columns, column_merging, f64::max);
            if column_merging {
                stage_columns = (stage_columns + 1) / 2;
                column_shift += 1;
            } else {
                stage_rows = (stage_rows + 1) / 2;
                row_shift += 1;
            }

            self.stages.push(Stage {
                start: self.min_tree.len(),
                rows: stage_rows,
                columns: stage_columns,
                row_shift,
                column_shift,
                column_merging,
            });
            self.min_tree.extend_from_slice(&min_values);
            self.max_tree.extend_from_slice(&max_values);
            merge_columns_next = !column_merging;
        }

        trace!(
            "MinMaxTreeTile: built {} levels over {}x{} cells",
            self.stages.len(),
            rows,
            columns
        );
    }
}

/// Extremum of each cell over its (up to) four corners.
fn cell_extrema(elevations: &[f64], rows: usize, columns: usize, f: fn(f64, f64) -> f64) -> Vec<f64> {
    let mut extrema = Vec::with_capacity(rows * columns);
    for i in 0..rows {
        let i1 = (i + 1).min(rows - 1);
        for j in 0..columns {
            let j1 = (j + 1).min(columns - 1);
            let a = f(elevations[i * columns + j], elevations[i * columns + j1]);
            let b = f(elevations[i1 * columns + j], elevations[i1 * columns + j1]);
            extrema.push(f(a, b));
        }
    }
    extrema
}

/// Merge pairs of columns (or rows) of a stage.
fn merge(values: &[f64], rows: usize, columns: usize, column_merging: bool, f: fn(f64, f64) -> f64) -> Vec<f64> {
    if column_merging {
        let merged_columns = (columns + 1) / 2;
        let mut merged = Vec::with_capacity(rows * merged_columns);
        for i in 0..rows {
            let row = &values[i * columns..(i + 1) * columns];
            merged.extend(row.chunks(2).map(|pair| pair.iter().copied().fold(pair[0], f)));
        }
        merged
    } else {
        let merged_rows = (rows + 1) / 2;
        let mut merged = Vec::with_capacity(merged_rows * columns);
        for ii in 0..merged_rows {
            let i = 2 * ii;
            for j in 0..columns {
                let mut v = values[i * columns + j];
                if i + 1 < rows {
                    v = f(v, values[(i + 1) * columns + j]);
                }
                merged.push(v);
            }
        }
        merged
    }
}

/// Multiples of `size` in `(min(a, b), max(a, b)]`, in travel order from `a` to `b`.
fn crossings(a: usize, b: usize, size: usize) -> Vec<usize> {
    let (low, high) = if a <= b { (a, b) } else { (b, a) };
    let first = (low / size + 1) * size;
    let mut crossings: Vec<usize> = (first..=high).step_by(size).collect();
    if a > b {
        crossings.reverse();
    }
    crossings
}

impl UpdatableTile for MinMaxTreeTile {
    fn set_geometry(
        &mut self,
        min_latitude: f64,
        min_longitude: f64,
        latitude_step: f64,
        longitude_step: f64,
        latitude_rows: usize,
        longitude_columns: usize,
    ) -> Result<()> {
        self.tile.set_geometry(
            min_latitude,
            min_longitude,
            latitude_step,
            longitude_step,
            latitude_rows,
            longitude_columns,
        )
    }

    fn set_elevation(&mut self, row: usize, column: usize, elevation: f64) -> Result<()> {
        self.tile.set_elevation(row, column, elevation)
    }
}

impl Tile for MinMaxTreeTile {
    fn tile_update_completed(&mut self) -> Result<()> {
        self.tile.tile_update_completed()?;
        self.build_trees();
        Ok(())
    }

    fn state(&self) -> TileState {
        self.tile.state()
    }

    fn min_latitude(&self) -> f64 {
        self.tile.min_latitude()
    }

    fn min_longitude(&self) -> f64 {
        self.tile.min_longitude()
    }

    fn latitude_step(&self) -> f64 {
        self.tile.latitude_step()
    }

    fn longitude_step(&self) -> f64 {
        self.tile.longitude_step()
    }

    fn latitude_rows(&self) -> usize {
        self.tile.latitude_rows()
    }

    fn longitude_columns(&self) -> usize {
        self.tile.longitude_columns()
    }

    fn min_elevation(&self) -> f64 {
        self.tile.min_elevation()
    }

    fn max_elevation(&self) -> f64 {
        self.tile.max_elevation()
    }

    fn elevation_at_indices(&self, row: usize, column: usize) -> Result<f64> {
        self.tile.elevation_at_indices(row, column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn random_tile(rows: usize, columns: usize, seed: u64) -> MinMaxTreeTile {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut tile = MinMaxTreeTile::new();
        tile.set_geometry(0.1, 0.2, 0.001, 0.001, rows, columns).unwrap();
        for i in 0..rows {
            for j in 0..columns {
                tile.set_elevation(i, j, rng.gen_range(-100.0..2000.0)).unwrap();
            }
        }
        tile.tile_update_completed().unwrap();
        tile
    }

    #[test]
    fn test_levels() {
        assert_eq!(random_tile(3, 5, 1).levels(), 5);
        assert_eq!(random_tile(16, 16, 1).levels(), 8);
        assert_eq!(random_tile(1, 1, 1).levels(), 0);
        assert_eq!(random_tile(1, 8, 1).levels(), 3);
        assert_eq!(random_tile(107, 19, 1).levels(), 12);
    }

    #[test]
    fn test_root_is_tile_extrema() {
        let tile = random_tile(107, 19, 0x1234);
        assert_eq!(tile.min_elevation_at(0, 0, 0).unwrap(), tile.min_elevation());
        assert_eq!(tile.max_elevation_at(106, 18, 0).unwrap(), tile.max_elevation());
    }

    #[test]
    fn test_min_max_match_brute_force() {
        let (rows, columns) = (17, 11);
        let tile = random_tile(rows, columns, 0xf556_baa5);
        for level in 0..tile.levels() {
            let stage = *tile.stage(level).unwrap();
            let height = 1usize << stage.row_shift;
            let width = 1usize << stage.column_shift;
            for i in 0..rows {
                for j in 0..columns {
                    let r0 = (i / height) * height;
                    let c0 = (j / width) * width;
                    let r1 = (r0 + height).min(rows - 1);
                    let c1 = (c0 + width).min(columns - 1);
                    let mut min = f64::INFINITY;
                    let mut max = f64::NEG_INFINITY;
                    for r in r0..=r1 {
                        for c in c0..=c1 {
                            let e = tile.elevation_at_indices(r, c).unwrap();
                            min = min.min(e);
                            max = max.max(e);
                        }
                    }
                    assert_eq!(tile.min_elevation_at(i, j, level).unwrap(), min);
                    assert_eq!(tile.max_elevation_at(i, j, level).unwrap(), max);
                }
            }
        }
    }

    #[test]
    fn test_merge_level() {
        let tile = random_tile(16, 16, 7);
        assert_eq!(tile.merge_level(3, 3, 3, 3), Some(7));
        assert_eq!(tile.merge_level(0, 0, 0, 1), Some(7));
        assert_eq!(tile.merge_level(0, 1, 0, 2), Some(5));
        assert_eq!(tile.merge_level(0, 0, 15, 15), Some(0));
        assert_eq!(random_tile(1, 1, 7).merge_level(0, 0, 0, 0), None);
    }

    #[test]
    fn test_column_merging_alternates() {
        let tile = random_tile(16, 16, 7);
        assert!(tile.is_column_merging(7).unwrap());
        assert!(!tile.is_column_merging(6).unwrap());
        assert!(tile.is_column_merging(5).unwrap());
        assert!(!tile.is_column_merging(0).unwrap());
    }

    #[test]
    fn test_crossed_boundaries() {
        let tile = random_tile(16, 16, 7);
        assert_eq!(tile.crossed_boundary_rows(1, 6, 5).unwrap(), vec![2, 4, 6]);
        assert_eq!(tile.crossed_boundary_rows(6, 1, 5).unwrap(), vec![6, 4, 2]);
        assert_eq!(tile.crossed_boundary_columns(1, 9, 5).unwrap(), vec![4, 8]);
        assert_eq!(tile.crossed_boundary_columns(9, 1, 5).unwrap(), vec![8, 4]);
        assert!(tile.crossed_boundary_rows(5, 5, 5).unwrap().is_empty());
        assert!(tile.crossed_boundary_columns(4, 7, 5).unwrap().is_empty());
    }

    #[test]
    fn test_out_of_range_cell() {
        let tile = random_tile(4, 4, 3);
        assert!(matches!(
            tile.min_elevation_at(4, 0, 0),
            Err(DemError::OutOfTileIndices { .. })
        ));
    }

    #[test]
    fn test_invalid_level() {
        let tile = random_tile(16, 16, 3);
        assert!(matches!(
            tile.min_elevation_at(0, 0, 8),
            Err(DemError::InvalidLevel { level: 8, levels: 8 })
        ));
        assert!(matches!(tile.max_elevation_at(0, 0, 42), Err(DemError::InvalidLevel { .. })));
        assert!(matches!(tile.is_column_merging(8), Err(DemError::InvalidLevel { .. })));
        assert!(matches!(tile.crossed_boundary_rows(0, 3, 8), Err(DemError::InvalidLevel { .. })));
        assert!(matches!(tile.crossed_boundary_columns(0, 3, 8), Err(DemError::InvalidLevel { .. })));

        // a single-cell tile has no levels at all
        let single = random_tile(1, 1, 3);
        assert!(matches!(
            single.min_elevation_at(0, 0, 0),
            Err(DemError::InvalidLevel { level: 0, levels: 0 })
        ));
        assert!(DemError::InvalidLevel { level: 8, levels: 8 }.to_string().contains("level 8"));
    }
}
