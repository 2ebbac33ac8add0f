//! Dense tile backed by a single row-major elevation array.

use crate::tile::{Tile, TileState, UpdatableTile};
use crate::{DemError, Result};

/// A tile storing every elevation sample in a flat array.
///
/// Samples are stored row-major, row 0 being the southernmost row and
/// column 0 the westernmost column.
#[derive(Debug, Clone)]
pub struct SimpleTile {
    min_latitude: f64,
    min_longitude: f64,
    latitude_step: f64,
    longitude_step: f64,
    latitude_rows: usize,
    longitude_columns: usize,
    min_elevation: f64,
    max_elevation: f64,
    elevations: Vec<f64>,
    state: TileState,
}

impl Default for SimpleTile {
    fn default() -> Self {
        Self::new()
    }
}

impl SimpleTile {
    /// Create an empty, uninitialized tile.
    pub fn new() -> Self {
        Self {
            min_latitude: 0.0,
            min_longitude: 0.0,
            latitude_step: 0.0,
            longitude_step: 0.0,
            latitude_rows: 0,
            longitude_columns: 0,
            min_elevation: f64::INFINITY,
            max_elevation: f64::NEG_INFINITY,
            elevations: Vec::new(),
            state: TileState::Uninitialized,
        }
    }

    /// Raw samples, row-major from the south-west corner.
    pub fn elevations(&self) -> &[f64] {
        &self.elevations
    }

    fn check_indices(&self, row: usize, column: usize) -> Result<usize> {
        if row >= self.latitude_rows || column >= self.longitude_columns {
            return Err(DemError::OutOfTileIndices {
                row,
                column,
                rows: self.latitude_rows,
                columns: self.longitude_columns,
            });
        }
        Ok(row * self.longitude_columns + column)
    }
}

impl UpdatableTile for SimpleTile {
    fn set_geometry(
        &mut self,
        min_latitude: f64,
        min_longitude: f64,
        latitude_step: f64,
        longitude_step: f64,
        latitude_rows: usize,
        longitude_columns: usize,
    ) -> Result<()> {
        if self.state == TileState::Available {
            return Err(DemError::TileAlreadyCompleted);
        }
        if latitude_rows == 0 || longitude_columns == 0 {
            return Err(DemError::EmptyTile {
                rows: latitude_rows,
                columns: longitude_columns,
            });
        }

        self.min_latitude = min_latitude;
        self.min_longitude = min_longitude;
        self.latitude_step = latitude_step;
        self.longitude_step = longitude_step;
        self.latitude_rows = latitude_rows;
        self.longitude_columns = longitude_columns;
        self.min_elevation = f64::INFINITY;
        self.max_elevation = f64::NEG_INFINITY;
        self.elevations = vec![0.0; latitude_rows * longitude_columns];
        self.state = TileState::Configured;
        Ok(())
    }

    fn set_elevation(&mut self, row: usize, column: usize, elevation: f64) -> Result<()> {
        if self.state == TileState::Available {
            return Err(DemError::TileAlreadyCompleted);
        }
        let index = self.check_indices(row, column)?;
        self.elevations[index] = elevation;
        Ok(())
    }
}

impl Tile for SimpleTile {
    fn tile_update_completed(&mut self) -> Result<()> {
        if self.state == TileState::Uninitialized {
            return Err(DemError::EmptyTile {
                rows: self.latitude_rows,
                columns: self.longitude_columns,
            });
        }

        let (min, max) = self
            .elevations
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), &e| {
                (min.min(e), max.max(e))
            });
        self.min_elevation = min;
        self.max_elevation = max;
        self.state = TileState::Available;
        Ok(())
    }

    fn state(&self) -> TileState {
        self.state
    }

    fn min_latitude(&self) -> f64 {
        self.min_latitude
    }

    fn min_longitude(&self) -> f64 {
        self.min_longitude
    }

    fn latitude_step(&self) -> f64 {
        self.latitude_step
    }

    fn longitude_step(&self) -> f64 {
        self.longitude_step
    }

    fn latitude_rows(&self) -> usize {
        self.latitude_rows
    }

    fn longitude_columns(&self) -> usize {
        self.longitude_columns
    }

    fn min_elevation(&self) -> f64 {
        self.min_elevation
    }

    fn max_elevation(&self) -> f64 {
        self.max_elevation
    }

    fn elevation_at_indices(&self, row: usize, column: usize) -> Result<f64> {
        let index = self.check_indices(row, column)?;
        Ok(self.elevations[index])
    }
}
