//! Error types for the raster crate.

use thiserror::Error;

/// Errors that can occur when building or querying DEM tiles.
#[derive(Debug, Error)]
pub enum DemError {
    /// A tile geometry was set with zero rows or zero columns.
    #[error("Empty tile ({rows} rows x {columns} columns)")]
    EmptyTile {
        /// Requested number of latitude rows.
        rows: usize,
        /// Requested number of longitude columns.
        columns: usize,
    },

    /// Raw sample indices outside of the tile.
    #[error("Indices ({row}, {column}) are out of tile ({rows} rows x {columns} columns)")]
    OutOfTileIndices {
        /// Requested latitude row.
        row: usize,
        /// Requested longitude column.
        column: usize,
        /// Tile latitude rows.
        rows: usize,
        /// Tile longitude columns.
        columns: usize,
    },

    /// Interpolation requested farther than the tolerance outside the tile (all values in degrees).
    #[error(
        "Point ({latitude}, {longitude}) is out of tile angles ({min_latitude}-{max_latitude}, {min_longitude}-{max_longitude})"
    )]
    OutOfTileAngles {
        /// Requested latitude.
        latitude: f64,
        /// Requested longitude.
        longitude: f64,
        /// Latitude of the southernmost sample row.
        min_latitude: f64,
        /// Latitude of the northernmost sample row.
        max_latitude: f64,
        /// Longitude of the westernmost sample column.
        min_longitude: f64,
        /// Longitude of the easternmost sample column.
        max_longitude: f64,
    },

    /// The updater produced a tile that cannot interpolate at the requested point (degrees).
    #[error("Tile without required interpolation neighbors at ({latitude}, {longitude})")]
    TileWithoutRequiredNeighbors {
        /// Requested latitude.
        latitude: f64,
        /// Requested longitude.
        longitude: f64,
    },

    /// Min/max tree level beyond the finest stored level.
    #[error("Invalid tree level {level} (tile has {levels} levels)")]
    InvalidLevel {
        /// Requested level.
        level: usize,
        /// Number of levels in the trees.
        levels: usize,
    },

    /// Elevation or geometry written after the tile update was completed.
    #[error("Tile update already completed, samples are read-only")]
    TileAlreadyCompleted,

    /// A cache cannot hold zero tiles.
    #[error("Invalid tiles cache capacity {0} (must be at least 1)")]
    InvalidCacheCapacity(usize),

    /// Failure reported by a tile updater while loading elevation data.
    #[error("Tile updater failed: {0}")]
    Updater(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl DemError {
    /// Wrap an updater-specific error, keeping it available as the source.
    pub fn updater<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        DemError::Updater(error.into())
    }
}
