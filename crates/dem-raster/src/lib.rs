//! # dem-raster
//!
//! Bounded cache of Digital Elevation Model (DEM) tiles, with exact
//! ray/terrain intersection and seamless interpolation across tile borders.
//!
//! ## Overview
//!
//! A DEM is split into rectangular latitude/longitude tiles. Each tile is a
//! regular grid of elevation samples, the terrain between four samples being
//! the bilinear surface over them. This crate provides:
//!
//! - the [`Tile`] abstraction, with point classification ([`Location`]),
//!   bilinear interpolation and exact line/cell intersection;
//! - two tile backings: the dense [`SimpleTile`] and the [`MinMaxTreeTile`],
//!   which adds min/max kd-trees for ray-marching pruning;
//! - the [`TilesCache`], a bounded LRU pool of tiles loaded on demand through
//!   a [`TileUpdater`]. Near tile borders the cache stitches small *zipper*
//!   tiles from the neighboring tiles, so interpolation never fails at an
//!   edge, a corner, the antimeridian or a change of resolution;
//! - analytic updaters ([`FunctionUpdater`], [`CheckedPatternUpdater`],
//!   [`VolcanicConeUpdater`], [`RandomLandscapeUpdater`]) for tests and demos.
//!
//! All angles are in radians and all elevations in meters. Tile coordinates
//! (`min_latitude`, `min_longitude`) locate the *center* of the south-west
//! cell, not the outer edge of the tile.
//!
//! ## Example
//!
//! ```
//! use dem_raster::{GeodeticPoint, SampleLayout, SimpleTile, Tile, TileGrid, TilesCache, VolcanicConeUpdater};
//! use nalgebra::Vector3;
//!
//! let degree = 1.0_f64.to_radians();
//! let summit = GeodeticPoint::new(0.5 * degree, 0.5 * degree, 2500.0);
//! let grid = TileGrid::new(degree, 101, SampleLayout::Overlapping);
//! let updater = VolcanicConeUpdater::new(grid, summit, 5.0_f64.to_radians());
//! let mut cache = TilesCache::with_capacity(SimpleTile::new, updater, 4)?;
//!
//! let tile = cache.get_tile(summit.latitude, summit.longitude)?;
//! let elevation = tile.interpolate_elevation(summit.latitude, summit.longitude)?;
//! assert!((elevation - 2500.0).abs() < 1.0e-6);
//!
//! // vertical line of sight above the summit
//! let above = GeodeticPoint::new(summit.latitude, summit.longitude, 4000.0);
//! let down = Vector3::new(0.0, 0.0, -1.0);
//! let i = tile.floor_latitude_index(above.latitude);
//! let j = tile.floor_longitude_index(above.longitude);
//! let ground = tile.cell_intersection(&above, &down, i, j)?.expect("line crosses the cell");
//! assert!((ground.altitude - 2500.0).abs() < 1.0e-6);
//! # Ok::<(), dem_raster::DemError>(())
//! ```

mod cache;
mod error;
mod min_max_tree;
mod neighbor;
mod simple_tile;
mod synthetic;
mod tile;
mod zipper;

pub use cache::{CacheStats, LongitudeRange, TileFactory, TileUpdater, TilesCache, TilesCacheConfig, DEFAULT_MAX_TILES};
pub use error::DemError;
pub use min_max_tree::MinMaxTreeTile;
pub use neighbor::Direction;
pub use simple_tile::SimpleTile;
pub use synthetic::{
    CheckedPatternUpdater, FunctionUpdater, RandomLandscapeUpdater, SampleLayout, TileGrid, VolcanicConeUpdater,
    EARTH_RADIUS,
};
pub use tile::{normalize_longitude, GeodeticPoint, Location, Tile, TileState, UpdatableTile, TOLERANCE};

/// Result type for DEM operations.
pub type Result<T> = std::result::Result<T, DemError>;
