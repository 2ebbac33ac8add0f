//! Tile updater backed by a directory of GeoTIFF files.

use crate::index::TileIndex;
use crate::reader::GeoTiffRaster;
use crate::{GeoTiffError, Result};
use dem_raster::{normalize_longitude, TileUpdater, UpdatableTile};
use std::path::PathBuf;
use tracing::debug;

/// Configuration of a [`GeoTiffUpdater`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct GeoTiffUpdaterConfig {
    /// Directory holding the `.tif` tiles.
    pub directory: PathBuf,
    /// Elevation (meters) replacing no-data samples.
    pub fill_elevation: f64,
}

impl Default for GeoTiffUpdaterConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("dem_data"),
            fill_elevation: 0.0,
        }
    }
}

/// [`TileUpdater`] loading the GeoTIFF file that covers the requested point.
///
/// # Example
///
/// ```no_run
/// use dem_geotiff::{GeoTiffUpdater, GeoTiffUpdaterConfig};
/// use dem_raster::{SimpleTile, Tile, TilesCache};
///
/// let updater = GeoTiffUpdater::new(GeoTiffUpdaterConfig {
///     directory: "dem_data".into(),
///     fill_elevation: 0.0,
/// })?;
/// let mut cache = TilesCache::with_capacity(SimpleTile::new, updater, 8)?;
///
/// // Seattle
/// let (lat, lon) = (47.6062_f64.to_radians(), -122.3321_f64.to_radians());
/// let elevation = cache.get_tile(lat, lon)?.interpolate_elevation(lat, lon)?;
/// println!("Seattle elevation: {} meters", elevation);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone)]
pub struct GeoTiffUpdater {
    index: TileIndex,
    fill_elevation: f64,
}

impl GeoTiffUpdater {
    /// Index the configured directory.
    pub fn new(config: GeoTiffUpdaterConfig) -> Result<Self> {
        let mut index = TileIndex::new();
        index.add_directory(&config.directory)?;
        Ok(Self::from_index(index, config.fill_elevation))
    }

    /// Use an index built by the caller.
    pub fn from_index(index: TileIndex, fill_elevation: f64) -> Self {
        Self { index, fill_elevation }
    }

    /// Files available to this updater.
    pub fn index(&self) -> &TileIndex {
        &self.index
    }
}

impl TileUpdater for GeoTiffUpdater {
    fn update_tile(&mut self, latitude: f64, longitude: f64, tile: &mut dyn UpdatableTile) -> dem_raster::Result<()> {
        let lat = latitude.to_degrees();
        let lon = normalize_longitude(longitude, 0.0).to_degrees();
        let (key, path) = self
            .index
            .path_for(lat, lon)
            .ok_or(GeoTiffError::NoTileFound { lat, lon })?;
        debug!(
            "GeoTiffUpdater: loading tile ({}, {}) from {} for ({:.6}, {:.6})",
            key.lat,
            key.lon,
            path.display(),
            lat,
            lon
        );
        let raster = GeoTiffRaster::from_file(path)?;
        raster.fill_tile(tile, self.fill_elevation)?;
        Ok(())
    }
}
