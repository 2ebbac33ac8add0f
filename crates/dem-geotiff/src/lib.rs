//! # dem-geotiff
//!
//! [`TileUpdater`](dem_raster::TileUpdater) serving `dem-raster` tiles from a
//! directory of 1x1 degree GeoTIFF files, such as the USGS 3DEP 1/3
//! arc-second products.
//!
//! Files are indexed by the north-west corner carried in their name
//! (`USGS_13_n48w123_20240327.tif`, `s01e002.tif`, ...) and only decoded
//! when the cache asks for the tile covering a point. Georeferencing comes
//! from the ModelTiepoint/ModelPixelScale tags, or from the filename when
//! these tags are missing. Pixels are treated as areas, so the resulting
//! tiles are cell-centered and the cache stitches zipper tiles across their
//! borders.

mod error;
mod index;
mod reader;
mod updater;

pub use error::GeoTiffError;
pub use index::{TileBounds, TileIndex, TileKey};
pub use reader::{GeoTiffRaster, DEFAULT_NODATA, GDAL_NODATA, MODEL_PIXEL_SCALE, MODEL_TIEPOINT};
pub use updater::{GeoTiffUpdater, GeoTiffUpdaterConfig};

/// Result type for GeoTIFF operations.
pub type Result<T> = std::result::Result<T, GeoTiffError>;
