//! Error types for the GeoTIFF updater.

use dem_raster::DemError;
use thiserror::Error;

/// Errors that can occur when indexing or reading GeoTIFF tiles.
#[derive(Debug, Error)]
pub enum GeoTiffError {
    /// I/O error reading a file or a directory.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TIFF decoding error.
    #[error("TIFF decode error: {0}")]
    TiffDecode(#[from] tiff::TiffError),

    /// Invalid GeoTIFF, e.g. inconsistent georeferencing tags.
    #[error("Invalid GeoTIFF: {0}")]
    InvalidGeoTiff(String),

    /// Invalid tile filename, cannot parse the north-west corner.
    #[error("Invalid tile filename: {0}")]
    InvalidFilename(String),

    /// Unsupported pixel layout in the TIFF file.
    #[error("Unsupported TIFF data type: {0}")]
    UnsupportedDataType(String),

    /// No indexed file covers the coordinate (degrees).
    #[error("No tile found for coordinate ({lat}, {lon})")]
    NoTileFound {
        /// Requested latitude.
        lat: f64,
        /// Requested longitude.
        lon: f64,
    },
}

impl From<GeoTiffError> for DemError {
    fn from(error: GeoTiffError) -> Self {
        DemError::updater(error)
    }
}
