//! Index of GeoTIFF files by their north-west corner.

use crate::{GeoTiffError, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Key of a 1x1 degree tile: its north-west corner, in whole degrees.
///
/// `n48w123` covers latitudes 47 to 48 and longitudes -123 to -122.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileKey {
    /// Latitude of the north edge (negative south of the equator).
    pub lat: i32,
    /// Longitude of the west edge (negative west of Greenwich).
    pub lon: i32,
}

impl TileKey {
    /// Key of the tile containing a coordinate in degrees.
    ///
    /// Tiles are closed on their south and west edges, so a point exactly on
    /// a whole latitude belongs to the tile north of it.
    pub fn from_coord(lat: f64, lon: f64) -> Self {
        TileKey {
            lat: lat.floor() as i32 + 1,
            lon: lon.floor() as i32,
        }
    }

    /// Parse the first `[ns]<digits>[ew]<digits>` group of a filename.
    ///
    /// Matching is case-insensitive, so both `USGS_13_n48w123_20240327.tif`
    /// and `N48W123.tif` are accepted.
    pub fn from_filename(filename: &str) -> Option<Self> {
        let name = filename.to_ascii_lowercase();
        let bytes = name.as_bytes();
        (0..bytes.len()).find_map(|start| Self::parse_at(bytes, start))
    }

    fn parse_at(bytes: &[u8], start: usize) -> Option<Self> {
        let lat_sign = match bytes[start] {
            b'n' => 1,
            b's' => -1,
            _ => return None,
        };
        let (lat, next) = digits(bytes, start + 1)?;
        let lon_sign = match bytes.get(next)? {
            b'e' => 1,
            b'w' => -1,
            _ => return None,
        };
        let (lon, _) = digits(bytes, next + 1)?;
        Some(TileKey {
            lat: lat_sign * lat,
            lon: lon_sign * lon,
        })
    }

    /// Geographic bounds of the tile.
    pub fn bounds(&self) -> TileBounds {
        TileBounds {
            min_lat: (self.lat - 1) as f64,
            max_lat: self.lat as f64,
            min_lon: self.lon as f64,
            max_lon: (self.lon + 1) as f64,
        }
    }
}

/// Run of ASCII digits starting at `start`, with the index following it.
fn digits(bytes: &[u8], start: usize) -> Option<(i32, usize)> {
    let end = bytes[start.min(bytes.len())..]
        .iter()
        .position(|b| !b.is_ascii_digit())
        .map_or(bytes.len(), |n| start + n);
    if end == start {
        return None;
    }
    let value = std::str::from_utf8(&bytes[start..end]).ok()?.parse().ok()?;
    Some((value, end))
}

/// Geographic bounds of a tile, in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileBounds {
    /// Minimum latitude (south edge).
    pub min_lat: f64,
    /// Maximum latitude (north edge).
    pub max_lat: f64,
    /// Minimum longitude (west edge).
    pub min_lon: f64,
    /// Maximum longitude (east edge).
    pub max_lon: f64,
}

impl TileBounds {
    /// Check if a coordinate is within the bounds.
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.min_lat && lat <= self.max_lat && lon >= self.min_lon && lon <= self.max_lon
    }
}

/// Available tile files, indexed by their north-west corner.
///
/// Indexing only looks at filenames; no file is opened until a tile is
/// requested.
#[derive(Debug, Clone, Default)]
pub struct TileIndex {
    paths: HashMap<TileKey, PathBuf>,
}

impl TileIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add all `.tif` files of a directory whose name carries a tile key.
    ///
    /// Other files are skipped. Returns the number of files indexed.
    pub fn add_directory<P: AsRef<Path>>(&mut self, dir: P) -> Result<usize> {
        let dir = dir.as_ref();
        let mut count = 0;
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let is_tiff = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("tif") || ext.eq_ignore_ascii_case("tiff"));
            if !is_tiff {
                continue;
            }
            if let Some(key) = path.file_name().and_then(|s| s.to_str()).and_then(TileKey::from_filename) {
                self.paths.insert(key, path);
                count += 1;
            }
        }
        debug!("TileIndex: indexed {} files from {}", count, dir.display());
        Ok(count)
    }

    /// Add a single file, failing if its name carries no tile key.
    pub fn add_file<P: AsRef<Path>>(&mut self, path: P) -> Result<TileKey> {
        let path = path.as_ref();
        let filename = path
            .file_name()
            .and_then(|s| s.to_str())
            .ok_or_else(|| GeoTiffError::InvalidFilename(path.display().to_string()))?;
        let key =
            TileKey::from_filename(filename).ok_or_else(|| GeoTiffError::InvalidFilename(filename.to_string()))?;
        self.paths.insert(key, path.to_path_buf());
        Ok(key)
    }

    /// File covering a coordinate in degrees, if indexed.
    pub fn path_for(&self, lat: f64, lon: f64) -> Option<(TileKey, &Path)> {
        let key = TileKey::from_coord(lat, lon);
        self.paths.get(&key).map(|path| (key, path.as_path()))
    }

    /// Number of indexed files.
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Check if no file is indexed.
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Bounding box covering all indexed tiles.
    pub fn total_bounds(&self) -> Option<TileBounds> {
        self.paths.keys().map(TileKey::bounds).reduce(|a, b| TileBounds {
            min_lat: a.min_lat.min(b.min_lat),
            max_lat: a.max_lat.max(b.max_lat),
            min_lon: a.min_lon.min(b.min_lon),
            max_lon: a.max_lon.max(b.max_lon),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_key_from_coord() {
        // Seattle is in tile n48w123
        assert_eq!(TileKey::from_coord(47.6062, -122.3321), TileKey { lat: 48, lon: -123 });
        assert_eq!(TileKey::from_coord(47.9999, -122.0001), TileKey { lat: 48, lon: -123 });

        // south and east hemispheres
        assert_eq!(TileKey::from_coord(-0.5, 2.5), TileKey { lat: 0, lon: 2 });
        assert_eq!(TileKey::from_coord(-33.9, 151.2), TileKey { lat: -33, lon: 151 });

        // south and west edges are inclusive
        assert_eq!(TileKey::from_coord(47.0, -123.0), TileKey { lat: 48, lon: -123 });
    }

    #[test]
    fn test_tile_key_from_filename() {
        let key = TileKey::from_filename("USGS_13_n48w123_20240327.tif").unwrap();
        assert_eq!(key, TileKey { lat: 48, lon: -123 });

        let key = TileKey::from_filename("s01e002.tif").unwrap();
        assert_eq!(key, TileKey { lat: -1, lon: 2 });

        let key = TileKey::from_filename("N47W122.TIF").unwrap();
        assert_eq!(key, TileKey { lat: 47, lon: -122 });

        assert!(TileKey::from_filename("invalid.tif").is_none());
        assert!(TileKey::from_filename("usgs_n48.tif").is_none());
    }

    #[test]
    fn test_filename_key_matches_coord_key() {
        let key = TileKey::from_filename("s01e002.tif").unwrap();
        let bounds = key.bounds();
        assert_eq!(bounds, TileBounds { min_lat: -2.0, max_lat: -1.0, min_lon: 2.0, max_lon: 3.0 });
        assert_eq!(TileKey::from_coord(-1.5, 2.5), key);

        let key = TileKey::from_filename("n48w123.tif").unwrap();
        assert_eq!(key.bounds().min_lon, -123.0);
        assert_eq!(key.bounds().max_lon, -122.0);
    }

    #[test]
    fn test_bounds_contains() {
        let bounds = TileKey { lat: 48, lon: -123 }.bounds();
        assert!(bounds.contains(47.5, -122.5));
        assert!(bounds.contains(47.0, -123.0));
        assert!(bounds.contains(48.0, -122.0));
        assert!(!bounds.contains(46.5, -122.5));
        assert!(!bounds.contains(48.5, -122.5));
        assert!(!bounds.contains(47.5, -121.5));
        assert!(!bounds.contains(47.5, -123.5));
    }

    #[test]
    fn test_index_add_file() {
        let mut index = TileIndex::new();
        assert!(index.is_empty());
        assert!(index.total_bounds().is_none());

        index.add_file("/data/n48w123.tif").unwrap();
        index.add_file("/data/n47w122.tif").unwrap();
        assert!(matches!(index.add_file("/data/readme.txt"), Err(GeoTiffError::InvalidFilename(_))));
        assert_eq!(index.len(), 2);

        let (key, path) = index.path_for(47.5, -122.5).unwrap();
        assert_eq!(key, TileKey { lat: 48, lon: -123 });
        assert_eq!(path, Path::new("/data/n48w123.tif"));
        assert!(index.path_for(10.0, 10.0).is_none());

        let bounds = index.total_bounds().unwrap();
        assert_eq!(bounds, TileBounds { min_lat: 46.0, max_lat: 48.0, min_lon: -123.0, max_lon: -121.0 });
    }
}
