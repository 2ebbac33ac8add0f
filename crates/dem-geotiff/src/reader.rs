//! GeoTIFF elevation raster decoding.

use crate::index::{TileBounds, TileKey};
use crate::{GeoTiffError, Result};
use dem_raster::UpdatableTile;
use std::io::{Read, Seek};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::tags::Tag;
use tiff::ColorType;
use tracing::{trace, warn};

/// GeoTIFF ModelPixelScale tag.
pub const MODEL_PIXEL_SCALE: u16 = 33550;
/// GeoTIFF ModelTiepoint tag.
pub const MODEL_TIEPOINT: u16 = 33922;
/// GDAL no-data tag, stored as an ASCII string.
pub const GDAL_NODATA: u16 = 42113;

/// No-data value assumed when the file does not declare one.
pub const DEFAULT_NODATA: f32 = -999_999.0;

/// A decoded single-band elevation raster.
///
/// Pixels are areas: the bounds are the outer edges of the raster, and each
/// sample stands for the center of its pixel.
#[derive(Debug, Clone)]
pub struct GeoTiffRaster {
    /// Elevations in row-major order, north to south, west to east.
    data: Vec<f32>,
    width: usize,
    height: usize,
    bounds: TileBounds,
    no_data_value: f32,
}

fn tag(code: u16) -> Tag {
    Tag::from_u16_exhaustive(code)
}

impl GeoTiffRaster {
    /// Decode a GeoTIFF file.
    ///
    /// Bounds are read from the ModelTiepoint and ModelPixelScale tags, or
    /// from the tile key in the filename when these tags are missing.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)?;
        let mut decoder = Decoder::new(file)?;

        // 1/3 arc-second tiles are 10812 x 10812 f32 pixels
        let mut limits = Limits::default();
        limits.decoding_buffer_size = 1024 * 1024 * 1024;
        limits.intermediate_buffer_size = 1024 * 1024 * 1024;
        limits.ifd_value_size = 1024 * 1024 * 1024;
        decoder = decoder.with_limits(limits);

        match decoder.colortype()? {
            ColorType::Gray(_) => {}
            other => return Err(GeoTiffError::UnsupportedDataType(format!("{:?}", other))),
        }

        let (width, height) = decoder.dimensions()?;
        let (width, height) = (width as usize, height as usize);
        let bounds = match Self::read_geotransform(&mut decoder, width, height)? {
            Some(bounds) => bounds,
            None => Self::bounds_from_filename(path)?,
        };
        let no_data_value = Self::read_nodata_value(&mut decoder);
        let data = Self::decode_elevation_data(&mut decoder)?;
        if data.len() != width * height {
            return Err(GeoTiffError::InvalidGeoTiff(format!(
                "{} samples for a {}x{} raster",
                data.len(),
                width,
                height
            )));
        }

        trace!(
            "GeoTiffRaster: decoded {}x{} samples from {}",
            width,
            height,
            path.display()
        );
        Ok(Self {
            data,
            width,
            height,
            bounds,
            no_data_value,
        })
    }

    /// Bounds from the tiepoint of the north-west corner and the pixel size.
    fn read_geotransform<R: Read + Seek>(
        decoder: &mut Decoder<R>,
        width: usize,
        height: usize,
    ) -> Result<Option<TileBounds>> {
        let tiepoint = decoder.find_tag(tag(MODEL_TIEPOINT))?;
        let scale = decoder.find_tag(tag(MODEL_PIXEL_SCALE))?;
        let (Some(tiepoint), Some(scale)) = (tiepoint, scale) else {
            return Ok(None);
        };
        let tiepoint = tiepoint.into_f64_vec()?;
        let scale = scale.into_f64_vec()?;
        if tiepoint.len() < 6 || scale.len() < 2 {
            return Err(GeoTiffError::InvalidGeoTiff(format!(
                "tiepoint has {} values and pixel scale {}",
                tiepoint.len(),
                scale.len()
            )));
        }
        if !(scale[0] > 0.0 && scale[1] > 0.0) {
            return Err(GeoTiffError::InvalidGeoTiff(format!(
                "non positive pixel scale ({}, {})",
                scale[0], scale[1]
            )));
        }

        // tiepoint is [i, j, k, x, y, z], raster (i, j) at geographic (x, y)
        let min_lon = tiepoint[3] - tiepoint[0] * scale[0];
        let max_lat = tiepoint[4] + tiepoint[1] * scale[1];
        Ok(Some(TileBounds {
            min_lat: max_lat - height as f64 * scale[1],
            max_lat,
            min_lon,
            max_lon: min_lon + width as f64 * scale[0],
        }))
    }

    fn bounds_from_filename(path: &Path) -> Result<TileBounds> {
        let filename = path
            .file_name()
            .and_then(|s| s.to_str())
            .ok_or_else(|| GeoTiffError::InvalidFilename(path.display().to_string()))?;
        TileKey::from_filename(filename)
            .map(|key| key.bounds())
            .ok_or_else(|| GeoTiffError::InvalidFilename(filename.to_string()))
    }

    fn read_nodata_value<R: Read + Seek>(decoder: &mut Decoder<R>) -> f32 {
        decoder
            .get_tag_ascii_string(tag(GDAL_NODATA))
            .ok()
            .and_then(|text| text.trim_matches(|c: char| c == '\0' || c.is_whitespace()).parse().ok())
            .unwrap_or(DEFAULT_NODATA)
    }

    fn decode_elevation_data<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<Vec<f32>> {
        let data = match decoder.read_image()? {
            DecodingResult::F32(data) => data,
            DecodingResult::F64(data) => data.into_iter().map(|v| v as f32).collect(),
            DecodingResult::I16(data) => data.into_iter().map(|v| v as f32).collect(),
            DecodingResult::I32(data) => data.into_iter().map(|v| v as f32).collect(),
            DecodingResult::U16(data) => data.into_iter().map(|v| v as f32).collect(),
            DecodingResult::U32(data) => data.into_iter().map(|v| v as f32).collect(),
            DecodingResult::U8(data) => data.into_iter().map(|v| v as f32).collect(),
            DecodingResult::I8(data) => data.into_iter().map(|v| v as f32).collect(),
            DecodingResult::U64(data) => data.into_iter().map(|v| v as f32).collect(),
            DecodingResult::I64(data) => data.into_iter().map(|v| v as f32).collect(),
        };
        Ok(data)
    }

    /// Outer edges of the raster, in degrees.
    pub fn bounds(&self) -> TileBounds {
        self.bounds
    }

    /// Raster size in pixels, as (width, height).
    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Pixel size in degrees, as (longitude, latitude).
    pub fn resolution(&self) -> (f64, f64) {
        (
            (self.bounds.max_lon - self.bounds.min_lon) / self.width as f64,
            (self.bounds.max_lat - self.bounds.min_lat) / self.height as f64,
        )
    }

    /// Value marking missing samples.
    pub fn no_data_value(&self) -> f32 {
        self.no_data_value
    }

    /// Raw sample, row 0 being the northernmost row.
    pub fn pixel(&self, x: usize, y: usize) -> Option<f32> {
        if x < self.width && y < self.height {
            Some(self.data[y * self.width + x])
        } else {
            None
        }
    }

    fn is_no_data(&self, value: f32) -> bool {
        (value - self.no_data_value).abs() < 1.0e-3 || value.is_nan()
    }

    /// Copy the raster into a tile.
    ///
    /// The tile gets one sample per pixel at the pixel center, so its first
    /// sample is half a pixel inside the south-west corner, and its row 0 is
    /// the southernmost raster row. Missing samples are replaced with
    /// `fill_elevation`. Returns the number of replaced samples.
    pub fn fill_tile(&self, tile: &mut dyn UpdatableTile, fill_elevation: f64) -> dem_raster::Result<usize> {
        let (longitude_step, latitude_step) = self.resolution();
        tile.set_geometry(
            (self.bounds.min_lat + 0.5 * latitude_step).to_radians(),
            (self.bounds.min_lon + 0.5 * longitude_step).to_radians(),
            latitude_step.to_radians(),
            longitude_step.to_radians(),
            self.height,
            self.width,
        )?;

        let mut replaced = 0;
        for (y, line) in self.data.chunks_exact(self.width).enumerate() {
            let row = self.height - 1 - y;
            for (column, &value) in line.iter().enumerate() {
                let elevation = if self.is_no_data(value) {
                    replaced += 1;
                    fill_elevation
                } else {
                    value as f64
                };
                tile.set_elevation(row, column, elevation)?;
            }
        }
        if replaced > 0 {
            warn!(
                "GeoTiffRaster: replaced {} no-data samples with {} m in tile at ({}, {})",
                replaced, fill_elevation, self.bounds.max_lat, self.bounds.min_lon
            );
        }
        Ok(replaced)
    }
}
