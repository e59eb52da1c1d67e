//! GeoTIFF container parsing.
//!
//! Reads just enough of a GeoTIFF to serve tiles from it: the image chain
//! (full resolution first, overviews after), the georeference tags, the GDAL
//! nodata value, and the sample data of any one image.
//!
//! The parsed file keeps its raw bytes; every band read creates a fresh
//! decoder over them, so reads of different images never share decoder
//! state and can run on different threads.

use std::io::Cursor;

use bytes::Bytes;
use thiserror::Error;
use tiff::decoder::ifd::Value;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::tags::Tag;
use tiff::TiffError;
use tracing::{debug, warn};

use crate::coord::BoundingBox;
use crate::georef::{GeoReference, MERCATOR_CODE};

/// `GTModelTypeGeoKey`
pub const KEY_MODEL_TYPE: u16 = 1024;
/// `GeographicTypeGeoKey`
pub const KEY_GEOGRAPHIC_TYPE: u16 = 2048;
/// `ProjectedCSTypeGeoKey`
pub const KEY_PROJECTED_TYPE: u16 = 3072;

const MODEL_PROJECTED: u16 = 1;
const MODEL_GEOGRAPHIC: u16 = 2;

/// `NewSubfileType` bit marking a transparency mask.
const SUBFILE_MASK: u32 = 0x4;

/// Errors raised while reading a GeoTIFF.
#[derive(Debug, Error)]
pub enum GeoTiffError {
    #[error("TIFF error: {0}")]
    Tiff(#[from] TiffError),

    #[error("Missing georeference: {0}")]
    MissingGeoReference(String),

    #[error("Image {index} does not exist (file has {count})")]
    ImageIndex { index: usize, count: usize },

    #[error("Sample count {samples} is not a multiple of {pixels} pixels")]
    SampleCount { samples: usize, pixels: usize },
}

/// GeoKeys relevant to CRS selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GeoKeys {
    pub model_type: Option<u16>,
    pub geographic_type: Option<u16>,
    pub projected_type: Option<u16>,
}

impl GeoKeys {
    /// Parse a `GeoKeyDirectoryTag` value.
    ///
    /// Only keys stored inline (tag location 0) are read; the three keys
    /// used here are always SHORT values.
    pub fn parse(directory: &[u64]) -> Option<Self> {
        if directory.len() < 4 {
            return None;
        }
        let count = directory[3] as usize;
        let mut keys = GeoKeys::default();
        for entry in directory[4..].chunks_exact(4).take(count) {
            let (key, location, value) = (entry[0], entry[1], entry[3]);
            if location != 0 {
                continue;
            }
            let value = u16::try_from(value).ok();
            match u16::try_from(key) {
                Ok(KEY_MODEL_TYPE) => keys.model_type = value,
                Ok(KEY_GEOGRAPHIC_TYPE) => keys.geographic_type = value,
                Ok(KEY_PROJECTED_TYPE) => keys.projected_type = value,
                _ => {}
            }
        }
        Some(keys)
    }

    /// EPSG code of the declared CRS.
    ///
    /// The model type picks the key to read. Without one, a mercator
    /// projected key wins, then the geographic key, then any projected key.
    pub fn declared_crs(&self) -> Option<u32> {
        let code = match self.model_type {
            Some(MODEL_PROJECTED) => self.projected_type,
            Some(MODEL_GEOGRAPHIC) => self.geographic_type,
            _ => {
                if self.projected_type == Some(MERCATOR_CODE as u16) {
                    self.projected_type
                } else {
                    self.geographic_type.or(self.projected_type)
                }
            }
        };
        code.map(u32::from)
    }
}

/// One readable image in the IFD chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    /// Position in the IFD chain, masks included.
    pub ifd: usize,
    pub width: u32,
    pub height: u32,
}

/// Pixel-interleaved samples of one image, converted to `f32`.
#[derive(Debug, Clone)]
pub struct RasterBands {
    pub width: u32,
    pub height: u32,
    pub band_count: usize,
    samples: Vec<f32>,
}

impl RasterBands {
    /// Build from interleaved samples.
    ///
    /// # Errors
    ///
    /// `SampleCount` when `samples` is not a whole number of pixels.
    pub fn new(width: u32, height: u32, samples: Vec<f32>) -> Result<Self, GeoTiffError> {
        let pixels = width as usize * height as usize;
        if pixels == 0 || samples.is_empty() || samples.len() % pixels != 0 {
            return Err(GeoTiffError::SampleCount {
                samples: samples.len(),
                pixels,
            });
        }
        Ok(Self {
            width,
            height,
            band_count: samples.len() / pixels,
            samples,
        })
    }

    /// Band values of the pixel at `index` (row-major).
    #[inline]
    pub fn pixel(&self, index: usize) -> &[f32] {
        let start = index * self.band_count;
        &self.samples[start..start + self.band_count]
    }

    /// Band values of one row, pixel-interleaved.
    pub fn row(&self, y: u32) -> &[f32] {
        let stride = self.width as usize * self.band_count;
        let start = y as usize * stride;
        &self.samples[start..start + stride]
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }
}

/// A parsed GeoTIFF.
#[derive(Debug, Clone)]
pub struct GeoTiff {
    data: Bytes,
    images: Vec<ImageInfo>,
    band_count: usize,
    geo_keys: Option<GeoKeys>,
    bounding_box: Option<BoundingBox>,
    nodata: Option<f64>,
}

impl GeoTiff {
    /// Parse the header, first image and image chain of a GeoTIFF.
    ///
    /// A failure while walking the overview chain is not fatal: the file is
    /// then treated as a single full-resolution image.
    pub fn parse(data: Bytes) -> Result<Self, GeoTiffError> {
        let mut decoder = open(&data)?;

        let (width, height) = decoder.dimensions()?;
        let band_count = match decoder.find_tag(Tag::SamplesPerPixel)? {
            Some(value) => value.into_u16()? as usize,
            None => 1,
        };

        let geo_keys = match decoder.find_tag(Tag::GeoKeyDirectoryTag)? {
            Some(value) => GeoKeys::parse(&value.into_u64_vec()?),
            None => None,
        };
        let bounding_box = read_bounding_box(&mut decoder, width, height)?;
        let nodata = decoder.find_tag(Tag::GdalNodata)?.and_then(parse_nodata);

        let first = ImageInfo {
            ifd: 0,
            width,
            height,
        };
        let images = match scan_overviews(&mut decoder, first) {
            Ok(images) => images,
            Err(e) => {
                warn!(error = %e, "Failed to count overviews, using full resolution only");
                vec![first]
            }
        };

        debug!(
            width,
            height,
            images = images.len(),
            bands = band_count,
            "Parsed GeoTIFF"
        );

        Ok(Self {
            data,
            images,
            band_count,
            geo_keys,
            bounding_box,
            nodata,
        })
    }

    /// Width of the full-resolution image.
    pub fn width(&self) -> u32 {
        self.images[0].width
    }

    /// Height of the full-resolution image.
    pub fn height(&self) -> u32 {
        self.images[0].height
    }

    /// Readable images, full resolution first. Never empty.
    pub fn images(&self) -> &[ImageInfo] {
        &self.images
    }

    /// Number of readable images, full resolution included.
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Index of the smallest image, the last one in the chain.
    pub fn coarsest_image_index(&self) -> usize {
        self.images.len() - 1
    }

    pub fn band_count(&self) -> usize {
        self.band_count
    }

    pub fn geo_keys(&self) -> Option<GeoKeys> {
        self.geo_keys
    }

    /// Declared bounding box, from the tiepoint/scale pair or the
    /// transformation matrix.
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        self.bounding_box
    }

    pub fn nodata(&self) -> Option<f64> {
        self.nodata
    }

    /// Declared bounds and CRS.
    ///
    /// # Errors
    ///
    /// `MissingGeoReference` when the geo keys, the CRS key or the bounding
    /// box tags are absent.
    pub fn georeference(&self) -> Result<GeoReference, GeoTiffError> {
        let keys = self
            .geo_keys
            .ok_or_else(|| GeoTiffError::MissingGeoReference("no GeoKeyDirectory".into()))?;
        let crs = keys
            .declared_crs()
            .ok_or_else(|| GeoTiffError::MissingGeoReference("no CRS geo key".into()))?;
        let bounds = self.bounding_box.ok_or_else(|| {
            GeoTiffError::MissingGeoReference("no tiepoint or transformation".into())
        })?;
        Ok(GeoReference { bounds, crs })
    }

    /// Decode all samples of image `index` (see [`images`](Self::images)).
    ///
    /// Samples equal to the nodata value become NaN.
    pub fn read_bands(&self, index: usize) -> Result<RasterBands, GeoTiffError> {
        let info = *self
            .images
            .get(index)
            .ok_or(GeoTiffError::ImageIndex {
                index,
                count: self.images.len(),
            })?;

        let mut decoder = open(&self.data)?;
        for _ in 0..info.ifd {
            decoder.next_image()?;
        }

        let mut samples = into_f32(decoder.read_image()?);
        if let Some(nodata) = self.nodata {
            let nodata = nodata as f32;
            for value in samples.iter_mut().filter(|v| **v == nodata) {
                *value = f32::NAN;
            }
        }

        debug!(
            image = index,
            width = info.width,
            height = info.height,
            "Decoded image samples"
        );
        RasterBands::new(info.width, info.height, samples)
    }
}

fn open(data: &Bytes) -> Result<Decoder<Cursor<Bytes>>, TiffError> {
    Ok(Decoder::new(Cursor::new(data.clone()))?.with_limits(Limits::unlimited()))
}

fn scan_overviews(
    decoder: &mut Decoder<Cursor<Bytes>>,
    first: ImageInfo,
) -> Result<Vec<ImageInfo>, TiffError> {
    let mut images = vec![first];
    let mut ifd = 0;
    while decoder.more_images() {
        decoder.next_image()?;
        ifd += 1;

        let subfile = match decoder.find_tag(Tag::NewSubfileType)? {
            Some(value) => value.into_u32()?,
            None => 0,
        };
        if subfile & SUBFILE_MASK != 0 {
            continue;
        }
        let (width, height) = decoder.dimensions()?;
        images.push(ImageInfo { ifd, width, height });
    }
    Ok(images)
}

fn read_bounding_box(
    decoder: &mut Decoder<Cursor<Bytes>>,
    width: u32,
    height: u32,
) -> Result<Option<BoundingBox>, TiffError> {
    let (origin, resolution) =
        if let Some(value) = decoder.find_tag(Tag::ModelTransformationTag)? {
            let m = value.into_f64_vec()?;
            if m.len() < 8 {
                return Ok(None);
            }
            ((m[3], m[7]), (m[0], m[5]))
        } else {
            let tiepoint = match decoder.find_tag(Tag::ModelTiepointTag)? {
                Some(value) => value.into_f64_vec()?,
                None => return Ok(None),
            };
            let scale = match decoder.find_tag(Tag::ModelPixelScaleTag)? {
                Some(value) => value.into_f64_vec()?,
                None => return Ok(None),
            };
            if tiepoint.len() < 6 || scale.len() < 2 {
                return Ok(None);
            }
            let (sx, sy) = (scale[0], -scale[1]);
            // Tiepoint raster position (i, j) back to the (0, 0) corner.
            let origin = (tiepoint[3] - tiepoint[0] * sx, tiepoint[4] - tiepoint[1] * sy);
            (origin, (sx, sy))
        };

    let far = (
        origin.0 + resolution.0 * f64::from(width),
        origin.1 + resolution.1 * f64::from(height),
    );
    Ok(BoundingBox::enclosing([origin, far]))
}

fn parse_nodata(value: Value) -> Option<f64> {
    match value {
        Value::Ascii(text) => text.trim_matches(|c: char| c == '\0' || c.is_whitespace()).parse().ok(),
        other => other.into_f64().ok(),
    }
}

fn into_f32(result: DecodingResult) -> Vec<f32> {
    match result {
        DecodingResult::U8(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U32(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::U64(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::I8(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I32(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::I64(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::F32(v) => v,
        DecodingResult::F64(v) => v.into_iter().map(|x| x as f32).collect(),
    }
}
