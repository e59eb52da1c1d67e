//! Layer configuration.
//!
//! [`LayerConfig`] carries every setting a [`TifLayer`](crate::layer::TifLayer)
//! needs. It can be built in code with the `with_*` setters or loaded from an
//! INI file with [`ConfigFile::load`]:
//!
//! ```ini
//! [layer]
//! source_url = https://example.com/wind.tif
//! tile_size = 512
//! quality = 0.6
//! ignore_transparent_color = true
//! transparent_color = rgb(0, 0, 0)
//! output_format = png
//! resampling = bilinear
//! decode_threads = 0
//!
//! [ramp]
//! file = wind-ramp.json
//! ratio = 1.0
//! ```

use std::path::{Path, PathBuf};

use ini::Ini;
use thiserror::Error;

use crate::color::{ColorError, ColorRamp, Rgb};
use crate::decode::DecodeOptions;
use crate::tile::{Resampling, TileFormat, DEFAULT_TILE_SIZE};

// ==================== Defaults ====================

/// Default tile encoding quality (0.0–1.0).
pub const DEFAULT_QUALITY: f32 = 0.6;

/// Largest accepted tile edge in pixels.
pub const MAX_TILE_SIZE: u32 = 4096;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {message}")]
    Read { path: PathBuf, message: String },

    #[error("Invalid value for {section}.{key}: {message}")]
    InvalidValue {
        section: String,
        key: String,
        message: String,
    },

    #[error("Failed to read ramp file {path}: {source}")]
    RampFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid ramp: {0}")]
    Ramp(#[from] ColorError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Settings for one layer.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerConfig {
    /// URL or path of the GeoTIFF to display.
    ///
    /// Default: none; set later with `TifLayer::set_source_url`.
    pub source_url: Option<String>,

    /// Edge length of produced tiles in pixels.
    ///
    /// Default: 512.
    pub tile_size: u32,

    /// Encoding quality for lossy tile formats (0.0–1.0).
    ///
    /// Default: 0.6.
    pub quality: f32,

    /// Render pixels of `transparent_color` fully transparent.
    ///
    /// Default: false.
    pub ignore_transparent_color: bool,

    /// Sentinel color dropped when `ignore_transparent_color` is set.
    ///
    /// Default: black.
    pub transparent_color: Rgb,

    /// Tile encoding.
    ///
    /// Default: PNG.
    pub output_format: TileFormat,

    /// Sampling used when scaling the surface into tiles.
    ///
    /// Default: bilinear.
    pub resampling: Resampling,

    /// Worker threads for decode and extraction; 0 uses all CPUs.
    ///
    /// Default: 0.
    pub decode_threads: usize,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            source_url: None,
            tile_size: DEFAULT_TILE_SIZE,
            quality: DEFAULT_QUALITY,
            ignore_transparent_color: false,
            transparent_color: Rgb::BLACK,
            output_format: TileFormat::Png,
            resampling: Resampling::Bilinear,
            decode_threads: 0,
        }
    }
}

impl LayerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }

    pub fn with_tile_size(mut self, size: u32) -> Self {
        self.tile_size = size;
        self
    }

    pub fn with_quality(mut self, quality: f32) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_ignore_transparent_color(mut self, ignore: bool) -> Self {
        self.ignore_transparent_color = ignore;
        self
    }

    pub fn with_transparent_color(mut self, color: Rgb) -> Self {
        self.transparent_color = color;
        self
    }

    pub fn with_output_format(mut self, format: TileFormat) -> Self {
        self.output_format = format;
        self
    }

    pub fn with_resampling(mut self, resampling: Resampling) -> Self {
        self.resampling = resampling;
        self
    }

    pub fn with_decode_threads(mut self, threads: usize) -> Self {
        self.decode_threads = threads;
        self
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tile_size == 0 || self.tile_size > MAX_TILE_SIZE {
            return Err(ConfigError::Invalid(format!(
                "tile_size must be between 1 and {}, got {}",
                MAX_TILE_SIZE, self.tile_size
            )));
        }
        if !(0.0..=1.0).contains(&self.quality) {
            return Err(ConfigError::Invalid(format!(
                "quality must be between 0.0 and 1.0, got {}",
                self.quality
            )));
        }
        Ok(())
    }

    /// Decode settings derived from this configuration.
    pub fn decode_options(&self) -> DecodeOptions {
        DecodeOptions {
            ignore_transparent_color: self.ignore_transparent_color,
            transparent_color: self.transparent_color,
        }
    }
}

/// Color ramp settings from the `[ramp]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct RampConfig {
    /// JSON ramp file, relative paths resolved against the config file.
    pub file: PathBuf,
    pub ratio: Option<f64>,
}

impl RampConfig {
    /// Read and parse the ramp file.
    pub fn load_ramp(&self) -> Result<ColorRamp, ConfigError> {
        let json = std::fs::read_to_string(&self.file).map_err(|source| ConfigError::RampFile {
            path: self.file.clone(),
            source,
        })?;
        let ramp = ColorRamp::from_json(&json)?;
        Ok(match self.ratio {
            Some(ratio) => ramp.with_ratio(ratio),
            None => ramp,
        })
    }
}

/// A parsed configuration file.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    pub layer: LayerConfig,
    pub ramp: Option<RampConfig>,
}

impl ConfigFile {
    /// Load and validate an INI configuration file.
    ///
    /// Missing keys keep their defaults; unknown keys are ignored.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let ini = Ini::load_from_file(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_ini(&ini, base)
    }

    /// Parse configuration from INI text; relative ramp paths resolve
    /// against `base`.
    pub fn parse(text: &str, base: &Path) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text).map_err(|e| ConfigError::Read {
            path: PathBuf::from("<string>"),
            message: e.to_string(),
        })?;
        Self::from_ini(&ini, base)
    }

    fn from_ini(ini: &Ini, base: &Path) -> Result<Self, ConfigError> {
        let mut layer = LayerConfig::default();

        if let Some(section) = ini.section(Some("layer")) {
            let get = |key: &str| section.get(key).map(str::trim).filter(|v| !v.is_empty());

            if let Some(url) = get("source_url") {
                layer.source_url = Some(url.to_string());
            }
            if let Some(v) = get("tile_size") {
                layer.tile_size = parse_value("layer", "tile_size", v)?;
            }
            if let Some(v) = get("quality") {
                layer.quality = parse_value("layer", "quality", v)?;
            }
            if let Some(v) = get("ignore_transparent_color") {
                layer.ignore_transparent_color = parse_value("layer", "ignore_transparent_color", v)?;
            }
            if let Some(v) = get("transparent_color") {
                layer.transparent_color = parse_value("layer", "transparent_color", v)?;
            }
            if let Some(v) = get("output_format") {
                layer.output_format = parse_value("layer", "output_format", v)?;
            }
            if let Some(v) = get("resampling") {
                layer.resampling = parse_value("layer", "resampling", v)?;
            }
            if let Some(v) = get("decode_threads") {
                layer.decode_threads = parse_value("layer", "decode_threads", v)?;
            }
        }
        layer.validate()?;

        let ramp = match ini.section(Some("ramp")) {
            Some(section) => match section.get("file").map(str::trim) {
                Some(file) if !file.is_empty() => {
                    let ratio = match section.get("ratio").map(str::trim) {
                        Some(v) if !v.is_empty() => Some(parse_value("ramp", "ratio", v)?),
                        _ => None,
                    };
                    Some(RampConfig {
                        file: base.join(file),
                        ratio,
                    })
                }
                _ => None,
            },
            None => None,
        };

        Ok(Self { layer, ramp })
    }
}

fn parse_value<T>(section: &str, key: &str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        message: format!("'{}': {}", value, e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LayerConfig::default();
        assert_eq!(config.tile_size, 512);
        assert_eq!(config.quality, 0.6);
        assert!(!config.ignore_transparent_color);
        assert_eq!(config.transparent_color, Rgb::BLACK);
        assert_eq!(config.output_format, TileFormat::Png);
        assert_eq!(config.resampling, Resampling::Bilinear);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_setters() {
        let config = LayerConfig::new()
            .with_source_url("a.tif")
            .with_tile_size(256)
            .with_quality(0.9)
            .with_ignore_transparent_color(true)
            .with_output_format(TileFormat::Jpeg)
            .with_resampling(Resampling::Nearest)
            .with_decode_threads(2);
        assert_eq!(config.source_url.as_deref(), Some("a.tif"));
        assert_eq!(config.tile_size, 256);
        assert_eq!(config.output_format, TileFormat::Jpeg);
        assert_eq!(config.decode_threads, 2);
    }

    #[test]
    fn test_validate_ranges() {
        assert!(LayerConfig::new().with_tile_size(0).validate().is_err());
        assert!(LayerConfig::new().with_tile_size(8192).validate().is_err());
        assert!(LayerConfig::new().with_quality(1.5).validate().is_err());
        assert!(LayerConfig::new().with_quality(f32::NAN).validate().is_err());
    }

    #[test]
    fn test_parse_full_file() {
        let text = "\
[layer]
source_url = https://example.com/wind.tif
tile_size = 256
quality = 0.8
ignore_transparent_color = true
transparent_color = #ff0000
output_format = jpeg
resampling = nearest
decode_threads = 3

[ramp]
file = ramps/wind.json
ratio = 10
";
        let config = ConfigFile::parse(text, Path::new("/etc/tiflayer")).unwrap();
        let layer = &config.layer;
        assert_eq!(layer.source_url.as_deref(), Some("https://example.com/wind.tif"));
        assert_eq!(layer.tile_size, 256);
        assert_eq!(layer.quality, 0.8);
        assert!(layer.ignore_transparent_color);
        assert_eq!(layer.transparent_color, Rgb::new(255, 0, 0));
        assert_eq!(layer.output_format, TileFormat::Jpeg);
        assert_eq!(layer.resampling, Resampling::Nearest);
        assert_eq!(layer.decode_threads, 3);

        let ramp = config.ramp.unwrap();
        assert_eq!(ramp.file, PathBuf::from("/etc/tiflayer/ramps/wind.json"));
        assert_eq!(ramp.ratio, Some(10.0));
    }

    #[test]
    fn test_parse_empty_uses_defaults() {
        let config = ConfigFile::parse("", Path::new(".")).unwrap();
        assert_eq!(config.layer, LayerConfig::default());
        assert!(config.ramp.is_none());
    }

    #[test]
    fn test_parse_invalid_value() {
        let err = ConfigFile::parse("[layer]\ntile_size = big\n", Path::new(".")).unwrap_err();
        match err {
            ConfigError::InvalidValue { section, key, .. } => {
                assert_eq!(section, "layer");
                assert_eq!(key, "tile_size");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_parse_out_of_range_value() {
        let err = ConfigFile::parse("[layer]\nquality = 7\n", Path::new(".")).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_load_from_file_with_ramp() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("ramp.json"),
            r#"[[0, "rgb(0, 0, 255)"], [10, "rgb(255, 0, 0)"]]"#,
        )
        .unwrap();
        let config_path = dir.path().join("layer.ini");
        std::fs::write(&config_path, "[layer]\nsource_url = a.tif\n[ramp]\nfile = ramp.json\n").unwrap();

        let config = ConfigFile::load(&config_path).unwrap();
        assert_eq!(config.layer.source_url.as_deref(), Some("a.tif"));
        let ramp = config.ramp.unwrap().load_ramp().unwrap();
        assert_eq!(ramp.lookup(9.0), Some(Rgb::new(255, 0, 0)));
    }

    #[test]
    fn test_load_missing_file() {
        let result = ConfigFile::load("/nonexistent/tiflayer.ini");
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_missing_ramp_file() {
        let ramp = RampConfig {
            file: PathBuf::from("/nonexistent/ramp.json"),
            ratio: None,
        };
        assert!(matches!(ramp.load_ramp(), Err(ConfigError::RampFile { .. })));
    }
}
