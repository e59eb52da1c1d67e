//! Band-to-color mapping.
//!
//! A [`ColorMapper`] turns the per-pixel band values of a raster into an
//! RGB color. Mappers are pure and `Send + Sync`, so the decoder can call
//! them from many worker threads without synchronization.
//!
//! ```text
//! bands[pixel] ──► ColorMapper::map ──► Some(Rgb)  -> opaque pixel
//!                                  └──► None       -> transparent [0, 0, 0, 0]
//! ```
//!
//! # Available Mappers
//!
//! - [`ColorRamp`] - scalar rasters through a breakpoint table
//! - [`VectorMagnitude`] - two-band `(u, v)` rasters by vector length
//! - [`PassthroughMapper`] - gray, gray+alpha, RGB and RGBA 8-bit imagery

mod ramp;
mod rgb;

pub use ramp::ColorRamp;
pub use rgb::Rgb;

use thiserror::Error;

/// Errors raised while building color mappers.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ColorError {
    #[error("Color ramp has no breakpoints")]
    EmptyRamp,

    #[error("Breakpoint {index} is not a number")]
    InvalidBreakpoint { index: usize },

    #[error("Breakpoint {index} is smaller than the one before it")]
    UnsortedBreakpoints { index: usize },

    #[error("Invalid color '{0}'")]
    InvalidColor(String),

    #[error("Invalid ramp JSON: {0}")]
    Json(String),
}

/// Maps one pixel's band values to a color.
///
/// `sample` holds one value per band, in band order. Returning `None`
/// marks the pixel as unmapped; it is rendered fully transparent.
pub trait ColorMapper: Send + Sync {
    fn map(&self, sample: &[f32]) -> Option<Rgb>;
}

/// Two-band vector rasters (e.g. wind `u`/`v`) colored by magnitude.
///
/// Any NaN component leaves the pixel unmapped.
#[derive(Debug, Clone)]
pub struct VectorMagnitude<M = ColorRamp> {
    inner: M,
}

impl<M: ColorMapper> VectorMagnitude<M> {
    pub fn new(inner: M) -> Self {
        Self { inner }
    }
}

impl<M: ColorMapper> ColorMapper for VectorMagnitude<M> {
    fn map(&self, sample: &[f32]) -> Option<Rgb> {
        match sample {
            [u, v, ..] if !u.is_nan() && !v.is_nan() => {
                let speed = (u * u + v * v).sqrt();
                self.inner.map(&[speed])
            }
            _ => None,
        }
    }
}

/// Direct color for 8-bit imagery.
///
/// One band is gray, two are gray+alpha, three are RGB and four are RGBA.
/// Any zero alpha leaves the pixel unmapped; other alpha values are treated
/// as opaque.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughMapper;

#[inline]
fn channel(value: f32) -> u8 {
    value.clamp(0.0, 255.0).round() as u8
}

impl ColorMapper for PassthroughMapper {
    fn map(&self, sample: &[f32]) -> Option<Rgb> {
        if sample.iter().any(|v| v.is_nan()) {
            return None;
        }
        match *sample {
            [gray] => Some(Rgb([channel(gray); 3])),
            [gray, alpha] if alpha > 0.0 => Some(Rgb([channel(gray); 3])),
            [r, g, b] => Some(Rgb([channel(r), channel(g), channel(b)])),
            [r, g, b, alpha, ..] if alpha > 0.0 => {
                Some(Rgb([channel(r), channel(g), channel(b)]))
            }
            _ => None,
        }
    }
}
