//! Breakpoint color ramp with nearest-breakpoint lookup.

use serde::Deserialize;

use super::{ColorError, ColorMapper, Rgb};

/// A sorted breakpoint table `[(value, color)]`.
///
/// Lookup snaps to the nearer breakpoint of the containing interval; colors
/// are never interpolated. Ties go to the lower breakpoint.
///
/// # Example
///
/// ```
/// use tiflayer::color::{ColorRamp, Rgb};
///
/// let ramp = ColorRamp::new(vec![
///     (0.0, Rgb::new(0, 0, 255)),
///     (10.0, Rgb::new(0, 255, 0)),
///     (30.0, Rgb::new(255, 0, 0)),
/// ])
/// .unwrap();
///
/// assert_eq!(ramp.lookup(9.0), Some(Rgb::new(0, 255, 0)));
/// assert_eq!(ramp.lookup(-5.0), Some(Rgb::new(0, 0, 255)));
/// assert_eq!(ramp.lookup(f64::NAN), None);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ColorRamp {
    breakpoints: Vec<(f64, Rgb)>,
    ratio: f64,
    filter_values: Vec<f64>,
}

#[derive(Deserialize)]
struct RampEntry(f64, Rgb);

impl ColorRamp {
    /// Build a ramp from breakpoints in ascending value order.
    ///
    /// # Errors
    ///
    /// Fails on an empty table, a NaN breakpoint, or values that decrease.
    pub fn new(breakpoints: Vec<(f64, Rgb)>) -> Result<Self, ColorError> {
        if breakpoints.is_empty() {
            return Err(ColorError::EmptyRamp);
        }
        for (index, (value, _)) in breakpoints.iter().enumerate() {
            if value.is_nan() {
                return Err(ColorError::InvalidBreakpoint { index });
            }
            if index > 0 && *value < breakpoints[index - 1].0 {
                return Err(ColorError::UnsortedBreakpoints { index });
            }
        }
        Ok(Self {
            breakpoints,
            ratio: 1.0,
            filter_values: Vec::new(),
        })
    }

    /// Parse a ramp from JSON of the form `[[0, "rgb(97, 113, 184)"], ...]`.
    pub fn from_json(json: &str) -> Result<Self, ColorError> {
        let entries: Vec<RampEntry> =
            serde_json::from_str(json).map_err(|e| ColorError::Json(e.to_string()))?;
        Self::new(entries.into_iter().map(|RampEntry(v, c)| (v, c)).collect())
    }

    /// Divide every input by `ratio` before lookup.
    ///
    /// Non-finite or zero ratios are ignored.
    pub fn with_ratio(mut self, ratio: f64) -> Self {
        if ratio.is_finite() && ratio != 0.0 {
            self.ratio = ratio;
        }
        self
    }

    /// Sample values that map straight to black, bypassing the table.
    pub fn with_filter_values(mut self, values: Vec<f64>) -> Self {
        self.filter_values = values;
        self
    }

    pub fn breakpoints(&self) -> &[(f64, Rgb)] {
        &self.breakpoints
    }

    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    /// Map a raw sample value to a color; `None` for NaN.
    pub fn lookup(&self, value: f64) -> Option<Rgb> {
        if value.is_nan() {
            return None;
        }
        if self.filter_values.contains(&value) {
            return Some(Rgb::BLACK);
        }

        let num = value / self.ratio;
        let (first_value, first_color) = self.breakpoints[0];
        let (last_value, last_color) = self.breakpoints[self.breakpoints.len() - 1];

        if num < first_value {
            return Some(first_color);
        }
        if num >= last_value {
            return Some(last_color);
        }

        // first_value <= num < last_value, so 1 <= upper <= len - 1
        let upper = self.breakpoints.partition_point(|(v, _)| *v <= num);
        let (start_value, start_color) = self.breakpoints[upper - 1];
        let (end_value, end_color) = self.breakpoints[upper];

        if (num - start_value).abs() <= (num - end_value).abs() {
            Some(start_color)
        } else {
            Some(end_color)
        }
    }
}

impl ColorMapper for ColorRamp {
    fn map(&self, sample: &[f32]) -> Option<Rgb> {
        sample.first().and_then(|v| self.lookup(f64::from(*v)))
    }
}
