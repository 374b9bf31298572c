//! Affine interpolation between two numeric ranges.

use crate::config::Interval;
use crate::error::{FlightError, Result};
use serde::{Deserialize, Serialize};

/// Maps `s0 -> d0` and `s1 -> d1` linearly, extrapolating outside `[s0, s1]`.
///
/// Source endpoints may be given in descending order; that is how an axis
/// flip is expressed (see `Trajectory::remap_states`). Inversion swaps the
/// destination endpoints instead.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeMapper {
    s0: f64,
    s1: f64,
    d0: f64,
    d1: f64,
}

impl RangeMapper {
    /// Builds a mapper from source endpoints `(s0, s1)` to destination
    /// endpoints `(d0, d1)`. With `invert`, `s0 -> d1` and `s1 -> d0`.
    ///
    /// Fails with `InvalidConfig` if `s0 == s1`, if any endpoint is not
    /// finite, or if `s1 - s0` overflows.
    pub fn new(source: (f64, f64), destination: (f64, f64), invert: bool) -> Result<Self> {
        let (s0, s1) = source;
        let (d0, d1) = if invert {
            (destination.1, destination.0)
        } else {
            destination
        };

        if ![s0, s1, d0, d1].iter().all(|v| v.is_finite()) {
            return Err(FlightError::config(format!(
                "mapper endpoints must be finite: [{}, {}] -> [{}, {}]",
                s0, s1, d0, d1
            )));
        }
        if s0 == s1 {
            return Err(FlightError::config(format!(
                "mapper source range [{}, {}] is degenerate",
                s0, s1
            )));
        }

        if !(s1 - s0).is_finite() {
            return Err(FlightError::config(format!(
                "mapper source range [{}, {}] is too wide to represent",
                s0, s1
            )));
        }

        Ok(Self { s0, s1, d0, d1 })
    }

    /// Builds a mapper between two intervals, `min -> min` and `max -> max`
    /// unless inverted.
    pub fn from_intervals(source: &Interval, destination: &Interval, invert: bool) -> Result<Self> {
        Self::new(source.endpoints(), destination.endpoints(), invert)
    }

    /// Maps one value.
    ///
    /// Written as a lerp on the normalized position so the endpoints map
    /// exactly.
    pub fn map(&self, value: f64) -> f64 {
        let t = (value - self.s0) / (self.s1 - self.s0);
        self.d0 * (1.0 - t) + self.d1 * t
    }

    /// Source endpoints `(s0, s1)`.
    pub fn source(&self) -> (f64, f64) {
        (self.s0, self.s1)
    }

    /// Destination endpoints after inversion has been applied.
    pub fn destination(&self) -> (f64, f64) {
        (self.d0, self.d1)
    }
}
