use serde::{Deserialize, Serialize};

use crate::shared::constants::{DEFAULT_DISTANCE_A, DEFAULT_DISTANCE_B};

/// Calibration curve mapping a bounding-box pixel area to a distance.
///
/// Must be monotonically decreasing: larger boxes mean closer people.
pub trait DistanceModel: Send {
    fn distance(&self, area_px: f64) -> f64;
}

impl<F> DistanceModel for F
where
    F: Fn(f64) -> f64 + Send,
{
    fn distance(&self, area_px: f64) -> f64 {
        self(area_px)
    }
}

/// `distance = a * area^b`, fitted from measured face areas.
///
/// Zero area maps to infinity, so empty boxes never count as near.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PowerLawDistance {
    pub a: f64,
    pub b: f64,
}

impl PowerLawDistance {
    pub fn new(a: f64, b: f64) -> Self {
        Self { a, b }
    }

    /// Decreasing curves need a positive scale and a negative exponent.
    pub fn is_monotonic_decreasing(&self) -> bool {
        self.a.is_finite() && self.b.is_finite() && self.a > 0.0 && self.b < 0.0
    }
}

impl Default for PowerLawDistance {
    fn default() -> Self {
        Self::new(DEFAULT_DISTANCE_A, DEFAULT_DISTANCE_B)
    }
}

impl DistanceModel for PowerLawDistance {
    fn distance(&self, area_px: f64) -> f64 {
        self.a * area_px.max(0.0).powf(self.b)
    }
}
