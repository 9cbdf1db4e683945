//! Shared output types
//!
//! Everything inside the engine is computed in one base unit system; the
//! intensity unit is only attached to the curves and histograms that leave it.

use serde::{Deserialize, Serialize};

/// Unit of the intensity axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntensityUnit {
    /// Brightness temperature in micro-Kelvin.
    #[default]
    MicroKelvin,
    /// Specific intensity in Jy/sr.
    JanskyPerSteradian,
}

impl IntensityUnit {
    /// Short label used in reports.
    pub fn symbol(self) -> &'static str {
        match self {
            Self::MicroKelvin => "uK",
            Self::JanskyPerSteradian => "Jy/sr",
        }
    }
}

/// A probability density sampled on the symmetric intensity grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DensityCurve {
    /// Intensity unit of `t` (the density carries the inverse unit).
    pub unit: IntensityUnit,
    /// Grid points.
    pub t: Vec<f64>,
    /// Density values.
    pub density: Vec<f64>,
    /// Trapezoid integral of the density over the grid.
    pub norm: f64,
}

impl DensityCurve {
    /// First moment `Σ T P(T) dT` on the grid (trapezoid rule).
    pub fn mean(&self) -> f64 {
        let mut acc = 0.0;
        for i in 1..self.t.len() {
            let dt = self.t[i] - self.t[i - 1];
            acc += 0.5 * dt * (self.t[i] * self.density[i] + self.t[i - 1] * self.density[i - 1]);
        }
        acc
    }
}

/// Binned intensity distribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinnedVid {
    /// Intensity unit of edges and centers.
    pub unit: IntensityUnit,
    /// Bin edges (`n + 1` values, increasing).
    pub edges: Vec<f64>,
    /// Arithmetic bin centers.
    pub centers: Vec<f64>,
    /// Probability of a voxel falling in each bin.
    pub probabilities: Vec<f64>,
}

impl BinnedVid {
    /// Total probability captured by the bins.
    pub fn total(&self) -> f64 {
        self.probabilities.iter().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_serde_roundtrip() {
        let json = serde_json::to_string(&IntensityUnit::JanskyPerSteradian).unwrap();
        assert_eq!(json, "\"jansky_per_steradian\"");
        let back: IntensityUnit = serde_json::from_str("\"micro_kelvin\"").unwrap();
        assert_eq!(back, IntensityUnit::MicroKelvin);
    }

    #[test]
    fn test_density_curve_mean() {
        // Uniform density on [0, 2]: mean 1.
        let t: Vec<f64> = (0..=200).map(|i| i as f64 * 0.01).collect();
        let curve = DensityCurve {
            unit: IntensityUnit::MicroKelvin,
            density: vec![0.5; t.len()],
            t,
            norm: 1.0,
        };
        approx::assert_relative_eq!(curve.mean(), 1.0, epsilon = 1e-12);
    }
}
