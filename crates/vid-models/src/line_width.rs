//! Mass-dependent rotation line width.

use serde::{Deserialize, Serialize};
use vid_core::{Error, Result};

/// Line FWHM `v(M) = v0 (M / M_pivot)^slope` in km/s.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineWidth {
    /// FWHM at the pivot mass, km/s.
    pub v0_kms: f64,
    /// Pivot mass, Msun.
    #[serde(default = "default_pivot")]
    pub m_pivot: f64,
    /// Logarithmic slope.
    #[serde(default = "default_slope")]
    pub slope: f64,
}

fn default_pivot() -> f64 {
    1e12
}

fn default_slope() -> f64 {
    1.0 / 3.0
}

impl LineWidth {
    /// Check the parameters are physical.
    pub fn validate(&self) -> Result<()> {
        if !self.v0_kms.is_finite() || self.v0_kms < 0.0 || self.m_pivot <= 0.0 || !self.slope.is_finite() {
            return Err(Error::Validation(format!("invalid line width {:?}", self)));
        }
        Ok(())
    }

    /// FWHM in km/s.
    pub fn fwhm(&self, mass: f64) -> f64 {
        self.v0_kms * (mass / self.m_pivot).powf(self.slope)
    }

    /// Gaussian-equivalent comoving LOS width in Mpc, `(1+z)/H(z) · v/2.35482`.
    pub fn sigma_mpc(&self, mass: f64, z: f64, hubble_kms_mpc: f64) -> f64 {
        (1.0 + z) / hubble_kms_mpc * self.fwhm(mass) / 2.35482
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_sigma_scaling() {
        let lw = LineWidth { v0_kms: 300.0, m_pivot: 1e12, slope: 1.0 / 3.0 };
        assert_relative_eq!(lw.fwhm(8e12), 600.0, max_relative = 1e-12);
        assert_relative_eq!(lw.sigma_mpc(1e12, 1.0, 200.0), 2.0 / 200.0 * 300.0 / 2.35482, max_relative = 1e-12);
        assert!(LineWidth { v0_kms: -1.0, ..lw }.validate().is_err());
    }
}
