//! Halo bias models.

use vid_core::{Error, HaloBias, Result};

use crate::registry::ModelSpec;

/// Mass-independent bias.
#[derive(Debug, Clone)]
pub struct ConstantBias {
    /// Bias value.
    pub b: f64,
}

impl ConstantBias {
    /// Parameters: `b`.
    pub fn from_spec(spec: &ModelSpec) -> Result<Self> {
        spec.check_keys(&["b"])?;
        Ok(Self { b: spec.param("b")? })
    }
}

impl HaloBias for ConstantBias {
    fn bias(&self, _mass: f64, _z: f64) -> Result<f64> {
        Ok(self.b)
    }

    fn name(&self) -> &str {
        "constant"
    }
}

/// `b(M) = b0 (M / M_pivot)^slope`.
#[derive(Debug, Clone)]
pub struct PowerLawBias {
    /// Bias at the pivot mass.
    pub b0: f64,
    /// Logarithmic slope.
    pub slope: f64,
    /// Pivot mass, Msun.
    pub m_pivot: f64,
}

impl PowerLawBias {
    /// Parameters: `b0`, `slope`, optional `m_pivot` (default 1e12).
    pub fn from_spec(spec: &ModelSpec) -> Result<Self> {
        spec.check_keys(&["b0", "slope", "m_pivot"])?;
        let m_pivot = spec.param_or("m_pivot", 1e12)?;
        if m_pivot <= 0.0 {
            return Err(Error::Validation(format!("power_law bias: m_pivot must be > 0, got {}", m_pivot)));
        }
        Ok(Self { b0: spec.param("b0")?, slope: spec.param("slope")?, m_pivot })
    }
}

impl HaloBias for PowerLawBias {
    fn bias(&self, mass: f64, _z: f64) -> Result<f64> {
        Ok(self.b0 * (mass / self.m_pivot).powf(self.slope))
    }

    fn name(&self) -> &str {
        "power_law"
    }
}

/// Bias sampled at fixed masses, linear in `ln M` and clamped to the end
/// values outside the table.
#[derive(Debug, Clone)]
pub struct TabulatedBias {
    ln_m: Vec<f64>,
    b: Vec<f64>,
}

impl TabulatedBias {
    /// Build from strictly increasing positive masses.
    pub fn new(masses: Vec<f64>, bias: Vec<f64>) -> Result<Self> {
        if masses.len() != bias.len() || masses.len() < 2 {
            return Err(Error::Validation(format!(
                "tabulated bias needs >= 2 matching samples, got {} masses and {} values",
                masses.len(),
                bias.len()
            )));
        }
        if masses.windows(2).any(|w| w[1] <= w[0]) || masses[0] <= 0.0 {
            return Err(Error::Validation("tabulated masses must be positive and strictly increasing".into()));
        }
        if bias.iter().any(|v| !v.is_finite()) {
            return Err(Error::Validation("tabulated bias values must be finite".into()));
        }
        Ok(Self { ln_m: masses.iter().map(|m| m.ln()).collect(), b: bias })
    }
}

impl HaloBias for TabulatedBias {
    fn bias(&self, mass: f64, _z: f64) -> Result<f64> {
        if !(mass > 0.0) {
            return Err(Error::Validation(format!("bias requested at non-positive mass {}", mass)));
        }
        let n = self.ln_m.len();
        let x = mass.ln().clamp(self.ln_m[0], self.ln_m[n - 1]);
        Ok(vid_prob::math::interp_linear(&self.ln_m, &self.b, x, self.b[n - 1]))
    }

    fn name(&self) -> &str {
        "tabulated"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_law_bias_at_pivot() {
        let spec = ModelSpec::new("power_law").with("b0", 1.5).with("slope", 0.3);
        let b = PowerLawBias::from_spec(&spec).unwrap();
        assert_eq!(b.bias(1e12, 1.0).unwrap(), 1.5);
        assert!(b.bias(1e13, 1.0).unwrap() > 1.5);
    }

    #[test]
    fn test_tabulated_bias_clamps() {
        let b = TabulatedBias::new(vec![1e10, 1e12], vec![1.0, 3.0]).unwrap();
        assert!((b.bias(1e11, 0.0).unwrap() - 2.0).abs() < 1e-12);
        assert_eq!(b.bias(1e9, 0.0).unwrap(), 1.0);
        assert_eq!(b.bias(1e13, 0.0).unwrap(), 3.0);
        assert!(b.bias(0.0, 0.0).is_err());
        assert!(TabulatedBias::new(vec![1e12, 1e10], vec![1.0, 3.0]).is_err());
    }
}
