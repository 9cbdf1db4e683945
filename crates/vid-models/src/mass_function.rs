//! Halo mass functions.

use vid_core::{Error, MassFunction, Result};

use crate::registry::ModelSpec;

/// `dn/dM = A (M / M_pivot)^alpha`.
#[derive(Debug, Clone)]
pub struct PowerLawMassFunction {
    /// Amplitude at the pivot, Mpc^-3 Msun^-1.
    pub amplitude: f64,
    /// Logarithmic slope.
    pub alpha: f64,
    /// Pivot mass, Msun.
    pub m_pivot: f64,
}

impl PowerLawMassFunction {
    /// Parameters: `A`, `alpha`, optional `m_pivot` (default 1e10).
    pub fn from_spec(spec: &ModelSpec) -> Result<Self> {
        spec.check_keys(&["A", "alpha", "m_pivot"])?;
        let out = Self {
            amplitude: spec.param("A")?,
            alpha: spec.param("alpha")?,
            m_pivot: spec.param_or("m_pivot", 1e10)?,
        };
        if out.amplitude < 0.0 || out.m_pivot <= 0.0 {
            return Err(Error::Validation("power_law mass function needs A >= 0 and m_pivot > 0".into()));
        }
        Ok(out)
    }
}

impl MassFunction for PowerLawMassFunction {
    fn dndm(&self, mass: f64, _z: f64) -> Result<f64> {
        Ok(self.amplitude * (mass / self.m_pivot).powf(self.alpha))
    }

    fn name(&self) -> &str {
        "power_law"
    }
}

/// `dn/dM = A (M / M*)^alpha exp(-M / M*)`.
#[derive(Debug, Clone)]
pub struct SchechterMassFunction {
    /// Amplitude, Mpc^-3 Msun^-1.
    pub amplitude: f64,
    /// Faint-end slope.
    pub alpha: f64,
    /// Cut-off mass, Msun.
    pub m_star: f64,
}

impl SchechterMassFunction {
    /// Parameters: `A`, `alpha`, `m_star`.
    pub fn from_spec(spec: &ModelSpec) -> Result<Self> {
        spec.check_keys(&["A", "alpha", "m_star"])?;
        let out = Self { amplitude: spec.param("A")?, alpha: spec.param("alpha")?, m_star: spec.param("m_star")? };
        if out.amplitude < 0.0 || out.m_star <= 0.0 {
            return Err(Error::Validation("schechter mass function needs A >= 0 and m_star > 0".into()));
        }
        Ok(out)
    }
}

impl MassFunction for SchechterMassFunction {
    fn dndm(&self, mass: f64, _z: f64) -> Result<f64> {
        let x = mass / self.m_star;
        Ok(self.amplitude * x.powf(self.alpha) * (-x).exp())
    }

    fn name(&self) -> &str {
        "schechter"
    }
}

/// Mass function sampled at fixed masses, interpolated linearly in
/// `(ln M, ln dn/dM)`; zero outside the sampled range.
#[derive(Debug, Clone)]
pub struct TabulatedMassFunction {
    ln_m: Vec<f64>,
    ln_n: Vec<f64>,
}

impl TabulatedMassFunction {
    /// Build from strictly increasing positive masses and positive densities.
    pub fn new(masses: Vec<f64>, dndm: Vec<f64>) -> Result<Self> {
        if masses.len() != dndm.len() || masses.len() < 2 {
            return Err(Error::Validation(format!(
                "tabulated mass function needs >= 2 matching samples, got {} masses and {} values",
                masses.len(),
                dndm.len()
            )));
        }
        if masses.windows(2).any(|w| w[1] <= w[0]) || masses[0] <= 0.0 {
            return Err(Error::Validation("tabulated masses must be positive and strictly increasing".into()));
        }
        if dndm.iter().any(|v| !v.is_finite() || *v <= 0.0) {
            return Err(Error::Validation("tabulated dn/dM values must be finite and > 0".into()));
        }
        Ok(Self {
            ln_m: masses.iter().map(|m| m.ln()).collect(),
            ln_n: dndm.iter().map(|n| n.ln()).collect(),
        })
    }
}

impl MassFunction for TabulatedMassFunction {
    fn dndm(&self, mass: f64, _z: f64) -> Result<f64> {
        if mass <= 0.0 {
            return Ok(0.0);
        }
        let ln_n = vid_prob::math::interp_linear(&self.ln_m, &self.ln_n, mass.ln(), f64::NEG_INFINITY);
        Ok(ln_n.exp())
    }

    fn name(&self) -> &str {
        "tabulated"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_power_law() {
        let spec = ModelSpec::new("power_law").with("A", 2e-12).with("alpha", -2.0).with("m_pivot", 1e11);
        let hmf = PowerLawMassFunction::from_spec(&spec).unwrap();
        assert_relative_eq!(hmf.dndm(1e11, 0.0).unwrap(), 2e-12);
        assert_relative_eq!(hmf.dndm(1e12, 0.0).unwrap(), 2e-14, max_relative = 1e-12);
    }

    #[test]
    fn test_schechter_cutoff() {
        let spec = ModelSpec::new("schechter").with("A", 1.0).with("alpha", -1.0).with("m_star", 1e12);
        let hmf = SchechterMassFunction::from_spec(&spec).unwrap();
        assert_relative_eq!(hmf.dndm(1e12, 0.0).unwrap(), (-1.0f64).exp(), max_relative = 1e-12);
    }

    #[test]
    fn test_tabulated_power_law_is_exact() {
        let m = vec![1e9, 1e10, 1e11];
        let n: Vec<f64> = m.iter().map(|x: &f64| x.powf(-1.5)).collect();
        let hmf = TabulatedMassFunction::new(m, n).unwrap();
        assert_relative_eq!(hmf.dndm(3e10, 0.0).unwrap(), 3e10f64.powf(-1.5), max_relative = 1e-10);
        assert_eq!(hmf.dndm(1e12, 0.0).unwrap(), 0.0);
        assert!(TabulatedMassFunction::new(vec![1.0, 1.0], vec![1.0, 1.0]).is_err());
    }
}
