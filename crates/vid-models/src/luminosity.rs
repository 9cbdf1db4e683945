//! Mass–luminosity relations.

use vid_core::{Error, MassLuminosity, Result};

use crate::registry::ModelSpec;

/// Same luminosity for every halo.
#[derive(Debug, Clone)]
pub struct ConstantLuminosity {
    /// Luminosity, Lsun.
    pub luminosity: f64,
}

impl ConstantLuminosity {
    /// Parameters: `L`.
    pub fn from_spec(spec: &ModelSpec) -> Result<Self> {
        spec.check_keys(&["L"])?;
        let luminosity = spec.param("L")?;
        if luminosity < 0.0 {
            return Err(Error::Validation(format!("constant luminosity must be >= 0, got {}", luminosity)));
        }
        Ok(Self { luminosity })
    }
}

impl MassLuminosity for ConstantLuminosity {
    fn luminosity(&self, _mass: f64, _z: f64) -> Result<f64> {
        Ok(self.luminosity)
    }

    fn name(&self) -> &str {
        "constant"
    }
}

/// `L = A M^b` between two mass cuts, zero outside.
#[derive(Debug, Clone)]
pub struct MassPowLuminosity {
    /// Normalization, Lsun Msun^-b.
    pub amplitude: f64,
    /// Slope.
    pub slope: f64,
    /// Lower mass cut.
    pub m_min: f64,
    /// Upper mass cut.
    pub m_max: f64,
}

impl MassPowLuminosity {
    /// Parameters: `A`, `b`, optional `m_min` (0), `m_max` (inf).
    pub fn from_spec(spec: &ModelSpec) -> Result<Self> {
        spec.check_keys(&["A", "b", "m_min", "m_max"])?;
        let m_min = spec.param_or("m_min", 0.0)?;
        let m_max = if spec.params.contains_key("m_max") { spec.param("m_max")? } else { f64::INFINITY };
        if m_min >= m_max {
            return Err(Error::Validation(format!("mass_pow: m_min ({}) must be < m_max ({})", m_min, m_max)));
        }
        Ok(Self { amplitude: spec.param("A")?, slope: spec.param("b")?, m_min, m_max })
    }
}

impl MassLuminosity for MassPowLuminosity {
    fn luminosity(&self, mass: f64, _z: f64) -> Result<f64> {
        if mass < self.m_min || mass > self.m_max {
            return Ok(0.0);
        }
        Ok(self.amplitude * mass.powf(self.slope))
    }

    fn name(&self) -> &str {
        "mass_pow"
    }
}

/// `L = C / ((M/M*)^A + (M/M*)^B)`.
#[derive(Debug, Clone)]
pub struct DoublePowerLuminosity {
    /// Normalization, Lsun.
    pub norm: f64,
    /// Turn-over mass.
    pub m_star: f64,
    /// First exponent.
    pub a: f64,
    /// Second exponent.
    pub b: f64,
}

impl DoublePowerLuminosity {
    /// Parameters: `C`, `m_star`, `A`, `B`.
    pub fn from_spec(spec: &ModelSpec) -> Result<Self> {
        spec.check_keys(&["C", "m_star", "A", "B"])?;
        let m_star = spec.param("m_star")?;
        if m_star <= 0.0 {
            return Err(Error::Validation(format!("double_power: m_star must be > 0, got {}", m_star)));
        }
        Ok(Self { norm: spec.param("C")?, m_star, a: spec.param("A")?, b: spec.param("B")? })
    }
}

impl MassLuminosity for DoublePowerLuminosity {
    fn luminosity(&self, mass: f64, _z: f64) -> Result<f64> {
        let x = mass / self.m_star;
        Ok(self.norm / (x.powf(self.a) + x.powf(self.b)))
    }

    fn name(&self) -> &str {
        "double_power"
    }
}
