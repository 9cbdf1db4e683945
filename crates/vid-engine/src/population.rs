//! Halo population on the discrete mass grid.

use std::sync::Arc;
use vid_core::{Error, HaloBias, MassFunction, MassLuminosity, Result};
use vid_models::ModelRegistry;
use vid_prob::math::{geomspace, trapz_weights};

use crate::config::PopulationConfig;
use crate::conversion::Conversion;

/// Collaborator strategies resolved from the registry.
#[derive(Clone)]
pub struct Population {
    /// Halo mass function.
    pub mass_function: Arc<dyn MassFunction>,
    /// Halo bias.
    pub bias: Arc<dyn HaloBias>,
    /// Mean luminosity per halo.
    pub luminosity: Arc<dyn MassLuminosity>,
}

impl std::fmt::Debug for Population {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Population")
            .field("mass_function", &self.mass_function.name())
            .field("bias", &self.bias.name())
            .field("luminosity", &self.luminosity.name())
            .finish()
    }
}

impl Population {
    /// Resolve the configured models by name.
    pub fn resolve(registry: &ModelRegistry, cfg: &PopulationConfig) -> Result<Self> {
        Ok(Self {
            mass_function: registry.mass_function(&cfg.mass_function)?,
            bias: registry.bias(&cfg.bias)?,
            luminosity: registry.luminosity(&cfg.luminosity)?,
        })
    }
}

/// Per-mass quantities at the line redshift.
#[derive(Debug, Clone)]
pub struct MassTable {
    /// Log-spaced halo masses, M☉.
    pub masses: Vec<f64>,
    /// Trapezoid weights in mass.
    pub weights: Vec<f64>,
    /// dn/dM, Mpc⁻³ M☉⁻¹.
    pub dndm: Vec<f64>,
    /// Halo bias.
    pub bias: Vec<f64>,
    /// Mean luminosity, L☉.
    pub luminosity: Vec<f64>,
    /// Mean intensity of one source alone in a voxel.
    pub intensity: Vec<f64>,
}

impl MassTable {
    /// Tabulate the population on its mass grid.
    pub fn build(cfg: &PopulationConfig, population: &Population, conversion: &Conversion) -> Result<Self> {
        let z = conversion.z;
        let masses = geomspace(cfg.m_min, cfg.m_max, cfg.n_mass);
        let weights = trapz_weights(&masses);
        let mut dndm = Vec::with_capacity(masses.len());
        let mut bias = Vec::with_capacity(masses.len());
        let mut luminosity = Vec::with_capacity(masses.len());
        for &m in &masses {
            let n = population.mass_function.dndm(m, z)?;
            let l = population.luminosity.luminosity(m, z)?;
            if !(n >= 0.0) || !n.is_finite() {
                return Err(Error::Validation(format!(
                    "mass function '{}' returned {} at M={:e}",
                    population.mass_function.name(),
                    n,
                    m
                )));
            }
            if !(l >= 0.0) || !l.is_finite() {
                return Err(Error::Validation(format!(
                    "luminosity model '{}' returned {} at M={:e}",
                    population.luminosity.name(),
                    l,
                    m
                )));
            }
            dndm.push(n);
            luminosity.push(l);
            bias.push(population.bias.bias(m, z)?);
        }
        let intensity = luminosity.iter().map(|l| l * conversion.x_lt).collect();
        Ok(Self { masses, weights, dndm, bias, luminosity, intensity })
    }

    /// Number of mass points.
    pub fn len(&self) -> usize {
        self.masses.len()
    }

    /// True if the grid is empty.
    pub fn is_empty(&self) -> bool {
        self.masses.is_empty()
    }

    /// Expected sources per voxel, `V ∫ dn/dM dM`.
    pub fn mean_occupancy(&self, volume: f64) -> f64 {
        volume * self.weights.iter().zip(&self.dndm).map(|(w, n)| w * n).sum::<f64>()
    }

    /// Mean voxel intensity `V ∫ dn/dM T(M) dM`.
    pub fn mean_intensity(&self, volume: f64) -> f64 {
        volume * (0..self.len()).map(|i| self.weights[i] * self.dndm[i] * self.intensity[i]).sum::<f64>()
    }

    /// Number-weighted mean bias.
    pub fn mean_bias(&self) -> Result<f64> {
        let mut num = 0.0;
        let mut den = 0.0;
        for i in 0..self.len() {
            let w = self.weights[i] * self.dndm[i];
            num += w * self.bias[i];
            den += w;
        }
        if !(den > 0.0) {
            return Err(Error::Computation("mass function integrates to zero over the mass grid".into()));
        }
        Ok(num / den)
    }
}
