//! Survey geometry and the luminosity-to-intensity conversion.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use vid_core::{Cosmology, Error, IntensityUnit, Result};

use crate::config::SurveyConfig;

/// Speed of light, m/s.
pub const SPEED_OF_LIGHT: f64 = 2.997_924_58e8;
/// Boltzmann constant, J/K.
pub const BOLTZMANN: f64 = 1.380_649e-23;
/// Solar luminosity, W.
pub const SOLAR_LUMINOSITY: f64 = 3.828e26;
/// Megaparsec, m.
pub const MPC: f64 = 3.085_677_581_491_367_3e22;
/// Ratio between a Gaussian σ and the voxel side it defines.
pub const SIGMA_PER_SIDE: f64 = 0.4247;

/// Voxel box set by the resolution widths.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoxelGeometry {
    /// Line-of-sight resolution σ, Mpc.
    pub sigma_par: f64,
    /// Transverse resolution σ, Mpc.
    pub sigma_perp: f64,
    /// Line-of-sight voxel side, Mpc.
    pub side_par: f64,
    /// Transverse voxel side, Mpc.
    pub side_perp: f64,
    /// Voxel volume, Mpc³.
    pub volume: f64,
}

impl VoxelGeometry {
    /// Voxel sides `σ / 0.4247` along each axis.
    pub fn from_resolution(sigma_par: f64, sigma_perp: f64) -> Result<Self> {
        if !(sigma_par > 0.0) || !(sigma_perp > 0.0) {
            return Err(Error::Validation(format!(
                "resolution widths must be > 0, got sigma_par={} sigma_perp={}",
                sigma_par, sigma_perp
            )));
        }
        let side_par = sigma_par / SIGMA_PER_SIDE;
        let side_perp = sigma_perp / SIGMA_PER_SIDE;
        Ok(Self { sigma_par, sigma_perp, side_par, side_perp, volume: side_par * side_perp * side_perp })
    }
}

/// Redshift, geometry and intensity conversion for the configured line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Conversion {
    /// Line redshift.
    pub z: f64,
    /// H(z), km/s/Mpc.
    pub hubble: f64,
    /// Linear growth rate at `z`.
    pub growth_rate: f64,
    /// Output intensity unit.
    pub unit: IntensityUnit,
    /// Intensity per unit luminosity density, `[unit]·Mpc³/L☉`.
    pub c_lt: f64,
    /// Intensity of one L☉ inside one voxel, `c_lt / V_vox`.
    pub x_lt: f64,
    /// Voxel geometry.
    pub geometry: VoxelGeometry,
}

impl Conversion {
    /// Resolve the conversion for a survey in a background cosmology.
    pub fn new(survey: &SurveyConfig, cosmology: &dyn Cosmology) -> Result<Self> {
        if !(survey.nu_obs_ghz > 0.0) || survey.nu_obs_ghz > survey.nu_rest_ghz {
            return Err(Error::Validation(format!(
                "observed frequency must be in (0, {}] GHz, got {}",
                survey.nu_rest_ghz, survey.nu_obs_ghz
            )));
        }
        let z = survey.nu_rest_ghz / survey.nu_obs_ghz - 1.0;
        let hubble = cosmology.hubble(z);
        if !(hubble > 0.0) || !hubble.is_finite() {
            return Err(Error::Computation(format!("H(z={}) = {} is not positive", z, hubble)));
        }
        let geometry = VoxelGeometry::from_resolution(survey.sigma_par_mpc, survey.sigma_perp_mpc)?;
        let c_lt = luminosity_to_intensity(survey.unit, survey.nu_rest_ghz * 1e9, z, hubble);
        Ok(Self {
            z,
            hubble,
            growth_rate: cosmology.growth_rate(z),
            unit: survey.unit,
            c_lt,
            x_lt: c_lt / geometry.volume,
            geometry,
        })
    }
}

/// Coefficient turning a luminosity density in L☉/Mpc³ into intensity.
pub fn luminosity_to_intensity(unit: IntensityUnit, nu_rest_hz: f64, z: f64, hubble_kms_mpc: f64) -> f64 {
    let h_si = hubble_kms_mpc * 1e3 / MPC;
    let per_mpc3 = SOLAR_LUMINOSITY / (MPC * MPC * MPC);
    match unit {
        IntensityUnit::MicroKelvin => {
            let c3 = SPEED_OF_LIGHT.powi(3);
            c3 * (1.0 + z).powi(2) / (8.0 * PI * BOLTZMANN * nu_rest_hz.powi(3) * h_si) * per_mpc3 * 1e6
        }
        IntensityUnit::JanskyPerSteradian => SPEED_OF_LIGHT / (4.0 * PI * nu_rest_hz * h_si) * per_mpc3 * 1e26,
    }
}
