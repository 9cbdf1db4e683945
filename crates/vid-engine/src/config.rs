//! Engine configuration.
//!
//! The configuration is a tree of independently comparable groups. Each group
//! is one input of the memoization graph in [`crate::model::VidModel`]:
//! updating the configuration bumps the generation of exactly the groups that
//! changed. YAML and JSON are both accepted (see [`VidConfig::from_path`]).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use vid_core::{Error, IntensityUnit, Result};
use vid_models::{FlatLambdaCdm, LineWidth, ModelSpec};

use crate::quadrature::QuadratureSource;

/// Full engine configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VidConfig {
    /// Intensity grid and frequency sampling.
    pub transform: TransformConfig,
    /// Reporting bins.
    pub histogram: HistogramConfig,
    /// Quadrature rules for the forward and inverse transforms.
    pub quadrature: QuadratureConfig,
    /// Luminosity scatter and the single-source transform table.
    pub scatter: ScatterConfig,
    /// Line and instrument resolution.
    pub survey: SurveyConfig,
    /// Background cosmology.
    pub cosmology: FlatLambdaCdm,
    /// Halo population models and mass grid.
    pub population: PopulationConfig,
    /// Voxel smoothing of point sources.
    pub smoothing: SmoothingConfig,
    /// Density variance for the clustering term.
    pub clustering: ClusteringConfig,
    /// Instrument noise.
    pub noise: NoiseConfig,
    /// Stabilization damping and mean subtraction.
    pub control: ControlConfig,
}

/// Intensity grid and frequency sampling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransformConfig {
    /// Half-range of the symmetric intensity grid.
    pub t_max: f64,
    /// Number of intensity grid points (forced even).
    pub n_t: usize,
    /// Lowest sampled frequency (inverse intensity units, > 0).
    pub f_min: f64,
    /// Highest sampled frequency.
    pub f_max: f64,
    /// Relative tolerance of the inverse NUFFT.
    pub nufft_tolerance: f64,
    /// Intervals whose characteristic function stays below this are skipped.
    pub cf_floor: f64,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self { t_max: 100.0, n_t: 1 << 18, f_min: 1e-5, f_max: 1e5, nufft_tolerance: 1e-6, cf_floor: 1e-14 }
    }
}

/// Bin spacing of the reported histogram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinKind {
    /// Logarithmic edges (requires `t_min > 0`).
    #[default]
    Log,
    /// Linear edges.
    Linear,
}

/// Reporting bins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HistogramConfig {
    /// Lower edge of the first bin (upper edge is `transform.t_max`).
    pub t_min: f64,
    /// Number of bins.
    pub n_bins: usize,
    /// Edge spacing; forced linear when `t_min <= 0`.
    pub binning: BinKind,
}

impl Default for HistogramConfig {
    fn default() -> Self {
        Self { t_min: 1e-2, n_bins: 100, binning: BinKind::Log }
    }
}

/// Quadrature rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QuadratureConfig {
    /// Rule per panel of the forward single-source transform.
    pub ft: QuadratureSource,
    /// Equal-width panels of the forward transform.
    pub ft_panels: usize,
    /// Rule per frequency interval of the inverse transform.
    pub ift: QuadratureSource,
}

impl Default for QuadratureConfig {
    fn default() -> Self {
        Self { ft: QuadratureSource::Order(32), ft_panels: 4096, ift: QuadratureSource::Order(4096) }
    }
}

/// Luminosity scatter and the tabulated single-source transform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScatterConfig {
    /// Lognormal width in dex (0 = no scatter).
    pub sigma_dex: f64,
    /// Dynamic range of the dense intensity grid, in units of `sigma_dex` decades.
    pub n_log_sigma: f64,
    /// First tabulated frequency (reference intensity 1).
    pub f_ref_min: f64,
    /// Last tabulated frequency.
    pub f_ref_max: f64,
    /// Number of tabulated frequencies.
    pub n_ref: usize,
}

impl Default for ScatterConfig {
    fn default() -> Self {
        Self { sigma_dex: 0.0, n_log_sigma: 4.0, f_ref_min: 1e-5, f_ref_max: 1e4, n_ref: 1000 }
    }
}

/// Line and resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SurveyConfig {
    /// Rest-frame line frequency, GHz.
    pub nu_rest_ghz: f64,
    /// Observed frequency, GHz.
    pub nu_obs_ghz: f64,
    /// Gaussian resolution along the line of sight, Mpc.
    pub sigma_par_mpc: f64,
    /// Gaussian resolution across the line of sight, Mpc.
    pub sigma_perp_mpc: f64,
    /// Intensity unit of every output.
    pub unit: IntensityUnit,
}

impl Default for SurveyConfig {
    fn default() -> Self {
        Self {
            nu_rest_ghz: 115.271,
            nu_obs_ghz: 30.0,
            sigma_par_mpc: 1.0,
            sigma_perp_mpc: 2.0,
            unit: IntensityUnit::MicroKelvin,
        }
    }
}

/// Population models and mass grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PopulationConfig {
    /// Halo mass function.
    pub mass_function: ModelSpec,
    /// Halo bias.
    pub bias: ModelSpec,
    /// Mean luminosity per halo.
    pub luminosity: ModelSpec,
    /// Lowest halo mass, Msun.
    pub m_min: f64,
    /// Highest halo mass, Msun.
    pub m_max: f64,
    /// Number of log-spaced masses.
    pub n_mass: usize,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            mass_function: ModelSpec::new("schechter").with("A", 2.5e-19).with("alpha", -1.9).with("m_star", 1e14),
            bias: ModelSpec::new("power_law").with("b0", 2.0).with("slope", 0.25).with("m_pivot", 1e12),
            luminosity: ModelSpec::new("mass_pow").with("A", 2e-6).with("b", 1.0),
            m_min: 1e9,
            m_max: 1e15,
            n_mass: 500,
        }
    }
}

/// Voxel smoothing of point sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SmoothingConfig {
    /// Split source light across neighbouring voxels.
    pub enabled: bool,
    /// Decimal places kept when deduplicating voxel fractions.
    pub tolerance_decimals: u32,
    /// Half-width of the voxel box in resolution sigmas.
    pub n_sigma: f64,
    /// Sub-cells per voxel along each axis.
    pub supersample: usize,
    /// Mass-dependent line broadening (requires `enabled`).
    pub line_width: Option<LineWidth>,
    /// Orientation-averaged (inclined disc) broadening instead of a Gaussian.
    pub inclined: bool,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self { enabled: true, tolerance_decimals: 7, n_sigma: 20.0, supersample: 2, line_width: None, inclined: true }
    }
}

/// Fingers-of-God damping along the line of sight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Damping {
    /// `(1 + (k_∥σ)²/2)^-2`
    Lorentzian,
    /// `exp(-(k_∥σ)²)`
    Gaussian,
}

impl FromStr for Damping {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "lorentzian" => Ok(Self::Lorentzian),
            "gaussian" => Ok(Self::Gaussian),
            other => Err(Error::Validation(format!(
                "unknown damping model '{}' (expected 'lorentzian' or 'gaussian')",
                other
            ))),
        }
    }
}

/// Redshift-space distortions in the density variance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RsdConfig {
    /// Damping model name, parsed with [`Damping::from_str`].
    #[serde(default = "default_damping")]
    pub damping: String,
    /// Pairwise velocity dispersion scale, Mpc.
    #[serde(default = "default_sigma_nl")]
    pub sigma_nl_mpc: f64,
    /// Growth rate override; taken from the cosmology when absent.
    #[serde(default)]
    pub growth_rate: Option<f64>,
}

impl Default for RsdConfig {
    fn default() -> Self {
        Self { damping: default_damping(), sigma_nl_mpc: default_sigma_nl(), growth_rate: None }
    }
}

fn default_damping() -> String {
    "lorentzian".to_string()
}

fn default_sigma_nl() -> f64 {
    7.0
}

fn default_k_min() -> f64 {
    1e-3
}

fn default_k_max() -> f64 {
    1e2
}

fn default_n_k() -> usize {
    96
}

/// Source of the voxel-scale density variance.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClusteringConfig {
    /// No clustering term.
    #[default]
    None,
    /// Externally computed variance.
    Fixed {
        /// σ²_δ on the voxel scale.
        variance: f64,
    },
    /// Integrate a tabulated power spectrum over the voxel window.
    PowerSpectrum {
        /// Two-column `k P(k)` table.
        table: PathBuf,
        /// Lower integration bound, Mpc^-1.
        #[serde(default = "default_k_min")]
        k_min: f64,
        /// Upper integration bound, Mpc^-1.
        #[serde(default = "default_k_max")]
        k_max: f64,
        /// Quadrature nodes per axis (in ln k).
        #[serde(default = "default_n_k")]
        n_k: usize,
        /// Optional redshift-space distortions.
        #[serde(default)]
        rsd: Option<RsdConfig>,
    },
}

/// Instrument noise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NoiseConfig {
    /// Per-voxel noise rms (per unit integration if `t_pix` is set).
    pub sigma: f64,
    /// Integration time per pixel; rescales `sigma` by `1/√(t_pix·n_feeds)`.
    pub t_pix: Option<f64>,
    /// Number of feeds averaged together.
    pub n_feeds: u32,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self { sigma: 1.0, t_pix: None, n_feeds: 1 }
    }
}

impl NoiseConfig {
    /// Effective per-voxel noise rms.
    pub fn effective_sigma(&self) -> f64 {
        match self.t_pix {
            Some(t) => self.sigma / (t * self.n_feeds as f64).sqrt(),
            None => self.sigma,
        }
    }
}

/// Stabilization damping and mean subtraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ControlConfig {
    /// Width of the artificial Gaussian damping in the signal-only channel.
    pub sigma_stable: f64,
    /// Shift every distribution to zero mean.
    pub subtract_mean: bool,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self { sigma_stable: 0.05, subtract_mean: false }
    }
}

fn positive(name: &str, v: f64) -> Result<()> {
    if !v.is_finite() || v <= 0.0 {
        return Err(Error::Validation(format!("{} must be finite and > 0, got {}", name, v)));
    }
    Ok(())
}

fn non_negative(name: &str, v: f64) -> Result<()> {
    if !v.is_finite() || v < 0.0 {
        return Err(Error::Validation(format!("{} must be finite and >= 0, got {}", name, v)));
    }
    Ok(())
}

impl VidConfig {
    /// Parse YAML or JSON (chosen by extension; anything else is read as YAML).
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let is_json = path.extension().and_then(|e| e.to_str()).is_some_and(|e| e.eq_ignore_ascii_case("json"));
        let cfg: Self = if is_json { serde_json::from_slice(&bytes)? } else { serde_yaml_ng::from_slice(&bytes)? };
        cfg.validated()
    }

    /// Parse a YAML document.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let cfg: Self = serde_yaml_ng::from_str(text)?;
        cfg.validated()
    }

    /// Normalize (even `n_t`) and validate.
    pub fn validated(mut self) -> Result<Self> {
        if self.transform.n_t % 2 == 1 {
            log::info!("n_t must be even; using {} instead of {}", self.transform.n_t + 1, self.transform.n_t);
            self.transform.n_t += 1;
        }
        self.validate()?;
        Ok(self)
    }

    /// Fail-fast checks, run before any numerical work.
    pub fn validate(&self) -> Result<()> {
        let t = &self.transform;
        positive("transform.t_max", t.t_max)?;
        if t.n_t < 2 || t.n_t % 2 != 0 {
            return Err(Error::Validation(format!("transform.n_t must be even and >= 2, got {}", t.n_t)));
        }
        positive("transform.f_min", t.f_min)?;
        if !(t.f_max > t.f_min) {
            return Err(Error::Validation(format!(
                "transform.f_max ({}) must exceed transform.f_min ({})",
                t.f_max, t.f_min
            )));
        }
        if !(t.nufft_tolerance > 0.0 && t.nufft_tolerance < 1e-1) {
            return Err(Error::Validation(format!(
                "transform.nufft_tolerance must be in (0, 0.1), got {}",
                t.nufft_tolerance
            )));
        }
        non_negative("transform.cf_floor", t.cf_floor)?;

        let h = &self.histogram;
        if h.n_bins == 0 {
            return Err(Error::Validation("histogram.n_bins must be > 0".into()));
        }
        if !h.t_min.is_finite() || h.t_min >= t.t_max {
            return Err(Error::Validation(format!(
                "histogram.t_min ({}) must be below transform.t_max ({})",
                h.t_min, t.t_max
            )));
        }

        if self.quadrature.ft_panels == 0 {
            return Err(Error::Validation("quadrature.ft_panels must be > 0".into()));
        }

        let s = &self.scatter;
        non_negative("scatter.sigma_dex", s.sigma_dex)?;
        positive("scatter.n_log_sigma", s.n_log_sigma)?;
        positive("scatter.f_ref_min", s.f_ref_min)?;
        if !(s.f_ref_max > s.f_ref_min) || s.n_ref < 2 {
            return Err(Error::Validation(format!(
                "scatter table needs f_ref_min < f_ref_max and n_ref >= 2, got [{}, {}] x {}",
                s.f_ref_min, s.f_ref_max, s.n_ref
            )));
        }

        let sv = &self.survey;
        positive("survey.nu_rest_ghz", sv.nu_rest_ghz)?;
        positive("survey.nu_obs_ghz", sv.nu_obs_ghz)?;
        if sv.nu_obs_ghz > sv.nu_rest_ghz {
            return Err(Error::Validation(format!(
                "observed frequency {} GHz is above the rest frequency {} GHz",
                sv.nu_obs_ghz, sv.nu_rest_ghz
            )));
        }
        positive("survey.sigma_par_mpc", sv.sigma_par_mpc)?;
        positive("survey.sigma_perp_mpc", sv.sigma_perp_mpc)?;

        self.cosmology.validate()?;

        let p = &self.population;
        positive("population.m_min", p.m_min)?;
        if !(p.m_max > p.m_min) || p.n_mass < 2 {
            return Err(Error::Validation(format!(
                "population mass grid needs m_min < m_max and n_mass >= 2, got [{}, {}] x {}",
                p.m_min, p.m_max, p.n_mass
            )));
        }

        let sm = &self.smoothing;
        if sm.line_width.is_some() && !sm.enabled {
            return Err(Error::Validation(
                "smoothing.line_width requires smoothing.enabled: broadening is applied by the voxel smoothing".into(),
            ));
        }
        if let Some(lw) = &sm.line_width {
            lw.validate()?;
        }
        if sm.enabled {
            positive("smoothing.n_sigma", sm.n_sigma)?;
            if sm.supersample == 0 {
                return Err(Error::Validation("smoothing.supersample must be > 0".into()));
            }
            if sm.tolerance_decimals > 15 {
                return Err(Error::Validation(format!(
                    "smoothing.tolerance_decimals must be <= 15, got {}",
                    sm.tolerance_decimals
                )));
            }
        }

        match &self.clustering {
            ClusteringConfig::None => {}
            ClusteringConfig::Fixed { variance } => non_negative("clustering.variance", *variance)?,
            ClusteringConfig::PowerSpectrum { k_min, k_max, n_k, rsd, .. } => {
                positive("clustering.k_min", *k_min)?;
                if !(k_max > k_min) || *n_k == 0 {
                    return Err(Error::Validation(format!(
                        "clustering k range needs k_min < k_max and n_k > 0, got [{}, {}] x {}",
                        k_min, k_max, n_k
                    )));
                }
                if let Some(rsd) = rsd {
                    Damping::from_str(&rsd.damping)?;
                    non_negative("clustering.rsd.sigma_nl_mpc", rsd.sigma_nl_mpc)?;
                }
            }
        }

        let n = &self.noise;
        non_negative("noise.sigma", n.sigma)?;
        if let Some(tp) = n.t_pix {
            positive("noise.t_pix", tp)?;
            if n.n_feeds == 0 {
                return Err(Error::Validation("noise.n_feeds must be > 0".into()));
            }
        }
        non_negative("control.sigma_stable", self.control.sigma_stable)?;
        Ok(())
    }
}
