//! Voxel smoothing profiles: how one source's light is split across voxels.
//!
//! A source sits at the centre of the central voxel of a box covering
//! `±n_sigma` resolution widths. The per-axis fractions are integrated on a
//! supersampled grid and block-summed back to voxels; the 3-D cube is their
//! outer product. Cube values are quantized to `tolerance_decimals` (relative
//! to the largest fraction), deduplicated, and renormalized so that
//! `Σ fraction·count = 1`.

use rayon::prelude::*;
use std::collections::BTreeMap;
use std::f64::consts::PI;
use vid_core::{Error, Result};
use vid_models::LineWidth;
use vid_prob::math::{dawson_over_x, linspace};
use vid_prob::normal::interval_mass;

use crate::config::SmoothingConfig;
use crate::conversion::{Conversion, VoxelGeometry};
use crate::interp::MonotoneCubic;
use crate::quadrature::GaussLegendre;

/// GL nodes of the line-of-sight kernel transform.
const PROFILE_K_NODES: usize = 800;
/// Kernel transform cut-off in units of `1/σ_∥`.
const PROFILE_K_MAX_SIGMAS: f64 = 8.0;
/// Real-space samples of the broadened profile.
const PROFILE_SAMPLES: usize = 257;
/// GL nodes per supersampled cell.
const CELL_NODES: usize = 16;

/// Discrete distribution of luminosity fractions over the voxel box.
#[derive(Debug, Clone, PartialEq)]
pub struct SmoothingProfile {
    /// Distinct fractions, increasing.
    pub fractions: Vec<f64>,
    /// Number of voxels receiving each fraction.
    pub counts: Vec<u64>,
}

impl SmoothingProfile {
    /// Unsmoothed source: all light in one voxel.
    pub fn point_source() -> Self {
        Self { fractions: vec![1.0], counts: vec![1] }
    }

    /// Quantize, deduplicate and renormalize a set of voxel fractions.
    pub fn from_fractions<I: IntoIterator<Item = f64>>(values: I, decimals: u32) -> Result<Self> {
        let values: Vec<f64> = values.into_iter().collect();
        let max = values.iter().copied().fold(0.0f64, f64::max);
        if !(max > 0.0) || !max.is_finite() {
            return Err(Error::Computation("smoothing cube has no positive fraction".into()));
        }
        let scale = 10f64.powi(decimals as i32);
        let mut keys: BTreeMap<i64, u64> = BTreeMap::new();
        for v in values {
            let key = (v / max * scale).round() as i64;
            if key > 0 {
                *keys.entry(key).or_insert(0) += 1;
            }
        }
        let mut fractions: Vec<f64> = keys.keys().map(|&k| k as f64 / scale * max).collect();
        let counts: Vec<u64> = keys.values().copied().collect();
        let total: f64 = fractions.iter().zip(&counts).map(|(f, &c)| f * c as f64).sum();
        for f in &mut fractions {
            *f /= total;
        }
        Ok(Self { fractions, counts })
    }

    /// Number of distinct fractions.
    pub fn len(&self) -> usize {
        self.fractions.len()
    }

    /// True if empty.
    pub fn is_empty(&self) -> bool {
        self.fractions.is_empty()
    }

    /// Voxels touched by one source, `Σ count`.
    pub fn total_count(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// `Σ fraction·count`, 1 after construction.
    pub fn weighted_sum(&self) -> f64 {
        self.fractions.iter().zip(&self.counts).map(|(f, &c)| f * c as f64).sum()
    }
}

/// Smoothing profiles for every mass on the grid.
#[derive(Debug, Clone)]
pub enum SmoothingTable {
    /// One profile for all masses.
    Shared(SmoothingProfile),
    /// Mass-dependent profiles (line broadening).
    PerMass(Vec<SmoothingProfile>),
}

impl SmoothingTable {
    /// Profile used at mass index `i`.
    pub fn for_mass(&self, i: usize) -> &SmoothingProfile {
        match self {
            Self::Shared(p) => p,
            Self::PerMass(v) => &v[i],
        }
    }

    /// Sample the profiles for the configured survey.
    pub fn build(cfg: &SmoothingConfig, conversion: &Conversion, masses: &[f64]) -> Result<Self> {
        if !cfg.enabled {
            if cfg.line_width.is_some() {
                return Err(Error::Validation("line broadening requires voxel smoothing".into()));
            }
            return Ok(Self::Shared(SmoothingProfile::point_source()));
        }
        let g = &conversion.geometry;
        let perp = gaussian_fractions(g.sigma_perp, g.side_perp, cfg.n_sigma, cfg.supersample)?;

        let Some(lw) = cfg.line_width else {
            let los = gaussian_fractions(g.sigma_par, g.side_par, cfg.n_sigma, cfg.supersample)?;
            let profile = SmoothingProfile::from_fractions(cube(&los, &perp), cfg.tolerance_decimals)?;
            log::debug!("smoothing: {} distinct fractions over {} voxels", profile.len(), profile.total_count());
            return Ok(Self::Shared(profile));
        };

        let profiles = masses
            .par_iter()
            .map(|&m| {
                let los = broadened_fractions(cfg, &lw, g, m, conversion)?;
                SmoothingProfile::from_fractions(cube(&los, &perp), cfg.tolerance_decimals)
            })
            .collect::<Result<Vec<_>>>()?;
        log::debug!(
            "smoothing: {} mass-dependent profiles, {} to {} distinct fractions",
            profiles.len(),
            profiles.iter().map(SmoothingProfile::len).min().unwrap_or(0),
            profiles.iter().map(SmoothingProfile::len).max().unwrap_or(0)
        );
        Ok(Self::PerMass(profiles))
    }
}

/// Odd number of voxels per axis covering `±n_sigma·sigma`.
pub fn box_voxels(n_sigma: f64, sigma: f64, side: f64) -> usize {
    let n = (2.0 * n_sigma * sigma / side + 1.0) as usize;
    if n % 2 == 0 {
        n + 1
    } else {
        n.max(1)
    }
}

fn cell_edges(n_vox: usize, side: f64, supersample: usize) -> Vec<f64> {
    let half = 0.5 * n_vox as f64 * side;
    linspace(-half, half, n_vox * supersample + 1)
}

fn block_sum(cells: &[f64], supersample: usize) -> Vec<f64> {
    cells.chunks(supersample).map(|c| c.iter().sum()).collect()
}

/// Fractions of a centred Gaussian of width `sigma` per voxel of size `side`.
pub fn gaussian_fractions(sigma: f64, side: f64, n_sigma: f64, supersample: usize) -> Result<Vec<f64>> {
    let n_vox = box_voxels(n_sigma, sigma, side);
    let edges = cell_edges(n_vox, side, supersample);
    let cells = edges.windows(2).map(|w| interval_mass(w[0], w[1], 0.0, sigma)).collect::<Result<Vec<f64>>>()?;
    Ok(block_sum(&cells, supersample))
}

/// Line-of-sight fractions for a source of mass `m` with line broadening.
fn broadened_fractions(
    cfg: &SmoothingConfig,
    lw: &LineWidth,
    g: &VoxelGeometry,
    m: f64,
    conversion: &Conversion,
) -> Result<Vec<f64>> {
    let sigma_v = lw.sigma_mpc(m, conversion.z, conversion.hubble);
    let spar = (g.sigma_par * g.sigma_par + sigma_v * sigma_v).sqrt();
    if !cfg.inclined {
        return gaussian_fractions(spar, g.side_par, cfg.n_sigma, cfg.supersample);
    }
    let n_vox = box_voxels(cfg.n_sigma, spar, g.side_par);
    let edges = cell_edges(n_vox, g.side_par, cfg.supersample);
    let profile = inclined_profile(g.sigma_par, sigma_v, edges[edges.len() - 1])?;
    let rule = GaussLegendre::new(CELL_NODES)?;
    let cells: Vec<f64> = edges.windows(2).map(|w| rule.integrate(w[0], w[1], |x| profile.eval(x.abs()))).collect();
    Ok(block_sum(&cells, cfg.supersample))
}

/// Real-space line-of-sight kernel for an orientation-averaged rotating
/// source convolved with the Gaussian channel response, on `[0, half_extent]`.
///
/// `P(x) = (1/π) ∫_0^{k_max} exp(-k²σ²/2) D(√(2/3)kσ_v)/(√(2/3)kσ_v) cos(kx) dk`.
pub fn inclined_profile(sigma: f64, sigma_v: f64, half_extent: f64) -> Result<MonotoneCubic> {
    if !(sigma > 0.0) || !(sigma_v >= 0.0) || !(half_extent > 0.0) {
        return Err(Error::Validation(format!(
            "inclined profile needs sigma > 0, sigma_v >= 0 and a positive extent, got {} {} {}",
            sigma, sigma_v, half_extent
        )));
    }
    let rule = GaussLegendre::new(PROFILE_K_NODES)?;
    let k_max = PROFILE_K_MAX_SIGMAS / sigma;
    let c = (2.0f64 / 3.0).sqrt() * sigma_v;
    let kernel: Vec<(f64, f64)> = rule
        .map_to_interval(0.0, k_max)
        .map(|(k, w)| (k, w * (-0.5 * k * k * sigma * sigma).exp() * dawson_over_x(c * k)))
        .collect();
    let xs = linspace(0.0, half_extent, PROFILE_SAMPLES);
    let ys: Vec<f64> = xs.iter().map(|&x| kernel.iter().map(|&(k, wf)| wf * (k * x).cos()).sum::<f64>() / PI).collect();
    MonotoneCubic::new(xs, ys)
}

fn cube<'a>(los: &'a [f64], perp: &'a [f64]) -> impl Iterator<Item = f64> + 'a {
    los.iter().flat_map(move |&a| perp.iter().flat_map(move |&b| perp.iter().map(move |&c| a * b * c)))
}
