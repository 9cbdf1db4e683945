//! Monte Carlo validation: mock voxel populations drawn from the same
//! occupancy, smoothing and scatter model as the analytic VID.
//!
//! Per voxel, the number of source contributions is Poisson with mean
//! `Σ_i w_i·V·dn/dM_i·Σ_j c_ij`; each contribution picks a mass bin, a
//! smoothing fraction and a lognormal scatter factor. Clustering is not
//! sampled, so draws reproduce the shot term only.

use rand::distributions::WeightedIndex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal, Poisson};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use vid_core::{Error, IntensityUnit, Result};
use vid_prob::lognormal;

use crate::model::VidModel;
use crate::smoothing::{SmoothingProfile, SmoothingTable};

/// Which Gaussian term is added to each mock voxel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawChannel {
    /// Stabilization width, comparable to `Bi_S`.
    Control,
    /// Instrument noise, comparable to `Bi`.
    #[default]
    Full,
}

/// Histograms of the mock voxels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrawResult {
    /// Intensity unit of `edges`.
    pub unit: IntensityUnit,
    /// Bin edges (the model's).
    pub edges: Vec<f64>,
    /// Per-draw bin counts.
    pub counts: Vec<Vec<u64>>,
    /// Mean fraction of voxels per bin over all draws.
    pub mean_probabilities: Vec<f64>,
}

fn fraction_sampler(p: &SmoothingProfile) -> Result<WeightedIndex<f64>> {
    WeightedIndex::new(p.counts.iter().map(|&c| c as f64))
        .map_err(|e| Error::Computation(format!("smoothing profile cannot be sampled: {}", e)))
}

/// Bin of `t` in `edges`; the last bin is closed on the right.
fn bin_index(edges: &[f64], t: f64) -> Option<usize> {
    let n_bins = edges.len().checked_sub(1)?;
    if n_bins == 0 || !(t >= edges[0] && t <= edges[n_bins]) {
        return None;
    }
    let b = edges.partition_point(|&e| e <= t) - 1;
    Some(b.min(n_bins - 1))
}

/// Draw `n_draws` independent maps of `n_voxels` voxels each.
///
/// Draw `d` is seeded with `seed + d`, so results do not depend on the
/// number of threads.
pub fn draw_histograms(
    model: &mut VidModel,
    n_draws: usize,
    n_voxels: usize,
    seed: u64,
    channel: DrawChannel,
) -> Result<DrawResult> {
    if n_draws == 0 || n_voxels == 0 {
        return Err(Error::Validation("need at least one draw and one voxel".into()));
    }
    let conv = model.conversion()?;
    let table = model.mass_table()?;
    let smoothing = model.smoothing()?;
    let edges = model.bin_edges()?;
    let mean = model.mean_intensity()?;
    let cfg = model.config();
    let sigma_dex = cfg.scatter.sigma_dex;
    let shift = if cfg.control.subtract_mean { mean } else { 0.0 };
    let noise_sigma = match channel {
        DrawChannel::Control => cfg.control.sigma_stable,
        DrawChannel::Full => cfg.noise.effective_sigma(),
    };

    let volume = conv.geometry.volume;
    let rates: Vec<f64> = (0..table.len())
        .map(|i| {
            let count = smoothing.for_mass(i).total_count() as f64;
            table.weights[i] * volume * table.dndm[i] * count
        })
        .collect();
    let lambda: f64 = rates.iter().sum();
    let occupancy = if lambda > 0.0 {
        let poisson = Poisson::new(lambda).map_err(|e| Error::Computation(format!("{}", e)))?;
        let masses =
            WeightedIndex::new(&rates).map_err(|e| Error::Computation(format!("mass grid cannot be sampled: {}", e)))?;
        Some((poisson, masses))
    } else {
        None
    };
    let fractions: Vec<WeightedIndex<f64>> = match &*smoothing {
        SmoothingTable::Shared(p) => vec![fraction_sampler(p)?],
        SmoothingTable::PerMass(v) => v.iter().map(fraction_sampler).collect::<Result<_>>()?,
    };
    let noise = if noise_sigma > 0.0 {
        Some(Normal::new(0.0, noise_sigma).map_err(|e| Error::Computation(format!("{}", e)))?)
    } else {
        None
    };
    log::debug!("drawing {} maps of {} voxels, {:.3} contributions per voxel", n_draws, n_voxels, lambda);

    let n_bins = edges.len() - 1;
    let counts: Vec<Vec<u64>> = (0..n_draws)
        .into_par_iter()
        .map(|d| {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(d as u64));
            let mut hist = vec![0u64; n_bins];
            for _ in 0..n_voxels {
                let mut t = -shift;
                if let Some((poisson, masses)) = &occupancy {
                    let n: f64 = poisson.sample(&mut rng);
                    for _ in 0..n as u64 {
                        let i = masses.sample(&mut rng);
                        let p = smoothing.for_mass(i);
                        let sampler = &fractions[if fractions.len() == 1 { 0 } else { i }];
                        let l = p.fractions[sampler.sample(&mut rng)];
                        t += l * table.intensity[i] * lognormal::sample_factor(&mut rng, sigma_dex);
                    }
                }
                if let Some(noise) = &noise {
                    t += noise.sample(&mut rng);
                }
                if let Some(b) = bin_index(&edges, t) {
                    hist[b] += 1;
                }
            }
            hist
        })
        .collect();

    let total = (n_draws * n_voxels) as f64;
    let mut mean_probabilities = vec![0.0; n_bins];
    for h in &counts {
        for (m, &c) in mean_probabilities.iter_mut().zip(h) {
            *m += c as f64 / total;
        }
    }
    Ok(DrawResult { unit: conv.unit, edges: edges.to_vec(), counts, mean_probabilities })
}
