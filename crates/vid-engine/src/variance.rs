//! Matter-density variance smoothed on the voxel scale.
//!
//! `σ²_δ = ∫ d³k/(2π)³ W²(k) P(k) K(k) G(k)` with the box window
//! `W = Π_a sinc(k_a r_a / 2)`, optional Kaiser boost `K = (1 + f/b̄ μ²)²` and
//! optional Fingers-of-God damping `G`. The positive octant is integrated with
//! Gauss–Legendre nodes in `ln k` along each axis and multiplied by 8.

use rayon::prelude::*;
use std::f64::consts::PI;
use std::str::FromStr;
use vid_core::{PowerSpectrum, Result};
use vid_models::TabulatedPowerSpectrum;
use vid_prob::math::sinc;

use crate::config::{ClusteringConfig, Damping, RsdConfig};
use crate::conversion::Conversion;
use crate::population::MassTable;
use crate::quadrature::GaussLegendre;

/// Redshift-space terms of the integrand.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RedshiftSpace {
    /// Damping model.
    pub damping: Damping,
    /// Velocity dispersion scale, Mpc.
    pub sigma_nl: f64,
    /// Growth rate over the mean bias, `f / b̄`.
    pub beta: f64,
}

impl RedshiftSpace {
    fn factor(&self, k_par: f64, k: f64) -> f64 {
        let mu2 = if k > 0.0 { (k_par / k).powi(2) } else { 0.0 };
        let kaiser = (1.0 + self.beta * mu2).powi(2);
        let x = k_par * self.sigma_nl;
        let fog = match self.damping {
            Damping::Lorentzian => (1.0 + 0.5 * x * x).powi(-2),
            Damping::Gaussian => (-x * x).exp(),
        };
        kaiser * fog
    }
}

/// Integrate `P(k)` over the voxel window.
///
/// `r_perp` and `r_par` are the voxel sides; the third axis is the line of sight.
pub fn voxel_variance(
    power: &dyn PowerSpectrum,
    r_perp: f64,
    r_par: f64,
    k_min: f64,
    k_max: f64,
    n_k: usize,
    rsd: Option<RedshiftSpace>,
) -> Result<f64> {
    let rule = GaussLegendre::new(n_k)?;
    // Nodes in ln k: dk = k du.
    let axis: Vec<(f64, f64)> = rule.map_to_interval(k_min.ln(), k_max.ln()).map(|(u, w)| (u.exp(), w * u.exp())).collect();
    let w_perp: Vec<f64> = axis.iter().map(|&(k, _)| sinc(0.5 * k * r_perp).powi(2)).collect();
    let w_par: Vec<f64> = axis.iter().map(|&(k, _)| sinc(0.5 * k * r_par).powi(2)).collect();

    let partial = (0..axis.len())
        .into_par_iter()
        .map(|ix| -> Result<f64> {
            let (kx, wx) = axis[ix];
            let mut acc = 0.0;
            for (iy, &(ky, wy)) in axis.iter().enumerate() {
                let wxy = wx * wy * w_perp[ix] * w_perp[iy];
                for (iz, &(kz, wz)) in axis.iter().enumerate() {
                    let k = (kx * kx + ky * ky + kz * kz).sqrt();
                    let mut v = wxy * wz * w_par[iz] * power.power(k)?;
                    if let Some(rsd) = &rsd {
                        v *= rsd.factor(kz, k);
                    }
                    acc += v;
                }
            }
            Ok(acc)
        })
        .collect::<Result<Vec<f64>>>()?;
    Ok(8.0 * partial.iter().sum::<f64>() / (2.0 * PI).powi(3))
}

/// Resolve the configured density variance.
pub fn density_variance(clustering: &ClusteringConfig, conversion: &Conversion, table: &MassTable) -> Result<f64> {
    match clustering {
        ClusteringConfig::None => Ok(0.0),
        ClusteringConfig::Fixed { variance } => Ok(*variance),
        ClusteringConfig::PowerSpectrum { table: path, k_min, k_max, n_k, rsd } => {
            let power = TabulatedPowerSpectrum::from_path(path)?;
            let rsd = rsd.as_ref().map(|r| redshift_space(r, conversion, table)).transpose()?;
            let g = &conversion.geometry;
            let var = voxel_variance(&power, g.side_perp, g.side_par, *k_min, *k_max, *n_k, rsd)?;
            log::debug!("density variance on the voxel scale: {:.4e} (rsd: {})", var, rsd.is_some());
            Ok(var)
        }
    }
}

fn redshift_space(cfg: &RsdConfig, conversion: &Conversion, table: &MassTable) -> Result<RedshiftSpace> {
    let growth = cfg.growth_rate.unwrap_or(conversion.growth_rate);
    Ok(RedshiftSpace {
        damping: Damping::from_str(&cfg.damping)?,
        sigma_nl: cfg.sigma_nl_mpc,
        beta: growth / table.mean_bias()?,
    })
}
