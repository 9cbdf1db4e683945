//! Binning of a recovered density.

use vid_core::{BinnedVid, DensityCurve, Error, Result};
use vid_prob::math::{bin_centers, geomspace, linspace};

use crate::config::BinKind;

/// Bin edges on `[t_min, t_max]`; log spacing falls back to linear when
/// `t_min <= 0`.
pub fn bin_edges(t_min: f64, t_max: f64, n_bins: usize, kind: BinKind) -> Result<Vec<f64>> {
    if n_bins == 0 || !(t_max > t_min) || !t_min.is_finite() || !t_max.is_finite() {
        return Err(Error::Validation(format!(
            "bins need n_bins > 0 and t_min < t_max, got {} bins on [{}, {}]",
            n_bins, t_min, t_max
        )));
    }
    match kind {
        BinKind::Log if t_min > 0.0 => Ok(geomspace(t_min, t_max, n_bins + 1)),
        BinKind::Log => {
            log::info!("t_min = {} is not positive; using linear bins", t_min);
            Ok(linspace(t_min, t_max, n_bins + 1))
        }
        BinKind::Linear => Ok(linspace(t_min, t_max, n_bins + 1)),
    }
}

/// Integral of the piecewise-linear interpolant from `t[0]` to `x`.
fn cumulative_at(t: &[f64], cum: &[f64], p: &[f64], x: f64) -> f64 {
    let n = t.len();
    if x <= t[0] {
        return 0.0;
    }
    if x >= t[n - 1] {
        return cum[n - 1];
    }
    let i = t.partition_point(|&v| v <= x) - 1;
    let h = t[i + 1] - t[i];
    let dx = x - t[i];
    let px = p[i] + (p[i + 1] - p[i]) * dx / h;
    cum[i] + 0.5 * dx * (p[i] + px)
}

/// Probability per bin: the exact integral of the linearly interpolated
/// density, zero outside the grid.
pub fn integrate_bins(curve: &DensityCurve, edges: &[f64]) -> Result<BinnedVid> {
    let (t, p) = (&curve.t, &curve.density);
    if t.len() < 2 || t.len() != p.len() {
        return Err(Error::Validation(format!(
            "density curve needs >= 2 matching samples, got {} points and {} values",
            t.len(),
            p.len()
        )));
    }
    if edges.len() < 2 || edges.windows(2).any(|w| !(w[1] > w[0])) {
        return Err(Error::Validation("bin edges must be strictly increasing".into()));
    }
    let mut cum = Vec::with_capacity(t.len());
    cum.push(0.0);
    for i in 1..t.len() {
        cum.push(cum[i - 1] + 0.5 * (t[i] - t[i - 1]) * (p[i] + p[i - 1]));
    }
    let at_edges: Vec<f64> = edges.iter().map(|&e| cumulative_at(t, &cum, p, e)).collect();
    let probabilities = at_edges.windows(2).map(|w| w[1] - w[0]).collect();
    Ok(BinnedVid { unit: curve.unit, edges: edges.to_vec(), centers: bin_centers(edges), probabilities })
}
