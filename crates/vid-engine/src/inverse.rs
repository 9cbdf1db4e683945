//! Inverse transform from the piecewise frequency samples to a density on the
//! symmetric intensity grid `T_k = k·dT`, `k ∈ [-n_T/2, n_T/2)`.
//!
//! `P(T_k) = (1/2π) Σ_j w_j [F(f_j) e^{+i f_j T_k} + conj(F(f_j)) e^{-i f_j T_k}]`.
//! With `x_j = f_j·dT` the phases are `e^{±i k x_j}`, a type-1 NUFFT. Linear
//! intervals are folded back by whole periods first; since `k` is an integer
//! the fold leaves every phase unchanged.

use num_complex::Complex64;
use std::f64::consts::PI;
use vid_core::{DensityCurve, Error, IntensityUnit, Result};
use vid_prob::math::trapz;

use crate::frequency_grid::FrequencyGrid;
use crate::nufft::Type1Plan;

/// Largest tolerated normalization drift before a warning.
pub const NORM_TOLERANCE: f64 = 0.05;

/// Inverse transform for a fixed intensity grid.
#[derive(Debug)]
pub struct InverseTransform {
    plan: Type1Plan,
    n_t: usize,
    dt: f64,
    cf_floor: f64,
}

impl InverseTransform {
    /// Plan for `n_t` grid points spaced `dt`.
    pub fn new(n_t: usize, dt: f64, tolerance: f64, cf_floor: f64) -> Result<Self> {
        if !(dt > 0.0) {
            return Err(Error::Validation(format!("intensity spacing must be > 0, got {}", dt)));
        }
        Ok(Self { plan: Type1Plan::new(n_t, tolerance)?, n_t, dt, cf_floor })
    }

    /// Intensity grid points.
    pub fn grid(&self) -> Vec<f64> {
        let half = (self.n_t / 2) as i64;
        (-half..half).map(|k| k as f64 * self.dt).collect()
    }

    /// Recover the density from characteristic-function samples on `grid`.
    pub fn invert(&self, grid: &FrequencyGrid, cf: &[Complex64], unit: IntensityUnit) -> Result<DensityCurve> {
        if cf.len() != grid.points.len() {
            return Err(Error::Validation(format!(
                "characteristic function has {} samples for {} frequencies",
                cf.len(),
                grid.points.len()
            )));
        }
        if (grid.dt - self.dt).abs() > 1e-12 * self.dt {
            return Err(Error::Validation(format!(
                "frequency grid is aligned to dT={} but the inverse transform uses dT={}",
                grid.dt, self.dt
            )));
        }

        let mut positions: Vec<Vec<f64>> = Vec::new();
        let mut strengths: Vec<Vec<Complex64>> = Vec::new();
        let mut skipped = 0usize;
        for i in 0..grid.n_intervals() {
            let range = grid.interval(i);
            let samples = &cf[range.clone()];
            if samples.iter().all(|v| v.norm() < self.cf_floor) {
                skipped += 1;
                continue;
            }
            let shift = grid.unwrap_shift(i);
            let mut x = Vec::with_capacity(2 * range.len());
            let mut c = Vec::with_capacity(2 * range.len());
            for (j, &v) in range.zip(samples) {
                let xj = grid.points[j] * self.dt - shift;
                let w = grid.weights[j];
                x.push(xj);
                c.push(v * w);
                x.push(-xj);
                c.push(v.conj() * w);
            }
            positions.push(x);
            strengths.push(c);
        }
        log::debug!(
            "inverse transform: {} of {} intervals below {:e}, skipped",
            skipped,
            grid.n_intervals(),
            self.cf_floor
        );

        let sums = self
            .plan
            .execute_batches(positions.iter().zip(&strengths).map(|(x, c)| (x.as_slice(), c.as_slice())))?;
        let density: Vec<f64> = sums.iter().map(|s| s.re / (2.0 * PI)).collect();
        let t = self.grid();
        let norm = trapz(&t, &density);
        if (norm - 1.0).abs() > NORM_TOLERANCE {
            log::warn!(
                "recovered density integrates to {:.4} (tolerance {}); widen the intensity range or refine the frequency grid",
                norm,
                NORM_TOLERANCE
            );
        }
        Ok(DensityCurve { unit, t, density, norm })
    }
}

/// Analytic Gaussian noise density on the intensity grid.
pub fn gaussian_density(t: Vec<f64>, sigma: f64, unit: IntensityUnit) -> Result<DensityCurve> {
    if !(sigma > 0.0) {
        return Err(Error::Validation(format!("noise-only density needs sigma > 0, got {}", sigma)));
    }
    let density = t
        .iter()
        .map(|&x| vid_prob::normal::pdf(x, 0.0, sigma))
        .collect::<Result<Vec<f64>>>()?;
    let norm = trapz(&t, &density);
    Ok(DensityCurve { unit, t, density, norm })
}
