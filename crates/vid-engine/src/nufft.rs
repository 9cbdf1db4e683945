//! Type-1 non-uniform FFT on a 1-D periodic domain.
//!
//! Computes `f_k = Σ_j c_j exp(+i k x_j)` for `k ∈ [-N/2, N/2)` by spreading
//! the strengths onto a 2× oversampled grid with the exponential-of-semicircle
//! kernel `φ(z) = exp(β(√(1−z²) − 1))`, one FFT, and division by the kernel's
//! Fourier transform. Relative accuracy (w.r.t. `Σ|c_j|`) is about the
//! requested tolerance.

use num_complex::Complex64;
use rustfft::{Fft, FftPlanner};
use std::f64::consts::PI;
use std::sync::Arc;
use vid_core::{Error, Result};

use crate::quadrature::GaussLegendre;

/// Reusable plan for a fixed number of output modes and tolerance.
pub struct Type1Plan {
    n_modes: usize,
    n_fine: usize,
    width: usize,
    beta: f64,
    h: f64,
    alpha: f64,
    correction: Vec<f64>,
    fft: Arc<dyn Fft<f64>>,
}

impl std::fmt::Debug for Type1Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Type1Plan")
            .field("n_modes", &self.n_modes)
            .field("n_fine", &self.n_fine)
            .field("width", &self.width)
            .field("beta", &self.beta)
            .finish()
    }
}

impl Type1Plan {
    /// Plan for `n_modes` (even) outputs at relative tolerance `tol`.
    pub fn new(n_modes: usize, tol: f64) -> Result<Self> {
        if n_modes < 2 || n_modes % 2 != 0 {
            return Err(Error::Validation(format!("NUFFT needs an even number of modes >= 2, got {}", n_modes)));
        }
        if !(tol > 0.0 && tol < 1.0) {
            return Err(Error::Validation(format!("NUFFT tolerance must be in (0, 1), got {}", tol)));
        }
        let width = ((1.0 / tol).log10().ceil() as usize + 1).clamp(2, 16);
        let beta = 2.30 * width as f64;
        let n_fine = (2 * n_modes).max(2 * width);
        let h = 2.0 * PI / n_fine as f64;
        let alpha = 0.5 * width as f64 * h;

        // Φ(k) = α ∫_{-1}^{1} φ(z) cos(k α z) dz, k = 0..N/2.
        let rule = GaussLegendre::new(4 * width + 32)?;
        let half = n_modes / 2;
        let mut phi_hat = Vec::with_capacity(half + 1);
        for k in 0..=half {
            let ka = k as f64 * alpha;
            let v = rule.integrate(-1.0, 1.0, |z| es_kernel(z, beta) * (ka * z).cos());
            phi_hat.push(alpha * v);
        }
        if phi_hat.iter().any(|v| !(*v > 0.0)) {
            return Err(Error::Computation("NUFFT kernel transform is not positive".into()));
        }
        let correction = phi_hat.iter().map(|p| h / p).collect();

        let fft = FftPlanner::<f64>::new().plan_fft_inverse(n_fine);
        Ok(Self { n_modes, n_fine, width, beta, h, alpha, correction, fft })
    }

    /// Number of output modes.
    pub fn n_modes(&self) -> usize {
        self.n_modes
    }

    /// Spread `(x_j, c_j)` pairs onto the fine grid (accumulating).
    fn spread(&self, grid: &mut [Complex64], points: &[f64], strengths: &[Complex64]) {
        let n = self.n_fine as i64;
        for (&x, &c) in points.iter().zip(strengths) {
            if c.re == 0.0 && c.im == 0.0 {
                continue;
            }
            let xf = x.rem_euclid(2.0 * PI);
            let l0 = ((xf - self.alpha) / self.h).ceil() as i64;
            for l in l0..=l0 + self.width as i64 {
                let z = (l as f64 * self.h - xf) / self.alpha;
                if z.abs() >= 1.0 {
                    continue;
                }
                grid[l.rem_euclid(n) as usize] += c * es_kernel(z, self.beta);
            }
        }
    }

    /// Evaluate the sum for one batch of points.
    pub fn execute(&self, points: &[f64], strengths: &[Complex64]) -> Result<Vec<Complex64>> {
        self.execute_batches(std::iter::once((points, strengths)))
    }

    /// Evaluate the sum over several batches of points with a single FFT.
    pub fn execute_batches<'a, I>(&self, batches: I) -> Result<Vec<Complex64>>
    where
        I: IntoIterator<Item = (&'a [f64], &'a [Complex64])>,
    {
        let mut grid = vec![Complex64::new(0.0, 0.0); self.n_fine];
        for (points, strengths) in batches {
            if points.len() != strengths.len() {
                return Err(Error::Validation(format!(
                    "NUFFT batch has {} points but {} strengths",
                    points.len(),
                    strengths.len()
                )));
            }
            self.spread(&mut grid, points, strengths);
        }
        self.fft.process(&mut grid);

        let half = (self.n_modes / 2) as i64;
        let n = self.n_fine as i64;
        let out: Vec<Complex64> = (-half..half)
            .map(|k| grid[k.rem_euclid(n) as usize] * self.correction[k.unsigned_abs() as usize])
            .collect();
        Ok(out)
    }
}

#[inline]
fn es_kernel(z: f64, beta: f64) -> f64 {
    let s = 1.0 - z * z;
    if s <= 0.0 {
        return 0.0;
    }
    (beta * (s.sqrt() - 1.0)).exp()
}

/// Direct `O(N·M)` evaluation, for validation.
pub fn direct_type1(n_modes: usize, points: &[f64], strengths: &[Complex64]) -> Vec<Complex64> {
    let half = (n_modes / 2) as i64;
    (-half..half)
        .map(|k| {
            points
                .iter()
                .zip(strengths)
                .map(|(&x, &c)| c * Complex64::from_polar(1.0, k as f64 * x))
                .sum::<Complex64>()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn max_error(a: &[Complex64], b: &[Complex64]) -> f64 {
        a.iter().zip(b).map(|(x, y)| (x - y).norm()).fold(0.0, f64::max)
    }

    #[test]
    fn test_matches_direct_sum() {
        let mut rng = StdRng::seed_from_u64(7);
        let m = 300;
        let points: Vec<f64> = (0..m).map(|_| rng.gen_range(-3.0 * PI..3.0 * PI)).collect();
        let strengths: Vec<Complex64> =
            (0..m).map(|_| Complex64::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0))).collect();
        let l1: f64 = strengths.iter().map(|c| c.norm()).sum();

        for tol in [1e-6, 1e-10] {
            let plan = Type1Plan::new(64, tol).unwrap();
            let fast = plan.execute(&points, &strengths).unwrap();
            let slow = direct_type1(64, &points, &strengths);
            let err = max_error(&fast, &slow);
            assert!(err < 10.0 * tol * l1, "tol {} err {} (l1 {})", tol, err, l1);
        }
    }

    #[test]
    fn test_batches_are_additive() {
        let plan = Type1Plan::new(32, 1e-9).unwrap();
        let xa = [0.3, -1.2, 2.9];
        let ca = [Complex64::new(1.0, 0.5), Complex64::new(-0.2, 0.1), Complex64::new(0.0, 1.0)];
        let xb = [5.0, -7.5];
        let cb = [Complex64::new(0.7, 0.0), Complex64::new(0.1, -0.3)];
        let joint = plan.execute_batches([(&xa[..], &ca[..]), (&xb[..], &cb[..])]).unwrap();
        let a = plan.execute(&xa, &ca).unwrap();
        let b = plan.execute(&xb, &cb).unwrap();
        let sum: Vec<Complex64> = a.iter().zip(&b).map(|(x, y)| x + y).collect();
        assert!(max_error(&joint, &sum) < 1e-12);
    }

    #[test]
    fn test_single_point_is_a_phasor() {
        let plan = Type1Plan::new(16, 1e-12).unwrap();
        let out = plan.execute(&[0.25], &[Complex64::new(1.0, 0.0)]).unwrap();
        for (idx, v) in out.iter().enumerate() {
            let k = idx as f64 - 8.0;
            let expect = Complex64::from_polar(1.0, 0.25 * k);
            assert!((v - expect).norm() < 1e-9, "k={} got {} want {}", k, v, expect);
        }
    }

    #[test]
    fn test_rejects_odd_modes() {
        assert!(Type1Plan::new(15, 1e-6).is_err());
        assert!(Type1Plan::new(16, 0.0).is_err());
    }
}
