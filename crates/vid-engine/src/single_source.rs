//! Characteristic function of a single source with lognormal luminosity scatter.
//!
//! The transform is tabulated once at the reference intensity `T_ref = 1`;
//! a source of mean intensity `T` is obtained from the scaling law
//! `φ_T(f) = φ_ref(f·T)`, exact for a mass-independent dex scatter.

use num_complex::Complex64;
use rayon::prelude::*;
use vid_core::{Error, Result};
use vid_prob::lognormal;
use vid_prob::math::{bin_centers, geomspace, interp_linear, trapz};

use crate::config::ScatterConfig;
use crate::quadrature::GaussLegendre;

/// Edges of the dense log-spaced intensity grid.
pub const DENSE_EDGES: usize = (1 << 15) + 1;

/// Tabulated reference transform, linear in the complex value.
#[derive(Debug, Clone)]
pub struct CfTable {
    freqs: Vec<f64>,
    values: Vec<Complex64>,
    ln_first: f64,
    inv_step: f64,
}

impl CfTable {
    fn new(freqs: Vec<f64>, values: Vec<Complex64>) -> Result<Self> {
        if freqs.len() < 2 || freqs.len() != values.len() {
            return Err(Error::Validation(format!(
                "transform table needs >= 2 matching samples, got {} frequencies and {} values",
                freqs.len(),
                values.len()
            )));
        }
        let n = freqs.len();
        let ln_first = freqs[0].ln();
        let inv_step = (n - 1) as f64 / (freqs[n - 1].ln() - ln_first);
        Ok(Self { freqs, values, ln_first, inv_step })
    }

    /// Tabulated frequencies.
    pub fn frequencies(&self) -> &[f64] {
        &self.freqs
    }

    /// Tabulated values.
    pub fn values(&self) -> &[Complex64] {
        &self.values
    }

    #[inline]
    fn at(&self, x: f64) -> Complex64 {
        let n = self.freqs.len();
        if x < self.freqs[0] {
            return Complex64::new(1.0, 0.0);
        }
        if x > self.freqs[n - 1] {
            return Complex64::new(0.0, 0.0);
        }
        let mut i = (((x.ln() - self.ln_first) * self.inv_step) as usize).min(n - 2);
        // Log-index rounding can land one cell off.
        while i > 0 && x < self.freqs[i] {
            i -= 1;
        }
        while i + 2 < n && x > self.freqs[i + 1] {
            i += 1;
        }
        let t = (x - self.freqs[i]) / (self.freqs[i + 1] - self.freqs[i]);
        self.values[i] + (self.values[i + 1] - self.values[i]) * t
    }
}

/// Reference single-source transform.
#[derive(Debug, Clone)]
pub enum ReferenceTransform {
    /// No scatter: the exact phase `exp(-i f)`.
    Delta,
    /// Scattered luminosity, tabulated on log-spaced frequencies.
    Tabulated(CfTable),
}

impl ReferenceTransform {
    /// Build the reference transform for the configured scatter.
    ///
    /// The normalized lognormal density on the dense grid is integrated
    /// against `exp(-i f T)` with `n_panels` panels of equal width in `ln T`,
    /// each refined by `rule`.
    pub fn build(scatter: &ScatterConfig, rule: &GaussLegendre, n_panels: usize) -> Result<Self> {
        let sigma = scatter.sigma_dex;
        if sigma == 0.0 {
            return Ok(Self::Delta);
        }
        if n_panels == 0 {
            return Err(Error::Validation("forward transform needs at least one panel".into()));
        }
        let span = scatter.n_log_sigma * sigma;
        let edges = geomspace(10f64.powf(-2.0 * span), 10f64.powf(span), DENSE_EDGES);
        let centers = bin_centers(&edges);
        let pdf = centers.iter().map(|&t| lognormal::pdf(t, 1.0, sigma)).collect::<Result<Vec<f64>>>()?;
        let norm = trapz(&centers, &pdf);
        if !(norm > 0.0) || !norm.is_finite() {
            return Err(Error::Computation(format!("lognormal density has invalid normalization {}", norm)));
        }

        let ln_a = centers[0].ln();
        let ln_b = centers[centers.len() - 1].ln();
        let step = (ln_b - ln_a) / n_panels as f64;
        let mut nodes = Vec::with_capacity(n_panels * rule.len());
        let mut strengths = Vec::with_capacity(n_panels * rule.len());
        for p in 0..n_panels {
            let a = ln_a + step * p as f64;
            for (u, wu) in rule.map_to_interval(a, a + step) {
                let t = u.exp();
                nodes.push(t);
                strengths.push(wu * t * interp_linear(&centers, &pdf, t, 0.0) / norm);
            }
        }
        let total: f64 = strengths.iter().sum();
        if !(total > 0.0) {
            return Err(Error::Computation("forward transform has no support".into()));
        }
        for s in &mut strengths {
            *s /= total;
        }

        let freqs = geomspace(scatter.f_ref_min, scatter.f_ref_max, scatter.n_ref);
        let values: Vec<Complex64> = freqs
            .par_iter()
            .map(|&f| {
                nodes.iter().zip(&strengths).map(|(&t, &s)| Complex64::from_polar(s, -f * t)).sum::<Complex64>()
            })
            .collect();
        log::debug!(
            "reference transform: sigma={} dex, {} nodes, {} frequencies in [{:.1e}, {:.1e}], quadrature mass {:.6}",
            sigma,
            nodes.len(),
            freqs.len(),
            scatter.f_ref_min,
            scatter.f_ref_max,
            total
        );
        Ok(Self::Tabulated(CfTable::new(freqs, values)?))
    }

    /// Transform at the reference intensity. Negative frequencies are
    /// rejected; the negative branch is the complex conjugate.
    pub fn evaluate(&self, f: f64) -> Result<Complex64> {
        if !(f >= 0.0) {
            return Err(Error::Validation(format!(
                "single-source transform queried at negative frequency {}; use conjugate symmetry",
                f
            )));
        }
        Ok(self.at(f))
    }

    /// Transform of a source with mean intensity `intensity`.
    pub fn scaled(&self, f: f64, intensity: f64) -> Result<Complex64> {
        if !(intensity >= 0.0) {
            return Err(Error::Validation(format!("source intensity must be >= 0, got {}", intensity)));
        }
        self.evaluate(f * intensity)
    }

    /// Unchecked evaluation for `x >= 0`.
    #[inline]
    pub(crate) fn at(&self, x: f64) -> Complex64 {
        match self {
            Self::Delta => Complex64::from_polar(1.0, -x),
            Self::Tabulated(table) => table.at(x),
        }
    }
}
