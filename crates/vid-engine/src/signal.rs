//! Signal cumulant: shot noise over the mass function plus the second-order
//! clustering correction.
//!
//! For mass `M_i` with occupancy weight `a_i = w_i·V·dn/dM_i` and smoothing
//! support `(l_ij, c_ij)`, the bracket is `g_i(f) = Σ_j c_ij (φ(f·l_ij·T_i) − 1)`.
//! Then `shot = Σ_i a_i g_i` and `clustering = (Σ_i a_i b_i g_i)² σ²_δ / 2`.

use num_complex::Complex64;
use rayon::prelude::*;
use vid_core::{Error, Result};

use crate::population::MassTable;
use crate::single_source::ReferenceTransform;
use crate::smoothing::SmoothingTable;

/// The two signal cumulant terms at one frequency.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalTerms {
    /// Poisson shot term.
    pub shot: Complex64,
    /// Clustering correction.
    pub clustering: Complex64,
}

impl SignalTerms {
    /// `shot + clustering`.
    pub fn total(&self) -> Complex64 {
        self.shot + self.clustering
    }
}

/// Borrowed inputs of the aggregation.
#[derive(Debug, Clone, Copy)]
pub struct SignalAggregator<'a> {
    table: &'a MassTable,
    smoothing: &'a SmoothingTable,
    reference: &'a ReferenceTransform,
    volume: f64,
    variance: f64,
}

impl<'a> SignalAggregator<'a> {
    /// Bundle the upstream stages.
    pub fn new(
        table: &'a MassTable,
        smoothing: &'a SmoothingTable,
        reference: &'a ReferenceTransform,
        volume: f64,
        variance: f64,
    ) -> Self {
        Self { table, smoothing, reference, volume, variance }
    }

    /// Both cumulant terms at `f >= 0`.
    pub fn terms(&self, f: f64) -> Result<SignalTerms> {
        if !(f >= 0.0) {
            return Err(Error::Validation(format!(
                "signal cumulant evaluated at negative frequency {}; use conjugate symmetry",
                f
            )));
        }
        let t = self.table;
        let mut shot = Complex64::new(0.0, 0.0);
        let mut biased = Complex64::new(0.0, 0.0);
        for i in 0..t.len() {
            let a = t.weights[i] * self.volume * t.dndm[i];
            if a == 0.0 {
                continue;
            }
            let p = self.smoothing.for_mass(i);
            let ft = f * t.intensity[i];
            let mut g = Complex64::new(0.0, 0.0);
            for (&l, &c) in p.fractions.iter().zip(&p.counts) {
                g += (self.reference.at(ft * l) - 1.0) * c as f64;
            }
            shot += g * a;
            biased += g * (a * t.bias[i]);
        }
        let clustering = if self.variance > 0.0 { biased * biased * (0.5 * self.variance) } else { Complex64::new(0.0, 0.0) };
        Ok(SignalTerms { shot, clustering })
    }

    /// `shot + clustering` at `f >= 0`.
    pub fn cumulant(&self, f: f64) -> Result<Complex64> {
        Ok(self.terms(f)?.total())
    }

    /// Cumulants at every frequency, in parallel.
    pub fn cumulants(&self, freqs: &[f64]) -> Result<Vec<Complex64>> {
        freqs.par_iter().map(|&f| self.cumulant(f)).collect()
    }
}
