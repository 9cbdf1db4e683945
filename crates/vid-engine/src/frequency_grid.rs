//! Piecewise log + linear conjugate-frequency grid.
//!
//! The log region covers `[f_min, N_π·π/dT]` and resolves the slowly varying
//! low-frequency part of the characteristic function. Beyond it every interval
//! spans exactly one period `2·N_π·π/dT` of the intensity grid, so its samples
//! can be shifted back into `[-N_π·π, N_π·π]` before the inverse transform.

use std::f64::consts::PI;
use std::ops::Range;
use vid_core::{Error, Result};
use vid_prob::math::geomspace;

use crate::quadrature::GaussLegendre;

/// Periodicity margin: number of half-periods covered by the log region.
pub const N_PI: usize = 2;

/// Flattened frequency samples plus the interval bookkeeping needed to invert.
#[derive(Debug, Clone)]
pub struct FrequencyGrid {
    /// All sample frequencies, interval by interval.
    pub points: Vec<f64>,
    /// Quadrature weights already scaled by each interval's half-width.
    pub weights: Vec<f64>,
    /// Interval edges (log edges followed by linear edges).
    pub edges: Vec<f64>,
    /// Number of log-spaced edges.
    pub n_log_edges: usize,
    /// Nodes per interval.
    pub nodes_per_interval: usize,
    /// Intensity-grid spacing the linear region is aligned to.
    pub dt: f64,
}

impl FrequencyGrid {
    /// Build the grid for an intensity half-range `t_max` sampled by `n_t`
    /// points, refined by `rule` on every interval.
    pub fn build(t_max: f64, n_t: usize, f_min: f64, f_max: f64, rule: &GaussLegendre) -> Result<Self> {
        if !(f_min > 0.0) || !f_min.is_finite() {
            return Err(Error::Validation(format!("frequency lower bound must be > 0, got {}", f_min)));
        }
        if !(f_max > f_min) {
            return Err(Error::Validation(format!("frequency bounds must satisfy f_min < f_max, got [{}, {}]", f_min, f_max)));
        }
        if !(t_max > 0.0) || n_t < 2 || n_t % 2 != 0 {
            return Err(Error::Validation(format!(
                "intensity grid needs t_max > 0 and an even n_t >= 2, got t_max={} n_t={}",
                t_max, n_t
            )));
        }
        rule.validate()?;

        let dt = 2.0 * t_max / n_t as f64;
        let n_pi = N_PI as f64;
        let f_thresh = n_pi * PI / dt;
        if f_min >= f_thresh {
            return Err(Error::Validation(format!(
                "frequency lower bound {} must be below the log-region end {}",
                f_min, f_thresh
            )));
        }

        let n_log_edges = ((f_thresh / f_min).log10() + 10.0).ceil() as usize;
        let mut edges = geomspace(f_min, f_thresh, n_log_edges);

        // One period per linear interval, starting one period past the log region.
        let x_max = f_max * dt;
        let period = 2.0 * n_pi * PI;
        let mut m = 1usize;
        loop {
            let x = n_pi * PI + period * m as f64;
            if x >= x_max {
                break;
            }
            edges.push(x / dt);
            m += 1;
        }

        let n_nodes = rule.len();
        let n_intervals = edges.len() - 1;
        let mut points = Vec::with_capacity(n_intervals * n_nodes);
        let mut weights = Vec::with_capacity(n_intervals * n_nodes);
        for w in edges.windows(2) {
            for (x, wx) in rule.map_to_interval(w[0], w[1]) {
                points.push(x);
                weights.push(wx);
            }
        }

        log::debug!(
            "frequency grid: {} log edges, {} linear intervals, {} points up to {:.3e}",
            n_log_edges,
            edges.len() - n_log_edges,
            points.len(),
            edges[edges.len() - 1]
        );
        Ok(Self { points, weights, edges, n_log_edges, nodes_per_interval: n_nodes, dt })
    }

    /// Number of intervals.
    pub fn n_intervals(&self) -> usize {
        self.edges.len() - 1
    }

    /// Index range of interval `i` inside `points` / `weights`.
    pub fn interval(&self, i: usize) -> Range<usize> {
        i * self.nodes_per_interval..(i + 1) * self.nodes_per_interval
    }

    /// Start offsets of every interval, plus the total length.
    pub fn interval_offsets(&self) -> Vec<usize> {
        (0..=self.n_intervals()).map(|i| i * self.nodes_per_interval).collect()
    }

    /// Phase shift (in units of `f·dT`) that folds interval `i` back into
    /// `[-N_π·π, N_π·π]`; zero inside the log region.
    pub fn unwrap_shift(&self, i: usize) -> f64 {
        if i + 1 >= self.n_log_edges {
            2.0 * N_PI as f64 * PI * (i + 2 - self.n_log_edges) as f64
        } else {
            0.0
        }
    }

    /// Largest sampled frequency.
    pub fn max_point(&self) -> f64 {
        self.points.last().copied().unwrap_or(0.0)
    }
}
