//! Gauss–Legendre quadrature on bounded 1-D intervals.
//!
//! Rules are either computed on the fly (Newton iteration on the Legendre
//! recurrence) or loaded from a two-column `node weight` table, so very high
//! orders can be precomputed once and shipped with a survey configuration.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use vid_core::{Error, Result};

/// Where a quadrature rule comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuadratureSource {
    /// Compute an `n`-point rule.
    Order(usize),
    /// Load a precomputed table.
    Table(PathBuf),
}

impl QuadratureSource {
    /// Materialize the rule.
    pub fn load(&self) -> Result<GaussLegendre> {
        match self {
            Self::Order(n) => GaussLegendre::new(*n),
            Self::Table(path) => GaussLegendre::from_table(path),
        }
    }

    /// Modification time of a table file; `None` for computed rules or when
    /// the filesystem does not report one.
    pub fn modified(&self) -> Option<SystemTime> {
        match self {
            Self::Order(_) => None,
            Self::Table(path) => std::fs::metadata(path).and_then(|m| m.modified()).ok(),
        }
    }
}

/// Nodes and weights on `[-1, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussLegendre {
    /// Nodes, increasing.
    pub nodes: Vec<f64>,
    /// Weights (sum to 2).
    pub weights: Vec<f64>,
}

impl GaussLegendre {
    /// Compute the `n`-point rule.
    ///
    /// Newton iteration from the Chebyshev-like initial guess; only half the
    /// roots are computed and mirrored.
    pub fn new(n: usize) -> Result<Self> {
        if n == 0 {
            return Err(Error::Validation("quadrature order must be > 0".into()));
        }
        let mut nodes = vec![0.0f64; n];
        let mut weights = vec![0.0f64; n];
        if n == 1 {
            weights[0] = 2.0;
            return Ok(Self { nodes, weights });
        }

        let nf = n as f64;
        for i in 0..n.div_ceil(2) {
            let mut x = ((std::f64::consts::PI * (i as f64 + 0.75)) / (nf + 0.5)).cos();
            let mut dp = 0.0;
            for _ in 0..100 {
                let (p1, p0) = legendre_pair(n, x);
                dp = nf * (x * p1 - p0) / (x * x - 1.0);
                let dx = p1 / dp;
                x -= dx;
                if dx.abs() < 1e-15 {
                    break;
                }
            }
            // Derivative at the converged root.
            let (p1, p0) = legendre_pair(n, x);
            if p1.is_finite() && p0.is_finite() {
                dp = nf * (x * p1 - p0) / (x * x - 1.0);
            }
            let w = 2.0 / ((1.0 - x * x) * dp * dp);

            nodes[i] = -x;
            nodes[n - 1 - i] = x;
            weights[i] = w;
            weights[n - 1 - i] = w;
        }
        Ok(Self { nodes, weights })
    }

    /// Parse a two-column table (`#` comments allowed).
    pub fn parse_table(text: &str) -> Result<Self> {
        let mut nodes = Vec::new();
        let mut weights = Vec::new();
        for (lineno, raw) in text.lines().enumerate() {
            let line = raw.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let mut cols = line.split_whitespace();
            let (Some(x), Some(w)) = (cols.next(), cols.next()) else {
                return Err(Error::Validation(format!(
                    "quadrature table line {}: expected 'node weight'",
                    lineno + 1
                )));
            };
            let parse = |s: &str| {
                s.parse::<f64>().map_err(|e| {
                    Error::Validation(format!("quadrature table line {}: '{}': {}", lineno + 1, s, e))
                })
            };
            nodes.push(parse(x)?);
            weights.push(parse(w)?);
        }
        let rule = Self { nodes, weights };
        rule.validate()?;
        Ok(rule)
    }

    /// Load a table from disk.
    pub fn from_table(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let rule = Self::parse_table(&text)?;
        log::debug!("loaded {}-point quadrature table from {}", rule.len(), path.display());
        Ok(rule)
    }

    /// Render as a two-column table.
    pub fn to_table_string(&self) -> String {
        let mut out = String::with_capacity(self.len() * 48);
        let _ = writeln!(out, "# Gauss-Legendre rule, {} nodes on [-1, 1]: node weight", self.len());
        for (x, w) in self.nodes.iter().zip(&self.weights) {
            let _ = writeln!(out, "{:.17e} {:.17e}", x, w);
        }
        out
    }

    /// Write the table to disk.
    pub fn write_table(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_table_string())?;
        Ok(())
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the rule is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Sanity checks for rules that did not come from [`GaussLegendre::new`].
    pub fn validate(&self) -> Result<()> {
        if self.nodes.is_empty() || self.nodes.len() != self.weights.len() {
            return Err(Error::Validation(format!(
                "quadrature rule needs matching non-empty columns, got {} nodes and {} weights",
                self.nodes.len(),
                self.weights.len()
            )));
        }
        if self.nodes.iter().any(|x| !(-1.0..=1.0).contains(x)) {
            return Err(Error::Validation("quadrature nodes must lie in [-1, 1]".into()));
        }
        if self.weights.iter().any(|w| !(*w > 0.0)) {
            return Err(Error::Validation("quadrature weights must be > 0".into()));
        }
        let total: f64 = self.weights.iter().sum();
        if (total - 2.0).abs() > 1e-8 {
            return Err(Error::Validation(format!("quadrature weights sum to {}, expected 2", total)));
        }
        Ok(())
    }

    /// Nodes and weights mapped affinely onto `[a, b]`.
    pub fn map_to_interval(&self, a: f64, b: f64) -> impl Iterator<Item = (f64, f64)> + '_ {
        let half = 0.5 * (b - a);
        let mid = 0.5 * (a + b);
        self.nodes.iter().zip(&self.weights).map(move |(&x, &w)| (mid + half * x, half * w))
    }

    /// `∫_a^b f(x) dx`.
    pub fn integrate<F: FnMut(f64) -> f64>(&self, a: f64, b: f64, mut f: F) -> f64 {
        self.map_to_interval(a, b).map(|(x, w)| w * f(x)).sum()
    }
}

/// `(P_n(x), P_{n-1}(x))` by the three-term recurrence.
fn legendre_pair(n: usize, x: f64) -> (f64, f64) {
    let mut p0 = 1.0f64;
    let mut p1 = x;
    for j in 2..=n {
        let jf = j as f64;
        let p2 = ((2.0 * jf - 1.0) * x * p1 - (jf - 1.0) * p0) / jf;
        p0 = p1;
        p1 = p2;
    }
    (p1, p0)
}
