//! Monotone cubic Hermite interpolation (Fritsch–Carlson).

use vid_core::{Error, Result};

/// Shape-preserving cubic through `(x_i, y_i)`; zero outside `[x_0, x_k]`.
#[derive(Debug, Clone)]
pub struct MonotoneCubic {
    x: Vec<f64>,
    y: Vec<f64>,
    slopes: Vec<f64>,
}

impl MonotoneCubic {
    /// Build from strictly increasing knots.
    pub fn new(x: Vec<f64>, y: Vec<f64>) -> Result<Self> {
        let k = x.len();
        if k < 2 {
            return Err(Error::Validation("monotone cubic requires at least 2 knots".into()));
        }
        if y.len() != k {
            return Err(Error::Validation(format!("knots length ({}) != values length ({})", k, y.len())));
        }
        if x.iter().chain(&y).any(|v| !v.is_finite()) {
            return Err(Error::Validation("monotone cubic knots must be finite".into()));
        }
        for i in 1..k {
            if x[i] <= x[i - 1] {
                return Err(Error::Validation(format!(
                    "knots must be strictly increasing, but x[{}]={} >= x[{}]={}",
                    i - 1,
                    x[i - 1],
                    i,
                    x[i]
                )));
            }
        }
        let slopes = fritsch_carlson_slopes(&x, &y);
        Ok(Self { x, y, slopes })
    }

    /// Evaluate at `x`.
    pub fn eval(&self, x: f64) -> f64 {
        let k = self.x.len();
        if x < self.x[0] || x > self.x[k - 1] {
            return 0.0;
        }
        let i = self.x.partition_point(|&v| v <= x).saturating_sub(1).min(k - 2);

        let h = self.x[i + 1] - self.x[i];
        let t = (x - self.x[i]) / h;

        let h00 = (1.0 + 2.0 * t) * (1.0 - t) * (1.0 - t);
        let h10 = t * (1.0 - t) * (1.0 - t);
        let h01 = t * t * (3.0 - 2.0 * t);
        let h11 = t * t * (t - 1.0);

        h00 * self.y[i] + h10 * h * self.slopes[i] + h01 * self.y[i + 1] + h11 * h * self.slopes[i + 1]
    }
}

fn fritsch_carlson_slopes(x: &[f64], y: &[f64]) -> Vec<f64> {
    let k = x.len();
    let delta: Vec<f64> = (0..k - 1).map(|i| (y[i + 1] - y[i]) / (x[i + 1] - x[i])).collect();

    let mut m = vec![0.0; k];
    m[0] = delta[0];
    for i in 1..k - 1 {
        m[i] = if delta[i - 1] * delta[i] <= 0.0 { 0.0 } else { 0.5 * (delta[i - 1] + delta[i]) };
    }
    m[k - 1] = delta[k - 2];

    for i in 0..k - 1 {
        if delta[i].abs() < 1e-300 {
            m[i] = 0.0;
            m[i + 1] = 0.0;
            continue;
        }
        let alpha = m[i] / delta[i];
        let beta = m[i + 1] / delta[i];
        let phi = alpha * alpha + beta * beta;
        if phi > 9.0 {
            let tau = 3.0 / phi.sqrt();
            m[i] = tau * alpha * delta[i];
            m[i + 1] = tau * beta * delta[i];
        }
    }
    m
}
