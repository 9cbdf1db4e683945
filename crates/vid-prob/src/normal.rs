//! Normal distribution utilities.

use statrs::function::erf::erf;
use std::f64::consts::SQRT_2;
use vid_core::{Error, Result};

/// Natural log of `sqrt(2π)`.
const LN_SQRT_2PI: f64 = 0.918_938_533_204_672_7;

fn check_sigma(sigma: f64) -> Result<()> {
    if !sigma.is_finite() || sigma <= 0.0 {
        return Err(Error::Validation(format!("sigma must be finite and > 0, got {}", sigma)));
    }
    Ok(())
}

/// Log-PDF of a Normal distribution `N(mu, sigma)` at `x`.
pub fn logpdf(x: f64, mu: f64, sigma: f64) -> Result<f64> {
    check_sigma(sigma)?;
    let z = (x - mu) / sigma;
    Ok(-0.5 * z * z - sigma.ln() - LN_SQRT_2PI)
}

/// PDF of `N(mu, sigma)` at `x`.
pub fn pdf(x: f64, mu: f64, sigma: f64) -> Result<f64> {
    Ok(logpdf(x, mu, sigma)?.exp())
}

/// Probability mass of `N(mu, sigma)` inside `[a, b]`.
///
/// `0.5 * (erf((b-mu)/(√2σ)) - erf((a-mu)/(√2σ)))`; this is also the fraction
/// of a Gaussian-smoothed point source falling in a cell.
pub fn interval_mass(a: f64, b: f64, mu: f64, sigma: f64) -> Result<f64> {
    check_sigma(sigma)?;
    let s = SQRT_2 * sigma;
    Ok(0.5 * (erf((b - mu) / s) - erf((a - mu) / s)))
}

/// Log of the Gaussian characteristic function `exp(-ω²σ²/2)`.
#[inline]
pub fn log_cf(omega: f64, sigma: f64) -> f64 {
    -0.5 * omega * omega * sigma * sigma
}
