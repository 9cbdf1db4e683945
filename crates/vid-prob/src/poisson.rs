//! Poisson distribution utilities.

use statrs::function::gamma::ln_gamma;
use vid_core::{Error, Result};

/// Log-PMF of `Poisson(lambda)` at `k`.
pub fn logpmf(k: u64, lambda: f64) -> Result<f64> {
    if !lambda.is_finite() || lambda < 0.0 {
        return Err(Error::Validation(format!("lambda must be finite and >= 0, got {}", lambda)));
    }
    if lambda == 0.0 {
        return Ok(if k == 0 { 0.0 } else { f64::NEG_INFINITY });
    }
    let kf = k as f64;
    Ok(kf * lambda.ln() - lambda - ln_gamma(kf + 1.0))
}

/// PMF of `Poisson(lambda)` at `k`.
pub fn pmf(k: u64, lambda: f64) -> Result<f64> {
    Ok(logpmf(k, lambda)?.exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_pmf_sums_to_one() {
        let total: f64 = (0..60).map(|k| pmf(k, 3.7).unwrap()).sum();
        assert_relative_eq!(total, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_known_value() {
        // P(2; 1.5) = 1.5^2 e^-1.5 / 2
        assert_relative_eq!(pmf(2, 1.5).unwrap(), 1.125 * (-1.5f64).exp(), epsilon = 1e-13);
    }

    #[test]
    fn test_zero_rate() {
        assert_eq!(pmf(0, 0.0).unwrap(), 1.0);
        assert_eq!(pmf(3, 0.0).unwrap(), 0.0);
        assert!(logpmf(1, -1.0).is_err());
    }
}
