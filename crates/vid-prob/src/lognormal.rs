//! Mean-preserving lognormal scatter in dex.
//!
//! `log10 X ~ N(log10 mean - μ0, σ)` with `μ0 = σ² ln(10) / 2`, so that
//! `E[X] = mean` for every width `σ`.

use rand::Rng;
use rand_distr::{Distribution, StandardNormal};
use std::f64::consts::{LN_10, PI};
use vid_core::{Error, Result};

/// Log-mean shift `σ² ln(10) / 2` that keeps the linear mean fixed.
#[inline]
pub fn mean_shift(sigma_dex: f64) -> f64 {
    0.5 * sigma_dex * sigma_dex * LN_10
}

fn check(mean: f64, sigma_dex: f64) -> Result<()> {
    if !mean.is_finite() || mean <= 0.0 {
        return Err(Error::Validation(format!("lognormal mean must be finite and > 0, got {}", mean)));
    }
    if !sigma_dex.is_finite() || sigma_dex <= 0.0 {
        return Err(Error::Validation(format!(
            "lognormal width must be finite and > 0 dex, got {}",
            sigma_dex
        )));
    }
    Ok(())
}

/// Density of the mean-preserving lognormal at `x`.
pub fn pdf(x: f64, mean: f64, sigma_dex: f64) -> Result<f64> {
    check(mean, sigma_dex)?;
    if x <= 0.0 {
        return Ok(0.0);
    }
    let u = (x / mean).log10() + mean_shift(sigma_dex);
    Ok((-u * u / (2.0 * sigma_dex * sigma_dex)).exp() / (x * sigma_dex * LN_10 * (2.0 * PI).sqrt()))
}

/// Draw one multiplicative factor with unit mean.
///
/// `sigma_dex == 0` returns exactly 1.
pub fn sample_factor<R: Rng + ?Sized>(rng: &mut R, sigma_dex: f64) -> f64 {
    if sigma_dex <= 0.0 {
        return 1.0;
    }
    let z: f64 = StandardNormal.sample(rng);
    10f64.powf(sigma_dex * z - mean_shift(sigma_dex))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{geomspace, trapz};
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_normalized_and_mean_preserving() {
        let x = geomspace(1e-4, 1e3, 200_001);
        let p: Vec<f64> = x.iter().map(|&v| pdf(v, 2.5, 0.3).unwrap()).collect();
        let xp: Vec<f64> = x.iter().zip(&p).map(|(a, b)| a * b).collect();
        assert_relative_eq!(trapz(&x, &p), 1.0, epsilon = 1e-6);
        assert_relative_eq!(trapz(&x, &xp), 2.5, epsilon = 1e-5);
    }

    #[test]
    fn test_sample_mean() {
        let mut rng = StdRng::seed_from_u64(42);
        let n = 200_000;
        let mean: f64 = (0..n).map(|_| sample_factor(&mut rng, 0.2)).sum::<f64>() / n as f64;
        // sd of the factor is ~0.49, so the standard error is ~1e-3.
        assert!((mean - 1.0).abs() < 6e-3, "mean={}", mean);
        assert_eq!(sample_factor(&mut rng, 0.0), 1.0);
    }

    #[test]
    fn test_invalid() {
        assert!(pdf(1.0, -1.0, 0.2).is_err());
        assert!(pdf(1.0, 1.0, 0.0).is_err());
        assert_eq!(pdf(-1.0, 1.0, 0.2).unwrap(), 0.0);
    }
}
