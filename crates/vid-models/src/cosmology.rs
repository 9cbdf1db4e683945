//! Background cosmology and tabulated matter power spectra.

use serde::{Deserialize, Serialize};
use std::path::Path;
use vid_core::{Cosmology, Error, PowerSpectrum, Result};

/// Flat ΛCDM background.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlatLambdaCdm {
    /// Dimensionless Hubble constant.
    pub h: f64,
    /// Matter density today.
    pub omega_m: f64,
}

impl Default for FlatLambdaCdm {
    fn default() -> Self {
        Self { h: 0.6774, omega_m: 0.3089 }
    }
}

impl FlatLambdaCdm {
    /// Check the parameters are physical.
    pub fn validate(&self) -> Result<()> {
        if !(self.h > 0.0) || !(0.0..=1.0).contains(&self.omega_m) {
            return Err(Error::Validation(format!("invalid cosmology {:?}", self)));
        }
        Ok(())
    }

    fn e2(&self, z: f64) -> f64 {
        self.omega_m * (1.0 + z).powi(3) + 1.0 - self.omega_m
    }
}

impl Cosmology for FlatLambdaCdm {
    fn hubble(&self, z: f64) -> f64 {
        100.0 * self.h * self.e2(z).sqrt()
    }

    /// Linder's approximation `Ω_m(z)^0.55`.
    fn growth_rate(&self, z: f64) -> f64 {
        (self.omega_m * (1.0 + z).powi(3) / self.e2(z)).powf(0.55)
    }
}

/// Power spectrum tabulated at increasing `k`, interpolated in log–log and
/// extrapolated as a power law beyond both ends.
#[derive(Debug, Clone)]
pub struct TabulatedPowerSpectrum {
    ln_k: Vec<f64>,
    ln_p: Vec<f64>,
}

impl TabulatedPowerSpectrum {
    /// Build from samples.
    pub fn new(k: Vec<f64>, p: Vec<f64>) -> Result<Self> {
        if k.len() != p.len() || k.len() < 2 {
            return Err(Error::Validation(format!(
                "power spectrum table needs >= 2 matching rows, got {} k and {} P",
                k.len(),
                p.len()
            )));
        }
        if k[0] <= 0.0 || k.windows(2).any(|w| w[1] <= w[0]) {
            return Err(Error::Validation("power spectrum k must be positive and strictly increasing".into()));
        }
        if p.iter().any(|v| !v.is_finite() || *v <= 0.0) {
            return Err(Error::Validation("power spectrum values must be finite and > 0".into()));
        }
        Ok(Self { ln_k: k.iter().map(|v| v.ln()).collect(), ln_p: p.iter().map(|v| v.ln()).collect() })
    }

    /// Parse two whitespace-separated columns `k P(k)`; `#` starts a comment.
    pub fn parse(text: &str) -> Result<Self> {
        let mut k = Vec::new();
        let mut p = Vec::new();
        for (lineno, raw) in text.lines().enumerate() {
            let line = raw.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let cols: Vec<&str> = line.split_whitespace().collect();
            if cols.len() < 2 {
                return Err(Error::Validation(format!("power spectrum line {}: expected 2 columns", lineno + 1)));
            }
            let parse = |s: &str| {
                s.parse::<f64>().map_err(|e| {
                    Error::Validation(format!("power spectrum line {}: '{}': {}", lineno + 1, s, e))
                })
            };
            k.push(parse(cols[0])?);
            p.push(parse(cols[1])?);
        }
        Self::new(k, p)
    }

    /// Load a two-column table from disk.
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let out = Self::parse(&text)?;
        log::debug!("loaded power spectrum with {} rows from {}", out.ln_k.len(), path.display());
        Ok(out)
    }

    fn segment(&self, lnk: f64) -> usize {
        let n = self.ln_k.len();
        self.ln_k.partition_point(|&v| v <= lnk).clamp(1, n - 1) - 1
    }
}

impl PowerSpectrum for TabulatedPowerSpectrum {
    fn power(&self, k: f64) -> Result<f64> {
        if !(k > 0.0) {
            return Err(Error::Validation(format!("P(k) requested at non-positive k = {}", k)));
        }
        let lnk = k.ln();
        let i = self.segment(lnk);
        let slope = (self.ln_p[i + 1] - self.ln_p[i]) / (self.ln_k[i + 1] - self.ln_k[i]);
        Ok((self.ln_p[i] + slope * (lnk - self.ln_k[i])).exp())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Write;

    #[test]
    fn test_hubble_today() {
        let c = FlatLambdaCdm { h: 0.7, omega_m: 0.3 };
        assert_relative_eq!(c.hubble(0.0), 70.0, max_relative = 1e-12);
        assert_relative_eq!(c.growth_rate(0.0), 0.3f64.powf(0.55), max_relative = 1e-12);
        // Matter domination at high z.
        assert!(c.growth_rate(20.0) > 0.99);
    }

    #[test]
    fn test_power_law_table_extrapolates() {
        let k = vec![0.01, 0.1, 1.0];
        let p: Vec<f64> = k.iter().map(|x: &f64| 1e3 * x.powf(-1.0)).collect();
        let ps = TabulatedPowerSpectrum::new(k, p).unwrap();
        assert_relative_eq!(ps.power(0.3).unwrap(), 1e3 / 0.3, max_relative = 1e-10);
        assert_relative_eq!(ps.power(10.0).unwrap(), 1e2, max_relative = 1e-10);
        assert_relative_eq!(ps.power(1e-3).unwrap(), 1e6, max_relative = 1e-10);
        assert!(ps.power(0.0).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "# k [1/Mpc]  P [Mpc^3]").unwrap();
        writeln!(f, "0.01 2000.0").unwrap();
        writeln!(f, "1.0  20.0   # tail").unwrap();
        let ps = TabulatedPowerSpectrum::from_path(f.path()).unwrap();
        assert_relative_eq!(ps.power(0.1).unwrap(), 200.0, max_relative = 1e-10);
    }

    #[test]
    fn test_bad_table() {
        assert!(TabulatedPowerSpectrum::parse("0.1 1.0\n0.05 2.0\n").is_err());
        assert!(TabulatedPowerSpectrum::parse("0.1\n").is_err());
    }
}
