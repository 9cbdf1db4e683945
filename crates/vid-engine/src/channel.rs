//! Channel combiner: adds the stabilization or noise cumulant and the
//! optional mean-subtraction phase, then exponentiates.

use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use vid_prob::normal::log_cf;

/// Which Gaussian term closes the signal cumulant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// Signal only, damped by an artificial Gaussian of width `sigma`.
    Control {
        /// Stabilization width.
        sigma: f64,
    },
    /// Signal plus instrument noise of width `sigma`.
    Full {
        /// Effective noise rms.
        sigma: f64,
    },
}

impl ChannelKind {
    /// Width of the Gaussian term.
    pub fn sigma(&self) -> f64 {
        match *self {
            Self::Control { sigma } | Self::Full { sigma } => sigma,
        }
    }
}

/// A channel: Gaussian term plus optional shift by `-mean`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Channel {
    /// Gaussian term.
    pub kind: ChannelKind,
    /// Mean intensity subtracted from the distribution, if any.
    pub mean_shift: Option<f64>,
}

impl Channel {
    /// Cumulant contributed by the channel at `f`.
    pub fn cumulant(&self, f: f64) -> Complex64 {
        let gauss = log_cf(f, self.kind.sigma());
        match self.mean_shift {
            Some(mean) => Complex64::new(gauss, f * mean),
            None => Complex64::new(gauss, 0.0),
        }
    }

    /// `exp(signal + channel)` at `f`.
    pub fn characteristic(&self, signal: Complex64, f: f64) -> Complex64 {
        (signal + self.cumulant(f)).exp()
    }

    /// Characteristic function on a whole grid.
    pub fn apply(&self, freqs: &[f64], signal: &[Complex64]) -> Vec<Complex64> {
        freqs.iter().zip(signal).map(|(&f, &s)| self.characteristic(s, f)).collect()
    }
}
