//! # vid-engine
//!
//! Voxel intensity distribution (VID) of a line-intensity map.
//!
//! The pipeline, leaves first:
//! - quadrature rules and the piecewise log + linear frequency grid
//! - the single-source characteristic function (lognormal scatter) and the
//!   voxel smoothing profiles
//! - the signal cumulant (shot noise + clustering) integrated over halo mass
//! - the channel combiner (stabilization or instrument noise)
//! - the inverse transform back to a density, and binning
//!
//! [`VidModel`] memoizes every stage behind an explicit dependency graph.
//!
//! ## Conventions
//!
//! The forward transform uses `exp(-i f T)`; densities are recovered with
//! `P(T) = (1/2π) ∫ F(f) exp(+i f T) df`.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Verify-on-read memo slots.
pub mod cache;
/// Stabilization / noise channels.
pub mod channel;
/// YAML/JSON configuration.
pub mod config;
/// Survey geometry and luminosity-to-intensity conversion.
pub mod conversion;
/// Piecewise frequency grid.
pub mod frequency_grid;
/// Density binning.
pub mod histogram;
/// Monotone cubic interpolation.
pub mod interp;
/// Frequency-to-intensity inverse transform.
pub mod inverse;
/// Memoized model and dependency graph.
pub mod model;
/// Type-1 non-uniform FFT.
pub mod nufft;
/// Halo population tables.
pub mod population;
/// Gauss–Legendre rules and tables.
pub mod quadrature;
/// Signal cumulant aggregation.
pub mod signal;
/// Single-source characteristic function.
pub mod single_source;
/// Voxel smoothing profiles.
pub mod smoothing;
/// Monte Carlo validation sampler.
pub mod toys;
/// Voxel-scale density variance.
pub mod variance;

pub use channel::{Channel, ChannelKind};
pub use config::{BinKind, ClusteringConfig, Damping, VidConfig};
pub use model::{Stage, VidModel, VidReport};
pub use quadrature::{GaussLegendre, QuadratureSource};
pub use toys::{draw_histograms, DrawChannel, DrawResult};
