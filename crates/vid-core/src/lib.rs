//! # vid-core
//!
//! Core types and traits for limvid, a voxel intensity distribution engine
//! for line-intensity mapping.
//!
//! This crate provides:
//! - the error type shared by every crate of the workspace
//! - the collaborator traits (mass function, bias, luminosity, cosmology, P(k))
//! - output types carrying the intensity unit

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use traits::{Cosmology, HaloBias, MassFunction, MassLuminosity, PowerSpectrum};
pub use types::{BinnedVid, DensityCurve, IntensityUnit};

/// limvid version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
