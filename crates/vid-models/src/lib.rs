//! # vid-models
//!
//! Strategy implementations of the `vid-core` collaborator traits, and the
//! registry that resolves them by name.
//!
//! Built-in models are deliberately simple parametric forms. Anything else
//! (fitting functions, tabulated simulation output) plugs in through
//! [`ModelRegistry::register_mass_function`] and friends without touching
//! the engine.

#![warn(missing_docs)]

pub mod bias;
pub mod cosmology;
pub mod line_width;
pub mod luminosity;
pub mod mass_function;
pub mod registry;

pub use cosmology::{FlatLambdaCdm, TabulatedPowerSpectrum};
pub use line_width::LineWidth;
pub use registry::{ModelRegistry, ModelSpec};
