//! Probability building blocks for limvid.
//!
//! This crate hosts the reusable math of the intensity-distribution engine:
//! - base distributions (mean-preserving lognormal, Gaussian, Poisson)
//! - special functions (Dawson integral)
//! - grids and quadrature helpers (linspace/geomspace, bin centres, trapezoid rule)

pub mod lognormal;
pub mod math;
pub mod normal;
pub mod poisson;
