//! Collaborator traits for limvid
//!
//! The intensity-distribution engine never hard-codes a halo model or a
//! cosmology: it consumes these strategy interfaces, and concrete models are
//! resolved by name through a registry (see `vid-models`).
//!
//! Units: masses in Msun, number densities in Mpc^-3 Msun^-1, luminosities
//! in Lsun, wavenumbers in Mpc^-1, H(z) in km/s/Mpc.

use crate::Result;

/// Halo mass function `dn/dM(M, z)`.
pub trait MassFunction: Send + Sync {
    /// Comoving number density per unit mass.
    fn dndm(&self, mass: f64, z: f64) -> Result<f64>;

    /// Model name
    fn name(&self) -> &str;
}

/// Linear halo bias `b(M, z)`.
pub trait HaloBias: Send + Sync {
    /// Bias of haloes of the given mass.
    fn bias(&self, mass: f64, z: f64) -> Result<f64>;

    /// Model name
    fn name(&self) -> &str;
}

/// Mean line luminosity assigned to a halo, `L(M, z)`.
pub trait MassLuminosity: Send + Sync {
    /// Mean (unscattered) luminosity.
    fn luminosity(&self, mass: f64, z: f64) -> Result<f64>;

    /// Model name
    fn name(&self) -> &str;
}

/// Matter power spectrum at the target redshift.
pub trait PowerSpectrum: Send + Sync {
    /// `P(k)` in Mpc^3.
    fn power(&self, k: f64) -> Result<f64>;
}

/// Background cosmology.
pub trait Cosmology: Send + Sync {
    /// Hubble rate in km/s/Mpc.
    fn hubble(&self, z: f64) -> f64;

    /// Logarithmic growth rate `f = dlnD/dlna`.
    fn growth_rate(&self, z: f64) -> f64;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FlatMassFunction;

    impl MassFunction for FlatMassFunction {
        fn dndm(&self, _mass: f64, _z: f64) -> Result<f64> {
            Ok(1.0)
        }

        fn name(&self) -> &str {
            "flat"
        }
    }

    #[test]
    fn test_trait_object_dispatch() {
        let hmf: Box<dyn MassFunction> = Box::new(FlatMassFunction);
        assert_eq!(hmf.name(), "flat");
        assert_eq!(hmf.dndm(1e10, 1.0).unwrap(), 1.0);
    }
}
