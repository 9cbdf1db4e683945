//! Name → strategy registry.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use vid_core::{Error, HaloBias, MassFunction, MassLuminosity, Result};

use crate::bias::{ConstantBias, PowerLawBias};
use crate::luminosity::{ConstantLuminosity, DoublePowerLuminosity, MassPowLuminosity};
use crate::mass_function::{PowerLawMassFunction, SchechterMassFunction};

/// A model reference: registry name plus numeric parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Registry name.
    pub name: String,
    /// Named parameters.
    #[serde(default)]
    pub params: BTreeMap<String, f64>,
}

impl ModelSpec {
    /// Spec without parameters.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), params: BTreeMap::new() }
    }

    /// Builder-style parameter setter.
    pub fn with(mut self, key: &str, value: f64) -> Self {
        self.params.insert(key.to_string(), value);
        self
    }

    /// Required finite parameter.
    pub fn param(&self, key: &str) -> Result<f64> {
        match self.params.get(key) {
            Some(v) if v.is_finite() => Ok(*v),
            Some(v) => Err(Error::Validation(format!(
                "model '{}': parameter '{}' must be finite, got {}",
                self.name, key, v
            ))),
            None => Err(Error::Validation(format!(
                "model '{}' requires parameter '{}'",
                self.name, key
            ))),
        }
    }

    /// Optional finite parameter with a default.
    pub fn param_or(&self, key: &str, default: f64) -> Result<f64> {
        if self.params.contains_key(key) { self.param(key) } else { Ok(default) }
    }

    /// Reject parameters the model does not know (catches typos in configs).
    pub fn check_keys(&self, allowed: &[&str]) -> Result<()> {
        for key in self.params.keys() {
            if !allowed.contains(&key.as_str()) {
                return Err(Error::Validation(format!(
                    "model '{}' has no parameter '{}' (expected one of {:?})",
                    self.name, key, allowed
                )));
            }
        }
        Ok(())
    }
}

type MassFunctionCtor = Box<dyn Fn(&ModelSpec) -> Result<Arc<dyn MassFunction>> + Send + Sync>;
type BiasCtor = Box<dyn Fn(&ModelSpec) -> Result<Arc<dyn HaloBias>> + Send + Sync>;
type LuminosityCtor = Box<dyn Fn(&ModelSpec) -> Result<Arc<dyn MassLuminosity>> + Send + Sync>;

/// Registry of model constructors, one table per category.
#[derive(Default)]
pub struct ModelRegistry {
    mass_functions: BTreeMap<String, MassFunctionCtor>,
    biases: BTreeMap<String, BiasCtor>,
    luminosities: BTreeMap<String, LuminosityCtor>,
}

impl std::fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("mass_functions", &self.mass_functions.keys().collect::<Vec<_>>())
            .field("biases", &self.biases.keys().collect::<Vec<_>>())
            .field("luminosities", &self.luminosities.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn unknown(category: &str, name: &str) -> Error {
    Error::UnknownModel { category: category.to_string(), name: name.to_string() }
}

impl ModelRegistry {
    /// Registry with no entries.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry holding every built-in model.
    pub fn with_builtins() -> Self {
        let mut reg = Self::empty();
        reg.register_mass_function("power_law", |s| Ok(Arc::new(PowerLawMassFunction::from_spec(s)?)));
        reg.register_mass_function("schechter", |s| Ok(Arc::new(SchechterMassFunction::from_spec(s)?)));
        reg.register_bias("constant", |s| Ok(Arc::new(ConstantBias::from_spec(s)?)));
        reg.register_bias("power_law", |s| Ok(Arc::new(PowerLawBias::from_spec(s)?)));
        reg.register_luminosity("constant", |s| Ok(Arc::new(ConstantLuminosity::from_spec(s)?)));
        reg.register_luminosity("mass_pow", |s| Ok(Arc::new(MassPowLuminosity::from_spec(s)?)));
        reg.register_luminosity("double_power", |s| Ok(Arc::new(DoublePowerLuminosity::from_spec(s)?)));
        reg
    }

    /// Add (or replace) a mass-function constructor.
    pub fn register_mass_function<F>(&mut self, name: &str, ctor: F)
    where
        F: Fn(&ModelSpec) -> Result<Arc<dyn MassFunction>> + Send + Sync + 'static,
    {
        self.mass_functions.insert(name.to_string(), Box::new(ctor));
    }

    /// Add (or replace) a bias constructor.
    pub fn register_bias<F>(&mut self, name: &str, ctor: F)
    where
        F: Fn(&ModelSpec) -> Result<Arc<dyn HaloBias>> + Send + Sync + 'static,
    {
        self.biases.insert(name.to_string(), Box::new(ctor));
    }

    /// Add (or replace) a mass–luminosity constructor.
    pub fn register_luminosity<F>(&mut self, name: &str, ctor: F)
    where
        F: Fn(&ModelSpec) -> Result<Arc<dyn MassLuminosity>> + Send + Sync + 'static,
    {
        self.luminosities.insert(name.to_string(), Box::new(ctor));
    }

    /// Resolve a mass function.
    pub fn mass_function(&self, spec: &ModelSpec) -> Result<Arc<dyn MassFunction>> {
        let ctor = self.mass_functions.get(&spec.name).ok_or_else(|| unknown("mass function", &spec.name))?;
        ctor(spec)
    }

    /// Resolve a bias model.
    pub fn bias(&self, spec: &ModelSpec) -> Result<Arc<dyn HaloBias>> {
        let ctor = self.biases.get(&spec.name).ok_or_else(|| unknown("bias", &spec.name))?;
        ctor(spec)
    }

    /// Resolve a mass–luminosity relation.
    pub fn luminosity(&self, spec: &ModelSpec) -> Result<Arc<dyn MassLuminosity>> {
        let ctor = self.luminosities.get(&spec.name).ok_or_else(|| unknown("luminosity", &spec.name))?;
        ctor(spec)
    }

    /// Registered mass-function names.
    pub fn mass_function_names(&self) -> Vec<&str> {
        self.mass_functions.keys().map(String::as_str).collect()
    }

    /// Registered bias names.
    pub fn bias_names(&self) -> Vec<&str> {
        self.biases.keys().map(String::as_str).collect()
    }

    /// Registered luminosity names.
    pub fn luminosity_names(&self) -> Vec<&str> {
        self.luminosities.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mass_function::TabulatedMassFunction;

    #[test]
    fn test_builtins_resolve() {
        let reg = ModelRegistry::with_builtins();
        let hmf = reg
            .mass_function(&ModelSpec::new("power_law").with("A", 1e-12).with("alpha", -1.9))
            .unwrap();
        assert_eq!(hmf.name(), "power_law");
        let lum = reg.luminosity(&ModelSpec::new("constant").with("L", 1e6)).unwrap();
        assert_eq!(lum.luminosity(1e11, 2.0).unwrap(), 1e6);
        assert!(reg.bias_names().contains(&"constant"));
    }

    #[test]
    fn test_unknown_name_is_error() {
        let reg = ModelRegistry::with_builtins();
        let err = reg.mass_function(&ModelSpec::new("sheth_tormen_typo")).err().unwrap();
        match err {
            Error::UnknownModel { category, name } => {
                assert_eq!(category, "mass function");
                assert_eq!(name, "sheth_tormen_typo");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_missing_and_unknown_params() {
        let reg = ModelRegistry::with_builtins();
        assert!(reg.luminosity(&ModelSpec::new("constant")).is_err());
        assert!(reg.bias(&ModelSpec::new("constant").with("b", 2.0).with("bb", 1.0)).is_err());
    }

    #[test]
    fn test_register_custom_model() {
        let mut reg = ModelRegistry::empty();
        reg.register_mass_function("table", |_spec| {
            Ok(Arc::new(TabulatedMassFunction::new(vec![1e9, 1e12], vec![1e-10, 1e-16])?))
        });
        let hmf = reg.mass_function(&ModelSpec::new("table")).unwrap();
        assert!(hmf.dndm(1e10, 0.0).unwrap() > 0.0);
    }

    #[test]
    fn test_spec_deserializes_without_params() {
        let spec: ModelSpec = serde_json::from_str(r#"{"name": "constant"}"#).unwrap();
        assert!(spec.params.is_empty());
    }
}
