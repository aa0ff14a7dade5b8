//! Tunable parameters of the response calculations. Every field has the
//! value the post-processor has always used, so an empty config file and no
//! config file are equivalent.

use crate::domain::{ResponseError, ResponseResult};
use crate::numerics::DampingKernel;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResponseSettings {
    pub optical: OpticalSettings,
    pub nonlinear: NonlinearSettings,
}

impl ResponseSettings {
    pub fn load(path: impl AsRef<Path>) -> ResponseResult<Self> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|source| {
            ResponseError::io_system(
                "IO.CONFIG_READ",
                format!("failed to read settings '{}': {source}", path.display()),
            )
        })?;
        serde_json::from_str(&source).map_err(|source| {
            ResponseError::configuration(
                "CONFIG.PARSE",
                format!("failed to parse settings '{}': {source}", path.display()),
            )
        })
    }
}

/// Linear optical conductivity. Energies given in eV are divided by the
/// store's energy scale before use.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct OpticalSettings {
    pub fermi_energy_ev: f64,
    pub broadening_ev: f64,
    pub energy_limit: f64,
    pub frequency_count: usize,
    pub min_frequency: f64,
    pub max_frequency: f64,
    pub unit_scale: f64,
    pub damping: DampingKernel,
    pub output_file: String,
}

impl Default for OpticalSettings {
    fn default() -> Self {
        Self {
            fermi_energy_ev: 0.2,
            broadening_ev: 0.0166,
            energy_limit: 0.99,
            frequency_count: 60,
            min_frequency: 0.01,
            max_frequency: 1.5,
            unit_scale: 1.0,
            damping: DampingKernel::Jackson,
            output_file: "optical_cond.dat".to_string(),
        }
    }
}

/// Second-order optical conductivity. Fermi level and broadening are
/// already in rescaled units.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct NonlinearSettings {
    pub fermi_level: f64,
    pub broadening: f64,
    pub energy_limit: f64,
    pub frequency_count: usize,
    pub min_frequency: f64,
    pub max_frequency: f64,
    pub damping: DampingKernel,
    pub output_file: String,
}

impl Default for NonlinearSettings {
    fn default() -> Self {
        Self {
            fermi_level: 0.0,
            broadening: 0.003_388_299,
            energy_limit: 0.995,
            frequency_count: 1001,
            min_frequency: 0.0,
            max_frequency: 2.0,
            damping: DampingKernel::Jackson,
            output_file: "nonlinear_cond.dat".to_string(),
        }
    }
}
