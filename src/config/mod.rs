//! Server configuration and global model parameters.
//!
//! The server configuration is the bill-of-materials plus placement info:
//! which catalog parts go in the box, how many, the chassis form factor,
//! the rack and data-center selectors, and the utilization allocations.
//! Parameters are the process-wide knobs (emissions factor, PUE, PSU
//! efficiency, lifetime, fan model) loaded once at model construction,
//! with defaults substituted for absent optional keys. Both are typed
//! serde records validated at the loading boundary.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};
use crate::units::Quantity;

/// Hours-per-day x days-per-month factor converting kgCO2e/kWh to
/// kgCO2e/kW-month.
const MONTHLY_HOURS: f64 = 24.0 * 30.0;

/// Memory frequency as configured: either a bare MHz number or a full
/// label ("4800MHz"). Catalog lookups always use the label form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Frequency {
    MegaHertz(u64),
    Label(String),
}

impl Frequency {
    pub fn label(&self) -> String {
        match self {
            Frequency::MegaHertz(n) => format!("{}MHz", n),
            Frequency::Label(s) => s.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpuSelection {
    pub vendor: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub core_count: u32,
    pub number: f64,
    /// Cores reserved for non-tenant tasks: a percentage string ("10%")
    /// scales the virtual-core pool, a bare number subtracts a literal
    /// core count.
    #[serde(default)]
    pub overhead: Option<Quantity>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemorySelection {
    #[serde(rename = "type")]
    pub kind: String,
    pub frequency: Frequency,
    pub size: Quantity,
    pub number: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CxlSelection {
    #[serde(rename = "type")]
    pub kind: String,
    pub frequency: Frequency,
    pub size: Quantity,
    pub number: f64,
    /// Controller type; required whenever `number > 0`.
    #[serde(default)]
    pub controller: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SsdSelection {
    #[serde(rename = "type")]
    pub kind: String,
    pub size: Quantity,
    pub number: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NicSelection {
    pub bandwidth: String,
    pub number: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RackSelection {
    #[serde(rename = "type")]
    pub kind: String,
    /// Rack power budget.
    pub power: Quantity,
    /// Total rack space.
    pub capacity: Quantity,
    /// Utilization level assumed at rack provisioning; falls back to the
    /// server's allocated spec when absent.
    #[serde(default)]
    pub spec_allocation: Option<f64>,
    /// Explicit server-count override; ignored unless positive.
    #[serde(default)]
    pub num_servers: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DcSelection {
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OversubscriptionRates {
    /// Fraction of virtual cores subject to oversubscription.
    pub oversubscribable: f64,
    /// Oversubscription rate in [0, 1).
    pub rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OversubscriptionPolicy {
    /// When true, the rate applies to the whole virtual-core pool.
    pub only_oversubscribable: bool,
    pub cpu_oversubscription: OversubscriptionRates,
}

/// The hardware bill-of-materials plus placement info. Immutable once
/// loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub name: String,
    /// Server shell type, resolved against the server catalog.
    #[serde(rename = "type")]
    pub kind: String,
    /// Chassis form factor ("1U" or "2U").
    pub form: String,
    #[serde(default = "default_sockets")]
    pub sockets: u32,
    /// Allocated spec: the utilization level the server targets.
    pub spec: f64,
    pub cpu: CpuSelection,
    pub memory: MemorySelection,
    pub cxl: CxlSelection,
    pub ssd: SsdSelection,
    #[serde(default)]
    pub ssd_reuse: Option<SsdSelection>,
    pub nic: NicSelection,
    pub rack: RackSelection,
    pub dc: DcSelection,
    #[serde(default)]
    pub oversubscription: Option<OversubscriptionPolicy>,
}

fn default_sockets() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
struct ServerConfigFile {
    server: ServerConfig,
}

impl ServerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let source = fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    pub fn from_toml_str(source: &str) -> Result<Self> {
        let file: ServerConfigFile = toml::from_str(source)?;
        Ok(file.server)
    }

    /// Chassis height in rack units.
    pub fn form_units(&self) -> Result<f64> {
        Quantity::Text(self.form.clone()).rack_units()
    }
}

/// Fan power feedback model: `fan = base_fan + slope x (server power
/// without fan - base reference)`, with a per-form-factor reference.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FanModel {
    pub slope: f64,
    pub base_1u_watts: f64,
    pub base_2u_watts: f64,
}

impl FanModel {
    /// Reference server power for a chassis form factor.
    pub fn base_for(&self, form: &str) -> f64 {
        if form == "1U" {
            self.base_1u_watts
        } else {
            self.base_2u_watts
        }
    }
}

/// Global model parameters, normalized and validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Params {
    /// Emissions factor in kgCO2e per kW-month (converted from the
    /// configured kgCO2e/kWh at load time).
    pub emissions_factor_monthly: f64,
    pub pue: f64,
    pub psu_efficiency: f64,
    /// Model (amortization) lifetime in months.
    pub lifetime_months: f64,
    pub voltage_regulator_overhead: f64,
    pub cpu_efficiency: f64,
    /// Derating of actual usage relative to allocation, distinct from the
    /// spec-derate curves.
    pub power_factor: f64,
    /// Fan feedback model; `None` disables the feedback pass.
    pub fan: Option<FanModel>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawParams {
    emissions_factor: f64,
    #[serde(rename = "PUE")]
    pue: f64,
    #[serde(rename = "PSU_efficiency")]
    psu_efficiency: f64,
    lifetime: f64,
    voltage_regulator_overhead: f64,
    #[serde(default)]
    cpu_efficiency: Option<f64>,
    #[serde(default)]
    power_factor: Option<f64>,
    #[serde(default)]
    fan_slope: Option<f64>,
    #[serde(rename = "1U_server_base", default)]
    base_1u: Option<Quantity>,
    #[serde(rename = "2U_server_base", default)]
    base_2u: Option<Quantity>,
}

impl RawParams {
    fn apply_overrides(&mut self, overrides: &BTreeMap<String, f64>) -> Result<()> {
        for (key, &value) in overrides {
            match key.as_str() {
                "emissions_factor" => self.emissions_factor = value,
                "PUE" => self.pue = value,
                "PSU_efficiency" => self.psu_efficiency = value,
                "lifetime" => self.lifetime = value,
                "voltage_regulator_overhead" => self.voltage_regulator_overhead = value,
                "cpu_efficiency" => self.cpu_efficiency = Some(value),
                "power_factor" => self.power_factor = Some(value),
                "fan_slope" => self.fan_slope = Some(value),
                "1U_server_base" if self.base_1u.is_some() => {
                    self.base_1u = Some(Quantity::Number(value))
                }
                "2U_server_base" if self.base_2u.is_some() => {
                    self.base_2u = Some(Quantity::Number(value))
                }
                _ => {
                    return Err(ModelError::Configuration(format!(
                        "parameter '{}' not found in params",
                        key
                    )))
                }
            }
        }
        Ok(())
    }

    fn finish(self) -> Result<Params> {
        let fan = match self.fan_slope {
            None => None,
            Some(slope) => {
                let (base_1u, base_2u) = match (&self.base_1u, &self.base_2u) {
                    (Some(b1), Some(b2)) => (b1.watts()?, b2.watts()?),
                    _ => {
                        return Err(ModelError::Configuration(
                            "fan slope specified but no base server power specified".to_string(),
                        ))
                    }
                };
                if slope > 0.0 {
                    Some(FanModel {
                        slope,
                        base_1u_watts: base_1u,
                        base_2u_watts: base_2u,
                    })
                } else {
                    None
                }
            }
        };
        Ok(Params {
            emissions_factor_monthly: self.emissions_factor * MONTHLY_HOURS,
            pue: self.pue,
            psu_efficiency: self.psu_efficiency,
            lifetime_months: self.lifetime,
            voltage_regulator_overhead: self.voltage_regulator_overhead,
            cpu_efficiency: self.cpu_efficiency.unwrap_or(1.0),
            power_factor: self.power_factor.unwrap_or(1.0),
            fan,
        })
    }
}

impl Params {
    pub fn load(path: &Path, overrides: &BTreeMap<String, f64>) -> Result<Self> {
        let source = fs::read_to_string(path)?;
        Self::from_toml_str(&source, overrides)
    }

    pub fn from_toml_str(source: &str, overrides: &BTreeMap<String, f64>) -> Result<Self> {
        let mut raw: RawParams = toml::from_str(source)?;
        raw.apply_overrides(overrides)?;
        raw.finish()
    }
}
