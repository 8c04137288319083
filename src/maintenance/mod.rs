//! Annual-failure-rate model.
//!
//! A thin consumer of the carbon model's component-count outputs: each
//! component class carries an empirical annual failure rate (and
//! optionally a separate rate for second-life parts plus a fail-in-place
//! rate), and the server's AFR is the count-weighted sum. New and reuse
//! streams are accumulated separately: CXL DIMMs are the reuse stream for
//! DRAM, the reuse-SSD category the reuse stream for flash.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::catalog::ComponentKey;
use crate::error::{ModelError, Result};
use crate::model::SkuModel;

/// Failure rates for one component class, percent per year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassRates {
    #[serde(rename = "AFR", default)]
    pub afr: Option<f64>,
    #[serde(rename = "reuse_AFR", default)]
    pub reuse_afr: Option<f64>,
    /// Fraction of failures absorbed by fail-in-place instead of a repair.
    #[serde(rename = "FIP_rate", default)]
    pub fip_rate: Option<f64>,
}

/// Per-class failure rate table, keyed by class name
/// (`DRAM`, `CPU`, `SSD`, `NIC`, `Rest`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MaintenanceModel {
    rates: BTreeMap<String, ClassRates>,
}

impl MaintenanceModel {
    pub fn load(path: &Path) -> Result<Self> {
        let source = fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    pub fn from_toml_str(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    /// Server annual failure rate as a fraction (rates are configured in
    /// percent per year).
    pub fn annual_failure_rate(&self, model: &SkuModel) -> Result<f64> {
        let mut total = 0.0;
        for (class, rates) in &self.rates {
            let fip = 1.0 - rates.fip_rate.unwrap_or(0.0);
            if let Some(afr) = rates.afr {
                total += afr * component_count(model, class, false)? * fip;
            }
            if let Some(reuse_afr) = rates.reuse_afr {
                total += reuse_afr * component_count(model, class, true)? * fip;
            }
        }
        Ok(total / 100.0)
    }
}

fn component_count(model: &SkuModel, class: &str, reuse: bool) -> Result<f64> {
    let counts = model.component_counts();
    let count = |key: ComponentKey| counts.get(&key).copied().unwrap_or(0.0);
    match class {
        "DRAM" => Ok(if reuse {
            count(ComponentKey::Cxl)
        } else {
            count(ComponentKey::Memory)
        }),
        "CPU" if reuse => Err(ModelError::Configuration(
            "CPU reuse not implemented".to_string(),
        )),
        "CPU" => Ok(count(ComponentKey::Cpu)),
        "SSD" => Ok(if reuse {
            count(ComponentKey::SsdReuse)
        } else {
            count(ComponentKey::Ssd)
        }),
        "NIC" if reuse => Err(ModelError::Configuration(
            "NIC reuse not implemented".to_string(),
        )),
        // NICs are whole-server parts, so their population is the raw count
        "NIC" => Ok(model
            .components()
            .components
            .get(&ComponentKey::Nic)
            .map(|spec| spec.count)
            .unwrap_or(0.0)),
        "Rest" => Ok(1.0),
        _ => Err(ModelError::Configuration(format!(
            "component class '{}' not found",
            class
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rates_parse() {
        let model = MaintenanceModel::from_toml_str(
            r#"
[DRAM]
AFR = 0.4
reuse_AFR = 0.6
FIP_rate = 0.5

[Rest]
AFR = 2.0
"#,
        )
        .unwrap();
        let dram = &model.rates["DRAM"];
        assert_eq!(dram.afr, Some(0.4));
        assert_eq!(dram.reuse_afr, Some(0.6));
        assert_eq!(dram.fip_rate, Some(0.5));
        assert_eq!(model.rates["Rest"].fip_rate, None);
    }

    #[test]
    fn test_malformed_rates_fail() {
        assert!(MaintenanceModel::from_toml_str("[DRAM]\nAFR = \"high\"").is_err());
    }
}
