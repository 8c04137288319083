// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Normalized catalog records

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

/// Leaf component categories tracked by the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKey {
    Cpu,
    Memory,
    Cxl,
    CxlController,
    Ssd,
    SsdReuse,
    Nic,
}

impl ComponentKey {
    pub const ALL: [ComponentKey; 7] = [
        ComponentKey::Cpu,
        ComponentKey::Memory,
        ComponentKey::Cxl,
        ComponentKey::CxlController,
        ComponentKey::Ssd,
        ComponentKey::SsdReuse,
        ComponentKey::Nic,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ComponentKey::Cpu => "cpu",
            ComponentKey::Memory => "memory",
            ComponentKey::Cxl => "cxl",
            ComponentKey::CxlController => "cxl_controller",
            ComponentKey::Ssd => "ssd",
            ComponentKey::SsdReuse => "ssd_reuse",
            ComponentKey::Nic => "nic",
        }
    }

    /// Whether figures for this category scale with the server's socket count.
    pub fn per_socket(self) -> bool {
        !matches!(self, ComponentKey::Nic)
    }
}

impl fmt::Display for ComponentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable catalog record for one component, normalized to canonical
/// units at lookup time. Aggregation never defaults fields itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentSpec {
    /// Draw at peak utilization, watts (0 when the catalog omits it).
    pub power_watts: f64,
    /// Storage or memory capacity in GB, for categories that have one.
    pub size_gb: Option<f64>,
    /// Physical space in rack units, for chassis and rack items.
    pub space_units: Option<f64>,
    /// Physical core count, CPU only.
    pub core_count: Option<u32>,
    /// Hardware threads per core, CPU only.
    pub threads: Option<u32>,
    /// Embodied manufacturing cost, kgCO2e (0 when the catalog omits it).
    pub carbon_kg: f64,
    /// Rated lifetime in months, when it differs from the model's.
    pub lifetime_months: Option<f64>,
    /// Instance count (per socket for socketed categories).
    pub count: f64,
    /// Utilization -> scaling-factor samples, sorted by utilization.
    pub derate_samples: Option<Vec<(f64, f64)>>,
}

impl Default for ComponentSpec {
    fn default() -> Self {
        Self {
            power_watts: 0.0,
            size_gb: None,
            space_units: None,
            core_count: None,
            threads: None,
            carbon_kg: 0.0,
            lifetime_months: None,
            count: 1.0,
            derate_samples: None,
        }
    }
}

impl ComponentSpec {
    /// The all-zero record used for categories configured with zero
    /// instances (e.g. a CXL controller when no CXL DIMMs are fitted).
    pub fn zeroed() -> Self {
        Self {
            size_gb: Some(0.0),
            count: 0.0,
            ..Self::default()
        }
    }
}

/// A fixed named set of sub-components: the server shell, the rack, or the
/// data-center infrastructure. BTreeMap keeps iteration (and therefore
/// floating-point accumulation order) deterministic across rebuilds.
pub type Bundle = BTreeMap<String, ComponentSpec>;

/// The full component data set one model instance owns: leaf components
/// keyed by category plus the three infrastructure bundles. Populated by
/// catalog lookups, mutated only by the fan-feedback write-back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentSet {
    pub components: BTreeMap<ComponentKey, ComponentSpec>,
    pub server: Bundle,
    pub rack: Bundle,
    pub dc: Bundle,
}

/// CXL controller record plus the DIMM geometry used to derive how many
/// controllers a given DIMM population needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CxlControllerSpec {
    pub spec: ComponentSpec,
    pub channels: u32,
    pub dimms_per_channel: u32,
}

impl CxlControllerSpec {
    /// DIMMs one controller can host.
    pub fn dimm_capacity(&self) -> u32 {
        self.channels * self.dimms_per_channel
    }
}

/// Data-center record: infrastructure bundle plus sizing capacities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DcSpec {
    pub items: Bundle,
    /// Total facility power budget, watts.
    pub power_capacity_watts: f64,
    /// Physical rack slots.
    pub rack_capacity: f64,
}

/// Raw derating sample table as written in a catalog document: utilization
/// level (as a key) -> scaling factor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DerateTable(pub BTreeMap<String, f64>);

impl DerateTable {
    /// Parse keys to numeric utilization levels, sorted ascending.
    pub fn samples(&self) -> Result<Vec<(f64, f64)>> {
        let mut out = Vec::with_capacity(self.0.len());
        for (key, &factor) in &self.0 {
            let x: f64 = key.trim().parse().map_err(|_| {
                ModelError::Parse(format!("invalid utilization level '{}' in derate table", key))
            })?;
            out.push((x, factor));
        }
        out.sort_by(|a, b| a.0.total_cmp(&b.0));
        Ok(out)
    }
}
