// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Structured model results.
//!
//! A [`SkuReport`] captures every externally consumed figure of a built
//! model: capacity state, power, the per-component carbon breakdown at
//! each hierarchy level, and the per-sellable-core ratios. Percentages are
//! derived from the stored figures at build time, never stored
//! independently, so each breakdown column sums to 100 by construction.
//! Formatting (text table or JSON) is the caller's concern; the model
//! itself never prints.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::carbon::LevelCarbon;
use crate::error::Result;
use crate::model::SkuModel;

/// One component's emissions at a hierarchy level, with its share of the
/// level totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentRow {
    pub name: String,
    pub operational_kg: f64,
    pub embodied_kg: f64,
    pub carbon_kg: f64,
    pub operational_pct: f64,
    pub embodied_pct: f64,
    pub carbon_pct: f64,
}

/// A hierarchy level's breakdown plus its totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelTable {
    pub rows: Vec<ComponentRow>,
    pub operational_kg: f64,
    pub embodied_kg: f64,
    pub carbon_kg: f64,
}

impl LevelTable {
    fn from_level(level: &LevelCarbon) -> Self {
        let operational = level.total.operational_kg;
        let embodied = level.total.embodied_kg;
        let carbon = level.total.total_kg();
        let rows = level
            .components
            .iter()
            .map(|(name, figures)| ComponentRow {
                name: name.clone(),
                operational_kg: figures.operational_kg,
                embodied_kg: figures.embodied_kg,
                carbon_kg: figures.total_kg(),
                operational_pct: figures.operational_kg * 100.0 / operational,
                embodied_pct: figures.embodied_kg * 100.0 / embodied,
                carbon_pct: figures.total_kg() * 100.0 / carbon,
            })
            .collect();
        LevelTable {
            rows,
            operational_kg: operational,
            embodied_kg: embodied,
            carbon_kg: carbon,
        }
    }
}

/// The complete result set for one SKU evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkuReport {
    pub name: String,
    pub generated_at: DateTime<Utc>,
    pub socket_count: u32,
    pub server_count: u32,
    pub rack_count: u32,
    pub server_limited_by: String,
    pub rack_limited_by: String,
    /// Per-socket resource capacities plus `total_memory`.
    pub capacities: BTreeMap<String, f64>,
    pub physical_cores: f64,
    pub virtual_cores: f64,
    pub sellable_cores: f64,
    pub server_provisioned_watts: f64,
    pub server_allocated_watts: f64,
    pub server: LevelTable,
    pub rack: LevelTable,
    pub dc: LevelTable,
    pub carbon_per_sellable_core: f64,
    pub operational_per_sellable_core: f64,
    pub embodied_per_sellable_core: f64,
    pub dc_carbon_per_sellable_core: f64,
}

impl SkuReport {
    pub fn from_model(model: &SkuModel) -> Self {
        let cores = model.cores();
        let server_power = model.server_power();
        let capacity = model.capacity();
        SkuReport {
            name: model.config().name.clone(),
            generated_at: Utc::now(),
            socket_count: model.socket_count(),
            server_count: capacity.server_count,
            rack_count: capacity.rack_count,
            server_limited_by: capacity.server_limit.to_string(),
            rack_limited_by: capacity.rack_limit.to_string(),
            capacities: model.capacities().clone(),
            physical_cores: cores.physical_cores,
            virtual_cores: cores.virtual_cores,
            sellable_cores: model.server_sellable_cores(),
            server_provisioned_watts: server_power.provisioned_watts,
            server_allocated_watts: server_power.allocated_watts,
            server: LevelTable::from_level(model.server_carbon()),
            rack: LevelTable::from_level(model.rack_carbon()),
            dc: LevelTable::from_level(model.dc_carbon()),
            carbon_per_sellable_core: model.carbon_per_sellable_core(),
            operational_per_sellable_core: model.operational_per_sellable_core(),
            embodied_per_sellable_core: model.embodied_per_sellable_core(),
            dc_carbon_per_sellable_core: model.dc_carbon_per_sellable_core(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl fmt::Display for SkuReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "SKU carbon for {}", self.name)?;
        writeln!(
            f,
            "  sockets: {}, servers/rack: {} ({}-limited), racks/dc: {} ({}-limited)",
            self.socket_count,
            self.server_count,
            self.server_limited_by,
            self.rack_count,
            self.rack_limited_by
        )?;
        writeln!(
            f,
            "  server power: {:.2} W provisioned, {:.2} W allocated",
            self.server_provisioned_watts, self.server_allocated_watts
        )?;
        writeln!(f, "  sellable cores: {:.2}", self.sellable_cores)?;
        for (title, table) in [
            ("server", &self.server),
            ("rack", &self.rack),
            ("dc", &self.dc),
        ] {
            writeln!(
                f,
                "  {} operational: {:.2} kgCO2e, embodied: {:.2} kgCO2e, total: {:.2} kgCO2e",
                title, table.operational_kg, table.embodied_kg, table.carbon_kg
            )?;
            for row in &table.rows {
                writeln!(
                    f,
                    "    {:<16} {:>14.2} {:>14.2} {:>14.2}  ({:.1}% of total)",
                    row.name, row.operational_kg, row.embodied_kg, row.carbon_kg, row.carbon_pct
                )?;
            }
        }
        write!(
            f,
            "  carbon per sellable core: {:.2} kgCO2e ({:.2} operational, {:.2} embodied)",
            self.carbon_per_sellable_core,
            self.operational_per_sellable_core,
            self.embodied_per_sellable_core
        )
    }
}
