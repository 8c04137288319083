// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! The SKU carbon model.
//!
//! [`SkuModel::build`] runs the whole dependency chain once, at
//! construction: catalog resolution and unit normalization, derate-curve
//! fitting, the two-pass power aggregation (fan feedback), capacity
//! resolution (server count strictly before rack count), the hierarchical
//! carbon rollup, and the sellable-core calculation. A built model is
//! read-only; re-running means constructing a new instance, and two
//! constructions from identical inputs produce identical figures.

use std::collections::BTreeMap;

use crate::capacity::{self, CapacityState};
use crate::carbon::{self, CarbonSet, LevelCarbon};
use crate::catalog::{Catalog, ComponentKey, ComponentSet, ComponentSpec};
use crate::config::{Params, ServerConfig};
use crate::cores::{self, SellableCores};
use crate::curve::CurveSet;
use crate::error::{ModelError, Result};
use crate::power::{self, PowerSet, RackPower, ServerPower};

/// A fully constructed carbon model for one server SKU.
#[derive(Debug)]
pub struct SkuModel {
    config: ServerConfig,
    params: Params,
    set: ComponentSet,
    curves: CurveSet,
    allocated_spec: f64,
    provisioned_spec: f64,
    socket_count: u32,
    capacities: BTreeMap<String, f64>,
    component_counts: BTreeMap<ComponentKey, f64>,
    power_set: PowerSet,
    server_power: ServerPower,
    rack_power: RackPower,
    server_power_no_fan: Option<f64>,
    capacity: CapacityState,
    component_carbon: CarbonSet,
    server_carbon: LevelCarbon,
    rack_carbon: LevelCarbon,
    dc_carbon: LevelCarbon,
    cores: SellableCores,
}

impl SkuModel {
    /// Construct the model. Fails fast on any catalog miss, configuration
    /// hole, or curve-fit failure; there is no partially built state.
    pub fn build(config: ServerConfig, catalog: &Catalog, params: Params) -> Result<Self> {
        log::info!("calculating SKU carbon for {}", config.name);

        let socket_count = config.sockets;
        let allocated_spec = config.spec;
        let provisioned_spec = config.rack.spec_allocation.unwrap_or(allocated_spec);

        let (mut set, dc_record) = resolve_components(&config, catalog)?;
        let curves = fit_curves(&set)?;

        // first power pass feeds the fan correction, second is authoritative
        let server_power_no_fan = power::apply_fan_feedback(
            &mut set,
            &curves,
            &params,
            &config.form,
            socket_count,
            allocated_spec,
            provisioned_spec,
        )?;
        let power_set =
            power::compute_power_set(&set, &curves, &params, allocated_spec, provisioned_spec);
        let server_power = power::server_power(&power_set, &params, socket_count);
        log::debug!(
            "server power: provisioned {:.2} W, allocated {:.2} W",
            server_power.provisioned_watts,
            server_power.allocated_watts
        );

        let capacities = socket_capacities(&set);
        let component_counts = component_counts(&set, socket_count);

        let component_carbon =
            carbon::compute_component_carbon(&set, &curves, &params, allocated_spec);
        let server_carbon = carbon::server_rollup(&component_carbon, socket_count);

        let (server_count, server_limit) = capacity::resolve_server_count(
            config.rack.num_servers,
            config.rack.power.watts()?,
            power_set.rack.provisioned_watts,
            server_power.provisioned_watts,
            free_rack_units(&config, &set)?,
            config.form_units()?,
        );
        let rack_carbon = carbon::rack_rollup(&server_carbon, component_carbon.rack, server_count);

        let rack_power = power::rack_power(power_set.rack, server_power, server_count);
        let (rack_count, rack_limit) = capacity::resolve_rack_count(
            dc_record.power_capacity_watts,
            rack_power.provisioned_watts,
            dc_record.rack_capacity,
        );
        let dc_carbon = carbon::dc_rollup(&rack_carbon, component_carbon.dc, rack_count);

        let cpu = &set.components[&ComponentKey::Cpu];
        let threads = cpu.threads.unwrap_or(2) as f64;
        let cores = cores::sellable_cores(
            capacities["cpu"],
            threads,
            config.cpu.overhead.as_ref(),
            config.oversubscription.as_ref(),
        )?;

        Ok(SkuModel {
            config,
            params,
            set,
            curves,
            allocated_spec,
            provisioned_spec,
            socket_count,
            capacities,
            component_counts,
            power_set,
            server_power,
            rack_power,
            server_power_no_fan,
            capacity: CapacityState {
                server_count,
                rack_count,
                server_limit,
                rack_limit,
            },
            component_carbon,
            server_carbon,
            rack_carbon,
            dc_carbon,
            cores,
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn components(&self) -> &ComponentSet {
        &self.set
    }

    pub fn curves(&self) -> &CurveSet {
        &self.curves
    }

    pub fn socket_count(&self) -> u32 {
        self.socket_count
    }

    pub fn allocated_spec(&self) -> f64 {
        self.allocated_spec
    }

    pub fn provisioned_spec(&self) -> f64 {
        self.provisioned_spec
    }

    /// Per-socket resource capacities (cores, GB of DRAM/CXL, TB of flash,
    /// controller count) plus the combined `total_memory`.
    pub fn capacities(&self) -> &BTreeMap<String, f64> {
        &self.capacities
    }

    /// Whole-server component populations by category: the input the
    /// failure-rate model consumes.
    pub fn component_counts(&self) -> &BTreeMap<ComponentKey, f64> {
        &self.component_counts
    }

    /// Resource capacity per physical core, for each per-socket resource.
    /// The caller is responsible for a configuration with a non-zero core
    /// count.
    pub fn physical_core_ratios(&self) -> BTreeMap<String, f64> {
        let cores = self.capacities["cpu"];
        self.capacities
            .iter()
            .map(|(name, value)| (name.clone(), value / cores))
            .collect()
    }

    pub fn power(&self) -> &PowerSet {
        &self.power_set
    }

    pub fn server_power(&self) -> ServerPower {
        self.server_power
    }

    pub fn rack_power(&self) -> RackPower {
        self.rack_power
    }

    /// Server power excluding the fan, when the fan feedback pass ran.
    pub fn server_power_no_fan(&self) -> Option<f64> {
        self.server_power_no_fan
    }

    pub fn capacity(&self) -> CapacityState {
        self.capacity
    }

    pub fn server_count(&self) -> u32 {
        self.capacity.server_count
    }

    pub fn rack_count(&self) -> u32 {
        self.capacity.rack_count
    }

    /// Emissions per component instance group, before any rollup scaling.
    pub fn component_carbon(&self) -> &CarbonSet {
        &self.component_carbon
    }

    /// One server: every non-rack/non-dc component plus the shell.
    pub fn server_carbon(&self) -> &LevelCarbon {
        &self.server_carbon
    }

    /// One rack: the server population plus the rack's own figures.
    pub fn rack_carbon(&self) -> &LevelCarbon {
        &self.rack_carbon
    }

    /// The data center: the rack population plus the dc's own figures.
    pub fn dc_carbon(&self) -> &LevelCarbon {
        &self.dc_carbon
    }

    /// Per-socket core accounting.
    pub fn cores(&self) -> SellableCores {
        self.cores
    }

    pub fn server_sellable_cores(&self) -> f64 {
        self.cores.sellable_cores * self.socket_count as f64
    }

    pub fn rack_sellable_cores(&self) -> f64 {
        self.server_sellable_cores() * self.capacity.server_count as f64
    }

    pub fn dc_sellable_cores(&self) -> f64 {
        self.rack_sellable_cores() * self.capacity.rack_count as f64
    }

    /// Rack-level carbon per sellable core, the headline comparison
    /// figure. Divides by the sellable-core population; the caller must
    /// have validated that the configuration sells at least one core.
    pub fn carbon_per_sellable_core(&self) -> f64 {
        self.rack_carbon.total.total_kg() / self.rack_sellable_cores()
    }

    pub fn operational_per_sellable_core(&self) -> f64 {
        self.rack_carbon.total.operational_kg / self.rack_sellable_cores()
    }

    pub fn embodied_per_sellable_core(&self) -> f64 {
        self.rack_carbon.total.embodied_kg / self.rack_sellable_cores()
    }

    pub fn dc_carbon_per_sellable_core(&self) -> f64 {
        self.dc_carbon.total.total_kg() / self.dc_sellable_cores()
    }

    pub fn dc_operational_per_sellable_core(&self) -> f64 {
        self.dc_carbon.total.operational_kg / self.dc_sellable_cores()
    }

    pub fn dc_embodied_per_sellable_core(&self) -> f64 {
        self.dc_carbon.total.embodied_kg / self.dc_sellable_cores()
    }

    /// Carbon per sellable core spread over the model lifetime.
    pub fn carbon_per_sellable_core_month(&self) -> f64 {
        self.carbon_per_sellable_core() / self.params.lifetime_months
    }

    /// Allocated server draw per sellable core.
    pub fn power_per_sellable_core(&self) -> f64 {
        self.server_power.allocated_watts / self.cores.sellable_cores
    }
}

/// Resolve every configured component against the catalog and assemble
/// the model's component set.
fn resolve_components(
    config: &ServerConfig,
    catalog: &Catalog,
) -> Result<(ComponentSet, crate::catalog::DcSpec)> {
    let mut components = BTreeMap::new();

    let mut cpu = catalog.cpu(&config.cpu.vendor, &config.cpu.kind, config.cpu.core_count)?;
    cpu.count = config.cpu.number;
    components.insert(ComponentKey::Cpu, cpu);

    let mut memory = catalog.memory(
        &config.memory.kind,
        &config.memory.frequency.label(),
        config.memory.size.gigabytes()?,
    )?;
    memory.count = config.memory.number;
    components.insert(ComponentKey::Memory, memory);

    let mut cxl = catalog.memory(
        &config.cxl.kind,
        &config.cxl.frequency.label(),
        config.cxl.size.gigabytes()?,
    )?;
    cxl.count = config.cxl.number;
    components.insert(ComponentKey::Cxl, cxl);

    let controller = if config.cxl.number > 0.0 {
        let kind = config.cxl.controller.as_deref().ok_or_else(|| {
            ModelError::Configuration("CXL DIMMs configured without a controller type".to_string())
        })?;
        let ctrl = catalog.cxl_controller(kind)?;
        let mut spec = ctrl.spec.clone();
        spec.count = (config.cxl.number / ctrl.dimm_capacity() as f64).ceil();
        spec
    } else {
        ComponentSpec::zeroed()
    };
    components.insert(ComponentKey::CxlController, controller);

    let mut ssd = catalog.ssd(&config.ssd.kind, config.ssd.size.gigabytes()?, false)?;
    ssd.count = config.ssd.number;
    components.insert(ComponentKey::Ssd, ssd);

    if let Some(reuse) = &config.ssd_reuse {
        let mut spec = catalog.ssd(&reuse.kind, reuse.size.gigabytes()?, true)?;
        spec.count = reuse.number;
        components.insert(ComponentKey::SsdReuse, spec);
    }

    let mut nic = catalog.nic(&config.nic.bandwidth)?;
    nic.count = config.nic.number;
    components.insert(ComponentKey::Nic, nic);

    let dc_record = catalog.datacenter(&config.dc.kind)?;
    let set = ComponentSet {
        components,
        server: catalog.server_bundle(&config.kind)?,
        rack: catalog.rack_bundle(&config.rack.kind)?,
        dc: dc_record.items.clone(),
    };
    Ok((set, dc_record))
}

/// Fit one derate curve per component category and bundle item. Items are
/// registered in server, rack, dc order; a name collision keeps the last
/// fit, matching the flat curve namespace the aggregation uses.
fn fit_curves(set: &ComponentSet) -> Result<CurveSet> {
    let mut curves = CurveSet::new();
    for (key, spec) in &set.components {
        curves.fit_for(key.as_str(), spec.derate_samples.as_deref())?;
    }
    for bundle in [&set.server, &set.rack, &set.dc] {
        for (name, item) in bundle {
            curves.fit_for(name.as_str(), item.derate_samples.as_deref())?;
        }
    }
    Ok(curves)
}

/// Per-socket resource capacities keyed by category name, plus
/// `total_memory` (DRAM + CXL). Flash capacities are reported in TB.
fn socket_capacities(set: &ComponentSet) -> BTreeMap<String, f64> {
    let mut out = BTreeMap::new();
    for (key, spec) in &set.components {
        let value = match key {
            ComponentKey::Cpu => spec.core_count.unwrap_or(0) as f64 * spec.count,
            ComponentKey::Memory | ComponentKey::Cxl => spec.size_gb.unwrap_or(0.0) * spec.count,
            ComponentKey::Ssd | ComponentKey::SsdReuse => {
                spec.size_gb.unwrap_or(0.0) * spec.count / 1000.0
            }
            ComponentKey::CxlController => spec.count,
            ComponentKey::Nic => continue,
        };
        out.insert(key.as_str().to_string(), value);
    }
    let memory = out.get("memory").copied().unwrap_or(0.0);
    let cxl = out.get("cxl").copied().unwrap_or(0.0);
    out.insert("total_memory".to_string(), memory + cxl);
    out
}

/// Whole-server component populations (per-socket counts times sockets).
fn component_counts(set: &ComponentSet, socket_count: u32) -> BTreeMap<ComponentKey, f64> {
    set.components
        .iter()
        .filter(|(key, _)| key.per_socket())
        .map(|(key, spec)| (*key, spec.count * socket_count as f64))
        .collect()
}

/// Rack units still available for servers after the rack's own
/// infrastructure items take their space.
fn free_rack_units(config: &ServerConfig, set: &ComponentSet) -> Result<f64> {
    let total = config.rack.capacity.rack_units()?;
    let mut used = 0.0;
    for item in set.rack.values() {
        used += item.space_units.unwrap_or(0.0) * item.count;
    }
    Ok(total - used)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Bundle;

    fn set_with(components: Vec<(ComponentKey, ComponentSpec)>) -> ComponentSet {
        ComponentSet {
            components: components.into_iter().collect(),
            server: Bundle::new(),
            rack: Bundle::new(),
            dc: Bundle::new(),
        }
    }

    #[test]
    fn test_socket_capacities() {
        let cpu = ComponentSpec {
            core_count: Some(64),
            count: 1.0,
            ..ComponentSpec::default()
        };
        let memory = ComponentSpec {
            size_gb: Some(64.0),
            count: 12.0,
            ..ComponentSpec::default()
        };
        let cxl = ComponentSpec {
            size_gb: Some(64.0),
            count: 4.0,
            ..ComponentSpec::default()
        };
        let ssd = ComponentSpec {
            size_gb: Some(1920.0),
            count: 2.0,
            ..ComponentSpec::default()
        };
        let set = set_with(vec![
            (ComponentKey::Cpu, cpu),
            (ComponentKey::Memory, memory),
            (ComponentKey::Cxl, cxl),
            (ComponentKey::Ssd, ssd),
        ]);
        let caps = socket_capacities(&set);
        assert_eq!(caps["cpu"], 64.0);
        assert_eq!(caps["memory"], 768.0);
        assert_eq!(caps["total_memory"], 1024.0);
        // flash reported in TB
        assert!((caps["ssd"] - 3.84).abs() < 1e-9);
    }

    #[test]
    fn test_component_counts_scale_with_sockets() {
        let cpu = ComponentSpec {
            count: 1.0,
            ..ComponentSpec::default()
        };
        let nic = ComponentSpec {
            count: 2.0,
            ..ComponentSpec::default()
        };
        let set = set_with(vec![(ComponentKey::Cpu, cpu), (ComponentKey::Nic, nic)]);
        let counts = component_counts(&set, 2);
        assert_eq!(counts[&ComponentKey::Cpu], 2.0);
        // NIC is a whole-server part, not per socket
        assert!(!counts.contains_key(&ComponentKey::Nic));
    }

    #[test]
    fn test_free_rack_units_subtracts_infrastructure() {
        let config = crate::config::ServerConfig::from_toml_str(MINIMAL_CONFIG).unwrap();
        let mut set = set_with(vec![]);
        set.rack.insert(
            "switch".to_string(),
            ComponentSpec {
                space_units: Some(1.0),
                count: 2.0,
                ..ComponentSpec::default()
            },
        );
        assert_eq!(free_rack_units(&config, &set).unwrap(), 40.0);
    }

    const MINIMAL_CONFIG: &str = r#"
[server]
name = "t"
type = "general_2U"
form = "2U"
spec = 100

[server.cpu]
vendor = "amd"
type = "genoa"
core_count = 96
number = 1

[server.memory]
type = "DDR5"
frequency = "4800MHz"
size = "64GB"
number = 12

[server.cxl]
type = "DDR5"
frequency = "4800MHz"
size = "64GB"
number = 0

[server.ssd]
type = "nvme"
size = "1.92TB"
number = 1

[server.nic]
bandwidth = "100G"
number = 1

[server.rack]
type = "standard"
power = "17kW"
capacity = "42U"

[server.dc]
type = "hyperscale"
"#;
}
