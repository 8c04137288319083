//! Power aggregation.
//!
//! Every component's draw is its peak power scaled by instance count, the
//! category derate curve evaluated at a utilization level, and an extra
//! factor (voltage-regulator overhead and CPU efficiency for CPUs). Each
//! component gets two figures: allocated (the server's own spec level) and
//! provisioned (the rack's provisioning level, falling back to allocated).
//!
//! Chassis fan draw feeds back on total server power: the model computes
//! server power once without the fan, derives fan draw from it, rewrites
//! the fan component, and recomputes. That is a fixed point of depth
//! exactly one, not an iterative solve.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::catalog::{Bundle, ComponentKey, ComponentSet, ComponentSpec};
use crate::config::Params;
use crate::curve::{CurveSet, DerateCurve};
use crate::error::{ModelError, Result};

/// Draw for one component at the two utilization points, watts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PowerFigures {
    pub provisioned_watts: f64,
    pub allocated_watts: f64,
}

/// Aggregate server draw. `used_watts` is allocated draw scaled by the
/// global power factor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ServerPower {
    pub provisioned_watts: f64,
    pub allocated_watts: f64,
    pub used_watts: f64,
}

/// Aggregate rack draw (rack infrastructure included, servers not yet
/// multiplied in).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RackPower {
    pub provisioned_watts: f64,
    pub allocated_watts: f64,
}

/// Allocated and provisioned draw for every component and bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerSet {
    pub components: BTreeMap<ComponentKey, PowerFigures>,
    pub server: PowerFigures,
    pub rack: PowerFigures,
    pub dc: PowerFigures,
}

/// Draw of a single component: peak power x instances x derate x factor.
pub fn component_power(spec: &ComponentSpec, curve: &DerateCurve, util: f64, factor: f64) -> f64 {
    spec.power_watts * spec.count * curve.eval(util) * factor
}

/// Sum of a bundle's item draws under one curve. `item_factors` maps item
/// names to extra multipliers; names not in the map multiply by 1, and
/// `None` means no per-item adjustment at all.
pub fn bundle_power(
    bundle: &Bundle,
    curve: &DerateCurve,
    util: f64,
    factor: f64,
    item_factors: Option<&BTreeMap<String, f64>>,
) -> f64 {
    let mut total = 0.0;
    for (name, item) in bundle {
        let extra = item_factors
            .and_then(|m| m.get(name))
            .copied()
            .unwrap_or(1.0);
        total += component_power(item, curve, util, factor * extra);
    }
    total
}

/// Compute allocated and provisioned draw for every component and bundle.
///
/// Bundles are summed under the bundle-level curve (identity unless the
/// bundle document itself carries samples); per-item curves only enter on
/// the carbon side.
pub fn compute_power_set(
    set: &ComponentSet,
    curves: &CurveSet,
    params: &Params,
    allocated_spec: f64,
    provisioned_spec: f64,
) -> PowerSet {
    let mut components = BTreeMap::new();
    for (key, spec) in &set.components {
        let factor = extra_factor(*key, params);
        let curve = curves.get(key.as_str());
        components.insert(
            *key,
            PowerFigures {
                provisioned_watts: component_power(spec, curve, provisioned_spec, factor),
                allocated_watts: component_power(spec, curve, allocated_spec, factor),
            },
        );
    }
    let bundle_figures = |bundle: &Bundle, name: &str| PowerFigures {
        provisioned_watts: bundle_power(bundle, curves.get(name), provisioned_spec, 1.0, None),
        allocated_watts: bundle_power(bundle, curves.get(name), allocated_spec, 1.0, None),
    };
    PowerSet {
        components,
        server: bundle_figures(&set.server, "server"),
        rack: bundle_figures(&set.rack, "rack"),
        dc: bundle_figures(&set.dc, "dc"),
    }
}

/// Whole-server draw: per-socket components multiplied by socket count,
/// shell and dc infrastructure included, rack infrastructure excluded
/// (it is accounted once per rack). PSU inefficiency applies once at the
/// total, not per component.
pub fn server_power(power: &PowerSet, params: &Params, socket_count: u32) -> ServerPower {
    let sockets = socket_count as f64;
    let mut provisioned = 0.0;
    let mut allocated = 0.0;
    for (key, fig) in &power.components {
        let mult = if key.per_socket() { sockets } else { 1.0 };
        provisioned += fig.provisioned_watts * mult;
        allocated += fig.allocated_watts * mult;
    }
    provisioned += power.server.provisioned_watts + power.dc.provisioned_watts;
    allocated += power.server.allocated_watts + power.dc.allocated_watts;

    let psu = psu_overhead(params);
    provisioned *= psu;
    allocated *= psu;
    ServerPower {
        provisioned_watts: provisioned,
        allocated_watts: allocated,
        used_watts: allocated * params.power_factor,
    }
}

/// Whole-rack draw: the rack's own infrastructure plus the resolved server
/// population. Depends on the server count, which is why capacity
/// resolution fixes servers per rack before racks per data center. Server
/// figures already carry the PSU overhead; the rack bundle draws from
/// facility power directly.
pub fn rack_power(rack_bundle: PowerFigures, server: ServerPower, server_count: u32) -> RackPower {
    let count = server_count as f64;
    RackPower {
        provisioned_watts: rack_bundle.provisioned_watts + server.provisioned_watts * count,
        allocated_watts: rack_bundle.allocated_watts + server.allocated_watts * count,
    }
}

fn psu_overhead(params: &Params) -> f64 {
    1.0 + (1.0 - params.psu_efficiency)
}

fn extra_factor(key: ComponentKey, params: &Params) -> f64 {
    if key == ComponentKey::Cpu {
        params.voltage_regulator_overhead * params.cpu_efficiency
    } else {
        1.0
    }
}

/// Apply the fan feedback pass, rewriting the fan component's power field.
///
/// Returns the server power excluding the fan when feedback ran, `None`
/// when no fan model is configured. Callers must recompute power figures
/// afterwards; this runs exactly once per model construction.
pub fn apply_fan_feedback(
    set: &mut ComponentSet,
    curves: &CurveSet,
    params: &Params,
    form: &str,
    socket_count: u32,
    allocated_spec: f64,
    provisioned_spec: f64,
) -> Result<Option<f64>> {
    let fan_model = match params.fan {
        Some(f) => f,
        None => return Ok(None),
    };

    let power = compute_power_set(set, curves, params, allocated_spec, provisioned_spec);
    let server = server_power(&power, params, socket_count);

    let fan = set.server.get_mut("fan").ok_or_else(|| {
        ModelError::Configuration(
            "fan feedback configured but the server bundle has no 'fan' component".to_string(),
        )
    })?;
    let derated_fan = component_power(fan, curves.get("fan"), allocated_spec, 1.0);
    let no_fan_watts = server.used_watts - derated_fan * params.power_factor;

    fan.power_watts += fan_model.slope * (no_fan_watts - fan_model.base_for(form));
    log::debug!(
        "fan power adjusted to {:.2} W (server power without fan {:.2} W)",
        fan.power_watts,
        no_fan_watts
    );
    Ok(Some(no_fan_watts))
}
