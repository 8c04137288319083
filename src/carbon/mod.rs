// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Carbon aggregation: operational (opex-style) and embodied (capex-style)
//! emissions per component, rolled up server -> rack -> data center.
//!
//! Operational emissions are power x monthly emissions rate x lifetime,
//! derated at the allocated utilization and scaled by the global PUE and
//! power-factor multipliers (plus the CPU-specific multipliers). Embodied
//! emissions are the catalog's manufacturing cost, lifetime-amortized when
//! a component is rated for a different lifetime than the model. For
//! non-amortized components the global factor applies to embodied cost as
//! well; amortized bundles take it on the operational side only.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::catalog::{Bundle, ComponentKey, ComponentSet, ComponentSpec};
use crate::config::Params;
use crate::curve::{CurveSet, DerateCurve};

/// Operational and embodied emissions, kgCO2e. The total is derived, so
/// `operational + embodied == total` holds by construction.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CarbonFigures {
    pub operational_kg: f64,
    pub embodied_kg: f64,
}

impl CarbonFigures {
    pub const ZERO: CarbonFigures = CarbonFigures {
        operational_kg: 0.0,
        embodied_kg: 0.0,
    };

    pub fn total_kg(&self) -> f64 {
        self.operational_kg + self.embodied_kg
    }

    fn scaled(&self, k: f64) -> CarbonFigures {
        CarbonFigures {
            operational_kg: self.operational_kg * k,
            embodied_kg: self.embodied_kg * k,
        }
    }
}

/// Emissions per leaf component and per infrastructure bundle, for a
/// single instance group (not yet socket- or population-scaled).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarbonSet {
    pub components: BTreeMap<ComponentKey, CarbonFigures>,
    pub server: CarbonFigures,
    pub rack: CarbonFigures,
    pub dc: CarbonFigures,
}

/// Emissions at one hierarchy level, broken down by component name.
///
/// The total is computed directly from the level's own figures plus the
/// scaled lower-level total, which makes the rollup identities exact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelCarbon {
    pub components: BTreeMap<String, CarbonFigures>,
    pub total: CarbonFigures,
}

/// Monthly opex emissions over the model lifetime for one component.
pub fn operational_carbon(
    spec: &ComponentSpec,
    curve: &DerateCurve,
    util: f64,
    monthly_rate: f64,
    lifetime_months: f64,
    factor: f64,
) -> f64 {
    (spec.power_watts / 1000.0) * monthly_rate * curve.eval(util) * lifetime_months * spec.count * factor
}

/// Embodied emissions for one component, amortized against the model
/// lifetime when the component is rated for its own.
pub fn embodied_carbon(spec: &ComponentSpec, model_lifetime_months: f64, factor: f64) -> f64 {
    let lifetime_factor = match spec.lifetime_months {
        Some(rated) if model_lifetime_months > 0.0 => model_lifetime_months / rated,
        _ => 1.0,
    };
    spec.carbon_kg * spec.count * lifetime_factor * factor
}

/// Operational emissions of a bundle, each sub-item under its own curve.
pub fn bundle_operational(
    bundle: &Bundle,
    curves: &CurveSet,
    util: f64,
    monthly_rate: f64,
    lifetime_months: f64,
    factor: f64,
) -> f64 {
    let mut total = 0.0;
    for (name, item) in bundle {
        total += operational_carbon(item, curves.get(name), util, monthly_rate, lifetime_months, factor);
    }
    total
}

/// Embodied emissions of a bundle, each sub-item independently amortized,
/// with no operational factor applied.
pub fn bundle_embodied(bundle: &Bundle, model_lifetime_months: f64) -> f64 {
    let mut total = 0.0;
    for item in bundle.values() {
        total += embodied_carbon(item, model_lifetime_months, 1.0);
    }
    total
}

/// Emissions for every component and bundle at the allocated spec point.
pub fn compute_component_carbon(
    set: &ComponentSet,
    curves: &CurveSet,
    params: &Params,
    allocated_spec: f64,
) -> CarbonSet {
    let base_factor = params.pue * params.power_factor;
    let mut components = BTreeMap::new();
    for (key, spec) in &set.components {
        let mut factor = base_factor;
        if *key == ComponentKey::Cpu {
            factor *= params.voltage_regulator_overhead * params.cpu_efficiency;
        }
        let figures = CarbonFigures {
            operational_kg: operational_carbon(
                spec,
                curves.get(key.as_str()),
                allocated_spec,
                params.emissions_factor_monthly,
                params.lifetime_months,
                factor,
            ),
            embodied_kg: embodied_carbon(spec, params.lifetime_months, factor),
        };
        components.insert(*key, figures);
    }
    let bundle_figures = |bundle: &Bundle| CarbonFigures {
        operational_kg: bundle_operational(
            bundle,
            curves,
            allocated_spec,
            params.emissions_factor_monthly,
            params.lifetime_months,
            base_factor,
        ),
        embodied_kg: bundle_embodied(bundle, params.lifetime_months),
    };
    CarbonSet {
        components,
        server: bundle_figures(&set.server),
        rack: bundle_figures(&set.rack),
        dc: bundle_figures(&set.dc),
    }
}

/// Server-level rollup: every non-rack/non-dc component, per-socket
/// categories multiplied by socket count, plus the server shell.
pub fn server_rollup(carbon: &CarbonSet, socket_count: u32) -> LevelCarbon {
    let sockets = socket_count as f64;
    let mut components = BTreeMap::new();
    let mut total = CarbonFigures::ZERO;
    for (key, figures) in &carbon.components {
        let mult = if key.per_socket() { sockets } else { 1.0 };
        let scaled = figures.scaled(mult);
        total.operational_kg += scaled.operational_kg;
        total.embodied_kg += scaled.embodied_kg;
        components.insert(key.as_str().to_string(), scaled);
    }
    total.operational_kg += carbon.server.operational_kg;
    total.embodied_kg += carbon.server.embodied_kg;
    components.insert("server".to_string(), carbon.server);
    LevelCarbon { components, total }
}

/// Rack-level rollup: the server figures multiplied by the resolved server
/// count, plus the rack's own amortized figures.
pub fn rack_rollup(server: &LevelCarbon, rack_own: CarbonFigures, server_count: u32) -> LevelCarbon {
    let count = server_count as f64;
    let mut components: BTreeMap<String, CarbonFigures> = server
        .components
        .iter()
        .map(|(name, figures)| (name.clone(), figures.scaled(count)))
        .collect();
    components.insert("rack".to_string(), rack_own);
    LevelCarbon {
        components,
        total: CarbonFigures {
            operational_kg: rack_own.operational_kg + server.total.operational_kg * count,
            embodied_kg: rack_own.embodied_kg + server.total.embodied_kg * count,
        },
    }
}

/// Data-center-level rollup: the rack figures multiplied by the resolved
/// rack count, plus the data center's own amortized figures.
pub fn dc_rollup(rack: &LevelCarbon, dc_own: CarbonFigures, rack_count: u32) -> LevelCarbon {
    let count = rack_count as f64;
    let mut components: BTreeMap<String, CarbonFigures> = rack
        .components
        .iter()
        .map(|(name, figures)| (name.clone(), figures.scaled(count)))
        .collect();
    components.insert("dc".to_string(), dc_own);
    LevelCarbon {
        components,
        total: CarbonFigures {
            operational_kg: dc_own.operational_kg + rack.total.operational_kg * count,
            embodied_kg: dc_own.embodied_kg + rack.total.embodied_kg * count,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(power: f64, carbon: f64, count: f64) -> ComponentSpec {
        ComponentSpec {
            power_watts: power,
            carbon_kg: carbon,
            count,
            ..ComponentSpec::default()
        }
    }

    #[test]
    fn test_operational_carbon_arithmetic() {
        let s = spec(500.0, 0.0, 2.0);
        let curve = DerateCurve::Constant(0.5);
        // (500/1000) * 360 * 0.5 * 72 * 2 * 1.2 = 15552
        let op = operational_carbon(&s, &curve, 100.0, 360.0, 72.0, 1.2);
        assert!((op - 15_552.0).abs() < 1e-9);
    }

    #[test]
    fn test_embodied_lifetime_amortization() {
        let mut s = spec(0.0, 100.0, 1.0);
        assert_eq!(embodied_carbon(&s, 72.0, 1.0), 100.0);
        // rated for 36 months, model runs 72: embodied doubles
        s.lifetime_months = Some(36.0);
        assert_eq!(embodied_carbon(&s, 72.0, 1.0), 200.0);
    }

    #[test]
    fn test_non_amortized_embodied_takes_operational_factor() {
        let s = spec(0.0, 100.0, 1.0);
        assert!((embodied_carbon(&s, 72.0, 1.32) - 132.0).abs() < 1e-9);
    }

    #[test]
    fn test_bundle_embodied_skips_operational_factor() {
        let mut bundle = Bundle::new();
        bundle.insert("board".to_string(), spec(0.0, 100.0, 1.0));
        assert_eq!(bundle_embodied(&bundle, 72.0), 100.0);
    }

    #[test]
    fn test_bundle_operational_uses_item_curves() {
        let mut bundle = Bundle::new();
        bundle.insert("fan".to_string(), spec(100.0, 0.0, 1.0));
        bundle.insert("board".to_string(), spec(100.0, 0.0, 1.0));
        let mut curves = CurveSet::new();
        curves.insert("fan", DerateCurve::Constant(0.5));
        // fan derated to half, board at identity
        let op = bundle_operational(&bundle, &curves, 100.0, 1.0, 1.0, 1.0);
        assert!((op - 0.15).abs() < 1e-12); // (0.1*0.5 + 0.1) kW-months
    }

    #[test]
    fn test_figures_total_additive() {
        let f = CarbonFigures {
            operational_kg: 12.5,
            embodied_kg: 7.5,
        };
        assert_eq!(f.total_kg(), 20.0);
    }

    #[test]
    fn test_rollup_identities() {
        let mut components = BTreeMap::new();
        components.insert(
            ComponentKey::Cpu,
            CarbonFigures {
                operational_kg: 10.0,
                embodied_kg: 4.0,
            },
        );
        components.insert(
            ComponentKey::Nic,
            CarbonFigures {
                operational_kg: 1.0,
                embodied_kg: 0.5,
            },
        );
        let set = CarbonSet {
            components,
            server: CarbonFigures {
                operational_kg: 2.0,
                embodied_kg: 1.0,
            },
            rack: CarbonFigures {
                operational_kg: 5.0,
                embodied_kg: 2.0,
            },
            dc: CarbonFigures {
                operational_kg: 100.0,
                embodied_kg: 50.0,
            },
        };

        let server = server_rollup(&set, 2);
        // cpu scaled by sockets, nic not, shell added once
        assert!((server.total.operational_kg - (10.0 * 2.0 + 1.0 + 2.0)).abs() < 1e-9);

        let rack = rack_rollup(&server, set.rack, 20);
        assert!(
            (rack.total.total_kg()
                - (set.rack.total_kg() + 20.0 * server.total.total_kg()))
            .abs()
                < 1e-6
        );

        let dc = dc_rollup(&rack, set.dc, 100);
        assert!(
            (dc.total.total_kg() - (set.dc.total_kg() + 100.0 * rack.total.total_kg())).abs()
                < 1e-6
        );
        assert!(dc.components.contains_key("rack"));
        assert!(dc.components.contains_key("dc"));
    }
}
