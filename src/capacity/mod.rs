// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Capacity resolution: how many servers fit a rack, how many racks fit
//! the data center.
//!
//! Each level has two competing bounds, a power-derived one and a
//! space-derived one; the smaller wins and the binding side is recorded.
//! Server count must be resolved before rack count, because the rack's
//! provisioned power (the dc-level divisor) already folds in the resolved
//! server population.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which bound fixed a count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitingFactor {
    /// The power budget ran out first.
    Power,
    /// The physical space ran out first.
    Space,
    /// An explicit configured count bypassed both bounds.
    Override,
}

impl fmt::Display for LimitingFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Power => write!(f, "power"),
            Self::Space => write!(f, "space"),
            Self::Override => write!(f, "override"),
        }
    }
}

/// Resolved population counts and their binding constraints. Computed once
/// during model construction, read-only afterward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityState {
    /// Servers per rack.
    pub server_count: u32,
    /// Racks per data center.
    pub rack_count: u32,
    /// What bounded the server count.
    pub server_limit: LimitingFactor,
    /// What bounded the rack count.
    pub rack_limit: LimitingFactor,
}

/// Servers per rack: an explicit positive override wins outright;
/// otherwise the smaller of the power bound (rack budget minus the rack's
/// own infrastructure draw, divided by provisioned per-server draw) and
/// the space bound (free rack units over chassis height).
pub fn resolve_server_count(
    override_count: Option<u32>,
    rack_power_budget_watts: f64,
    rack_own_watts: f64,
    provisioned_server_watts: f64,
    free_rack_units: f64,
    server_form_units: f64,
) -> (u32, LimitingFactor) {
    if let Some(n) = override_count {
        if n > 0 {
            log::info!("rack server count overridden to {}", n);
            return (n, LimitingFactor::Override);
        }
    }
    let power_bound = floor_count((rack_power_budget_watts - rack_own_watts) / provisioned_server_watts);
    let space_bound = floor_count(free_rack_units / server_form_units);
    if power_bound < space_bound {
        log::info!(
            "rack is power limited to {} servers (space would allow {})",
            power_bound,
            space_bound
        );
        (power_bound, LimitingFactor::Power)
    } else {
        log::info!(
            "rack is space limited to {} servers (power would allow {})",
            space_bound,
            power_bound
        );
        (space_bound, LimitingFactor::Space)
    }
}

/// Racks per data center: the smaller of the facility power bound and the
/// physical rack-slot capacity.
pub fn resolve_rack_count(
    dc_power_capacity_watts: f64,
    provisioned_rack_watts: f64,
    dc_rack_capacity: f64,
) -> (u32, LimitingFactor) {
    let power_bound = floor_count(dc_power_capacity_watts / provisioned_rack_watts);
    let space_bound = floor_count(dc_rack_capacity);
    if power_bound < space_bound {
        log::info!(
            "data center is power limited to {} racks (space would allow {})",
            power_bound,
            space_bound
        );
        (power_bound, LimitingFactor::Power)
    } else {
        log::info!(
            "data center is space limited to {} racks (power would allow {})",
            space_bound,
            power_bound
        );
        (space_bound, LimitingFactor::Space)
    }
}

/// Floor to a whole count, clamped at zero. Casting saturates, so an
/// unbounded ratio (zero divisor) resolves to the other constraint.
fn floor_count(bound: f64) -> u32 {
    bound.max(0.0).floor() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_space_limited_rack() {
        // power bound: floor((10000 - 500) / 200) = 47
        // space bound: floor(40 / 2) = 20
        let (count, limit) = resolve_server_count(None, 10_000.0, 500.0, 200.0, 40.0, 2.0);
        assert_eq!(count, 20);
        assert_eq!(limit, LimitingFactor::Space);
    }

    #[test]
    fn test_power_limited_rack() {
        let (count, limit) = resolve_server_count(None, 3_000.0, 500.0, 200.0, 40.0, 2.0);
        assert_eq!(count, 12);
        assert_eq!(limit, LimitingFactor::Power);
    }

    #[test]
    fn test_override_wins() {
        let (count, limit) = resolve_server_count(Some(8), 10_000.0, 500.0, 200.0, 40.0, 2.0);
        assert_eq!(count, 8);
        assert_eq!(limit, LimitingFactor::Override);
    }

    #[test]
    fn test_zero_override_is_ignored() {
        let (count, limit) = resolve_server_count(Some(0), 10_000.0, 500.0, 200.0, 40.0, 2.0);
        assert_eq!(count, 20);
        assert_eq!(limit, LimitingFactor::Space);
    }

    #[test]
    fn test_exhausted_budget_never_goes_negative() {
        let (count, limit) = resolve_server_count(None, 400.0, 500.0, 200.0, 40.0, 2.0);
        assert_eq!(count, 0);
        assert_eq!(limit, LimitingFactor::Power);
    }

    #[test]
    fn test_rack_count_power_limited() {
        // floor(1_500_000 / 14_000) = 107 < 120 slots
        let (count, limit) = resolve_rack_count(1_500_000.0, 14_000.0, 120.0);
        assert_eq!(count, 107);
        assert_eq!(limit, LimitingFactor::Power);
    }

    #[test]
    fn test_rack_count_space_limited() {
        let (count, limit) = resolve_rack_count(1_500_000.0, 10_000.0, 120.0);
        assert_eq!(count, 120);
        assert_eq!(limit, LimitingFactor::Space);
    }

    #[test]
    fn test_limiting_factor_display() {
        assert_eq!(LimitingFactor::Power.to_string(), "power");
        assert_eq!(LimitingFactor::Space.to_string(), "space");
        assert_eq!(LimitingFactor::Override.to_string(), "override");
    }
}
