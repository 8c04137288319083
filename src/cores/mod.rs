//! Sellable-core calculation.
//!
//! Physical cores become virtual cores through SMT, lose a reservation for
//! non-tenant tasks (a literal core count or a percentage of the virtual
//! pool), and then gain an oversubscription multiplier. The result is the
//! commercially sellable core count the carbon figures are normalized
//! against.

use serde::{Deserialize, Serialize};

use crate::config::OversubscriptionPolicy;
use crate::error::{ModelError, Result};
use crate::units::Quantity;

/// Core accounting for one socket's CPU population.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SellableCores {
    pub physical_cores: f64,
    pub virtual_cores: f64,
    pub sellable_cores: f64,
}

/// Compute sellable cores from the physical population.
///
/// `overhead`: a percentage string scales the virtual pool down, a bare
/// number subtracts that many cores. `policy`: absent means no
/// oversubscription multiplier; `only_oversubscribable` applies the rate
/// to the whole pool, otherwise the oversubscribable fraction blends with
/// the reserved remainder.
pub fn sellable_cores(
    physical_cores: f64,
    threads_per_core: f64,
    overhead: Option<&Quantity>,
    policy: Option<&OversubscriptionPolicy>,
) -> Result<SellableCores> {
    let virtual_cores = physical_cores * threads_per_core;

    let effective = match overhead {
        None => virtual_cores,
        Some(Quantity::Text(s)) => {
            let percent: f64 = s.trim().trim_end_matches('%').trim().parse().map_err(|_| {
                ModelError::Parse(format!("invalid core overhead '{}'", s))
            })?;
            virtual_cores * (1.0 - percent / 100.0)
        }
        Some(Quantity::Number(n)) => virtual_cores - n,
    };

    let sellable_per_virtual = match policy {
        None => 1.0,
        Some(p) => {
            let x = if p.only_oversubscribable {
                1.0
            } else {
                p.cpu_oversubscription.oversubscribable
            };
            let y = p.cpu_oversubscription.rate;
            (1.0 - x) + x / (1.0 - y)
        }
    };

    Ok(SellableCores {
        physical_cores,
        virtual_cores,
        sellable_cores: effective * sellable_per_virtual,
    })
}
