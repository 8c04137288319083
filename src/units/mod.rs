//! Unit normalization for heterogeneous catalog quantities.
//!
//! Catalog and configuration documents express power as `"450W"` or `"2kW"`,
//! capacity as `"64GB"` or `"1.5TB"`, rack space as `"42U"`, and ratios as
//! `"85%"`. Everything is converted to canonical numeric units (watts,
//! gigabytes, rack units, fractions) at the loading boundary, before any
//! aggregation runs. Bare numbers pass through unchanged, so normalization
//! is idempotent.

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

/// A quantity as written in a catalog or configuration document: either a
/// bare number (already canonical) or a string with a unit suffix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Quantity {
    Number(f64),
    Text(String),
}

impl Quantity {
    /// Power in watts. Accepts `W`, `kW`, `MW`, and `GW` suffixes.
    pub fn watts(&self) -> Result<f64> {
        match self {
            Quantity::Number(n) => Ok(*n),
            Quantity::Text(s) => parse_suffixed(
                s,
                &[("kW", 1e3), ("MW", 1e6), ("GW", 1e9), ("W", 1.0)],
            ),
        }
    }

    /// Storage or memory capacity in gigabytes. Accepts `GB` and `TB`.
    pub fn gigabytes(&self) -> Result<f64> {
        match self {
            Quantity::Number(n) => Ok(*n),
            Quantity::Text(s) => parse_suffixed(s, &[("TB", 1e3), ("GB", 1.0)]),
        }
    }

    /// Physical space in rack units (`"4U"` -> 4.0).
    pub fn rack_units(&self) -> Result<f64> {
        match self {
            Quantity::Number(n) => Ok(*n),
            Quantity::Text(s) => parse_suffixed(s, &[("U", 1.0)]),
        }
    }

    /// Unitless count (rack slots, instances). No suffix is accepted.
    pub fn count(&self) -> Result<f64> {
        match self {
            Quantity::Number(n) => Ok(*n),
            Quantity::Text(s) => parse_number(s.trim(), s),
        }
    }

    /// Ratio as a fraction (`"85%"` -> 0.85). Bare numbers are assumed to
    /// already be fractions and pass through unchanged.
    pub fn fraction(&self) -> Result<f64> {
        match self {
            Quantity::Number(n) => Ok(*n),
            Quantity::Text(s) => {
                let t = s.trim();
                match t.strip_suffix('%') {
                    Some(num) => Ok(parse_number(num, s)? / 100.0),
                    None => parse_number(t, s),
                }
            }
        }
    }
}

impl From<f64> for Quantity {
    fn from(n: f64) -> Self {
        Quantity::Number(n)
    }
}

/// Strip the first matching suffix and scale. Longer suffixes must come
/// before their tails in `scales` ("kW" before "W"). A value with no
/// recognized suffix is parsed as a bare number.
fn parse_suffixed(s: &str, scales: &[(&str, f64)]) -> Result<f64> {
    let t = s.trim();
    for (suffix, scale) in scales {
        if let Some(num) = t.strip_suffix(suffix) {
            return Ok(parse_number(num, s)? * scale);
        }
    }
    parse_number(t, s)
}

fn parse_number(num: &str, original: &str) -> Result<f64> {
    num.trim()
        .parse::<f64>()
        .map_err(|_| ModelError::Parse(format!("invalid quantity '{}'", original)))
}
