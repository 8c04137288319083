// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Carbon Model: operational and embodied carbon accounting for
//! data-center server SKUs.
//!
//! The model takes a parametrized bill-of-materials (CPU, memory, CXL,
//! storage, network, chassis, rack, data center), resolves every part
//! against a component catalog, fits empirical derate curves, and rolls
//! power and emissions up component -> server -> rack -> data center,
//! normalized to carbon per sellable core. Construction is a one-shot,
//! single-threaded batch computation: a built [`model::SkuModel`] is
//! read-only and fully reproducible from its inputs.
//!
//! # Examples
//!
//! ```no_run
//! use std::collections::BTreeMap;
//! use std::path::Path;
//! use carmolib::catalog::Catalog;
//! use carmolib::config::{Params, ServerConfig};
//! use carmolib::model::SkuModel;
//! use carmolib::report::SkuReport;
//!
//! # fn run() -> carmolib::Result<()> {
//! let data_dir = Path::new("data/carbon_data");
//! let catalog = Catalog::load(data_dir)?;
//! let params = Params::load(&data_dir.join("params.toml"), &BTreeMap::new())?;
//! let config = ServerConfig::load(Path::new("configs/gp-2s.toml"))?;
//!
//! let model = SkuModel::build(config, &catalog, params)?;
//! println!("{}", SkuReport::from_model(&model));
//! # Ok(())
//! # }
//! ```

pub mod capacity;
pub mod carbon;
pub mod catalog;
pub mod config;
pub mod cores;
pub mod curve;
pub mod error;
pub mod maintenance;
pub mod model;
pub mod power;
pub mod report;
pub mod units;

pub use capacity::{CapacityState, LimitingFactor};
pub use carbon::{CarbonFigures, LevelCarbon};
pub use catalog::{Catalog, CatalogDocuments, ComponentKey, ComponentSpec};
pub use config::{Params, ServerConfig};
pub use curve::DerateCurve;
pub use error::{ModelError, Result};
pub use maintenance::MaintenanceModel;
pub use model::SkuModel;
pub use report::SkuReport;
pub use units::Quantity;

/// Crate version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
