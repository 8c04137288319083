// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Component catalog lookup.
//!
//! The catalog is a set of TOML documents, one per component category
//! (CPU, DRAM, SSD, SSD reuse, NIC, CXL controller) plus the fixed
//! server/rack/data-center bundles. Lookups resolve a component identity
//! (vendor, type, size, frequency, bandwidth) to a normalized
//! [`ComponentSpec`]; a miss is a fatal [`ModelError::NotFound`] naming the
//! full attribute combination. All unit conversion and field defaulting
//! (missing carbon -> 0, missing CPU threads -> 2) happens here, at the
//! lookup boundary, never inside aggregation.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{ModelError, Result};
use crate::units::Quantity;

mod spec;

pub use spec::{
    Bundle, ComponentKey, ComponentSet, ComponentSpec, CxlControllerSpec, DcSpec, DerateTable,
};

/// CPUs without an explicit thread count are assumed SMT-2.
const DEFAULT_CPU_THREADS: u32 = 2;

const EPSILON_GB: f64 = 1e-6;

// === raw document schemas ===

#[derive(Debug, Deserialize)]
struct CpuDocument {
    vendors: Vec<CpuVendor>,
}

#[derive(Debug, Deserialize)]
struct CpuVendor {
    vendor: String,
    #[serde(default)]
    spec_derates: Option<DerateTable>,
    types: Vec<CpuFamily>,
}

#[derive(Debug, Deserialize)]
struct CpuFamily {
    #[serde(rename = "type")]
    family: String,
    core_counts: Vec<CpuSku>,
}

#[derive(Debug, Deserialize)]
struct CpuSku {
    count: u32,
    power: Quantity,
    #[serde(default)]
    carbon: Option<f64>,
    #[serde(default)]
    threads: Option<u32>,
    #[serde(default)]
    lifetime: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(transparent)]
struct MemoryDocument(BTreeMap<String, MemoryKind>);

#[derive(Debug, Deserialize)]
struct MemoryKind {
    #[serde(default)]
    spec_derates: Option<DerateTable>,
    frequencies: Vec<MemoryFrequency>,
}

#[derive(Debug, Deserialize)]
struct MemoryFrequency {
    frequency: String,
    sizes: Vec<MemorySku>,
}

#[derive(Debug, Deserialize)]
struct MemorySku {
    size: Quantity,
    power: Quantity,
    #[serde(default)]
    carbon: Option<f64>,
    #[serde(default)]
    lifetime: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct SsdDocument {
    types: Vec<SsdKind>,
}

#[derive(Debug, Deserialize)]
struct SsdKind {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    spec_derates: Option<DerateTable>,
    #[serde(default)]
    carbon: Option<f64>,
    #[serde(default)]
    lifetime: Option<f64>,
    sizes: Vec<SsdSku>,
}

#[derive(Debug, Deserialize)]
struct SsdSku {
    size: Quantity,
    power: Quantity,
    #[serde(default)]
    carbon: Option<f64>,
    #[serde(default)]
    lifetime: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct NicDocument {
    #[serde(default)]
    spec_derates: Option<DerateTable>,
    bandwidths: Vec<NicSku>,
}

#[derive(Debug, Deserialize)]
struct NicSku {
    bandwidth: String,
    power: Quantity,
    #[serde(default)]
    carbon: Option<f64>,
    #[serde(default)]
    lifetime: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct CxlControllerDocument {
    #[serde(default)]
    spec_derates: Option<DerateTable>,
    types: BTreeMap<String, CxlControllerRaw>,
}

#[derive(Debug, Deserialize)]
struct CxlControllerRaw {
    power: Quantity,
    #[serde(default)]
    carbon: Option<f64>,
    #[serde(default)]
    lifetime: Option<f64>,
    channels: u32,
    dimms_per_channel: u32,
}

#[derive(Debug, Deserialize)]
struct BundleDocument {
    types: Vec<BundleKind>,
}

#[derive(Debug, Deserialize)]
struct BundleKind {
    #[serde(rename = "type")]
    kind: String,
    items: BTreeMap<String, RawItem>,
}

#[derive(Debug, Deserialize)]
struct DcDocument {
    types: Vec<DcKind>,
}

#[derive(Debug, Deserialize)]
struct DcKind {
    #[serde(rename = "type")]
    kind: String,
    power_capacity: Quantity,
    rack_capacity: Quantity,
    items: BTreeMap<String, RawItem>,
}

/// A bundle sub-item as written in a catalog document.
#[derive(Debug, Deserialize)]
struct RawItem {
    #[serde(default)]
    power: Option<Quantity>,
    #[serde(default)]
    size: Option<Quantity>,
    #[serde(default)]
    capacity: Option<Quantity>,
    #[serde(default)]
    carbon: Option<f64>,
    #[serde(default)]
    number: Option<f64>,
    #[serde(default)]
    lifetime: Option<f64>,
    #[serde(default)]
    spec_derates: Option<DerateTable>,
}

impl RawItem {
    fn normalize(&self) -> Result<ComponentSpec> {
        Ok(ComponentSpec {
            power_watts: match &self.power {
                Some(q) => q.watts()?,
                None => 0.0,
            },
            size_gb: match &self.size {
                Some(q) => Some(q.gigabytes()?),
                None => None,
            },
            space_units: match &self.capacity {
                Some(q) => Some(q.rack_units()?),
                None => None,
            },
            carbon_kg: self.carbon.unwrap_or(0.0),
            lifetime_months: self.lifetime,
            count: self.number.unwrap_or(1.0),
            derate_samples: samples_of(&self.spec_derates)?,
            ..ComponentSpec::default()
        })
    }
}

fn samples_of(table: &Option<DerateTable>) -> Result<Option<Vec<(f64, f64)>>> {
    match table {
        Some(t) => Ok(Some(t.samples()?)),
        None => Ok(None),
    }
}

// === catalog ===

/// In-memory TOML sources for every catalog document. The test and
/// embedding boundary: [`Catalog::load`] reads these from disk,
/// [`Catalog::from_documents`] accepts them directly.
#[derive(Debug, Clone, Default)]
pub struct CatalogDocuments {
    pub cpu: String,
    pub memory: String,
    pub ssd: String,
    pub ssd_reuse: String,
    pub nic: String,
    pub cxl_controller: String,
    pub server: String,
    pub rack: String,
    pub data_center: String,
}

/// Parsed component catalog. Lookups are pure reads.
#[derive(Debug)]
pub struct Catalog {
    cpu: CpuDocument,
    memory: MemoryDocument,
    ssd: SsdDocument,
    ssd_reuse: SsdDocument,
    nic: NicDocument,
    cxl_controller: CxlControllerDocument,
    server: BundleDocument,
    rack: BundleDocument,
    dc: DcDocument,
}

impl Catalog {
    /// Read the nine catalog documents from `dir`.
    pub fn load(dir: &Path) -> Result<Self> {
        let read = |name: &str| -> Result<String> {
            fs::read_to_string(dir.join(name)).map_err(|e| {
                ModelError::Configuration(format!(
                    "cannot read catalog document {}: {}",
                    dir.join(name).display(),
                    e
                ))
            })
        };
        Self::from_documents(&CatalogDocuments {
            cpu: read("CPU.toml")?,
            memory: read("DRAM.toml")?,
            ssd: read("SSD.toml")?,
            ssd_reuse: read("SSD_reuse.toml")?,
            nic: read("NIC.toml")?,
            cxl_controller: read("CXL_controller.toml")?,
            server: read("server.toml")?,
            rack: read("rack.toml")?,
            data_center: read("data_center.toml")?,
        })
    }

    /// Parse a catalog from in-memory TOML documents.
    pub fn from_documents(docs: &CatalogDocuments) -> Result<Self> {
        Ok(Self {
            cpu: parse_doc("CPU catalog", &docs.cpu)?,
            memory: parse_doc("DRAM catalog", &docs.memory)?,
            ssd: parse_doc("SSD catalog", &docs.ssd)?,
            ssd_reuse: parse_doc("SSD reuse catalog", &docs.ssd_reuse)?,
            nic: parse_doc("NIC catalog", &docs.nic)?,
            cxl_controller: parse_doc("CXL controller catalog", &docs.cxl_controller)?,
            server: parse_doc("server catalog", &docs.server)?,
            rack: parse_doc("rack catalog", &docs.rack)?,
            dc: parse_doc("data center catalog", &docs.data_center)?,
        })
    }

    /// Resolve a CPU by vendor, family, and core count. The derating table
    /// lives at the vendor level and is shared by all of that vendor's SKUs.
    pub fn cpu(&self, vendor: &str, family: &str, core_count: u32) -> Result<ComponentSpec> {
        for v in &self.cpu.vendors {
            if v.vendor != vendor {
                continue;
            }
            for fam in &v.types {
                if fam.family != family {
                    continue;
                }
                for sku in &fam.core_counts {
                    if sku.count != core_count {
                        continue;
                    }
                    return Ok(ComponentSpec {
                        power_watts: sku.power.watts()?,
                        core_count: Some(sku.count),
                        threads: Some(sku.threads.unwrap_or(DEFAULT_CPU_THREADS)),
                        carbon_kg: sku.carbon.unwrap_or(0.0),
                        lifetime_months: sku.lifetime,
                        derate_samples: samples_of(&v.spec_derates)?,
                        ..ComponentSpec::default()
                    });
                }
            }
        }
        Err(ModelError::NotFound(format!(
            "CPU data for {} {} with {} cores",
            vendor, family, core_count
        )))
    }

    /// Resolve a DRAM or CXL DIMM by type, frequency label, and size in GB.
    pub fn memory(&self, kind: &str, frequency: &str, size_gb: f64) -> Result<ComponentSpec> {
        if let Some(kind_data) = self.memory.0.get(kind) {
            for freq in &kind_data.frequencies {
                if freq.frequency != frequency {
                    continue;
                }
                for sku in &freq.sizes {
                    if (sku.size.gigabytes()? - size_gb).abs() > EPSILON_GB {
                        continue;
                    }
                    return Ok(ComponentSpec {
                        power_watts: sku.power.watts()?,
                        size_gb: Some(sku.size.gigabytes()?),
                        carbon_kg: sku.carbon.unwrap_or(0.0),
                        lifetime_months: sku.lifetime,
                        derate_samples: samples_of(&kind_data.spec_derates)?,
                        ..ComponentSpec::default()
                    });
                }
            }
        }
        Err(ModelError::NotFound(format!(
            "memory data for {} {} {}GB",
            kind, frequency, size_gb
        )))
    }

    /// Resolve an SSD by type and size in GB. `reuse` selects the
    /// second-life catalog. Type-level fields (derates, lifetime, carbon)
    /// take precedence over size-level ones.
    pub fn ssd(&self, kind: &str, size_gb: f64, reuse: bool) -> Result<ComponentSpec> {
        let doc = if reuse { &self.ssd_reuse } else { &self.ssd };
        for kind_data in &doc.types {
            if kind_data.kind != kind {
                continue;
            }
            for sku in &kind_data.sizes {
                if (sku.size.gigabytes()? - size_gb).abs() > EPSILON_GB {
                    continue;
                }
                return Ok(ComponentSpec {
                    power_watts: sku.power.watts()?,
                    size_gb: Some(sku.size.gigabytes()?),
                    carbon_kg: kind_data.carbon.or(sku.carbon).unwrap_or(0.0),
                    lifetime_months: kind_data.lifetime.or(sku.lifetime),
                    derate_samples: samples_of(&kind_data.spec_derates)?,
                    ..ComponentSpec::default()
                });
            }
        }
        Err(ModelError::NotFound(format!(
            "SSD data for {} {}GB{}",
            kind,
            size_gb,
            if reuse { " (reuse)" } else { "" }
        )))
    }

    /// Resolve a NIC by bandwidth class.
    pub fn nic(&self, bandwidth: &str) -> Result<ComponentSpec> {
        for sku in &self.nic.bandwidths {
            if sku.bandwidth != bandwidth {
                continue;
            }
            return Ok(ComponentSpec {
                power_watts: sku.power.watts()?,
                carbon_kg: sku.carbon.unwrap_or(0.0),
                lifetime_months: sku.lifetime,
                derate_samples: samples_of(&self.nic.spec_derates)?,
                ..ComponentSpec::default()
            });
        }
        Err(ModelError::NotFound(format!("NIC data for {}", bandwidth)))
    }

    /// Resolve a CXL controller by type, with its DIMM geometry.
    pub fn cxl_controller(&self, kind: &str) -> Result<CxlControllerSpec> {
        if let Some(raw) = self.cxl_controller.types.get(kind) {
            return Ok(CxlControllerSpec {
                spec: ComponentSpec {
                    power_watts: raw.power.watts()?,
                    carbon_kg: raw.carbon.unwrap_or(0.0),
                    lifetime_months: raw.lifetime,
                    derate_samples: samples_of(&self.cxl_controller.spec_derates)?,
                    ..ComponentSpec::default()
                },
                channels: raw.channels,
                dimms_per_channel: raw.dimms_per_channel,
            });
        }
        Err(ModelError::NotFound(format!(
            "CXL controller data for {}",
            kind
        )))
    }

    /// Resolve the server shell bundle for a server type.
    pub fn server_bundle(&self, kind: &str) -> Result<Bundle> {
        bundle_lookup(&self.server, kind)
            .ok_or_else(|| ModelError::NotFound(format!("server data for {}", kind)))?
    }

    /// Resolve the rack infrastructure bundle for a rack type.
    pub fn rack_bundle(&self, kind: &str) -> Result<Bundle> {
        bundle_lookup(&self.rack, kind)
            .ok_or_else(|| ModelError::NotFound(format!("rack data for {}", kind)))?
    }

    /// Resolve the data-center record: infrastructure bundle plus power and
    /// rack capacities.
    pub fn datacenter(&self, kind: &str) -> Result<DcSpec> {
        for dc in &self.dc.types {
            if dc.kind != kind {
                continue;
            }
            return Ok(DcSpec {
                items: normalize_items(&dc.items)?,
                power_capacity_watts: dc.power_capacity.watts()?,
                rack_capacity: dc.rack_capacity.count()?,
            });
        }
        Err(ModelError::NotFound(format!(
            "data center data for {}",
            kind
        )))
    }
}

fn parse_doc<T: serde::de::DeserializeOwned>(name: &str, source: &str) -> Result<T> {
    toml::from_str(source).map_err(|e| ModelError::Parse(format!("{}: {}", name, e)))
}

fn bundle_lookup(doc: &BundleDocument, kind: &str) -> Option<Result<Bundle>> {
    doc.types
        .iter()
        .find(|b| b.kind == kind)
        .map(|b| normalize_items(&b.items))
}

fn normalize_items(items: &BTreeMap<String, RawItem>) -> Result<Bundle> {
    let mut out = Bundle::new();
    for (name, raw) in items {
        out.insert(name.clone(), raw.normalize()?);
    }
    Ok(out)
}
