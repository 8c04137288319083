//! End-to-end model construction over an in-memory catalog.

use std::collections::BTreeMap;

use carmolib::catalog::{Catalog, CatalogDocuments, ComponentKey};
use carmolib::config::{Params, ServerConfig};
use carmolib::maintenance::MaintenanceModel;
use carmolib::model::SkuModel;
use carmolib::power;
use carmolib::report::SkuReport;

const CPU_DOC: &str = r#"
[[vendors]]
vendor = "amd"

[vendors.spec_derates]
"0" = 0.4
"25" = 0.62
"50" = 0.78
"75" = 0.9
"100" = 1.0

[[vendors.types]]
type = "genoa"

[[vendors.types.core_counts]]
count = 96
power = "360W"
carbon = 900.0
threads = 2
"#;

const MEMORY_DOC: &str = r#"
[DDR5]
[DDR5.spec_derates]
"0" = 1.0
"100" = 1.0

[[DDR5.frequencies]]
frequency = "4800MHz"

[[DDR5.frequencies.sizes]]
size = "64GB"
power = "11W"
carbon = 54.0

[DDR4]
[[DDR4.frequencies]]
frequency = "3200MHz"

[[DDR4.frequencies.sizes]]
size = "64GB"
power = "9W"
carbon = 40.0
"#;

const SSD_DOC: &str = r#"
[[types]]
type = "nvme"
lifetime = 60

[[types.sizes]]
size = "1.92TB"
power = "8W"
carbon = 160.0
"#;

const SSD_REUSE_DOC: &str = r#"
[[types]]
type = "nvme"

[[types.sizes]]
size = "1.92TB"
power = "8W"
carbon = 20.0
"#;

const NIC_DOC: &str = r#"
[spec_derates]
"0" = 0.9
"100" = 0.9

[[bandwidths]]
bandwidth = "100G"
power = "18W"
carbon = 30.0
"#;

const CXL_DOC: &str = r#"
[types.expander]
power = "14W"
carbon = 20.0
channels = 2
dimms_per_channel = 2
"#;

const SERVER_DOC: &str = r#"
[[types]]
type = "general_2U"

[types.items.fan]
power = "50W"
number = 4

[types.items.motherboard]
power = "60W"
carbon = 180.0

[types.items.psu]
power = "20W"
carbon = 25.0
number = 2
"#;

const RACK_DOC: &str = r#"
[[types]]
type = "standard"

[types.items.switch]
power = "150W"
capacity = "1U"
carbon = 320.0
"#;

const DC_DOC: &str = r#"
[[types]]
type = "hyperscale"
power_capacity = "1.5MW"
rack_capacity = 120

[types.items.cooling]
power = "0W"
carbon = 50000.0
lifetime = 240

[types.items.building]
power = "0W"
carbon = 100000.0
lifetime = 480
"#;

const CONFIG: &str = r#"
[server]
name = "test-sku"
type = "general_2U"
form = "2U"
sockets = 2
spec = 100

[server.cpu]
vendor = "amd"
type = "genoa"
core_count = 96
number = 1
overhead = "10%"

[server.memory]
type = "DDR5"
frequency = "4800MHz"
size = "64GB"
number = 12

[server.cxl]
type = "DDR4"
frequency = 3200
size = "64GB"
number = 4
controller = "expander"

[server.ssd]
type = "nvme"
size = "1.92TB"
number = 2

[server.ssd_reuse]
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
spec_allocation = 60

[server.dc]
type = "hyperscale"

[server.oversubscription]
only_oversubscribable = false

[server.oversubscription.cpu_oversubscription]
oversubscribable = 0.5
rate = 0.5
"#;

const PARAMS: &str = r#"
emissions_factor = 0.5
PUE = 1.2
PSU_efficiency = 0.95
lifetime = 72
voltage_regulator_overhead = 1.14
power_factor = 0.9
fan_slope = 0.2
"1U_server_base" = "250W"
"2U_server_base" = "400W"
"#;

const MAINTENANCE_DOC: &str = r#"
[DRAM]
AFR = 0.4
reuse_AFR = 0.6
FIP_rate = 0.5

[CPU]
AFR = 1.0

[SSD]
AFR = 0.5
reuse_AFR = 0.9

[NIC]
AFR = 1.1

[Rest]
AFR = 2.0
"#;

fn catalog() -> Catalog {
    Catalog::from_documents(&CatalogDocuments {
        cpu: CPU_DOC.to_string(),
        memory: MEMORY_DOC.to_string(),
        ssd: SSD_DOC.to_string(),
        ssd_reuse: SSD_REUSE_DOC.to_string(),
        nic: NIC_DOC.to_string(),
        cxl_controller: CXL_DOC.to_string(),
        server: SERVER_DOC.to_string(),
        rack: RACK_DOC.to_string(),
        data_center: DC_DOC.to_string(),
    })
    .expect("catalog fixture parses")
}

fn build() -> SkuModel {
    let config = ServerConfig::from_toml_str(CONFIG).expect("config fixture parses");
    let params = Params::from_toml_str(PARAMS, &BTreeMap::new()).expect("params fixture parses");
    SkuModel::build(config, &catalog(), params).expect("model builds")
}

#[test]
fn construction_succeeds_end_to_end() {
    let model = build();
    assert!(model.server_count() > 0);
    assert!(model.rack_count() > 0);
    assert!(model.rack_carbon().total.total_kg() > 0.0);
}

#[test]
fn rollup_identities_hold() {
    let model = build();
    let own = model.component_carbon();

    let rack = model.rack_carbon().total;
    let server = model.server_carbon().total;
    let expected_rack =
        own.rack.total_kg() + model.server_count() as f64 * server.total_kg();
    assert!((rack.total_kg() - expected_rack).abs() < 1e-6);

    let dc = model.dc_carbon().total;
    let expected_dc = own.dc.total_kg() + model.rack_count() as f64 * rack.total_kg();
    assert!((dc.total_kg() - expected_dc).abs() < 1e-6);

    // the server total is exactly the sum of its component rows
    let component_sum: f64 = model
        .server_carbon()
        .components
        .values()
        .map(|f| f.total_kg())
        .sum();
    assert!((server.total_kg() - component_sum).abs() < 1e-6);
}

#[test]
fn operational_plus_embodied_is_total() {
    let model = build();
    for level in [model.server_carbon(), model.rack_carbon(), model.dc_carbon()] {
        for figures in level.components.values() {
            assert_eq!(
                figures.operational_kg + figures.embodied_kg,
                figures.total_kg()
            );
        }
    }
}

#[test]
fn sellable_cores_match_reference_arithmetic() {
    let model = build();
    let cores = model.cores();
    // 96 cores x 2 threads = 192 vCores per socket; 10% overhead -> 172.8;
    // blend (1 - 0.5) + 0.5/(1 - 0.5) = 1.5 -> 259.2
    assert!((cores.virtual_cores - 192.0).abs() < 1e-9);
    assert!((cores.sellable_cores - 259.2).abs() < 1e-9);
    assert!((model.server_sellable_cores() - 518.4).abs() < 1e-9);
}

#[test]
fn cxl_controller_count_derives_from_dimm_geometry() {
    let model = build();
    // 4 CXL DIMMs / (2 channels x 2 dimms per channel) = 1 controller
    let ctrl = &model.components().components[&ComponentKey::CxlController];
    assert_eq!(ctrl.count, 1.0);
}

#[test]
fn fan_feedback_reaches_fixed_point_in_one_pass() {
    let model = build();
    let no_fan = model.server_power_no_fan().expect("fan feedback ran");
    assert!(no_fan > 0.0);

    // fan power was rewritten away from its catalog value
    let fan = &model.components().server["fan"];
    assert!((fan.power_watts - 50.0).abs() > 1e-9);

    // recomputing power a third time changes nothing
    let recomputed = power::compute_power_set(
        model.components(),
        model.curves(),
        model.params(),
        model.allocated_spec(),
        model.provisioned_spec(),
    );
    let server_again = power::server_power(&recomputed, model.params(), model.socket_count());
    assert_eq!(server_again.provisioned_watts, model.server_power().provisioned_watts);
    assert_eq!(server_again.allocated_watts, model.server_power().allocated_watts);
    assert_eq!(server_again.used_watts, model.server_power().used_watts);
}

#[test]
fn provisioned_figures_use_rack_allocation() {
    let model = build();
    assert_eq!(model.allocated_spec(), 100.0);
    assert_eq!(model.provisioned_spec(), 60.0);
    // the CPU curve rises with utilization, so provisioned < allocated
    let cpu = model.power().components[&ComponentKey::Cpu];
    assert!(cpu.provisioned_watts < cpu.allocated_watts);
    // flat NIC derates make both points equal
    let nic = model.power().components[&ComponentKey::Nic];
    assert_eq!(nic.provisioned_watts, nic.allocated_watts);
}

#[test]
fn construction_is_deterministic() {
    let a = build();
    let b = build();
    assert_eq!(
        a.rack_carbon().total.operational_kg,
        b.rack_carbon().total.operational_kg
    );
    assert_eq!(
        a.dc_carbon().total.embodied_kg,
        b.dc_carbon().total.embodied_kg
    );
    assert_eq!(a.server_power().allocated_watts, b.server_power().allocated_watts);
    assert_eq!(a.capacity(), b.capacity());
    assert_eq!(a.carbon_per_sellable_core(), b.carbon_per_sellable_core());
}

#[test]
fn capacities_cover_every_socketed_resource() {
    let model = build();
    let caps = model.capacities();
    assert_eq!(caps["cpu"], 96.0);
    assert_eq!(caps["memory"], 768.0);
    assert_eq!(caps["cxl"], 256.0);
    assert_eq!(caps["total_memory"], 1024.0);
    // flash in TB: 2 x 1.92 new, 1 x 1.92 reuse
    assert!((caps["ssd"] - 3.84).abs() < 1e-9);
    assert!((caps["ssd_reuse"] - 1.92).abs() < 1e-9);
    assert_eq!(caps["cxl_controller"], 1.0);
}

#[test]
fn report_percentages_sum_to_100() {
    let model = build();
    let report = SkuReport::from_model(&model);
    for table in [&report.server, &report.rack, &report.dc] {
        let carbon_pct: f64 = table.rows.iter().map(|r| r.carbon_pct).sum();
        assert!((carbon_pct - 100.0).abs() < 1e-6);
    }
    assert_eq!(report.server_count, model.server_count());
    assert!(report.to_json().unwrap().contains("test-sku"));
}

#[test]
fn annual_failure_rate_weights_counts() {
    let model = build();
    let rates = MaintenanceModel::from_toml_str(MAINTENANCE_DOC).unwrap();
    let afr = rates.annual_failure_rate(&model).unwrap();
    // DRAM: (0.4 * 24 + 0.6 * 8) * 0.5 = 7.2; CPU: 1.0 * 2 = 2.0;
    // SSD: 0.5 * 4 + 0.9 * 2 = 3.8; NIC: 1.1 * 1 = 1.1; Rest: 2.0
    // total 16.1% -> 0.161
    assert!((afr - 0.161).abs() < 1e-9);
}

#[test]
fn catalog_miss_is_fatal_and_names_the_part() {
    let config = ServerConfig::from_toml_str(&CONFIG.replace("core_count = 96", "core_count = 48"))
        .unwrap();
    let params = Params::from_toml_str(PARAMS, &BTreeMap::new()).unwrap();
    let err = SkuModel::build(config, &catalog(), params).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Not found: CPU data for amd genoa with 48 cores"
    );
}

#[test]
fn server_count_override_bypasses_bounds() {
    let config = ServerConfig::from_toml_str(
        &CONFIG.replace("spec_allocation = 60", "spec_allocation = 60\nnum_servers = 5"),
    )
    .unwrap();
    let params = Params::from_toml_str(PARAMS, &BTreeMap::new()).unwrap();
    let model = SkuModel::build(config, &catalog(), params).unwrap();
    assert_eq!(model.server_count(), 5);
    assert_eq!(
        model.capacity().server_limit,
        carmolib::LimitingFactor::Override
    );
}
