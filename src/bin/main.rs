//! CLI tool for the carbon model (carmo)

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use colored::Colorize;

use carmolib::catalog::Catalog;
use carmolib::config::{Params, ServerConfig};
use carmolib::maintenance::MaintenanceModel;
use carmolib::model::SkuModel;
use carmolib::report::SkuReport;

#[derive(Parser)]
#[command(name = "carmo")]
#[command(
    about = "Carbon Model: operational and embodied carbon accounting for data-center server SKUs",
    long_about = None
)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a server configuration against a component catalog
    Evaluate {
        /// Server configuration file (TOML)
        #[arg(short, long)]
        config: PathBuf,

        /// Catalog data directory (component documents plus params.toml)
        #[arg(short, long)]
        data_dir: PathBuf,

        /// Output format (json or text)
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Override a model parameter, repeatable (e.g. --set PUE=1.1)
        #[arg(long = "set", value_name = "KEY=VALUE")]
        overrides: Vec<String>,
    },
    /// Annual failure rate for a server configuration
    Afr {
        /// Server configuration file (TOML)
        #[arg(short, long)]
        config: PathBuf,

        /// Catalog data directory (component documents plus params.toml)
        #[arg(short, long)]
        data_dir: PathBuf,

        /// Maintenance rate table (TOML)
        #[arg(short, long)]
        maintenance: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    match &cli.command {
        Commands::Evaluate {
            config,
            data_dir,
            format,
            overrides,
        } => {
            let model = build_model(config, data_dir, overrides)?;
            let report = SkuReport::from_model(&model);
            if format == "json" {
                println!("{}", report.to_json()?);
            } else {
                println!("{}", report);
                println!(
                    "{} {} kgCO2e per sellable core",
                    "carbon:".green().bold(),
                    format!("{:.2}", report.carbon_per_sellable_core).bold()
                );
            }
        }
        Commands::Afr {
            config,
            data_dir,
            maintenance,
        } => {
            let model = build_model(config, data_dir, &[])?;
            let rates = MaintenanceModel::load(maintenance)?;
            let afr = rates.annual_failure_rate(&model)?;
            println!(
                "{} {:.4} failures per server-year ({:.2}%)",
                "AFR:".yellow().bold(),
                afr,
                afr * 100.0
            );
        }
    }
    Ok(())
}

fn build_model(
    config: &Path,
    data_dir: &Path,
    overrides: &[String],
) -> Result<SkuModel, Box<dyn std::error::Error>> {
    let overrides = parse_overrides(overrides)?;
    let catalog = Catalog::load(data_dir)?;
    let params = Params::load(&data_dir.join("params.toml"), &overrides)?;
    let server = ServerConfig::load(config)?;
    Ok(SkuModel::build(server, &catalog, params)?)
}

fn parse_overrides(pairs: &[String]) -> Result<BTreeMap<String, f64>, Box<dyn std::error::Error>> {
    let mut map = BTreeMap::new();
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| format!("invalid override '{}', expected KEY=VALUE", pair))?;
        let parsed: f64 = value
            .trim()
            .parse()
            .map_err(|_| format!("invalid override value in '{}'", pair))?;
        map.insert(key.trim().to_string(), parsed);
    }
    Ok(map)
}
