use clap::Parser;
use std::path::PathBuf;

/// Daily sediment-routing and floodplain-evolution simulation over a
/// drainage network.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Drainage network GeoPackage
    pub network: PathBuf,

    /// Hydrograph CSV, one row per gauge
    pub hydrographs: PathBuf,

    /// Width calibration CSV with DA, Q, w columns
    pub width_table: PathBuf,

    /// Flow exponent b in Q = a * DA^b
    #[arg(long)]
    pub flow_exp: f64,

    /// Network attribute table name
    #[arg(long, default_value = "reaches")]
    pub table: String,

    /// Minimum Manning's n across the basin
    #[arg(long, default_value_t = 0.03)]
    pub mannings_min: f64,

    /// Maximum Manning's n across the basin
    #[arg(long, default_value_t = 0.06)]
    pub mannings_max: f64,

    /// Bulk density of stored sediment (t/m^3)
    #[arg(long, default_value_t = 1.0)]
    pub bulk_density: f64,

    /// Prior channel-storage snapshot to seed day 1
    #[arg(long)]
    pub storage: Option<PathBuf>,

    /// Run as a calibration (spin-up) pass: converge slope/thickness to the
    /// mid scenario, rewrite the network table and save a storage snapshot
    #[arg(long)]
    pub spinup: bool,

    /// Seed for the denudation-rate draws
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Output CSV path; defaults to a timestamped name
    #[arg(long)]
    pub output: Option<PathBuf>,
}

pub fn get_args() -> Args {
    Args::parse()
}
