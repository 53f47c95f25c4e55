use anyhow::{Context, Result};
use chrono::Local;
use indicatif::{ProgressBar, ProgressStyle};
use serfe::config::{ColumnConfig, ModelParams};
use serfe::hydrology::HydrographSet;
use serfe::io;
use serfe::scheduler::Simulation;
use serfe::width::WidthModel;

mod cli;

use cli::get_args;

fn main() -> Result<()> {
    let args = get_args();

    let mut params = ModelParams::new(args.flow_exp);
    params.mannings_min = args.mannings_min;
    params.mannings_max = args.mannings_max;
    params.bulk_density = args.bulk_density;
    let column_config = ColumnConfig::new();

    // Load the drainage network
    println!("Building network topology...");
    let conn = rusqlite::Connection::open(&args.network)
        .with_context(|| format!("Failed to open network dataset: {:?}", args.network))?;
    let network = io::gpkg::load_network(&conn, &args.table, &column_config)?;

    // Load gauge hydrographs
    println!("Loading hydrographs...");
    let gauges = io::csv::load_hydrographs(&args.hydrographs)?;
    let hydrographs = HydrographSet::new(gauges, &network, params.flow_exp)?;

    // Fit the channel-width model
    println!("Fitting width model...");
    let samples = io::csv::load_width_table(&args.width_table)?;
    let width_model = WidthModel::fit(&samples)?;

    // Optional day-1 channel storage
    let initial_storage = match &args.storage {
        Some(path) => Some(
            io::snapshot::read_snapshot(path, network.len())
                .with_context(|| format!("Failed to read storage snapshot: {:?}", path))?,
        ),
        None => None,
    };

    let days = hydrographs.days();
    println!("\nSimulation Configuration:");
    println!("  Segments: {}", network.len());
    println!("  Days: {}", days);
    println!("  Flow exponent: {}", args.flow_exp);
    println!("  Seed: {}", args.seed);

    let pb = ProgressBar::new(days as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} days ({eta})")?
            .progress_chars("#>-"),
    );

    let mut simulation = Simulation::new(
        network,
        hydrographs,
        width_model,
        params,
        initial_storage,
        args.seed,
    );

    if args.spinup {
        println!("\nStarting spin-up run...");
        let storage = simulation.run_spinup(Some(&pb))?;
        pb.finish();

        io::gpkg::write_back_state(&conn, &args.table, &column_config, &simulation.network)
            .context("Failed to write converged state back to the network table")?;

        let snapshot_path = args
            .output
            .unwrap_or_else(|| "serfe_spinup_storage.bin".into());
        io::snapshot::write_snapshot(&snapshot_path, &storage)
            .with_context(|| format!("Failed to write storage snapshot: {:?}", snapshot_path))?;
        println!(
            "\nSpin-up complete. Network updated, storage snapshot saved to {:?}",
            snapshot_path
        );
    } else {
        println!("\nStarting simulation...");
        simulation.run(Some(&pb))?;
        pb.finish();

        let output_path = args.output.unwrap_or_else(|| {
            format!("serfe_output_{}.csv", Local::now().format("%Y%m%d%H%M")).into()
        });
        io::csv::write_results(&output_path, &simulation.output, &simulation.network)?;
        println!("\nSimulation complete. Output saved to {:?}", output_path);
    }

    Ok(())
}
