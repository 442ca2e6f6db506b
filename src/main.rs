//! SegmentForge: customer income-tier segmentation
//!
//! `train` runs the offline pipeline and writes the artifacts; `serve` loads
//! them and answers predictions over HTTP.

use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use segmentforge::cli::{Args, Command, ServeArgs, TrainArgs};
use segmentforge::{data, pipeline, server, viz, ServiceConfig};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

fn main() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Command::Train(ref train_args) => {
            init_logging(args.verbose, false);
            run_train(train_args)
        }
        Command::Serve(ref serve_args) => run_serve(args.verbose, serve_args),
    }
}

fn init_logging(verbose: u8, debug: bool) {
    let filter = match (verbose, debug) {
        (0, false) => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        (0, true) | (1, _) => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();
}

/// Run the training pipeline end to end
fn run_train(args: &TrainArgs) -> Result<()> {
    println!("=== Training Pipeline ===\n");

    let options = args.options()?;
    let start_time = Instant::now();

    // Step 1: Load or generate data
    let records = match &options.input {
        Some(path) => data::load_customers(path)?,
        None => data::generate_synthetic_customers(options.n_samples, options.seed),
    };
    println!("✓ Data ready: {} customers", records.len());

    // Step 2: Fit preprocessor and K-Means, derive labels
    let fit_start = Instant::now();
    let trained = pipeline::train(&records, &options)?;
    println!("✓ Model fitted in {:.2}s", fit_start.elapsed().as_secs_f64());

    viz::print_cluster_statistics(&trained.profiles, &trained.labels, trained.model.inertia);

    let features = trained.preprocessor.transform(&records);
    let silhouette = trained
        .model
        .compute_silhouette_sample(&features, 500.min(records.len()));
    println!("\nSilhouette score (sample): {:.3}", silhouette);

    // Step 3: Persist artifacts
    let paths = trained.save(&args.output_dir)?;
    println!("\n✓ Artifacts saved to: {}", args.output_dir.display());
    info!(?paths, "artifact paths");

    // Step 4: Optional outputs
    if let Some(plot) = &args.plot {
        if let Some(parent) = plot.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create '{}'", parent.display()))?;
        }
        viz::create_cluster_visualization(&records, &trained.assignments, &trained.labels, plot)?;
        let sizes = plot.with_file_name(format!(
            "{}_sizes.png",
            plot.file_stem().and_then(|s| s.to_str()).unwrap_or("clusters")
        ));
        viz::create_cluster_size_chart(&trained.profiles, &trained.labels, &sizes)?;
        println!("✓ Plots saved to: {} and {}", plot.display(), sizes.display());
    }
    if let Some(csv) = &args.dump_csv {
        data::write_labeled_customers(csv, &records, &trained.assignments, &trained.labels)?;
        println!("✓ Labeled customers saved to: {}", csv.display());
    }

    // Example prediction with the freshly trained artifacts
    let example = pipeline::example_record();
    let prediction = trained.predict(&example)?;
    println!(
        "\nExample data ({}, £{:.0}, {} years, {}) belongs to cluster {} ({})",
        example.area,
        example.amount_spent,
        example.tenure,
        example.qualification,
        prediction.cluster,
        prediction.label
    );

    println!("\n=== Pipeline Complete ===");
    println!(
        "Total processing time: {:.2}s",
        start_time.elapsed().as_secs_f64()
    );

    Ok(())
}

/// Load config and artifacts, then serve until interrupted
fn run_serve(verbose: u8, args: &ServeArgs) -> Result<()> {
    let config = ServiceConfig::load(args.config.as_deref())?;
    init_logging(verbose, config.server.debug);
    info!(?config, "configuration loaded");

    let runtime = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
    runtime.block_on(server::serve(&config))
}
