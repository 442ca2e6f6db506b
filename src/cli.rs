//! Command-line interface definitions and argument parsing

use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

use crate::config::DEFAULT_ARTIFACT_DIR;
use crate::data::{DEFAULT_SAMPLES, RANDOM_SEED};
use crate::pipeline::TrainOptions;

/// Customer income-tier segmentation using K-Means
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fit the preprocessor and K-Means model, derive labels and save artifacts
    Train(TrainArgs),
    /// Serve predictions over HTTP from saved artifacts
    Serve(ServeArgs),
}

#[derive(ClapArgs, Debug, Clone)]
pub struct TrainArgs {
    /// Train on this CSV instead of generating synthetic customers
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Number of synthetic customers to generate
    #[arg(short = 'n', long, default_value_t = DEFAULT_SAMPLES)]
    pub samples: usize,

    /// Random seed for data generation and K-Means initialization
    #[arg(long, default_value_t = RANDOM_SEED)]
    pub seed: u64,

    /// Directory the artifacts are written to
    #[arg(short, long, default_value = DEFAULT_ARTIFACT_DIR)]
    pub output_dir: PathBuf,

    /// Save a spend-vs-tenure scatter plot to this PNG
    #[arg(long)]
    pub plot: Option<PathBuf>,

    /// Save the training records with their cluster and label to this CSV
    #[arg(long)]
    pub dump_csv: Option<PathBuf>,

    /// Maximum iterations for K-Means algorithm
    #[arg(long, default_value = "300")]
    pub max_iters: u64,

    /// Tolerance for K-Means convergence
    #[arg(long, default_value = "1e-4")]
    pub tolerance: f64,

    /// Number of K-Means initializations
    #[arg(long, default_value = "10")]
    pub n_runs: usize,
}

impl TrainArgs {
    pub fn options(&self) -> crate::Result<TrainOptions> {
        if self.input.is_none() && self.samples == 0 {
            anyhow::bail!("--samples must be greater than zero");
        }
        if self.n_runs == 0 {
            anyhow::bail!("--n-runs must be greater than zero");
        }
        if !(self.tolerance > 0.0) {
            anyhow::bail!("--tolerance must be positive");
        }

        Ok(TrainOptions {
            n_samples: self.samples,
            seed: self.seed,
            max_iters: self.max_iters,
            tolerance: self.tolerance,
            n_runs: self.n_runs,
            input: self.input.clone(),
        })
    }
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ServeArgs {
    /// TOML config file; defaults and SEGMENT_* variables apply without it
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}
