//! SegmentForge: customer income-tier segmentation with K-Means
//!
//! An offline training run standardizes and one-hot encodes customer records,
//! fits a three-cluster K-Means model and names the clusters Low, Middle and
//! High Income by their mean spend. The prediction service loads those
//! artifacts once and labels single records over HTTP.

pub mod artifacts;
pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod labels;
pub mod model;
pub mod pipeline;
pub mod preprocess;
pub mod server;
pub mod service;
pub mod viz;

// Re-export public items for easier access
pub use artifacts::{load_artifacts, save_artifacts, ArtifactPaths};
pub use cli::Args;
pub use config::ServiceConfig;
pub use data::{generate_synthetic_customers, load_customers, CustomerRecord};
pub use error::PredictError;
pub use labels::{IncomeTier, LabelTable};
pub use model::{fit_kmeans, KMeansModel, KMeansOptions};
pub use pipeline::{train, TrainOptions, TrainedPipeline};
pub use preprocess::Preprocessor;
pub use service::{parse_request, Prediction, Segmenter};

/// Common result type used throughout the application
pub type Result<T> = anyhow::Result<T>;
