//! Offline training run: preprocess, cluster, label, persist

use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::info;

use crate::artifacts::{save_artifacts, ArtifactPaths, TrainingManifest};
use crate::data::{CustomerRecord, DEFAULT_SAMPLES, RANDOM_SEED};
use crate::error::PredictError;
use crate::labels::{cluster_profiles, ClusterProfile, LabelTable};
use crate::model::{fit_kmeans, KMeansModel, KMeansOptions, N_CLUSTERS};
use crate::preprocess::Preprocessor;
use crate::service::{Prediction, Segmenter};

/// Training settings
#[derive(Debug, Clone, PartialEq)]
pub struct TrainOptions {
    /// Records to generate when no input CSV is given
    pub n_samples: usize,
    /// Seed for data generation and centroid initialization
    pub seed: u64,
    pub max_iters: u64,
    pub tolerance: f64,
    pub n_runs: usize,
    /// Train on this CSV instead of synthetic data
    pub input: Option<PathBuf>,
}

impl Default for TrainOptions {
    fn default() -> Self {
        let kmeans = KMeansOptions::default();
        Self {
            n_samples: DEFAULT_SAMPLES,
            seed: RANDOM_SEED,
            max_iters: kmeans.max_iters,
            tolerance: kmeans.tolerance,
            n_runs: kmeans.n_runs,
            input: None,
        }
    }
}

impl TrainOptions {
    pub fn kmeans(&self) -> KMeansOptions {
        KMeansOptions {
            n_clusters: N_CLUSTERS,
            max_iters: self.max_iters,
            tolerance: self.tolerance,
            n_runs: self.n_runs,
            seed: self.seed,
        }
    }
}

/// Result of one training run, before and after persistence
#[derive(Debug, Clone)]
pub struct TrainedPipeline {
    pub preprocessor: Preprocessor,
    pub model: KMeansModel,
    pub labels: LabelTable,
    pub profiles: Vec<ClusterProfile>,
    /// Partition index per training record
    pub assignments: Vec<usize>,
    pub seed: u64,
}

/// Fit the transform and the partition model, then derive the label table
pub fn train(records: &[CustomerRecord], options: &TrainOptions) -> crate::Result<TrainedPipeline> {
    let preprocessor = Preprocessor::fit(records)?;
    let features = preprocessor.transform(records);
    info!(
        rows = features.nrows(),
        n_features = features.ncols(),
        "preprocessor fitted"
    );

    let model = fit_kmeans(&features, &options.kmeans())?;
    let assignments = model.labels.to_vec();

    let profiles = cluster_profiles(records, &assignments, model.n_clusters)?;
    let labels = LabelTable::from_profiles(&profiles)?;
    for (cluster, tier) in labels.iter() {
        info!(cluster, %tier, "cluster labeled");
    }

    Ok(TrainedPipeline {
        preprocessor,
        model,
        labels,
        profiles,
        assignments,
        seed: options.seed,
    })
}

impl TrainedPipeline {
    /// Persist the three artifacts and a manifest into `dir`
    pub fn save(&self, dir: impl AsRef<Path>) -> crate::Result<ArtifactPaths> {
        let manifest = TrainingManifest {
            trained_at: Utc::now(),
            seed: self.seed,
            n_samples: self.assignments.len(),
            n_features: self.preprocessor.n_features(),
            n_clusters: self.model.n_clusters,
            inertia: self.model.inertia,
        };
        save_artifacts(
            dir,
            &self.preprocessor,
            &self.model,
            &self.labels,
            Some(&manifest),
        )
    }

    /// Prediction context over the in-memory artifacts
    pub fn segmenter(&self) -> crate::Result<Segmenter> {
        Segmenter::from_parts(
            self.preprocessor.clone(),
            self.model.clone(),
            self.labels.clone(),
        )
    }

    /// Predict a single record with the freshly trained artifacts
    pub fn predict(&self, record: &CustomerRecord) -> Result<Prediction, PredictError> {
        self.segmenter()?.predict(record)
    }
}

/// The record used for the example prediction at the end of a training run
pub fn example_record() -> CustomerRecord {
    CustomerRecord::new("North London", 50000.0, 10.0, "Masters")
}
