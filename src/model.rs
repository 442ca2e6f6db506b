//! K-Means partition model

use linfa::prelude::*;
use linfa_clustering::KMeans;
use linfa_nn::distance::L2Dist;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Number of partitions the income-tier labeling is defined for
pub const N_CLUSTERS: usize = 3;

/// Settings for one K-Means fit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KMeansOptions {
    /// Number of clusters
    pub n_clusters: usize,
    /// Maximum iterations per run
    pub max_iters: u64,
    /// Convergence tolerance on centroid movement
    pub tolerance: f64,
    /// Independent initializations; the run with the lowest inertia wins
    pub n_runs: usize,
    /// Seed for centroid initialization
    pub seed: u64,
}

impl Default for KMeansOptions {
    fn default() -> Self {
        Self {
            n_clusters: N_CLUSTERS,
            max_iters: 300,
            tolerance: 1e-4,
            n_runs: 10,
            seed: crate::data::RANDOM_SEED,
        }
    }
}

/// Fitted K-Means model
///
/// Only the centroids are needed to assign new points, so this is what gets
/// persisted. `labels` holds the training-time assignments and is not saved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KMeansModel {
    /// Number of clusters
    pub n_clusters: usize,
    /// Cluster centroids in feature space, one row per cluster
    pub centroids: Array2<f64>,
    /// Within-cluster sum of squares (inertia) on the training set
    pub inertia: f64,
    /// Cluster assignments for training data
    #[serde(skip)]
    pub labels: Array1<usize>,
}

impl KMeansModel {
    /// Assign a feature vector to its nearest centroid
    pub fn predict(&self, features: ArrayView1<f64>) -> crate::Result<usize> {
        if features.len() != self.n_features() {
            anyhow::bail!(
                "Feature vector has {} dimensions, model expects {}",
                features.len(),
                self.n_features()
            );
        }

        let mut min_distance = f64::INFINITY;
        let mut closest_cluster = 0;

        for (cluster_idx, centroid) in self.centroids.outer_iter().enumerate() {
            let distance = squared_distance(&features, &centroid);
            if distance < min_distance {
                min_distance = distance;
                closest_cluster = cluster_idx;
            }
        }

        Ok(closest_cluster)
    }

    /// Assign every row of `features`
    pub fn predict_batch(&self, features: ArrayView2<f64>) -> crate::Result<Array1<usize>> {
        features
            .outer_iter()
            .map(|row| self.predict(row))
            .collect::<crate::Result<Vec<_>>>()
            .map(Array1::from)
    }

    /// Width of the feature vectors this model was trained on
    pub fn n_features(&self) -> usize {
        self.centroids.ncols()
    }

    /// Get cluster sizes
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.n_clusters];
        for &label in self.labels.iter() {
            if label < self.n_clusters {
                sizes[label] += 1;
            }
        }
        sizes
    }

    /// Compute basic silhouette coefficient for a subset of points (for efficiency)
    pub fn compute_silhouette_sample(&self, features: &Array2<f64>, sample_size: usize) -> f64 {
        let n_samples = features.nrows().min(sample_size).min(self.labels.len());
        if n_samples < 2 {
            return 0.0;
        }

        let mut silhouette_sum = 0.0;

        for i in 0..n_samples {
            let point = features.row(i);
            let cluster_label = self.labels[i];

            let mut same_cluster_distances = Vec::new();
            let mut other_cluster_distances: Vec<Vec<f64>> = vec![Vec::new(); self.n_clusters];

            for j in 0..n_samples {
                if i == j {
                    continue;
                }

                let distance = squared_distance(&point, &features.row(j)).sqrt();
                let other_label = self.labels[j];

                if other_label == cluster_label {
                    same_cluster_distances.push(distance);
                } else if other_label < self.n_clusters {
                    other_cluster_distances[other_label].push(distance);
                }
            }

            let a_i = mean(&same_cluster_distances).unwrap_or(0.0);
            let b_i = other_cluster_distances
                .iter()
                .filter_map(|distances| mean(distances))
                .fold(f64::INFINITY, f64::min);

            let silhouette_i = if b_i.is_infinite() || (a_i == 0.0 && b_i == 0.0) {
                0.0
            } else {
                (b_i - a_i) / a_i.max(b_i)
            };

            silhouette_sum += silhouette_i;
        }

        silhouette_sum / n_samples as f64
    }
}

/// Fit K-Means on preprocessed feature vectors
///
/// # Arguments
/// * `features` - Feature matrix, one row per record
/// * `options` - Cluster count, iteration limits and seed
///
/// # Returns
/// * Fitted `KMeansModel` with training assignments and inertia
pub fn fit_kmeans(features: &Array2<f64>, options: &KMeansOptions) -> crate::Result<KMeansModel> {
    if options.n_clusters == 0 {
        anyhow::bail!("Number of clusters must be at least 1");
    }

    if features.nrows() < options.n_clusters {
        anyhow::bail!(
            "Number of data points ({}) must be at least equal to number of clusters ({})",
            features.nrows(),
            options.n_clusters
        );
    }

    debug!(
        n_clusters = options.n_clusters,
        max_iters = options.max_iters,
        tolerance = options.tolerance,
        n_runs = options.n_runs,
        seed = options.seed,
        "fitting k-means"
    );

    let dataset = DatasetBase::from(features.clone());
    let rng = StdRng::seed_from_u64(options.seed);

    let model = KMeans::params_with(options.n_clusters, rng, L2Dist)
        .n_runs(options.n_runs)
        .max_n_iterations(options.max_iters)
        .tolerance(options.tolerance)
        .fit(&dataset)?;

    let labels: Array1<usize> = model.predict(features);
    let centroids = model.centroids().clone();
    let inertia = compute_inertia(features, &labels, &centroids);

    info!(
        n_clusters = options.n_clusters,
        rows = features.nrows(),
        inertia,
        "k-means fitted"
    );

    Ok(KMeansModel {
        n_clusters: options.n_clusters,
        centroids,
        inertia,
        labels,
    })
}

/// Compute within-cluster sum of squares (inertia)
fn compute_inertia(features: &Array2<f64>, labels: &Array1<usize>, centroids: &Array2<f64>) -> f64 {
    labels
        .iter()
        .enumerate()
        .filter(|(_, &cluster)| cluster < centroids.nrows())
        .map(|(i, &cluster)| squared_distance(&features.row(i), &centroids.row(cluster)))
        .sum()
}

fn squared_distance(a: &ArrayView1<f64>, b: &ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}
