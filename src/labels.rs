//! Income-tier labels derived from training-time cluster statistics

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::data::CustomerRecord;
use crate::model::N_CLUSTERS;

/// Human-readable tier assigned to a partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum IncomeTier {
    #[serde(rename = "Low Income")]
    Low,
    #[serde(rename = "Middle Income")]
    Middle,
    #[serde(rename = "High Income")]
    High,
}

impl IncomeTier {
    /// Tiers in ascending order of mean spend
    pub const ASCENDING: [IncomeTier; N_CLUSTERS] =
        [IncomeTier::Low, IncomeTier::Middle, IncomeTier::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            IncomeTier::Low => "Low Income",
            IncomeTier::Middle => "Middle Income",
            IncomeTier::High => "High Income",
        }
    }
}

impl fmt::Display for IncomeTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-partition means of the numeric attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterProfile {
    pub cluster: usize,
    pub size: usize,
    pub mean_amount_spent: f64,
    pub mean_tenure: f64,
}

/// Compute size and numeric means for each partition in `0..n_clusters`
///
/// Partitions with no members are reported with size 0 and NaN means.
pub fn cluster_profiles(
    records: &[CustomerRecord],
    assignments: &[usize],
    n_clusters: usize,
) -> crate::Result<Vec<ClusterProfile>> {
    if records.len() != assignments.len() {
        anyhow::bail!(
            "Got {} records but {} cluster assignments",
            records.len(),
            assignments.len()
        );
    }

    let mut sums = vec![(0usize, 0.0f64, 0.0f64); n_clusters];
    for (record, &cluster) in records.iter().zip(assignments) {
        let Some(entry) = sums.get_mut(cluster) else {
            anyhow::bail!("Cluster index {} out of range for {} clusters", cluster, n_clusters);
        };
        entry.0 += 1;
        entry.1 += record.amount_spent;
        entry.2 += record.tenure;
    }

    Ok(sums
        .into_iter()
        .enumerate()
        .map(|(cluster, (size, spent, tenure))| ClusterProfile {
            cluster,
            size,
            mean_amount_spent: spent / size as f64,
            mean_tenure: tenure / size as f64,
        })
        .collect())
}

/// Partition index to income tier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelTable {
    labels: BTreeMap<usize, IncomeTier>,
}

impl LabelTable {
    /// Rank partitions by mean `amount_spent` and name them lowest to highest
    ///
    /// Only defined for exactly three non-empty partitions; anything else is
    /// rejected rather than producing duplicate or missing tiers.
    pub fn derive(
        records: &[CustomerRecord],
        assignments: &[usize],
        n_clusters: usize,
    ) -> crate::Result<Self> {
        let profiles = cluster_profiles(records, assignments, n_clusters)?;
        Self::from_profiles(&profiles)
    }

    pub fn from_profiles(profiles: &[ClusterProfile]) -> crate::Result<Self> {
        if profiles.len() != N_CLUSTERS {
            anyhow::bail!(
                "Income-tier labeling needs exactly {} clusters, got {}",
                N_CLUSTERS,
                profiles.len()
            );
        }
        if let Some(empty) = profiles.iter().find(|p| p.size == 0) {
            anyhow::bail!("Cluster {} has no members and cannot be labeled", empty.cluster);
        }

        let mut ranked: Vec<&ClusterProfile> = profiles.iter().collect();
        ranked.sort_by(|a, b| {
            a.mean_amount_spent
                .total_cmp(&b.mean_amount_spent)
                .then(a.cluster.cmp(&b.cluster))
        });

        let labels = ranked
            .into_iter()
            .zip(IncomeTier::ASCENDING)
            .map(|(profile, tier)| (profile.cluster, tier))
            .collect();

        Ok(Self { labels })
    }

    pub fn get(&self, cluster: usize) -> Option<IncomeTier> {
        self.labels.get(&cluster).copied()
    }

    /// True when every partition in `0..n_clusters` has a label
    pub fn covers(&self, n_clusters: usize) -> bool {
        (0..n_clusters).all(|cluster| self.labels.contains_key(&cluster))
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, IncomeTier)> + '_ {
        self.labels.iter().map(|(&cluster, &tier)| (cluster, tier))
    }
}
