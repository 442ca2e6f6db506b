//! JSON persistence for the trained preprocessor, partition model and label table

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::labels::LabelTable;
use crate::model::KMeansModel;
use crate::preprocess::Preprocessor;

pub const PREPROCESSOR_FILE: &str = "preprocessor.json";
pub const MODEL_FILE: &str = "model.json";
pub const LABELS_FILE: &str = "labels.json";
pub const MANIFEST_FILE: &str = "manifest.json";

/// Locations of the three artifacts needed to serve predictions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactPaths {
    pub preprocessor: PathBuf,
    pub model: PathBuf,
    pub labels: PathBuf,
}

impl ArtifactPaths {
    /// Standard file names inside `dir`
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            preprocessor: dir.join(PREPROCESSOR_FILE),
            model: dir.join(MODEL_FILE),
            labels: dir.join(LABELS_FILE),
        }
    }
}

/// Provenance of one training run, written next to the artifacts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingManifest {
    pub trained_at: DateTime<Utc>,
    pub seed: u64,
    pub n_samples: usize,
    pub n_features: usize,
    pub n_clusters: usize,
    pub inertia: f64,
}

/// Everything loaded back from disk
#[derive(Debug, Clone)]
pub struct Artifacts {
    pub preprocessor: Preprocessor,
    pub model: KMeansModel,
    pub labels: LabelTable,
}

/// Write the artifacts (and optional manifest) into `dir`, creating it if needed
pub fn save_artifacts(
    dir: impl AsRef<Path>,
    preprocessor: &Preprocessor,
    model: &KMeansModel,
    labels: &LabelTable,
    manifest: Option<&TrainingManifest>,
) -> crate::Result<ArtifactPaths> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create artifact directory '{}'", dir.display()))?;

    let paths = ArtifactPaths::in_dir(dir);
    write_json(&paths.preprocessor, preprocessor)?;
    write_json(&paths.model, model)?;
    write_json(&paths.labels, labels)?;
    if let Some(manifest) = manifest {
        write_json(&dir.join(MANIFEST_FILE), manifest)?;
    }

    info!(dir = %dir.display(), "artifacts saved");
    Ok(paths)
}

/// Read all three artifacts; any missing or malformed file is an error naming its path
pub fn load_artifacts(paths: &ArtifactPaths) -> crate::Result<Artifacts> {
    let preprocessor: Preprocessor = read_json(&paths.preprocessor)?;
    let model: KMeansModel = read_json(&paths.model)?;
    let labels: LabelTable = read_json(&paths.labels)?;

    info!(
        preprocessor = %paths.preprocessor.display(),
        model = %paths.model.display(),
        labels = %paths.labels.display(),
        "artifacts loaded"
    );

    Ok(Artifacts {
        preprocessor,
        model,
        labels,
    })
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> crate::Result<()> {
    let file =
        File::create(path).with_context(|| format!("failed to create '{}'", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)
        .with_context(|| format!("failed to write '{}'", path.display()))?;
    writer
        .flush()
        .with_context(|| format!("failed to write '{}'", path.display()))?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> crate::Result<T> {
    let file = File::open(path).with_context(|| format!("failed to open '{}'", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("failed to parse '{}'", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::CustomerRecord;
    use crate::model::{fit_kmeans, KMeansOptions};
    use tempfile::tempdir;

    fn trained() -> (Preprocessor, KMeansModel, LabelTable) {
        let records = vec![
            CustomerRecord::new("North London", 1000.0, 1.0, "PhD"),
            CustomerRecord::new("North London", 1100.0, 1.5, "PhD"),
            CustomerRecord::new("South London", 50000.0, 10.0, "Masters"),
            CustomerRecord::new("South London", 51000.0, 11.0, "Masters"),
            CustomerRecord::new("East London", 99000.0, 19.0, "Bachelor"),
            CustomerRecord::new("East London", 98000.0, 18.0, "Bachelor"),
        ];
        let preprocessor = Preprocessor::fit(&records).unwrap();
        let features = preprocessor.transform(&records);
        let model = fit_kmeans(&features, &KMeansOptions::default()).unwrap();
        let labels = LabelTable::derive(&records, &model.labels.to_vec(), 3).unwrap();
        (preprocessor, model, labels)
    }

    #[test]
    fn test_save_and_load() {
        let (preprocessor, model, labels) = trained();
        let dir = tempdir().unwrap();
        let out = dir.path().join("nested").join("artifacts");

        let paths = save_artifacts(&out, &preprocessor, &model, &labels, None).unwrap();
        assert!(paths.model.exists());
        assert!(!out.join(MANIFEST_FILE).exists());

        let loaded = load_artifacts(&paths).unwrap();
        assert_eq!(loaded.preprocessor, preprocessor);
        assert_eq!(loaded.model.centroids, model.centroids);
        assert_eq!(loaded.labels, labels);
        // Training assignments are not persisted
        assert!(loaded.model.labels.is_empty());
    }

    #[test]
    fn test_missing_file_names_path() {
        let (preprocessor, model, labels) = trained();
        let dir = tempdir().unwrap();
        let paths = save_artifacts(dir.path(), &preprocessor, &model, &labels, None).unwrap();
        fs::remove_file(&paths.labels).unwrap();

        let err = load_artifacts(&paths).unwrap_err();
        assert!(format!("{:#}", err).contains(LABELS_FILE));
    }

    // A small value stays in the buffer, so the failure only shows on flush
    #[cfg(target_os = "linux")]
    #[test]
    fn test_write_json_reports_flush_failure() {
        let err = write_json(Path::new("/dev/full"), &vec![1.0_f64, 2.0]).unwrap_err();
        assert!(format!("{:#}", err).contains("/dev/full"));
    }
}
