//! Prediction context: the immutable artifact set plus request validation
//!
//! A [`Segmenter`] is built once at startup and shared read-only between
//! request handlers (wrap it in an `Arc`); nothing in it is mutated after
//! construction.

use std::path::Path;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::artifacts::{load_artifacts, ArtifactPaths, Artifacts};
use crate::data::CustomerRecord;
use crate::error::PredictError;
use crate::labels::{IncomeTier, LabelTable};
use crate::model::KMeansModel;
use crate::preprocess::Preprocessor;

/// Attributes every request must supply
pub const REQUIRED_FIELDS: [&str; 4] = ["area", "amount_spent", "tenure", "qualification"];

/// Outcome of one prediction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Prediction {
    pub cluster: usize,
    pub label: IncomeTier,
}

#[derive(Debug, Clone)]
pub struct Segmenter {
    preprocessor: Preprocessor,
    model: KMeansModel,
    labels: LabelTable,
}

impl Segmenter {
    /// Assemble a context, refusing artifact sets that do not fit together
    pub fn from_parts(
        preprocessor: Preprocessor,
        model: KMeansModel,
        labels: LabelTable,
    ) -> crate::Result<Self> {
        if model.centroids.nrows() != model.n_clusters {
            anyhow::bail!(
                "Model declares {} clusters but has {} centroids",
                model.n_clusters,
                model.centroids.nrows()
            );
        }
        if model.n_features() != preprocessor.n_features() {
            anyhow::bail!(
                "Model expects {} features but preprocessor produces {}",
                model.n_features(),
                preprocessor.n_features()
            );
        }
        if !labels.covers(model.n_clusters) {
            anyhow::bail!(
                "Label table does not cover all {} clusters",
                model.n_clusters
            );
        }

        Ok(Self {
            preprocessor,
            model,
            labels,
        })
    }

    /// Load and validate all three artifacts
    pub fn load(paths: &ArtifactPaths) -> crate::Result<Self> {
        let Artifacts {
            preprocessor,
            model,
            labels,
        } = load_artifacts(paths)?;
        Self::from_parts(preprocessor, model, labels)
    }

    /// Load from the standard file names inside `dir`
    pub fn load_dir(dir: impl AsRef<Path>) -> crate::Result<Self> {
        Self::load(&ArtifactPaths::in_dir(dir))
    }

    /// Preprocess one record, assign its partition and look up the tier
    pub fn predict(&self, record: &CustomerRecord) -> Result<Prediction, PredictError> {
        let features = self.preprocessor.transform(std::slice::from_ref(record));
        let cluster = self.model.predict(features.row(0))?;
        let label = self.labels.get(cluster).ok_or_else(|| {
            PredictError::Internal(format!("cluster {} has no label", cluster))
        })?;

        debug!(cluster, %label, "prediction");
        Ok(Prediction { cluster, label })
    }

    /// Validate a JSON request body and predict on it
    pub fn predict_json(&self, body: Option<&Value>) -> Result<Prediction, PredictError> {
        let record = parse_request(body)?;
        self.predict(&record)
    }

    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }

    pub fn n_features(&self) -> usize {
        self.preprocessor.n_features()
    }
}

/// Turn a JSON request body into a record
///
/// A falsy body (`null`, `false`, `0`, `""`, `[]`, `{}`) carries no data.
/// Numeric attributes accept JSON numbers, numeric strings and booleans
/// (`true` is 1). Categorical attributes accept strings; numbers and booleans
/// are taken as their text form and will usually be an unseen category.
pub fn parse_request(body: Option<&Value>) -> Result<CustomerRecord, PredictError> {
    let fields = match body {
        None | Some(Value::Null) | Some(Value::Bool(false)) => return Err(PredictError::NoData),
        Some(Value::Number(number)) if number.as_f64() == Some(0.0) => {
            return Err(PredictError::NoData)
        }
        Some(Value::Object(map)) if map.is_empty() => return Err(PredictError::NoData),
        Some(Value::Array(items)) if items.is_empty() => return Err(PredictError::NoData),
        Some(Value::String(text)) if text.is_empty() => return Err(PredictError::NoData),
        Some(Value::Object(map)) => map,
        Some(_) => return Err(PredictError::MissingFields),
    };

    if !REQUIRED_FIELDS.iter().all(|field| fields.contains_key(*field)) {
        return Err(PredictError::MissingFields);
    }

    Ok(CustomerRecord {
        area: categorical(fields, "area")?,
        amount_spent: numeric(fields, "amount_spent")?,
        tenure: numeric(fields, "tenure")?,
        qualification: categorical(fields, "qualification")?,
    })
}

fn numeric(fields: &Map<String, Value>, name: &str) -> Result<f64, PredictError> {
    let value = match &fields[name] {
        Value::Number(number) => number.as_f64(),
        Value::Bool(flag) => Some(if *flag { 1.0 } else { 0.0 }),
        Value::String(text) => Some(text.trim().parse::<f64>().map_err(|_| {
            PredictError::InvalidData(format!("could not convert string to float: '{}'", text))
        })?),
        Value::Null => {
            return Err(PredictError::InvalidData(format!(
                "'{}' must not be null",
                name
            )))
        }
        other => {
            return Err(PredictError::InvalidData(format!(
                "could not convert {} to float for '{}'",
                json_kind(other),
                name
            )))
        }
    };

    match value {
        Some(v) if v.is_finite() => Ok(v),
        _ => Err(PredictError::InvalidData(format!(
            "'{}' must be a finite number",
            name
        ))),
    }
}

fn categorical(fields: &Map<String, Value>, name: &str) -> Result<String, PredictError> {
    match &fields[name] {
        Value::String(text) => Ok(text.clone()),
        Value::Number(number) => Ok(number.to_string()),
        Value::Bool(flag) => Ok(flag.to_string()),
        other => Err(PredictError::InvalidData(format!(
            "expected a string for '{}', got {}",
            name,
            json_kind(other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
