//! Feature preprocessing: standardization of numeric columns and one-hot
//! expansion of categorical columns
//!
//! Fitted state is only written by `fit`; every `transform` borrows `&self`,
//! so applying the transform to live input cannot shift its statistics.

use std::collections::BTreeSet;

use ndarray::{s, Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::data::CustomerRecord;

/// Number of numeric columns (amount_spent, tenure)
pub const NUMERIC_FEATURES: usize = 2;

/// Column-wise standardization to zero mean and unit variance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    /// Per-column mean captured at fit time
    pub mean: Array1<f64>,
    /// Per-column population standard deviation (1.0 for constant columns)
    pub scale: Array1<f64>,
}

impl StandardScaler {
    /// Capture mean and standard deviation of each column
    pub fn fit(data: &Array2<f64>) -> Self {
        let n_columns = data.ncols();
        let mean = data
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(n_columns));
        let scale = data
            .std_axis(Axis(0), 0.0)
            .mapv(|std| if std > f64::EPSILON { std } else { 1.0 });
        Self { mean, scale }
    }

    /// Standardize rows using the captured statistics
    pub fn transform(&self, data: &Array2<f64>) -> Array2<f64> {
        (data - &self.mean) / &self.scale
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }
}

/// One-hot indicator encoding over the categories observed at fit time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneHotEncoder {
    /// Sorted, de-duplicated categories; indicator column `i` is `categories[i]`
    pub categories: Vec<String>,
}

impl OneHotEncoder {
    pub fn fit<'a>(values: impl IntoIterator<Item = &'a str>) -> Self {
        let categories: BTreeSet<&str> = values.into_iter().collect();
        Self {
            categories: categories.into_iter().map(str::to_string).collect(),
        }
    }

    /// Indicator column for `value`, or `None` for a category never seen at fit
    pub fn index_of(&self, value: &str) -> Option<usize> {
        self.categories
            .binary_search_by(|category| category.as_str().cmp(value))
            .ok()
    }

    /// Encode values into an (n, n_categories) indicator matrix.
    /// Unseen categories produce an all-zero row.
    pub fn transform<'a>(&self, values: impl ExactSizeIterator<Item = &'a str>) -> Array2<f64> {
        let mut encoded = Array2::zeros((values.len(), self.categories.len()));
        for (row, value) in values.enumerate() {
            if let Some(column) = self.index_of(value) {
                encoded[[row, column]] = 1.0;
            }
        }
        encoded
    }

    pub fn n_features(&self) -> usize {
        self.categories.len()
    }
}

/// The fitted preprocessing transform applied before clustering
///
/// Output columns, in order: standardized `amount_spent`, standardized `tenure`,
/// one-hot `area`, one-hot `qualification`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preprocessor {
    pub scaler: StandardScaler,
    pub area: OneHotEncoder,
    pub qualification: OneHotEncoder,
}

impl Preprocessor {
    /// Fit scaler statistics and category vocabularies on a batch of records
    pub fn fit(records: &[CustomerRecord]) -> crate::Result<Self> {
        if records.is_empty() {
            anyhow::bail!("Cannot fit preprocessor on an empty dataset");
        }

        let scaler = StandardScaler::fit(&numeric_matrix(records));
        let area = OneHotEncoder::fit(records.iter().map(|r| r.area.as_str()));
        let qualification = OneHotEncoder::fit(records.iter().map(|r| r.qualification.as_str()));

        Ok(Self {
            scaler,
            area,
            qualification,
        })
    }

    /// Map records to feature vectors, one row per record
    pub fn transform(&self, records: &[CustomerRecord]) -> Array2<f64> {
        let mut features = Array2::zeros((records.len(), self.n_features()));

        let numeric = self.scaler.transform(&numeric_matrix(records));
        features
            .slice_mut(s![.., ..NUMERIC_FEATURES])
            .assign(&numeric);

        let area_end = NUMERIC_FEATURES + self.area.n_features();
        features
            .slice_mut(s![.., NUMERIC_FEATURES..area_end])
            .assign(&self.area.transform(records.iter().map(|r| r.area.as_str())));
        features
            .slice_mut(s![.., area_end..])
            .assign(
                &self
                    .qualification
                    .transform(records.iter().map(|r| r.qualification.as_str())),
            );

        features
    }

    /// Width of every feature vector produced by `transform`
    pub fn n_features(&self) -> usize {
        self.scaler.n_features() + self.area.n_features() + self.qualification.n_features()
    }
}

fn numeric_matrix(records: &[CustomerRecord]) -> Array2<f64> {
    let mut matrix = Array2::zeros((records.len(), NUMERIC_FEATURES));
    for (mut row, record) in matrix.outer_iter_mut().zip(records) {
        row[0] = record.amount_spent;
        row[1] = record.tenure;
    }
    matrix
}
