//! Error taxonomy for the prediction path
//!
//! Training and startup use `anyhow` (see [`crate::Result`]); request handling
//! needs a closed set of kinds so each can be mapped to an HTTP status.

use axum::http::StatusCode;
use thiserror::Error;

/// Why a single prediction request failed
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PredictError {
    /// Request body absent, null or an empty object
    #[error("No data provided")]
    NoData,

    /// One or more of the four required attributes is absent
    #[error("Missing fields")]
    MissingFields,

    /// Attribute present but not coercible to what the transform expects
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Anything the caller cannot fix; the detail stays in the logs
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PredictError {
    pub fn status(&self) -> StatusCode {
        match self {
            PredictError::NoData | PredictError::MissingFields | PredictError::InvalidData(_) => {
                StatusCode::BAD_REQUEST
            }
            PredictError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to return to a client
    pub fn public_message(&self) -> String {
        match self {
            PredictError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<anyhow::Error> for PredictError {
    fn from(err: anyhow::Error) -> Self {
        PredictError::Internal(format!("{:#}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(PredictError::NoData.status(), StatusCode::BAD_REQUEST);
        assert_eq!(PredictError::MissingFields.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            PredictError::InvalidData("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            PredictError::Internal("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_detail_is_hidden() {
        let err = PredictError::Internal("centroid width mismatch".into());
        assert_eq!(err.public_message(), "Internal server error");
        assert_eq!(
            PredictError::InvalidData("could not convert string to float: 'abc'".into())
                .public_message(),
            "Invalid data: could not convert string to float: 'abc'"
        );
    }
}
