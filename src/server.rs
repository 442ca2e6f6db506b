//! HTTP shell around the [`Segmenter`]
//!
//! Routes:
//! - `GET /` - static form page
//! - `POST /predict` - `{"cluster_label": ...}` on success, `{"error": ...}` otherwise

use std::any::Any;
use std::sync::Arc;

use anyhow::Context;
use axum::body::Bytes;
use axum::extract::State;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tracing::{debug, error, info, warn};

use crate::config::ServiceConfig;
use crate::error::PredictError;
use crate::labels::IncomeTier;
use crate::service::Segmenter;

const INDEX_TEMPLATE: &str = include_str!("../templates/index.html");
const PREDICT_PATH: &str = "/predict";

/// Success body of `POST /predict`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictResponse {
    pub cluster_label: IncomeTier,
}

/// Failure body of every route
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Clone)]
struct AppState {
    segmenter: Arc<Segmenter>,
}

impl IntoResponse for PredictError {
    fn into_response(self) -> Response {
        match &self {
            PredictError::Internal(detail) => error!(%detail, "prediction failed"),
            other => warn!(error = %other, "rejected prediction request"),
        }
        let body = ErrorResponse {
            error: self.public_message(),
        };
        (self.status(), Json(body)).into_response()
    }
}

/// Build the application router around a loaded context
pub fn router(segmenter: Arc<Segmenter>) -> Router {
    Router::new()
        .route("/", get(index))
        .route(PREDICT_PATH, post(predict))
        .with_state(AppState { segmenter })
        .layer(CorsLayer::permissive())
        .layer(CatchPanicLayer::custom(handle_panic))
}

/// Load artifacts, bind and serve until Ctrl-C
///
/// Artifact loading happens before the socket is bound; a missing or
/// inconsistent artifact aborts startup.
pub async fn serve(config: &ServiceConfig) -> crate::Result<()> {
    let paths = config.artifacts.paths();
    let segmenter = Segmenter::load(&paths).context("failed to load model artifacts")?;
    info!(
        n_features = segmenter.n_features(),
        n_labels = segmenter.labels().len(),
        "segmenter ready"
    );

    let address = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(config.server.socket_address())
        .await
        .with_context(|| format!("failed to bind {}", address))?;
    info!(%address, debug = config.server.debug, "listening");

    axum::serve(listener, router(Arc::new(segmenter)))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("server stopped");
    Ok(())
}

/// Form page; the script posts to the relative predict path
async fn index() -> Html<String> {
    Html(INDEX_TEMPLATE.replace("{{ api_url }}", PREDICT_PATH))
}

async fn predict(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<PredictResponse>, PredictError> {
    let value = parse_body(&body)?;
    let prediction = state.segmenter.predict_json(value.as_ref())?;
    debug!(cluster = prediction.cluster, label = %prediction.label, "predicted");
    Ok(Json(PredictResponse {
        cluster_label: prediction.label,
    }))
}

/// Empty (or whitespace-only) body means no data; anything else must be JSON
fn parse_body(body: &[u8]) -> Result<Option<Value>, PredictError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(body)
        .map(Some)
        .map_err(|err| PredictError::InvalidData(err.to_string()))
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .cloned()
        .or_else(|| err.downcast_ref::<&str>().map(|s| s.to_string()))
        .unwrap_or_else(|| "unknown panic".to_string());
    PredictError::Internal(detail).into_response()
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::CustomerRecord;
    use crate::labels::LabelTable;
    use crate::model::{fit_kmeans, KMeansOptions};
    use crate::preprocess::Preprocessor;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn app() -> Router {
        let records = vec![
            CustomerRecord::new("North London", 1000.0, 1.0, "PhD"),
            CustomerRecord::new("North London", 1500.0, 2.0, "PhD"),
            CustomerRecord::new("South London", 50000.0, 10.0, "Masters"),
            CustomerRecord::new("South London", 52000.0, 9.0, "Masters"),
            CustomerRecord::new("East London", 99000.0, 19.0, "Bachelor"),
            CustomerRecord::new("East London", 97000.0, 18.0, "Bachelor"),
        ];
        let preprocessor = Preprocessor::fit(&records).unwrap();
        let features = preprocessor.transform(&records);
        let model = fit_kmeans(&features, &KMeansOptions::default()).unwrap();
        let labels = LabelTable::derive(&records, &model.labels.to_vec(), 3).unwrap();
        let segmenter = Segmenter::from_parts(preprocessor, model, labels).unwrap();
        router(Arc::new(segmenter))
    }

    async fn post_predict(body: &str) -> (StatusCode, Value) {
        let request = Request::post("/predict")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_predict_ok() {
        let (status, body) = post_predict(
            r#"{"area": "South London", "amount_spent": 51000, "tenure": 9.5, "qualification": "Masters"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["cluster_label"], "Middle Income");
    }

    #[tokio::test]
    async fn test_predict_empty_body() {
        let (status, body) = post_predict("").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "No data provided");
    }

    #[tokio::test]
    async fn test_predict_falsy_json_body() {
        for falsy in ["false", "0", "[]", "{}", "\"\"", "null"] {
            let (status, body) = post_predict(falsy).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{}", falsy);
            assert_eq!(body["error"], "No data provided", "{}", falsy);
        }
    }

    #[tokio::test]
    async fn test_predict_missing_fields() {
        let (status, body) =
            post_predict(r#"{"area": "North London", "amount_spent": 100, "qualification": "PhD"}"#)
                .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing fields");
    }

    #[tokio::test]
    async fn test_predict_invalid_spend() {
        let (status, body) = post_predict(
            r#"{"area": "North London", "amount_spent": "abc", "tenure": 3, "qualification": "PhD"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let message = body["error"].as_str().unwrap();
        assert!(message.starts_with("Invalid data:"), "{}", message);
        assert!(message.contains("abc"));
    }

    #[tokio::test]
    async fn test_predict_malformed_json() {
        let (status, body) = post_predict("{not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("Invalid data:"));
    }

    async fn get_index(host: &str) -> String {
        let request = Request::get("/")
            .header(header::HOST, host)
            .body(Body::empty())
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_index_renders_api_url() {
        let page = get_index("example.test:5000").await;
        assert!(page.contains(r#"const apiUrl = "/predict""#));
        assert!(!page.contains("example.test"));
        assert!(!page.contains("{{ api_url }}"));
    }

    #[tokio::test]
    async fn test_index_ignores_host_header() {
        let page = get_index(r#"evil.test";alert(1);//"#).await;
        assert!(page.contains(r#"const apiUrl = "/predict""#));
        assert!(!page.contains("evil.test"));
        assert!(!page.contains("alert(1)"));
    }

    #[test]
    fn test_panic_maps_to_internal_error() {
        let response = handle_panic(Box::new("boom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
