use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Json, State},
    http::Method,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use serde_json::Value;
use tower_http::cors::{Any, CorsLayer};

use crate::error::PredictError;
use crate::model::{Prediction, Predictor};

/// Body of every `/predict` response. Failures are reported in-band so a
/// browser client can show the message.
#[derive(Debug, Serialize, PartialEq)]
#[serde(untagged)]
pub enum PredictResponse {
    Success(Prediction),
    Failure { error: String, reason: &'static str },
}

impl From<Result<Prediction, PredictError>> for PredictResponse {
    fn from(result: Result<Prediction, PredictError>) -> Self {
        match result {
            Ok(prediction) => PredictResponse::Success(prediction),
            Err(e) => PredictResponse::Failure {
                error: e.to_string(),
                reason: e.reason(),
            },
        }
    }
}

pub fn router(predictor: Arc<Predictor>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/predict", post(predict))
        .layer(cors)
        .with_state(predictor)
}

async fn health() -> &'static str {
    "ok"
}

async fn predict(
    State(predictor): State<Arc<Predictor>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Json<PredictResponse> {
    let result = match payload {
        Ok(Json(body)) => predictor.predict_json(&body),
        Err(rejection) => Err(PredictError::InvalidPayload(rejection.body_text())),
    };
    match &result {
        Ok(prediction) => log::debug!("predicted {}", prediction.prediction),
        Err(e) => log::warn!("prediction request failed: {e}"),
    }
    Json(result.into())
}

pub async fn serve(addr: SocketAddr, predictor: Arc<Predictor>) -> std::io::Result<()> {
    let app = router(predictor);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    log::info!("shutting down");
}
