use std::future::ready;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use health::{GtgStatus, HealthReport};
use metrics_exporter_prometheus::PrometheusHandle;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::healthcheck::HealthCheck;
use crate::mapper::VideoMapper;
use crate::message::{
    Message, CONTENT_TYPE_HEADER, JSON_CONTENT_TYPE, MESSAGE_TIMESTAMP_HEADER, REQUEST_ID_HEADER,
};
use crate::metrics::track_metrics;

static X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");
static MESSAGE_TIMESTAMP: HeaderName = HeaderName::from_static("message-timestamp");

#[derive(Clone)]
pub struct AppState {
    pub mapper: VideoMapper,
    pub health: HealthCheck,
}

async fn index() -> &'static str {
    "next-video-mapper"
}

async fn ping() -> &'static str {
    "pong"
}

async fn build_info() -> Json<serde_json::Value> {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "description": env!("CARGO_PKG_DESCRIPTION"),
    }))
}

async fn health(State(state): State<AppState>) -> HealthReport {
    state.health.health().await
}

async fn gtg(State(state): State<AppState>) -> GtgStatus {
    state.health.gtg().await
}

/// Generated when a request comes without a transaction id.
fn new_transaction_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(10)
        .map(|c| char::from(c).to_ascii_lowercase())
        .collect();
    format!("tid_{suffix}")
}

fn header_value<'h>(headers: &'h HeaderMap, name: &HeaderName) -> Option<&'h str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
}

/// Maps the native video in the request body and answers with the
/// publication event, without publishing it.
async fn map(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let transaction_id = header_value(&headers, &X_REQUEST_ID)
        .map(str::to_owned)
        .unwrap_or_else(new_transaction_id);
    info!(
        event = "mapping",
        transaction_id = %transaction_id,
        "received transformation request"
    );

    let mut message = Message::new(Vec::new(), body.to_vec())
        .with_header(REQUEST_ID_HEADER, &transaction_id)
        .with_header(CONTENT_TYPE_HEADER, JSON_CONTENT_TYPE);
    if let Some(timestamp) = header_value(&headers, &MESSAGE_TIMESTAMP) {
        message = message.with_header(MESSAGE_TIMESTAMP_HEADER, timestamp);
    }

    let mut response = match state.mapper.transform(&message) {
        Ok(mapped) => (
            [(header::CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE))],
            mapped.body,
        )
            .into_response(),
        Err(err) => {
            error!(
                event = "mapping",
                transaction_id = %transaction_id,
                "error mapping request: {}", err
            );
            err.into_response()
        }
    };

    if let Ok(value) = HeaderValue::from_str(&transaction_id) {
        response.headers_mut().insert(X_REQUEST_ID.clone(), value);
    }
    response
}

/// Builds the HTTP surface. `/metrics` is mounted only when a Prometheus
/// handle is given.
pub fn router(
    mapper: VideoMapper,
    health_check: HealthCheck,
    prometheus: Option<PrometheusHandle>,
) -> Router {
    let state = AppState {
        mapper,
        health: health_check,
    };

    let router = Router::new()
        .route("/", get(index))
        .route("/map", post(map))
        .route("/__health", get(health))
        .route("/__gtg", get(gtg))
        .route("/__ping", get(ping))
        .route("/__build-info", get(build_info));

    let router = match prometheus {
        Some(handle) => router.route("/metrics", get(move || ready(handle.render()))),
        None => router,
    };

    router
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(track_metrics))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_transaction_ids() {
        let tid = new_transaction_id();
        assert!(tid.starts_with("tid_"));
        assert_eq!(tid.len(), 14);
        assert!(tid[4..]
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
        assert_ne!(tid, new_transaction_id());
    }
}
