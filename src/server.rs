//! # HTTP Server
//!
//! HTTP server for metrics, health checks, Kubernetes probes and the
//! Reschedule command.
//!
//! Provides endpoints:
//! - `/metrics` - Prometheus metrics in text format
//! - `/healthz` - Liveness probe (always returns 200)
//! - `/readyz` - Readiness probe (returns 200 when controller is ready)
//! - `POST /apis/command.karmada.io/v1alpha1/reschedules` - Create-style
//!   Reschedule command; the command is executed and echoed back, never stored
//!
//! Failed commands answer with a Kubernetes `Status` body.

use crate::controller::reschedule::{RescheduleError, RescheduleHandler};
use crate::crd::Reschedule;
use crate::observability::metrics::REGISTRY;
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{Status, StatusCause, StatusDetails};
use kube::core::Resource;
use prometheus::{Encoder, TextEncoder};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Path of the Reschedule collection
pub const RESCHEDULES_PATH: &str = "/apis/command.karmada.io/v1alpha1/reschedules";

/// Shared state of the HTTP handlers
#[derive(Clone)]
pub struct AppState {
    reschedule: Arc<RescheduleHandler>,
    is_ready: Arc<AtomicBool>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("is_ready", &self.is_ready.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl AppState {
    pub fn new(reschedule: Arc<RescheduleHandler>) -> Self {
        Self {
            reschedule,
            is_ready: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn set_ready(&self, ready: bool) {
        self.is_ready.store(ready, Ordering::Relaxed);
    }

    pub fn is_ready(&self) -> bool {
        self.is_ready.load(Ordering::Relaxed)
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz_handler))
        .route("/readyz", get(readyz_handler))
        .route(RESCHEDULES_PATH, post(create_reschedule_handler))
        .with_state(state)
}

/// Serve until `token` is cancelled
pub async fn start_server(
    port: u16,
    state: AppState,
    token: CancellationToken,
) -> Result<(), anyhow::Error> {
    let addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&addr).await?;

    info!("HTTP server listening on {}", addr);

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async move { token.cancelled().await })
        .await?;

    info!("HTTP server stopped");
    Ok(())
}

async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!("Failed to encode metrics: {}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain")],
            format!("Failed to encode metrics: {e}").into_bytes(),
        );
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        buffer,
    )
}

async fn healthz_handler() -> impl IntoResponse {
    StatusCode::OK
}

async fn readyz_handler(State(state): State<AppState>) -> impl IntoResponse {
    if state.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn create_reschedule_handler(State(state): State<AppState>, body: Bytes) -> Response {
    let command: Reschedule = match serde_json::from_slice(&body) {
        Ok(command) => command,
        Err(e) => {
            return failure(
                StatusCode::BAD_REQUEST,
                "BadRequest",
                format!("failed to decode Reschedule: {e}"),
                None,
            )
        }
    };

    match state.reschedule.create(command).await {
        Ok(accepted) => (StatusCode::CREATED, Json(accepted)).into_response(),
        Err(e) => error_response(&e),
    }
}

fn error_response(error: &RescheduleError) -> Response {
    match error {
        RescheduleError::Invalid { name, errors } => {
            let details = StatusDetails {
                group: Some(Reschedule::group(&()).into_owned()),
                kind: Some(Reschedule::kind(&()).into_owned()),
                name: Some(name.clone()),
                causes: Some(
                    errors
                        .iter()
                        .map(|message| StatusCause {
                            message: Some(message.clone()),
                            reason: Some("FieldValueInvalid".to_string()),
                            ..StatusCause::default()
                        })
                        .collect(),
                ),
                ..StatusDetails::default()
            };
            failure(
                StatusCode::UNPROCESSABLE_ENTITY,
                "Invalid",
                error.to_string(),
                Some(details),
            )
        }
        e if e.is_not_found() => failure(StatusCode::NOT_FOUND, "NotFound", e.to_string(), None),
        e => failure(
            StatusCode::INTERNAL_SERVER_ERROR,
            "InternalError",
            e.to_string(),
            None,
        ),
    }
}

fn failure(
    code: StatusCode,
    reason: &str,
    message: String,
    details: Option<StatusDetails>,
) -> Response {
    let status = Status {
        code: Some(i32::from(code.as_u16())),
        details,
        message: Some(message),
        reason: Some(reason.to_string()),
        status: Some("Failure".to_string()),
        ..Status::default()
    };
    (code, Json(status)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryStore, StoreError};
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn router(ready: bool) -> Router {
        let state = AppState::new(Arc::new(RescheduleHandler::new(Arc::new(
            InMemoryStore::new(),
        ))));
        state.set_ready(ready);
        build_router(state)
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_probes() {
        let response = router(false)
            .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = router(false)
            .oneshot(Request::get("/readyz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let response = router(true)
            .oneshot(Request::get("/readyz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_undecodable_body_is_bad_request() {
        let response = router(true)
            .oneshot(
                Request::post(RESCHEDULES_PATH)
                    .body(Body::from("not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let status = body_json(response).await;
        assert_eq!(status["kind"], json!("Status"));
        assert_eq!(status["reason"], json!("BadRequest"));
    }

    #[tokio::test]
    async fn test_accepted_command_is_echoed() {
        let body = json!({
            "apiVersion": "command.karmada.io/v1alpha1",
            "kind": "Reschedule",
            "metadata": {"name": "rebalance"},
            "spec": {}
        });
        let response = router(true)
            .oneshot(
                Request::post(RESCHEDULES_PATH)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let accepted = body_json(response).await;
        assert_eq!(accepted["metadata"]["name"], json!("rebalance"));
    }

    #[tokio::test]
    async fn test_invalid_command_is_unprocessable() {
        let body = json!({
            "apiVersion": "command.karmada.io/v1alpha1",
            "kind": "Reschedule",
            "metadata": {"name": "Rebalance"},
            "spec": {}
        });
        let response = router(true)
            .oneshot(
                Request::post(RESCHEDULES_PATH)
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let status = body_json(response).await;
        assert_eq!(status["reason"], json!("Invalid"));
        assert_eq!(status["details"]["kind"], json!("Reschedule"));
    }

    #[test]
    fn test_error_status_mapping() {
        let invalid = RescheduleError::Invalid {
            name: "Bad".into(),
            errors: vec!["metadata.name: Invalid value".into()],
        };
        assert_eq!(
            error_response(&invalid).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );

        let missing = RescheduleError::GetBinding {
            selector: "apps/v1 Deployment default/nginx".into(),
            binding: "default/nginx-deployment".into(),
            source: StoreError::NotFound {
                kind: "ResourceBinding".into(),
                key: "default/nginx-deployment".into(),
            },
        };
        assert_eq!(error_response(&missing).status(), StatusCode::NOT_FOUND);

        let unavailable = RescheduleError::UpdateBinding {
            binding: "default/nginx-deployment".into(),
            source: StoreError::Unavailable("etcd leader changed".into()),
        };
        assert_eq!(
            error_response(&unavailable).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
