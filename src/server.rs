//! HTTP API and dashboard.
//!
//! Every route is served with permissive CORS. Request-level failures are
//! reported as `{"error": ...}` with HTTP 200; axum answers a wrong method
//! with 405. Request bodies are decoded as JSON whatever their
//! `Content-Type`.

use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::{Json, State};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::cache::SnapshotCache;
use crate::error::TrackerError;
use crate::protocol::{
    ErrorResponse, InstancesResponse, NameRequest, StartResponse, StopRequest, StopResponse,
};
use crate::vm::Controller;

const DASHBOARD_HTML: &str = include_str!("../assets/dashboard.html");

/// Shared state for request handlers.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<SnapshotCache>,
    pub controller: Arc<Controller>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(dashboard))
        .route("/api/instances", get(list_instances))
        .route("/api/vms", get(vms_config))
        .route("/api/start", post(start_vm))
        .route("/api/stop", post(stop_vm))
        .route("/api/shell", post(shell_info))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve until the listener fails.
pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("QEMU instance tracker listening on http://{}", addr);
    }
    axum::serve(listener, router(state)).await
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

fn reply<T: Serialize>(result: Result<T, TrackerError>) -> Response {
    match result {
        Ok(body) => Json(body).into_response(),
        Err(e) => Json(ErrorResponse::new(e)).into_response(),
    }
}

/// Decode a JSON request body. Anything that is not valid JSON for `T`
/// becomes the `Invalid request` reply.
fn decode<T: DeserializeOwned>(body: &Bytes) -> Result<T, Response> {
    serde_json::from_slice(body).map_err(|e| {
        warn!(error = %e, "rejected request body");
        Json(ErrorResponse::invalid_request()).into_response()
    })
}

async fn dashboard() -> Html<&'static str> {
    Html(DASHBOARD_HTML)
}

async fn list_instances(State(state): State<AppState>) -> Json<InstancesResponse> {
    let snapshot = state.cache.current();
    Json(InstancesResponse::from(snapshot.as_ref()))
}

async fn vms_config(State(state): State<AppState>) -> Response {
    Json(state.controller.vms()).into_response()
}

async fn start_vm(State(state): State<AppState>, body: Bytes) -> Response {
    let req: NameRequest = match decode(&body) {
        Ok(req) => req,
        Err(response) => return response,
    };

    let result = state
        .controller
        .start_instance(&req.name)
        .await
        .map(|_pid| StartResponse {
            status: "started",
            name: req.name.clone(),
        });
    reply(result)
}

async fn stop_vm(State(state): State<AppState>, body: Bytes) -> Response {
    let req: StopRequest = match decode(&body) {
        Ok(req) => req,
        Err(response) => return response,
    };

    let result = state
        .controller
        .stop_instance(&req.pid, req.force)
        .await
        .map(|outcome| StopResponse {
            status: outcome.as_str(),
            pid: req.pid.clone(),
        });
    reply(result)
}

async fn shell_info(State(state): State<AppState>, body: Bytes) -> Response {
    match decode::<NameRequest>(&body) {
        Ok(req) => reply(state.controller.shell_info(&req.name)),
        Err(response) => response,
    }
}
