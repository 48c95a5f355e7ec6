//! HTTP request handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tokio::task::JoinError;
use tracing::error;

use crate::errors::StackError;
use crate::server::state::ServerState;
use crate::utils::{version_info, VersionInfo};

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Health check handler
pub async fn health_handler() -> impl IntoResponse {
    let version = version_info();
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: version.name,
        version: version.version,
    })
}

/// Version handler
pub async fn version_handler() -> Json<VersionInfo> {
    Json(version_info())
}

/// `PUT /stacks/{project}`: activate the descriptor in the body under a project name
pub async fn activate_handler(
    State(state): State<Arc<ServerState>>,
    Path(project): Path<String>,
    body: String,
) -> Response {
    let activator = state.activator.clone();
    // Detached so a dropped connection cannot cancel a submission halfway.
    let task = tokio::spawn(async move { activator.activate(&body, Some(&project)).await });
    into_response(task.await)
}

/// `POST /up`: activate the descriptor in the body without a project name
pub async fn up_handler(State(state): State<Arc<ServerState>>, body: String) -> Response {
    let activator = state.activator.clone();
    let task = tokio::spawn(async move { activator.activate(&body, None).await });
    into_response(task.await)
}

/// `POST /stacks/{project}/down`: tear down the descriptor in the body
pub async fn down_handler(
    State(state): State<Arc<ServerState>>,
    Path(project): Path<String>,
    body: String,
) -> Response {
    let activator = state.activator.clone();
    let task = tokio::spawn(async move { activator.deactivate(&body, Some(&project)).await });
    into_response(task.await)
}

/// 200 with the engine output, 400 for descriptor errors, 500 for everything else
fn into_response(joined: Result<Result<String, StackError>, JoinError>) -> Response {
    match joined {
        Ok(Ok(output)) => (StatusCode::OK, output).into_response(),
        Ok(Err(e)) => {
            let status = if e.is_validation() {
                StatusCode::BAD_REQUEST
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            (status, format!("{}\n", e)).into_response()
        }
        Err(e) => {
            error!("Activation task failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal Server Error\n".to_string(),
            )
                .into_response()
        }
    }
}
