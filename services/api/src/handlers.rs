//! Axum Handlers for the Skill Webhook
//!
//! This module contains the logic for handling DuerOS webhook calls.
//! It uses `utoipa` doc comments to generate OpenAPI documentation.

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
};
use skillbridge_core::error::PipelineError;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::{
    models::{DuerRequest, DuerResponse, ErrorResponse, HealthResponse},
    state::AppState,
};

const INDEX_HTML: &str = r#"<!doctype html>
<html lang="zh-CN">
<head><meta charset="utf-8"><title>哒尔文</title></head>
<body><h1>哒尔文</h1><p>DuerOS skill endpoint is running.</p></body>
</html>
"#;

pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    InternalServerError(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(ErrorResponse { message })).into_response()
            }
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(ErrorResponse { message })).into_response()
            }
            ApiError::InternalServerError(err) => {
                error!("Internal Server Error: {:?}", err);
                let message = "An internal server error occurred.".to_string();
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse { message }),
                )
                    .into_response()
            }
        }
    }
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::InternalServerError(err.into())
    }
}

/// Static landing page.
pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse)
    )
)]
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        response_mode: state.pipeline.mode().to_string(),
    })
}

/// Handle one DuerOS skill request.
///
/// Backend or QR service failures still answer 200 with a generic apology so
/// the device has something to say.
#[utoipa::path(
    post,
    path = "/",
    request_body = DuerRequest,
    responses(
        (status = 200, description = "Skill response", body = DuerResponse),
        (status = 400, description = "Malformed skill request", body = ErrorResponse),
        (status = 404, description = "Bot is not registered", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn post_query(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<serde_json::Value>,
) -> Result<Json<DuerResponse>, ApiError> {
    debug!("receive : {}", payload);

    let request: DuerRequest = serde_json::from_value(payload)
        .map_err(|e| ApiError::BadRequest(format!("Invalid skill request: {}", e)))?;

    let response = match state.pipeline.handle(request.into_inbound()).await {
        Ok(out) => DuerResponse::from(&out),
        Err(PipelineError::Transport(e)) => {
            error!(error = %e, "Collaborator call failed, answering with apology");
            DuerResponse::failure()
        }
        Err(PipelineError::Identity(e)) => return Err(ApiError::BadRequest(e.to_string())),
        Err(PipelineError::Configuration(e)) => {
            warn!(bot_id = %e.bot_id, "Rejecting request from unregistered bot");
            return Err(ApiError::NotFound(e.to_string()));
        }
    };

    debug!(reply = ?response, "Answering skill request");
    Ok(Json(response))
}
