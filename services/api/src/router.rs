//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application,
//! including the skill webhook and the OpenAPI documentation.

use crate::{
    handlers,
    models::{
        ApplicationContext, DeviceContext, DuerRequest, DuerResponse, ErrorResponse,
        HealthResponse, IntentBody, PlainText, QueryBody, RequestBody, RequestContext,
        ResponseBody, ResponseContext, ResponseSession, SystemContext, UserContext,
    },
    state::AppState,
};

use axum::{
    Router,
    routing::get,
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::post_query,
        handlers::health,
    ),
    components(
        schemas(
            DuerRequest, RequestContext, SystemContext, UserContext, ApplicationContext,
            DeviceContext, RequestBody, QueryBody, IntentBody,
            DuerResponse, ResponseContext, ResponseSession, ResponseBody, PlainText,
            ErrorResponse, HealthResponse
        )
    ),
    tags(
        (name = "Skill Bridge API", description = "DuerOS webhook bridging to the conversational agent")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let api_router = Router::new()
        .route("/", get(handlers::index).post(handlers::post_query))
        .route("/health", get(handlers::health))
        .with_state(app_state);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
}
