//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application,
//! including the REST API and OpenAPI documentation.

use crate::{
    handlers,
    models::{
        CommandOut, CommandResultOut, ErrorResponse, HealthOut, ReinterviewOut,
        SendMessagePayload, StudentOut, TurnResponse,
    },
    state::AppState,
};

use axum::{
    Router,
    routing::{get, post},
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::send_message,
        handlers::get_student,
        handlers::trigger_reinterview,
        handlers::health,
    ),
    components(
        schemas(
            SendMessagePayload,
            TurnResponse,
            CommandOut,
            CommandResultOut,
            StudentOut,
            ReinterviewOut,
            HealthOut,
            ErrorResponse
        )
    ),
    tags(
        (name = "Mentor API", description = "Expert-routed tutoring conversations")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: AppState) -> Router {
    let api_router = Router::new()
        .route(
            "/students/{id}/experts/{expert}/messages",
            post(handlers::send_message),
        )
        .route("/students/{id}", get(handlers::get_student))
        .route(
            "/students/{id}/reinterview",
            post(handlers::trigger_reinterview),
        )
        .route("/health", get(handlers::health))
        .with_state(app_state);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
}
