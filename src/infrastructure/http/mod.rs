//! HTTP REST API routes

mod combat_routes;
mod log_routes;
mod recap_routes;

use axum::{
    http::StatusCode,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tracing::error;

use crate::application::services::CombatServiceError;
use crate::domain::error::CombatError;
use crate::infrastructure::state::AppState;

/// Create all API routes
pub fn create_routes() -> Router<Arc<AppState>> {
    Router::new()
        // Combat routes
        .route(
            "/api/combats",
            get(combat_routes::list_combats).post(combat_routes::create_combat),
        )
        .route(
            "/api/combats/{id}",
            get(combat_routes::get_combat).delete(combat_routes::delete_combat),
        )
        .route("/api/combats/{id}/entities", post(combat_routes::add_entity))
        .route(
            "/api/combats/{id}/entities/{entity_id}",
            axum::routing::delete(combat_routes::remove_entity),
        )
        .route(
            "/api/combats/{id}/entities/{entity_id}/valid-moves",
            get(combat_routes::valid_moves),
        )
        .route(
            "/api/combats/{id}/commands",
            post(combat_routes::execute_command),
        )
        .route(
            "/api/combats/{id}/current-actor",
            get(combat_routes::current_actor),
        )
        // Log routes
        .route(
            "/api/combats/{id}/log",
            get(log_routes::get_log)
                .post(log_routes::add_log_entry)
                .delete(log_routes::clear_log),
        )
        .route("/api/combats/{id}/log/export", get(log_routes::export_log))
        // Recap routes
        .route(
            "/api/combats/{id}/recap",
            get(recap_routes::get_recap).post(recap_routes::generate_recap),
        )
        .route(
            "/api/combats/{id}/recap/narrative",
            put(recap_routes::update_narrative),
        )
}

/// Map a service error onto an HTTP status
pub(crate) fn service_error(err: CombatServiceError) -> (StatusCode, String) {
    let status = match &err {
        CombatServiceError::CombatNotFound(_) | CombatServiceError::RecapNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        CombatServiceError::Combat(domain) => domain_status(domain),
        CombatServiceError::Repository(e) => {
            error!(error = %e, "Repository failure");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, err.to_string())
}

pub(crate) fn bad_request(err: CombatError) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, err.to_string())
}

fn domain_status(err: &CombatError) -> StatusCode {
    match err {
        CombatError::InvalidMove { .. } | CombatError::Validation(_) => StatusCode::BAD_REQUEST,
        CombatError::UnknownEntity(_) => StatusCode::NOT_FOUND,
        CombatError::EmptyInitiative
        | CombatError::InvalidTransition { .. }
        | CombatError::CombatCompleted
        | CombatError::NoPreviousTurn => StatusCode::CONFLICT,
    }
}
