//! Combat recap API routes

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::application::dto::UpdateNarrativeRequestDto;
use crate::application::services::CombatService;
use crate::domain::entities::CombatRecap;
use crate::infrastructure::http::combat_routes::parse_combat_id;
use crate::infrastructure::http::service_error;
use crate::infrastructure::state::AppState;

/// Generate a fresh recap and store it, replacing any previous one
pub async fn generate_recap(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<CombatRecap>), (StatusCode, String)> {
    let id = parse_combat_id(&id)?;
    let recap = state
        .combat_service
        .generate_recap(id)
        .await
        .map_err(service_error)?;
    let recap = state
        .combat_service
        .save_recap(recap)
        .await
        .map_err(service_error)?;

    Ok((StatusCode::CREATED, Json(recap)))
}

/// Get the stored recap
pub async fn get_recap(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<CombatRecap>, (StatusCode, String)> {
    let id = parse_combat_id(&id)?;
    let recap = state
        .combat_service
        .get_recap(id)
        .await
        .map_err(service_error)?;

    Ok(Json(recap))
}

/// Replace the narrative of the stored recap
pub async fn update_narrative(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateNarrativeRequestDto>,
) -> Result<Json<CombatRecap>, (StatusCode, String)> {
    let id = parse_combat_id(&id)?;
    let recap = state
        .combat_service
        .update_recap_narrative(id, req.narrative)
        .await
        .map_err(service_error)?;

    Ok(Json(recap))
}
