//! Combat log API routes

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::application::dto::{
    AddLogEntryRequestDto, ClearLogResponseDto, LogEntryResponseDto, LogQueryDto,
};
use crate::application::services::CombatService;
use crate::domain::aggregates::render_message;
use crate::infrastructure::http::combat_routes::parse_combat_id;
use crate::infrastructure::http::{bad_request, service_error};
use crate::infrastructure::state::AppState;

/// Read the log, optionally filtered by `type` and `search`
pub async fn get_log(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<LogQueryDto>,
) -> Result<Json<Vec<LogEntryResponseDto>>, (StatusCode, String)> {
    let id = parse_combat_id(&id)?;
    let filter = query.into_filter().map_err(bad_request)?;

    let entries = state
        .combat_service
        .filtered_log(id, filter)
        .await
        .map_err(service_error)?;

    Ok(Json(entries.into_iter().map(LogEntryResponseDto::from).collect()))
}

/// Append a caller-authored entry
pub async fn add_log_entry(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<AddLogEntryRequestDto>,
) -> Result<(StatusCode, Json<LogEntryResponseDto>), (StatusCode, String)> {
    let id = parse_combat_id(&id)?;
    let request = req.into_request().map_err(bad_request)?;

    let entry = state
        .combat_service
        .add_log_entry(id, request)
        .await
        .map_err(service_error)?;
    let combat = state
        .combat_service
        .get_combat(id)
        .await
        .map_err(service_error)?;
    let rendered = render_message(&entry.message, &combat);

    Ok((
        StatusCode::CREATED,
        Json(LogEntryResponseDto::new(&entry, rendered)),
    ))
}

/// Remove every entry from the log
pub async fn clear_log(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ClearLogResponseDto>, (StatusCode, String)> {
    let id = parse_combat_id(&id)?;
    let removed = state
        .combat_service
        .clear_log(id)
        .await
        .map_err(service_error)?;

    Ok(Json(ClearLogResponseDto { removed }))
}

/// Plain-text transcript
pub async fn export_log(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<String, (StatusCode, String)> {
    let id = parse_combat_id(&id)?;
    state
        .combat_service
        .export_log(id)
        .await
        .map_err(service_error)
}
