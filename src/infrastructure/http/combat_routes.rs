//! Combat API routes
//!
//! Endpoints for creating combats, managing combatants and applying
//! commands.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::application::dto::{
    CombatEntityResponseDto, CombatResponseDto, CombatSummaryDto, CommandResponseDto,
    CreateCombatRequestDto, CreateEntityRequestDto, ValidMovesResponseDto,
};
use crate::application::services::{CombatService, CreateCombatRequest};
use crate::domain::aggregates::CombatCommand;
use crate::domain::entities::CombatMap;
use crate::domain::value_objects::{CombatEntityId, CombatId};
use crate::infrastructure::http::{bad_request, service_error};
use crate::infrastructure::state::AppState;

pub(crate) fn parse_combat_id(id: &str) -> Result<CombatId, (StatusCode, String)> {
    Uuid::parse_str(id)
        .map(CombatId::from_uuid)
        .map_err(|_| (StatusCode::BAD_REQUEST, "Invalid combat ID".to_string()))
}

fn parse_entity_id(id: &str) -> Result<CombatEntityId, (StatusCode, String)> {
    Uuid::parse_str(id)
        .map(CombatEntityId::from_uuid)
        .map_err(|_| (StatusCode::BAD_REQUEST, "Invalid entity ID".to_string()))
}

/// List all combats
pub async fn list_combats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<CombatSummaryDto>>, (StatusCode, String)> {
    let combats = state
        .combat_service
        .list_combats()
        .await
        .map_err(service_error)?;

    Ok(Json(combats.iter().map(CombatSummaryDto::from).collect()))
}

/// Create a new combat
pub async fn create_combat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateCombatRequestDto>,
) -> Result<(StatusCode, Json<CombatResponseDto>), (StatusCode, String)> {
    let map = match req.map {
        Some(map) => map.into_map().map_err(bad_request)?,
        None => CombatMap::default(),
    };
    let entities = req
        .entities
        .into_iter()
        .map(CreateEntityRequestDto::into_entity)
        .collect::<Result<Vec<_>, _>>()
        .map_err(bad_request)?;

    let combat = state
        .combat_service
        .create_combat(CreateCombatRequest {
            name: req.name,
            map,
            resort_each_round: req.resort_each_round,
            entities,
        })
        .await
        .map_err(service_error)?;

    Ok((StatusCode::CREATED, Json(CombatResponseDto::from(&combat))))
}

/// Get a combat by ID
pub async fn get_combat(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<CombatResponseDto>, (StatusCode, String)> {
    let id = parse_combat_id(&id)?;
    let combat = state
        .combat_service
        .get_combat(id)
        .await
        .map_err(service_error)?;

    Ok(Json(CombatResponseDto::from(&combat)))
}

/// Delete a combat with its log and recap
pub async fn delete_combat(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, (StatusCode, String)> {
    let id = parse_combat_id(&id)?;
    state
        .combat_service
        .delete_combat(id)
        .await
        .map_err(service_error)?;

    Ok(StatusCode::NO_CONTENT)
}

/// Register a combatant
pub async fn add_entity(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<CreateEntityRequestDto>,
) -> Result<(StatusCode, Json<CommandResponseDto>), (StatusCode, String)> {
    let id = parse_combat_id(&id)?;
    let entity = req.into_entity().map_err(bad_request)?;

    let outcome = state
        .combat_service
        .add_entity(id, entity)
        .await
        .map_err(service_error)?;

    Ok((StatusCode::CREATED, Json(CommandResponseDto::from(outcome))))
}

/// Remove a combatant
pub async fn remove_entity(
    State(state): State<Arc<AppState>>,
    Path((id, entity_id)): Path<(String, String)>,
) -> Result<Json<CommandResponseDto>, (StatusCode, String)> {
    let id = parse_combat_id(&id)?;
    let entity_id = parse_entity_id(&entity_id)?;

    let outcome = state
        .combat_service
        .remove_entity(id, entity_id)
        .await
        .map_err(service_error)?;

    Ok(Json(CommandResponseDto::from(outcome)))
}

/// Apply a combat command
pub async fn execute_command(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(command): Json<CombatCommand>,
) -> Result<Json<CommandResponseDto>, (StatusCode, String)> {
    let id = parse_combat_id(&id)?;
    let outcome = state
        .combat_service
        .execute(id, command)
        .await
        .map_err(service_error)?;

    Ok(Json(CommandResponseDto::from(outcome)))
}

/// The combatant whose turn it is, if any
pub async fn current_actor(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Option<CombatEntityResponseDto>>, (StatusCode, String)> {
    let id = parse_combat_id(&id)?;
    let actor = state
        .combat_service
        .current_actor(id)
        .await
        .map_err(service_error)?;

    Ok(Json(actor.as_ref().map(CombatEntityResponseDto::from)))
}

/// Cells a combatant can currently move to
pub async fn valid_moves(
    State(state): State<Arc<AppState>>,
    Path((id, entity_id)): Path<(String, String)>,
) -> Result<Json<ValidMovesResponseDto>, (StatusCode, String)> {
    let id = parse_combat_id(&id)?;
    let entity_id = parse_entity_id(&entity_id)?;

    let moves = state
        .combat_service
        .valid_moves(id, entity_id)
        .await
        .map_err(service_error)?;

    Ok(Json(ValidMovesResponseDto::new(id, entity_id, moves)))
}
