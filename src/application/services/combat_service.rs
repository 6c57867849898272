//! Combat Service - Application service for running encounters
//!
//! Owns the live state of every loaded combat. Commands against one combat
//! are serialized through a per-combat mutex, so log entries always follow
//! the order of the commands that produced them. Each command runs against a
//! copy of the aggregate; the copy and its log entries are persisted before
//! they replace the live state.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, info, instrument, warn};

use crate::application::ports::outbound::CombatRepositoryPort;
use crate::domain::aggregates::{
    render_message, Combat, CombatCommand, CombatLog, CombatStatus, LogFilter,
};
use crate::domain::entities::{
    entity_token, CombatEntity, CombatLogEntry, CombatMap, CombatRecap, LogEntryType,
    NewLogEntry,
};
use crate::domain::error::CombatError;
use crate::domain::events::CombatEvent;
use crate::domain::services::{MovementRules, RecapGenerator, WeightedScore};
use crate::domain::value_objects::{CombatEntityId, CombatId, CombatSettings, GridPosition};

/// Errors surfaced by the combat service
#[derive(Debug, thiserror::Error)]
pub enum CombatServiceError {
    #[error(transparent)]
    Combat(#[from] CombatError),

    #[error("Combat not found: {0}")]
    CombatNotFound(CombatId),

    #[error("No recap stored for combat {0}")]
    RecapNotFound(CombatId),

    #[error("Repository error: {0:#}")]
    Repository(#[from] anyhow::Error),
}

pub type ServiceResult<T> = Result<T, CombatServiceError>;

/// Request to create a new combat
#[derive(Debug, Clone)]
pub struct CreateCombatRequest {
    pub name: String,
    pub map: CombatMap,
    /// Overrides the configured default when set
    pub resort_each_round: Option<bool>,
    pub entities: Vec<CombatEntity>,
}

/// Request to add a free-form entry to the log
#[derive(Debug, Clone)]
pub struct AddLogEntryRequest {
    pub entry_type: LogEntryType,
    pub message: String,
    pub source_id: Option<CombatEntityId>,
    pub target_id: Option<CombatEntityId>,
    pub amount: Option<u32>,
}

/// Result of a successfully applied command
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    pub combat: Combat,
    pub events: Vec<CombatEvent>,
    pub log_entries: Vec<CombatLogEntry>,
}

/// A log entry with its entity tokens resolved to current names
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedLogEntry {
    #[serde(flatten)]
    pub entry: CombatLogEntry,
    pub rendered: String,
}

/// Combat service trait defining the application use cases
#[async_trait]
pub trait CombatService: Send + Sync {
    /// Create a combat, registering any initial combatants
    async fn create_combat(&self, request: CreateCombatRequest) -> ServiceResult<Combat>;

    async fn get_combat(&self, id: CombatId) -> ServiceResult<Combat>;

    async fn list_combats(&self) -> ServiceResult<Vec<Combat>>;

    /// Delete a combat with its log and recap
    async fn delete_combat(&self, id: CombatId) -> ServiceResult<()>;

    async fn add_entity(&self, id: CombatId, entity: CombatEntity)
        -> ServiceResult<CommandOutcome>;

    async fn remove_entity(
        &self,
        id: CombatId,
        entity_id: CombatEntityId,
    ) -> ServiceResult<CommandOutcome>;

    /// Apply any combat command
    async fn execute(&self, id: CombatId, command: CombatCommand)
        -> ServiceResult<CommandOutcome>;

    async fn current_actor(&self, id: CombatId) -> ServiceResult<Option<CombatEntity>>;

    async fn valid_moves(
        &self,
        id: CombatId,
        entity_id: CombatEntityId,
    ) -> ServiceResult<Vec<GridPosition>>;

    /// Append a caller-authored entry, stamped with the current round
    async fn add_log_entry(
        &self,
        id: CombatId,
        request: AddLogEntryRequest,
    ) -> ServiceResult<CombatLogEntry>;

    async fn filtered_log(
        &self,
        id: CombatId,
        filter: LogFilter,
    ) -> ServiceResult<Vec<RenderedLogEntry>>;

    /// Plain-text transcript of the log
    async fn export_log(&self, id: CombatId) -> ServiceResult<String>;

    /// Remove every log entry, returning how many were removed
    async fn clear_log(&self, id: CombatId) -> ServiceResult<usize>;

    /// Compute a fresh recap without storing it
    async fn generate_recap(&self, id: CombatId) -> ServiceResult<CombatRecap>;

    async fn save_recap(&self, recap: CombatRecap) -> ServiceResult<CombatRecap>;

    async fn get_recap(&self, id: CombatId) -> ServiceResult<CombatRecap>;

    /// Replace the stored narrative without recomputing anything else
    async fn update_recap_narrative(
        &self,
        id: CombatId,
        narrative: String,
    ) -> ServiceResult<CombatRecap>;
}

/// Live state of one loaded combat
struct CombatSession {
    combat: Combat,
    log: CombatLog,
    /// Dropped from the session map (deleted or evicted); waiters must reload
    retired: bool,
}

type SharedSession = Arc<Mutex<CombatSession>>;

/// Default implementation of CombatService
pub struct CombatServiceImpl {
    repository: Arc<dyn CombatRepositoryPort>,
    settings: CombatSettings,
    rules: MovementRules,
    recaps: RecapGenerator<WeightedScore>,
    sessions: RwLock<HashMap<CombatId, SharedSession>>,
}

impl CombatServiceImpl {
    pub fn new(repository: Arc<dyn CombatRepositoryPort>, settings: CombatSettings) -> Self {
        Self {
            repository,
            rules: MovementRules::from(&settings),
            recaps: RecapGenerator::new(WeightedScore::from(&settings)),
            settings,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn settings(&self) -> &CombatSettings {
        &self.settings
    }

    /// Load a combat into memory on first use
    async fn session(&self, id: CombatId) -> ServiceResult<SharedSession> {
        if let Some(session) = self.sessions.read().await.get(&id) {
            return Ok(Arc::clone(session));
        }

        let combat = self
            .repository
            .get(id)
            .await?
            .ok_or(CombatServiceError::CombatNotFound(id))?;
        let entries = self.repository.get_log(id).await?;
        debug!(combat_id = %id, entries = entries.len(), "Loaded combat into memory");

        let mut sessions = self.sessions.write().await;
        let session = sessions.entry(id).or_insert_with(|| {
            Arc::new(Mutex::new(CombatSession {
                combat,
                log: CombatLog::from_entries(id, entries),
                retired: false,
            }))
        });
        Ok(Arc::clone(session))
    }

    /// Lock the live session, reloading it when it was retired while we waited
    async fn lock_session(&self, id: CombatId) -> ServiceResult<OwnedMutexGuard<CombatSession>> {
        loop {
            let session = self.session(id).await?;
            let guard = session.lock_owned().await;
            if !guard.retired {
                return Ok(guard);
            }
            debug!(combat_id = %id, "Session retired while waiting; reloading");
        }
    }

    /// Run a mutation against a copy of the combat and commit it once stored
    async fn apply<F>(&self, id: CombatId, mutate: F) -> ServiceResult<CommandOutcome>
    where
        F: FnOnce(&mut Combat) -> Result<Vec<CombatEvent>, CombatError> + Send,
    {
        let mut session = self.lock_session(id).await?;

        let mut combat = session.combat.clone();
        let events = mutate(&mut combat)?;
        let staged = session.log.stage(log_entries_for(&combat, &events));

        self.repository.save_with_log(&combat, &staged).await?;

        if combat.awaiting_completion() {
            warn!(combat_id = %id, "No living combatants remain; combat awaits completion");
        }

        session.combat = combat.clone();
        session.log.extend(staged.clone());

        Ok(CommandOutcome {
            combat,
            events,
            log_entries: staged,
        })
    }
}

#[async_trait]
impl CombatService for CombatServiceImpl {
    #[instrument(skip(self, request), fields(name = %request.name))]
    async fn create_combat(&self, request: CreateCombatRequest) -> ServiceResult<Combat> {
        if request.name.trim().is_empty() {
            return Err(CombatError::Validation("Combat name cannot be empty".to_string()).into());
        }
        if request.map.width == 0 || request.map.height == 0 {
            return Err(
                CombatError::Validation("Map dimensions must be positive".to_string()).into(),
            );
        }

        let mut combat = Combat::new(request.name, request.map).with_resort_each_round(
            request
                .resort_each_round
                .unwrap_or(self.settings.resort_initiative_each_round),
        );
        for entity in request.entities {
            combat.add_entity(entity)?;
        }

        self.repository.save(&combat).await?;
        self.sessions.write().await.insert(
            combat.id,
            Arc::new(Mutex::new(CombatSession {
                combat: combat.clone(),
                log: CombatLog::new(combat.id),
                retired: false,
            })),
        );

        info!(combat_id = %combat.id, "Created new combat: {}", combat.name);
        Ok(combat)
    }

    #[instrument(skip(self))]
    async fn get_combat(&self, id: CombatId) -> ServiceResult<Combat> {
        debug!(combat_id = %id, "Fetching combat");
        let session = self.lock_session(id).await?;
        Ok(session.combat.clone())
    }

    #[instrument(skip(self))]
    async fn list_combats(&self) -> ServiceResult<Vec<Combat>> {
        debug!("Listing all combats");
        let mut combats = self.repository.list().await?;

        // Prefer live state over stored snapshots
        let live: Vec<Option<SharedSession>> = {
            let sessions = self.sessions.read().await;
            combats
                .iter()
                .map(|combat| sessions.get(&combat.id).cloned())
                .collect()
        };
        for (combat, session) in combats.iter_mut().zip(live) {
            if let Some(session) = session {
                let live = session.lock().await;
                if !live.retired {
                    *combat = live.combat.clone();
                }
            }
        }
        Ok(combats)
    }

    #[instrument(skip(self))]
    async fn delete_combat(&self, id: CombatId) -> ServiceResult<()> {
        let mut session = self.lock_session(id).await?;

        self.repository.delete(id).await?;
        session.retired = true;
        self.sessions.write().await.remove(&id);

        info!(combat_id = %id, "Deleted combat");
        Ok(())
    }

    #[instrument(skip(self, entity), fields(entity_id = %entity.id))]
    async fn add_entity(
        &self,
        id: CombatId,
        entity: CombatEntity,
    ) -> ServiceResult<CommandOutcome> {
        let outcome = self.apply(id, |combat| Ok(vec![combat.add_entity(entity)?])).await?;
        info!(combat_id = %id, "Added combatant");
        Ok(outcome)
    }

    #[instrument(skip(self))]
    async fn remove_entity(
        &self,
        id: CombatId,
        entity_id: CombatEntityId,
    ) -> ServiceResult<CommandOutcome> {
        let outcome = self
            .apply(id, |combat| Ok(vec![combat.remove_entity(entity_id)?]))
            .await?;
        info!(combat_id = %id, entity_id = %entity_id, "Removed combatant");
        Ok(outcome)
    }

    #[instrument(skip(self, command), fields(command = command.name()))]
    async fn execute(
        &self,
        id: CombatId,
        command: CombatCommand,
    ) -> ServiceResult<CommandOutcome> {
        let name = command.name();
        let rules = self.rules;
        let mut rng = StdRng::from_entropy();

        let outcome = self
            .apply(id, move |combat| combat.execute(command, &rules, &mut rng))
            .await
            .map_err(|e| {
                debug!(combat_id = %id, command = name, error = %e, "Command rejected");
                e
            })?;

        info!(
            combat_id = %id,
            command = name,
            round = outcome.combat.round(),
            events = outcome.events.len(),
            "Applied combat command"
        );
        Ok(outcome)
    }

    #[instrument(skip(self))]
    async fn current_actor(&self, id: CombatId) -> ServiceResult<Option<CombatEntity>> {
        let session = self.lock_session(id).await?;
        Ok(session.combat.current_actor().cloned())
    }

    #[instrument(skip(self))]
    async fn valid_moves(
        &self,
        id: CombatId,
        entity_id: CombatEntityId,
    ) -> ServiceResult<Vec<GridPosition>> {
        let session = self.lock_session(id).await?;
        Ok(session.combat.valid_moves(entity_id, &self.rules)?)
    }

    #[instrument(skip(self, request), fields(entry_type = request.entry_type.as_str()))]
    async fn add_log_entry(
        &self,
        id: CombatId,
        request: AddLogEntryRequest,
    ) -> ServiceResult<CombatLogEntry> {
        if request.message.trim().is_empty() {
            return Err(CombatError::Validation("Log message cannot be empty".to_string()).into());
        }

        let mut session = self.lock_session(id).await?;

        for referenced in [request.source_id, request.target_id].into_iter().flatten() {
            if session.combat.entity(referenced).is_none() {
                return Err(CombatError::UnknownEntity(referenced).into());
            }
        }

        let mut new = NewLogEntry::new(request.entry_type, request.message)
            .with_source(request.source_id)
            .with_target(request.target_id)
            .in_round(session.combat.log_round());
        new.amount = request.amount;

        let staged = session.log.stage(vec![new]);
        self.repository
            .save_with_log(&session.combat, &staged)
            .await?;
        session.log.extend(staged.clone());

        debug!(combat_id = %id, "Appended log entry");
        staged
            .into_iter()
            .next()
            .ok_or_else(|| CombatServiceError::Repository(anyhow::anyhow!("Log entry was not staged")))
    }

    #[instrument(skip(self))]
    async fn filtered_log(
        &self,
        id: CombatId,
        filter: LogFilter,
    ) -> ServiceResult<Vec<RenderedLogEntry>> {
        let session = self.lock_session(id).await?;

        Ok(session
            .log
            .filter(&filter, &session.combat)
            .into_iter()
            .map(|entry| RenderedLogEntry {
                rendered: render_message(&entry.message, &session.combat),
                entry: entry.clone(),
            })
            .collect())
    }

    #[instrument(skip(self))]
    async fn export_log(&self, id: CombatId) -> ServiceResult<String> {
        let session = self.lock_session(id).await?;
        Ok(session.log.export(&session.combat))
    }

    #[instrument(skip(self))]
    async fn clear_log(&self, id: CombatId) -> ServiceResult<usize> {
        let mut session = self.lock_session(id).await?;

        self.repository.clear_log(id).await?;
        let removed = session.log.clear();

        info!(combat_id = %id, removed, "Cleared combat log");
        Ok(removed)
    }

    #[instrument(skip(self))]
    async fn generate_recap(&self, id: CombatId) -> ServiceResult<CombatRecap> {
        let session = self.lock_session(id).await?;

        let recap = self
            .recaps
            .generate(&session.combat, session.log.entries());
        info!(
            combat_id = %id,
            rounds = recap.total_rounds,
            mvp = recap.mvp.as_ref().map(|m| m.name.as_str()).unwrap_or("none"),
            "Generated combat recap"
        );
        Ok(recap)
    }

    #[instrument(skip(self, recap), fields(combat_id = %recap.combat_id))]
    async fn save_recap(&self, recap: CombatRecap) -> ServiceResult<CombatRecap> {
        let id = recap.combat_id;
        let mut session = self.lock_session(id).await?;
        self.repository.save_recap(&recap).await?;
        info!(recap_id = %recap.id, "Saved combat recap");

        // A completed combat with a stored recap no longer needs to stay loaded
        if session.combat.status() == CombatStatus::Completed {
            session.retired = true;
            self.sessions.write().await.remove(&id);
            debug!(combat_id = %id, "Evicted completed combat from memory");
        }
        Ok(recap)
    }

    #[instrument(skip(self))]
    async fn get_recap(&self, id: CombatId) -> ServiceResult<CombatRecap> {
        self.repository
            .get_recap(id)
            .await?
            .ok_or(CombatServiceError::RecapNotFound(id))
    }

    #[instrument(skip(self, narrative))]
    async fn update_recap_narrative(
        &self,
        id: CombatId,
        narrative: String,
    ) -> ServiceResult<CombatRecap> {
        let mut recap = self.get_recap(id).await?;
        recap.edit_narrative(narrative);
        self.repository.save_recap(&recap).await?;
        info!(combat_id = %id, "Updated recap narrative");
        Ok(recap)
    }
}

/// Translate command events into log entries
fn log_entries_for(combat: &Combat, events: &[CombatEvent]) -> Vec<NewLogEntry> {
    let round = combat.log_round();
    let token = entity_token;

    let mut entries = Vec::new();
    for event in events {
        let entry = match event {
            CombatEvent::CombatStarted { .. } => {
                NewLogEntry::new(LogEntryType::System, "Combat started").in_round(round)
            }
            CombatEvent::CombatCompleted { rounds } => NewLogEntry::new(
                LogEntryType::System,
                format!("Combat ended after {} round(s)", rounds),
            )
            .in_round(*rounds),
            CombatEvent::TurnAdvanced {
                round, new_round, ..
            } => {
                if !new_round {
                    continue;
                }
                NewLogEntry::new(LogEntryType::System, format!("Round {} begins", round))
                    .in_round(*round)
            }
            CombatEvent::InitiativeRolled { rolls } => NewLogEntry::new(
                LogEntryType::System,
                format!("Initiative rolled for {} combatant(s)", rolls.len()),
            )
            .in_round(round),
            CombatEvent::EntityAdded { entity_id } => NewLogEntry::new(
                LogEntryType::System,
                format!("{} joins the combat", token(*entity_id)),
            )
            .with_target(Some(*entity_id))
            .in_round(round),
            CombatEvent::EntityRemoved { entity_id, name } => NewLogEntry::new(
                LogEntryType::System,
                format!("{} leaves the combat", name),
            )
            .with_target(Some(*entity_id))
            .in_round(round),
            CombatEvent::EntityRenamed {
                entity_id,
                old_name,
            } => NewLogEntry::new(
                LogEntryType::System,
                format!("{} is now known as {}", old_name, token(*entity_id)),
            )
            .with_target(Some(*entity_id))
            .in_round(round),
            CombatEvent::EntityMoved {
                entity_id,
                from,
                to,
            } => NewLogEntry::new(
                LogEntryType::Action,
                format!("{} moves from {} to {}", token(*entity_id), from, to),
            )
            .with_source(Some(*entity_id))
            .in_round(round),
            CombatEvent::DamageApplied {
                entity_id,
                source_id,
                amount,
                change,
            } => {
                let message = match source_id {
                    Some(source) => format!(
                        "{} deals {} damage to {}",
                        token(*source),
                        amount,
                        token(*entity_id)
                    ),
                    None => format!("{} takes {} damage", token(*entity_id), amount),
                };
                NewLogEntry::new(LogEntryType::Damage, message)
                    .with_source(*source_id)
                    .with_target(Some(*entity_id))
                    .with_amount(change.magnitude())
                    .in_round(round)
            }
            CombatEvent::HealingApplied {
                entity_id,
                source_id,
                amount,
                change,
            } => {
                let message = match source_id {
                    Some(source) => format!(
                        "{} heals {} for {}",
                        token(*source),
                        token(*entity_id),
                        amount
                    ),
                    None => format!("{} regains {} hit points", token(*entity_id), amount),
                };
                NewLogEntry::new(LogEntryType::Healing, message)
                    .with_source(*source_id)
                    .with_target(Some(*entity_id))
                    .with_amount(change.magnitude())
                    .in_round(round)
            }
            CombatEvent::EntityDowned {
                entity_id,
                source_id,
            } => {
                let message = match source_id {
                    Some(source) => {
                        format!("{} is downed by {}", token(*entity_id), token(*source))
                    }
                    None => format!("{} is downed", token(*entity_id)),
                };
                NewLogEntry::new(LogEntryType::Death, message)
                    .with_source(*source_id)
                    .with_target(Some(*entity_id))
                    .in_round(round)
            }
            CombatEvent::ConditionSet {
                entity_id,
                condition,
            } => NewLogEntry::new(
                LogEntryType::Condition,
                format!("{} is now {}", token(*entity_id), condition),
            )
            .with_target(Some(*entity_id))
            .in_round(round),
            CombatEvent::ConditionCleared {
                entity_id,
                condition,
            } => NewLogEntry::new(
                LogEntryType::Condition,
                format!("{} is no longer {}", token(*entity_id), condition),
            )
            .with_target(Some(*entity_id))
            .in_round(round),
            CombatEvent::TurnReverted { .. }
            | CombatEvent::InitiativeResorted { .. }
            | CombatEvent::InitiativeSet { .. }
            | CombatEvent::ObstacleAdded { .. }
            | CombatEvent::DifficultTerrainAdded { .. } => continue,
        };

        entries.push(entry);
    }
    entries
}
