//! In-memory combat repository for tests and ephemeral runs

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::application::ports::outbound::CombatRepositoryPort;
use crate::domain::aggregates::Combat;
use crate::domain::entities::{CombatLogEntry, CombatRecap};
use crate::domain::value_objects::CombatId;

#[derive(Default)]
struct Store {
    combats: HashMap<CombatId, Combat>,
    logs: HashMap<CombatId, Vec<CombatLogEntry>>,
    recaps: HashMap<CombatId, CombatRecap>,
}

/// Keeps everything behind one lock so multi-record writes stay atomic
#[derive(Default)]
pub struct InMemoryCombatRepository {
    store: RwLock<Store>,
}

impl InMemoryCombatRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CombatRepositoryPort for InMemoryCombatRepository {
    async fn save(&self, combat: &Combat) -> Result<()> {
        self.store
            .write()
            .await
            .combats
            .insert(combat.id, combat.clone());
        Ok(())
    }

    async fn save_with_log(&self, combat: &Combat, entries: &[CombatLogEntry]) -> Result<()> {
        let mut store = self.store.write().await;
        store.combats.insert(combat.id, combat.clone());
        let log = store.logs.entry(combat.id).or_default();
        log.extend_from_slice(entries);
        log.sort_by_key(|e| e.sequence);
        Ok(())
    }

    async fn get(&self, id: CombatId) -> Result<Option<Combat>> {
        Ok(self.store.read().await.combats.get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<Combat>> {
        let mut combats: Vec<Combat> = self.store.read().await.combats.values().cloned().collect();
        combats.sort_by_key(|c| c.created_at);
        Ok(combats)
    }

    async fn delete(&self, id: CombatId) -> Result<()> {
        let mut store = self.store.write().await;
        store.combats.remove(&id);
        store.logs.remove(&id);
        store.recaps.remove(&id);
        Ok(())
    }

    async fn get_log(&self, combat_id: CombatId) -> Result<Vec<CombatLogEntry>> {
        Ok(self
            .store
            .read()
            .await
            .logs
            .get(&combat_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn clear_log(&self, combat_id: CombatId) -> Result<u64> {
        let removed = self
            .store
            .write()
            .await
            .logs
            .remove(&combat_id)
            .map_or(0, |log| log.len());
        Ok(u64::try_from(removed)?)
    }

    async fn save_recap(&self, recap: &CombatRecap) -> Result<()> {
        self.store
            .write()
            .await
            .recaps
            .insert(recap.combat_id, recap.clone());
        Ok(())
    }

    async fn get_recap(&self, combat_id: CombatId) -> Result<Option<CombatRecap>> {
        Ok(self.store.read().await.recaps.get(&combat_id).cloned())
    }
}
