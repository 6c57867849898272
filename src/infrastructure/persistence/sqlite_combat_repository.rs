//! SQLite combat repository
//!
//! Combats and recaps are stored as JSON documents; log entries get one row
//! each so they can be ordered by sequence and cleared per combat.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::debug;

use crate::application::ports::outbound::CombatRepositoryPort;
use crate::domain::aggregates::Combat;
use crate::domain::entities::{CombatLogEntry, CombatRecap};
use crate::domain::value_objects::CombatId;

pub struct SqliteCombatRepository {
    pool: SqlitePool,
}

impl SqliteCombatRepository {
    pub async fn new(pool: SqlitePool) -> Result<Self> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS combats (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                status TEXT NOT NULL,
                data TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )
        "#,
        )
        .execute(&pool)
        .await
        .context("Failed to create combats table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS combat_log_entries (
                id TEXT PRIMARY KEY,
                combat_id TEXT NOT NULL,
                sequence INTEGER NOT NULL,
                entry_type TEXT NOT NULL,
                data TEXT NOT NULL
            )
        "#,
        )
        .execute(&pool)
        .await
        .context("Failed to create combat_log_entries table")?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_combat_log_entries_combat \
             ON combat_log_entries (combat_id, sequence)",
        )
        .execute(&pool)
        .await
        .context("Failed to index combat_log_entries")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS combat_recaps (
                combat_id TEXT PRIMARY KEY,
                id TEXT NOT NULL,
                data TEXT NOT NULL,
                generated_at TEXT NOT NULL
            )
        "#,
        )
        .execute(&pool)
        .await
        .context("Failed to create combat_recaps table")?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn combat_row(combat: &Combat) -> Result<(String, String, String, String, String)> {
    let data = serde_json::to_string(combat).context("Failed to serialize combat")?;
    Ok((
        combat.id.to_string(),
        combat.name.clone(),
        combat.status().as_str().to_string(),
        data,
        combat.created_at.to_rfc3339(),
    ))
}

const UPSERT_COMBAT: &str = "INSERT OR REPLACE INTO combats (id, name, status, data, created_at, updated_at) \
     VALUES (?, ?, ?, ?, ?, CURRENT_TIMESTAMP)";

const INSERT_LOG_ENTRY: &str = "INSERT OR REPLACE INTO combat_log_entries (id, combat_id, sequence, entry_type, data) \
     VALUES (?, ?, ?, ?, ?)";

#[async_trait]
impl CombatRepositoryPort for SqliteCombatRepository {
    async fn save(&self, combat: &Combat) -> Result<()> {
        let (id, name, status, data, created_at) = combat_row(combat)?;
        sqlx::query(UPSERT_COMBAT)
            .bind(id)
            .bind(name)
            .bind(status)
            .bind(data)
            .bind(created_at)
            .execute(&self.pool)
            .await
            .context("Failed to save combat")?;
        Ok(())
    }

    async fn save_with_log(&self, combat: &Combat, entries: &[CombatLogEntry]) -> Result<()> {
        let (id, name, status, data, created_at) = combat_row(combat)?;
        let mut tx = self.pool.begin().await.context("Failed to open transaction")?;

        sqlx::query(UPSERT_COMBAT)
            .bind(id)
            .bind(name)
            .bind(status)
            .bind(data)
            .bind(created_at)
            .execute(&mut *tx)
            .await
            .context("Failed to save combat")?;

        for entry in entries {
            let sequence =
                i64::try_from(entry.sequence).context("Log sequence does not fit in SQLite")?;
            let data = serde_json::to_string(entry).context("Failed to serialize log entry")?;
            sqlx::query(INSERT_LOG_ENTRY)
                .bind(entry.id.to_string())
                .bind(entry.combat_id.to_string())
                .bind(sequence)
                .bind(entry.entry_type.as_str())
                .bind(data)
                .execute(&mut *tx)
                .await
                .context("Failed to append log entry")?;
        }

        tx.commit().await.context("Failed to commit combat update")?;
        debug!(combat_id = %combat.id, entries = entries.len(), "Stored combat snapshot");
        Ok(())
    }

    async fn get(&self, id: CombatId) -> Result<Option<Combat>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT data FROM combats WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to load combat")?;

        row.map(|(data,)| serde_json::from_str(&data).context("Failed to parse stored combat"))
            .transpose()
    }

    async fn list(&self) -> Result<Vec<Combat>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT data FROM combats ORDER BY created_at, id")
                .fetch_all(&self.pool)
                .await
                .context("Failed to list combats")?;

        rows.into_iter()
            .map(|(data,)| serde_json::from_str(&data).context("Failed to parse stored combat"))
            .collect()
    }

    async fn delete(&self, id: CombatId) -> Result<()> {
        let id = id.to_string();
        let mut tx = self.pool.begin().await.context("Failed to open transaction")?;

        for statement in [
            "DELETE FROM combat_log_entries WHERE combat_id = ?",
            "DELETE FROM combat_recaps WHERE combat_id = ?",
            "DELETE FROM combats WHERE id = ?",
        ] {
            sqlx::query(statement)
                .bind(id.as_str())
                .execute(&mut *tx)
                .await
                .context("Failed to delete combat")?;
        }

        tx.commit().await.context("Failed to commit combat deletion")?;
        Ok(())
    }

    async fn get_log(&self, combat_id: CombatId) -> Result<Vec<CombatLogEntry>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT data FROM combat_log_entries WHERE combat_id = ? ORDER BY sequence",
        )
        .bind(combat_id.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to load combat log")?;

        rows.into_iter()
            .map(|(data,)| serde_json::from_str(&data).context("Failed to parse stored log entry"))
            .collect()
    }

    async fn clear_log(&self, combat_id: CombatId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM combat_log_entries WHERE combat_id = ?")
            .bind(combat_id.to_string())
            .execute(&self.pool)
            .await
            .context("Failed to clear combat log")?;
        Ok(result.rows_affected())
    }

    async fn save_recap(&self, recap: &CombatRecap) -> Result<()> {
        let data = serde_json::to_string(recap).context("Failed to serialize recap")?;
        sqlx::query(
            "INSERT OR REPLACE INTO combat_recaps (combat_id, id, data, generated_at) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(recap.combat_id.to_string())
        .bind(recap.id.to_string())
        .bind(data)
        .bind(recap.generated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to save recap")?;
        Ok(())
    }

    async fn get_recap(&self, combat_id: CombatId) -> Result<Option<CombatRecap>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT data FROM combat_recaps WHERE combat_id = ?")
                .bind(combat_id.to_string())
                .fetch_optional(&self.pool)
                .await
                .context("Failed to load recap")?;

        row.map(|(data,)| serde_json::from_str(&data).context("Failed to parse stored recap"))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::CombatLog;
    use crate::domain::entities::{CombatEntity, CombatMap, CombatantType, LogEntryType, NewLogEntry};
    use crate::domain::services::{RecapGenerator, WeightedScore};
    use sqlx::sqlite::SqlitePoolOptions;

    async fn repository() -> SqliteCombatRepository {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        SqliteCombatRepository::new(pool).await.unwrap()
    }

    fn combat() -> Combat {
        let mut combat = Combat::new("Crypt", CombatMap::new("Crypt", 8, 8));
        combat
            .add_entity(CombatEntity::new("Skeleton", CombatantType::Monster, 13).with_initiative(8))
            .unwrap();
        combat.start().unwrap();
        combat
    }

    #[tokio::test]
    async fn test_save_and_get_combat() {
        let repo = repository().await;
        let combat = combat();

        repo.save(&combat).await.unwrap();

        assert_eq!(repo.get(combat.id).await.unwrap(), Some(combat.clone()));
        assert_eq!(repo.list().await.unwrap().len(), 1);
        assert!(repo.get(CombatId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_log_entries_come_back_in_sequence_order() {
        let repo = repository().await;
        let combat = combat();
        let log = CombatLog::new(combat.id);
        let staged = log.stage(vec![
            NewLogEntry::new(LogEntryType::System, "Combat started").in_round(1),
            NewLogEntry::new(LogEntryType::DmNote, "Bones rattle").in_round(1),
        ]);
        let (first, second) = staged.split_at(1);

        repo.save_with_log(&combat, second).await.unwrap();
        repo.save_with_log(&combat, first).await.unwrap();

        let stored = repo.get_log(combat.id).await.unwrap();
        assert_eq!(stored, staged);

        assert_eq!(repo.clear_log(combat.id).await.unwrap(), 2);
        assert!(repo.get_log(combat.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_recap_roundtrip_and_cascading_delete() {
        let repo = repository().await;
        let combat = combat();
        repo.save(&combat).await.unwrap();
        let mut recap = RecapGenerator::<WeightedScore>::default().generate(&combat, &[]);
        repo.save_recap(&recap).await.unwrap();

        recap.edit_narrative("Edited");
        repo.save_recap(&recap).await.unwrap();
        assert_eq!(repo.get_recap(combat.id).await.unwrap(), Some(recap));

        repo.delete(combat.id).await.unwrap();
        assert!(repo.get(combat.id).await.unwrap().is_none());
        assert!(repo.get_recap(combat.id).await.unwrap().is_none());
    }
}
