//! Shared application state

use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::sqlite::SqlitePoolOptions;

use crate::application::ports::outbound::CombatRepositoryPort;
use crate::application::services::CombatServiceImpl;
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::persistence::SqliteCombatRepository;

/// Shared application state
pub struct AppState {
    pub config: AppConfig,
    pub combat_service: CombatServiceImpl,
}

impl AppState {
    pub async fn new(config: AppConfig) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&config.database_url)
            .await
            .with_context(|| format!("Failed to connect to {}", config.database_url))?;
        let repository = SqliteCombatRepository::new(pool).await?;

        Ok(Self::with_repository(config, Arc::new(repository)))
    }

    /// Build state around an existing repository
    pub fn with_repository(config: AppConfig, repository: Arc<dyn CombatRepositoryPort>) -> Self {
        let combat_service = CombatServiceImpl::new(repository, config.combat.clone());
        Self {
            config,
            combat_service,
        }
    }
}
