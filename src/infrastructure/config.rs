//! Application configuration

use std::env;

use anyhow::{Context, Result};

use crate::domain::value_objects::CombatSettings;

/// Application configuration loaded from environment
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// SQLite connection URL
    pub database_url: String,

    /// HTTP server port
    pub server_port: u16,

    /// Combat engine tunables
    pub combat: CombatSettings,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://wrldbldr_combat.db?mode=rwc".to_string()),

            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3001".to_string())
                .parse()
                .context("SERVER_PORT must be a valid port number")?,

            combat: CombatSettings::from_env(),
        })
    }
}
