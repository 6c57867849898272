//! Infrastructure layer - External adapters and implementations
//!
//! This layer contains:
//! - Configuration loading
//! - Persistence: SQLite and in-memory combat repositories
//! - HTTP: REST API routes
//! - Shared application state

pub mod config;
pub mod http;
pub mod persistence;
pub mod state;
