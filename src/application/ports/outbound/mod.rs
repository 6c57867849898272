//! Outbound ports - Interfaces that the application requires from external systems

mod combat_repository_port;

pub use combat_repository_port::CombatRepositoryPort;
