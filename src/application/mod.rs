//! Application layer - Use cases and ports
//!
//! Orchestrates the domain: loads combats through outbound ports, applies
//! commands, and records what happened in the combat log.

pub mod dto;
pub mod ports;
pub mod services;
