//! WrldBldr Combat - Tactical combat engine for TTRPG encounters
//!
//! Tracks combatants on a square grid, runs initiative order, records
//! everything that happens in a combat log and summarizes finished fights.

pub mod application;
pub mod domain;
pub mod infrastructure;
