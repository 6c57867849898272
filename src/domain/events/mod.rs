//! Domain events - Notifications of state changes within a combat

pub mod domain_events;

pub use domain_events::CombatEvent;
