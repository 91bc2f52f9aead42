//! Domain layer for the Opportunity context.

pub mod aggregates;
pub mod commands;
pub mod events;
