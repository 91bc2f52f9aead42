//! Domain layer for the Organization context.

pub mod aggregates;
pub mod commands;
pub mod events;
