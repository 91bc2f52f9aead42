//! Domain layer for the Issue context.

pub mod aggregates;
pub mod commands;
pub mod events;
