//! Domain layer for the Contact context.

pub mod aggregates;
pub mod commands;
pub mod events;
