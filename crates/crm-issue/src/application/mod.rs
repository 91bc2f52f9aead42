//! Application layer for the Issue context.

pub mod command_handlers;
