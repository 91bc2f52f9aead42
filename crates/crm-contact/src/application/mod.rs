//! Application layer for the Contact context.

pub mod command_handlers;
