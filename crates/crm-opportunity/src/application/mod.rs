//! Application layer for the Opportunity context.

pub mod command_handlers;
