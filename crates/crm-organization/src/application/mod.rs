//! Application layer for the Organization context.

pub mod command_handlers;
pub mod owner_notification;
