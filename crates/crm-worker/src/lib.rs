//! CRM worker — hosts the event-buffer dispatcher, the projections and a
//! small admin API.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;
