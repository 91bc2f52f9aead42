//! CRM events platform — Organization bounded context.
//!
//! Responsible for customer organizations: descriptive and market data,
//! ownership, and the deferred notification sent when the owner changes.

pub mod application;
pub mod domain;
