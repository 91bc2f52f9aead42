//! CRM events platform — Contact bounded context.
//!
//! Responsible for people the tenant works with: names, profile details and
//! their references in external systems.

pub mod application;
pub mod domain;
