//! CRM events platform — User bounded context.
//!
//! Responsible for the tenant's platform users and their roles.

pub mod application;
pub mod domain;
