//! CRM events platform — Issue bounded context.
//!
//! Responsible for support issues reported by organizations, and the users
//! assigned to or following them.

pub mod application;
pub mod domain;
