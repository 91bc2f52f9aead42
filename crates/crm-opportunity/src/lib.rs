//! CRM events platform — Opportunity bounded context.
//!
//! Responsible for sales opportunities and renewal opportunities: amounts,
//! stages, ownership, renewal likelihood and the renewal cycle.

pub mod application;
pub mod domain;
