//! CRM events platform — read models.
//!
//! Projectors fold committed events into per-entity records in a
//! [`ReadStore`](read_store::ReadStore), applying the same source-of-truth
//! precedence as the aggregates. Some projectors also call back into the
//! command side, and maintenance jobs page through the read store to issue
//! commands in bulk.

pub mod organization_adjuster;
pub mod projector;
pub mod read_store;
pub mod registration;
pub mod renewal_rollout;
