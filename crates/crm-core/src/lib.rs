//! CRM Core — shared event-sourcing abstractions.
//!
//! This crate defines the traits and types every bounded context depends on:
//! events and their envelopes, aggregate roots, commands, the aggregate store
//! and the optimistic-concurrency command handler. It contains no
//! infrastructure code.

pub mod aggregate;
pub mod buffer;
pub mod clock;
pub mod command;
pub mod error;
pub mod event;
pub mod handler;
pub mod policy;
pub mod repository;
pub mod source;
pub mod store;

#[cfg(test)]
mod testing;
