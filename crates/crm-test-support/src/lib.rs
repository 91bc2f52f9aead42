//! Shared test mocks and utilities for the CRM events platform.

mod clock;
mod events;
mod forwarder;
mod repository;

pub use clock::FixedClock;
pub use events::stored_event;
pub use forwarder::{FailingForwarder, RecordingForwarder};
pub use repository::{
    AppendCall, ConflictingEventRepository, EmptyEventRepository, FailingEventRepository,
    RecordingEventRepository,
};
