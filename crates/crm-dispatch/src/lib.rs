//! CRM Dispatch — delivery of committed and deferred events.
//!
//! Committed events reach in-process projectors through the
//! [`SubscriptionRegistry`](subscription::SubscriptionRegistry). Deferred events
//! wait in the event buffer until the
//! [`EventBufferDispatcher`](dispatcher::EventBufferDispatcher) forwards them.

pub mod dispatcher;
pub mod forwarder;
pub mod outbox;
pub mod paging;
pub mod retry;
pub mod subscription;
