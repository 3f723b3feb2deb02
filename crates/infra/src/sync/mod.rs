//! Background synchronization: outbox worker and retry policy.

pub mod outbox_worker;
pub mod retry;
