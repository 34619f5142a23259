//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the durable key-value storage contract used by the event store.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Repositories store opaque strings; encoding is owned by the service layer.

pub mod kv_repo;
