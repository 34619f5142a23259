//! Ledger event domain model.
//!
//! # Responsibility
//! - Define the validated value objects stored by the event store.
//! - Keep simple and recurring events behind one entry type.
//!
//! # Invariants
//! - Every domain object is either fully validated or not constructed.
//! - Persisted shapes live in `record` and are produced only by the model.

pub mod entry;
pub mod event;
pub mod record;
pub mod recurring;
