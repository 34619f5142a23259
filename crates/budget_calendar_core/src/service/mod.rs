//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate model validation and repository persistence.
//! - Keep UI collaborators decoupled from storage details.

pub mod event_store;
