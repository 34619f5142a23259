//! Core domain logic for the budget calendar.
//! This crate is the single source of truth for ledger event invariants.

pub mod config;
pub mod currency;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{HydrationPolicy, StoreConfig, DEFAULT_STORAGE_KEY};
pub use currency::{format_currency, CurrencyFormatError, CurrencyOptions};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::entry::{is_calendar_event, CalendarEntry, LedgerEvent};
pub use model::event::{
    AmountInput, DateInput, Event, EventInput, ValidationError, ValidationResult,
};
pub use model::record::{EventRecord, RecurrenceRecord};
pub use model::recurring::{
    Frequency, Recurrence, RecurrenceError, RecurrenceRule, RecurringEvent,
};
pub use repo::kv_repo::{
    KeyValueRepository, MemoryKeyValueRepository, RepoError, RepoResult,
    SqliteKeyValueRepository,
};
pub use service::event_store::{EventStore, StoreError, StoreResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
