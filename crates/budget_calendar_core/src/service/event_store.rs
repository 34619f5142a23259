//! Event store service.
//!
//! # Responsibility
//! - Own the canonical, ordered sequence of calendar entries.
//! - Hydrate the sequence from durable storage once at init.
//! - Re-serialize the whole sequence after every mutation.
//!
//! # Invariants
//! - Insertion order is preserved; the sequence only grows by appends.
//! - `add_event`/`remove_event` are the only write paths.
//! - The snapshot is written synchronously right after the in-memory change.
//!   A crash between the two is the one accepted inconsistency window.
//! - Duplicate ids are tolerated; removal drops every entry with the id.

use crate::config::{HydrationPolicy, StoreConfig};
use crate::model::entry::{CalendarEntry, LedgerEvent};
use crate::model::event::{ValidationError, ValidationResult};
use crate::model::record::EventRecord;
use crate::model::recurring::RecurrenceError;
use crate::repo::kv_repo::{KeyValueRepository, RepoError};
use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, error, info, warn};
use std::any::Any;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

pub type StoreResult<T> = Result<T, StoreError>;

/// Error for store hydration, mutation and persistence.
#[derive(Debug)]
pub enum StoreError {
    /// An entry failed field validation.
    Validation(ValidationError),
    /// A recurring entry could not be expanded.
    Recurrence(RecurrenceError),
    /// A type-erased value is not a recognized calendar event.
    NotAnEvent,
    /// Durable storage failure.
    Repo(RepoError),
    /// Snapshot encoding or decoding failure.
    Serialization(serde_json::Error),
    /// A persisted entry could not be rebuilt during hydration.
    CorruptEntry { index: usize, message: String },
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Recurrence(err) => write!(f, "{err}"),
            Self::NotAnEvent => write!(
                f,
                "can not add event; value is not a recognized calendar event"
            ),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Serialization(err) => write!(f, "invalid event snapshot: {err}"),
            Self::CorruptEntry { index, message } => {
                write!(f, "invalid persisted event at index {index}: {message}")
            }
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Recurrence(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::Serialization(err) => Some(err),
            Self::NotAnEvent | Self::CorruptEntry { .. } => None,
        }
    }
}

impl From<ValidationError> for StoreError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RecurrenceError> for StoreError {
    fn from(value: RecurrenceError) -> Self {
        Self::Recurrence(value)
    }
}

impl From<RepoError> for StoreError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value)
    }
}

/// Observable in-memory event collection synchronized to key-value storage.
///
/// Built once at process start via `init`; dropping it is the teardown.
/// Callers observe mutations by re-reading `events()`.
pub struct EventStore<R: KeyValueRepository> {
    repo: R,
    config: StoreConfig,
    events: Vec<CalendarEntry>,
}

impl<R: KeyValueRepository> EventStore<R> {
    /// Hydrates the store from `config.storage_key`.
    ///
    /// A missing or blank value yields an empty store.
    ///
    /// # Errors
    /// - `Repo` when storage cannot be read.
    /// - `Serialization` when the stored value is not a JSON array.
    /// - `CorruptEntry` for the first bad entry under `HydrationPolicy::FailFast`.
    pub fn init(repo: R, config: StoreConfig) -> StoreResult<Self> {
        let started_at = Instant::now();

        let hydrated = repo
            .get_value(&config.storage_key)
            .map_err(StoreError::from)
            .and_then(|raw| match raw {
                Some(raw) => hydrate(&raw, config.hydration),
                None => Ok((Vec::new(), 0)),
            });

        let (events, skipped) = match hydrated {
            Ok(hydrated) => hydrated,
            Err(err) => {
                error!(
                    "event=store_init module=store status=error policy={} duration_ms={} error={}",
                    config.hydration.as_str(),
                    started_at.elapsed().as_millis(),
                    err
                );
                return Err(err);
            }
        };

        info!(
            "event=store_init module=store status=ok policy={} entries={} skipped={} duration_ms={}",
            config.hydration.as_str(),
            events.len(),
            skipped,
            started_at.elapsed().as_millis()
        );

        Ok(Self {
            repo,
            config,
            events,
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Current entries in insertion order.
    pub fn events(&self) -> &[CalendarEntry] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// First entry carrying `id`, if any.
    pub fn find_event(&self, id: &str) -> Option<&CalendarEntry> {
        self.events.iter().find(|entry| entry.id().ok() == Some(id))
    }

    /// Appends an entry and persists the full snapshot.
    ///
    /// The id is generated here when it was not read before, and returned.
    /// No uniqueness check is made against existing ids.
    ///
    /// # Errors
    /// - `Validation` when the entry has no date and so no id.
    /// - `Repo`/`Serialization` when the snapshot cannot be written. The
    ///   entry stays in memory in that case.
    pub fn add_event(&mut self, entry: impl Into<CalendarEntry>) -> StoreResult<String> {
        let entry = entry.into();
        let id = entry.id()?.to_string();

        self.events.push(entry);
        self.persist()?;

        debug!(
            "event=store_add module=store status=ok entries={}",
            self.events.len()
        );
        Ok(id)
    }

    /// Adds a type-erased value after checking it is a recognized event.
    ///
    /// # Errors
    /// - `NotAnEvent` for anything other than `Event`, `RecurringEvent`
    ///   or `CalendarEntry`.
    pub fn add_dyn(&mut self, candidate: Box<dyn Any>) -> StoreResult<String> {
        let entry = CalendarEntry::from_any(candidate).map_err(|_| {
            warn!("event=store_add module=store status=rejected error_code=not_an_event");
            StoreError::NotAnEvent
        })?;
        self.add_event(entry)
    }

    /// Removes every entry whose id equals `id`, then persists the snapshot.
    ///
    /// An unknown id is not an error: nothing is removed and the snapshot is
    /// still rewritten. Returns the number of removed entries.
    pub fn remove_event(&mut self, id: &str) -> StoreResult<usize> {
        let before = self.events.len();
        self.events.retain(|entry| entry.id().ok() != Some(id));
        let removed = before - self.events.len();

        self.persist()?;

        debug!(
            "event=store_remove module=store status=ok removed={} entries={}",
            removed,
            self.events.len()
        );
        Ok(removed)
    }

    /// Entries that apply on `day` (UTC), in insertion order.
    pub fn events_on(&self, day: NaiveDate) -> StoreResult<Vec<&CalendarEntry>> {
        let mut matching = Vec::new();
        for entry in &self.events {
            if entry
                .occurrences()?
                .iter()
                .any(|date| date.date_naive() == day)
            {
                matching.push(entry);
            }
        }
        Ok(matching)
    }

    /// Running balance: every occurrence on or before `until` contributes its amount.
    pub fn balance_on(&self, until: DateTime<Utc>) -> StoreResult<f64> {
        let mut balance = 0.0;
        for entry in &self.events {
            let applied = entry
                .occurrences()?
                .iter()
                .filter(|date| **date <= until)
                .count();
            balance += entry.amount() * applied as f64;
        }
        Ok(balance)
    }

    /// Encodes all entries as the JSON array written to storage.
    pub fn snapshot(&self) -> StoreResult<String> {
        let records = self
            .events
            .iter()
            .map(LedgerEvent::to_record)
            .collect::<ValidationResult<Vec<EventRecord>>>()?;
        Ok(serde_json::to_string(&records)?)
    }

    fn persist(&self) -> StoreResult<()> {
        let result = self.snapshot().and_then(|snapshot| {
            self.repo
                .set_value(&self.config.storage_key, &snapshot)
                .map_err(StoreError::from)
        });

        if let Err(err) = &result {
            error!(
                "event=store_persist module=store status=error entries={} error={}",
                self.events.len(),
                err
            );
        }
        result
    }
}

fn hydrate(raw: &str, policy: HydrationPolicy) -> StoreResult<(Vec<CalendarEntry>, usize)> {
    if raw.trim().is_empty() {
        return Ok((Vec::new(), 0));
    }

    let values: Vec<serde_json::Value> = serde_json::from_str(raw)?;
    let mut entries = Vec::with_capacity(values.len());
    let mut skipped = 0;

    for (index, value) in values.into_iter().enumerate() {
        match decode_entry(value) {
            Ok(entry) => entries.push(entry),
            Err(message) => match policy {
                HydrationPolicy::FailFast => {
                    return Err(StoreError::CorruptEntry { index, message });
                }
                HydrationPolicy::SkipInvalid => {
                    warn!(
                        "event=store_hydrate module=store status=skipped index={} error={}",
                        index, message
                    );
                    skipped += 1;
                }
            },
        }
    }

    Ok((entries, skipped))
}

fn decode_entry(value: serde_json::Value) -> Result<CalendarEntry, String> {
    let record: EventRecord = serde_json::from_value(value).map_err(|err| err.to_string())?;
    CalendarEntry::from_record(&record).map_err(|err| err.to_string())
}
