//! Polymorphic calendar entry over simple and recurring events.
//!
//! # Responsibility
//! - Provide one capability surface (`LedgerEvent`) shared by every entry kind.
//! - Recognize event values handed over through dynamic (`Any`) boundaries.

use crate::model::event::{Event, ValidationResult};
use crate::model::record::EventRecord;
use crate::model::recurring::{RecurrenceResult, RecurringEvent};
use chrono::{DateTime, Utc};
use std::any::Any;

/// Capability shared by everything the store accepts.
pub trait LedgerEvent {
    fn id(&self) -> ValidationResult<&str>;
    fn date(&self) -> Option<DateTime<Utc>>;
    fn title(&self) -> &str;
    fn amount(&self) -> f64;
    fn to_record(&self) -> ValidationResult<EventRecord>;
}

impl LedgerEvent for Event {
    fn id(&self) -> ValidationResult<&str> {
        Event::id(self)
    }

    fn date(&self) -> Option<DateTime<Utc>> {
        Event::date(self)
    }

    fn title(&self) -> &str {
        Event::title(self)
    }

    fn amount(&self) -> f64 {
        Event::amount(self)
    }

    fn to_record(&self) -> ValidationResult<EventRecord> {
        Event::to_record(self)
    }
}

impl LedgerEvent for RecurringEvent {
    fn id(&self) -> ValidationResult<&str> {
        self.event().id()
    }

    fn date(&self) -> Option<DateTime<Utc>> {
        self.event().date()
    }

    fn title(&self) -> &str {
        self.event().title()
    }

    fn amount(&self) -> f64 {
        self.event().amount()
    }

    fn to_record(&self) -> ValidationResult<EventRecord> {
        RecurringEvent::to_record(self)
    }
}

/// One entry of the store's canonical sequence.
#[derive(Debug, Clone)]
pub enum CalendarEntry {
    Simple(Event),
    Recurring(RecurringEvent),
}

impl CalendarEntry {
    /// Rebuilds an entry from a persisted record.
    ///
    /// Records carrying a recurrence become `Recurring`, all others `Simple`.
    pub fn from_record(record: &EventRecord) -> ValidationResult<Self> {
        if record.recurrence.is_some() {
            return RecurringEvent::from_record(record).map(Self::Recurring);
        }
        Event::from_record(record).map(Self::Simple)
    }

    /// Recovers an entry from a type-erased value.
    ///
    /// Returns the original box when the value is not a recognized event.
    pub fn from_any(candidate: Box<dyn Any>) -> Result<Self, Box<dyn Any>> {
        let candidate = match candidate.downcast::<CalendarEntry>() {
            Ok(entry) => return Ok(*entry),
            Err(other) => other,
        };
        let candidate = match candidate.downcast::<Event>() {
            Ok(event) => return Ok(Self::Simple(*event)),
            Err(other) => other,
        };
        match candidate.downcast::<RecurringEvent>() {
            Ok(event) => Ok(Self::Recurring(*event)),
            Err(other) => Err(other),
        }
    }

    /// Base event shared by both variants.
    pub fn event(&self) -> &Event {
        match self {
            Self::Simple(event) => event,
            Self::Recurring(recurring) => recurring.event(),
        }
    }

    pub fn as_recurring(&self) -> Option<&RecurringEvent> {
        match self {
            Self::Simple(_) => None,
            Self::Recurring(recurring) => Some(recurring),
        }
    }

    pub fn is_recurring(&self) -> bool {
        matches!(self, Self::Recurring(_))
    }

    /// Dates on which this entry applies.
    ///
    /// A simple event applies once on its date. An event whose date was
    /// cleared by a failed mutation applies nowhere.
    pub fn occurrences(&self) -> RecurrenceResult<Vec<DateTime<Utc>>> {
        match self {
            Self::Simple(event) => Ok(event.date().into_iter().collect()),
            Self::Recurring(recurring) => recurring.occurrences(),
        }
    }
}

impl LedgerEvent for CalendarEntry {
    fn id(&self) -> ValidationResult<&str> {
        self.event().id()
    }

    fn date(&self) -> Option<DateTime<Utc>> {
        self.event().date()
    }

    fn title(&self) -> &str {
        self.event().title()
    }

    fn amount(&self) -> f64 {
        self.event().amount()
    }

    fn to_record(&self) -> ValidationResult<EventRecord> {
        match self {
            Self::Simple(event) => event.to_record(),
            Self::Recurring(recurring) => recurring.to_record(),
        }
    }
}

impl From<Event> for CalendarEntry {
    fn from(value: Event) -> Self {
        Self::Simple(value)
    }
}

impl From<RecurringEvent> for CalendarEntry {
    fn from(value: RecurringEvent) -> Self {
        Self::Recurring(value)
    }
}

/// Returns whether a type-erased value is a recognized calendar event.
pub fn is_calendar_event(candidate: &dyn Any) -> bool {
    candidate.is::<Event>() || candidate.is::<RecurringEvent>() || candidate.is::<CalendarEntry>()
}
