//! Recurring ledger events and bounded recurrence expansion.
//!
//! # Responsibility
//! - Wrap a base `Event` with a recurrence rule and a closed date window.
//! - Expand the rule into concrete UTC dates via RFC 5545 rules.
//!
//! # Invariants
//! - The window end is resolved before any expansion, so expansion is finite.
//! - When no end date is given, the window ends exactly one year after `date`.
//! - A window whose end precedes its start expands to an empty sequence.
//!
//! # Known quirk
//! - `RecurringEvent::end_date()` returns the base event date, not the
//!   recurrence end. Use `recurrence_end()` for the effective window end.

use crate::model::event::{
    format_iso, resolve_date, DateInput, Event, EventInput, ValidationError, ValidationResult,
};
use crate::model::record::{EventRecord, RecurrenceRecord};
use chrono::{DateTime, Months, SubsecRound, Utc, Weekday};
use rrule::RRuleSet;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

const RRULE_DATE_FORMAT: &str = "%Y%m%dT%H%M%SZ";
const PAGE_SIZE: u16 = 10_000;

pub type RecurrenceResult<T> = Result<T, RecurrenceError>;

/// Failure while expanding a recurrence rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecurrenceError {
    InvalidRule(String),
}

impl Display for RecurrenceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidRule(message) => write!(f, "invalid recurrence rule: {message}"),
        }
    }
}

impl Error for RecurrenceError {}

/// Base repetition frequency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    #[default]
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    fn as_rrule(self) -> &'static str {
        match self {
            Self::Daily => "DAILY",
            Self::Weekly => "WEEKLY",
            Self::Monthly => "MONTHLY",
            Self::Yearly => "YEARLY",
        }
    }
}

/// Interval/frequency pattern applied inside a recurrence window.
///
/// The default repeats every day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurrenceRule {
    #[serde(default)]
    pub frequency: Frequency,
    /// Repeat every `interval` periods. Must be at least 1.
    #[serde(default = "default_interval")]
    pub interval: u16,
    /// Restricts occurrences to these weekdays.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub by_weekday: Vec<Weekday>,
    /// Restricts occurrences to these days of the month (negative counts from month end).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub by_month_day: Vec<i8>,
}

impl Default for RecurrenceRule {
    fn default() -> Self {
        Self {
            frequency: Frequency::Daily,
            interval: default_interval(),
            by_weekday: Vec::new(),
            by_month_day: Vec::new(),
        }
    }
}

fn default_interval() -> u16 {
    1
}

impl RecurrenceRule {
    /// Creates a rule repeating every `interval` periods of `frequency`.
    pub fn every(interval: u16, frequency: Frequency) -> Self {
        Self {
            frequency,
            interval,
            ..Self::default()
        }
    }

    pub fn on_weekdays(mut self, weekdays: impl IntoIterator<Item = Weekday>) -> Self {
        self.by_weekday = weekdays.into_iter().collect();
        self
    }

    pub fn on_month_days(mut self, days: impl IntoIterator<Item = i8>) -> Self {
        self.by_month_day = days.into_iter().collect();
        self
    }

    fn validate(&self) -> RecurrenceResult<()> {
        if self.interval == 0 {
            return Err(RecurrenceError::InvalidRule(
                "interval must be at least 1".to_string(),
            ));
        }
        if let Some(day) = self
            .by_month_day
            .iter()
            .find(|day| **day == 0 || !(-31..=31).contains(*day))
        {
            return Err(RecurrenceError::InvalidRule(format!(
                "month day `{day}` must be within 1..=31 or -31..=-1"
            )));
        }
        Ok(())
    }
}

/// A rule bound to a closed `[start, end]` window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recurrence {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    rule: RecurrenceRule,
}

impl Recurrence {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>, rule: RecurrenceRule) -> Self {
        Self { start, end, rule }
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn rule(&self) -> &RecurrenceRule {
        &self.rule
    }

    /// Expands the rule into ordered dates within the window, both ends inclusive.
    ///
    /// Expansion pages through the rule until the window end, so long windows
    /// are never truncated. Sub-second precision of `start` carries over to
    /// every occurrence.
    ///
    /// # Errors
    /// - Returns `InvalidRule` when the rule is rejected before or during parsing.
    pub fn occurrences(&self) -> RecurrenceResult<Vec<DateTime<Utc>>> {
        if self.end < self.start {
            return Ok(Vec::new());
        }
        self.rule.validate()?;

        let rrule_set: RRuleSet = self
            .to_rrule_string()
            .parse()
            .map_err(|err| RecurrenceError::InvalidRule(format!("{err}")))?;

        let sub_second = self.start - self.start.trunc_subsecs(0);
        let mut dates = Vec::new();
        let mut cursor: Option<DateTime<rrule::Tz>> = None;
        loop {
            let page = match &cursor {
                Some(last) => rrule_set.clone().after(last.clone()).all(PAGE_SIZE),
                None => rrule_set.clone().all(PAGE_SIZE),
            };
            dates.extend(
                page.dates
                    .iter()
                    .filter(|date| cursor.as_ref().map_or(true, |cursor| *date > cursor))
                    .map(|date| date.with_timezone(&Utc) + sub_second)
                    .filter(|date| *date >= self.start && *date <= self.end),
            );

            match page.dates.last() {
                Some(last) if page.limited && cursor.as_ref() != Some(last) => {
                    cursor = Some(last.clone());
                }
                _ => break,
            }
        }
        Ok(dates)
    }

    /// Occurrences that fall on or before `until`.
    pub fn occurrences_until(&self, until: DateTime<Utc>) -> RecurrenceResult<Vec<DateTime<Utc>>> {
        let mut dates = self.occurrences()?;
        dates.retain(|date| *date <= until);
        Ok(dates)
    }

    fn to_rrule_string(&self) -> String {
        let mut parts = vec![
            format!("FREQ={}", self.rule.frequency.as_rrule()),
            format!("INTERVAL={}", self.rule.interval),
            format!("UNTIL={}", self.end.trunc_subsecs(0).format(RRULE_DATE_FORMAT)),
        ];

        if !self.rule.by_weekday.is_empty() {
            let days = self
                .rule
                .by_weekday
                .iter()
                .map(|day| weekday_code(*day))
                .collect::<Vec<_>>();
            parts.push(format!("BYDAY={}", days.join(",")));
        }

        if !self.rule.by_month_day.is_empty() {
            let days = self
                .rule
                .by_month_day
                .iter()
                .map(i8::to_string)
                .collect::<Vec<_>>();
            parts.push(format!("BYMONTHDAY={}", days.join(",")));
        }

        format!(
            "DTSTART:{}\nRRULE:{}",
            self.start.trunc_subsecs(0).format(RRULE_DATE_FORMAT),
            parts.join(";")
        )
    }
}

fn weekday_code(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "MO",
        Weekday::Tue => "TU",
        Weekday::Wed => "WE",
        Weekday::Thu => "TH",
        Weekday::Fri => "FR",
        Weekday::Sat => "SA",
        Weekday::Sun => "SU",
    }
}

/// A ledger event repeated over a bounded window.
#[derive(Debug, Clone)]
pub struct RecurringEvent {
    event: Event,
    end_date: Option<DateTime<Utc>>,
    recurrence: Recurrence,
}

impl RecurringEvent {
    /// Builds the base event, then the recurrence over
    /// `[date, end_date or date + 1 year]` using `rule`.
    ///
    /// # Errors
    /// - Any base `Event::new` validation error.
    /// - `MissingRecurrence` when `input.recurs` is not `Some(true)`.
    /// - `InvalidEndDate` when `input.end_date` does not parse.
    pub fn new(input: &EventInput, rule: RecurrenceRule) -> ValidationResult<Self> {
        let event = Event::new(input)?;

        if input.recurs != Some(true) {
            return Err(ValidationError::MissingRecurrence);
        }

        let start = event.date().ok_or(ValidationError::MissingDate)?;
        let end_date = input
            .end_date
            .as_ref()
            .map(resolve_end_date)
            .transpose()?;
        let end = end_date.unwrap_or_else(|| one_year_after(start));

        Ok(Self {
            event,
            end_date,
            recurrence: Recurrence::new(start, end, rule),
        })
    }

    /// Rebuilds a recurring event from its persisted record.
    pub fn from_record(record: &EventRecord) -> ValidationResult<Self> {
        let persisted = record
            .recurrence
            .as_ref()
            .filter(|recurrence| recurrence.recurs)
            .ok_or(ValidationError::MissingRecurrence)?;

        let event = Event::from_record(record)?;
        let start_input = DateInput::Text(persisted.start.clone());
        let start = resolve_date(&start_input)
            .ok_or_else(|| ValidationError::InvalidDate(persisted.start.clone()))?;
        let end = resolve_end_date(&DateInput::Text(persisted.end.clone()))?;
        let end_date = persisted
            .end_date
            .as_ref()
            .map(|value| resolve_end_date(&DateInput::Text(value.clone())))
            .transpose()?;

        Ok(Self {
            event,
            end_date,
            recurrence: Recurrence::new(start, end, persisted.rule.clone()),
        })
    }

    pub fn event(&self) -> &Event {
        &self.event
    }

    /// Mutable access to the base event. Does not move the recurrence window.
    pub fn event_mut(&mut self) -> &mut Event {
        &mut self.event
    }

    /// Always `true` for a constructed recurring event.
    pub fn recurs(&self) -> bool {
        true
    }

    pub fn recur(&self) -> &Recurrence {
        &self.recurrence
    }

    /// Replaces the recurrence wholesale, window included.
    pub fn set_recur(&mut self, recurrence: Recurrence) {
        self.recurrence = recurrence;
    }

    /// Returns the base event date.
    ///
    /// This mirrors long-standing behavior and does not read the end date
    /// field. Callers wanting the window end should use `recurrence_end()`.
    pub fn end_date(&self) -> Option<DateTime<Utc>> {
        self.event.date()
    }

    /// Parses and stores an explicit end date.
    ///
    /// # Errors
    /// - Returns `InvalidEndDate` and clears the stored end date when parsing fails.
    pub fn set_end_date(&mut self, end_date: impl Into<DateInput>) -> ValidationResult<()> {
        match resolve_end_date(&end_date.into()) {
            Ok(parsed) => {
                self.end_date = Some(parsed);
                Ok(())
            }
            Err(err) => {
                self.end_date = None;
                Err(err)
            }
        }
    }

    /// Explicit end date as supplied at construction or via `set_end_date`.
    pub fn requested_end_date(&self) -> Option<DateTime<Utc>> {
        self.end_date
    }

    /// Effective end of the recurrence window.
    pub fn recurrence_end(&self) -> DateTime<Utc> {
        self.recurrence.end()
    }

    pub fn occurrences(&self) -> RecurrenceResult<Vec<DateTime<Utc>>> {
        self.recurrence.occurrences()
    }

    /// Produces the storage-ready record, recurrence fields included.
    pub fn to_record(&self) -> ValidationResult<EventRecord> {
        let mut record = self.event.to_record()?;
        record.recurrence = Some(RecurrenceRecord {
            recurs: true,
            start: format_iso(self.recurrence.start()),
            end: format_iso(self.recurrence.end()),
            end_date: self.end_date.map(format_iso),
            rule: self.recurrence.rule().clone(),
        });
        Ok(record)
    }
}

fn resolve_end_date(input: &DateInput) -> ValidationResult<DateTime<Utc>> {
    resolve_date(input).ok_or_else(|| ValidationError::InvalidEndDate(input.to_string()))
}

/// Same calendar date one year later; Feb 29 clamps to Feb 28.
fn one_year_after(date: DateTime<Utc>) -> DateTime<Utc> {
    date.checked_add_months(Months::new(12))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
