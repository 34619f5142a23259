//! Ledger event domain model.
//!
//! # Responsibility
//! - Validate and normalize raw event input (date, title, amount).
//! - Derive a lazily generated, memoized event id.
//! - Produce the storage-ready record shape used by store snapshots.
//!
//! # Invariants
//! - Construction either yields a complete event or a `ValidationError`.
//! - A failed `set_date` leaves the date unset, never a stale value.
//! - A failed `set_amount` resets the amount to `0.0` and still reports the error.
//! - `id()` is generated on first read and cached for the instance lifetime.

use crate::model::record::EventRecord;
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use once_cell::sync::Lazy;
use once_cell::unsync::OnceCell;
use regex::Regex;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

const ID_DATE_FORMAT: &str = "%Y-%m-%d";
const ID_TITLE_MAX_CHARS: usize = 25;
const NAIVE_DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));
static FLOAT_PREFIX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?").expect("valid float prefix regex")
});

pub type ValidationResult<T> = Result<T, ValidationError>;

/// Field-level validation failure for event input and mutators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// `date` is absent from the input.
    MissingDate,
    /// `date` could not be parsed into a valid date.
    InvalidDate(String),
    /// `title` is absent or blank after trimming.
    MissingTitle,
    /// `amount` is absent from the input.
    MissingAmount,
    /// `amount` is not a finite numeric value.
    InvalidAmount(String),
    /// A recurring event was built without `recurs = true`.
    MissingRecurrence,
    /// `end_date` could not be parsed into a valid date.
    InvalidEndDate(String),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingDate => write!(
                f,
                "`date` attribute is required and must be a date string or date value"
            ),
            Self::InvalidDate(value) => write!(
                f,
                "date must be a date value or parsable date string, got `{value}`"
            ),
            Self::MissingTitle => write!(
                f,
                "`title` attribute is required and must be at least one character long"
            ),
            Self::MissingAmount => write!(
                f,
                "`amount` attribute is required and must be a numeric value"
            ),
            Self::InvalidAmount(value) => write!(
                f,
                "invalid event amount `{value}`; must be a numeric value"
            ),
            Self::MissingRecurrence => write!(f, "recurring event must include `recurs` data"),
            Self::InvalidEndDate(value) => write!(
                f,
                "end date must be a date value or parsable date string, got `{value}`"
            ),
        }
    }
}

impl Error for ValidationError {}

/// Date input accepted by constructors and date mutators.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum DateInput {
    /// Parsable date string (RFC 3339, ISO date-time, or `yyyy-MM-dd`).
    Text(String),
    /// Already-parsed date value.
    Value(DateTime<Utc>),
}

impl Display for DateInput {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(value) => write!(f, "{value}"),
            Self::Value(value) => write!(f, "{}", format_iso(*value)),
        }
    }
}

impl From<&str> for DateInput {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for DateInput {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<DateTime<Utc>> for DateInput {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Value(value)
    }
}

impl From<NaiveDate> for DateInput {
    fn from(value: NaiveDate) -> Self {
        Self::Value(value.and_time(chrono::NaiveTime::MIN).and_utc())
    }
}

/// Amount input accepted by constructors and the amount mutator.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum AmountInput {
    Number(f64),
    Text(String),
}

impl Display for AmountInput {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(value) => write!(f, "{value}"),
            Self::Text(value) => write!(f, "{value}"),
        }
    }
}

impl From<f64> for AmountInput {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for AmountInput {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<&str> for AmountInput {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for AmountInput {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Plain construction input handed over by UI collaborators.
///
/// Every field is optional so that presence checks happen in
/// `Event::validate` rather than at deserialization time.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventInput {
    pub date: Option<DateInput>,
    pub title: Option<String>,
    pub amount: Option<AmountInput>,
    /// Only meaningful for recurring events.
    pub recurs: Option<bool>,
    /// Only meaningful for recurring events.
    pub end_date: Option<DateInput>,
}

impl EventInput {
    /// Creates input with the three required fields set.
    pub fn new(
        date: impl Into<DateInput>,
        title: impl Into<String>,
        amount: impl Into<AmountInput>,
    ) -> Self {
        Self {
            date: Some(date.into()),
            title: Some(title.into()),
            amount: Some(amount.into()),
            recurs: None,
            end_date: None,
        }
    }

    /// Marks the input as describing a recurring event.
    pub fn recurring(mut self) -> Self {
        self.recurs = Some(true);
        self
    }

    /// Sets an explicit recurrence end date.
    pub fn with_end_date(mut self, end_date: impl Into<DateInput>) -> Self {
        self.end_date = Some(end_date.into());
        self
    }
}

/// One validated ledger entry: a date, a trimmed title and a signed amount.
///
/// Positive amounts are credits, negative amounts are debits.
#[derive(Debug, Clone)]
pub struct Event {
    date: Option<DateTime<Utc>>,
    title: String,
    amount: f64,
    id: OnceCell<String>,
}

impl Event {
    /// Validates `input` and builds a fully formed event.
    ///
    /// # Errors
    /// - Returns the first failing `validate` check.
    /// - Returns `InvalidDate`/`InvalidAmount` when a present field does not parse.
    pub fn new(input: &EventInput) -> ValidationResult<Self> {
        Self::validate(input)?;

        let date = input.date.as_ref().ok_or(ValidationError::MissingDate)?;
        let title = input.title.as_deref().ok_or(ValidationError::MissingTitle)?;
        let amount = input.amount.as_ref().ok_or(ValidationError::MissingAmount)?;

        let mut event = Self {
            date: None,
            title: String::new(),
            amount: 0.0,
            id: OnceCell::new(),
        };
        event.set_date(date.clone())?;
        event.set_title(title);
        event.set_amount(amount.clone())?;
        Ok(event)
    }

    /// Rebuilds an event from its persisted record, keeping the stored id.
    ///
    /// A blank persisted id is treated as absent and regenerated lazily.
    pub fn from_record(record: &EventRecord) -> ValidationResult<Self> {
        let mut event = Self::new(&record.to_input())?;
        if !record.id.trim().is_empty() {
            event.id = OnceCell::with_value(record.id.clone());
        }
        Ok(event)
    }

    /// Stateless guard over raw input.
    ///
    /// Checks run in a fixed order and the first failure is reported:
    /// date presence, title presence and non-blankness, amount parseability.
    /// Date parseability is enforced later by `set_date`.
    pub fn validate(input: &EventInput) -> ValidationResult<()> {
        if input.date.is_none() {
            return Err(ValidationError::MissingDate);
        }

        match input.title.as_deref() {
            Some(title) if !title.trim().is_empty() => {}
            _ => return Err(ValidationError::MissingTitle),
        }

        match input.amount.as_ref() {
            None => return Err(ValidationError::MissingAmount),
            Some(amount) if parse_amount(amount).is_none() => {
                return Err(ValidationError::InvalidAmount(amount.to_string()));
            }
            Some(_) => {}
        }

        Ok(())
    }

    /// Returns the stored date, or `None` after a failed `set_date`.
    pub fn date(&self) -> Option<DateTime<Utc>> {
        self.date
    }

    /// Parses and stores a new date.
    ///
    /// # Errors
    /// - Returns `InvalidDate` and clears the stored date when parsing fails.
    pub fn set_date(&mut self, date: impl Into<DateInput>) -> ValidationResult<()> {
        let date = date.into();
        match resolve_date(&date) {
            Some(parsed) => {
                self.date = Some(parsed);
                Ok(())
            }
            None => {
                self.date = None;
                Err(ValidationError::InvalidDate(date.to_string()))
            }
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Stores the title trimmed. Blank titles are only rejected at construction.
    pub fn set_title(&mut self, title: impl AsRef<str>) {
        self.title = title.as_ref().trim().to_string();
    }

    pub fn amount(&self) -> f64 {
        self.amount
    }

    /// Parses and stores a new amount.
    ///
    /// # Errors
    /// - Returns `InvalidAmount` when parsing fails. The stored amount is reset
    ///   to `0.0` in that case, it does not keep its previous value.
    pub fn set_amount(&mut self, amount: impl Into<AmountInput>) -> ValidationResult<()> {
        let amount = amount.into();
        match parse_amount(&amount) {
            Some(parsed) => {
                self.amount = parsed;
                Ok(())
            }
            None => {
                self.amount = 0.0;
                Err(ValidationError::InvalidAmount(amount.to_string()))
            }
        }
    }

    /// Returns the event id, generating and caching it on first read.
    ///
    /// Shape: `<yyyy-MM-dd>_<title slug, max 25 chars><epoch millis>`.
    ///
    /// # Errors
    /// - Returns `MissingDate` when the id was never generated and the date is unset.
    pub fn id(&self) -> ValidationResult<&str> {
        self.id
            .get_or_try_init(|| {
                let date = self.date.ok_or(ValidationError::MissingDate)?;
                Ok(derive_id(date, &self.title, Utc::now().timestamp_millis()))
            })
            .map(String::as_str)
    }

    /// Produces the storage-ready record for this event.
    pub fn to_record(&self) -> ValidationResult<EventRecord> {
        let date = self.date.ok_or(ValidationError::MissingDate)?;
        Ok(EventRecord {
            id: self.id()?.to_string(),
            date: format_iso(date),
            title: self.title.clone(),
            amount: self.amount,
            recurrence: None,
        })
    }
}

/// Builds an id from its parts. Whitespace runs in the title become single
/// dashes before the 25 character cut.
pub(crate) fn derive_id(date: DateTime<Utc>, title: &str, generated_at_ms: i64) -> String {
    let slug = WHITESPACE_RE.replace_all(title, "-");
    let slug = slug.chars().take(ID_TITLE_MAX_CHARS).collect::<String>();
    format!("{}_{}{}", date.format(ID_DATE_FORMAT), slug, generated_at_ms)
}

/// Renders a date the way records store it, e.g. `2024-01-15T00:00:00.000Z`.
pub fn format_iso(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Resolves date input into a UTC date.
///
/// Strings without an offset are read as UTC.
pub fn resolve_date(input: &DateInput) -> Option<DateTime<Utc>> {
    match input {
        DateInput::Value(value) => Some(*value),
        DateInput::Text(text) => parse_date_str(text),
    }
}

fn parse_date_str(value: &str) -> Option<DateTime<Utc>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.with_timezone(&Utc));
    }

    for format in NAIVE_DATE_TIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(parsed.and_utc());
        }
    }

    NaiveDate::parse_from_str(trimmed, ID_DATE_FORMAT)
        .ok()
        .map(|date| date.and_time(chrono::NaiveTime::MIN).and_utc())
}

/// Parses amount input with `parseFloat`-like prefix semantics.
///
/// Leading whitespace is skipped and trailing garbage after a numeric prefix
/// is ignored (`"12.5 USD"` -> `12.5`). Non-finite results are rejected.
pub fn parse_amount(input: &AmountInput) -> Option<f64> {
    let parsed = match input {
        AmountInput::Number(value) => *value,
        AmountInput::Text(text) => {
            let prefix = FLOAT_PREFIX_RE.find(text.trim_start())?;
            prefix.as_str().parse::<f64>().ok()?
        }
    };

    parsed.is_finite().then_some(parsed)
}
