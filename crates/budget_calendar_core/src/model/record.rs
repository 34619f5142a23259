//! Storage-ready record shapes.
//!
//! # Invariants
//! - `date` fields hold ISO-8601 strings with millisecond precision and `Z`.
//! - Records are the only shape written to or read from durable storage.

use crate::model::event::{AmountInput, DateInput, EventInput};
use crate::model::recurring::RecurrenceRule;
use serde::{Deserialize, Serialize};

/// Persisted form of one calendar entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Missing ids are regenerated on hydration.
    #[serde(default)]
    pub id: String,
    pub date: String,
    pub title: String,
    pub amount: f64,
    /// Present only for recurring entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<RecurrenceRecord>,
}

/// Persisted recurrence window and rule of a recurring entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurrenceRecord {
    pub recurs: bool,
    pub start: String,
    pub end: String,
    /// Explicit end date set through `set_end_date`, when any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(default)]
    pub rule: RecurrenceRule,
}

impl EventRecord {
    /// Converts the record back into constructor input.
    pub fn to_input(&self) -> EventInput {
        let mut input = EventInput::new(
            DateInput::Text(self.date.clone()),
            self.title.clone(),
            AmountInput::Number(self.amount),
        );
        if let Some(recurrence) = &self.recurrence {
            input.recurs = Some(recurrence.recurs);
            input.end_date = Some(DateInput::Text(recurrence.end.clone()));
        }
        input
    }
}
