//! Command-line host for the budget calendar.
//!
//! # Responsibility
//! - Bootstrap logging and storage once per process, then run one command.
//! - Render amounts through the core currency formatter.

mod command;

use budget_calendar_core::db::{open_db, DbError};
use budget_calendar_core::model::event::{format_iso, resolve_date};
use budget_calendar_core::{
    default_log_level, format_currency, init_logging, CalendarEntry, CurrencyFormatError,
    CurrencyOptions, DateInput, Event, EventInput, EventStore, LedgerEvent, RecurrenceRule,
    RecurringEvent, RepoError, SqliteKeyValueRepository, StoreConfig, StoreError, ValidationError,
};
use chrono::{DateTime, Utc};
use clap::Parser;
use command::{Cli, Command};
use log::{error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::process::ExitCode;

#[derive(Debug)]
enum CliError {
    Db(DbError),
    Repo(RepoError),
    Store(StoreError),
    Format(CurrencyFormatError),
    NotFound(String),
}

impl Display for CliError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "database error: {err}"),
            Self::Repo(err) => write!(f, "storage error: {err}"),
            Self::Store(err) => write!(f, "{err}"),
            Self::Format(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "no event with id `{id}`"),
        }
    }
}

impl Error for CliError {}

impl From<DbError> for CliError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<RepoError> for CliError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<StoreError> for CliError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<CurrencyFormatError> for CliError {
    fn from(value: CurrencyFormatError) -> Self {
        Self::Format(value)
    }
}

impl From<ValidationError> for CliError {
    fn from(value: ValidationError) -> Self {
        Self::Store(StoreError::from(value))
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Some(log_dir) = cli.log_dir.as_deref() {
        let level = cli.log_level.as_deref().unwrap_or(default_log_level());
        if let Err(err) = init_logging(level, log_dir) {
            eprintln!("warning: logging disabled: {err}");
        }
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=cli_run module=cli status=error error={err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config = StoreConfig::default().with_hydration(cli.hydration);

    let conn = open_db(&cli.db)?;
    let repo = SqliteKeyValueRepository::try_new(&conn)?;
    let mut store = EventStore::init(repo, config)?;
    info!(
        "event=cli_run module=cli status=start entries={}",
        store.len()
    );

    match cli.command {
        Command::List => {
            for entry in store.events() {
                println!("{}", describe(entry)?);
            }
        }
        Command::Add {
            date,
            title,
            amount,
        } => {
            let event = Event::new(&EventInput::new(date, title, amount))?;
            println!("{}", store.add_event(event)?);
        }
        Command::AddRecurring {
            date,
            title,
            amount,
            frequency,
            interval,
            end_date,
        } => {
            let mut input = EventInput::new(date, title, amount).recurring();
            if let Some(end_date) = end_date {
                input = input.with_end_date(end_date);
            }
            let rule = RecurrenceRule::every(interval, frequency.into());
            let recurring = RecurringEvent::new(&input, rule)?;
            println!("{}", store.add_event(recurring)?);
        }
        Command::Remove { id } => {
            if store.remove_event(&id)? == 0 {
                return Err(CliError::NotFound(id));
            }
        }
        Command::Occurrences { id } => {
            let entry = store
                .find_event(&id)
                .ok_or_else(|| CliError::NotFound(id.clone()))?;
            for date in entry.occurrences().map_err(StoreError::from)? {
                println!("{}", format_iso(date));
            }
        }
        Command::On { date } => {
            let day = parse_cli_date(&date)?.date_naive();
            for entry in store.events_on(day)? {
                println!("{}", describe(entry)?);
            }
        }
        Command::Balance { date } => {
            let until = parse_cli_date(&date)?;
            println!("{}", render_amount(store.balance_on(until)?)?);
        }
    }

    Ok(())
}

fn parse_cli_date(raw: &str) -> Result<DateTime<Utc>, CliError> {
    let input = DateInput::from(raw);
    resolve_date(&input).ok_or_else(|| ValidationError::InvalidDate(raw.to_string()).into())
}

fn describe(entry: &CalendarEntry) -> Result<String, CliError> {
    let date = entry
        .date()
        .map(|date| date.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "----------".to_string());
    let kind = if entry.is_recurring() {
        "recurring"
    } else {
        "once"
    };
    Ok(format!(
        "{}\t{}\t{}\t{}\t{}",
        entry.id()?,
        date,
        kind,
        render_amount(entry.amount())?,
        entry.title()
    ))
}

fn render_amount(value: f64) -> Result<String, CliError> {
    Ok(format_currency(value, None, &CurrencyOptions::default())?)
}
