//! Argument definitions for the `budget-calendar` binary.
//!
//! # Invariants
//! - Parsing is pure; no storage is touched before a command is accepted.
//! - Field validation stays in the core crate. Only rule shape is checked here.

use budget_calendar_core::{Frequency, HydrationPolicy};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "budget-calendar")]
#[command(about = "Track one-off and recurring budget events and their running balance")]
pub struct Cli {
    /// SQLite file holding the event snapshot
    #[arg(
        long,
        global = true,
        env = "BUDGET_CALENDAR_DB",
        default_value = "budget_calendar.sqlite3"
    )]
    pub db: PathBuf,

    /// What to do with invalid persisted entries (fail_fast or skip_invalid)
    #[arg(
        long,
        global = true,
        env = "BUDGET_CALENDAR_HYDRATION",
        default_value = "fail_fast",
        value_parser = parse_hydration
    )]
    pub hydration: HydrationPolicy,

    /// Absolute directory for rolling log files; logging stays off when unset
    #[arg(long, global = true, env = "BUDGET_CALENDAR_LOG_DIR")]
    pub log_dir: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "BUDGET_CALENDAR_LOG_LEVEL")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Subcommand)]
pub enum Command {
    /// List every stored event
    List,
    /// Add a one-off event
    Add {
        /// Event date (YYYY-MM-DD or RFC 3339)
        date: String,
        title: String,
        /// Signed amount; expenses are negative
        #[arg(allow_negative_numbers = true)]
        amount: String,
    },
    /// Add an event that repeats inside a date window
    AddRecurring {
        /// First occurrence (YYYY-MM-DD or RFC 3339)
        date: String,
        title: String,
        /// Signed amount applied on every occurrence
        #[arg(allow_negative_numbers = true)]
        amount: String,
        #[arg(value_enum, ignore_case = true)]
        frequency: FrequencyArg,
        /// Repeat every N frequency units
        #[arg(
            short,
            long,
            default_value_t = 1,
            value_parser = clap::value_parser!(u16).range(1..)
        )]
        interval: u16,
        /// Last day of the window (defaults to one year after the date)
        #[arg(short, long)]
        end_date: Option<String>,
    },
    /// Remove every event with the id
    Remove { id: String },
    /// Print the dates an event falls on
    Occurrences { id: String },
    /// List events falling on a day
    On { date: String },
    /// Print the running balance up to a date
    Balance { date: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FrequencyArg {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl From<FrequencyArg> for Frequency {
    fn from(value: FrequencyArg) -> Self {
        match value {
            FrequencyArg::Daily => Self::Daily,
            FrequencyArg::Weekly => Self::Weekly,
            FrequencyArg::Monthly => Self::Monthly,
            FrequencyArg::Yearly => Self::Yearly,
        }
    }
}

fn parse_hydration(raw: &str) -> Result<HydrationPolicy, String> {
    HydrationPolicy::parse(raw)
        .ok_or_else(|| format!("expected fail_fast or skip_invalid, got `{raw}`"))
}

#[cfg(test)]
mod tests {
    use super::{Cli, Command, FrequencyArg};
    use budget_calendar_core::{Frequency, HydrationPolicy};
    use clap::error::ErrorKind;
    use clap::{CommandFactory, Parser};
    use std::path::Path;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_add_command_with_negative_amount() {
        let cli = Cli::try_parse_from(["budget-calendar", "add", "2024-01-15", "Rent", "-1200.5"])
            .unwrap();

        assert_eq!(
            cli.command,
            Command::Add {
                date: "2024-01-15".to_string(),
                title: "Rent".to_string(),
                amount: "-1200.5".to_string(),
            }
        );
    }

    #[test]
    fn parses_recurring_command_with_options() {
        let cli = Cli::try_parse_from([
            "budget-calendar",
            "add-recurring",
            "2024-01-01",
            "Gym",
            "-40",
            "Monthly",
            "--interval",
            "2",
            "--end-date",
            "2024-12-31",
        ])
        .unwrap();

        assert_eq!(
            cli.command,
            Command::AddRecurring {
                date: "2024-01-01".to_string(),
                title: "Gym".to_string(),
                amount: "-40".to_string(),
                frequency: FrequencyArg::Monthly,
                interval: 2,
                end_date: Some("2024-12-31".to_string()),
            }
        );

        let minimal = Cli::try_parse_from([
            "budget-calendar",
            "add-recurring",
            "2024-01-01",
            "Gym",
            "-40",
            "weekly",
        ])
        .unwrap();
        assert!(matches!(
            minimal.command,
            Command::AddRecurring {
                frequency: FrequencyArg::Weekly,
                interval: 1,
                end_date: None,
                ..
            }
        ));
    }

    #[test]
    fn frequency_names_map_onto_core_frequencies() {
        assert_eq!(Frequency::from(FrequencyArg::Daily), Frequency::Daily);
        assert_eq!(Frequency::from(FrequencyArg::Yearly), Frequency::Yearly);
    }

    #[test]
    fn rejects_bad_frequency_and_interval() {
        let err = Cli::try_parse_from([
            "budget-calendar",
            "add-recurring",
            "2024-01-01",
            "Gym",
            "-40",
            "hourly",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);

        let err = Cli::try_parse_from([
            "budget-calendar",
            "add-recurring",
            "2024-01-01",
            "Gym",
            "-40",
            "weekly",
            "--interval",
            "0",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
    }

    #[test]
    fn global_options_override_defaults() {
        let cli = Cli::try_parse_from([
            "budget-calendar",
            "balance",
            "2024-03-31",
            "--db",
            "/tmp/ledger.sqlite3",
            "--hydration",
            "Skip-Invalid",
        ])
        .unwrap();

        assert_eq!(cli.db, Path::new("/tmp/ledger.sqlite3"));
        assert_eq!(cli.hydration, HydrationPolicy::SkipInvalid);
        assert_eq!(
            cli.command,
            Command::Balance {
                date: "2024-03-31".to_string()
            }
        );
    }

    #[test]
    fn rejects_unknown_hydration_policy() {
        let err = Cli::try_parse_from(["budget-calendar", "--hydration", "retry", "list"])
            .unwrap_err();
        assert!(err.to_string().contains("skip_invalid"));
    }

    #[test]
    fn reports_missing_arguments_and_unknown_commands() {
        assert!(Cli::try_parse_from(["budget-calendar"]).is_err());
        assert_eq!(
            Cli::try_parse_from(["budget-calendar", "remove"])
                .unwrap_err()
                .kind(),
            ErrorKind::MissingRequiredArgument
        );
        assert_eq!(
            Cli::try_parse_from(["budget-calendar", "export"])
                .unwrap_err()
                .kind(),
            ErrorKind::InvalidSubcommand
        );
    }
}
