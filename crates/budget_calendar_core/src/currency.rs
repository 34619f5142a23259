//! Currency formatting for presentation layers that display event amounts.
//!
//! # Invariants
//! - Formatting is pure; no process-wide locale state is read.
//! - Fraction digits never drop below the currency's minor unit exponent.

use iso_currency::Currency;
use num_format::{Locale, ToFormattedString as _};
use std::error::Error;
use std::fmt::{Display, Formatter};

const DEFAULT_LOCALE: &str = "en";
const DEFAULT_CURRENCY: &str = "USD";
const DEFAULT_MINIMUM_FRACTION_DIGITS: usize = 2;

pub type CurrencyResult<T> = Result<T, CurrencyFormatError>;

#[derive(Debug, Clone, PartialEq)]
pub enum CurrencyFormatError {
    UnknownLocale(String),
    UnknownCurrency(String),
    /// NaN, infinities, or a magnitude too large to group.
    OutOfRange(f64),
}

impl Display for CurrencyFormatError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownLocale(name) => write!(f, "unknown locale `{name}`"),
            Self::UnknownCurrency(code) => write!(f, "unknown currency code `{code}`"),
            Self::OutOfRange(value) => write!(f, "amount `{value}` can not be formatted"),
        }
    }
}

impl Error for CurrencyFormatError {}

/// Options for `format_currency`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrencyOptions {
    /// ISO 4217 code, e.g. `USD`.
    pub currency: String,
    pub minimum_fraction_digits: usize,
}

impl Default for CurrencyOptions {
    fn default() -> Self {
        Self {
            currency: DEFAULT_CURRENCY.to_string(),
            minimum_fraction_digits: DEFAULT_MINIMUM_FRACTION_DIGITS,
        }
    }
}

impl CurrencyOptions {
    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    pub fn with_minimum_fraction_digits(mut self, digits: usize) -> Self {
        self.minimum_fraction_digits = digits;
        self
    }
}

/// Formats `value` as a localized currency string, e.g. `-$1,200.50`.
///
/// `locale` defaults to `en`. Region-qualified names (`en-US`, `de_DE`) fall
/// back to their language when the region is not known.
pub fn format_currency(
    value: f64,
    locale: Option<&str>,
    options: &CurrencyOptions,
) -> CurrencyResult<String> {
    if !value.is_finite() {
        return Err(CurrencyFormatError::OutOfRange(value));
    }

    let locale = resolve_locale(locale.unwrap_or(DEFAULT_LOCALE))?;
    let code = options.currency.trim().to_ascii_uppercase();
    let currency = Currency::from_code(&code)
        .ok_or_else(|| CurrencyFormatError::UnknownCurrency(options.currency.clone()))?;

    let exponent = usize::from(currency.exponent().unwrap_or(0));
    let digits = options.minimum_fraction_digits.max(exponent);

    let rounded = format!("{:.digits$}", value.abs());
    let (integer_part, fraction_part) = rounded.split_once('.').unwrap_or((rounded.as_str(), ""));
    let integer = integer_part
        .parse::<u64>()
        .map_err(|_| CurrencyFormatError::OutOfRange(value))?;

    let is_zero = rounded.chars().all(|ch| ch == '0' || ch == '.');
    let mut formatted = String::new();
    if value < 0.0 && !is_zero {
        formatted.push_str(locale.minus_sign());
    }
    formatted.push_str(&currency.symbol().to_string());
    formatted.push_str(&integer.to_formatted_string(&locale));
    if !fraction_part.is_empty() {
        formatted.push_str(locale.decimal());
        formatted.push_str(fraction_part);
    }

    Ok(formatted)
}

fn resolve_locale(name: &str) -> CurrencyResult<Locale> {
    let trimmed = name.trim();
    let dashed = trimmed.replace('_', "-");
    let language = dashed.split('-').next().unwrap_or_default();

    let resolved = [trimmed, dashed.as_str(), language]
        .into_iter()
        .filter(|candidate| !candidate.is_empty())
        .find_map(|candidate| Locale::from_name(candidate).ok())
        .ok_or_else(|| CurrencyFormatError::UnknownLocale(name.to_string()));
    resolved
}
