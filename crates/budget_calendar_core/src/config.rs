//! Store configuration.
//!
//! # Invariants
//! - Defaults reproduce the historical layout: key `events`, fail-fast hydration.

/// Storage key holding the JSON snapshot of all entries.
pub const DEFAULT_STORAGE_KEY: &str = "events";

/// What hydration does with a persisted entry that cannot be rebuilt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HydrationPolicy {
    /// Abort hydration on the first bad entry.
    #[default]
    FailFast,
    /// Log and drop bad entries, keep the rest.
    SkipInvalid,
}

impl HydrationPolicy {
    /// Parses `fail_fast` / `skip_invalid` (case-insensitive, `-` accepted).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "fail_fast" => Some(Self::FailFast),
            "skip_invalid" => Some(Self::SkipInvalid),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::FailFast => "fail_fast",
            Self::SkipInvalid => "skip_invalid",
        }
    }
}

/// Configuration for `EventStore`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub storage_key: String,
    pub hydration: HydrationPolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            hydration: HydrationPolicy::default(),
        }
    }
}

impl StoreConfig {
    pub fn with_storage_key(mut self, storage_key: impl Into<String>) -> Self {
        self.storage_key = storage_key.into();
        self
    }

    pub fn with_hydration(mut self, hydration: HydrationPolicy) -> Self {
        self.hydration = hydration;
        self
    }
}
