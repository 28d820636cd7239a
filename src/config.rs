//! Extractor configuration.
//!
//! Loaded once (JSON) and turned into an immutable `FieldExtractor`. Every
//! key is optional; an empty object gives the built-in behaviour.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ExtractError, Result};
use crate::patterns::PatternSpec;
use crate::validate::{MAX_FUTURE_DAYS, MIN_DATE_YEAR, MIN_TAX_YEAR};

/// Upper bound for any day count in the config (`max_future_days`,
/// `response_windows`).
pub const MAX_CONFIG_DAYS: i64 = 3660;

/// What to do with an SSN candidate of 5-8 or more than 9 digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnusualSsnPolicy {
    /// Keep the last four digits, flag the record for review.
    #[default]
    AcceptWithWarning,
    /// Treat the candidate as invalid.
    Reject,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    pub min_tax_year: i32,
    pub min_date_year: i32,
    pub max_future_days: i64,
    pub unusual_ssn: UnusualSsnPolicy,
    /// Misread -> canonical, merged over the built-in table.
    pub extra_code_corrections: BTreeMap<String, String>,
    pub extra_letter_types: Vec<String>,
    /// Replaces the built-in patterns of every field it mentions.
    pub patterns: Vec<PatternSpec>,
    /// Response window in days per letter type, merged over the defaults.
    pub response_windows: BTreeMap<String, i64>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            min_tax_year: MIN_TAX_YEAR,
            min_date_year: MIN_DATE_YEAR,
            max_future_days: MAX_FUTURE_DAYS,
            unusual_ssn: UnusualSsnPolicy::default(),
            extra_code_corrections: BTreeMap::new(),
            extra_letter_types: Vec::new(),
            patterns: Vec::new(),
            response_windows: BTreeMap::new(),
        }
    }
}

impl ExtractorConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Reject day counts that date arithmetic cannot use.
    pub fn check_ranges(&self) -> Result<()> {
        let days = std::iter::once(("max_future_days".to_string(), self.max_future_days)).chain(
            self.response_windows
                .iter()
                .map(|(code, days)| (format!("response_windows.{code}"), *days)),
        );
        for (key, value) in days {
            if !(0..=MAX_CONFIG_DAYS).contains(&value) {
                return Err(ExtractError::DaysOutOfRange {
                    key,
                    value,
                    max: MAX_CONFIG_DAYS,
                });
            }
        }
        Ok(())
    }
}
