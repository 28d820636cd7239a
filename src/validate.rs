//! Acceptance predicates per field.
//!
//! Every value that ends up marked valid on a record has been through
//! [`Validator::check`]. Year and date bounds are computed from the injected
//! clock at call time.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Datelike, NaiveDate, TimeDelta};
use lazy_static::lazy_static;
use regex::Regex;

use crate::clock::{Clock, SystemClock};
use crate::field::{Field, FieldData};

pub const MIN_TAX_YEAR: i32 = 2015;
pub const MIN_DATE_YEAR: i32 = 2015;
pub const MAX_FUTURE_DAYS: i64 = 366;

/// Accepted date layouts, after normalization (commas dropped, single
/// spaces). `%B` also accepts three-letter month abbreviations.
const DATE_FORMATS: &[&str] = &[
    "%B %d %Y",
    "%d %B %Y",
    "%m/%d/%Y",
    "%m-%d-%Y",
    "%m.%d.%Y",
    "%m %d %Y",
    "%Y-%m-%d",
];

lazy_static! {
    static ref KNOWN_LETTER_TYPES: HashSet<&'static str> = {
        let codes = [
            "CP2000", "CP2501", "CP3219", "CP3219A", "CP504", "CP566",
            "CP14", "CP501", "CP503", "CP505", "CP71", "CP71A", "CP90", "CP91", "CP92", "CP297",
            "LTR3172", "LTR11", "LTR1058", "LTR226", "LTR226J",
            "FORM4549", "FORM668", "FORM668A",
        ];
        codes.iter().cloned().collect()
    };

    static ref LETTER_SHAPES: Vec<Regex> = vec![
        Regex::new(r"^CP\d{2,4}[A-Z]?$").unwrap(),
        Regex::new(r"^LTR\d{2,4}[A-Z]?$").unwrap(),
        Regex::new(r"^FORM\d{3,4}[A-Z]?$").unwrap(),
    ];

    static ref REFERENCE_CHARS: Regex = Regex::new(r"^[A-Z0-9\-]+$").unwrap();

    static ref REFERENCE_NOISE: Vec<&'static str> = vec![
        "PAYMENTS", "OAYMENTS", "ENAEEEE", "PLEASE", "PHONE", "EMAIL",
        "ADDRESS", "STREET", "AVENUE", "CONTACT", "VISIT", "WEBSITE",
    ];
}

#[derive(Clone)]
pub struct Validator {
    clock: Arc<dyn Clock>,
    min_tax_year: i32,
    min_date_year: i32,
    max_future_days: i64,
    extra_letter_types: HashSet<String>,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl std::fmt::Debug for Validator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Validator")
            .field("min_tax_year", &self.min_tax_year)
            .field("min_date_year", &self.min_date_year)
            .field("max_future_days", &self.max_future_days)
            .field("extra_letter_types", &self.extra_letter_types)
            .finish_non_exhaustive()
    }
}

impl Validator {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            min_tax_year: MIN_TAX_YEAR,
            min_date_year: MIN_DATE_YEAR,
            max_future_days: MAX_FUTURE_DAYS,
            extra_letter_types: HashSet::new(),
        }
    }

    pub fn with_min_tax_year(mut self, year: i32) -> Self {
        self.min_tax_year = year;
        self
    }

    pub fn with_date_bounds(mut self, min_year: i32, max_future_days: i64) -> Self {
        self.min_date_year = min_year;
        self.max_future_days = max_future_days;
        self
    }

    pub fn with_letter_types<I: IntoIterator<Item = String>>(mut self, codes: I) -> Self {
        self.extra_letter_types
            .extend(codes.into_iter().map(|c| c.to_uppercase()));
        self
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn validate(&self, field: Field, normalized: &str) -> bool {
        self.check(field, normalized).is_some()
    }

    /// The typed value for `normalized` if it is acceptable for `field`.
    pub fn check(&self, field: Field, normalized: &str) -> Option<FieldData> {
        match field {
            Field::TaxYear => self.tax_year(normalized).map(FieldData::Year),
            Field::SsnLast4 => is_last4(normalized).then(|| FieldData::Text(normalized.to_string())),
            Field::LetterType => self
                .is_letter_type(normalized)
                .then(|| FieldData::Text(normalized.to_string())),
            Field::NoticeDate | Field::DueDate => self.date(normalized).map(FieldData::Date),
            Field::NoticeReference => {
                is_notice_reference(normalized).then(|| FieldData::Text(normalized.to_string()))
            }
        }
    }

    /// `min_tax_year <= year <= current year`, where the current year is
    /// read from the clock now.
    pub fn tax_year_in_range(&self, year: i32) -> bool {
        (self.min_tax_year..=self.clock.current_year()).contains(&year)
    }

    fn tax_year(&self, s: &str) -> Option<i32> {
        if s.len() != 4 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let year: i32 = s.parse().ok()?;
        self.tax_year_in_range(year).then_some(year)
    }

    pub fn is_letter_type(&self, code: &str) -> bool {
        KNOWN_LETTER_TYPES.contains(code)
            || self.extra_letter_types.contains(code)
            || LETTER_SHAPES.iter().any(|re| re.is_match(code))
    }

    /// Parse under any accepted layout, then reject dates before
    /// `min_date_year` or more than `max_future_days` past today.
    pub fn date(&self, s: &str) -> Option<NaiveDate> {
        let parsed = DATE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())?;
        let latest = TimeDelta::try_days(self.max_future_days)
            .and_then(|window| self.clock.today().checked_add_signed(window))?;
        (parsed.year() >= self.min_date_year && parsed <= latest).then_some(parsed)
    }
}

fn is_last4(s: &str) -> bool {
    s.len() == 4 && s.bytes().all(|b| b.is_ascii_digit())
}

fn is_notice_reference(s: &str) -> bool {
    if !(6..=20).contains(&s.len()) || !REFERENCE_CHARS.is_match(s) {
        return false;
    }
    if REFERENCE_NOISE.iter().any(|noise| s.contains(noise)) {
        return false;
    }
    if let Some((head, tail)) = s.split_once('-') {
        return !tail.contains('-') && head.len() >= 3 && tail.len() >= 3;
    }
    s.len() >= 5 && s.bytes().all(|b| b.is_ascii_digit())
}
