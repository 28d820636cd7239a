//! Data model shared by every stage of the extraction engine.
//!
//! A `RawInput` goes in, one `FieldValue` per `Field` comes out. A
//! `FieldValue` is only ever built through [`FieldValue::accepted`] (after
//! validation) or [`FieldValue::missing`], so `valid == true` always implies
//! a non-empty value.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One OCR'd notice: the text produced by the OCR collaborator plus the
/// filename it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawInput {
    pub document_text: String,
    pub filename: String,
}

impl RawInput {
    pub fn new(document_text: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            document_text: document_text.into(),
            filename: filename.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    LetterType,
    TaxYear,
    SsnLast4,
    NoticeDate,
    DueDate,
    NoticeReference,
}

impl Field {
    pub const ALL: [Field; 6] = [
        Field::LetterType,
        Field::TaxYear,
        Field::SsnLast4,
        Field::NoticeDate,
        Field::DueDate,
        Field::NoticeReference,
    ];

    /// Fields whose absence sends a record to manual review.
    pub const REQUIRED: [Field; 3] = [Field::TaxYear, Field::SsnLast4, Field::LetterType];

    pub fn is_required(self) -> bool {
        Self::REQUIRED.contains(&self)
    }

    pub fn is_date(self) -> bool {
        matches!(self, Field::NoticeDate | Field::DueDate)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Field::LetterType => "letter_type",
            Field::TaxYear => "tax_year",
            Field::SsnLast4 => "ssn_last4",
            Field::NoticeDate => "notice_date",
            Field::DueDate => "due_date",
            Field::NoticeReference => "notice_reference",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provenance of a field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    DocumentText,
    Filename,
    None,
}

/// A validated, typed field value. Serialize-only: untagged, a date would
/// read back as text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldData {
    Text(String),
    Year(i32),
    Date(NaiveDate),
}

impl FieldData {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldData::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_year(&self) -> Option<i32> {
        match self {
            FieldData::Year(y) => Some(*y),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            FieldData::Date(d) => Some(*d),
            _ => None,
        }
    }
}

impl fmt::Display for FieldData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldData::Text(s) => f.write_str(s),
            FieldData::Year(y) => write!(f, "{y}"),
            // Review sheets show dates the way the notices print them.
            FieldData::Date(d) => write!(f, "{}", d.format("%B %-d, %Y")),
        }
    }
}

/// A single candidate pulled out of the document text or filename, before
/// normalization. Kept for diagnostics only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionAttempt {
    pub field: Field,
    pub raw_match: String,
    pub source: Source,
}

/// Outcome of extracting one field. Not `Deserialize`, so the constructors
/// stay the only way to build one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldValue {
    value: Option<FieldData>,
    valid: bool,
    source: Source,
    flagged: bool,
}

impl FieldValue {
    /// A value that passed the validator.
    pub(crate) fn accepted(value: FieldData, source: Source) -> Self {
        Self {
            value: Some(value),
            valid: true,
            source,
            flagged: false,
        }
    }

    pub fn missing() -> Self {
        Self {
            value: None,
            valid: false,
            source: Source::None,
            flagged: false,
        }
    }

    /// Mark an accepted value as needing a human look (e.g. an odd SSN shape).
    pub(crate) fn flag_for_review(mut self) -> Self {
        self.flagged = true;
        self
    }

    pub fn value(&self) -> Option<&FieldData> {
        if self.valid { self.value.as_ref() } else { None }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn source(&self) -> Source {
        self.source
    }

    pub fn is_flagged(&self) -> bool {
        self.flagged
    }

    pub fn text(&self) -> Option<&str> {
        self.value().and_then(FieldData::as_text)
    }

    pub fn year(&self) -> Option<i32> {
        self.value().and_then(FieldData::as_year)
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.value().and_then(FieldData::as_date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_is_invalid_and_empty() {
        let v = FieldValue::missing();
        assert!(!v.is_valid());
        assert_eq!(v.value(), None);
        assert_eq!(v.source(), Source::None);
    }

    #[test]
    fn accepted_carries_value_and_source() {
        let v = FieldValue::accepted(FieldData::Year(2023), Source::Filename);
        assert!(v.is_valid());
        assert_eq!(v.year(), Some(2023));
        assert_eq!(v.text(), None);
        assert_eq!(v.source(), Source::Filename);
        assert!(!v.is_flagged());
        assert!(v.flag_for_review().is_flagged());
    }

    #[test]
    fn date_displays_as_notice_text() {
        let d = NaiveDate::from_ymd_opt(2024, 7, 5).unwrap();
        assert_eq!(FieldData::Date(d).to_string(), "July 5, 2024");
    }

    #[test]
    fn field_value_serializes_typed_value() {
        let d = NaiveDate::from_ymd_opt(2024, 7, 5).unwrap();
        let json = serde_json::to_value(FieldValue::accepted(FieldData::Date(d), Source::DocumentText)).unwrap();
        assert_eq!(json["value"], "2024-07-05");
        assert_eq!(json["valid"], true);
        assert_eq!(json["source"], "document_text");
        let json = serde_json::to_value(FieldValue::missing()).unwrap();
        assert!(json["value"].is_null());
        assert_eq!(json["valid"], false);
    }

    #[test]
    fn required_fields() {
        assert!(Field::TaxYear.is_required());
        assert!(Field::SsnLast4.is_required());
        assert!(!Field::DueDate.is_required());
        assert!(!Field::NoticeReference.is_required());
    }
}
