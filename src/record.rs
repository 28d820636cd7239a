//! Case record assembly: per-field values, taxpayer name, confidence tier
//! and response urgency.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{NaiveDate, TimeDelta};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

use crate::field::{Field, FieldValue, Source};

/// Top-level routing tag for the review sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Confidence::High => "High",
            Confidence::Medium => "Medium",
            Confidence::Low => "Low",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UrgencyLevel {
    Medium,
    High,
    Critical,
}

impl UrgencyLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            UrgencyLevel::Medium => "MEDIUM",
            UrgencyLevel::High => "HIGH",
            UrgencyLevel::Critical => "CRITICAL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UrgencyStatus {
    Overdue,
    Immediate,
    Urgent,
    Pending,
}

impl UrgencyStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            UrgencyStatus::Overdue => "OVERDUE",
            UrgencyStatus::Immediate => "IMMEDIATE",
            UrgencyStatus::Urgent => "URGENT",
            UrgencyStatus::Pending => "PENDING",
        }
    }
}

/// Response window and base level for one letter type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseRule {
    pub days: i64,
    pub level: UrgencyLevel,
}

const DEFAULT_RULE: ResponseRule = ResponseRule {
    days: 30,
    level: UrgencyLevel::Medium,
};

lazy_static! {
    static ref DEFAULT_RULES: Vec<(&'static str, ResponseRule)> = vec![
        ("CP2000", ResponseRule { days: 30, level: UrgencyLevel::High }),
        ("CP3219", ResponseRule { days: 90, level: UrgencyLevel::Critical }),
        ("CP504", ResponseRule { days: 10, level: UrgencyLevel::Critical }),
        ("LTR11", ResponseRule { days: 30, level: UrgencyLevel::High }),
        ("LTR1058", ResponseRule { days: 30, level: UrgencyLevel::Critical }),
    ];

    static ref MISSING: FieldValue = FieldValue::missing();
}

/// Letter type -> response rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrgencyMatrix {
    rules: BTreeMap<String, ResponseRule>,
}

impl Default for UrgencyMatrix {
    fn default() -> Self {
        let rules = DEFAULT_RULES
            .iter()
            .map(|(code, rule)| (code.to_string(), *rule))
            .collect();
        Self { rules }
    }
}

impl UrgencyMatrix {
    /// Replace the response window for the given codes. Unknown codes get
    /// the default level.
    pub fn with_overrides(mut self, windows: &BTreeMap<String, i64>) -> Self {
        for (code, days) in windows {
            self.rules
                .entry(code.to_uppercase())
                .and_modify(|rule| rule.days = *days)
                .or_insert(ResponseRule {
                    days: *days,
                    level: DEFAULT_RULE.level,
                });
        }
        self
    }

    /// Rule for `letter_type`. A variant suffix falls back to its base code
    /// (CP3219A -> CP3219).
    pub fn rule_for(&self, letter_type: &str) -> ResponseRule {
        if let Some(rule) = self.rules.get(letter_type) {
            return *rule;
        }
        let base = letter_type.trim_end_matches(|c: char| c.is_ascii_alphabetic());
        if base.len() < letter_type.len() {
            if let Some(rule) = self.rules.get(base) {
                return *rule;
            }
        }
        DEFAULT_RULE
    }
}

/// How soon the taxpayer has to answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Urgency {
    pub level: UrgencyLevel,
    pub status: UrgencyStatus,
    pub response_due: NaiveDate,
    pub days_remaining: i64,
    pub response_days: i64,
}

impl Urgency {
    /// `None` when there is neither a due date nor a notice date to count
    /// from. A printed due date beats the computed one.
    pub fn assess(
        matrix: &UrgencyMatrix,
        letter_type: Option<&str>,
        notice_date: Option<NaiveDate>,
        due_date: Option<NaiveDate>,
        today: NaiveDate,
    ) -> Option<Self> {
        let rule = letter_type.map_or(DEFAULT_RULE, |code| matrix.rule_for(code));
        let response_due = match (due_date, notice_date) {
            (Some(due), _) => due,
            (None, Some(notice)) => {
                notice.checked_add_signed(TimeDelta::try_days(rule.days)?)?
            }
            (None, None) => return None,
        };
        let days_remaining = (response_due - today).num_days();
        let (status, level) = match days_remaining {
            d if d < 0 => (UrgencyStatus::Overdue, UrgencyLevel::Critical),
            d if d <= 7 => (UrgencyStatus::Immediate, UrgencyLevel::Critical),
            d if d <= 14 => (UrgencyStatus::Urgent, UrgencyLevel::High),
            _ => (UrgencyStatus::Pending, rule.level),
        };
        Some(Self {
            level,
            status,
            response_due,
            days_remaining,
            response_days: rule.days,
        })
    }
}

/// One assembled notice. Built once by the extractor and never changed.
/// Serialize-only: a record is produced by extraction, never read back.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseRecord {
    filename: String,
    fields: BTreeMap<Field, FieldValue>,
    taxpayer_name: Option<String>,
    spouse_name: Option<String>,
    quality_issues: Vec<String>,
    confidence: Confidence,
    completeness: f64,
    needs_review: bool,
    urgency: Option<Urgency>,
}

impl CaseRecord {
    pub(crate) fn assemble(
        filename: &str,
        fields: BTreeMap<Field, FieldValue>,
        taxpayer_name: Option<String>,
        spouse_name: Option<String>,
        quality_issues: Vec<String>,
        matrix: &UrgencyMatrix,
        today: NaiveDate,
    ) -> Self {
        let mut record = Self {
            filename: filename.to_string(),
            fields,
            taxpayer_name,
            spouse_name,
            quality_issues,
            confidence: Confidence::Low,
            completeness: 0.0,
            needs_review: true,
            urgency: None,
        };
        record.confidence = record.rate();
        record.completeness = record.completeness_ratio();
        if record.taxpayer_name.is_none() {
            record.quality_issues.push("taxpayer_name: not found in filename".to_string());
        }
        if record.is_total_failure() {
            record.quality_issues.push("no field could be extracted".to_string());
        }
        record.needs_review = record.confidence == Confidence::Low || !record.quality_issues.is_empty();
        record.urgency = Urgency::assess(
            matrix,
            record.field(Field::LetterType).text(),
            record.field(Field::NoticeDate).date(),
            record.field(Field::DueDate).date(),
            today,
        );
        record
    }

    fn rate(&self) -> Confidence {
        let required: Vec<&FieldValue> = Field::REQUIRED.iter().map(|f| self.field(*f)).collect();
        let flagged = self.fields.values().any(FieldValue::is_flagged);
        if flagged || required.iter().any(|v| !v.is_valid()) {
            Confidence::Low
        } else if required.iter().any(|v| v.source() == Source::Filename) {
            Confidence::Medium
        } else {
            Confidence::High
        }
    }

    /// Share of the five fields a reviewer needs to open a case: name,
    /// SSN last-4, letter type, notice date, tax year.
    fn completeness_ratio(&self) -> f64 {
        let present = [
            self.taxpayer_name.is_some(),
            self.field(Field::SsnLast4).is_valid(),
            self.field(Field::LetterType).is_valid(),
            self.field(Field::NoticeDate).is_valid(),
            self.field(Field::TaxYear).is_valid(),
        ];
        present.iter().filter(|p| **p).count() as f64 / present.len() as f64
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn field(&self, field: Field) -> &FieldValue {
        self.fields.get(&field).unwrap_or(&MISSING)
    }

    pub fn fields(&self) -> impl Iterator<Item = (Field, &FieldValue)> {
        self.fields.iter().map(|(f, v)| (*f, v))
    }

    pub fn taxpayer_name(&self) -> Option<&str> {
        self.taxpayer_name.as_deref()
    }

    /// Spouse on a joint return, when the notice names one.
    pub fn spouse_name(&self) -> Option<&str> {
        self.spouse_name.as_deref()
    }

    pub fn quality_issues(&self) -> &[String] {
        &self.quality_issues
    }

    pub fn confidence(&self) -> Confidence {
        self.confidence
    }

    pub fn completeness(&self) -> f64 {
        self.completeness
    }

    pub fn needs_review(&self) -> bool {
        self.needs_review
    }

    pub fn urgency(&self) -> Option<&Urgency> {
        self.urgency.as_ref()
    }

    /// No field recovered from either source.
    pub fn is_total_failure(&self) -> bool {
        Field::ALL.iter().all(|f| !self.field(*f).is_valid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldData;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn text(s: &str, source: Source) -> FieldValue {
        FieldValue::accepted(FieldData::Text(s.to_string()), source)
    }

    fn complete(year_source: Source) -> BTreeMap<Field, FieldValue> {
        let mut fields: BTreeMap<Field, FieldValue> =
            Field::ALL.iter().map(|f| (*f, FieldValue::missing())).collect();
        fields.insert(Field::LetterType, text("CP2000", Source::DocumentText));
        fields.insert(Field::SsnLast4, text("4321", Source::DocumentText));
        fields.insert(Field::TaxYear, FieldValue::accepted(FieldData::Year(2023), year_source));
        fields.insert(
            Field::NoticeDate,
            FieldValue::accepted(FieldData::Date(day(2025, 5, 1)), Source::DocumentText),
        );
        fields
    }

    fn assemble(fields: BTreeMap<Field, FieldValue>, issues: Vec<String>) -> CaseRecord {
        CaseRecord::assemble(
            "CP2000_2023_DTD 05.01.2025_SMITH.pdf",
            fields,
            Some("Smith".to_string()),
            None,
            issues,
            &UrgencyMatrix::default(),
            day(2025, 5, 10),
        )
    }

    #[test]
    fn all_required_from_text_is_high() {
        let r = assemble(complete(Source::DocumentText), vec![]);
        assert_eq!(r.confidence(), Confidence::High);
        assert!(!r.needs_review());
        assert_eq!(r.completeness(), 1.0);
    }

    #[test]
    fn missing_taxpayer_name_routes_to_review() {
        let r = CaseRecord::assemble(
            "scan0001.pdf",
            complete(Source::DocumentText),
            None,
            None,
            vec![],
            &UrgencyMatrix::default(),
            day(2025, 5, 10),
        );
        assert_eq!(r.taxpayer_name(), None);
        assert_eq!(r.quality_issues(), ["taxpayer_name: not found in filename".to_string()]);
        assert!(r.needs_review());
        assert_eq!(r.completeness(), 0.8);
    }

    #[test]
    fn spouse_name_is_carried() {
        let r = CaseRecord::assemble(
            "CP2000_2023_DTD 05.01.2025_SMITH.pdf",
            complete(Source::DocumentText),
            Some("Smith".to_string()),
            Some("Jane Smith".to_string()),
            vec![],
            &UrgencyMatrix::default(),
            day(2025, 5, 10),
        );
        assert_eq!(r.spouse_name(), Some("Jane Smith"));
        assert_eq!(r.completeness(), 1.0);
        assert_eq!(serde_json::to_value(&r).unwrap()["spouse_name"], "Jane Smith");
    }

    #[test]
    fn filename_fallback_is_medium() {
        let r = assemble(complete(Source::Filename), vec![]);
        assert_eq!(r.confidence(), Confidence::Medium);
    }

    #[test]
    fn missing_required_is_low() {
        let mut fields = complete(Source::DocumentText);
        fields.insert(Field::SsnLast4, FieldValue::missing());
        let r = assemble(fields, vec!["ssn_last4: no valid value in document text or filename".into()]);
        assert_eq!(r.confidence(), Confidence::Low);
        assert!(r.needs_review());
        assert_eq!(r.completeness(), 0.8);
    }

    #[test]
    fn flagged_ssn_is_low() {
        let mut fields = complete(Source::DocumentText);
        fields.insert(Field::SsnLast4, text("7890", Source::DocumentText).flag_for_review());
        let r = assemble(fields, vec!["unusual SSN digit count (10); last 4 kept, needs review".into()]);
        assert_eq!(r.confidence(), Confidence::Low);
        assert_eq!(r.field(Field::SsnLast4).text(), Some("7890"));
    }

    #[test]
    fn total_failure_still_yields_a_record() {
        let fields = Field::ALL.iter().map(|f| (*f, FieldValue::missing())).collect();
        let r = CaseRecord::assemble("scan.pdf", fields, None, None, vec![], &UrgencyMatrix::default(), day(2025, 1, 1));
        assert!(r.is_total_failure());
        assert_eq!(r.confidence(), Confidence::Low);
        assert!(!r.quality_issues().is_empty());
        assert!(r.needs_review());
        assert_eq!(r.completeness(), 0.0);
        assert!(r.urgency().is_none());
        assert!(r.fields().all(|(_, v)| !v.is_valid()));
    }

    #[test]
    fn urgency_counts_from_notice_date() {
        // CP2000: 30 days from May 1 is May 31; 21 days left on May 10.
        let r = assemble(complete(Source::DocumentText), vec![]);
        let u = r.urgency().unwrap();
        assert_eq!(u.response_due, day(2025, 5, 31));
        assert_eq!(u.days_remaining, 21);
        assert_eq!(u.status, UrgencyStatus::Pending);
        assert_eq!(u.level, UrgencyLevel::High);
        assert!(!r.field(Field::DueDate).is_valid());
    }

    #[test]
    fn printed_due_date_wins() {
        let mut fields = complete(Source::DocumentText);
        fields.insert(
            Field::DueDate,
            FieldValue::accepted(FieldData::Date(day(2025, 5, 15)), Source::DocumentText),
        );
        let u = *assemble(fields, vec![]).urgency().unwrap();
        assert_eq!(u.response_due, day(2025, 5, 15));
        assert_eq!(u.status, UrgencyStatus::Immediate);
        assert_eq!(u.level, UrgencyLevel::Critical);
    }

    #[test]
    fn urgency_status_bands() {
        let m = UrgencyMatrix::default();
        let today = day(2025, 6, 1);
        let status = |due: NaiveDate| Urgency::assess(&m, Some("CP2000"), None, Some(due), today).unwrap();
        assert_eq!(status(day(2025, 5, 31)).status, UrgencyStatus::Overdue);
        assert_eq!(status(day(2025, 6, 8)).status, UrgencyStatus::Immediate);
        assert_eq!(status(day(2025, 6, 15)).status, UrgencyStatus::Urgent);
        assert_eq!(status(day(2025, 6, 16)).status, UrgencyStatus::Pending);
        assert_eq!(Urgency::assess(&m, Some("CP2000"), None, None, today), None);
    }

    #[test]
    fn unrepresentable_window_gives_no_urgency() {
        let windows = BTreeMap::from([("CP2000".to_string(), i64::MAX)]);
        let m = UrgencyMatrix::default().with_overrides(&windows);
        let u = Urgency::assess(&m, Some("CP2000"), Some(day(2025, 5, 1)), None, day(2025, 5, 10));
        assert_eq!(u, None);
    }

    #[test]
    fn matrix_lookup_and_overrides() {
        let m = UrgencyMatrix::default();
        assert_eq!(m.rule_for("CP504").days, 10);
        assert_eq!(m.rule_for("CP3219A").level, UrgencyLevel::Critical);
        assert_eq!(m.rule_for("CP14"), DEFAULT_RULE);

        let windows = BTreeMap::from([("cp2000".to_string(), 60), ("CP14".to_string(), 21)]);
        let m = m.with_overrides(&windows);
        assert_eq!(m.rule_for("CP2000"), ResponseRule { days: 60, level: UrgencyLevel::High });
        assert_eq!(m.rule_for("CP14").days, 21);
    }

    #[test]
    fn record_serializes_with_field_names() {
        let r = assemble(complete(Source::DocumentText), vec![]);
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["fields"]["letter_type"]["value"], "CP2000");
        assert_eq!(json["fields"]["tax_year"]["source"], "document_text");
        assert_eq!(json["confidence"], "High");
        assert_eq!(json["urgency"]["status"], "PENDING");
        assert_eq!(json["urgency"]["status"], UrgencyStatus::Pending.as_str());
        assert_eq!(json["urgency"]["level"], UrgencyLevel::High.as_str());
    }
}
