//! Per-field extraction: document text first, filename second.
//!
//! For each field the patterns are tried in priority order. A match is
//! normalized and validated; the first valid candidate wins and nothing after
//! it runs, including the filename fallback. Rejected candidates leave a
//! quality issue behind. No path returns a value the validator has not seen.

use std::collections::BTreeMap;
use std::sync::Arc;

use lazy_static::lazy_static;
use rayon::prelude::*;
use regex::Regex;
use tracing::{debug, trace, warn};
use unicode_normalization::UnicodeNormalization;

use crate::clock::{Clock, SystemClock};
use crate::config::{ExtractorConfig, UnusualSsnPolicy};
use crate::corrections::{repair_digits, CorrectionTable};
use crate::error::Result;
use crate::field::{ExtractionAttempt, Field, FieldValue, RawInput, Source};
use crate::filename::{FilenameStrategy, TokenFilenameStrategy};
use crate::names;
use crate::normalize::Normalizer;
use crate::patterns::PatternLibrary;
use crate::record::{CaseRecord, UrgencyMatrix};
use crate::validate::Validator;

lazy_static! {
    /// AUR control and notice reference numbers that sit next to an SSN label
    /// and look like one: `87139-0114`, `87123-45-6789`.
    static ref CONTROL_NUMBER_SHAPES: Vec<Regex> = vec![
        Regex::new(r"^\d{5}-\d{4}$").unwrap(),
        Regex::new(r"^8[789]\d{3}-?\d{2}-?\d{4}$").unwrap(),
    ];
}

/// True if the dash grouping of an SSN candidate is that of a control
/// number rather than an SSN.
fn is_control_number(raw: &str) -> bool {
    let grouping: String = repair_digits(&raw.to_uppercase())
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '-')
        .collect();
    CONTROL_NUMBER_SHAPES.iter().any(|re| re.is_match(&grouping))
}

/// Fold OCR output into a form the patterns expect: NFKC turns fullwidth
/// digits and ligatures into ASCII.
pub fn clean_text(text: &str) -> String {
    text.nfkc().collect()
}

#[derive(Clone)]
pub struct FieldExtractor {
    library: Arc<PatternLibrary>,
    normalizer: Normalizer,
    validator: Validator,
    filename: Arc<dyn FilenameStrategy>,
    unusual_ssn: UnusualSsnPolicy,
    urgency: UrgencyMatrix,
}

impl Default for FieldExtractor {
    fn default() -> Self {
        Self::new(
            PatternLibrary::builtin(),
            Normalizer::default(),
            Validator::new(Arc::new(SystemClock)),
            Arc::new(TokenFilenameStrategy),
        )
    }
}

impl FieldExtractor {
    pub fn new(
        library: Arc<PatternLibrary>,
        normalizer: Normalizer,
        validator: Validator,
        filename: Arc<dyn FilenameStrategy>,
    ) -> Self {
        Self {
            library,
            normalizer,
            validator,
            filename,
            unusual_ssn: UnusualSsnPolicy::default(),
            urgency: UrgencyMatrix::default(),
        }
    }

    /// Build from config. Fails only on broken tables (bad regex, chained
    /// corrections), never on input data.
    pub fn from_config(config: &ExtractorConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.check_ranges()?;
        let library = if config.patterns.is_empty() {
            PatternLibrary::builtin()
        } else {
            Arc::new(PatternLibrary::with_overrides(&config.patterns)?)
        };
        let corrections = CorrectionTable::with_extra(config.extra_code_corrections.clone())?;
        let validator = Validator::new(clock)
            .with_min_tax_year(config.min_tax_year)
            .with_date_bounds(config.min_date_year, config.max_future_days)
            .with_letter_types(config.extra_letter_types.iter().cloned());
        Ok(Self::new(
            library,
            Normalizer::new(corrections),
            validator,
            Arc::new(TokenFilenameStrategy),
        )
        .with_unusual_ssn_policy(config.unusual_ssn)
        .with_urgency_matrix(UrgencyMatrix::default().with_overrides(&config.response_windows)))
    }

    pub fn with_unusual_ssn_policy(mut self, policy: UnusualSsnPolicy) -> Self {
        self.unusual_ssn = policy;
        self
    }

    pub fn with_urgency_matrix(mut self, matrix: UrgencyMatrix) -> Self {
        self.urgency = matrix;
        self
    }

    pub fn with_filename_strategy(mut self, strategy: Arc<dyn FilenameStrategy>) -> Self {
        self.filename = strategy;
        self
    }

    /// Extract every field of one notice and assemble the case record.
    /// Bad input degrades the record; it never fails.
    pub fn extract(&self, input: &RawInput) -> CaseRecord {
        let text = clean_text(&input.document_text);
        let mut issues = Vec::new();
        let fields: BTreeMap<Field, FieldValue> = Field::ALL
            .iter()
            .map(|field| (*field, self.extract_field(*field, &text, &input.filename, &mut issues)))
            .collect();
        let taxpayer_name = self.filename.taxpayer_name(&input.filename);
        let spouse_name = names::spouse_name(&text);
        let record = CaseRecord::assemble(
            &input.filename,
            fields,
            taxpayer_name,
            spouse_name,
            issues,
            &self.urgency,
            self.validator.clock().today(),
        );
        debug!(
            filename = %input.filename,
            confidence = %record.confidence(),
            issues = record.quality_issues().len(),
            "case record assembled"
        );
        if record.is_total_failure() {
            warn!(filename = %input.filename, "no field recovered");
        }
        record
    }

    /// Extract many notices in parallel. Output order matches input order.
    pub fn extract_batch(&self, inputs: &[RawInput]) -> Vec<CaseRecord> {
        inputs.par_iter().map(|input| self.extract(input)).collect()
    }

    /// Extract `field` from already-cleaned `text`, falling back to
    /// `filename`. Diagnostics are appended to `issues`.
    pub fn extract_field(
        &self,
        field: Field,
        text: &str,
        filename: &str,
        issues: &mut Vec<String>,
    ) -> FieldValue {
        for pattern in self.library.patterns_for(field) {
            let Some(raw_match) = pattern.find(text) else {
                continue;
            };
            trace!(%field, pattern = pattern.name(), priority = pattern.priority(), "pattern matched");
            let attempt = ExtractionAttempt {
                field,
                raw_match,
                source: Source::DocumentText,
            };
            if let Some(value) = self.accept(&attempt, issues) {
                debug!(%field, pattern = pattern.name(), "accepted from document text");
                return value;
            }
        }

        if let Some(raw_match) = self.filename.extract(field, filename) {
            let attempt = ExtractionAttempt {
                field,
                raw_match,
                source: Source::Filename,
            };
            if let Some(value) = self.accept(&attempt, issues) {
                debug!(%field, "accepted from filename fallback");
                return value;
            }
        }

        debug!(%field, "no valid value found");
        issues.push(format!("{field}: no valid value in document text or filename"));
        FieldValue::missing()
    }

    /// Normalize and validate one candidate.
    fn accept(&self, attempt: &ExtractionAttempt, issues: &mut Vec<String>) -> Option<FieldValue> {
        let field = attempt.field;
        let normalized = self.normalizer.normalize(field, &attempt.raw_match);
        if field == Field::SsnLast4 {
            return self.accept_ssn(&attempt.raw_match, &normalized, attempt.source, issues);
        }
        match self.validator.check(field, &normalized) {
            Some(data) => Some(FieldValue::accepted(data, attempt.source)),
            None => {
                trace!(%field, normalized = %normalized, "rejected by validator");
                issues.push(format!(
                    "{field} matched '{}' but failed validation",
                    attempt.raw_match
                ));
                None
            }
        }
    }

    /// SSN candidates arrive as digits only. Four digits are taken as-is,
    /// nine are a full SSN, anything else is either refused (fewer than
    /// four) or handled per the unusual-shape policy.
    fn accept_ssn(
        &self,
        raw: &str,
        digits: &str,
        source: Source,
        issues: &mut Vec<String>,
    ) -> Option<FieldValue> {
        if is_control_number(raw) {
            debug!(digits = digits.len(), "SSN candidate has a control-number shape");
            issues.push("ssn_last4 candidate is shaped like an AUR control number; rejected".to_string());
            return None;
        }
        let count = digits.len();
        let (last4, unusual) = match count {
            0..=3 => {
                issues.push(format!(
                    "ssn_last4 candidate has only {count} digits; not guessing"
                ));
                return None;
            }
            4 => (digits, false),
            9 => (&digits[5..], false),
            _ => match self.unusual_ssn {
                UnusualSsnPolicy::AcceptWithWarning => (&digits[count - 4..], true),
                UnusualSsnPolicy::Reject => {
                    issues.push(format!(
                        "ssn_last4 candidate has unusual digit count ({count}); rejected"
                    ));
                    return None;
                }
            },
        };

        let data = match self.validator.check(Field::SsnLast4, last4) {
            Some(data) => data,
            None => {
                issues.push("ssn_last4 candidate failed validation".to_string());
                return None;
            }
        };
        let value = FieldValue::accepted(data, source);
        if unusual {
            warn!(digits = count, "unusual SSN digit count, kept last 4 for review");
            issues.push(format!(
                "unusual SSN digit count ({count}); last 4 kept, needs review"
            ));
            Some(value.flag_for_review())
        } else {
            Some(value)
        }
    }
}
