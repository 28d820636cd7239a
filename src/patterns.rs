//! Priority-ordered extraction patterns.
//!
//! Each field owns a list of patterns sorted most-specific-first. The
//! extractor scans the list in order and stops at the first pattern whose
//! candidate survives validation, so a generic shape placed early would
//! shadow every specific code after it. Order here is load-bearing.

use std::collections::HashMap;
use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{ExtractError, Result};
use crate::field::Field;

/// Month names as they appear on notices, full or abbreviated.
const MONTH: &str = r"(?:Jan(?:uary)?|Feb(?:ruary)?|Mar(?:ch)?|Apr(?:il)?|May|June?|July?|Aug(?:ust)?|Sep(?:t(?:ember)?)?|Oct(?:ober)?|Nov(?:ember)?|Dec(?:ember)?)\.?";

/// How a pattern's match is turned into a raw candidate string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capture {
    /// The text of one capture group.
    Group(usize),
    /// Every participating capture group, space-separated.
    Joined,
}

impl Default for Capture {
    fn default() -> Self {
        Capture::Group(1)
    }
}

/// Serializable description of a pattern, as written in config files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternSpec {
    pub field: Field,
    pub name: String,
    pub regex: String,
    #[serde(default)]
    pub capture: Capture,
    /// Only search the first `window` characters of the text.
    #[serde(default)]
    pub window: Option<usize>,
}

impl PatternSpec {
    pub fn new(field: Field, name: &str, regex: impl Into<String>) -> Self {
        Self {
            field,
            name: name.to_string(),
            regex: regex.into(),
            capture: Capture::Group(1),
            window: None,
        }
    }

    pub fn joined(mut self) -> Self {
        self.capture = Capture::Joined;
        self
    }

    pub fn within(mut self, window: usize) -> Self {
        self.window = Some(window);
        self
    }
}

/// A compiled extraction pattern.
#[derive(Debug, Clone)]
pub struct Pattern {
    field: Field,
    name: String,
    priority: usize,
    regex: Regex,
    capture: Capture,
    window: Option<usize>,
}

impl Pattern {
    /// Compile `spec`. `priority` is its rank within the field, 0 = first.
    pub fn compile(spec: &PatternSpec, priority: usize) -> Result<Self> {
        let regex = Regex::new(&spec.regex).map_err(|source| ExtractError::InvalidPattern {
            field: spec.field,
            name: spec.name.clone(),
            source,
        })?;
        let groups = regex.captures_len() - 1;
        let needed = match spec.capture {
            Capture::Group(n) => n,
            Capture::Joined => 1,
        };
        if needed == 0 || needed > groups {
            return Err(ExtractError::MissingCaptureGroup {
                field: spec.field,
                name: spec.name.clone(),
                group: needed,
            });
        }
        Ok(Self {
            field: spec.field,
            name: spec.name.clone(),
            priority,
            regex,
            capture: spec.capture,
            window: spec.window,
        })
    }

    pub fn field(&self) -> Field {
        self.field
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority(&self) -> usize {
        self.priority
    }

    /// First match in `text` (leftmost within the search window), as a raw
    /// candidate string.
    pub fn find(&self, text: &str) -> Option<String> {
        let haystack = match self.window {
            Some(n) => head_chars(text, n),
            None => text,
        };
        self.regex.captures_iter(haystack).find_map(|caps| match self.capture {
            Capture::Group(n) => caps
                .get(n)
                .map(|m| m.as_str().trim().to_string())
                .filter(|s| !s.is_empty()),
            Capture::Joined => {
                let parts: Vec<&str> = caps
                    .iter()
                    .skip(1)
                    .flatten()
                    .map(|m| m.as_str().trim())
                    .filter(|s| !s.is_empty())
                    .collect();
                if parts.is_empty() {
                    None
                } else {
                    Some(parts.join(" "))
                }
            }
        })
    }
}

/// First `n` characters of `text`, cut on a char boundary.
fn head_chars(text: &str, n: usize) -> &str {
    match text.char_indices().nth(n) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Per-field ordered pattern lists.
#[derive(Debug, Clone)]
pub struct PatternLibrary {
    by_field: HashMap<Field, Vec<Pattern>>,
}

impl PatternLibrary {
    /// Compile a library. Within a field, priority follows the order the
    /// specs are given in. Every field must end up with at least one pattern.
    pub fn from_specs(specs: &[PatternSpec]) -> Result<Self> {
        let mut by_field: HashMap<Field, Vec<Pattern>> = HashMap::new();
        for spec in specs {
            let list = by_field.entry(spec.field).or_default();
            let pattern = Pattern::compile(spec, list.len())?;
            list.push(pattern);
        }
        for field in Field::ALL {
            if by_field.get(&field).is_none_or(Vec::is_empty) {
                return Err(ExtractError::MissingPatterns(field));
            }
        }
        Ok(Self { by_field })
    }

    /// The built-in library.
    pub fn builtin() -> Arc<PatternLibrary> {
        Arc::clone(&DEFAULT_LIBRARY)
    }

    /// The built-in specs with every field named in `overrides` replaced by
    /// the override list for that field.
    pub fn with_overrides(overrides: &[PatternSpec]) -> Result<Self> {
        if overrides.is_empty() {
            return Ok(PatternLibrary::clone(&DEFAULT_LIBRARY));
        }
        let mut specs: Vec<PatternSpec> = DEFAULT_SPECS
            .iter()
            .filter(|s| !overrides.iter().any(|o| o.field == s.field))
            .cloned()
            .collect();
        specs.extend(overrides.iter().cloned());
        Self::from_specs(&specs)
    }

    /// Patterns for `field`, highest priority first.
    pub fn patterns_for(&self, field: Field) -> &[Pattern] {
        self.by_field.get(&field).map(Vec::as_slice).unwrap_or(&[])
    }
}

fn date_text() -> String {
    format!(r"({}\s+\d{{1,2}},?\s+\d{{4}})", MONTH)
}

fn date_numeric() -> &'static str {
    r"(\d{1,2}[/\-.]\d{1,2}[/\-.]\d{4}|\d{4}-\d{1,2}-\d{1,2})"
}

lazy_static! {
    /// Built-in patterns. Within each field: labeled or exact forms first,
    /// generic shapes last.
    pub static ref DEFAULT_SPECS: Vec<PatternSpec> = {
        use Field::*;
        let due_label = r"(?:respond\s+by|response\s+due(?:\s+date)?|reply\s+by|pay(?:ment)?\s+(?:due\s+)?by|hear\s+from\s+you\s+by|amount\s+due\s+by|due\s+date)";
        let notice_label = r"(?:Notice\s+date|Date\s+of\s+this\s+notice|Date\s+issued|Letter\s+date)";
        vec![
            // Letter type: exact known codes
            PatternSpec::new(LetterType, "cp2000_in_context", r"(?i)(?:Notice|Letter|Form)\s+(CP\s*2000)\b"),
            PatternSpec::new(LetterType, "cp2000", r"(?i)\b(CP\s*2000)\b"),
            PatternSpec::new(LetterType, "cp2501", r"(?i)\b(CP\s*2501)\b"),
            PatternSpec::new(LetterType, "cp3219", r"(?i)\b(CP\s*3219[A-Z]?)\b"),
            PatternSpec::new(LetterType, "cp504", r"(?i)\b(CP\s*504)\b"),
            PatternSpec::new(LetterType, "cp566", r"(?i)\b(CP\s*566)\b"),
            PatternSpec::new(LetterType, "cp14", r"(?i)\b(CP\s*14)\b"),
            PatternSpec::new(LetterType, "cp501", r"(?i)\b(CP\s*501)\b"),
            PatternSpec::new(LetterType, "cp503", r"(?i)\b(CP\s*503)\b"),
            PatternSpec::new(LetterType, "cp505", r"(?i)\b(CP\s*505)\b"),
            PatternSpec::new(LetterType, "cp71", r"(?i)\b(CP\s*71[A-Z]?)\b"),
            PatternSpec::new(LetterType, "cp90", r"(?i)\b(CP\s*9[012])\b"),
            PatternSpec::new(LetterType, "cp297", r"(?i)\b(CP\s*297)\b"),
            PatternSpec::new(LetterType, "ltr3172", r"(?i)\b(LTR\s*3172)\b"),
            PatternSpec::new(LetterType, "ltr11", r"(?i)\b(LTR?\s*11)\b"),
            PatternSpec::new(LetterType, "ltr1058", r"(?i)\b(LTR?\s*1058)\b"),
            PatternSpec::new(LetterType, "ltr226", r"(?i)\b(LTR\s*226J?)\b"),
            PatternSpec::new(LetterType, "form4549", r"(?i)\b(FORM\s*4549)\b"),
            PatternSpec::new(LetterType, "form668", r"(?i)\b(FORM\s*668[A-Z]?)\b"),
            // Letter type: generic shapes
            PatternSpec::new(LetterType, "any_cp", r"(?i)\b(CP\s*\d{3,4})\b"),
            PatternSpec::new(LetterType, "any_ltr", r"(?i)\b(LTR?\s*\d{4})\b"),
            PatternSpec::new(LetterType, "hyphenated_cp", r"(?i)\b(CP-\d{4})\b"),
            PatternSpec::new(LetterType, "ocr_cp", r"(?i)\b(CP\s*[0-9OZ]{4})\b"),

            // Tax year
            PatternSpec::new(TaxYear, "labeled", r"(?i)(?:Tax\s+year|Tax\s+period|Year)[:\s]+(2[0O][0-9O]{2})\b"),
            PatternSpec::new(TaxYear, "return_for", r"(?i)Return\s+for[:\s]+(?:tax\s+year\s+)?(2[0O][0-9O]{2})\b"),
            PatternSpec::new(TaxYear, "year_before_return", r"(?i)\b(20\d{2})\s*(?:tax|return)"),
            PatternSpec::new(TaxYear, "form_1040", r"(?i)Form\s+1040[^\n]{0,40}?\b(20\d{2})\b"),

            // SSN
            // Spaced form first: the dash-aware labeled pattern would stop at the
            // first space and report a three-digit candidate.
            PatternSpec::new(SsnLast4, "labeled_spaced", r"(?i)(?:Social\s+Security(?:\s+number)?|SSN)[:\s#]*(\d{3}\s\d{2}\s\d{4})\b"),
            PatternSpec::new(SsnLast4, "labeled", r"(?i)\b(?:Social\s+Security\s+number|SSN|Taxpayer\s+identification\s+number)[:\s#]*(\d[0-9OIL]*(?:-[0-9OIL]+){0,3})"),
            PatternSpec::new(SsnLast4, "masked", r"(?i)(?:XXX|\*{3})[\s-]?(?:XX|\*{2})[\s-]?(\d{4})\b"),
            PatternSpec::new(SsnLast4, "last_four", r"(?i)(?:ending\s+in|last\s+four(?:\s+digits)?(?:\s+of\s+your\s+SSN)?)[:\s]*(\d{4})\b"),
            PatternSpec::new(SsnLast4, "near_label", r"(?i)(?:Social\s+Security|SSN)[\s\S]{0,40}?\b(\d{3}-\d{2}-\d{4})\b"),
            PatternSpec::new(SsnLast4, "dashed", r"\b(\d{3}-\d{2}-\d{4})\b"),
            PatternSpec::new(SsnLast4, "flexible", r"\b(\d{3})[\s-](\d{2})[\s-](\d{4})\b").joined(),

            // Notice date
            PatternSpec::new(NoticeDate, "labeled", format!(r"(?i){notice_label}[:\s]+{}", date_text())),
            PatternSpec::new(NoticeDate, "labeled_numeric", format!(r"(?i){notice_label}[:\s]+{}", date_numeric())),
            PatternSpec::new(NoticeDate, "date_label", format!(r"(?i)\bDate[:\s]+{}", date_text())).within(800),
            PatternSpec::new(NoticeDate, "header_text", format!(r"(?i)\b{}", date_text())).within(1000),
            PatternSpec::new(NoticeDate, "header_numeric", format!(r"\b{}", date_numeric())).within(1000),

            // Due date
            PatternSpec::new(DueDate, "labeled", format!(r"(?i){due_label}[:\s]+{}", date_text())),
            PatternSpec::new(DueDate, "labeled_numeric", format!(r"(?i){due_label}[:\s]+{}", date_numeric())),

            // Notice reference
            PatternSpec::new(NoticeReference, "notice_number", r"(?i)(?:Notice\s+number|Notice\s+#)[:\s]+([A-Z0-9]{6,15}-[A-Z0-9]{4,8})"),
            PatternSpec::new(NoticeReference, "reference_number", r"(?i)(?:Reference\s+number|Ref\s+#)[:\s]+([A-Z0-9]{8,15})"),
            PatternSpec::new(NoticeReference, "control_number", r"(?i)Control\s+number[:\s]+([A-Z0-9]{6,15})"),
            PatternSpec::new(NoticeReference, "document_id", r"(?i)Document\s+ID[:\s]+([A-Z0-9]{8,15})"),
            PatternSpec::new(NoticeReference, "zip_style", r"\b([A-Z]{2}\d{4,6}-\d{4})\b"),
            PatternSpec::new(NoticeReference, "aur_control", r"\b(\d{5,6}-\d{4})\b"),
        ]
    };

    static ref DEFAULT_LIBRARY: Arc<PatternLibrary> =
        Arc::new(PatternLibrary::from_specs(&DEFAULT_SPECS).unwrap());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_hit(field: Field, text: &str) -> Option<(String, String)> {
        let lib = PatternLibrary::builtin();
        lib.patterns_for(field)
            .iter()
            .find_map(|p| p.find(text).map(|m| (p.name().to_string(), m)))
    }

    #[test]
    fn builtin_library_covers_every_field() {
        let lib = PatternLibrary::builtin();
        for field in Field::ALL {
            assert!(!lib.patterns_for(field).is_empty(), "{field} has no patterns");
        }
    }

    #[test]
    fn priorities_follow_declaration_order() {
        let lib = PatternLibrary::builtin();
        let pats = lib.patterns_for(Field::LetterType);
        for (i, p) in pats.iter().enumerate() {
            assert_eq!(p.priority(), i);
            assert_eq!(p.field(), Field::LetterType);
        }
        assert_eq!(pats[0].name(), "cp2000_in_context");
        assert_eq!(pats.last().unwrap().name(), "ocr_cp");
    }

    #[test]
    fn specific_code_beats_earlier_generic_match() {
        // The generic CP9999 appears first in the text, but the CP2000
        // pattern ranks higher and must win.
        let text = "Ref CP9999 ... Notice CP 2000 proposed changes";
        let (name, hit) = first_hit(Field::LetterType, text).unwrap();
        assert_eq!(name, "cp2000_in_context");
        assert_eq!(hit, "CP 2000");
    }

    #[test]
    fn generic_shape_catches_ocr_misread() {
        let (name, hit) = first_hit(Field::LetterType, "Notice CP7000 Tax Year 2022").unwrap();
        assert_eq!(name, "any_cp");
        assert_eq!(hit, "CP7000");
    }

    #[test]
    fn joined_capture_concatenates_groups() {
        let (name, hit) = first_hit(Field::SsnLast4, "id 123 45 6789 end").unwrap();
        assert_eq!(name, "flexible");
        assert_eq!(hit, "123 45 6789");
    }

    #[test]
    fn spaced_ssn_is_taken_whole() {
        let (name, hit) = first_hit(Field::SsnLast4, "Social Security number 987 65 4321").unwrap();
        assert_eq!(name, "labeled_spaced");
        assert_eq!(hit, "987 65 4321");
    }

    #[test]
    fn window_limits_search() {
        let lib = PatternLibrary::builtin();
        let header = lib
            .patterns_for(Field::NoticeDate)
            .iter()
            .find(|p| p.name() == "header_text")
            .unwrap();
        let near = format!("{}March 3, 2024", " ".repeat(10));
        let far = format!("{}March 3, 2024", " ".repeat(2000));
        assert_eq!(header.find(&near).as_deref(), Some("March 3, 2024"));
        assert_eq!(header.find(&far), None);
    }

    #[test]
    fn window_respects_char_boundaries() {
        assert_eq!(head_chars("ééé", 2), "éé");
        assert_eq!(head_chars("ab", 5), "ab");
    }

    #[test]
    fn invalid_regex_is_reported() {
        let spec = PatternSpec::new(Field::TaxYear, "broken", r"(20\d{2}");
        let err = Pattern::compile(&spec, 0).unwrap_err();
        assert!(matches!(err, ExtractError::InvalidPattern { .. }));
    }

    #[test]
    fn missing_capture_group_is_reported() {
        let spec = PatternSpec::new(Field::TaxYear, "no_group", r"20\d{2}");
        let err = Pattern::compile(&spec, 0).unwrap_err();
        assert!(matches!(err, ExtractError::MissingCaptureGroup { group: 1, .. }));
    }

    #[test]
    fn library_without_a_field_is_rejected() {
        let specs = vec![PatternSpec::new(Field::TaxYear, "y", r"(20\d{2})")];
        let err = PatternLibrary::from_specs(&specs).unwrap_err();
        assert!(matches!(err, ExtractError::MissingPatterns(_)));
    }

    #[test]
    fn overrides_replace_only_named_fields() {
        let overrides = vec![PatternSpec::new(Field::TaxYear, "fy", r"(?i)FY\s*(20\d{2})")];
        let lib = PatternLibrary::with_overrides(&overrides).unwrap();
        let years = lib.patterns_for(Field::TaxYear);
        assert_eq!(years.len(), 1);
        assert_eq!(years[0].name(), "fy");
        assert_eq!(
            lib.patterns_for(Field::LetterType).len(),
            PatternLibrary::builtin().patterns_for(Field::LetterType).len()
        );
    }

    #[test]
    fn spec_deserializes_with_defaults() {
        let spec: PatternSpec =
            serde_json::from_str(r#"{"field":"tax_year","name":"fy","regex":"FY(\\d{4})"}"#).unwrap();
        assert_eq!(spec.capture, Capture::Group(1));
        assert_eq!(spec.window, None);
    }
}
