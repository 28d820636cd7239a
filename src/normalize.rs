//! Per-field canonicalization of raw matched tokens.
//!
//! Steps run in a fixed order: strip whitespace, uppercase, correction
//! lookup, structural repair. Not every field uses every step; dates keep
//! their separators because a month-name date needs them.

use lazy_static::lazy_static;
use regex::Regex;

use crate::corrections::{repair_digits, CorrectionTable};
use crate::field::Field;

lazy_static! {
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
    // Truncated "LTR" prefix: LT1058 -> LTR1058
    static ref SHORT_LTR: Regex = Regex::new(r"^LT(\d+[A-Z]?)$").unwrap();
    static ref MONTH_DOT: Regex = Regex::new(r"^([A-Za-z]+)\.").unwrap();
    static ref SEPT: Regex = Regex::new(r"(?i)^sept\b").unwrap();
}

#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    corrections: CorrectionTable,
}

impl Normalizer {
    pub fn new(corrections: CorrectionTable) -> Self {
        Self { corrections }
    }

    /// Canonical form of `raw` for `field`. Never fails; a hopeless token
    /// comes back unrecognizable and is rejected by the validator.
    pub fn normalize(&self, field: Field, raw: &str) -> String {
        match field {
            Field::LetterType => self.letter_type(raw),
            Field::TaxYear => repair_digits(&compact_upper(raw)),
            Field::SsnLast4 => repair_digits(&compact_upper(raw))
                .chars()
                .filter(char::is_ascii_digit)
                .collect(),
            Field::NoticeDate | Field::DueDate => date(raw),
            Field::NoticeReference => compact_upper(raw),
        }
    }

    /// Letter codes: "cp 7000" -> "CP7000" -> "CP2000"; "LT 1058" -> "LTR1058".
    pub fn letter_type(&self, raw: &str) -> String {
        let compact: String = compact_upper(raw).chars().filter(|c| *c != '-').collect();
        let corrected = self.corrections.correct(&compact);
        SHORT_LTR.replace(corrected, "LTR$1").into_owned()
    }
}

/// Whitespace removed, ASCII-uppercased.
fn compact_upper(raw: &str) -> String {
    WHITESPACE.replace_all(raw, "").to_uppercase()
}

/// Single spaces, no commas, no dot after a month abbreviation, "Sept" -> "Sep".
fn date(raw: &str) -> String {
    let collapsed = WHITESPACE.replace_all(raw.trim(), " ").replace(',', "");
    let no_dot = MONTH_DOT.replace(&collapsed, "$1").into_owned();
    SEPT.replace(&no_dot, "Sep").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(field: Field, raw: &str) -> String {
        Normalizer::default().normalize(field, raw)
    }

    #[test]
    fn letter_type_whitespace_and_case() {
        assert_eq!(n(Field::LetterType, "cp 2000"), "CP2000");
        assert_eq!(n(Field::LetterType, "Form\t4549"), "FORM4549");
    }

    #[test]
    fn letter_type_ocr_correction() {
        assert_eq!(n(Field::LetterType, "CP7000"), "CP2000");
        assert_eq!(n(Field::LetterType, "cp 29OO"), "CP2000");
    }

    #[test]
    fn letter_type_structural_repairs() {
        assert_eq!(n(Field::LetterType, "LT1058"), "LTR1058");
        assert_eq!(n(Field::LetterType, "LT 11"), "LTR11");
        assert_eq!(n(Field::LetterType, "CP-2000"), "CP2000");
        assert_eq!(n(Field::LetterType, "LTR3172"), "LTR3172");
    }

    #[test]
    fn tax_year_digit_repair() {
        assert_eq!(n(Field::TaxYear, "2O23"), "2023");
        assert_eq!(n(Field::TaxYear, " 2022 "), "2022");
    }

    #[test]
    fn ssn_keeps_digits_only() {
        assert_eq!(n(Field::SsnLast4, "123-45-6789"), "123456789");
        assert_eq!(n(Field::SsnLast4, "987-65-432l"), "987654321");
        assert_eq!(n(Field::SsnLast4, "12"), "12");
    }

    #[test]
    fn dates_keep_separators() {
        assert_eq!(n(Field::NoticeDate, "July  15,\n2024"), "July 15 2024");
        assert_eq!(n(Field::DueDate, "Sept. 3, 2024"), "Sep 3 2024");
        assert_eq!(n(Field::NoticeDate, "07.15.2024"), "07.15.2024");
    }

    #[test]
    fn normalization_is_stable() {
        let norm = Normalizer::default();
        for (field, raw) in [
            (Field::LetterType, "cp 7000"),
            (Field::TaxYear, "2O2l"),
            (Field::SsnLast4, "123-45-6789"),
            (Field::NoticeDate, "Sept. 3, 2024"),
        ] {
            let once = norm.normalize(field, raw);
            assert_eq!(norm.normalize(field, &once), once);
        }
    }
}
