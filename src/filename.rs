//! Filename fallback.
//!
//! Scanned notices are saved under names like
//! `CP2000_2023_DTD 07.15.2024_SMITH - 0012.pdf`: letter type, tax year,
//! notice date after `DTD`, then the taxpayer surname. Anything read from the
//! filename is a lower-confidence fallback and still goes through the
//! normalizer and validator.

use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;

use crate::field::Field;

/// Pulls raw candidates out of a filename.
pub trait FilenameStrategy: Send + Sync {
    /// Raw candidate for `field`, or `None` if the filename carries nothing
    /// for it.
    fn extract(&self, field: Field, filename: &str) -> Option<String>;

    /// Taxpayer name, display-formatted.
    fn taxpayer_name(&self, _filename: &str) -> Option<String> {
        None
    }
}

lazy_static! {
    static ref LETTER_TOKEN: Regex = Regex::new(
        r"(?i)(?:^|[^A-Z0-9])((?:CP|LTR?)\s?\d{2,4}[A-Z]?|FORM\s?\d{3,4}[A-Z]?)(?:[^A-Z0-9]|$)"
    ).unwrap();

    static ref YEAR_TOKENS: Vec<Regex> = vec![
        // Year right after the letter code: CP2000_2023
        Regex::new(r"(?i)(?:CP|LTR?|FORM)\s?\d{2,4}[A-Z]?[_\s\-]+(\d{4})(?:[^0-9]|$)").unwrap(),
        // Explicit tax-year token: TY2023, TY_2023
        Regex::new(r"(?i)(?:^|[^A-Z])TY[_\s\-]?(\d{4})(?:[^0-9]|$)").unwrap(),
    ];

    static ref DTD_DATES: Vec<Regex> = vec![
        Regex::new(r"DTD[\s_]+(\d{1,2})\.(\d{1,2})\.(\d{4})").unwrap(),
        Regex::new(r"DTD[\s_]+(\d{1,2})\s+(\d{1,2})\s+(\d{4})").unwrap(),
        Regex::new(r"DTD[\s_]+(\d{1,2})-(\d{1,2})-(\d{4})").unwrap(),
    ];

    static ref NAME_PATTERNS: Vec<Regex> = vec![
        // "DTD 07.15.2024_SMITH - 0012"
        Regex::new(r"DTD[\s_]+[\d.\-_\s]+_([A-Z]+)\s+-").unwrap(),
        // "DTD 07.15.2024_MARY SMITH" or "DTD 07.15.2024 SMITH - 12"
        Regex::new(r"DTD[\s_]+[\d.\-_\s]+([A-Z][A-Z\s]{2,40})\s*(?:-\s*\d+)*$").unwrap(),
        // "..._SMITH"
        Regex::new(r"_([A-Z]{3,})$").unwrap(),
        // trailing uppercase words
        Regex::new(r"([A-Z][A-Z\s]+)$").unwrap(),
    ];

    static ref NAME_TAIL: Regex = Regex::new(r"[\s\-\d]+$").unwrap();
}

/// The token-position convention used by the intake scanners.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokenFilenameStrategy;

impl FilenameStrategy for TokenFilenameStrategy {
    fn extract(&self, field: Field, filename: &str) -> Option<String> {
        let stem = stem(filename);
        match field {
            Field::LetterType => LETTER_TOKEN
                .captures(stem)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string()),
            Field::TaxYear => YEAR_TOKENS
                .iter()
                .find_map(|re| re.captures(stem))
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string()),
            Field::NoticeDate => DTD_DATES.iter().find_map(|re| {
                re.captures(stem)
                    .map(|c| format!("{}/{}/{}", &c[1], &c[2], &c[3]))
            }),
            Field::SsnLast4 | Field::DueDate | Field::NoticeReference => None,
        }
    }

    fn taxpayer_name(&self, filename: &str) -> Option<String> {
        let stem = stem(filename);
        NAME_PATTERNS.iter().find_map(|re| {
            let raw = re.captures(stem)?.get(1)?.as_str().trim();
            let name = NAME_TAIL.replace(raw, "");
            let name = name.trim();
            let only_letters = name.chars().all(|c| c.is_alphabetic() || c.is_whitespace());
            if name.chars().count() >= 3 && only_letters {
                Some(title_case(name))
            } else {
                None
            }
        })
    }
}

/// Final path component without a `.pdf` extension.
fn stem(filename: &str) -> &str {
    let base = Path::new(filename)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(filename);
    let lower = base.to_ascii_lowercase();
    if lower.ends_with(".pdf") {
        &base[..base.len() - 4]
    } else {
        base
    }
}

fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
