//! Spouse name on joint-return notices.
//!
//! Only labeled lines count. The label is matched case-insensitively, the
//! name itself must be capitalized words on the same line.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref SPOUSE_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"(?i:Spouse'?s?\s+name)[:\s]+([A-Z][a-z]+(?:[ \t]+[A-Z][a-z]+){0,2})").unwrap(),
        Regex::new(r"(?i:Name\s+of\s+spouse)[:\s]+([A-Z][a-z]+(?:[ \t]+[A-Z][a-z]+){0,2})").unwrap(),
        Regex::new(r"(?i:Joint\s+filer)[:\s]+([A-Z][a-z]+(?:[ \t]+[A-Z][a-z]+){0,2})").unwrap(),
        Regex::new(r"(?i:Filing\s+jointly\s+with)[:\s]+([A-Z][a-z]+(?:[ \t]+[A-Z][a-z]+){0,2})").unwrap(),
    ];
}

/// Words that show up after a spouse label when OCR merged it with the
/// next form field.
const NOT_A_NAME: &[&str] = &[
    "notice", "number", "date", "tax", "year", "ssn", "address", "department", "treasury",
];

/// Spouse name from the first labeled line that yields a plausible name.
pub fn spouse_name(text: &str) -> Option<String> {
    SPOUSE_PATTERNS
        .iter()
        .flat_map(|re| re.captures_iter(text))
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .find(|name| {
            let lower = name.to_lowercase();
            !name.is_empty() && !NOT_A_NAME.iter().any(|word| lower.contains(word))
        })
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labeled_forms() {
        assert_eq!(spouse_name("Spouse's name: Mary Ann Smith\n").as_deref(), Some("Mary Ann Smith"));
        assert_eq!(spouse_name("SPOUSE NAME  Jane Doe").as_deref(), Some("Jane Doe"));
        assert_eq!(spouse_name("Name of spouse: Carlos").as_deref(), Some("Carlos"));
        assert_eq!(spouse_name("Joint filer: Lee Park").as_deref(), Some("Lee Park"));
        assert_eq!(spouse_name("Filing jointly with: Ana Ruiz").as_deref(), Some("Ana Ruiz"));
    }

    #[test]
    fn name_stops_at_line_end() {
        assert_eq!(spouse_name("Spouse's name: Jane Doe\nTax Year 2023").as_deref(), Some("Jane Doe"));
    }

    #[test]
    fn form_words_are_not_names() {
        assert_eq!(spouse_name("Spouse's name: Notice Date"), None);
        assert_eq!(spouse_name("Joint filer: Tax Year\nFiling jointly with: Ana Ruiz").as_deref(), Some("Ana Ruiz"));
    }

    #[test]
    fn no_label_no_name() {
        assert_eq!(spouse_name("Mary Ann Smith"), None);
        assert_eq!(spouse_name("Spouse's name: 123"), None);
    }
}
