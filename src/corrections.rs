//! OCR-error correction tables.
//!
//! Two tables live here. `CorrectionTable` maps whole misread notice codes to
//! their canonical form by exact lookup only. `repair_digits` maps single
//! characters that OCR commonly substitutes for digits inside numeric tokens.

use std::collections::HashMap;

use lazy_static::lazy_static;

use crate::error::{ExtractError, Result};

lazy_static! {
    /// Known misreads of notice codes, stored already uppercased and with
    /// whitespace removed (the normalizer applies the table after both).
    static ref DEFAULT_CODE_CORRECTIONS: Vec<(&'static str, &'static str)> = vec![
        // CP2000: '2' read as '7' or '0', '0' read as 'O' or '9'
        ("CP7000", "CP2000"),
        ("CP0000", "CP2000"),
        ("CPOOO0", "CP2000"),
        ("CP2900", "CP2000"),
        ("CP29OO", "CP2000"),
        ("CP20O0", "CP2000"),
        ("CP200O", "CP2000"),
        ("CP2OOO", "CP2000"),
        ("CPZ000", "CP2000"),

        // CP2501
        ("CP25O1", "CP2501"),
        ("CP250I", "CP2501"),
        ("CP7501", "CP2501"),

        // CP3219A
        ("CP32I9A", "CP3219A"),
        ("CP3Z19A", "CP3219A"),

        // CP504
        ("CP5O4", "CP504"),
        ("CPS04", "CP504"),

        // Letter prefix misreads
        ("LTR3I72", "LTR3172"),
        ("LTR1O58", "LTR1058"),
    ];

    /// Characters OCR substitutes for digits in numeric tokens.
    static ref DIGIT_CONFUSIONS: HashMap<char, char> = {
        let pairs = [
            ('O', '0'), ('o', '0'), ('Q', '0'), ('D', '0'),
            ('I', '1'), ('l', '1'), ('L', '1'), ('|', '1'), ('i', '1'),
            ('Z', '2'), ('z', '2'),
            ('S', '5'), ('s', '5'),
            ('B', '8'),
        ];
        pairs.iter().cloned().collect()
    };
}

/// Exact-match lookup from misread code to canonical code.
#[derive(Debug, Clone)]
pub struct CorrectionTable {
    codes: HashMap<String, String>,
}

impl CorrectionTable {
    /// Build a table from `(misread, canonical)` pairs.
    ///
    /// Fails if any canonical value is also a misread key, since then
    /// `correct(correct(x))` could differ from `correct(x)`.
    pub fn new<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut codes = HashMap::new();
        for (k, v) in pairs {
            let (k, v) = (k.into(), v.into());
            if k.is_empty() || v.is_empty() {
                return Err(ExtractError::EmptyCorrection);
            }
            codes.insert(k, v);
        }
        if let Some(canonical) = codes.values().find(|v| codes.contains_key(v.as_str())) {
            return Err(ExtractError::NonIdempotentCorrection(canonical.clone()));
        }
        Ok(Self { codes })
    }

    /// Built-in table extended with caller-supplied pairs. Extra pairs win on
    /// key collision.
    pub fn with_extra<I, K, V>(extra: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let defaults = DEFAULT_CODE_CORRECTIONS
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()));
        let extra = extra.into_iter().map(|(k, v)| (k.into(), v.into()));
        Self::new(defaults.chain(extra))
    }

    /// Canonical form of `raw` if it is a known misread, else `raw` unchanged.
    pub fn correct<'a>(&'a self, raw: &'a str) -> &'a str {
        self.codes.get(raw).map(String::as_str).unwrap_or(raw)
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

impl Default for CorrectionTable {
    fn default() -> Self {
        let codes = DEFAULT_CODE_CORRECTIONS
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self { codes }
    }
}

/// Replace digit look-alikes with digits. Characters with no mapping pass
/// through untouched, so separators survive for the caller to strip.
pub fn repair_digits(raw: &str) -> String {
    raw.chars()
        .map(|c| DIGIT_CONFUSIONS.get(&c).copied().unwrap_or(c))
        .collect()
}
