use thiserror::Error;

use crate::field::Field;

/// Construction-time failures. Extraction itself never returns these: bad
/// OCR input is reported through `quality_issues`, not `Err`.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("invalid regex in pattern '{name}' for {field}: {source}")]
    InvalidPattern {
        field: Field,
        name: String,
        #[source]
        source: regex::Error,
    },

    #[error("pattern '{name}' for {field} has no capture group {group}")]
    MissingCaptureGroup {
        field: Field,
        name: String,
        group: usize,
    },

    #[error("no extraction patterns configured for {0}")]
    MissingPatterns(Field),

    #[error("correction table is not idempotent: canonical '{0}' is also a misread key")]
    NonIdempotentCorrection(String),

    #[error("correction table entry is empty")]
    EmptyCorrection,

    #[error("config value {key} = {value} is outside 0..={max} days")]
    DaysOutOfRange { key: String, value: i64, max: i64 },

    #[error("config parse error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("config read error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ExtractError>;
