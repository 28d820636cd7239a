//! Field extraction and validation for scanned IRS CP2000-family notices.
//!
//! OCR text and the scan's filename go in; a [`CaseRecord`] with validated
//! letter type, tax year, SSN last-4, dates and notice reference comes out,
//! each field tagged with where it came from. Malformed input never errors:
//! it shows up as invalid fields and quality issues on the record.
//!
//! ```no_run
//! use cp2000_extract::{FieldExtractor, RawInput};
//!
//! let extractor = FieldExtractor::default();
//! let record = extractor.extract(&RawInput::new("Notice CP2000 ...", "CP2000_2023.pdf"));
//! println!("{} {:?}", record.confidence(), record.quality_issues());
//! ```

pub mod clock;
pub mod config;
pub mod corrections;
pub mod error;
pub mod extractor;
pub mod field;
pub mod filename;
pub mod names;
pub mod normalize;
pub mod patterns;
pub mod record;
pub mod validate;

#[cfg(feature = "python")]
mod python;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{ExtractorConfig, UnusualSsnPolicy};
pub use corrections::CorrectionTable;
pub use error::{ExtractError, Result};
pub use extractor::{FieldExtractor, clean_text};
pub use field::{ExtractionAttempt, Field, FieldData, FieldValue, RawInput, Source};
pub use filename::{FilenameStrategy, TokenFilenameStrategy};
pub use names::spouse_name;
pub use normalize::Normalizer;
pub use patterns::{Capture, Pattern, PatternLibrary, PatternSpec};
pub use record::{CaseRecord, Confidence, ResponseRule, Urgency, UrgencyLevel, UrgencyMatrix, UrgencyStatus};
pub use validate::Validator;
