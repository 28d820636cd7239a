//! Python bindings, built with `--features python`.

use std::sync::Arc;

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use crate::clock::SystemClock;
use crate::config::ExtractorConfig;
use crate::error::ExtractError;
use crate::extractor::FieldExtractor;
use crate::field::{Field, RawInput};
use crate::normalize::Normalizer;
use crate::record::CaseRecord;

fn value_error(e: ExtractError) -> PyErr {
    PyValueError::new_err(e.to_string())
}

fn build_extractor(config_json: Option<&str>) -> PyResult<FieldExtractor> {
    let config = match config_json {
        Some(json) => ExtractorConfig::from_json_str(json).map_err(value_error)?,
        None => ExtractorConfig::default(),
    };
    FieldExtractor::from_config(&config, Arc::new(SystemClock)).map_err(value_error)
}

/// One extracted notice as seen from Python. Invalid fields are `None`.
#[pyclass]
#[derive(Clone)]
struct ExtractedCase {
    #[pyo3(get)]
    filename: String,
    #[pyo3(get)]
    letter_type: Option<String>,
    #[pyo3(get)]
    tax_year: Option<i32>,
    #[pyo3(get)]
    ssn_last4: Option<String>,
    #[pyo3(get)]
    notice_date: Option<String>,
    #[pyo3(get)]
    due_date: Option<String>,
    #[pyo3(get)]
    notice_reference: Option<String>,
    #[pyo3(get)]
    taxpayer_name: Option<String>,
    #[pyo3(get)]
    spouse_name: Option<String>,
    #[pyo3(get)]
    confidence: String,
    #[pyo3(get)]
    completeness: f64,
    #[pyo3(get)]
    needs_review: bool,
    #[pyo3(get)]
    quality_issues: Vec<String>,
    #[pyo3(get)]
    urgency_level: Option<String>,
    #[pyo3(get)]
    urgency_status: Option<String>,
    #[pyo3(get)]
    days_remaining: Option<i64>,
    #[pyo3(get)]
    json: String,
}

impl ExtractedCase {
    fn from_record(record: &CaseRecord) -> PyResult<Self> {
        let json = serde_json::to_string(record)
            .map_err(|e| PyValueError::new_err(format!("Failed to serialize record: {}", e)))?;
        let text = |field: Field| record.field(field).text().map(str::to_string);
        let date = |field: Field| record.field(field).date().map(|d| d.to_string());
        let urgency = record.urgency();
        Ok(Self {
            filename: record.filename().to_string(),
            letter_type: text(Field::LetterType),
            tax_year: record.field(Field::TaxYear).year(),
            ssn_last4: text(Field::SsnLast4),
            notice_date: date(Field::NoticeDate),
            due_date: date(Field::DueDate),
            notice_reference: text(Field::NoticeReference),
            taxpayer_name: record.taxpayer_name().map(str::to_string),
            spouse_name: record.spouse_name().map(str::to_string),
            confidence: record.confidence().to_string(),
            completeness: record.completeness(),
            needs_review: record.needs_review(),
            quality_issues: record.quality_issues().to_vec(),
            urgency_level: urgency.map(|u| u.level.as_str().to_string()),
            urgency_status: urgency.map(|u| u.status.as_str().to_string()),
            days_remaining: urgency.map(|u| u.days_remaining),
            json,
        })
    }
}

/// Extract one notice.
#[pyfunction]
#[pyo3(signature = (document_text, filename, config_json=None))]
fn extract_case(
    document_text: String,
    filename: String,
    config_json: Option<String>,
) -> PyResult<ExtractedCase> {
    let extractor = build_extractor(config_json.as_deref())?;
    let record = extractor.extract(&RawInput::new(document_text, filename));
    ExtractedCase::from_record(&record)
}

/// Extract a batch of `(document_text, filename)` pairs in parallel.
#[pyfunction]
#[pyo3(signature = (cases, config_json=None))]
fn extract_batch(
    cases: Vec<(String, String)>,
    config_json: Option<String>,
) -> PyResult<Vec<ExtractedCase>> {
    let extractor = build_extractor(config_json.as_deref())?;
    let inputs: Vec<RawInput> = cases
        .into_iter()
        .map(|(text, filename)| RawInput::new(text, filename))
        .collect();
    extractor
        .extract_batch(&inputs)
        .iter()
        .map(ExtractedCase::from_record)
        .collect()
}

/// Canonical letter-type code for an OCR'd token, e.g. "cp 7000" -> "CP2000".
#[pyfunction]
fn correct_letter_type(raw: String) -> PyResult<String> {
    Ok(Normalizer::default().letter_type(&raw))
}

#[pymodule]
fn cp2000_extract(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(extract_case, m)?)?;
    m.add_function(wrap_pyfunction!(extract_batch, m)?)?;
    m.add_function(wrap_pyfunction!(correct_letter_type, m)?)?;
    m.add_class::<ExtractedCase>()?;
    Ok(())
}
