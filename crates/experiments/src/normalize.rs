//! Cell value normalization
//!
//! Rich text cells are reduced to their plain string, then reparsed as a
//! float when possible. Every other value passes through untouched, so the
//! shape of a table never changes.

use exp_core::{CellValue, ExperimentRecord};

/// Normalize a single cell
pub fn normalize_value(value: CellValue) -> CellValue {
    match value {
        CellValue::Rich(text) => {
            let text = text.text;
            match parse_float(&text) {
                Some(number) => CellValue::Float(number),
                None => CellValue::Str(text),
            }
        }
        other => other,
    }
}

/// Parse a float, tolerating surrounding whitespace and digit-group
/// underscores (`1_000`, `0.000_1`)
fn parse_float(text: &str) -> Option<f64> {
    let text = text.trim();
    if !text.contains('_') {
        return text.parse().ok();
    }

    let bytes = text.as_bytes();
    let grouped = bytes.iter().enumerate().all(|(i, &b)| {
        b != b'_'
            || (i > 0
                && bytes[i - 1].is_ascii_digit()
                && bytes.get(i + 1).is_some_and(u8::is_ascii_digit))
    });
    if !grouped {
        return None;
    }
    text.replace('_', "").parse().ok()
}

/// Normalize every cell of a record
pub fn normalize_record(record: ExperimentRecord) -> ExperimentRecord {
    record
        .into_iter()
        .map(|(key, value)| (key, normalize_value(value)))
        .collect()
}

/// Normalize a list of records, preserving order
pub fn normalize(records: Vec<ExperimentRecord>) -> Vec<ExperimentRecord> {
    records.into_iter().map(normalize_record).collect()
}
