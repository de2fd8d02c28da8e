//! Header-keyed parsing of survey CSV text.
//!
//! Survey sheets are exported as plain comma-separated text. Quoting is
//! not supported: a quote character is ordinary field text and a comma
//! inside a value always splits the field.

use csv::{ReaderBuilder, Trim};
use serde::Serialize;
use std::collections::HashMap;

/// One data line of a CSV file, keyed by trimmed header name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CsvRow(HashMap<String, String>);

impl CsvRow {
    /// Value for `column`, or the empty string when the column is absent.
    pub fn get(&self, column: &str) -> &str {
        self.0.get(column).map(String::as_str).unwrap_or("")
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for CsvRow {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        CsvRow(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Parse CSV text with a header line into rows keyed by header name.
///
/// - Text with fewer than two lines yields no rows.
/// - Blank and whitespace-only lines are skipped.
/// - Missing trailing fields become empty strings; extra fields are ignored.
///
/// Parsing never fails: unreadable lines are logged and dropped.
pub fn parse_csv_text(text: &str) -> Vec<CsvRow> {
    if text.split('\n').count() < 2 {
        return Vec::new();
    }

    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .quoting(false)
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = match rdr.headers() {
        Ok(h) => h.iter().map(str::to_string).collect(),
        Err(e) => {
            log::warn!("csv: unreadable header line: {}", e);
            return Vec::new();
        }
    };

    let mut rows = Vec::new();
    let mut skipped = 0u32;
    for result in rdr.records() {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                log::warn!("csv: skipping unreadable line: {}", e);
                skipped += 1;
                continue;
            }
        };
        // whitespace-only line
        if record.len() == 1 && record.get(0).unwrap_or("").is_empty() {
            continue;
        }
        let row: CsvRow = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.clone(), record.get(i).unwrap_or("").to_string()))
            .collect();
        rows.push(row);
    }
    log::debug!("csv: parsed {} rows, skipped {}", rows.len(), skipped);
    rows
}
