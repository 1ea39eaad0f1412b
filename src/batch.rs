//! Typed row batches and the batch source boundary
//!
//! The pipeline consumes already-decoded, typed row batches. Format decoding
//! (CSV/JSON/Parquet parsing, encoding and delimiter detection) happens in an
//! upstream collaborator; nothing in this crate touches raw bytes.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// A single typed cell value.
///
/// `Text` is the catch-all for untyped source data; the profiler re-parses
/// text values to infer tighter logical types. `List` represents a nested
/// repeating group and triggers child-table extraction under the 3NF strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Value {
    Null,
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    Text(String),
    List(Vec<Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Value::List(_))
    }

    /// Canonical string rendering.
    ///
    /// This rendering feeds surrogate-key digests, row hashes, and extract
    /// cells, so it must be stable across runs: nulls render empty, dates as
    /// ISO-8601, floats via the shortest round-trip form.
    pub fn render(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Integer(v) => v.to_string(),
            Value::Float(v) => format!("{}", v),
            Value::Boolean(v) => v.to_string(),
            Value::Date(v) => v.format("%Y-%m-%d").to_string(),
            Value::Timestamp(v) => v.format("%Y-%m-%dT%H:%M:%S").to_string(),
            Value::Text(v) => v.clone(),
            Value::List(items) => {
                let parts: Vec<String> = items.iter().map(|i| i.render()).collect();
                format!("[{}]", parts.join(","))
            }
        }
    }

    /// Numeric view of the value, re-parsing numeric-looking text.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            Value::Text(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    /// Date view of the value, re-parsing common date renderings of text.
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            Value::Timestamp(ts) => Some(ts.date()),
            Value::Text(s) => parse_date_text(s.trim()),
            _ => None,
        }
    }
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d-%m-%Y"];
const TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];

/// Parse a date from text, trying common renderings.
pub fn parse_date_text(s: &str) -> Option<NaiveDate> {
    if s.is_empty() {
        return None;
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    for fmt in TIMESTAMP_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(ts.date());
        }
    }
    None
}

/// Parse a timestamp from text.
pub fn parse_timestamp_text(s: &str) -> Option<NaiveDateTime> {
    if s.is_empty() {
        return None;
    }
    for fmt in TIMESTAMP_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(ts);
        }
    }
    None
}

/// A batch of rows handed over by the decoding collaborator.
///
/// `offset` is the stream index of the first row, used to identify the batch
/// in error reports.
#[derive(Debug, Clone)]
pub struct RowBatch {
    pub offset: u64,
    pub rows: Vec<Vec<Value>>,
}

impl RowBatch {
    pub fn new(offset: u64, rows: Vec<Vec<Value>>) -> Self {
        Self { offset, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A re-scannable source of typed row batches.
///
/// The pipeline makes up to three passes over the source (profiling, key
/// validation, materialization), so `scan` must return a fresh iterator each
/// time and yield batches in the same order on every call.
pub trait BatchSource {
    /// Ordered column names, fixed for the lifetime of the source.
    fn columns(&self) -> &[String];

    /// Start a fresh pass over the batches.
    fn scan(&self) -> Box<dyn Iterator<Item = RowBatch> + Send + '_>;

    /// Name of the originating file, used for SOURCE_FILE_NAME / RECORD_SOURCE.
    fn source_name(&self) -> &str;
}

/// In-memory batch source, chunking a row vector into fixed-size batches.
///
/// Used by tests and by callers that already hold decoded rows.
#[derive(Debug, Clone)]
pub struct MemorySource {
    name: String,
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
    batch_size: usize,
}

impl MemorySource {
    pub fn new(
        name: impl Into<String>,
        columns: Vec<String>,
        rows: Vec<Vec<Value>>,
        batch_size: usize,
    ) -> Self {
        Self {
            name: name.into(),
            columns,
            rows,
            batch_size: batch_size.max(1),
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

impl BatchSource for MemorySource {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn scan(&self) -> Box<dyn Iterator<Item = RowBatch> + Send + '_> {
        let batch_size = self.batch_size;
        Box::new(
            self.rows
                .chunks(batch_size)
                .enumerate()
                .map(move |(i, chunk)| RowBatch::new((i * batch_size) as u64, chunk.to_vec())),
        )
    }

    fn source_name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_is_stable_for_nulls_and_dates() {
        assert_eq!(Value::Null.render(), "");
        let d = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(Value::Date(d).render(), "2024-03-07");
        assert_eq!(Value::Float(1.5).render(), "1.5");
        assert_eq!(Value::Float(3.0).render(), "3");
    }

    #[test]
    fn parses_common_date_renderings() {
        assert_eq!(
            parse_date_text("2024-01-31"),
            NaiveDate::from_ymd_opt(2024, 1, 31)
        );
        assert_eq!(
            parse_date_text("2024/01/31"),
            NaiveDate::from_ymd_opt(2024, 1, 31)
        );
        assert_eq!(parse_date_text("not a date"), None);
    }

    #[test]
    fn memory_source_batches_carry_offsets() {
        let rows: Vec<Vec<Value>> = (0..10).map(|i| vec![Value::Integer(i)]).collect();
        let source = MemorySource::new("t.csv", vec!["n".to_string()], rows, 4);
        let offsets: Vec<u64> = source.scan().map(|b| b.offset).collect();
        assert_eq!(offsets, vec![0, 4, 8]);
        // A second scan replays the same batches.
        assert_eq!(source.scan().count(), 3);
    }
}
