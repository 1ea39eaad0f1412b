//! Per-column accumulators and finalized profiles

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::batch::{Value, parse_date_text, parse_timestamp_text};
use crate::config::PipelineConfig;
use crate::profile::sketch::{BottomKSample, DistinctSketch, TopKSketch, value_digest};

/// Logical type inferred for a column.
///
/// Values arrive typed, but text columns are re-parsed: a text column whose
/// non-null values all parse as integers is inferred as `Integer`, and so on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InferredType {
    Integer,
    Float,
    Decimal,
    Boolean,
    Date,
    Timestamp,
    Text,
    List,
}

impl InferredType {
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            InferredType::Integer | InferredType::Float | InferredType::Decimal
        )
    }

    pub fn is_date_like(&self) -> bool {
        matches!(self, InferredType::Date | InferredType::Timestamp)
    }
}

/// One value/frequency pair from the top-N sketch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopValue {
    pub value: String,
    pub count: u64,
}

/// Finalized, immutable statistics for one column.
///
/// Produced once by [`crate::profile::ColumnProfiler::finalize`]; the
/// top-values list and (above the exact-tracking threshold) the distinct
/// count are approximations, flagged by `distinct_exact`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnProfile {
    pub name: String,
    pub inferred_type: InferredType,
    pub row_count: u64,
    pub null_count: u64,
    pub null_ratio: f64,
    pub distinct_count: u64,
    /// False once the distinct count comes from the approximate estimator.
    pub distinct_exact: bool,
    /// Typed min/max rendered canonically (numeric for numeric columns,
    /// ISO dates for date columns, lexicographic for text).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub std_dev: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_length: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
    pub top_values: Vec<TopValue>,
    /// IQR-based outlier count, numeric columns only. Estimated from the
    /// value sample; exact when the sample retained every value.
    pub outlier_count: u64,
    /// Fraction of non-null values that parse as dates, date-typed columns only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_parse_ratio: Option<f64>,
    /// Fraction of non-null values that are nested lists.
    pub list_ratio: f64,
}

impl ColumnProfile {
    pub fn non_null_count(&self) -> u64 {
        self.row_count - self.null_count
    }

    /// Distinct values as a fraction of total rows.
    pub fn distinct_ratio(&self) -> f64 {
        if self.row_count == 0 {
            0.0
        } else {
            self.distinct_count as f64 / self.row_count as f64
        }
    }
}

/// Running per-column state. Merges are associative and commutative, so
/// accumulators built from different batches can be reduced in any order.
#[derive(Debug, Clone)]
pub struct ColumnAccumulator {
    pub name: String,
    rows: u64,
    nulls: u64,
    // Native variant counts.
    int_native: u64,
    float_native: u64,
    bool_native: u64,
    date_native: u64,
    ts_native: u64,
    text_native: u64,
    list_native: u64,
    // Re-parse counts over text values.
    text_int: u64,
    text_decimal: u64,
    text_float: u64,
    text_bool: u64,
    text_date: u64,
    text_ts: u64,
    // Numeric aggregates (native numerics plus numeric-parsing text).
    num_count: u64,
    num_sum: f64,
    num_sum_sq: f64,
    num_min: Option<f64>,
    num_max: Option<f64>,
    // Date range (native dates/timestamps plus date-parsing text).
    date_min: Option<NaiveDate>,
    date_max: Option<NaiveDate>,
    // Text extremes and lengths.
    text_min: Option<String>,
    text_max: Option<String>,
    len_sum: u64,
    len_max: u64,
    distinct: DistinctSketch,
    top: TopKSketch,
    sample: BottomKSample,
}

impl ColumnAccumulator {
    pub fn new(name: &str, config: &PipelineConfig) -> Self {
        Self {
            name: name.to_string(),
            rows: 0,
            nulls: 0,
            int_native: 0,
            float_native: 0,
            bool_native: 0,
            date_native: 0,
            ts_native: 0,
            text_native: 0,
            list_native: 0,
            text_int: 0,
            text_decimal: 0,
            text_float: 0,
            text_bool: 0,
            text_date: 0,
            text_ts: 0,
            num_count: 0,
            num_sum: 0.0,
            num_sum_sq: 0.0,
            num_min: None,
            num_max: None,
            date_min: None,
            date_max: None,
            text_min: None,
            text_max: None,
            len_sum: 0,
            len_max: 0,
            distinct: DistinctSketch::new(config.exact_distinct_limit),
            top: TopKSketch::new(config.top_k),
            sample: BottomKSample::new(config.sample_size),
        }
    }

    pub fn observe(&mut self, value: &Value) {
        self.rows += 1;
        if value.is_null() {
            self.nulls += 1;
            return;
        }
        let rendered = value.render();
        let digest = value_digest(&rendered);
        self.distinct.insert(digest);
        self.top.insert(&rendered);

        match value {
            Value::Integer(_) => self.int_native += 1,
            Value::Float(_) => self.float_native += 1,
            Value::Boolean(_) => self.bool_native += 1,
            Value::Date(_) => self.date_native += 1,
            Value::Timestamp(_) => self.ts_native += 1,
            Value::List(_) => self.list_native += 1,
            Value::Text(s) => {
                self.text_native += 1;
                let trimmed = s.trim();
                if trimmed.parse::<i64>().is_ok() {
                    self.text_int += 1;
                } else if is_decimal_text(trimmed) {
                    self.text_decimal += 1;
                }
                if trimmed.parse::<f64>().is_ok() {
                    self.text_float += 1;
                }
                if matches!(trimmed.to_ascii_lowercase().as_str(), "true" | "false") {
                    self.text_bool += 1;
                }
                if parse_timestamp_text(trimmed).is_some() {
                    self.text_ts += 1;
                } else if parse_date_text(trimmed).is_some() {
                    self.text_date += 1;
                }
                self.len_sum += s.chars().count() as u64;
                self.len_max = self.len_max.max(s.chars().count() as u64);
                if self.text_min.as_deref().map(|m| s.as_str() < m).unwrap_or(true) {
                    self.text_min = Some(s.clone());
                }
                if self.text_max.as_deref().map(|m| s.as_str() > m).unwrap_or(true) {
                    self.text_max = Some(s.clone());
                }
            }
            Value::Null => unreachable!("nulls handled above"),
        }

        if let Some(n) = value.as_f64() {
            self.num_count += 1;
            self.num_sum += n;
            self.num_sum_sq += n * n;
            self.num_min = Some(self.num_min.map_or(n, |m| m.min(n)));
            self.num_max = Some(self.num_max.map_or(n, |m| m.max(n)));
            self.sample.insert(digest, n);
        }
        if let Some(d) = value.as_date() {
            self.date_min = Some(self.date_min.map_or(d, |m| m.min(d)));
            self.date_max = Some(self.date_max.map_or(d, |m| m.max(d)));
        }
    }

    pub fn merge(&mut self, other: &ColumnAccumulator) {
        self.rows += other.rows;
        self.nulls += other.nulls;
        self.int_native += other.int_native;
        self.float_native += other.float_native;
        self.bool_native += other.bool_native;
        self.date_native += other.date_native;
        self.ts_native += other.ts_native;
        self.text_native += other.text_native;
        self.list_native += other.list_native;
        self.text_int += other.text_int;
        self.text_decimal += other.text_decimal;
        self.text_float += other.text_float;
        self.text_bool += other.text_bool;
        self.text_date += other.text_date;
        self.text_ts += other.text_ts;
        self.num_count += other.num_count;
        self.num_sum += other.num_sum;
        self.num_sum_sq += other.num_sum_sq;
        self.num_min = min_opt(self.num_min, other.num_min);
        self.num_max = max_opt(self.num_max, other.num_max);
        self.date_min = match (self.date_min, other.date_min) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        self.date_max = match (self.date_max, other.date_max) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        self.text_min = match (self.text_min.take(), other.text_min.clone()) {
            (Some(a), Some(b)) => Some(if b < a { b } else { a }),
            (a, b) => a.or(b),
        };
        self.text_max = match (self.text_max.take(), other.text_max.clone()) {
            (Some(a), Some(b)) => Some(if b > a { b } else { a }),
            (a, b) => a.or(b),
        };
        self.len_sum += other.len_sum;
        self.len_max = self.len_max.max(other.len_max);
        self.distinct.merge(&other.distinct);
        self.top.merge(&other.top);
        self.sample.merge(&other.sample);
    }

    fn infer_type(&self) -> InferredType {
        let non_null = self.rows - self.nulls;
        if non_null == 0 {
            return InferredType::Text;
        }
        if self.list_native > 0 {
            return InferredType::List;
        }
        if self.text_native == non_null {
            // Untyped source: re-parse decides.
            if self.text_bool == non_null {
                return InferredType::Boolean;
            }
            if self.text_int == non_null {
                return InferredType::Integer;
            }
            if self.text_int + self.text_decimal == non_null && self.text_decimal > 0 {
                return InferredType::Decimal;
            }
            if self.text_float == non_null {
                return InferredType::Float;
            }
            if self.text_ts == non_null {
                return InferredType::Timestamp;
            }
            if self.text_date + self.text_ts == non_null {
                return InferredType::Date;
            }
            return InferredType::Text;
        }
        if self.int_native == non_null {
            return InferredType::Integer;
        }
        if self.int_native + self.float_native == non_null {
            return InferredType::Float;
        }
        if self.bool_native == non_null {
            return InferredType::Boolean;
        }
        if self.ts_native == non_null {
            return InferredType::Timestamp;
        }
        if self.date_native + self.ts_native == non_null {
            return InferredType::Date;
        }
        InferredType::Text
    }

    /// Finalize into an immutable profile.
    ///
    /// An all-null or zero-row column produces a profile with zero counts and
    /// absent statistics rather than an error.
    pub fn finalize(&self) -> ColumnProfile {
        let inferred_type = self.infer_type();
        let non_null = self.rows - self.nulls;
        let null_ratio = if self.rows == 0 {
            0.0
        } else {
            self.nulls as f64 / self.rows as f64
        };

        let (mean, std_dev) = if inferred_type.is_numeric() && self.num_count > 0 {
            let mean = self.num_sum / self.num_count as f64;
            let variance = (self.num_sum_sq / self.num_count as f64 - mean * mean).max(0.0);
            (Some(mean), Some(variance.sqrt()))
        } else {
            (None, None)
        };

        let outlier_count = if inferred_type.is_numeric() && !self.sample.is_empty() {
            let q1 = self.sample.quantile(0.25).expect("non-empty sample");
            let q3 = self.sample.quantile(0.75).expect("non-empty sample");
            let iqr = q3 - q1;
            let lower = q1 - 1.5 * iqr;
            let upper = q3 + 1.5 * iqr;
            (self.sample.outlier_fraction(lower, upper) * self.num_count as f64).round() as u64
        } else {
            0
        };

        let (min, max) = if inferred_type.is_numeric() {
            (
                self.num_min.map(|v| Value::Float(v).render()),
                self.num_max.map(|v| Value::Float(v).render()),
            )
        } else if inferred_type.is_date_like() {
            (
                self.date_min.map(|d| d.format("%Y-%m-%d").to_string()),
                self.date_max.map(|d| d.format("%Y-%m-%d").to_string()),
            )
        } else {
            (self.text_min.clone(), self.text_max.clone())
        };

        let date_parse_ratio = if inferred_type.is_date_like() && non_null > 0 {
            let parsed = self.date_native + self.ts_native + self.text_date + self.text_ts;
            Some(parsed as f64 / non_null as f64)
        } else {
            None
        };

        let (avg_length, max_length) = if self.text_native > 0 {
            (
                Some(self.len_sum as f64 / self.text_native as f64),
                Some(self.len_max),
            )
        } else {
            (None, None)
        };

        ColumnProfile {
            name: self.name.clone(),
            inferred_type,
            row_count: self.rows,
            null_count: self.nulls,
            null_ratio,
            distinct_count: self.distinct.estimate(),
            distinct_exact: self.distinct.is_exact(),
            min,
            max,
            mean,
            std_dev,
            min_date: self.date_min,
            max_date: self.date_max,
            avg_length,
            max_length,
            top_values: self
                .top
                .top()
                .into_iter()
                .map(|(value, count)| TopValue { value, count })
                .collect(),
            outlier_count,
            date_parse_ratio,
            list_ratio: if non_null == 0 {
                0.0
            } else {
                self.list_native as f64 / non_null as f64
            },
        }
    }
}

fn is_decimal_text(s: &str) -> bool {
    let body = s.strip_prefix('-').unwrap_or(s);
    let mut parts = body.splitn(2, '.');
    match (parts.next(), parts.next()) {
        (Some(int), Some(frac)) => {
            !int.is_empty()
                && !frac.is_empty()
                && int.chars().all(|c| c.is_ascii_digit())
                && frac.chars().all(|c| c.is_ascii_digit())
        }
        _ => false,
    }
}

fn min_opt(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.min(y)),
        (x, y) => x.or(y),
    }
}

fn max_opt(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.max(y)),
        (x, y) => x.or(y),
    }
}
