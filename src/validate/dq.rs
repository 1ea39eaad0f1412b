//! DQ checks over written extracts

use std::collections::{HashMap, HashSet};
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};

use crate::materialize::SplitResult;
use crate::models::{DimensionalModel, LogicalTable, SqlType};

use super::{DqCheck, DqCheckKind, DqError, DqReport};

const SAMPLE_LIMIT: usize = 5;

pub struct DqValidator;

impl DqValidator {
    /// Check every extract against the model: primary key uniqueness,
    /// foreign key resolution, null constraints, and type conformance.
    pub fn validate(
        model: &DimensionalModel,
        split: &SplitResult,
    ) -> Result<DqReport, DqError> {
        let mut checks: Vec<DqCheck> = Vec::new();

        // First pass per table: nulls, types, PK duplicates, and the PK sets
        // the relationship checks need afterwards.
        let mut pk_sets: HashMap<String, HashSet<String>> = HashMap::new();
        for table in &model.tables {
            let path = split
                .files
                .get(&table.name)
                .ok_or_else(|| DqError::MissingExtract(table.name.clone()))?;
            let outcome = Self::check_table(table, path)?;
            checks.extend(outcome.checks);
            pk_sets.insert(table.name.clone(), outcome.pk_values);
        }

        for rel in &model.relationships {
            let path = split
                .files
                .get(&rel.from_table)
                .ok_or_else(|| DqError::MissingExtract(rel.from_table.clone()))?;
            let targets = pk_sets
                .get(&rel.to_table)
                .ok_or_else(|| DqError::MissingExtract(rel.to_table.clone()))?;
            checks.push(Self::check_foreign_key(rel, path, targets)?);
        }

        let overall_passed = checks.iter().all(|c| c.passed);
        if !overall_passed {
            tracing::warn!(
                failures = checks.iter().filter(|c| !c.passed).count(),
                "data quality checks found violations"
            );
        }
        Ok(DqReport {
            checks,
            overall_passed,
        })
    }

    fn check_table(table: &LogicalTable, path: &Path) -> Result<TableOutcome, DqError> {
        let mut reader = csv::Reader::from_path(path)?;
        let headers: Vec<String> = reader.headers()?.iter().map(String::from).collect();
        let index_of = |name: &str| headers.iter().position(|h| h == name);

        let pk_indices: Vec<usize> = table
            .primary_key
            .iter()
            .filter_map(|c| index_of(c))
            .collect();
        let mut pk_values: HashSet<String> = HashSet::new();
        let mut pk_dups = 0u64;
        let mut pk_samples: Vec<String> = Vec::new();

        struct ColumnState {
            index: usize,
            name: String,
            sql_type: SqlType,
            nullable: bool,
            nulls: u64,
            null_samples: Vec<String>,
            bad_types: u64,
            type_samples: Vec<String>,
        }
        let mut states: Vec<ColumnState> = table
            .columns
            .iter()
            .filter_map(|c| {
                index_of(&c.name).map(|index| ColumnState {
                    index,
                    name: c.name.clone(),
                    sql_type: c.sql_type,
                    nullable: c.nullable,
                    nulls: 0,
                    null_samples: Vec::new(),
                    bad_types: 0,
                    type_samples: Vec::new(),
                })
            })
            .collect();

        let mut row_no = 0u64;
        for record in reader.records() {
            let record = record?;
            row_no += 1;

            if !pk_indices.is_empty() {
                let key: Vec<&str> = pk_indices
                    .iter()
                    .map(|&i| record.get(i).unwrap_or(""))
                    .collect();
                if !pk_values.insert(key.join("\u{1f}")) {
                    pk_dups += 1;
                    if pk_samples.len() < SAMPLE_LIMIT {
                        pk_samples.push(format!("row {row_no}: {}", key.join(", ")));
                    }
                }
            }

            for state in &mut states {
                let value = record.get(state.index).unwrap_or("");
                if value.is_empty() {
                    if !state.nullable {
                        state.nulls += 1;
                        if state.null_samples.len() < SAMPLE_LIMIT {
                            state.null_samples.push(format!("row {row_no}"));
                        }
                    }
                    continue;
                }
                if !conforms(value, state.sql_type) {
                    state.bad_types += 1;
                    if state.type_samples.len() < SAMPLE_LIMIT {
                        state.type_samples.push(value.to_string());
                    }
                }
            }
        }

        let mut checks = Vec::new();
        if !pk_indices.is_empty() {
            checks.push(DqCheck {
                kind: DqCheckKind::PrimaryKeyUnique,
                table: table.name.clone(),
                column: Some(table.primary_key.join(", ")),
                passed: pk_dups == 0,
                failure_count: pk_dups,
                samples: pk_samples,
            });
        }
        for state in states {
            if !state.nullable {
                checks.push(DqCheck {
                    kind: DqCheckKind::NotNull,
                    table: table.name.clone(),
                    column: Some(state.name.clone()),
                    passed: state.nulls == 0,
                    failure_count: state.nulls,
                    samples: state.null_samples,
                });
            }
            checks.push(DqCheck {
                kind: DqCheckKind::TypeConforms,
                table: table.name.clone(),
                column: Some(state.name),
                passed: state.bad_types == 0,
                failure_count: state.bad_types,
                samples: state.type_samples,
            });
        }
        Ok(TableOutcome { checks, pk_values })
    }

    fn check_foreign_key(
        rel: &crate::models::Relationship,
        from_path: &Path,
        targets: &HashSet<String>,
    ) -> Result<DqCheck, DqError> {
        let mut reader = csv::Reader::from_path(from_path)?;
        let headers = reader.headers()?.clone();
        let fk_index = headers.iter().position(|h| h == rel.from_column);

        let mut gaps = 0u64;
        let mut samples = Vec::new();
        if let Some(fk_index) = fk_index {
            for record in reader.records() {
                let record = record?;
                let value = record.get(fk_index).unwrap_or("");
                // Empty FK means the source had no natural key; not a gap.
                if value.is_empty() {
                    continue;
                }
                if !targets.contains(value) {
                    gaps += 1;
                    if samples.len() < SAMPLE_LIMIT {
                        samples.push(value.to_string());
                    }
                }
            }
        }
        Ok(DqCheck {
            kind: DqCheckKind::ForeignKeyResolves,
            table: rel.from_table.clone(),
            column: Some(rel.from_column.clone()),
            passed: gaps == 0,
            failure_count: gaps,
            samples,
        })
    }
}

struct TableOutcome {
    checks: Vec<DqCheck>,
    pk_values: HashSet<String>,
}

/// Whether a non-empty extract value conforms to its declared type. The PK
/// sets use raw strings, so keys compare exactly as written.
fn conforms(value: &str, sql_type: SqlType) -> bool {
    match sql_type {
        SqlType::Number => value.parse::<i64>().is_ok(),
        SqlType::Decimal | SqlType::Float => value.parse::<f64>().is_ok(),
        SqlType::Boolean => matches!(value, "true" | "false"),
        SqlType::Date => NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok(),
        SqlType::TimestampNtz => {
            NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S").is_ok()
                || NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S").is_ok()
        }
        SqlType::Text => true,
    }
}
