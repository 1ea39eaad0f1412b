//! Row splitting and CSV extract writing
//!
//! Walks the source once. Dimension rows are registered before the fact row
//! that references them, so every foreign key in the extracts points at a row
//! that exists. The calendar dimension is filled in at the end, one row per
//! day across the observed date range.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::path::Path;

use chrono::{Datelike, NaiveDate, NaiveDateTime};

use crate::batch::{BatchSource, Value};
use crate::classify::Grain;
use crate::models::{DimensionalModel, TableKind};

use super::surrogate::{SurrogateKeyMap, normalize_part, row_hash, surrogate_of};
use super::{MaterializeError, SplitResult};

const META_COLUMNS: [&str; 4] = ["LOAD_TS", "SOURCE_FILE_NAME", "ROW_HASH", "RECORD_SOURCE"];
const LOAD_TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// How one output column of the fact table is produced.
enum FactColumn {
    SurrogateKey,
    Source(usize),
    DimensionFk(usize),
    DateFk(usize),
    Meta(usize),
}

struct DimensionPlan {
    table_index: usize,
    /// Source column indices forming the natural key tuple.
    key_sources: Vec<usize>,
    /// Source index per non-generated output column, in table column order.
    output_sources: Vec<usize>,
}

struct ChildPlan {
    table_index: usize,
    list_source: usize,
}

/// Splits profiled sources into per-table CSV extracts.
pub struct Splitter<'a> {
    model: &'a DimensionalModel,
    grain: &'a Grain,
}

impl<'a> Splitter<'a> {
    pub fn new(model: &'a DimensionalModel, grain: &'a Grain) -> Self {
        Self { model, grain }
    }

    /// Split the source into the given directory, stamping rows with the
    /// current time.
    pub fn split<S: BatchSource>(
        &self,
        source: &S,
        out_dir: &Path,
    ) -> Result<SplitResult, MaterializeError> {
        self.split_at(source, out_dir, chrono::Utc::now().naive_utc())
    }

    /// Split with an explicit load timestamp. Everything except `LOAD_TS` is
    /// a pure function of the source content and the model.
    pub fn split_at<S: BatchSource>(
        &self,
        source: &S,
        out_dir: &Path,
        load_ts: NaiveDateTime,
    ) -> Result<SplitResult, MaterializeError> {
        let columns = source.columns();
        let resolve = |name: &str| -> Result<usize, MaterializeError> {
            columns
                .iter()
                .position(|c| c == name)
                .ok_or_else(|| MaterializeError::UnknownColumn(name.to_string()))
        };

        let fact_table = self
            .model
            .fact_table()
            .ok_or_else(|| MaterializeError::UnknownColumn("FACT_SK".to_string()))?;

        // Resolve source indices for every table up front so a model/source
        // mismatch fails before any file is created.
        let mut dims: Vec<DimensionPlan> = Vec::new();
        let mut children: Vec<ChildPlan> = Vec::new();
        let mut date_table: Option<usize> = None;
        for (i, table) in self.model.tables.iter().enumerate() {
            match table.kind {
                TableKind::Dimension => {
                    let key_sources = table
                        .natural_key
                        .iter()
                        .map(|c| resolve(c))
                        .collect::<Result<Vec<_>, _>>()?;
                    let output_sources = table
                        .columns
                        .iter()
                        .filter_map(|c| c.source_column.as_deref())
                        .map(resolve)
                        .collect::<Result<Vec<_>, _>>()?;
                    dims.push(DimensionPlan {
                        table_index: i,
                        key_sources,
                        output_sources,
                    });
                }
                TableKind::DateDimension => date_table = Some(i),
                TableKind::Child => {
                    let list_column = table
                        .columns
                        .iter()
                        .find_map(|c| c.source_column.as_deref())
                        .ok_or_else(|| {
                            MaterializeError::UnknownColumn(table.name.clone())
                        })?;
                    children.push(ChildPlan {
                        table_index: i,
                        list_source: resolve(list_column)?,
                    });
                }
                TableKind::Fact => {}
            }
        }

        let grain_sources = self
            .grain
            .key_columns
            .iter()
            .map(|c| resolve(c))
            .collect::<Result<Vec<_>, _>>()?;

        // Map each fact output column to its production rule.
        let mut fact_plan: Vec<FactColumn> = Vec::new();
        for col in &fact_table.columns {
            if col.name == "FACT_SK" {
                fact_plan.push(FactColumn::SurrogateKey);
            } else if let Some(pos) = META_COLUMNS.iter().position(|m| *m == col.name) {
                fact_plan.push(FactColumn::Meta(pos));
            } else if let Some(fk) = &col.references {
                if fk.table == "DIM_DATE" {
                    let src = col
                        .source_column
                        .as_deref()
                        .ok_or_else(|| MaterializeError::UnknownColumn(col.name.clone()))?;
                    fact_plan.push(FactColumn::DateFk(resolve(src)?));
                } else {
                    let dim_slot = dims
                        .iter()
                        .position(|d| self.model.tables[d.table_index].name == fk.table)
                        .ok_or_else(|| MaterializeError::UnknownColumn(fk.table.clone()))?;
                    fact_plan.push(FactColumn::DimensionFk(dim_slot));
                }
            } else if let Some(src) = &col.source_column {
                fact_plan.push(FactColumn::Source(resolve(src)?));
            } else {
                return Err(MaterializeError::UnknownColumn(col.name.clone()));
            }
        }

        std::fs::create_dir_all(out_dir)?;
        let mut writers: BTreeMap<String, csv::Writer<File>> = BTreeMap::new();
        let mut files = BTreeMap::new();
        let mut row_counts: BTreeMap<String, u64> = BTreeMap::new();
        for table in &self.model.tables {
            let path = out_dir.join(format!("{}.csv", table.name.to_lowercase()));
            let mut writer = csv::Writer::from_path(&path)?;
            writer.write_record(table.column_names())?;
            writers.insert(table.name.clone(), writer);
            files.insert(table.name.clone(), path);
            row_counts.insert(table.name.clone(), 0);
        }

        let load_ts_text = load_ts.format(LOAD_TS_FORMAT).to_string();
        let source_name = source.source_name().to_string();
        let mut key_maps: Vec<SurrogateKeyMap> =
            dims.iter().map(|_| SurrogateKeyMap::new()).collect();
        let mut observed_dates: BTreeSet<NaiveDate> = BTreeSet::new();
        let mut skipped_rows = 0u64;

        for batch in source.scan() {
            for row in &batch.rows {
                if row.len() != columns.len() {
                    skipped_rows += 1;
                    continue;
                }
                let hash = row_hash(row);

                // Dimensions first, so fact foreign keys always resolve.
                let mut fks: Vec<String> = Vec::with_capacity(dims.len());
                for (slot, dim) in dims.iter().enumerate() {
                    let table = &self.model.tables[dim.table_index];
                    let parts: Vec<String> = dim
                        .key_sources
                        .iter()
                        .map(|&i| normalize_part(&row[i]))
                        .collect();
                    if parts.iter().all(String::is_empty) {
                        // Null natural key: no dimension row, empty FK.
                        fks.push(String::new());
                        continue;
                    }
                    let registered = key_maps[slot].register(&parts).map_err(|source| {
                        MaterializeError::KeyCollision {
                            table: table.name.clone(),
                            source,
                        }
                    })?;
                    if registered.inserted {
                        let dim_values: Vec<Value> = dim
                            .output_sources
                            .iter()
                            .map(|&i| row[i].clone())
                            .collect();
                        let mut record = vec![registered.key.clone()];
                        record.extend(dim_values.iter().map(Value::render));
                        push_meta(&mut record, &load_ts_text, &source_name, &row_hash(&dim_values));
                        write_row(&mut writers, &mut row_counts, &table.name, &record)?;
                    }
                    fks.push(registered.key);
                }

                let fact_sk = if self.grain.synthetic {
                    hash.clone()
                } else {
                    let parts: Vec<String> = grain_sources
                        .iter()
                        .map(|&i| normalize_part(&row[i]))
                        .collect();
                    surrogate_of(&parts)
                };

                let mut record: Vec<String> = Vec::with_capacity(fact_plan.len());
                for item in &fact_plan {
                    match item {
                        FactColumn::SurrogateKey => record.push(fact_sk.clone()),
                        FactColumn::Source(i) => record.push(row[*i].render()),
                        FactColumn::DimensionFk(slot) => {
                            let key = &fks[*slot];
                            // Registration above makes a gap impossible; if one
                            // shows up anyway the key maps are out of sync and
                            // the run must not produce extracts.
                            if !key.is_empty() && !key_maps[*slot].contains(key) {
                                return Err(MaterializeError::ReferentialGap {
                                    table: self.model.tables[dims[*slot].table_index]
                                        .name
                                        .clone(),
                                    key: key.clone(),
                                });
                            }
                            record.push(key.clone());
                        }
                        FactColumn::DateFk(i) => match row[*i].as_date() {
                            Some(date) => {
                                observed_dates.insert(date);
                                record.push(date_key(date));
                            }
                            None => record.push(String::new()),
                        },
                        FactColumn::Meta(pos) => record.push(match pos {
                            0 => load_ts_text.clone(),
                            1 => source_name.clone(),
                            2 => hash.clone(),
                            _ => source_name.clone(),
                        }),
                    }
                }
                write_row(&mut writers, &mut row_counts, &fact_table.name, &record)?;

                for child in &children {
                    let table = &self.model.tables[child.table_index];
                    let Value::List(items) = &row[child.list_source] else {
                        continue;
                    };
                    // SEQ_NO is the 0-based position within the source list.
                    for (seq, item) in items.iter().enumerate() {
                        let mut record =
                            vec![fact_sk.clone(), seq.to_string(), item.render()];
                        push_meta(&mut record, &load_ts_text, &source_name, &hash);
                        write_row(&mut writers, &mut row_counts, &table.name, &record)?;
                    }
                }
            }
        }

        // Calendar rows cover the full observed range so date joins never gap.
        if let (Some(i), (Some(&first), Some(&last))) = (
            date_table,
            (observed_dates.iter().next(), observed_dates.iter().last()),
        ) {
            let table = &self.model.tables[i];
            let mut day = first;
            while day <= last {
                let record = calendar_row(day, &load_ts_text, &source_name);
                write_row(&mut writers, &mut row_counts, &table.name, &record)?;
                day = day.succ_opt().expect("date range is bounded");
            }
        }

        for writer in writers.values_mut() {
            writer.flush()?;
        }
        tracing::info!(
            tables = files.len(),
            skipped = skipped_rows,
            "materialization pass complete"
        );
        Ok(SplitResult {
            files,
            row_counts,
            skipped_rows,
            load_ts,
        })
    }
}

/// Deterministic key for one calendar day.
pub fn date_key(date: NaiveDate) -> String {
    surrogate_of(&[date.format("%Y-%m-%d").to_string()])
}

fn push_meta(record: &mut Vec<String>, load_ts: &str, source_name: &str, hash: &str) {
    record.push(load_ts.to_string());
    record.push(source_name.to_string());
    record.push(hash.to_string());
    record.push(source_name.to_string());
}

fn calendar_row(day: NaiveDate, load_ts: &str, source_name: &str) -> Vec<String> {
    let weekday = day.weekday();
    let mut record = vec![
        date_key(day),
        day.format("%Y-%m-%d").to_string(),
        day.year().to_string(),
        ((day.month() - 1) / 3 + 1).to_string(),
        day.month().to_string(),
        day.day().to_string(),
        weekday.number_from_monday().to_string(),
        day.format("%A").to_string(),
        day.format("%B").to_string(),
        matches!(weekday, chrono::Weekday::Sat | chrono::Weekday::Sun).to_string(),
    ];
    // Calendar rows hash their own natural key.
    let nk_hash = row_hash(&[Value::Date(day)]);
    push_meta(&mut record, load_ts, source_name, &nk_hash);
    record
}

fn write_row(
    writers: &mut BTreeMap<String, csv::Writer<File>>,
    row_counts: &mut BTreeMap<String, u64>,
    table: &str,
    record: &[String],
) -> Result<(), MaterializeError> {
    let writer = writers.get_mut(table).expect("writer exists for every table");
    writer.write_record(record)?;
    *row_counts.get_mut(table).expect("count exists for every table") += 1;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::MemorySource;
    use crate::classify::EntityClassifier;
    use crate::config::PipelineConfig;
    use crate::modeling::ModelGenerator;
    use crate::profile::keys::KeyCandidateDetector;
    use crate::profile::profiler::ColumnProfiler;

    fn transactions_source(batch_size: usize) -> MemorySource {
        let columns = vec![
            "transaction_id".to_string(),
            "customer_id".to_string(),
            "customer_name".to_string(),
            "amount".to_string(),
        ];
        let rows = vec![
            vec![
                Value::Integer(1),
                Value::Integer(101),
                Value::Text("Acme".into()),
                Value::Float(10.0),
            ],
            vec![
                Value::Integer(2),
                Value::Integer(101),
                Value::Text("Acme".into()),
                Value::Float(20.0),
            ],
            vec![
                Value::Integer(3),
                Value::Integer(102),
                Value::Text("Globex".into()),
                Value::Float(30.0),
            ],
        ];
        MemorySource::new("transactions.csv", columns, rows, batch_size)
    }

    fn build_model(
        source: &MemorySource,
        config: &PipelineConfig,
    ) -> (DimensionalModel, Grain) {
        let (profiles, table_profile) = ColumnProfiler::profile_source(source, config).unwrap();
        let proposals = KeyCandidateDetector::generate(&profiles, config);
        let candidates = KeyCandidateDetector::validate(source, &proposals);
        let classification = EntityClassifier::classify(&profiles, &candidates, config);
        let grain = crate::classify::GrainDetector::detect(&candidates);
        let model = ModelGenerator::generate(
            source.source_name(),
            &profiles,
            &classification,
            &grain,
            &table_profile,
            config,
        )
        .unwrap();
        (model, grain)
    }

    fn read_csv(path: &Path) -> Vec<Vec<String>> {
        let mut reader = csv::Reader::from_path(path).unwrap();
        let headers: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
        let mut rows = vec![headers];
        for record in reader.records() {
            rows.push(record.unwrap().iter().map(String::from).collect());
        }
        rows
    }

    #[test]
    fn repeated_natural_keys_share_one_dimension_row() {
        let config = PipelineConfig {
            parallel_profiling: false,
            ..Default::default()
        };
        let source = transactions_source(2);
        let (model, grain) = build_model(&source, &config);
        let dir = tempfile::tempdir().unwrap();
        let ts = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let result = Splitter::new(&model, &grain)
            .split_at(&source, dir.path(), ts)
            .unwrap();

        assert_eq!(result.row_counts["DIM_CUSTOMER"], 2);
        assert_eq!(result.row_counts["FACT_TRANSACTIONS"], 3);

        // Both rows for customer 101 carry the same foreign key.
        let fact = read_csv(&result.files["FACT_TRANSACTIONS"]);
        let fk_idx = fact[0].iter().position(|c| c == "CUSTOMER_FK").unwrap();
        assert_eq!(fact[1][fk_idx], fact[2][fk_idx]);
        assert_ne!(fact[1][fk_idx], fact[3][fk_idx]);
    }

    #[test]
    fn extracts_are_identical_across_batch_sizes() {
        let config = PipelineConfig {
            parallel_profiling: false,
            ..Default::default()
        };
        let ts = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();

        let mut outputs = Vec::new();
        for batch_size in [1, 3] {
            let source = transactions_source(batch_size);
            let (model, grain) = build_model(&source, &config);
            let dir = tempfile::tempdir().unwrap();
            let result = Splitter::new(&model, &grain)
                .split_at(&source, dir.path(), ts)
                .unwrap();
            let mut content: Vec<(String, Vec<Vec<String>>)> = result
                .files
                .iter()
                .map(|(name, path)| (name.clone(), read_csv(path)))
                .collect();
            content.sort();
            outputs.push(content);
        }
        assert_eq!(outputs[0], outputs[1]);
    }

    #[test]
    fn every_fact_fk_resolves_to_a_dimension_row() {
        let config = PipelineConfig {
            parallel_profiling: false,
            ..Default::default()
        };
        let source = transactions_source(2);
        let (model, grain) = build_model(&source, &config);
        let dir = tempfile::tempdir().unwrap();
        let result = Splitter::new(&model, &grain).split(&source, dir.path()).unwrap();

        let dim = read_csv(&result.files["DIM_CUSTOMER"]);
        let dim_keys: std::collections::HashSet<&String> =
            dim[1..].iter().map(|r| &r[0]).collect();
        let fact = read_csv(&result.files["FACT_TRANSACTIONS"]);
        let fk_idx = fact[0].iter().position(|c| c == "CUSTOMER_FK").unwrap();
        for row in &fact[1..] {
            assert!(dim_keys.contains(&row[fk_idx]));
        }
    }

    #[test]
    fn null_natural_key_leaves_fk_empty() {
        let config = PipelineConfig {
            parallel_profiling: false,
            ..Default::default()
        };
        let columns = vec![
            "order_id".to_string(),
            "customer_id".to_string(),
            "amount".to_string(),
        ];
        let rows = vec![
            vec![Value::Integer(1), Value::Integer(5), Value::Float(1.0)],
            vec![Value::Integer(2), Value::Null, Value::Float(2.0)],
        ];
        let source = MemorySource::new("orders.csv", columns, rows, 10);
        let (model, grain) = build_model(&source, &config);
        let dir = tempfile::tempdir().unwrap();
        let result = Splitter::new(&model, &grain).split(&source, dir.path()).unwrap();

        assert_eq!(result.row_counts["DIM_CUSTOMER"], 1);
        let fact = read_csv(&result.files["FACT_ORDERS"]);
        let fk_idx = fact[0].iter().position(|c| c == "CUSTOMER_FK").unwrap();
        assert!(fact[2][fk_idx].is_empty());
    }

    #[test]
    fn calendar_dimension_covers_the_full_range() {
        let config = PipelineConfig {
            parallel_profiling: false,
            ..Default::default()
        };
        let columns = vec![
            "order_id".to_string(),
            "order_date".to_string(),
            "amount".to_string(),
        ];
        let rows = vec![
            vec![
                Value::Integer(1),
                Value::Date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()),
                Value::Float(1.0),
            ],
            vec![
                Value::Integer(2),
                Value::Date(NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()),
                Value::Float(2.0),
            ],
        ];
        let source = MemorySource::new("orders.csv", columns, rows, 10);
        let (model, grain) = build_model(&source, &config);
        let dir = tempfile::tempdir().unwrap();
        let result = Splitter::new(&model, &grain).split(&source, dir.path()).unwrap();

        // Five days inclusive, even though only two appear in the data.
        assert_eq!(result.row_counts["DIM_DATE"], 5);
        let dates = read_csv(&result.files["DIM_DATE"]);
        assert_eq!(dates[1][1], "2024-01-01");
        assert_eq!(dates[5][1], "2024-01-05");
    }
}
