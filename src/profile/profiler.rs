//! Streaming column profiler
//!
//! First pass over the source. Each batch folds into per-column accumulators;
//! because every statistic merges associatively and commutatively, batches can
//! be profiled on worker threads and reduced in any order without changing the
//! final profiles.

use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::batch::{BatchSource, RowBatch};
use crate::config::PipelineConfig;
use crate::profile::ProfileError;
use crate::profile::column::{ColumnAccumulator, ColumnProfile};

/// Table-level counters from the profiling pass.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableProfile {
    /// Rows folded into the profiles.
    pub row_count: u64,
    /// Malformed rows (wrong column count) skipped and counted, not fatal.
    pub skipped_rows: u64,
}

/// Incremental profiler over typed row batches.
#[derive(Debug, Clone)]
pub struct ColumnProfiler {
    columns: Vec<String>,
    accumulators: Vec<ColumnAccumulator>,
    row_count: u64,
    skipped_rows: u64,
}

impl ColumnProfiler {
    pub fn new(columns: &[String], config: &PipelineConfig) -> Self {
        Self {
            columns: columns.to_vec(),
            accumulators: columns
                .iter()
                .map(|name| ColumnAccumulator::new(name, config))
                .collect(),
            row_count: 0,
            skipped_rows: 0,
        }
    }

    /// Fold one batch into the running state.
    ///
    /// Individual rows with the wrong width are skipped and counted. A
    /// non-empty batch where every row is malformed indicates a decoding
    /// fault upstream and aborts the run with the batch offset.
    pub fn merge_batch(&mut self, batch: &RowBatch) -> Result<(), ProfileError> {
        let width = self.columns.len();
        let mut good = 0u64;
        for row in &batch.rows {
            if row.len() != width {
                self.skipped_rows += 1;
                continue;
            }
            good += 1;
            for (acc, value) in self.accumulators.iter_mut().zip(row.iter()) {
                acc.observe(value);
            }
        }
        if good == 0 && !batch.is_empty() {
            return Err(ProfileError::MalformedBatch {
                offset: batch.offset,
                expected: width,
            });
        }
        self.row_count += good;
        if good < batch.len() as u64 {
            tracing::warn!(
                offset = batch.offset,
                skipped = batch.len() as u64 - good,
                "skipped malformed rows in batch"
            );
        }
        Ok(())
    }

    /// Merge another profiler built over a disjoint slice of the stream.
    pub fn merge(&mut self, other: &ColumnProfiler) {
        debug_assert_eq!(self.columns, other.columns);
        for (acc, o) in self.accumulators.iter_mut().zip(other.accumulators.iter()) {
            acc.merge(o);
        }
        self.row_count += other.row_count;
        self.skipped_rows += other.skipped_rows;
    }

    /// Finalize into immutable profiles. Consumes the profiler; the running
    /// state is not reusable afterwards.
    pub fn finalize(self) -> (Vec<ColumnProfile>, TableProfile) {
        let profiles = self.accumulators.iter().map(|a| a.finalize()).collect();
        (
            profiles,
            TableProfile {
                row_count: self.row_count,
                skipped_rows: self.skipped_rows,
            },
        )
    }

    /// Profile an entire source in one pass.
    ///
    /// With `parallel_profiling` enabled, batches are distributed across the
    /// rayon pool and the per-thread profilers reduced afterwards; merge
    /// associativity guarantees the same result as the serial fold.
    pub fn profile_source<S: BatchSource + Sync>(
        source: &S,
        config: &PipelineConfig,
    ) -> Result<(Vec<ColumnProfile>, TableProfile), ProfileError> {
        let columns: Vec<String> = source.columns().to_vec();
        if columns.is_empty() {
            return Err(ProfileError::EmptySchema);
        }

        let profiler = if config.parallel_profiling {
            // Batches are drained up-front in bounded groups so the working
            // set stays at O(group size), not O(input size).
            let mut merged = ColumnProfiler::new(&columns, config);
            let mut scan = source.scan();
            loop {
                let group: Vec<RowBatch> = scan.by_ref().take(64).collect();
                if group.is_empty() {
                    break;
                }
                let partial = group
                    .into_par_iter()
                    .map(|batch| {
                        let mut p = ColumnProfiler::new(&columns, config);
                        p.merge_batch(&batch)?;
                        Ok(p)
                    })
                    .try_reduce(
                        || ColumnProfiler::new(&columns, config),
                        |mut a, b| {
                            a.merge(&b);
                            Ok(a)
                        },
                    )?;
                merged.merge(&partial);
            }
            merged
        } else {
            let mut p = ColumnProfiler::new(&columns, config);
            for batch in source.scan() {
                p.merge_batch(&batch)?;
            }
            p
        };

        tracing::info!(
            rows = profiler.row_count,
            skipped = profiler.skipped_rows,
            columns = columns.len(),
            "profiling pass complete"
        );
        Ok(profiler.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::{MemorySource, Value};

    fn source(rows: Vec<Vec<Value>>, batch_size: usize) -> MemorySource {
        MemorySource::new(
            "orders.csv",
            vec!["id".to_string(), "amount".to_string()],
            rows,
            batch_size,
        )
    }

    #[test]
    fn profiles_do_not_depend_on_batch_size() {
        let rows: Vec<Vec<Value>> = (0..200)
            .map(|i| vec![Value::Integer(i), Value::Float((i % 13) as f64)])
            .collect();
        let config = PipelineConfig {
            parallel_profiling: false,
            ..Default::default()
        };
        let (small, _) =
            ColumnProfiler::profile_source(&source(rows.clone(), 7), &config).unwrap();
        let (large, _) = ColumnProfiler::profile_source(&source(rows, 100), &config).unwrap();
        for (a, b) in small.iter().zip(large.iter()) {
            assert_eq!(a.distinct_count, b.distinct_count);
            assert_eq!(a.mean, b.mean);
            assert_eq!(a.min, b.min);
            assert_eq!(a.top_values, b.top_values);
        }
    }

    #[test]
    fn parallel_matches_serial() {
        let rows: Vec<Vec<Value>> = (0..500)
            .map(|i| vec![Value::Integer(i % 50), Value::Float(i as f64)])
            .collect();
        let serial_cfg = PipelineConfig {
            parallel_profiling: false,
            ..Default::default()
        };
        let parallel_cfg = PipelineConfig::default();
        let (serial, _) =
            ColumnProfiler::profile_source(&source(rows.clone(), 32), &serial_cfg).unwrap();
        let (parallel, _) =
            ColumnProfiler::profile_source(&source(rows, 32), &parallel_cfg).unwrap();
        for (a, b) in serial.iter().zip(parallel.iter()) {
            assert_eq!(a.distinct_count, b.distinct_count);
            assert_eq!(a.outlier_count, b.outlier_count);
        }
    }

    #[test]
    fn malformed_rows_are_skipped_and_counted() {
        let rows = vec![
            vec![Value::Integer(1), Value::Float(2.0)],
            vec![Value::Integer(2)], // short row
            vec![Value::Integer(3), Value::Float(4.0)],
        ];
        let config = PipelineConfig {
            parallel_profiling: false,
            ..Default::default()
        };
        let (_, table) = ColumnProfiler::profile_source(&source(rows, 10), &config).unwrap();
        assert_eq!(table.row_count, 2);
        assert_eq!(table.skipped_rows, 1);
    }

    #[test]
    fn fully_malformed_batch_aborts_with_offset() {
        let rows = vec![
            vec![Value::Integer(1), Value::Float(2.0)],
            vec![Value::Integer(2), Value::Float(3.0)],
            vec![Value::Integer(9)],
            vec![Value::Integer(8)],
        ];
        let config = PipelineConfig {
            parallel_profiling: false,
            ..Default::default()
        };
        let err = ColumnProfiler::profile_source(&source(rows, 2), &config).unwrap_err();
        match err {
            ProfileError::MalformedBatch { offset, .. } => assert_eq!(offset, 2),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
