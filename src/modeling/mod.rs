//! Modeling pass
//!
//! Turns profiles, classifications, and the detected grain into a logical
//! schema: one central fact table, dimensions grouped by entity prefix, a
//! calendar dimension when dates exist, and child tables for repeating
//! groups. The generator is a pure function of its inputs, so the same
//! profiles always produce the same model.

pub mod naming;

use std::collections::{BTreeMap, HashSet};

use crate::classify::{ColumnRole, Grain, TableClassification};
use crate::config::PipelineConfig;
use crate::models::{
    DimensionalModel, LogicalColumn, LogicalTable, ModelValidationError, Relationship,
    ScdPattern, SchemaStrategy, SqlType, TableKind,
};
use crate::profile::column::{ColumnProfile, InferredType};
use crate::profile::profiler::TableProfile;

/// Error during the modeling pass
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("no columns to model")]
    NoColumns,
    #[error("generated model failed validation: {0}")]
    Validation(#[from] ModelValidationError),
}

/// Physical type for a profiled column.
pub fn sql_type_of(inferred: InferredType) -> SqlType {
    match inferred {
        InferredType::Integer => SqlType::Number,
        InferredType::Decimal => SqlType::Decimal,
        InferredType::Float => SqlType::Float,
        InferredType::Boolean => SqlType::Boolean,
        InferredType::Date => SqlType::Date,
        InferredType::Timestamp => SqlType::TimestampNtz,
        InferredType::Text | InferredType::List => SqlType::Text,
    }
}

/// Columns every generated table carries for lineage and auditing.
pub fn metadata_columns() -> Vec<LogicalColumn> {
    let mut load_ts = LogicalColumn::new("LOAD_TS", SqlType::TimestampNtz);
    load_ts.nullable = false;
    let mut rest: Vec<LogicalColumn> = ["SOURCE_FILE_NAME", "ROW_HASH", "RECORD_SOURCE"]
        .iter()
        .map(|n| {
            let mut c = LogicalColumn::new(n, SqlType::Text);
            c.nullable = true;
            c
        })
        .collect();
    let mut cols = vec![load_ts];
    cols.append(&mut rest);
    cols
}

/// Picks the overall schema shape.
pub struct SchemaChooser;

impl SchemaChooser {
    /// Star when the source yields a fact surrounded by dimensions; third
    /// normal form when repeating groups force child-table extraction or no
    /// dimension could be carved out at all.
    pub fn choose(profiles: &[ColumnProfile], dimension_count: usize) -> SchemaStrategy {
        let has_lists = profiles
            .iter()
            .any(|p| p.inferred_type == InferredType::List);
        if has_lists || dimension_count == 0 {
            SchemaStrategy::ThirdNormalForm
        } else {
            SchemaStrategy::Star
        }
    }
}

/// One dimension being assembled, before it becomes a table.
struct DimensionDraft {
    entity: String,
    /// Source columns forming the natural key. Empty for content-keyed dims.
    natural_key: Vec<String>,
    /// Source attribute columns, in source order.
    attributes: Vec<String>,
}

/// Generates the dimensional model for one source.
pub struct ModelGenerator;

impl ModelGenerator {
    pub fn generate(
        source_name: &str,
        profiles: &[ColumnProfile],
        classification: &TableClassification,
        grain: &Grain,
        table_profile: &TableProfile,
        config: &PipelineConfig,
    ) -> Result<DimensionalModel, ModelError> {
        if profiles.is_empty() {
            return Err(ModelError::NoColumns);
        }

        let grain_set: HashSet<&str> = grain.key_columns.iter().map(String::as_str).collect();
        let role_of = |name: &str| classification.role_of(name);
        let profile_of = |name: &str| {
            profiles
                .iter()
                .find(|p| p.name == name)
                .expect("classification names come from profiles")
        };

        let mut dims: Vec<DimensionDraft> = Vec::new();
        let mut claimed: HashSet<String> = HashSet::new();

        // Natural keys outside the grain each seed a dimension.
        for profile in profiles {
            if grain_set.contains(profile.name.as_str()) {
                continue;
            }
            if role_of(&profile.name) != Some(ColumnRole::NaturalKey) {
                continue;
            }
            let Some(entity) = naming::entity_of(&profile.name) else {
                continue;
            };
            claimed.insert(profile.name.clone());
            match dims.iter_mut().find(|d| d.entity == entity) {
                Some(draft) => draft.natural_key.push(profile.name.clone()),
                None => dims.push(DimensionDraft {
                    entity,
                    natural_key: vec![profile.name.clone()],
                    attributes: Vec::new(),
                }),
            }
        }

        // Attributes whose prefix matches a seeded entity travel with it.
        // Entity-prefixed date columns stay as dimension attributes too; only
        // unclaimed dates route through the calendar dimension.
        for profile in profiles {
            if claimed.contains(&profile.name) || grain_set.contains(profile.name.as_str()) {
                continue;
            }
            let role = role_of(&profile.name);
            if !matches!(
                role,
                Some(ColumnRole::Attribute) | Some(ColumnRole::FreeText) | Some(ColumnRole::Date)
            ) {
                continue;
            }
            let Some(prefix) = naming::prefix_of(&profile.name) else {
                continue;
            };
            let entity = naming::physical(prefix);
            if let Some(draft) = dims.iter_mut().find(|d| d.entity == entity) {
                draft.attributes.push(profile.name.clone());
                claimed.insert(profile.name.clone());
            }
        }

        // Remaining attributes that share a prefix form content-keyed dims.
        let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for profile in profiles {
            if claimed.contains(&profile.name) || grain_set.contains(profile.name.as_str()) {
                continue;
            }
            if role_of(&profile.name) != Some(ColumnRole::Attribute) {
                continue;
            }
            if let Some(prefix) = naming::prefix_of(&profile.name) {
                groups
                    .entry(naming::physical(prefix))
                    .or_default()
                    .push(profile.name.clone());
            }
        }
        let mut review_flags = classification.review_flags.clone();
        for (entity, columns) in groups {
            if columns.len() < 2 || dims.iter().any(|d| d.entity == entity) {
                continue;
            }
            review_flags.push(format!(
                "dimension DIM_{entity} has no id column; rows are keyed by the full \
                 attribute tuple"
            ));
            for c in &columns {
                claimed.insert(c.clone());
            }
            dims.push(DimensionDraft {
                entity,
                natural_key: Vec::new(),
                attributes: columns,
            });
        }

        // Date columns not claimed by an entity dimension go through DIM_DATE.
        let calendar_dates: Vec<String> = profiles
            .iter()
            .filter(|p| {
                !claimed.contains(&p.name)
                    && !grain_set.contains(p.name.as_str())
                    && role_of(&p.name) == Some(ColumnRole::Date)
            })
            .map(|p| p.name.clone())
            .collect();

        // Assemble dimension tables.
        let mut tables: Vec<LogicalTable> = Vec::new();
        let mut relationships: Vec<Relationship> = Vec::new();
        for draft in &dims {
            let table_name = naming::dimension_table(&draft.entity);
            let sk = naming::surrogate_key(&draft.entity);
            let mut columns = vec![LogicalColumn::new(&sk, SqlType::Text)];
            for source in &draft.natural_key {
                let p = profile_of(source);
                let mut col = LogicalColumn::from_source(
                    &naming::physical(source),
                    sql_type_of(p.inferred_type),
                    source,
                );
                col.nullable = false;
                columns.push(col);
            }
            let mut has_date_attr = false;
            for source in &draft.attributes {
                let p = profile_of(source);
                let ty = sql_type_of(p.inferred_type);
                if matches!(ty, SqlType::Date | SqlType::TimestampNtz) {
                    has_date_attr = true;
                }
                columns.push(LogicalColumn::from_source(
                    &naming::physical(source),
                    ty,
                    source,
                ));
            }
            columns.extend(metadata_columns());

            let mut table = LogicalTable::new(&table_name, TableKind::Dimension, columns);
            table.primary_key = vec![sk];
            table.natural_key = if draft.natural_key.is_empty() {
                draft.attributes.clone()
            } else {
                draft.natural_key.clone()
            };
            // History-bearing attributes suggest tracking changes over time.
            table.scd_pattern = Some(if has_date_attr {
                ScdPattern::Type2
            } else {
                ScdPattern::Type1
            });
            tables.push(table);
        }

        // Calendar dimension, shared by every unclaimed date column.
        if !calendar_dates.is_empty() {
            tables.push(Self::date_dimension());
        }

        // Central fact table.
        let grain_entity = grain
            .key_columns
            .first()
            .filter(|_| grain.key_columns.len() == 1)
            .and_then(|c| naming::entity_of(c));
        let fact_name = naming::fact_table(grain_entity.as_deref());

        let mut fact_columns = vec![LogicalColumn::new("FACT_SK", SqlType::Text)];
        for source in &grain.key_columns {
            let p = profile_of(source);
            let mut col = LogicalColumn::from_source(
                &naming::physical(source),
                sql_type_of(p.inferred_type),
                source,
            );
            col.nullable = false;
            fact_columns.push(col);
        }
        for draft in &dims {
            let sk = naming::surrogate_key(&draft.entity);
            let fk = naming::foreign_key(&draft.entity);
            let table_name = naming::dimension_table(&draft.entity);
            // Nullable: a row with a null natural key gets an empty FK.
            let mut col = LogicalColumn::new(&fk, SqlType::Text).with_reference(&table_name, &sk);
            col.nullable = true;
            fact_columns.push(col);
            relationships.push(Relationship::new(&fact_name, &fk, &table_name, &sk));
        }
        for source in &calendar_dates {
            let fk = format!("{}_FK", naming::physical(source));
            let mut col = LogicalColumn::new(&fk, SqlType::Text).with_reference("DIM_DATE", "DATE_SK");
            col.source_column = Some(source.clone());
            col.nullable = true;
            fact_columns.push(col);
            relationships.push(Relationship::new(&fact_name, &fk, "DIM_DATE", "DATE_SK"));
        }
        for profile in profiles {
            if role_of(&profile.name) != Some(ColumnRole::Measure)
                || grain_set.contains(profile.name.as_str())
            {
                continue;
            }
            fact_columns.push(LogicalColumn::from_source(
                &naming::physical(&profile.name),
                sql_type_of(profile.inferred_type),
                &profile.name,
            ));
        }
        // Degenerate attributes and free text stay on the fact.
        for profile in profiles {
            if claimed.contains(&profile.name)
                || grain_set.contains(profile.name.as_str())
                || calendar_dates.contains(&profile.name)
            {
                continue;
            }
            if !matches!(
                role_of(&profile.name),
                Some(ColumnRole::Attribute) | Some(ColumnRole::FreeText)
            ) {
                continue;
            }
            if profile.inferred_type == InferredType::List {
                continue; // extracted into a child table below
            }
            fact_columns.push(LogicalColumn::from_source(
                &naming::physical(&profile.name),
                sql_type_of(profile.inferred_type),
                &profile.name,
            ));
        }
        fact_columns.extend(metadata_columns());

        let mut fact = LogicalTable::new(&fact_name, TableKind::Fact, fact_columns);
        fact.primary_key = vec!["FACT_SK".to_string()];
        fact.natural_key = grain.key_columns.clone();
        fact.grain = Some(grain.description.clone());
        if table_profile.row_count > config.clustering_row_threshold {
            fact.clustering_key = match calendar_dates.first() {
                Some(d) => vec![format!("{}_FK", naming::physical(d))],
                None => grain.key_columns.iter().map(|c| naming::physical(c)).collect(),
            };
        }
        tables.insert(0, fact);

        // Repeating-group columns become child tables keyed by the fact row.
        for profile in profiles {
            if profile.inferred_type != InferredType::List {
                continue;
            }
            let child_name = format!("{fact_name}_{}", naming::physical(&profile.name));
            let mut columns = vec![
                LogicalColumn::new("FACT_SK", SqlType::Text).with_reference(&fact_name, "FACT_SK"),
                LogicalColumn::new("SEQ_NO", SqlType::Number),
            ];
            let mut value = LogicalColumn::from_source("VALUE", SqlType::Text, &profile.name);
            value.nullable = true;
            columns.push(value);
            columns.extend(metadata_columns());
            let mut child = LogicalTable::new(&child_name, TableKind::Child, columns);
            child.primary_key = vec!["FACT_SK".to_string(), "SEQ_NO".to_string()];
            relationships.push(Relationship::new(&child_name, "FACT_SK", &fact_name, "FACT_SK"));
            tables.push(child);
        }

        let strategy = SchemaChooser::choose(profiles, dims.len());
        let model = DimensionalModel {
            source_name: source_name.to_string(),
            strategy,
            tables,
            relationships,
            review_flags,
        };
        model.validate()?;
        tracing::info!(
            tables = model.tables.len(),
            relationships = model.relationships.len(),
            strategy = ?model.strategy,
            "modeling pass complete"
        );
        Ok(model)
    }

    /// The calendar dimension. Fixed shape, one row per date in the observed
    /// range, generated during materialization.
    fn date_dimension() -> LogicalTable {
        let mut columns = vec![
            LogicalColumn::new("DATE_SK", SqlType::Text),
            LogicalColumn::new("DATE_NK", SqlType::Date),
            LogicalColumn::new("YEAR", SqlType::Number),
            LogicalColumn::new("QUARTER", SqlType::Number),
            LogicalColumn::new("MONTH", SqlType::Number),
            LogicalColumn::new("DAY", SqlType::Number),
            LogicalColumn::new("DAY_OF_WEEK", SqlType::Number),
            LogicalColumn::new("DAY_NAME", SqlType::Text),
            LogicalColumn::new("MONTH_NAME", SqlType::Text),
            LogicalColumn::new("IS_WEEKEND", SqlType::Boolean),
        ];
        columns.extend(metadata_columns());
        let mut table = LogicalTable::new("DIM_DATE", TableKind::DateDimension, columns);
        table.primary_key = vec!["DATE_SK".to_string()];
        table.natural_key = vec!["DATE_NK".to_string()];
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::Value;
    use crate::classify::{EntityClassifier, GrainDetector};
    use crate::profile::column::ColumnAccumulator;
    use crate::profile::keys::KeyCandidate;

    fn profile_of(name: &str, values: Vec<Value>) -> ColumnProfile {
        let config = PipelineConfig::default();
        let mut acc = ColumnAccumulator::new(name, &config);
        for v in &values {
            acc.observe(v);
        }
        acc.finalize()
    }

    fn transactions() -> Vec<ColumnProfile> {
        vec![
            profile_of("transaction_id", (0..50).map(Value::Integer).collect()),
            profile_of("customer_id", (0..50).map(|i| Value::Integer(i % 9)).collect()),
            profile_of(
                "customer_name",
                (0..50)
                    .map(|i| Value::Text(format!("name {}", i % 9)))
                    .collect(),
            ),
            profile_of(
                "transaction_date",
                (0..50)
                    .map(|i| {
                        Value::Date(
                            chrono::NaiveDate::from_ymd_opt(2024, 1, 1 + (i % 20) as u32).unwrap(),
                        )
                    })
                    .collect(),
            ),
            profile_of(
                "amount",
                (0..50).map(|i| Value::Float(i as f64 * 1.25)).collect(),
            ),
        ]
    }

    fn clean_grain(column: &str) -> Grain {
        GrainDetector::detect(&[KeyCandidate {
            columns: vec![column.to_string()],
            uniqueness: 1.0,
            null_ratio: 0.0,
            distinct_count: 50,
        }])
    }

    fn generate(profiles: &[ColumnProfile], grain: &Grain) -> DimensionalModel {
        let config = PipelineConfig::default();
        let classification = EntityClassifier::classify(profiles, &[], &config);
        let table_profile = TableProfile {
            row_count: 50,
            skipped_rows: 0,
        };
        ModelGenerator::generate(
            "transactions.csv",
            profiles,
            &classification,
            grain,
            &table_profile,
            &config,
        )
        .unwrap()
    }

    #[test]
    fn builds_star_around_transaction_grain() {
        let profiles = transactions();
        let model = generate(&profiles, &clean_grain("transaction_id"));

        assert_eq!(model.strategy, SchemaStrategy::Star);
        let fact = model.fact_table().unwrap();
        assert_eq!(fact.name, "FACT_TRANSACTIONS");
        assert!(fact.column("TRANSACTION_ID").is_some());
        assert!(fact.column("CUSTOMER_FK").is_some());
        assert!(fact.column("AMOUNT").is_some());

        let dim = model.table("DIM_CUSTOMER").unwrap();
        assert_eq!(dim.natural_key, vec!["customer_id".to_string()]);
        assert!(dim.column("CUSTOMER_NAME").is_some());

        assert!(model.table("DIM_DATE").is_some());
        assert!(
            model
                .relationships
                .iter()
                .any(|r| r.from_table == "FACT_TRANSACTIONS" && r.to_table == "DIM_CUSTOMER")
        );
    }

    #[test]
    fn grain_column_never_becomes_its_own_dimension() {
        let profiles = transactions();
        let model = generate(&profiles, &clean_grain("transaction_id"));
        assert!(model.table("DIM_TRANSACTION").is_none());
    }

    #[test]
    fn every_table_carries_metadata_columns() {
        let profiles = transactions();
        let model = generate(&profiles, &clean_grain("transaction_id"));
        for table in &model.tables {
            for meta in ["LOAD_TS", "SOURCE_FILE_NAME", "ROW_HASH", "RECORD_SOURCE"] {
                assert!(
                    table.column(meta).is_some(),
                    "{} missing {meta}",
                    table.name
                );
            }
        }
    }

    #[test]
    fn synthetic_grain_falls_back_to_fact_main() {
        let profiles = transactions();
        let grain = GrainDetector::detect(&[]);
        let model = generate(&profiles, &grain);
        let fact = model.fact_table().unwrap();
        assert_eq!(fact.name, "FACT_MAIN");
        assert!(fact.natural_key.is_empty());
    }

    #[test]
    fn list_columns_become_child_tables_and_force_3nf() {
        let mut profiles = transactions();
        profiles.push(profile_of(
            "item_tags",
            (0..50)
                .map(|_| Value::List(vec![Value::Text("a".into()), Value::Text("b".into())]))
                .collect(),
        ));
        let model = generate(&profiles, &clean_grain("transaction_id"));
        assert_eq!(model.strategy, SchemaStrategy::ThirdNormalForm);
        let child = model.table("FACT_TRANSACTIONS_ITEM_TAGS").unwrap();
        assert_eq!(child.kind, TableKind::Child);
        assert_eq!(
            child.primary_key,
            vec!["FACT_SK".to_string(), "SEQ_NO".to_string()]
        );
    }

    #[test]
    fn date_bearing_dimension_gets_scd2() {
        let profiles = vec![
            profile_of("order_id", (0..30).map(Value::Integer).collect()),
            profile_of("customer_id", (0..30).map(|i| Value::Integer(i % 5)).collect()),
            profile_of(
                "customer_since",
                (0..30)
                    .map(|i| {
                        Value::Date(
                            chrono::NaiveDate::from_ymd_opt(2020, 1, 1 + (i % 5) as u32).unwrap(),
                        )
                    })
                    .collect(),
            ),
        ];
        let model = generate(&profiles, &clean_grain("order_id"));
        let dim = model.table("DIM_CUSTOMER").unwrap();
        assert_eq!(dim.scd_pattern, Some(ScdPattern::Type2));
        // the date lives in the dimension, not DIM_DATE
        assert!(model.table("DIM_DATE").is_none());
    }
}
