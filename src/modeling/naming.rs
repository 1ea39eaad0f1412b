//! Warehouse naming conventions
//!
//! All generated names are uppercase with underscores. Entity names come from
//! key columns with their key suffix stripped, so `customer_id` yields the
//! entity `CUSTOMER`, the table `DIM_CUSTOMER`, and the fact column
//! `CUSTOMER_FK`.

/// Uppercase and replace anything non-alphanumeric with underscores.
pub fn physical(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_uppercase());
        } else {
            out.push('_');
        }
    }
    out
}

/// Entity name behind a key column: strips a trailing `_id` or `_guid`.
/// A bare `id` has no entity of its own.
pub fn entity_of(column: &str) -> Option<String> {
    let lower = column.to_ascii_lowercase();
    if lower == "id" || lower == "guid" {
        return None;
    }
    let stem = lower
        .strip_suffix("_id")
        .or_else(|| lower.strip_suffix("_guid"))
        .unwrap_or(&lower);
    if stem.is_empty() {
        None
    } else {
        Some(physical(stem))
    }
}

pub fn dimension_table(entity: &str) -> String {
    format!("DIM_{entity}")
}

pub fn surrogate_key(entity: &str) -> String {
    format!("{entity}_SK")
}

pub fn foreign_key(entity: &str) -> String {
    format!("{entity}_FK")
}

/// Fact table name from the grain entity: `TRANSACTION` becomes
/// `FACT_TRANSACTIONS`. Falls back to `FACT_MAIN` for synthetic grains.
pub fn fact_table(grain_entity: Option<&str>) -> String {
    match grain_entity {
        Some(entity) => {
            if entity.ends_with('S') {
                format!("FACT_{entity}")
            } else {
                format!("FACT_{entity}S")
            }
        }
        None => "FACT_MAIN".to_string(),
    }
}

/// First underscore-delimited token, lowercased. Used to group attribute
/// columns that share a prefix into one dimension.
pub fn prefix_of(column: &str) -> Option<&str> {
    let idx = column.find('_')?;
    if idx == 0 { None } else { Some(&column[..idx]) }
}
