//! Column classification rules
//!
//! An ordered list of named predicates over a finalized profile. Each rule
//! either abstains or casts a vote with a confidence; the classifier combines
//! votes with a fixed tie-break (highest confidence, earlier rule on ties).
//! Keeping the rules as a flat table makes each one testable on its own.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::profile::column::{ColumnProfile, InferredType};

/// Role a column plays in the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ColumnRole {
    NaturalKey,
    Measure,
    Attribute,
    Date,
    FreeText,
}

/// A single rule's vote.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vote {
    pub role: ColumnRole,
    pub confidence: f64,
}

/// Inputs available to every rule.
pub struct RuleContext<'a> {
    pub profile: &'a ColumnProfile,
    pub config: &'a PipelineConfig,
}

/// A named classification predicate.
pub struct Rule {
    pub name: &'static str,
    pub predicate: fn(&RuleContext) -> Option<Vote>,
}

static ID_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(_id$|^id$|guid)").expect("valid regex"));
static DATE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(date|time|timestamp)").expect("valid regex"));
static MEASURE_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(amount|price|cost|qty|quantity|total|sum|count|usage|metric|value|score|rate)",
    )
    .expect("valid regex")
});

fn id_name_pattern(ctx: &RuleContext) -> Option<Vote> {
    ID_NAME.is_match(&ctx.profile.name).then_some(Vote {
        role: ColumnRole::NaturalKey,
        confidence: 0.9,
    })
}

fn date_typed(ctx: &RuleContext) -> Option<Vote> {
    let parse_ok = ctx.profile.date_parse_ratio.map(|r| r >= 0.9).unwrap_or(false);
    (ctx.profile.inferred_type.is_date_like() && parse_ok).then_some(Vote {
        role: ColumnRole::Date,
        confidence: 0.9,
    })
}

fn date_name_pattern(ctx: &RuleContext) -> Option<Vote> {
    DATE_NAME.is_match(&ctx.profile.name).then_some(Vote {
        role: ColumnRole::Date,
        confidence: 0.6,
    })
}

fn measure_keyword(ctx: &RuleContext) -> Option<Vote> {
    (ctx.profile.inferred_type.is_numeric() && MEASURE_NAME.is_match(&ctx.profile.name)).then_some(
        Vote {
            role: ColumnRole::Measure,
            confidence: 0.85,
        },
    )
}

fn numeric_dispersed(ctx: &RuleContext) -> Option<Vote> {
    let dispersed = ctx.profile.std_dev.map(|s| s > 0.0).unwrap_or(false);
    (ctx.profile.inferred_type.is_numeric()
        && ctx.profile.distinct_ratio() >= ctx.config.measure_distinct_ratio
        && dispersed)
        .then_some(Vote {
            role: ColumnRole::Measure,
            confidence: 0.7,
        })
}

fn numeric_low_cardinality(ctx: &RuleContext) -> Option<Vote> {
    (ctx.profile.inferred_type.is_numeric()
        && ctx.profile.distinct_ratio() < ctx.config.measure_distinct_ratio)
        .then_some(Vote {
            role: ColumnRole::Attribute,
            confidence: 0.6,
        })
}

fn free_text(ctx: &RuleContext) -> Option<Vote> {
    (ctx.profile.inferred_type == InferredType::Text
        && ctx.profile.distinct_ratio() > ctx.config.free_text_ratio)
        .then_some(Vote {
            role: ColumnRole::FreeText,
            confidence: 0.7,
        })
}

fn attribute_fallback(_ctx: &RuleContext) -> Option<Vote> {
    Some(Vote {
        role: ColumnRole::Attribute,
        confidence: 0.5,
    })
}

/// The fixed rule order. Earlier rules win confidence ties.
pub const RULES: &[Rule] = &[
    Rule {
        name: "id_name_pattern",
        predicate: id_name_pattern,
    },
    Rule {
        name: "date_typed",
        predicate: date_typed,
    },
    Rule {
        name: "date_name_pattern",
        predicate: date_name_pattern,
    },
    Rule {
        name: "measure_keyword",
        predicate: measure_keyword,
    },
    Rule {
        name: "numeric_dispersed",
        predicate: numeric_dispersed,
    },
    Rule {
        name: "numeric_low_cardinality",
        predicate: numeric_low_cardinality,
    },
    Rule {
        name: "free_text",
        predicate: free_text,
    },
    Rule {
        name: "attribute_fallback",
        predicate: attribute_fallback,
    },
];
