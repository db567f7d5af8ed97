//! Column normalization: raw labels → canonical schema.
//!
//! Normalization runs in two steps:
//! 1. [`map_labels`]: a pure function from flattened raw labels to canonical
//!    labels, driven by the per-domain [`LabelRule`] table
//! 2. [`normalize`]: applies the mapping to a [`RawBatch`], enforces the date
//!    and measure requirements, and fills the key column from the batch entity
//!    when the source omitted it
//!
//! Exact canonical labels always win over labels derived by a rule. Among
//! derived labels the first column (in source order) wins.

use super::batch::RawBatch;
use super::schema::{CanonicalSchema, SchemaError, DATE_COLUMN};
use crate::domain::Domain;
use polars::prelude::*;
use tracing::debug;

/// One reconciliation rule applied to labels that are not already canonical.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelRule {
    /// Rename `from` to `to`. Loses to an exact `to` column.
    Fallback {
        from: &'static str,
        to: &'static str,
    },
    /// `<measure>_<suffix>` becomes `<measure>` when the cleaned suffix equals
    /// the cleaned entity key (`open_aapl` for `AAPL`, `close_^gspc` for `^GSPC`).
    StripEntitySuffix,
    /// A column labelled with the entity key itself carries `to`
    /// (FRED graph exports name the value column after the series).
    EntityNamed { to: &'static str },
}

pub const MARKET_RULES: &[LabelRule] = &[
    LabelRule::Fallback {
        from: "datetime",
        to: DATE_COLUMN,
    },
    LabelRule::StripEntitySuffix,
];

pub const MACRO_RULES: &[LabelRule] = &[
    LabelRule::Fallback {
        from: "datetime",
        to: DATE_COLUMN,
    },
    LabelRule::Fallback {
        from: "observation_date",
        to: DATE_COLUMN,
    },
    LabelRule::StripEntitySuffix,
    LabelRule::EntityNamed { to: "value" },
];

pub fn rules_for(domain: Domain) -> &'static [LabelRule] {
    match domain {
        Domain::Market => MARKET_RULES,
        Domain::Macro => MACRO_RULES,
    }
}

/// Entity key reduced to lowercase ASCII alphanumerics, so `^GSPC`, `gspc`
/// and `GSPC ` compare equal.
pub fn clean_key(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

impl LabelRule {
    /// Canonical target for `label` under this rule, if the rule applies.
    fn apply(
        &self,
        label: &str,
        schema: &CanonicalSchema,
        entity: Option<&str>,
    ) -> Option<&'static str> {
        match *self {
            LabelRule::Fallback { from, to } => (label == from).then_some(to),
            LabelRule::StripEntitySuffix => {
                let entity = clean_key(entity?);
                if entity.is_empty() {
                    return None;
                }
                schema.measures.iter().copied().find(|measure| {
                    label
                        .strip_prefix(measure)
                        .and_then(|rest| rest.strip_prefix('_'))
                        .is_some_and(|suffix| clean_key(suffix) == entity)
                })
            }
            LabelRule::EntityNamed { to } => {
                let entity = clean_key(entity?);
                (!entity.is_empty() && clean_key(label) == entity).then_some(to)
            }
        }
    }
}

/// Result of mapping raw labels: `(source column index, canonical label)`
/// pairs in source order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ColumnMapping {
    pairs: Vec<(usize, &'static str)>,
}

impl ColumnMapping {
    pub fn pairs(&self) -> &[(usize, &'static str)] {
        &self.pairs
    }

    /// Canonical labels in source order.
    pub fn canonical_labels(&self) -> Vec<&'static str> {
        self.pairs.iter().map(|(_, c)| *c).collect()
    }

    pub fn source_of(&self, canonical: &str) -> Option<usize> {
        self.pairs
            .iter()
            .find(|(_, c)| *c == canonical)
            .map(|(i, _)| *i)
    }

    pub fn contains(&self, canonical: &str) -> bool {
        self.source_of(canonical).is_some()
    }
}

/// Map flattened raw labels onto `schema`.
///
/// Labels that are neither canonical nor matched by a rule are dropped; so is
/// any label whose target is already claimed.
pub fn map_labels(
    labels: &[String],
    schema: &CanonicalSchema,
    rules: &[LabelRule],
    entity: Option<&str>,
) -> ColumnMapping {
    let mut claimed: Vec<(usize, &'static str)> = Vec::new();

    // Exact matches first.
    for (i, label) in labels.iter().enumerate() {
        if let Some(canonical) = schema.canonical(label) {
            if !claimed.iter().any(|(_, c)| *c == canonical) {
                claimed.push((i, canonical));
            }
        }
    }

    // Then rule-derived matches, in source order.
    for (i, label) in labels.iter().enumerate() {
        if claimed.iter().any(|(j, _)| *j == i) || schema.canonical(label).is_some() {
            continue;
        }
        let target = rules
            .iter()
            .find_map(|rule| rule.apply(label, schema, entity));
        if let Some(canonical) = target {
            if !claimed.iter().any(|(_, c)| *c == canonical) {
                claimed.push((i, canonical));
            }
        }
    }

    claimed.sort_by_key(|(i, _)| *i);
    ColumnMapping { pairs: claimed }
}

/// Convenience wrapper: flatten `labels`, map them for `domain`, and return the
/// canonical labels in source order.
pub fn canonical_labels(domain: Domain, labels: &[&str], entity: Option<&str>) -> Vec<&'static str> {
    let flattened: Vec<String> = labels
        .iter()
        .map(|l| super::batch::ColumnLabel::from(*l).flatten())
        .collect();
    map_labels(
        &flattened,
        CanonicalSchema::for_domain(domain),
        rules_for(domain),
        entity,
    )
    .canonical_labels()
}

/// A batch restricted to canonical columns, in canonical order.
#[derive(Debug, Clone)]
pub struct NormalizedBatch {
    name: String,
    domain: Domain,
    frame: DataFrame,
}

impl NormalizedBatch {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }

    pub fn schema(&self) -> &'static CanonicalSchema {
        CanonicalSchema::for_domain(self.domain)
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn columns(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .iter()
            .map(|n| n.to_string())
            .collect()
    }
}

/// Normalize a raw batch onto its domain's canonical schema.
pub fn normalize(batch: &RawBatch) -> Result<NormalizedBatch, SchemaError> {
    let schema = CanonicalSchema::for_domain(batch.domain());
    let labels: Vec<String> = batch.labels().iter().map(|l| l.flatten()).collect();
    let columns = batch.frame().get_columns();

    // Entity for suffix detection: the adapter's hint, else the first key value.
    let entity = match batch.entity() {
        Some(e) => Some(e.to_string()),
        None => labels
            .iter()
            .position(|l| l == schema.key)
            .map(|i| first_text_value(columns[i].as_materialized_series()))
            .transpose()?
            .flatten(),
    };

    let mapping = map_labels(&labels, schema, rules_for(batch.domain()), entity.as_deref());
    debug!(
        batch = batch.name(),
        raw = ?labels,
        mapped = ?mapping.canonical_labels(),
        "column mapping"
    );

    if !mapping.contains(DATE_COLUMN) {
        return Err(SchemaError::MissingDateColumn { columns: labels });
    }

    if !schema.measures.iter().any(|m| mapping.contains(m)) {
        return Err(SchemaError::NoMeasures {
            key: schema.key.to_string(),
            columns: labels,
        });
    }

    if let Some(missing) = schema
        .required_measures
        .iter()
        .find(|m| !mapping.contains(m))
    {
        return Err(SchemaError::MissingColumn(missing.to_string()));
    }

    let height = batch.height();
    let mut out: Vec<Column> = Vec::new();
    for canonical in schema.columns() {
        match mapping.source_of(canonical) {
            Some(i) => {
                let series = columns[i]
                    .as_materialized_series()
                    .clone()
                    .with_name(canonical.into());
                out.push(Column::from(series));
            }
            None if canonical == schema.key => {
                let entity = batch
                    .entity()
                    .ok_or_else(|| SchemaError::MissingColumn(schema.key.to_string()))?;
                out.push(Column::new(canonical.into(), vec![entity; height]));
            }
            None => {}
        }
    }

    Ok(NormalizedBatch {
        name: batch.name().to_string(),
        domain: batch.domain(),
        frame: DataFrame::new(out)?,
    })
}

fn first_text_value(series: &Series) -> Result<Option<String>, SchemaError> {
    let text = series.cast(&DataType::String)?;
    let first = text
        .str()?
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string);
    Ok(first)
}
