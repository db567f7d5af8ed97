//! Fact upserts keyed on (date, entity).
//!
//! Callers must have written the time dimension and resolved every entity
//! before calling in here; a record whose entity has no surrogate is an
//! integrity error and nothing from that batch is written.

use crate::store::{StoreError, WarehouseStore};
use serde::{Deserialize, Serialize};
use smartinvest_core::domain::{MacroFactRow, MacroRecord, MarketFactRow, MarketRecord};
use std::collections::HashMap;
use std::fmt;

/// How an incoming fact row merges with one already stored under the same key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// Every measure takes the incoming value, nulls included.
    #[default]
    Replace,
    /// Incoming nulls keep the stored value.
    Patch,
}

impl fmt::Display for MergePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergePolicy::Replace => write!(f, "replace"),
            MergePolicy::Patch => write!(f, "patch"),
        }
    }
}

/// Attach surrogate asset keys to market records.
pub fn market_fact_rows(
    records: &[MarketRecord],
    asset_ids: &HashMap<String, i64>,
) -> Result<Vec<MarketFactRow>, StoreError> {
    records
        .iter()
        .map(|r| {
            asset_ids
                .get(&r.ticker)
                .map(|&id| MarketFactRow::from_record(r, id))
                .ok_or_else(|| {
                    StoreError::Integrity(format!("no dim_asset row for ticker {}", r.ticker))
                })
        })
        .collect()
}

pub fn upsert_market(
    store: &mut dyn WarehouseStore,
    records: &[MarketRecord],
    asset_ids: &HashMap<String, i64>,
    policy: MergePolicy,
) -> Result<usize, StoreError> {
    let rows = market_fact_rows(records, asset_ids)?;
    if rows.is_empty() {
        return Ok(0);
    }
    store.upsert_market_facts(&rows, policy)
}

pub fn upsert_macro(
    store: &mut dyn WarehouseStore,
    records: &[MacroRecord],
    policy: MergePolicy,
) -> Result<usize, StoreError> {
    let rows: Vec<MacroFactRow> = records.iter().map(MacroFactRow::from).collect();
    if rows.is_empty() {
        return Ok(0);
    }
    store.upsert_macro_facts(&rows, policy)
}
