//! Entity resolution: natural keys to dimension surrogates.
//!
//! Resolution is get-or-create against the store. The store's uniqueness
//! constraint plus a conflict-ignoring insert is the only concurrency
//! control; there is no application-level lock.

use crate::store::{StoreError, WarehouseStore};
use smartinvest_core::domain::{AssetType, MacroSeriesDimensionRow};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// Surrogate `asset_id` for each distinct ticker.
pub fn resolve_assets<'a, I>(
    store: &mut dyn WarehouseStore,
    tickers: I,
) -> Result<HashMap<String, i64>, StoreError>
where
    I: IntoIterator<Item = &'a str>,
{
    let distinct: BTreeSet<&str> = tickers.into_iter().collect();
    let mut ids = HashMap::with_capacity(distinct.len());
    for ticker in distinct {
        let asset_type = AssetType::classify(ticker);
        let id = store.get_or_create_asset(ticker, asset_type)?;
        debug!(ticker, %asset_type, asset_id = id, "asset resolved");
        ids.insert(ticker.to_string(), id);
    }
    Ok(ids)
}

/// Ensure each distinct series has a `dim_macro_series` row. Macro series are
/// keyed by their natural id, so the returned ids equal the inputs.
pub fn resolve_macro_series<'a, I>(
    store: &mut dyn WarehouseStore,
    series_ids: I,
) -> Result<Vec<String>, StoreError>
where
    I: IntoIterator<Item = &'a str>,
{
    let distinct: BTreeSet<&str> = series_ids.into_iter().collect();
    distinct
        .into_iter()
        .map(|id| store.get_or_create_macro_series(&MacroSeriesDimensionRow::for_series(id)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;

    fn store() -> SqliteStore {
        let mut s = SqliteStore::open_in_memory().unwrap();
        s.ensure_schema().unwrap();
        s
    }

    #[test]
    fn classifies_and_reuses_assets() {
        let mut s = store();
        let first = resolve_assets(&mut s, ["AAPL", "^GSPC", "AAPL"]).unwrap();
        assert_eq!(first.len(), 2);

        let again = resolve_assets(&mut s, ["^GSPC", "AAPL"]).unwrap();
        assert_eq!(first, again);

        let assets = s.snapshot().unwrap().assets;
        let kind = |t: &str| assets.iter().find(|a| a.ticker == t).unwrap().asset_type;
        assert_eq!(kind("^GSPC"), AssetType::Index);
        assert_eq!(kind("AAPL"), AssetType::Stock);
    }

    #[test]
    fn separate_connections_share_one_asset_row() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("warehouse.db");
        let mut a = SqliteStore::open(&path).unwrap();
        a.ensure_schema().unwrap();
        let mut b = SqliteStore::open(&path).unwrap();

        let from_a = resolve_assets(&mut a, ["AAPL"]).unwrap();
        let from_b = resolve_assets(&mut b, ["AAPL", "MSFT"]).unwrap();
        let again_a = resolve_assets(&mut a, ["MSFT", "AAPL"]).unwrap();

        assert_eq!(from_a["AAPL"], from_b["AAPL"]);
        assert_eq!(from_b, again_a);

        let assets = a.snapshot().unwrap().assets;
        assert_eq!(assets.len(), 2);
        assert_eq!(assets.iter().filter(|r| r.ticker == "AAPL").count(), 1);
        assert_eq!(b.snapshot().unwrap().assets, assets);
    }

    #[test]
    fn macro_series_resolve_to_themselves() {
        let mut s = store();
        let ids = resolve_macro_series(&mut s, ["UNRATE", "CPIAUCSL", "UNRATE"]).unwrap();
        assert_eq!(ids, vec!["CPIAUCSL", "UNRATE"]);
        let series = s.snapshot().unwrap().series;
        assert_eq!(series.len(), 2);
        assert!(series.iter().all(|r| r.label == r.series_id));
    }
}
