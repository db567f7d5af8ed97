//! Embedded SQLite warehouse.
//!
//! Same star schema and conflict semantics as the Postgres store, minus the
//! namespace. Used for local runs and as the store behind the integration
//! tests, where [`SqliteStore::snapshot`] reads the whole warehouse back.

use super::sql::{Dialect, Tables, CHUNK_ROWS};
use super::{StoreError, WarehouseStore};
use crate::upsert::MergePolicy;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, ErrorCode};
use smartinvest_core::domain::{
    AssetDimensionRow, AssetType, MacroFactRow, MacroSeriesDimensionRow, MarketFactRow,
    TimeDimensionRow,
};
use std::path::Path;
use tracing::debug;

fn store_err(e: rusqlite::Error) -> StoreError {
    match &e {
        rusqlite::Error::SqliteFailure(f, _) if f.code == ErrorCode::ConstraintViolation => {
            StoreError::Integrity(e.to_string())
        }
        _ => StoreError::Backend(e.to_string()),
    }
}

fn real(v: Option<f64>) -> Value {
    v.map_or(Value::Null, Value::Real)
}

pub struct SqliteStore {
    conn: Connection,
    tables: Tables,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "opening sqlite warehouse");
        Self::with_connection(Connection::open(path).map_err(store_err)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory().map_err(store_err)?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(store_err)?;
        Ok(Self {
            conn,
            tables: Tables::new(Dialect::Sqlite, ""),
        })
    }

    /// Every row of every table, in key order.
    pub fn snapshot(&self) -> Result<WarehouseSnapshot, StoreError> {
        let t = &self.tables;

        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT date_id, year, month, day, week, quarter FROM {} ORDER BY date_id",
                t.dim_time
            ))
            .map_err(store_err)?;
        let time = stmt
            .query_map([], |r| {
                Ok(TimeDimensionRow {
                    date_id: r.get(0)?,
                    year: r.get(1)?,
                    month: r.get(2)?,
                    day: r.get(3)?,
                    week: r.get(4)?,
                    quarter: r.get(5)?,
                })
            })
            .map_err(store_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(store_err)?;

        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT asset_id, ticker, asset_type FROM {} ORDER BY asset_id",
                t.dim_asset
            ))
            .map_err(store_err)?;
        let raw_assets = stmt
            .query_map([], |r| {
                Ok((
                    r.get::<_, i64>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, String>(2)?,
                ))
            })
            .map_err(store_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(store_err)?;
        let assets = raw_assets
            .into_iter()
            .map(|(asset_id, ticker, kind)| {
                let asset_type = kind.parse::<AssetType>().map_err(StoreError::Backend)?;
                Ok(AssetDimensionRow {
                    asset_id,
                    ticker,
                    asset_type,
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT series_id, label FROM {} ORDER BY series_id",
                t.dim_macro_series
            ))
            .map_err(store_err)?;
        let series = stmt
            .query_map([], |r| {
                Ok(MacroSeriesDimensionRow {
                    series_id: r.get(0)?,
                    label: r.get(1)?,
                })
            })
            .map_err(store_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(store_err)?;

        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT date_id, asset_id, open, high, low, close, adj_close, volume, \
                 dividends, stock_splits FROM {} ORDER BY asset_id, date_id",
                t.fact_market_daily
            ))
            .map_err(store_err)?;
        let market = stmt
            .query_map([], |r| {
                Ok(MarketFactRow {
                    date_id: r.get(0)?,
                    asset_id: r.get(1)?,
                    open: r.get(2)?,
                    high: r.get(3)?,
                    low: r.get(4)?,
                    close: r.get(5)?,
                    adj_close: r.get(6)?,
                    volume: r.get(7)?,
                    dividends: r.get(8)?,
                    stock_splits: r.get(9)?,
                })
            })
            .map_err(store_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(store_err)?;

        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT date_id, series_id, value FROM {} ORDER BY series_id, date_id",
                t.fact_macro_daily
            ))
            .map_err(store_err)?;
        let macro_facts = stmt
            .query_map([], |r| {
                Ok(MacroFactRow {
                    date_id: r.get(0)?,
                    series_id: r.get(1)?,
                    value: r.get(2)?,
                })
            })
            .map_err(store_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(store_err)?;

        Ok(WarehouseSnapshot {
            time,
            assets,
            series,
            market,
            macro_facts,
        })
    }
}

/// Full contents of a warehouse, for comparing states across loads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WarehouseSnapshot {
    pub time: Vec<TimeDimensionRow>,
    pub assets: Vec<AssetDimensionRow>,
    pub series: Vec<MacroSeriesDimensionRow>,
    pub market: Vec<MarketFactRow>,
    pub macro_facts: Vec<MacroFactRow>,
}

impl WarehouseStore for SqliteStore {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    fn ping(&mut self) -> Result<(), StoreError> {
        self.conn
            .query_row("SELECT 1", [], |r| r.get::<_, i64>(0))
            .map(|_| ())
            .map_err(store_err)
    }

    fn ensure_schema(&mut self) -> Result<(), StoreError> {
        let tx = self.conn.transaction().map_err(store_err)?;
        for stmt in self.tables.create_statements() {
            tx.execute(&stmt, []).map_err(store_err)?;
        }
        tx.commit().map_err(store_err)
    }

    fn insert_time_rows(&mut self, rows: &[TimeDimensionRow]) -> Result<usize, StoreError> {
        let tx = self.conn.transaction().map_err(store_err)?;
        let mut inserted = 0;
        for chunk in rows.chunks(CHUNK_ROWS) {
            let sql = self.tables.insert_time_rows(chunk.len());
            let values = chunk.iter().flat_map(|r| {
                [
                    Value::Text(r.date_id.to_string()),
                    Value::Integer(r.year.into()),
                    Value::Integer(r.month.into()),
                    Value::Integer(r.day.into()),
                    Value::Integer(r.week.into()),
                    Value::Integer(r.quarter.into()),
                ]
            });
            inserted += tx.execute(&sql, params_from_iter(values)).map_err(store_err)?;
        }
        tx.commit().map_err(store_err)?;
        Ok(inserted)
    }

    fn get_or_create_asset(
        &mut self,
        ticker: &str,
        asset_type: AssetType,
    ) -> Result<i64, StoreError> {
        let tx = self.conn.transaction().map_err(store_err)?;
        tx.execute(&self.tables.insert_asset(), params![ticker, asset_type.as_str()])
            .map_err(store_err)?;
        let id = tx
            .query_row(&self.tables.select_asset_id(), params![ticker], |r| {
                r.get::<_, i64>(0)
            })
            .map_err(store_err)?;
        tx.commit().map_err(store_err)?;
        Ok(id)
    }

    fn get_or_create_macro_series(
        &mut self,
        series: &MacroSeriesDimensionRow,
    ) -> Result<String, StoreError> {
        let tx = self.conn.transaction().map_err(store_err)?;
        tx.execute(
            &self.tables.insert_macro_series(),
            params![series.series_id, series.label],
        )
        .map_err(store_err)?;
        let id = tx
            .query_row(
                &self.tables.select_macro_series_id(),
                params![series.series_id],
                |r| r.get::<_, String>(0),
            )
            .map_err(store_err)?;
        tx.commit().map_err(store_err)?;
        Ok(id)
    }

    fn upsert_market_facts(
        &mut self,
        rows: &[MarketFactRow],
        policy: MergePolicy,
    ) -> Result<usize, StoreError> {
        let tx = self.conn.transaction().map_err(store_err)?;
        let mut written = 0;
        for chunk in rows.chunks(CHUNK_ROWS) {
            let sql = self.tables.upsert_market_facts(chunk.len(), policy);
            let values = chunk.iter().flat_map(|r| {
                let mut row = vec![Value::Text(r.date_id.to_string()), Value::Integer(r.asset_id)];
                row.extend(r.measures().into_iter().map(real));
                row
            });
            written += tx.execute(&sql, params_from_iter(values)).map_err(store_err)?;
        }
        tx.commit().map_err(store_err)?;
        Ok(written)
    }

    fn upsert_macro_facts(
        &mut self,
        rows: &[MacroFactRow],
        policy: MergePolicy,
    ) -> Result<usize, StoreError> {
        let tx = self.conn.transaction().map_err(store_err)?;
        let mut written = 0;
        for chunk in rows.chunks(CHUNK_ROWS) {
            let sql = self.tables.upsert_macro_facts(chunk.len(), policy);
            let values = chunk.iter().flat_map(|r| {
                [
                    Value::Text(r.date_id.to_string()),
                    Value::Text(r.series_id.clone()),
                    Value::Real(r.value),
                ]
            });
            written += tx.execute(&sql, params_from_iter(values)).map_err(store_err)?;
        }
        tx.commit().map_err(store_err)?;
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn store() -> SqliteStore {
        let mut s = SqliteStore::open_in_memory().unwrap();
        s.ensure_schema().unwrap();
        s
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn fact(day: u32, asset_id: i64, close: Option<f64>) -> MarketFactRow {
        MarketFactRow {
            date_id: d(day),
            asset_id,
            open: Some(1.0),
            high: None,
            low: None,
            close,
            adj_close: None,
            volume: None,
            dividends: None,
            stock_splits: None,
        }
    }

    #[test]
    fn ensure_schema_is_idempotent() {
        let mut s = store();
        s.ensure_schema().unwrap();
        s.ping().unwrap();
        assert_eq!(s.snapshot().unwrap(), WarehouseSnapshot::default());
    }

    #[test]
    fn time_rows_insert_once() {
        let mut s = store();
        let rows = vec![TimeDimensionRow::from_date(d(2)), TimeDimensionRow::from_date(d(3))];
        assert_eq!(s.insert_time_rows(&rows).unwrap(), 2);
        assert_eq!(s.insert_time_rows(&rows).unwrap(), 0);
        assert_eq!(s.snapshot().unwrap().time, rows);
    }

    #[test]
    fn asset_get_or_create_is_stable() {
        let mut s = store();
        let a = s.get_or_create_asset("AAPL", AssetType::Stock).unwrap();
        let b = s.get_or_create_asset("^GSPC", AssetType::Index).unwrap();
        assert_ne!(a, b);
        assert_eq!(s.get_or_create_asset("AAPL", AssetType::Stock).unwrap(), a);
        assert_eq!(s.snapshot().unwrap().assets.len(), 2);
    }

    #[test]
    fn macro_series_label_defaults_to_key() {
        let mut s = store();
        let row = MacroSeriesDimensionRow::for_series("UNRATE");
        assert_eq!(s.get_or_create_macro_series(&row).unwrap(), "UNRATE");
        assert_eq!(s.get_or_create_macro_series(&row).unwrap(), "UNRATE");
        assert_eq!(s.snapshot().unwrap().series, vec![row]);
    }

    #[test]
    fn fact_without_time_row_is_integrity_error() {
        let mut s = store();
        let id = s.get_or_create_asset("AAPL", AssetType::Stock).unwrap();
        let err = s
            .upsert_market_facts(&[fact(2, id, Some(150.0))], MergePolicy::Replace)
            .unwrap_err();
        assert!(matches!(err, StoreError::Integrity(_)));
        assert!(s.snapshot().unwrap().market.is_empty());
    }

    #[test]
    fn failed_chunk_rolls_back_whole_call() {
        let mut s = store();
        s.insert_time_rows(&[TimeDimensionRow::from_date(d(2))]).unwrap();
        let id = s.get_or_create_asset("AAPL", AssetType::Stock).unwrap();
        // First row is valid, second references a missing date.
        let rows = vec![fact(2, id, Some(1.0)), fact(3, id, Some(2.0))];
        assert!(s.upsert_market_facts(&rows, MergePolicy::Replace).is_err());
        assert!(s.snapshot().unwrap().market.is_empty());
    }

    #[test]
    fn replace_and_patch_policies() {
        let mut s = store();
        s.insert_time_rows(&[TimeDimensionRow::from_date(d(2))]).unwrap();
        let id = s.get_or_create_asset("AAPL", AssetType::Stock).unwrap();

        s.upsert_market_facts(&[fact(2, id, Some(150.0))], MergePolicy::Replace)
            .unwrap();
        s.upsert_market_facts(&[fact(2, id, None)], MergePolicy::Patch)
            .unwrap();
        assert_eq!(s.snapshot().unwrap().market[0].close, Some(150.0));

        s.upsert_market_facts(&[fact(2, id, None)], MergePolicy::Replace)
            .unwrap();
        let market = s.snapshot().unwrap().market;
        assert_eq!(market.len(), 1);
        assert_eq!(market[0].close, None);
    }

    #[test]
    fn macro_upsert_overwrites_value() {
        let mut s = store();
        s.insert_time_rows(&[TimeDimensionRow::from_date(d(2))]).unwrap();
        s.get_or_create_macro_series(&MacroSeriesDimensionRow::for_series("GDP"))
            .unwrap();
        let row = |value| MacroFactRow {
            date_id: d(2),
            series_id: "GDP".into(),
            value,
        };
        s.upsert_macro_facts(&[row(1.0)], MergePolicy::Replace).unwrap();
        s.upsert_macro_facts(&[row(2.5)], MergePolicy::Replace).unwrap();
        assert_eq!(s.snapshot().unwrap().macro_facts, vec![row(2.5)]);
    }

    #[test]
    fn file_backed_store_persists() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("warehouse.db");
        {
            let mut s = SqliteStore::open(&path).unwrap();
            s.ensure_schema().unwrap();
            s.get_or_create_asset("MSFT", AssetType::Stock).unwrap();
        }
        let s = SqliteStore::open(&path).unwrap();
        assert_eq!(s.snapshot().unwrap().assets[0].ticker, "MSFT");
    }
}
