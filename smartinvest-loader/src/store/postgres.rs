//! PostgreSQL warehouse over the blocking `postgres` client.

use super::sql::{Dialect, Tables, CHUNK_ROWS};
use super::{StoreError, WarehouseStore};
use crate::config::WarehouseConfig;
use crate::upsert::MergePolicy;
use postgres::types::ToSql;
use postgres::{Client, NoTls};
use smartinvest_core::domain::{
    AssetType, MacroFactRow, MacroSeriesDimensionRow, MarketFactRow, TimeDimensionRow,
};
use tracing::info;

type Param = Box<dyn ToSql + Sync>;

/// SQLSTATE class 23 is "integrity constraint violation".
fn store_err(e: postgres::Error) -> StoreError {
    match e.code() {
        Some(state) if state.code().starts_with("23") => StoreError::Integrity(e.to_string()),
        _ => StoreError::Backend(e.to_string()),
    }
}

fn refs(params: &[Param]) -> Vec<&(dyn ToSql + Sync)> {
    params.iter().map(|p| p.as_ref()).collect()
}

pub struct PostgresStore {
    client: Client,
    tables: Tables,
}

impl PostgresStore {
    pub fn connect(config: &WarehouseConfig, namespace: &str) -> Result<Self, StoreError> {
        let client = postgres::Config::new()
            .host(&config.host)
            .port(config.port)
            .dbname(&config.database)
            .user(&config.user)
            .password(&config.password)
            .connect(NoTls)
            .map_err(store_err)?;
        info!(
            host = %config.host,
            port = config.port,
            database = %config.database,
            "connected to warehouse"
        );
        Ok(Self {
            client,
            tables: Tables::new(Dialect::Postgres, namespace),
        })
    }

    fn execute_chunks<T>(
        &mut self,
        rows: &[T],
        sql: impl Fn(&Tables, usize) -> String,
        bind: impl Fn(&T) -> Vec<Param>,
    ) -> Result<usize, StoreError> {
        let mut tx = self.client.transaction().map_err(store_err)?;
        let mut affected = 0;
        for chunk in rows.chunks(CHUNK_ROWS) {
            let statement = sql(&self.tables, chunk.len());
            let params: Vec<Param> = chunk.iter().flat_map(&bind).collect();
            affected += tx.execute(statement.as_str(), &refs(&params)).map_err(store_err)?;
        }
        tx.commit().map_err(store_err)?;
        Ok(affected as usize)
    }
}

impl WarehouseStore for PostgresStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    fn ping(&mut self) -> Result<(), StoreError> {
        let row = self.client.query_one("SELECT 1", &[]).map_err(store_err)?;
        row.try_get::<_, i32>(0).map(|_| ()).map_err(store_err)
    }

    fn ensure_schema(&mut self) -> Result<(), StoreError> {
        let mut tx = self.client.transaction().map_err(store_err)?;
        for stmt in self.tables.create_statements() {
            tx.batch_execute(&stmt).map_err(store_err)?;
        }
        tx.commit().map_err(store_err)
    }

    fn insert_time_rows(&mut self, rows: &[TimeDimensionRow]) -> Result<usize, StoreError> {
        self.execute_chunks(
            rows,
            |t, n| t.insert_time_rows(n),
            |r| -> Vec<Param> {
                vec![
                    Box::new(r.date_id),
                    Box::new(r.year),
                    Box::new(r.month),
                    Box::new(r.day),
                    Box::new(r.week),
                    Box::new(r.quarter),
                ]
            },
        )
    }

    fn get_or_create_asset(
        &mut self,
        ticker: &str,
        asset_type: AssetType,
    ) -> Result<i64, StoreError> {
        let mut tx = self.client.transaction().map_err(store_err)?;
        tx.execute(self.tables.insert_asset().as_str(), &[&ticker, &asset_type.as_str()])
            .map_err(store_err)?;
        let row = tx
            .query_one(self.tables.select_asset_id().as_str(), &[&ticker])
            .map_err(store_err)?;
        let id = row.try_get::<_, i64>(0).map_err(store_err)?;
        tx.commit().map_err(store_err)?;
        Ok(id)
    }

    fn get_or_create_macro_series(
        &mut self,
        series: &MacroSeriesDimensionRow,
    ) -> Result<String, StoreError> {
        let mut tx = self.client.transaction().map_err(store_err)?;
        tx.execute(
            self.tables.insert_macro_series().as_str(),
            &[&series.series_id, &series.label],
        )
        .map_err(store_err)?;
        let row = tx
            .query_one(self.tables.select_macro_series_id().as_str(), &[&series.series_id])
            .map_err(store_err)?;
        let id = row.try_get::<_, String>(0).map_err(store_err)?;
        tx.commit().map_err(store_err)?;
        Ok(id)
    }

    fn upsert_market_facts(
        &mut self,
        rows: &[MarketFactRow],
        policy: MergePolicy,
    ) -> Result<usize, StoreError> {
        self.execute_chunks(
            rows,
            |t, n| t.upsert_market_facts(n, policy),
            |r| {
                let mut params: Vec<Param> = vec![Box::new(r.date_id), Box::new(r.asset_id)];
                params.extend(r.measures().into_iter().map(|m| Box::new(m) as Param));
                params
            },
        )
    }

    fn upsert_macro_facts(
        &mut self,
        rows: &[MacroFactRow],
        policy: MergePolicy,
    ) -> Result<usize, StoreError> {
        self.execute_chunks(
            rows,
            |t, n| t.upsert_macro_facts(n, policy),
            |r| -> Vec<Param> {
                vec![
                    Box::new(r.date_id),
                    Box::new(r.series_id.clone()),
                    Box::new(r.value),
                ]
            },
        )
    }
}
