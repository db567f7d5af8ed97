//! SQL text for the star schema, rendered per backend dialect.
//!
//! Both backends speak the same `INSERT ... ON CONFLICT` upsert grammar; they
//! differ only in placeholder syntax, namespacing, and column types.

use crate::upsert::MergePolicy;
use smartinvest_core::data::MARKET_SCHEMA;

/// Rows per multi-row statement. Keeps the widest statement (market facts,
/// 10 parameters per row) well under both backends' parameter limits.
pub const CHUNK_ROWS: usize = 500;

/// `fact_market_daily` measure columns, in the order rows bind them.
pub const MARKET_MEASURES: &[&str] = MARKET_SCHEMA.measures;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    Sqlite,
}

impl Dialect {
    /// 1-based positional placeholder.
    pub fn placeholder(self, n: usize) -> String {
        match self {
            Dialect::Postgres => format!("${n}"),
            Dialect::Sqlite => format!("?{n}"),
        }
    }
}

/// Fully qualified table names for one warehouse namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tables {
    pub dialect: Dialect,
    pub namespace: Option<String>,
    pub dim_time: String,
    pub dim_asset: String,
    pub dim_macro_series: String,
    pub fact_market_daily: String,
    pub fact_macro_daily: String,
}

impl Tables {
    /// SQLite has no schemas; the namespace only applies to Postgres.
    pub fn new(dialect: Dialect, namespace: &str) -> Self {
        let namespace = match dialect {
            Dialect::Postgres if !namespace.is_empty() => Some(namespace.to_string()),
            _ => None,
        };
        let q = |table: &str| match &namespace {
            Some(ns) => format!("{ns}.{table}"),
            None => table.to_string(),
        };
        Self {
            dialect,
            dim_time: q("dim_time"),
            dim_asset: q("dim_asset"),
            dim_macro_series: q("dim_macro_series"),
            fact_market_daily: q("fact_market_daily"),
            fact_macro_daily: q("fact_macro_daily"),
            namespace,
        }
    }

    /// `(p1, p2, ...), (pk, ...)` for `rows` rows of `width` parameters.
    fn values(&self, rows: usize, width: usize) -> String {
        (0..rows)
            .map(|r| {
                let params: Vec<String> = (1..=width)
                    .map(|c| self.dialect.placeholder(r * width + c))
                    .collect();
                format!("({})", params.join(", "))
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Idempotent bootstrap DDL, in dependency order.
    pub fn create_statements(&self) -> Vec<String> {
        let (date, real, serial) = match self.dialect {
            Dialect::Postgres => ("DATE", "DOUBLE PRECISION", "BIGSERIAL PRIMARY KEY"),
            Dialect::Sqlite => ("TEXT", "REAL", "INTEGER PRIMARY KEY AUTOINCREMENT"),
        };
        let mut stmts = Vec::new();
        if let Some(ns) = &self.namespace {
            stmts.push(format!("CREATE SCHEMA IF NOT EXISTS {ns}"));
        }
        stmts.push(format!(
            "CREATE TABLE IF NOT EXISTS {} (
                date_id {date} PRIMARY KEY,
                year INTEGER NOT NULL,
                month INTEGER NOT NULL,
                day INTEGER NOT NULL,
                week INTEGER NOT NULL,
                quarter INTEGER NOT NULL
            )",
            self.dim_time
        ));
        stmts.push(format!(
            "CREATE TABLE IF NOT EXISTS {} (
                asset_id {serial},
                ticker TEXT NOT NULL UNIQUE,
                asset_type TEXT NOT NULL CHECK (asset_type IN ('stock', 'index'))
            )",
            self.dim_asset
        ));
        stmts.push(format!(
            "CREATE TABLE IF NOT EXISTS {} (
                series_id TEXT PRIMARY KEY,
                label TEXT NOT NULL
            )",
            self.dim_macro_series
        ));
        let measures: Vec<String> = MARKET_MEASURES
            .iter()
            .map(|m| format!("{m} {real}"))
            .collect();
        stmts.push(format!(
            "CREATE TABLE IF NOT EXISTS {} (
                date_id {date} NOT NULL REFERENCES {}(date_id),
                asset_id BIGINT NOT NULL REFERENCES {}(asset_id),
                {},
                PRIMARY KEY (date_id, asset_id)
            )",
            self.fact_market_daily,
            self.dim_time,
            self.dim_asset,
            measures.join(",\n                ")
        ));
        stmts.push(format!(
            "CREATE TABLE IF NOT EXISTS {} (
                date_id {date} NOT NULL REFERENCES {}(date_id),
                series_id TEXT NOT NULL REFERENCES {}(series_id),
                value {real},
                PRIMARY KEY (date_id, series_id)
            )",
            self.fact_macro_daily, self.dim_time, self.dim_macro_series
        ));
        stmts
    }

    /// Insert-if-absent for `rows` calendar rows.
    pub fn insert_time_rows(&self, rows: usize) -> String {
        format!(
            "INSERT INTO {} (date_id, year, month, day, week, quarter) VALUES {} \
             ON CONFLICT (date_id) DO NOTHING",
            self.dim_time,
            self.values(rows, 6)
        )
    }

    pub fn insert_asset(&self) -> String {
        format!(
            "INSERT INTO {} (ticker, asset_type) VALUES ({}, {}) ON CONFLICT (ticker) DO NOTHING",
            self.dim_asset,
            self.dialect.placeholder(1),
            self.dialect.placeholder(2)
        )
    }

    pub fn select_asset_id(&self) -> String {
        format!(
            "SELECT asset_id FROM {} WHERE ticker = {}",
            self.dim_asset,
            self.dialect.placeholder(1)
        )
    }

    pub fn insert_macro_series(&self) -> String {
        format!(
            "INSERT INTO {} (series_id, label) VALUES ({}, {}) ON CONFLICT (series_id) DO NOTHING",
            self.dim_macro_series,
            self.dialect.placeholder(1),
            self.dialect.placeholder(2)
        )
    }

    pub fn select_macro_series_id(&self) -> String {
        format!(
            "SELECT series_id FROM {} WHERE series_id = {}",
            self.dim_macro_series,
            self.dialect.placeholder(1)
        )
    }

    /// Multi-row upsert into `fact_market_daily`.
    pub fn upsert_market_facts(&self, rows: usize, policy: MergePolicy) -> String {
        let mut columns = vec!["date_id", "asset_id"];
        columns.extend_from_slice(MARKET_MEASURES);
        format!(
            "INSERT INTO {} AS t ({}) VALUES {} ON CONFLICT (date_id, asset_id) DO UPDATE SET {}",
            self.fact_market_daily,
            columns.join(", "),
            self.values(rows, columns.len()),
            set_clause(MARKET_MEASURES, policy)
        )
    }

    /// Multi-row upsert into `fact_macro_daily`.
    pub fn upsert_macro_facts(&self, rows: usize, policy: MergePolicy) -> String {
        format!(
            "INSERT INTO {} AS t (date_id, series_id, value) VALUES {} \
             ON CONFLICT (date_id, series_id) DO UPDATE SET {}",
            self.fact_macro_daily,
            self.values(rows, 3),
            set_clause(&["value"], policy)
        )
    }
}

fn set_clause(measures: &[&str], policy: MergePolicy) -> String {
    measures
        .iter()
        .map(|m| match policy {
            MergePolicy::Replace => format!("{m} = excluded.{m}"),
            MergePolicy::Patch => format!("{m} = COALESCE(excluded.{m}, t.{m})"),
        })
        .collect::<Vec<_>>()
        .join(", ")
}
