//! Dimension rows: calendar dates, assets, macro series.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Marker that distinguishes index tickers (`^GSPC`, `^IXIC`) from equities.
pub const INDEX_PREFIX: char = '^';

/// Calendar attributes of one date.
///
/// Attributes are pure functions of `date_id`, so a row never needs updating
/// once it exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeDimensionRow {
    pub date_id: NaiveDate,
    pub year: i32,
    pub month: i32,
    pub day: i32,
    /// ISO-8601 week number (1..=53).
    pub week: i32,
    pub quarter: i32,
}

impl TimeDimensionRow {
    pub fn from_date(date: NaiveDate) -> Self {
        let month = date.month() as i32;
        Self {
            date_id: date,
            year: date.year(),
            month,
            day: date.day() as i32,
            week: date.iso_week().week() as i32,
            quarter: (month - 1) / 3 + 1,
        }
    }
}

/// Asset classification stored in `dim_asset.asset_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetType {
    Stock,
    Index,
}

impl AssetType {
    /// Classify a ticker: a leading `^` marks an index, everything else is a stock.
    pub fn classify(ticker: &str) -> Self {
        if ticker.starts_with(INDEX_PREFIX) {
            AssetType::Index
        } else {
            AssetType::Stock
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AssetType::Stock => "stock",
            AssetType::Index => "index",
        }
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stock" => Ok(AssetType::Stock),
            "index" => Ok(AssetType::Index),
            other => Err(format!("unknown asset type '{other}'")),
        }
    }
}

/// Row of `dim_asset`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetDimensionRow {
    pub asset_id: i64,
    pub ticker: String,
    pub asset_type: AssetType,
}

/// Row of `dim_macro_series`. The natural key doubles as the surrogate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacroSeriesDimensionRow {
    pub series_id: String,
    pub label: String,
}

impl MacroSeriesDimensionRow {
    /// Series row with the label defaulted to the series key.
    pub fn for_series(series_id: impl Into<String>) -> Self {
        let series_id = series_id.into();
        Self {
            label: series_id.clone(),
            series_id,
        }
    }
}
