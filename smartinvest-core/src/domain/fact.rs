//! Fact rows keyed by (date, dimension key).

use super::record::{MacroRecord, MarketRecord};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Row of `fact_market_daily`, keyed by (`date_id`, `asset_id`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketFactRow {
    pub date_id: NaiveDate,
    pub asset_id: i64,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub adj_close: Option<f64>,
    pub volume: Option<f64>,
    pub dividends: Option<f64>,
    pub stock_splits: Option<f64>,
}

impl MarketFactRow {
    pub fn from_record(record: &MarketRecord, asset_id: i64) -> Self {
        Self {
            date_id: record.date,
            asset_id,
            open: record.open,
            high: record.high,
            low: record.low,
            close: record.close,
            adj_close: record.adj_close,
            volume: record.volume,
            dividends: record.dividends,
            stock_splits: record.stock_splits,
        }
    }

    /// Measures in `fact_market_daily` column order.
    pub fn measures(&self) -> [Option<f64>; 8] {
        [
            self.open,
            self.high,
            self.low,
            self.close,
            self.adj_close,
            self.volume,
            self.dividends,
            self.stock_splits,
        ]
    }
}

/// Row of `fact_macro_daily`, keyed by (`date_id`, `series_id`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacroFactRow {
    pub date_id: NaiveDate,
    pub series_id: String,
    pub value: f64,
}

impl From<&MacroRecord> for MacroFactRow {
    fn from(record: &MacroRecord) -> Self {
        Self {
            date_id: record.date,
            series_id: record.series_id.clone(),
            value: record.value,
        }
    }
}
