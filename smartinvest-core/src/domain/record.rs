//! Canonical records: the validated, typed form of one source row.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which family of series a batch belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    /// Daily price bars for stocks and indices.
    Market,
    /// Macroeconomic indicator observations.
    Macro,
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Market => "market",
            Domain::Macro => "macro",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Daily market bar for a single ticker.
///
/// Every measure is nullable: providers omit adjusted closes for some indices
/// and only emit dividends/splits when corporate actions are requested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketRecord {
    pub ticker: String,
    pub date: NaiveDate,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub adj_close: Option<f64>,
    pub volume: Option<f64>,
    pub dividends: Option<f64>,
    pub stock_splits: Option<f64>,
}

impl MarketRecord {
    /// Record with only its key set; measures start out null.
    pub fn new(ticker: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            ticker: ticker.into(),
            date,
            open: None,
            high: None,
            low: None,
            close: None,
            adj_close: None,
            volume: None,
            dividends: None,
            stock_splits: None,
        }
    }
}

/// One observation of a macroeconomic series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacroRecord {
    pub series_id: String,
    pub date: NaiveDate,
    pub value: f64,
}
