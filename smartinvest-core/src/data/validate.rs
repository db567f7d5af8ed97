//! Canonical record validation: type coercion, required fields, ordering.
//!
//! Input is a [`NormalizedBatch`]; output is a sorted, de-duplicated vector of
//! typed records. Rules:
//! - every `date` parses to a timezone-naive calendar date (offset datetimes
//!   keep their wall-clock date)
//! - every row carries a non-blank entity key
//! - measure columns coerce to `f64`; absent columns, empty cells and NaN are null
//! - an empty batch is an error, never a silent no-op
//! - records are sorted by (entity key, date); for a repeated key the last
//!   source row wins

use super::normalize::NormalizedBatch;
use super::schema::DATE_COLUMN;
use crate::domain::{MacroRecord, MarketRecord};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use polars::prelude::*;
use serde::Serialize;

/// Errors raised while turning a normalized batch into typed records.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("batch contains no rows")]
    EmptyBatch,

    #[error("row {row}: unparseable date '{value}'")]
    UnparseableDate { row: usize, value: String },

    #[error("row {row}: missing date")]
    MissingDate { row: usize },

    #[error("row {row}: missing entity key in column '{column}'")]
    MissingEntityKey { row: usize, column: String },

    #[error("row {row}: column '{column}' has non-numeric value '{value}'")]
    UnparseableNumber {
        column: String,
        row: usize,
        value: String,
    },

    #[error("frame error: {0}")]
    Frame(String),
}

impl From<PolarsError> for ValidationError {
    fn from(e: PolarsError) -> Self {
        ValidationError::Frame(e.to_string())
    }
}

/// Validated records plus bookkeeping about what was discarded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Validated<R> {
    pub records: Vec<R>,
    /// Rows dropped because they carried no observation.
    pub dropped_empty: usize,
    /// Rows superseded by a later row with the same (entity, date).
    pub dropped_duplicates: usize,
}

/// Validate a normalized market batch.
pub fn validate_market(batch: &NormalizedBatch) -> Result<Validated<MarketRecord>, ValidationError> {
    let frame = batch.frame();
    if frame.height() == 0 {
        return Err(ValidationError::EmptyBatch);
    }

    let schema = batch.schema();
    let keys = key_column(frame, schema.key)?;
    let dates = date_column(frame)?;
    let measure = |name: &str| numeric_column(frame, name);
    let open = measure("open")?;
    let high = measure("high")?;
    let low = measure("low")?;
    let close = measure("close")?;
    let adj_close = measure("adj_close")?;
    let volume = measure("volume")?;
    let dividends = measure("dividends")?;
    let stock_splits = measure("stock_splits")?;

    let records = (0..frame.height())
        .map(|i| MarketRecord {
            ticker: keys[i].clone(),
            date: dates[i],
            open: open[i],
            high: high[i],
            low: low[i],
            close: close[i],
            adj_close: adj_close[i],
            volume: volume[i],
            dividends: dividends[i],
            stock_splits: stock_splits[i],
        })
        .collect();

    let (records, dropped_duplicates) = sort_and_dedupe(records, |r| (r.ticker.clone(), r.date));
    Ok(Validated {
        records,
        dropped_empty: 0,
        dropped_duplicates,
    })
}

/// Validate a normalized macro batch.
///
/// Rows whose `value` is null are missing observations (FRED publishes `.`
/// or blanks for them) and are dropped. A batch left with nothing is empty.
pub fn validate_macro(batch: &NormalizedBatch) -> Result<Validated<MacroRecord>, ValidationError> {
    let frame = batch.frame();
    if frame.height() == 0 {
        return Err(ValidationError::EmptyBatch);
    }

    let schema = batch.schema();
    let keys = key_column(frame, schema.key)?;
    let dates = date_column(frame)?;
    let values = numeric_column(frame, "value")?;

    let mut dropped_empty = 0;
    let mut records = Vec::with_capacity(frame.height());
    for i in 0..frame.height() {
        match values[i] {
            Some(value) => records.push(MacroRecord {
                series_id: keys[i].clone(),
                date: dates[i],
                value,
            }),
            None => dropped_empty += 1,
        }
    }

    if records.is_empty() {
        return Err(ValidationError::EmptyBatch);
    }

    let (records, dropped_duplicates) =
        sort_and_dedupe(records, |r| (r.series_id.clone(), r.date));
    Ok(Validated {
        records,
        dropped_empty,
        dropped_duplicates,
    })
}

/// Stable sort by key, then keep the last record of each run of equal keys.
fn sort_and_dedupe<R, K: Ord>(mut records: Vec<R>, key: impl Fn(&R) -> K) -> (Vec<R>, usize) {
    records.sort_by_key(|r| key(r));
    let before = records.len();
    let mut out: Vec<R> = Vec::with_capacity(before);
    for record in records {
        let duplicate = out.last().is_some_and(|last| key(last) == key(&record));
        if duplicate {
            let last = out.len() - 1;
            out[last] = record;
        } else {
            out.push(record);
        }
    }
    let dropped = before - out.len();
    (out, dropped)
}

fn key_column(frame: &DataFrame, name: &str) -> Result<Vec<String>, ValidationError> {
    let series = frame.column(name)?.as_materialized_series().cast(&DataType::String)?;
    series
        .str()?
        .into_iter()
        .enumerate()
        .map(|(row, v)| match v.map(str::trim) {
            Some(k) if !k.is_empty() => Ok(k.to_string()),
            _ => Err(ValidationError::MissingEntityKey {
                row,
                column: name.to_string(),
            }),
        })
        .collect()
}

fn date_column(frame: &DataFrame) -> Result<Vec<NaiveDate>, ValidationError> {
    let series = frame.column(DATE_COLUMN)?.as_materialized_series();
    // Temporal columns go through Date so the string form is always ISO.
    let text = match series.dtype() {
        DataType::Date => series.cast(&DataType::String)?,
        DataType::Datetime(_, _) => series.cast(&DataType::Date)?.cast(&DataType::String)?,
        _ => series.cast(&DataType::String)?,
    };
    text.str()?
        .into_iter()
        .enumerate()
        .map(|(row, v)| {
            let raw = v.map(str::trim).filter(|s| !s.is_empty());
            let raw = raw.ok_or(ValidationError::MissingDate { row })?;
            parse_date(raw).ok_or_else(|| ValidationError::UnparseableDate {
                row,
                value: raw.to_string(),
            })
        })
        .collect()
}

/// Parse a calendar date from the shapes providers emit.
///
/// Offsets are discarded, keeping the wall-clock date in the source's own
/// zone: `2024-01-02 00:00:00-05:00` is 2024-01-02.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(d);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local().date());
    }
    const OFFSET_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%:z", "%Y-%m-%d %H:%M:%S%.f%:z"];
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(raw, fmt) {
            return Some(dt.naive_local().date());
        }
    }
    const NAIVE_FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
    ];
    for fmt in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt.date());
        }
    }
    None
}

/// Coerce a measure column to `f64`. An absent column is all-null.
fn numeric_column(frame: &DataFrame, name: &str) -> Result<Vec<Option<f64>>, ValidationError> {
    let column = match frame.column(name) {
        Ok(c) => c.as_materialized_series(),
        Err(_) => return Ok(vec![None; frame.height()]),
    };

    let values: Vec<Option<f64>> = match column.dtype() {
        DataType::String => column
            .str()?
            .into_iter()
            .enumerate()
            .map(|(row, v)| parse_number(v, name, row))
            .collect::<Result<_, _>>()?,
        DataType::Null => vec![None; frame.height()],
        _ => column.cast(&DataType::Float64)?.f64()?.into_iter().collect(),
    };

    Ok(values
        .into_iter()
        .map(|v| v.filter(|x| !x.is_nan()))
        .collect())
}

fn parse_number(v: Option<&str>, column: &str, row: usize) -> Result<Option<f64>, ValidationError> {
    match v.map(str::trim) {
        None | Some("") | Some(".") => Ok(None),
        Some(s) => s
            .parse::<f64>()
            .map(Some)
            .map_err(|_| ValidationError::UnparseableNumber {
                column: column.to_string(),
                row,
                value: s.to_string(),
            }),
    }
}
