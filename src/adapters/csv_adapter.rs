//! CSV file candle adapter.
//!
//! Reads `<base>/<SYMBOL>_<timeframe>.csv` with a header row and columns
//! `timestamp,open,high,low,close,volume`. The timestamp is either epoch
//! milliseconds or an RFC 3339 / `YYYY-MM-DD` date.

use crate::domain::candle::Candle;
use crate::domain::error::EngineError;
use crate::ports::data_port::DataPort;
use chrono::{DateTime, NaiveDate};
use std::fs;
use std::path::PathBuf;

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str, timeframe: &str) -> PathBuf {
        self.base_path.join(format!("{}_{}.csv", symbol, timeframe))
    }
}

fn data_error(reason: String) -> EngineError {
    EngineError::DataSource { reason }
}

fn column<'r>(record: &'r csv::StringRecord, idx: usize, name: &str) -> Result<&'r str, EngineError> {
    record
        .get(idx)
        .map(str::trim)
        .ok_or_else(|| data_error(format!("missing {} column", name)))
}

fn parse_price(record: &csv::StringRecord, idx: usize, name: &str) -> Result<f64, EngineError> {
    column(record, idx, name)?
        .parse()
        .map_err(|e| data_error(format!("invalid {} value: {}", name, e)))
}

fn parse_timestamp(value: &str) -> Result<i64, EngineError> {
    if let Ok(ms) = value.parse::<i64>() {
        return Ok(ms);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.timestamp_millis());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp_millis())
        .ok_or_else(|| data_error(format!("invalid timestamp: {}", value)))
}

impl DataPort for CsvAdapter {
    fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: &str,
        limit: usize,
    ) -> Result<Vec<Candle>, EngineError> {
        let path = self.csv_path(symbol, timeframe);
        let content = fs::read_to_string(&path)
            .map_err(|e| data_error(format!("failed to read {}: {}", path.display(), e)))?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut candles = Vec::new();

        for result in rdr.records() {
            let record = result.map_err(|e| data_error(format!("CSV parse error: {}", e)))?;

            candles.push(Candle {
                timestamp: parse_timestamp(column(&record, 0, "timestamp")?)?,
                open: parse_price(&record, 1, "open")?,
                high: parse_price(&record, 2, "high")?,
                low: parse_price(&record, 3, "low")?,
                close: parse_price(&record, 4, "close")?,
                volume: parse_price(&record, 5, "volume")?,
            });
        }

        candles.sort_by_key(|c| c.timestamp);
        let skip = candles.len().saturating_sub(limit);
        Ok(candles.split_off(skip))
    }

    fn list_symbols(&self, timeframe: &str) -> Result<Vec<String>, EngineError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| {
            data_error(format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ))
        })?;

        let suffix = format!("_{}.csv", timeframe);
        let mut symbols = Vec::new();

        for entry in entries {
            let entry = entry.map_err(|e| data_error(format!("directory entry error: {}", e)))?;

            let name = entry.file_name();
            let name_str = name.to_string_lossy();

            if let Some(symbol) = name_str.strip_suffix(&suffix) {
                symbols.push(symbol.to_string());
            }
        }

        symbols.sort();
        Ok(symbols)
    }
}
