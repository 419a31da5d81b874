//! JSON report adapter implementing ReportPort.
//!
//! Writes the candles next to the backtest result so an external charting
//! tool can plot entries and exits over price.

use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::domain::backtest::BacktestResult;
use crate::domain::candle::Candle;
use crate::domain::error::EngineError;
use crate::domain::metrics::Metrics;
use crate::ports::report_port::ReportPort;

#[derive(Serialize)]
struct JsonReport<'a> {
    symbol: &'a str,
    candles: &'a [Candle],
    result: &'a BacktestResult,
    metrics: Metrics,
}

#[derive(Debug, Default)]
pub struct JsonReportAdapter {
    pretty: bool,
}

impl JsonReportAdapter {
    pub fn new() -> Self {
        Self { pretty: false }
    }

    pub fn pretty() -> Self {
        Self { pretty: true }
    }

    pub fn render(
        &self,
        symbol: &str,
        candles: &[Candle],
        result: &BacktestResult,
    ) -> Result<String, EngineError> {
        let report = JsonReport {
            symbol,
            candles,
            result,
            metrics: Metrics::compute(result),
        };
        let rendered = if self.pretty {
            serde_json::to_string_pretty(&report)
        } else {
            serde_json::to_string(&report)
        };
        rendered.map_err(|e| EngineError::Report {
            reason: format!("failed to serialise report: {e}"),
        })
    }
}

impl ReportPort for JsonReportAdapter {
    fn write(
        &self,
        symbol: &str,
        candles: &[Candle],
        result: &BacktestResult,
        output_path: &str,
    ) -> Result<(), EngineError> {
        let json = self.render(symbol, candles, result)?;

        if let Some(parent) = Path::new(output_path).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| EngineError::Report {
                    reason: format!("failed to create {}: {e}", parent.display()),
                })?;
            }
        }

        fs::write(output_path, json).map_err(|e| EngineError::Report {
            reason: format!("failed to write {output_path}: {e}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_result() -> BacktestResult {
        BacktestResult {
            initial_capital: 1000.0,
            final_capital: 1030.0,
            trade_count: 1,
            max_drawdown_pct: 0.0,
            equity_curve: vec![1000.0, 1030.0],
            buy_signal_indices: vec![1],
            sell_signal_indices: vec![2],
            half_close_indices: vec![],
            trades: vec![],
            open_position: None,
        }
    }

    fn sample_candles() -> Vec<Candle> {
        (0..3)
            .map(|i| Candle {
                timestamp: i * 3_600_000,
                open: 100.0,
                high: 101.0,
                low: 99.0,
                close: 100.0 + i as f64,
                volume: 10.0,
            })
            .collect()
    }

    #[test]
    fn render_contains_all_sections() {
        let json = JsonReportAdapter::new()
            .render("BTCUSDT", &sample_candles(), &sample_result())
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["symbol"], "BTCUSDT");
        assert_eq!(value["candles"].as_array().unwrap().len(), 3);
        assert_eq!(value["result"]["final_capital"], 1030.0);
        assert_eq!(value["result"]["buy_signal_indices"][0], 1);
        assert!(value["metrics"]["total_return"].as_f64().is_some());
    }

    #[test]
    fn write_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("reports").join("btc.json");
        let path_str = path.to_str().unwrap();

        JsonReportAdapter::pretty()
            .write("BTCUSDT", &sample_candles(), &sample_result(), path_str)
            .unwrap();

        let written = fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&written).unwrap();
        assert_eq!(value["result"]["trade_count"], 1);
    }
}
