#![allow(dead_code)]

use pivotrader::domain::backtest::{BacktestConfig, StrategyRule};
use pivotrader::domain::candle::Candle;
use pivotrader::domain::error::EngineError;
use pivotrader::domain::pipeline::StrategyParams;
pub use pivotrader::ports::data_port::DataPort;
use std::collections::HashMap;

pub const HOUR_MS: i64 = 3_600_000;
pub const START_MS: i64 = 1_704_067_200_000;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<Candle>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_candles(mut self, symbol: &str, candles: Vec<Candle>) -> Self {
        self.data.insert(symbol.to_string(), candles);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_candles(
        &self,
        symbol: &str,
        _timeframe: &str,
        limit: usize,
    ) -> Result<Vec<Candle>, EngineError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(EngineError::DataSource {
                reason: reason.clone(),
            });
        }
        let candles = self.data.get(symbol).cloned().unwrap_or_default();
        let skip = candles.len().saturating_sub(limit);
        Ok(candles[skip..].to_vec())
    }

    fn list_symbols(&self, _timeframe: &str) -> Result<Vec<String>, EngineError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }
}

pub fn make_candle(index: usize, high: f64, low: f64, close: f64, volume: f64) -> Candle {
    Candle {
        timestamp: START_MS + index as i64 * HOUR_MS,
        open: close,
        high,
        low,
        close,
        volume,
    }
}

/// Candles with high = low = close.
pub fn closes_to_candles(closes: &[f64]) -> Vec<Candle> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| make_candle(i, c, c, c, 100.0))
        .collect()
}

/// Strategy small enough to trade on a dozen bars.
pub fn test_params() -> StrategyParams {
    StrategyParams {
        pivot_left: 1,
        pivot_right: 1,
        atr_period: 3,
        atr_multiplier: 1.5,
        trend_ema_period: 3,
        rsi_period: 3,
        volume_lookback: 3,
        vol_multiplier: 1.2,
        sl_pct: 0.03,
        tp_pct: 0.06,
        half_close_pct: 0.03,
        max_pivot_age: None,
    }
}

pub fn test_config() -> BacktestConfig {
    BacktestConfig {
        strategy: test_params(),
        rule: StrategyRule::PivotBreakout,
        initial_capital: 1000.0,
    }
}

/// Pivot highs at bars 1, 3 and 5 (100.0, 100.2, 100.1), a high-volume
/// close at 101 on bar 7, then one flat bar per entry of `after`.
pub fn breakout_scenario(after: &[f64]) -> Vec<Candle> {
    let base = [
        (99.0, 98.0, 98.5),
        (100.0, 98.5, 99.5),
        (99.2, 98.0, 98.6),
        (100.2, 98.5, 99.6),
        (99.3, 98.2, 98.8),
        (100.1, 98.6, 99.7),
        (99.4, 98.5, 99.0),
    ];
    let mut candles: Vec<Candle> = base
        .iter()
        .enumerate()
        .map(|(i, &(h, l, c))| make_candle(i, h, l, c, 100.0))
        .collect();
    candles.push(make_candle(7, 101.2, 100.5, 101.0, 500.0));
    for (k, &close) in after.iter().enumerate() {
        candles.push(make_candle(8 + k, close, close, close, 100.0));
    }
    candles
}

/// Mirror of [`breakout_scenario`] around 100: pivot lows at bars 1, 3
/// and 5 (100.0, 99.8, 99.9), a high-volume close at 99 on bar 7, then one
/// flat bar per entry of `after`.
pub fn breakdown_scenario(after: &[f64]) -> Vec<Candle> {
    let base = [
        (102.0, 101.0, 101.5),
        (101.5, 100.0, 100.5),
        (102.0, 100.8, 101.4),
        (101.5, 99.8, 100.4),
        (101.8, 100.7, 101.2),
        (101.4, 99.9, 100.3),
        (101.5, 100.6, 101.0),
    ];
    let mut candles: Vec<Candle> = base
        .iter()
        .enumerate()
        .map(|(i, &(h, l, c))| make_candle(i, h, l, c, 100.0))
        .collect();
    candles.push(make_candle(7, 99.5, 98.8, 99.0, 500.0));
    for (k, &close) in after.iter().enumerate() {
        candles.push(make_candle(8 + k, close, close, close, 100.0));
    }
    candles
}

/// Inserts a bar with a NaN close at `at` and renumbers timestamps so the
/// series stays ordered.
pub fn with_malformed_bar(candles: &[Candle], at: usize) -> Vec<Candle> {
    let mut out = candles.to_vec();
    let mut bad = out[at.min(out.len() - 1)];
    bad.close = f64::NAN;
    out.insert(at, bad);
    out.iter()
        .enumerate()
        .map(|(i, c)| Candle {
            timestamp: START_MS + i as i64 * HOUR_MS,
            ..*c
        })
        .collect()
}

/// Flat-price series that never triggers a signal.
pub fn quiet_series(n: usize, price: f64) -> Vec<Candle> {
    (0..n)
        .map(|i| make_candle(i, price + 0.5, price - 0.5, price, 100.0))
        .collect()
}
