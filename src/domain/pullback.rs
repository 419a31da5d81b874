//! EMA trend / RSI pullback rule.
//!
//! Long only. While flat, a bar enters at its close when it is above the
//! trend EMA, the fast RSI is below `entry_rsi_below` and the close is higher
//! than the previous one. An open position leaves at the close on the first
//! bar that is `stop_pct` under the entry, has the slow RSI above
//! `exit_rsi_above`, or closes under the trend EMA, checked in that order.
//! There is no half close.

use tracing::debug;

use crate::domain::backtest::BacktestResult;
use crate::domain::candle::{Candle, PriceColumns, sanitize, validate_series};
use crate::domain::error::EngineError;
use crate::domain::indicator::{self, IndicatorSeries};
use crate::domain::performance::PerformanceTracker;
use crate::domain::position::{ExitReason, PositionManager};
use crate::domain::signal::Side;

#[derive(Debug, Clone, PartialEq)]
pub struct PullbackParams {
    pub trend_ema_period: usize,
    pub entry_rsi_period: usize,
    pub exit_rsi_period: usize,
    pub entry_rsi_below: f64,
    pub exit_rsi_above: f64,
    /// Fractional loss from entry that forces an exit.
    pub stop_pct: f64,
}

impl Default for PullbackParams {
    fn default() -> Self {
        PullbackParams {
            trend_ema_period: 29,
            entry_rsi_period: 3,
            exit_rsi_period: 7,
            entry_rsi_below: 40.0,
            exit_rsi_above: 70.0,
            stop_pct: 0.10,
        }
    }
}

impl PullbackParams {
    /// Shortest series on which every indicator has at least one value.
    pub fn min_bars(&self) -> usize {
        self.trend_ema_period
            .max(self.entry_rsi_period + 1)
            .max(self.exit_rsi_period + 1)
            .max(2)
    }
}

struct PullbackColumns {
    trend_ema: IndicatorSeries,
    entry_rsi: IndicatorSeries,
    exit_rsi: IndicatorSeries,
}

impl PullbackColumns {
    fn compute(closes: &[f64], params: &PullbackParams) -> Self {
        let (trend_ema, (entry_rsi, exit_rsi)) = rayon::join(
            || indicator::ema(closes, params.trend_ema_period),
            || {
                rayon::join(
                    || indicator::rsi(closes, params.entry_rsi_period),
                    || indicator::rsi(closes, params.exit_rsi_period),
                )
            },
        );
        PullbackColumns {
            trend_ema,
            entry_rsi,
            exit_rsi,
        }
    }
}

fn entry_due(closes: &[f64], index: usize, cols: &PullbackColumns, params: &PullbackParams) -> bool {
    let (Some(ema), Some(rsi)) = (cols.trend_ema.at(index), cols.entry_rsi.at(index)) else {
        return false;
    };
    let close = closes[index];
    let rising = index > 0 && close > closes[index - 1];
    close > ema && rsi < params.entry_rsi_below && rising
}

fn exit_due(
    close: f64,
    entry_price: f64,
    index: usize,
    cols: &PullbackColumns,
    params: &PullbackParams,
) -> Option<ExitReason> {
    let change = (close - entry_price) / entry_price;
    if change <= -params.stop_pct {
        return Some(ExitReason::StopLoss);
    }
    if cols.exit_rsi.at(index).is_some_and(|rsi| rsi > params.exit_rsi_above) {
        return Some(ExitReason::Overbought);
    }
    if cols.trend_ema.at(index).is_some_and(|ema| close < ema) {
        return Some(ExitReason::TrendBreak);
    }
    None
}

/// Runs the pullback rule over `candles`, sizing each entry with all capital.
pub fn run_pullback(
    symbol: &str,
    candles: &[Candle],
    params: &PullbackParams,
    initial_capital: f64,
) -> Result<BacktestResult, EngineError> {
    validate_series(candles)?;
    let clean = sanitize(candles);

    let minimum = params.min_bars();
    if clean.len() < minimum {
        return Err(EngineError::InsufficientData {
            symbol: symbol.to_string(),
            bars: clean.len(),
            minimum,
        });
    }

    let closes = PriceColumns::from_candles(&clean.candles).closes;
    let cols = PullbackColumns::compute(&closes, params);
    debug!(symbol, bars = closes.len(), "pullback indicators ready");

    let mut manager = PositionManager::new();
    let mut tracker = PerformanceTracker::new(initial_capital);

    for (index, &close) in closes.iter().enumerate() {
        let bar = clean.source_index[index];
        let Some(entry_price) = manager.position().map(|p| p.entry_price) else {
            if entry_due(&closes, index, &cols, params) {
                manager.open_at_market(bar, Side::Long, close, params.stop_pct, tracker.capital)?;
                tracker.record_entry(bar, Side::Long);
            }
            continue;
        };

        if let Some(reason) = exit_due(close, entry_price, index, &cols, params) {
            if let Some(trade) = manager.close(bar, close, reason) {
                tracker.record_exit(trade);
            }
        }
    }

    Ok(BacktestResult::from_run(tracker, &manager))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn params() -> PullbackParams {
        PullbackParams {
            trend_ema_period: 10,
            entry_rsi_period: 3,
            exit_rsi_period: 2,
            ..PullbackParams::default()
        }
    }

    fn series(closes: &[f64]) -> Vec<Candle> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Candle {
                timestamp: i as i64 * 60_000,
                open: close,
                high: close,
                low: close,
                close,
                volume: 100.0,
            })
            .collect()
    }

    /// Fifteen rising bars, a two-bar dip that holds the EMA, a small
    /// higher close on bar 17, then `last` on bar 18.
    fn dip_then(last: f64) -> Vec<Candle> {
        let mut closes: Vec<f64> = (0..15).map(|i| 100.0 + i as f64).collect();
        closes.extend([111.0, 110.0, 110.3, last]);
        series(&closes)
    }

    #[test]
    fn default_params() {
        let p = PullbackParams::default();
        assert_eq!(p.trend_ema_period, 29);
        assert_eq!(p.min_bars(), 29);
        assert_eq!(params().min_bars(), 10);
    }

    #[test]
    fn short_series_is_insufficient() {
        let err = run_pullback("TEST", &series(&[10.0, 11.0]), &params(), 1000.0).unwrap_err();
        assert!(matches!(
            err,
            EngineError::InsufficientData {
                bars: 2,
                minimum: 10,
                ..
            }
        ));
    }

    #[test]
    fn steady_rise_never_pulls_back() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let result = run_pullback("TEST", &series(&closes), &params(), 1000.0).unwrap();
        assert_eq!(result.trade_count, 0);
        assert_eq!(result.final_capital, 1000.0);
    }

    #[test]
    fn pullback_entry_exits_when_overbought() {
        let result = run_pullback("TEST", &dip_then(116.0), &params(), 1000.0).unwrap();

        assert_eq!(result.buy_signal_indices, vec![17]);
        assert_eq!(result.sell_signal_indices, vec![18]);
        let trade = &result.trades[0];
        assert_eq!(trade.side, Side::Long);
        assert_eq!(trade.entry_price, 110.3);
        assert_eq!(trade.reason, ExitReason::Overbought);
        assert_relative_eq!(result.final_capital, 1000.0 * 116.0 / 110.3, epsilon = 1e-9);
        assert!(result.half_close_indices.is_empty());
    }

    #[test]
    fn stop_wins_over_other_exits() {
        // 99 is more than 10% under entry and also under the EMA
        let result = run_pullback("TEST", &dip_then(99.0), &params(), 1000.0).unwrap();
        let trade = &result.trades[0];
        assert_eq!(trade.reason, ExitReason::StopLoss);
        assert_eq!(trade.exit_price, 99.0);
        assert_relative_eq!(result.final_capital, 1000.0 * 99.0 / 110.3, epsilon = 1e-9);
        assert_relative_eq!(
            result.max_drawdown_pct,
            (1.0 - 99.0 / 110.3) * 100.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn close_under_ema_breaks_trend() {
        let result = run_pullback("TEST", &dip_then(109.5), &params(), 1000.0).unwrap();
        let trade = &result.trades[0];
        assert_eq!(trade.reason, ExitReason::TrendBreak);
        assert_eq!((trade.entry_index, trade.exit_index), (17, 18));
    }

    #[test]
    fn position_left_open_is_reported() {
        let mut candles = dip_then(0.0);
        candles.pop();
        let result = run_pullback("TEST", &candles, &params(), 1000.0).unwrap();
        assert!(result.trades.is_empty());
        assert_eq!(result.trade_count, 1);
        let open = result.open_position.unwrap();
        assert_eq!(open.opened_at_index, 17);
        assert_eq!(open.take_profit_price, None);
    }

    #[test]
    fn indices_skip_malformed_bars() {
        let mut candles = dip_then(116.0);
        let mut bad = candles[4];
        bad.close = f64::NAN;
        candles.insert(4, bad);
        for (i, c) in candles.iter_mut().enumerate() {
            c.timestamp = i as i64 * 60_000;
        }
        let result = run_pullback("TEST", &candles, &params(), 1000.0).unwrap();
        assert_eq!(result.buy_signal_indices, vec![18]);
        assert_eq!(candles[18].close, 110.3);
    }
}
