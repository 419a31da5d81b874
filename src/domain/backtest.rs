//! Bar-by-bar backtest simulation.
//!
//! Indicators and pivots are computed once over the whole series; the loop
//! then walks bars in order, running exit checks on an open position and
//! looking for a new signal only while flat. A bar that closes a position
//! does not also open one. [`StrategyRule`] picks which entry/exit rule the
//! loop runs.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::candle::Candle;
use crate::domain::error::EngineError;
use crate::domain::performance::PerformanceTracker;
use crate::domain::pipeline::{StrategyParams, analyze};
use crate::domain::position::{ClosedTrade, Position, PositionManager};
use crate::domain::pullback::{PullbackParams, run_pullback};

/// Entry/exit rule a backtest runs.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum StrategyRule {
    /// Pivot-cluster breakout with half close and breakeven stop.
    #[default]
    PivotBreakout,
    /// Long-only EMA trend filter with RSI pullback entries.
    RsiPullback(PullbackParams),
}

impl StrategyRule {
    pub fn name(&self) -> &'static str {
        match self {
            StrategyRule::PivotBreakout => "pivot_breakout",
            StrategyRule::RsiPullback(_) => "rsi_pullback",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    /// Breakout tunables; unused by other rules.
    pub strategy: StrategyParams,
    pub rule: StrategyRule,
    pub initial_capital: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            strategy: StrategyParams::default(),
            rule: StrategyRule::default(),
            initial_capital: 1000.0,
        }
    }
}

impl BacktestConfig {
    /// Shortest series the active rule accepts.
    pub fn min_bars(&self) -> usize {
        match &self.rule {
            StrategyRule::PivotBreakout => self.strategy.min_bars(),
            StrategyRule::RsiPullback(params) => params.min_bars(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub initial_capital: f64,
    pub final_capital: f64,
    pub trade_count: usize,
    /// Largest peak-to-trough fall of capital, in percent.
    pub max_drawdown_pct: f64,
    pub equity_curve: Vec<f64>,
    /// Long entries.
    pub buy_signal_indices: Vec<usize>,
    /// Short entries and exits of either side.
    pub sell_signal_indices: Vec<usize>,
    pub half_close_indices: Vec<usize>,
    pub trades: Vec<ClosedTrade>,
    /// Position still held when the series ran out; not counted in final capital.
    pub open_position: Option<Position>,
}

impl BacktestResult {
    pub(crate) fn from_run(tracker: PerformanceTracker, manager: &PositionManager) -> Self {
        BacktestResult {
            initial_capital: tracker.initial_capital,
            final_capital: tracker.capital,
            trade_count: tracker.trade_count,
            max_drawdown_pct: tracker.max_drawdown * 100.0,
            buy_signal_indices: tracker.long_entries.clone(),
            sell_signal_indices: tracker.sell_indices(),
            half_close_indices: tracker.half_closes,
            equity_curve: tracker.equity_curve,
            trades: tracker.closed_trades,
            open_position: manager.position().cloned(),
        }
    }

    /// Final over initial capital, in percent.
    pub fn total_return_pct(&self) -> f64 {
        if self.initial_capital == 0.0 {
            return 0.0;
        }
        (self.final_capital - self.initial_capital) / self.initial_capital * 100.0
    }
}

pub fn run_backtest(
    symbol: &str,
    candles: &[Candle],
    config: &BacktestConfig,
) -> Result<BacktestResult, EngineError> {
    let result = match &config.rule {
        StrategyRule::PivotBreakout => run_pivot_breakout(symbol, candles, config)?,
        StrategyRule::RsiPullback(params) => {
            run_pullback(symbol, candles, params, config.initial_capital)?
        }
    };

    info!(
        symbol,
        rule = config.rule.name(),
        trades = result.trade_count,
        final_capital = result.final_capital,
        max_drawdown_pct = result.max_drawdown_pct,
        "backtest complete"
    );

    Ok(result)
}

fn run_pivot_breakout(
    symbol: &str,
    candles: &[Candle],
    config: &BacktestConfig,
) -> Result<BacktestResult, EngineError> {
    let analysis = analyze(symbol, candles, &config.strategy)?;
    let signal_params = config.strategy.signal_params();
    let rules = config.strategy.exit_rules();

    let mut manager = PositionManager::new();
    let mut tracker = PerformanceTracker::new(config.initial_capital);

    // Recorded indices refer to the caller's series, not the cleaned one.
    for index in config.strategy.first_signal_bar()..analysis.len() {
        let bar = analysis.source_index(index);
        if manager.is_flat() {
            if let Some(signal) = analysis.signal_at(index, &signal_params) {
                manager.open(&signal, tracker.capital)?;
                tracker.record_entry(bar, signal.side);
            }
            continue;
        }

        let price = analysis.candles[index].close;
        let outcome = manager.on_bar(bar, price, &rules);
        if let Some(pnl) = outcome.half_close_pnl {
            tracker.record_half_close(bar, pnl);
        }
        if let Some(trade) = outcome.closed {
            tracker.record_exit(trade);
        }
    }

    Ok(BacktestResult::from_run(tracker, &manager))
}
