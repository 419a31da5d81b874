//! Running capital, peak, drawdown and signal-index bookkeeping.

use crate::domain::position::ClosedTrade;
use crate::domain::signal::Side;

#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceTracker {
    pub initial_capital: f64,
    pub capital: f64,
    pub peak: f64,
    /// Largest fall from peak seen so far, as a fraction of the peak.
    pub max_drawdown: f64,
    pub trade_count: usize,
    /// Capital after every capital-changing event, starting with the initial capital.
    pub equity_curve: Vec<f64>,
    pub long_entries: Vec<usize>,
    pub short_entries: Vec<usize>,
    pub half_closes: Vec<usize>,
    pub exits: Vec<usize>,
    pub closed_trades: Vec<ClosedTrade>,
}

impl PerformanceTracker {
    pub fn new(initial_capital: f64) -> Self {
        PerformanceTracker {
            initial_capital,
            capital: initial_capital,
            peak: initial_capital,
            max_drawdown: 0.0,
            trade_count: 0,
            equity_curve: vec![initial_capital],
            long_entries: Vec::new(),
            short_entries: Vec::new(),
            half_closes: Vec::new(),
            exits: Vec::new(),
            closed_trades: Vec::new(),
        }
    }

    pub fn record_entry(&mut self, index: usize, side: Side) {
        self.trade_count += 1;
        match side {
            Side::Long => self.long_entries.push(index),
            Side::Short => self.short_entries.push(index),
        }
    }

    pub fn record_half_close(&mut self, index: usize, pnl: f64) {
        self.half_closes.push(index);
        self.apply_pnl(pnl);
    }

    /// Books the remaining-size pnl of a closed trade.
    pub fn record_exit(&mut self, trade: ClosedTrade) {
        self.exits.push(trade.exit_index);
        self.apply_pnl(trade.exit_pnl());
        self.closed_trades.push(trade);
    }

    fn apply_pnl(&mut self, pnl: f64) {
        self.capital += pnl;
        self.equity_curve.push(self.capital);
        self.peak = self.peak.max(self.capital);
        if self.peak > 0.0 {
            self.max_drawdown = self.max_drawdown.max((self.peak - self.capital) / self.peak);
        }
    }

    /// Short entries and exits merged in bar order.
    pub fn sell_indices(&self) -> Vec<usize> {
        let mut sells: Vec<usize> = self
            .short_entries
            .iter()
            .chain(self.exits.iter())
            .copied()
            .collect();
        sells.sort_unstable();
        sells
    }
}

/// Maximum peak-to-trough decline of an equity curve, as a fraction of the peak.
pub fn max_drawdown(equity_curve: &[f64]) -> f64 {
    let Some(&first) = equity_curve.first() else {
        return 0.0;
    };
    let mut peak = first;
    let mut max_dd = 0.0_f64;
    for &equity in equity_curve {
        peak = peak.max(equity);
        if peak > 0.0 {
            max_dd = max_dd.max((peak - equity) / peak);
        }
    }
    max_dd
}
