//! Single-position state machine: flat, open, half-closed, closed.
//!
//! Each bar is evaluated against the close price. A position first banks half
//! its size once unrealized profit reaches `half_close_pct` and moves its stop
//! to the entry price; it closes on a percentage stop/target or when price
//! crosses the recorded stop/target level, whichever is seen first.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::error::EngineError;
use crate::domain::signal::{Side, Signal};

#[derive(Debug, Clone, PartialEq)]
pub struct ExitRules {
    pub sl_pct: f64,
    pub tp_pct: f64,
    pub half_close_pct: f64,
}

impl Default for ExitRules {
    fn default() -> Self {
        ExitRules {
            sl_pct: 0.03,
            tp_pct: 0.06,
            half_close_pct: 0.03,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub side: Side,
    pub entry_price: f64,
    pub size: f64,
    pub stop_price: f64,
    /// `None` for positions that only leave on a stop or a market exit.
    pub take_profit_price: Option<f64>,
    pub half_closed: bool,
    pub opened_at_index: usize,
    /// Profit already banked by the half close.
    pub realized_pnl: f64,
}

impl Position {
    pub fn from_signal(signal: &Signal, capital: f64) -> Self {
        Position {
            side: signal.side,
            entry_price: signal.entry_price,
            size: capital / signal.entry_price,
            stop_price: signal.stop_price,
            take_profit_price: Some(signal.take_profit_price),
            half_closed: false,
            opened_at_index: signal.index,
            realized_pnl: 0.0,
        }
    }

    /// Position filled at `price` with a percentage stop and no target.
    pub fn at_market(index: usize, side: Side, price: f64, stop_pct: f64, capital: f64) -> Self {
        let stop_price = match side {
            Side::Long => price * (1.0 - stop_pct),
            Side::Short => price * (1.0 + stop_pct),
        };
        Position {
            side,
            entry_price: price,
            size: capital / price,
            stop_price,
            take_profit_price: None,
            half_closed: false,
            opened_at_index: index,
            realized_pnl: 0.0,
        }
    }

    pub fn is_long(&self) -> bool {
        self.side == Side::Long
    }

    /// Unrealized return relative to entry, positive when in profit.
    pub fn pnl_pct(&self, price: f64) -> f64 {
        match self.side {
            Side::Long => (price - self.entry_price) / self.entry_price,
            Side::Short => (self.entry_price - price) / self.entry_price,
        }
    }

    /// Profit of `size` units filled at `price`.
    pub fn pnl_for(&self, price: f64, size: f64) -> f64 {
        match self.side {
            Side::Long => (price - self.entry_price) * size,
            Side::Short => (self.entry_price - price) * size,
        }
    }

    pub fn stop_crossed(&self, price: f64) -> bool {
        match self.side {
            Side::Long => price <= self.stop_price,
            Side::Short => price >= self.stop_price,
        }
    }

    pub fn target_crossed(&self, price: f64) -> bool {
        match (self.side, self.take_profit_price) {
            (_, None) => false,
            (Side::Long, Some(target)) => price >= target,
            (Side::Short, Some(target)) => price <= target,
        }
    }

    fn close_at(&self, index: usize, exit_price: f64, reason: ExitReason) -> ClosedTrade {
        let exit_pnl = self.pnl_for(exit_price, self.size);
        let trade = ClosedTrade {
            side: self.side,
            entry_index: self.opened_at_index,
            exit_index: index,
            entry_price: self.entry_price,
            exit_price,
            exit_size: self.size,
            half_closed: self.half_closed,
            pnl: self.realized_pnl + exit_pnl,
            reason,
        };
        info!(
            side = %trade.side,
            index,
            price = exit_price,
            pnl = trade.pnl,
            reason = ?reason,
            "position closed"
        );
        trade
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    StopLoss,
    Breakeven,
    TakeProfit,
    /// Exit oscillator above its ceiling.
    Overbought,
    /// Close fell through the trend EMA.
    TrendBreak,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedTrade {
    pub side: Side,
    pub entry_index: usize,
    pub exit_index: usize,
    pub entry_price: f64,
    pub exit_price: f64,
    /// Size held at exit (half the opening size after a half close).
    pub exit_size: f64,
    pub half_closed: bool,
    /// Total realized profit, half close included.
    pub pnl: f64,
    pub reason: ExitReason,
}

impl ClosedTrade {
    /// Profit of the size still held at exit, half close excluded.
    pub fn exit_pnl(&self) -> f64 {
        match self.side {
            Side::Long => (self.exit_price - self.entry_price) * self.exit_size,
            Side::Short => (self.entry_price - self.exit_price) * self.exit_size,
        }
    }

    pub fn bars_held(&self) -> usize {
        self.exit_index.saturating_sub(self.entry_index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionState {
    Flat,
    Open,
    HalfClosed,
}

/// What happened to the position on one bar.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BarOutcome {
    /// Profit banked by a half close on this bar.
    pub half_close_pnl: Option<f64>,
    pub closed: Option<ClosedTrade>,
}

impl BarOutcome {
    pub fn is_quiet(&self) -> bool {
        self.half_close_pnl.is_none() && self.closed.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct PositionManager {
    position: Option<Position>,
}

impl PositionManager {
    pub fn new() -> Self {
        Self { position: None }
    }

    pub fn state(&self) -> PositionState {
        match &self.position {
            None => PositionState::Flat,
            Some(p) if p.half_closed => PositionState::HalfClosed,
            Some(_) => PositionState::Open,
        }
    }

    pub fn is_flat(&self) -> bool {
        self.position.is_none()
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    /// FLAT + signal → OPEN, sized with the whole of `capital`.
    pub fn open(&mut self, signal: &Signal, capital: f64) -> Result<&Position, EngineError> {
        self.insert(Position::from_signal(signal, capital))
    }

    /// FLAT → OPEN for rules that enter at the close without a target level.
    pub fn open_at_market(
        &mut self,
        index: usize,
        side: Side,
        price: f64,
        stop_pct: f64,
        capital: f64,
    ) -> Result<&Position, EngineError> {
        self.insert(Position::at_market(index, side, price, stop_pct, capital))
    }

    fn insert(&mut self, position: Position) -> Result<&Position, EngineError> {
        if self.position.is_some() {
            return Err(EngineError::PositionAlreadyOpen);
        }
        info!(
            side = %position.side,
            index = position.opened_at_index,
            price = position.entry_price,
            size = position.size,
            "position opened"
        );
        Ok(&*self.position.insert(position))
    }

    /// Closes the whole remaining size at `price`; `None` when already flat.
    pub fn close(&mut self, index: usize, price: f64, reason: ExitReason) -> Option<ClosedTrade> {
        let trade = self.position.take()?.close_at(index, price, reason);
        Some(trade)
    }

    /// Runs the half-close and exit checks for the bar at `index`.
    pub fn on_bar(&mut self, index: usize, price: f64, rules: &ExitRules) -> BarOutcome {
        let mut outcome = BarOutcome::default();
        let Some(position) = self.position.as_mut() else {
            return outcome;
        };

        let pnl_pct = position.pnl_pct(price);

        if !position.half_closed && pnl_pct >= rules.half_close_pct {
            let half = position.size / 2.0;
            let banked = position.pnl_for(price, half);
            position.size = half;
            position.stop_price = position.entry_price;
            position.half_closed = true;
            position.realized_pnl += banked;
            debug!(index, price, pnl = banked, "half close, stop moved to breakeven");
            outcome.half_close_pnl = Some(banked);
        }

        let stop_hit = position.stop_crossed(price);
        let target_hit = position.target_crossed(price);
        let pct_hit = pnl_pct <= -rules.sl_pct || pnl_pct >= rules.tp_pct;

        if stop_hit || target_hit || pct_hit {
            // Level crossings fill at the level; a percentage-only trigger fills at the close.
            let (exit_price, reason) = if stop_hit {
                let reason = if position.half_closed {
                    ExitReason::Breakeven
                } else {
                    ExitReason::StopLoss
                };
                (position.stop_price, reason)
            } else if let Some(target) = position.take_profit_price.filter(|_| target_hit) {
                (target, ExitReason::TakeProfit)
            } else if pnl_pct >= rules.tp_pct {
                (price, ExitReason::TakeProfit)
            } else {
                (price, ExitReason::StopLoss)
            };

            outcome.closed = Some(position.close_at(index, exit_price, reason));
            self.position = None;
        }

        outcome
    }
}
